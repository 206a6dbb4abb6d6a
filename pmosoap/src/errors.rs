use thiserror::Error;

/// Erreurs de configuration détectées à l'enregistrement d'un service.
///
/// Elles sont fatales : un service mal déclaré n'est jamais exposé.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Method {0} is static and cannot be exposed")]
    StaticMethod(String),

    #[error("Method {begin} has no matching {end}")]
    MissingEnd { begin: String, end: String },

    #[error("Method {0} must end with callback and state parameters")]
    BadBeginSignature(String),

    #[error("Method {method} overrides contract attribute {attribute}")]
    ContractOverride { method: String, attribute: String },

    #[error("One-way method {0} cannot have out parameters")]
    OneWayOutParameters(String),

    #[error("One-way method {0} cannot have a return value")]
    OneWayReturnValue(String),

    #[error("One-way method {method} cannot declare out or fault header {member}")]
    OneWayOutHeader { method: String, member: String },

    #[error("Method {method} uses Bare parameters with request element routing and must have exactly one parameter, found {count}")]
    BareRequestElement { method: String, count: usize },

    #[error("Header member {member} not found for method {method}")]
    HeaderMemberNotFound { method: String, member: String },

    #[error("Header member {0} must not be static")]
    HeaderMemberStatic(String),

    #[error("Header member {0} must be readable and writable")]
    HeaderMemberAccess(String),

    #[error("Header member {0} is not a SOAP header type")]
    HeaderNotHeaderType(String),

    #[error("Header member {0} repeats and must be an array of generic or unknown headers")]
    HeaderRepeatsType(String),

    #[error("Headers {first} and {second} of method {method} share a type and an overlapping direction")]
    HeaderAmbiguous {
        method: String,
        first: String,
        second: String,
    },

    #[error("Extension {extension} has negative priority {priority}")]
    NegativePriority { extension: String, priority: i32 },

    #[error("Methods {first} and {second} use the same {kind} '{key}'")]
    BindingAmbiguity {
        kind: String,
        key: String,
        first: String,
        second: String,
    },

    #[error("Duplicate message name {0}")]
    DuplicateMessageName(String),

    #[error("No handler registered for method {0}")]
    MissingHandler(String),

    #[error("Invalid registration: {0}")]
    Invalid(String),
}
