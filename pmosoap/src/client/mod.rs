//! # Client SOAP
//!
//! Un [`SoapHttpClient`] appelle les opérations d'un service décrit par un
//! [`ServiceDescriptor`] : mêmes déclarations que côté serveur, sans
//! handler.
//!
//! ## Fonctionnalités
//!
//! - ✅ Appels asynchrones (`reqwest`) et bloquants (`ureq`), même machine à états
//! - ✅ SOAP 1.1 (`SOAPAction` entre guillemets) et 1.2 (`action` dans le type de contenu)
//! - ✅ En-têtes entrants et sortants via les membres du proxy
//! - ✅ Extensions : croissant à l'émission, décroissant à la réception
//! - ✅ Fautes relues en [`SoapException`], erreurs de transport avec le corps brut
//! - ✅ Interruption de l'appel en cours ([`SoapHttpClient::abort`])
//! - ✅ Client HTTP GET/POST simple ([`HttpSimpleClient`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use pmosoap::attributes::SoapMethodAttribute;
//! use pmosoap::client::{ClientOptions, SoapHttpClient};
//! use pmosoap::method::MethodDecl;
//! use pmosoap::reflection::ServiceBuilder;
//! use pmosoap::values::{SchemaType, Value};
//!
//! # async fn run() -> Result<(), pmosoap::client::ClientError> {
//! let proxy = ServiceBuilder::new("Calculator")
//!     .method(
//!         MethodDecl::new("Calculator", "Add")
//!             .param("a", SchemaType::Int)
//!             .param("b", SchemaType::Int)
//!             .returns(SchemaType::Int)
//!             .soap(SoapMethodAttribute::document()),
//!     )
//!     .build()?;
//! let client = SoapHttpClient::new(proxy, "http://localhost:8080/calc", ClientOptions::default())?;
//! let out = client.invoke("Add", vec![Value::Int(2), Value::Int(3)]).await?;
//! assert_eq!(out, vec![Value::Int(5)]);
//! # Ok(())
//! # }
//! ```

mod call;
mod proxy;
mod simple;
mod transport;

pub use proxy::SoapHttpClient;
pub use simple::HttpSimpleClient;
pub use transport::HttpVerb;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::errors::ConfigError;
use crate::extensions::{BoundExtension, ExtensionTarget, get_extension_registry};
use crate::fault::SoapException;
use crate::http_binding::HttpBindingError;
use crate::mapping::MappingError;
use crate::reflection::{ReflectedService, ServiceDescriptor, SoapReflectedMethod};
use crate::soap::{EnvelopeError, SoapVersion};

/// Délai par défaut d'un appel.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(100);

/// Erreurs d'un appel client.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Method {0} is not a SOAP operation of this proxy")]
    UnknownMethod(String),

    #[error("Method {method} expects {expected} parameter values, got {found}")]
    ArityMismatch {
        method: String,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("HTTP {status}: {body}")]
    Transport { status: u16, body: String },

    #[error("Response content type '{content_type}' is not a SOAP content type")]
    ContentMismatch { content_type: String, body: String },

    #[error(transparent)]
    Fault(#[from] SoapException),

    #[error("Request aborted")]
    Aborted,

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid response envelope: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    HttpBinding(#[from] HttpBindingError),

    #[error("XML write error: {0}")]
    Xml(String),
}

impl ClientError {
    /// Faute SOAP renvoyée par le serveur, s'il s'agit de cela.
    pub fn fault(&self) -> Option<&SoapException> {
        match self {
            ClientError::Fault(e) => Some(e),
            _ => None,
        }
    }
}

impl From<xmltree::Error> for ClientError {
    fn from(e: xmltree::Error) -> Self {
        ClientError::Xml(e.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Http(e.to_string())
        }
    }
}

impl From<ureq::Error> for ClientError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Timeout(_) => ClientError::Timeout,
            other => ClientError::Http(other.to_string()),
        }
    }
}

/// Réglages d'un client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub version: SoapVersion,
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            version: SoapVersion::Soap11,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientOptions {
    pub fn with_version(mut self, version: SoapVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Opération appelable, avec ses extensions liées.
pub struct SoapClientMethod {
    pub reflected: Arc<SoapReflectedMethod>,
    /// Extensions de la méthode puis globales de basse priorité
    pub extensions: Vec<BoundExtension>,
}

impl std::fmt::Debug for SoapClientMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoapClientMethod")
            .field("name", &self.reflected.name)
            .field("action", &self.reflected.action)
            .finish()
    }
}

/// Métadonnées client d'un proxy, construites une fois puis mises en cache.
#[derive(Debug)]
pub struct SoapClientType {
    service: ReflectedService,
    methods: HashMap<String, Arc<SoapClientMethod>>,
    high_extensions: Vec<BoundExtension>,
}

impl SoapClientType {
    pub fn new(descriptor: Arc<ServiceDescriptor>) -> Result<Self, ConfigError> {
        let service = ReflectedService::reflect(descriptor.clone(), true)?;
        let registry = get_extension_registry();
        let low = registry.low();

        let mut methods = HashMap::new();
        for reflected in service.methods() {
            let target = ExtensionTarget::Method {
                service: descriptor.name(),
                method: &reflected.method,
            };
            let mut extensions = BoundExtension::bind_all(&reflected.extensions, target);
            extensions.extend(BoundExtension::bind_all(&low, target));
            methods.insert(
                reflected.method.name().to_string(),
                Arc::new(SoapClientMethod {
                    reflected: reflected.clone(),
                    extensions,
                }),
            );
        }
        let high_extensions =
            BoundExtension::bind_all(&registry.high(), ExtensionTarget::Service(descriptor.name()));

        info!(
            "✅ Type client {} prêt ({} opérations)",
            descriptor.name(),
            methods.len()
        );
        Ok(Self {
            service,
            methods,
            high_extensions,
        })
    }

    pub fn descriptor(&self) -> &Arc<ServiceDescriptor> {
        self.service.descriptor()
    }

    pub fn high_extensions(&self) -> &[BoundExtension] {
        &self.high_extensions
    }

    /// Opération par nom logique, puis par nom de message.
    pub fn method(&self, name: &str) -> Option<&Arc<SoapClientMethod>> {
        self.methods.get(name).or_else(|| {
            self.methods
                .values()
                .find(|m| m.reflected.name == name)
        })
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.service
            .methods()
            .iter()
            .map(|m| m.method.name())
            .collect()
    }
}
