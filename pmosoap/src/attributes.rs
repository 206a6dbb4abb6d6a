//! Données d'enregistrement attachées aux services et aux opérations.
//!
//! Ces structures jouent le rôle des attributs déclaratifs : elles sont
//! fournies une fois par le code appelant au moment de l'enregistrement,
//! puis lues par la réflexion SOAP pour produire le contrat sur le fil.

use std::sync::Arc;

use crate::extensions::SoapExtensionFactory;

/// Espace de noms par défaut d'un service sans déclaration explicite.
pub const DEFAULT_NAMESPACE: &str = "http://tempuri.org/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SoapBindingStyle {
    #[default]
    Default,
    Document,
    Rpc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SoapBindingUse {
    #[default]
    Default,
    Encoded,
    Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SoapParameterStyle {
    #[default]
    Default,
    Bare,
    Wrapped,
}

/// Clé de routage des requêtes entrantes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SoapServiceRoutingStyle {
    #[default]
    SoapAction,
    RequestElement,
}

impl std::str::FromStr for SoapServiceRoutingStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "soapaction" => Ok(SoapServiceRoutingStyle::SoapAction),
            "requestelement" => Ok(SoapServiceRoutingStyle::RequestElement),
            _ => Err(format!("Style de routage inconnu: {}", s)),
        }
    }
}

/// Déclaration du service : namespace, nom, description.
#[derive(Debug, Clone, PartialEq)]
pub struct WebServiceAttribute {
    pub namespace: String,
    pub name: Option<String>,
    pub description: String,
}

impl Default for WebServiceAttribute {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            name: None,
            description: String::new(),
        }
    }
}

/// Liaison nommée (`WebServiceBinding`) : nom, namespace et revendication WS-I.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WebServiceBindingAttribute {
    pub name: String,
    pub namespace: String,
    /// Revendique la conformité WS-I Basic Profile 1.1
    pub conforms_to_bp11: bool,
    pub emit_conformance_claims: bool,
}

/// Valeurs par défaut au niveau service, équivalentes à
/// `SoapDocumentService` / `SoapRpcService`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SoapServiceAttribute {
    pub style: SoapBindingStyle,
    pub use_: SoapBindingUse,
    pub parameter_style: SoapParameterStyle,
    pub routing_style: SoapServiceRoutingStyle,
}

impl SoapServiceAttribute {
    pub fn document(use_: SoapBindingUse, parameter_style: SoapParameterStyle) -> Self {
        Self {
            style: SoapBindingStyle::Document,
            use_,
            parameter_style,
            routing_style: SoapServiceRoutingStyle::SoapAction,
        }
    }

    pub fn rpc() -> Self {
        Self {
            style: SoapBindingStyle::Rpc,
            use_: SoapBindingUse::Encoded,
            parameter_style: SoapParameterStyle::Wrapped,
            routing_style: SoapServiceRoutingStyle::SoapAction,
        }
    }

    pub fn routed_by(mut self, routing_style: SoapServiceRoutingStyle) -> Self {
        self.routing_style = routing_style;
        self
    }
}

/// Exposition d'une opération (`WebMethod`).
#[derive(Debug, Clone, PartialEq)]
pub struct WebMethodAttribute {
    pub message_name: Option<String>,
    pub description: String,
    pub buffer_response: bool,
}

impl Default for WebMethodAttribute {
    fn default() -> Self {
        Self {
            message_name: None,
            description: String::new(),
            buffer_response: true,
        }
    }
}

/// Liaison SOAP d'une opération (`SoapDocumentMethod` / `SoapRpcMethod`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SoapMethodAttribute {
    pub style: SoapBindingStyle,
    pub action: Option<String>,
    pub binding: Option<String>,
    pub one_way: bool,
    pub use_: SoapBindingUse,
    pub parameter_style: SoapParameterStyle,
    pub request_element_name: Option<String>,
    pub request_namespace: Option<String>,
    pub response_element_name: Option<String>,
    pub response_namespace: Option<String>,
}

impl SoapMethodAttribute {
    pub fn document() -> Self {
        Self {
            style: SoapBindingStyle::Document,
            ..Default::default()
        }
    }

    pub fn rpc() -> Self {
        Self {
            style: SoapBindingStyle::Rpc,
            ..Default::default()
        }
    }
}

/// Direction d'un en-tête déclaré.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoapHeaderDirection(u8);

impl SoapHeaderDirection {
    pub const IN: SoapHeaderDirection = SoapHeaderDirection(1);
    pub const OUT: SoapHeaderDirection = SoapHeaderDirection(2);
    pub const IN_OUT: SoapHeaderDirection = SoapHeaderDirection(3);
    pub const FAULT: SoapHeaderDirection = SoapHeaderDirection(4);

    pub fn contains(&self, other: SoapHeaderDirection) -> bool {
        self.0 & other.0 != 0
    }

    pub fn overlaps(&self, other: SoapHeaderDirection) -> bool {
        self.0 & other.0 != 0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl std::ops::BitOr for SoapHeaderDirection {
    type Output = SoapHeaderDirection;

    fn bitor(self, rhs: SoapHeaderDirection) -> SoapHeaderDirection {
        SoapHeaderDirection(self.0 | rhs.0)
    }
}

impl Default for SoapHeaderDirection {
    fn default() -> Self {
        SoapHeaderDirection::IN
    }
}

/// Déclaration d'un en-tête sur une opération.
#[derive(Debug, Clone, PartialEq)]
pub struct SoapHeaderAttribute {
    /// Nom du membre de service qui reçoit ou fournit l'en-tête
    pub member: String,
    pub direction: SoapHeaderDirection,
    /// Présence obligatoire (vérifiée seulement avec une revendication WS-I)
    pub required: bool,
}

impl SoapHeaderAttribute {
    pub fn new(member: &str, direction: SoapHeaderDirection) -> Self {
        Self {
            member: member.to_string(),
            direction,
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Déclaration d'une extension sur une opération.
#[derive(Clone)]
pub struct SoapExtensionAttribute {
    pub factory: Arc<dyn SoapExtensionFactory>,
    pub priority: i32,
}

impl SoapExtensionAttribute {
    pub fn new(factory: Arc<dyn SoapExtensionFactory>, priority: i32) -> Self {
        Self { factory, priority }
    }
}

impl std::fmt::Debug for SoapExtensionAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoapExtensionAttribute")
            .field("factory", &self.factory.name())
            .field("priority", &self.priority)
            .finish()
    }
}

/// Ensemble des données déclaratives d'une méthode.
#[derive(Debug, Clone, Default)]
pub struct MethodAttributes {
    pub web_method: Option<WebMethodAttribute>,
    pub soap: Option<SoapMethodAttribute>,
    pub headers: Vec<SoapHeaderAttribute>,
    pub extensions: Vec<SoapExtensionAttribute>,
}

impl MethodAttributes {
    /// Vrai si aucune donnée n'est portée.
    pub fn is_empty(&self) -> bool {
        self.web_method.is_none()
            && self.soap.is_none()
            && self.headers.is_empty()
            && self.extensions.is_empty()
    }
}
