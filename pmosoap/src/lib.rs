//! # pmosoap - Pile SOAP / HTTP
//!
//! Publication et consommation de services web décrits par des méthodes
//! logiques : enveloppes SOAP 1.1 et 1.2, liaisons HTTP GET/POST, documents
//! de découverte (WSDL, schémas, DISCO) et extensions de messages.
//!
//! ## Fonctionnalités
//!
//! - ✅ Description des services par [`reflection::ServiceBuilder`] et attributs SOAP
//! - ✅ Serveur : routage, en-têtes, fautes, appels en sens unique
//! - ✅ Client : appels synchrones, asynchrones, interruption
//! - ✅ Extensions ordonnées par priorité autour de la sérialisation
//! - ✅ Cache de métadonnées par type et par URL
//! - ✅ Réglages via `pmoconfig` ([`SoapConfigExt`]) et montage sur `pmoserver` ([`SoapServerExt`])
//!
//! ## Architecture
//!
//! ```text
//! method / attributes → reflection → server ──→ axum Router → pmoserver
//!                                  ↘ client ──→ reqwest / ureq
//!        mapping · headers · soap · fault · extensions · discovery
//! ```

pub mod attributes;
pub mod cache;
pub mod client;
pub mod config_ext;
pub mod content_type;
pub mod discovery;
pub mod errors;
pub mod extensions;
pub mod fault;
pub mod handler;
pub mod headers;
pub mod http_binding;
pub mod mapping;
pub mod message;
pub mod method;
pub mod reflection;
pub mod server;
pub mod soap;
pub mod soap_server;
pub mod values;
pub mod xml;

pub use crate::client::{ClientError, ClientOptions, HttpSimpleClient, HttpVerb, SoapHttpClient};
pub use crate::config_ext::SoapConfigExt;
pub use crate::errors::ConfigError;
pub use crate::fault::SoapException;
pub use crate::method::{LogicalMethod, MethodDecl};
pub use crate::reflection::{ServiceBuilder, ServiceDescriptor};
pub use crate::server::{ServerOptions, SoapEndpoint};
pub use crate::soap::{Protocols, SoapVersion};
pub use crate::soap_server::SoapServerExt;
pub use crate::values::{SchemaType, Value};
