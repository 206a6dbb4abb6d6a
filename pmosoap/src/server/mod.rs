//! # Serveur SOAP
//!
//! Un [`SoapEndpoint`] publie un service enregistré avec
//! [`ServiceBuilder`](crate::reflection::ServiceBuilder) : appels SOAP 1.1 et
//! 1.2 en `POST`, appels HTTP simples sur `{service}/{méthode}`, documents
//! de découverte et page de présentation en `GET`.
//!
//! ## Fonctionnalités
//!
//! - ✅ Choix de la version SOAP, routage par SOAPAction ou élément de requête
//! - ✅ Fautes traduites selon la version, statuts 400/415/500
//! - ✅ Appels en sens unique : 202 immédiat, traitement en tâche de fond
//! - ✅ Métadonnées construites une fois puis servies depuis le cache
//! - ✅ Routeur axum prêt à monter sur un `pmoserver::Server`
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pmosoap::method::MethodDecl;
//! use pmosoap::operation_handler;
//! use pmosoap::reflection::ServiceBuilder;
//! use pmosoap::server::{ServerOptions, SoapEndpoint};
//! use pmosoap::values::{SchemaType, Value};
//!
//! let service = ServiceBuilder::new("Calculator")
//!     .operation(
//!         MethodDecl::new("Calculator", "Add")
//!             .param("a", SchemaType::Int)
//!             .param("b", SchemaType::Int)
//!             .returns(SchemaType::Int),
//!         operation_handler!(|instance, args| {
//!             Ok(vec![Value::Int(args.int("a")? + args.int("b")?)])
//!         }),
//!     )
//!     .build()?;
//! let endpoint = Arc::new(SoapEndpoint::new(service, ServerOptions::default())?);
//! let router = pmosoap::server::router(endpoint);
//! # Ok::<(), pmosoap::errors::ConfigError>(())
//! ```

mod documentation;
mod host;
mod http;
mod http_protocol;
mod protocol;
mod server_type;
mod version;

pub use host::router;
pub use http::{SoapRequest, SoapResponse};
pub use http_protocol::{HttpServerMethod, HttpServerType};
pub use protocol::{dispatch, fault_status};
pub use server_type::{ServerRoute, SoapServerMethod, SoapServerType};
pub use version::{check_version, guess_version, request_action, unescape_action, upgrade_header};

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use tracing::{error, info};

use crate::cache::{MetadataCache, ProtocolKind, get_metadata_cache};
use crate::discovery::{DiscoveryDocuments, DiscoveryRequest};
use crate::errors::ConfigError;
use crate::reflection::ServiceDescriptor;
use crate::soap::Protocols;

/// Réglages d'un point d'accès.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub protocols: Protocols,
    /// Faux : les réponses partent en fragments
    pub buffer_response: bool,
    /// Vrai : texte et détail des fautes remplacés par un message générique
    pub suppress_fault_detail: bool,
    /// Délai maximal de lecture du corps d'une requête
    pub read_timeout: Option<Duration>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            protocols: Protocols::ALL,
            buffer_response: true,
            suppress_fault_detail: false,
            read_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Service publié : description, réglages et accès aux métadonnées.
pub struct SoapEndpoint {
    descriptor: Arc<ServiceDescriptor>,
    options: Arc<ServerOptions>,
    cache: &'static MetadataCache,
}

impl std::fmt::Debug for SoapEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoapEndpoint")
            .field("service", &self.descriptor.name())
            .field("options", &self.options)
            .finish()
    }
}

impl SoapEndpoint {
    /// Valide le service (erreurs de configuration fatales) et prépare le
    /// point d'accès.
    pub fn new(descriptor: Arc<ServiceDescriptor>, options: ServerOptions) -> Result<Self, ConfigError> {
        Self::with_cache(descriptor, options, get_metadata_cache())
    }

    pub fn with_cache(
        descriptor: Arc<ServiceDescriptor>,
        options: ServerOptions,
        cache: &'static MetadataCache,
    ) -> Result<Self, ConfigError> {
        SoapServerType::new(descriptor.clone(), options.protocols)?;
        info!(
            "🎬 Service {} publié ({:?})",
            descriptor.name(),
            options.protocols.names()
        );
        Ok(Self {
            descriptor,
            options: Arc::new(options),
            cache,
        })
    }

    pub fn descriptor(&self) -> &Arc<ServiceDescriptor> {
        &self.descriptor
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Clé de cache : un type de service par description enregistrée.
    fn type_key(&self) -> String {
        format!(
            "{}@{:p}",
            self.descriptor.type_name(),
            Arc::as_ptr(&self.descriptor)
        )
    }

    pub fn server_type(&self, url: &str) -> Result<Arc<SoapServerType>, ConfigError> {
        self.cache
            .get_or_build(ProtocolKind::SoapServer, &self.type_key(), url, |_| {
                SoapServerType::new(self.descriptor.clone(), self.options.protocols)
            })
    }

    pub fn http_server_type(&self, url: &str) -> Arc<HttpServerType> {
        let built: Result<_, std::convert::Infallible> =
            self.cache
                .get_or_build(ProtocolKind::HttpServer, &self.type_key(), url, |_| {
                    Ok(HttpServerType::new(self.descriptor.clone()))
                });
        match built {
            Ok(server_type) => server_type,
            Err(never) => match never {},
        }
    }

    fn discovery_documents(&self, url: &str) -> Result<Arc<DiscoveryDocuments>, String> {
        let server_type = self.server_type(url).map_err(|e| e.to_string())?;
        self.cache
            .get_or_build(ProtocolKind::Discovery, &self.type_key(), url, |_| {
                DiscoveryDocuments::generate(&server_type, url)
            })
            .map_err(|e| e.to_string())
    }

    /// `POST` sur l'URL du service.
    pub async fn handle_soap(&self, request: SoapRequest) -> SoapResponse {
        if !self.options.protocols.intersects(Protocols::ANY_HTTP_SOAP) {
            return SoapResponse::new(StatusCode::METHOD_NOT_ALLOWED);
        }
        match self.server_type(&request.url) {
            Ok(server_type) => dispatch(server_type, self.options.clone(), request).await,
            Err(e) => {
                error!("❌ Service {} inutilisable : {}", self.descriptor.name(), e);
                SoapResponse::text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }

    /// `GET` sur l'URL du service : découverte ou page de présentation.
    pub async fn handle_get(&self, request: SoapRequest) -> SoapResponse {
        if !self.options.protocols.contains(Protocols::DOCUMENTATION) {
            return SoapResponse::text(StatusCode::NOT_FOUND, "Service documentation is disabled.");
        }

        if let Some(query) = request.query.as_deref().filter(|q| !q.is_empty()) {
            let Some(kind) = DiscoveryRequest::from_query(query) else {
                return SoapResponse::text(
                    StatusCode::BAD_REQUEST,
                    format!("Request format is unrecognized: '{}'.", query),
                );
            };
            let documents = match self.discovery_documents(&request.url) {
                Ok(documents) => documents,
                Err(e) => return SoapResponse::text(StatusCode::INTERNAL_SERVER_ERROR, e),
            };
            return match documents.document(&kind, &request.url) {
                Some(text) => SoapResponse::xml(StatusCode::OK, text.into_bytes()),
                None => SoapResponse::text(StatusCode::NOT_FOUND, format!("Unknown document {:?}.", kind)),
            };
        }

        match self.server_type(&request.url) {
            Ok(server_type) => {
                let http_type = self.http_server_type(&request.url);
                SoapResponse::html(documentation::render(&server_type, &http_type, &request.url))
            }
            Err(e) => SoapResponse::text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }

    /// `GET`/`POST` sur `{service}/{name}`.
    pub async fn handle_http(&self, name: &str, request: SoapRequest) -> SoapResponse {
        let service_url = request
            .url
            .strip_suffix(&format!("/{}", name))
            .unwrap_or(&request.url)
            .to_string();
        self.http_server_type(&service_url)
            .handle(self.options.protocols, name, &request)
            .await
    }
}
