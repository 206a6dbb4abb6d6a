//! Extension SOAP pour pmoserver.
//!
//! `pmoserver::Server` reste agnostique de SOAP ; le trait
//! [`SoapServerExt`] y monte des [`SoapEndpoint`] sous leur chemin public.
//!
//! ```text
//! pmoserver::Server
//!     + SoapServerExt
//!         /calc        → SOAP, découverte, documentation
//!         /calc/{m}    → HTTP GET / POST
//! ```

use std::sync::Arc;

use pmoconfig::get_config;
use pmoserver::Server;
use tracing::info;

use crate::config_ext::SoapConfigExt;
use crate::errors::ConfigError;
use crate::reflection::ServiceDescriptor;
use crate::server::{ServerOptions, SoapEndpoint, router};

/// Publication de services SOAP sur un serveur HTTP.
///
/// # Examples
///
/// ```rust,ignore
/// use pmosoap::SoapServerExt;
/// use pmoserver::ServerBuilder;
///
/// let mut server = ServerBuilder::new_configured().build();
/// server.register_soap_service("/calc", calculator()).await?;
/// server.start().await?;
/// ```
pub trait SoapServerExt {
    /// Monte un point d'accès déjà construit.
    async fn add_soap_endpoint(&mut self, path: &str, endpoint: Arc<SoapEndpoint>);

    /// Construit le point d'accès avec les réglages `soap.*` de la
    /// configuration globale puis le monte.
    async fn register_soap_service(
        &mut self,
        path: &str,
        descriptor: Arc<ServiceDescriptor>,
    ) -> Result<Arc<SoapEndpoint>, ConfigError>;
}

impl SoapServerExt for Server {
    async fn add_soap_endpoint(&mut self, path: &str, endpoint: Arc<SoapEndpoint>) {
        info!("📡 Service SOAP {} monté sous {}", endpoint.descriptor().name(), path);
        self.add_router(path, router(endpoint)).await;
    }

    async fn register_soap_service(
        &mut self,
        path: &str,
        descriptor: Arc<ServiceDescriptor>,
    ) -> Result<Arc<SoapEndpoint>, ConfigError> {
        let options = get_config().soap_server_options().unwrap_or_else(|e| {
            tracing::warn!("⚠️ Configuration SOAP invalide ({}), réglages par défaut", e);
            ServerOptions::default()
        });
        let endpoint = Arc::new(SoapEndpoint::new(descriptor, options)?);
        self.add_soap_endpoint(path, endpoint.clone()).await;
        Ok(endpoint)
    }
}
