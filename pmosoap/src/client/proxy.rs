//! Proxy SOAP sur HTTP.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::call::ClientCall;
use super::transport::{OutboundRequest, send_async, send_blocking};
use super::{ClientError, ClientOptions, SoapClientType};
use crate::cache::{MetadataCache, ProtocolKind, get_metadata_cache};
use crate::headers::HeaderSlots;
use crate::reflection::ServiceDescriptor;
use crate::soap::SoapVersion;
use crate::values::Value;

/// Proxy d'un service distant.
///
/// Les membres d'en-tête ([`SoapHttpClient::headers`]) fournissent les
/// en-têtes envoyés et reçoivent ceux de la réponse.
pub struct SoapHttpClient {
    url: String,
    client_type: Arc<SoapClientType>,
    options: ClientOptions,
    headers: HeaderSlots,
    http: reqwest::Client,
    agent: ureq::Agent,
    cancel: Mutex<CancellationToken>,
    abort_tx: Sender<()>,
    abort_rx: Receiver<()>,
}

impl std::fmt::Debug for SoapHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoapHttpClient")
            .field("url", &self.url)
            .field("options", &self.options)
            .finish()
    }
}

impl SoapHttpClient {
    pub fn new(
        descriptor: Arc<ServiceDescriptor>,
        url: &str,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        Self::with_cache(descriptor, url, options, get_metadata_cache())
    }

    pub fn with_cache(
        descriptor: Arc<ServiceDescriptor>,
        url: &str,
        options: ClientOptions,
        cache: &MetadataCache,
    ) -> Result<Self, ClientError> {
        // Une entrée par type de proxy, quelle que soit l'URL
        let client_type =
            cache.get_or_build_for_type(ProtocolKind::SoapClient, descriptor.type_name(), || {
                SoapClientType::new(descriptor.clone())
            })?;

        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()?;
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(options.timeout))
            .http_status_as_error(false)
            .build()
            .into();
        let (abort_tx, abort_rx) = crossbeam_channel::bounded(1);

        info!("🔌 Client {} → {} ({})", descriptor.name(), url, options.version);
        Ok(Self {
            url: url.to_string(),
            client_type,
            options,
            headers: HeaderSlots::new(),
            http,
            agent,
            cancel: Mutex::new(CancellationToken::new()),
            abort_tx,
            abort_rx,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: &str) {
        self.url = url.to_string();
    }

    pub fn version(&self) -> SoapVersion {
        self.options.version
    }

    pub fn client_type(&self) -> &Arc<SoapClientType> {
        &self.client_type
    }

    /// Membres d'en-tête du proxy.
    pub fn headers(&self) -> &HeaderSlots {
        &self.headers
    }

    fn start(&self, name: &str, values: Vec<Value>) -> Result<(ClientCall, OutboundRequest), ClientError> {
        let method = self
            .client_type
            .method(name)
            .cloned()
            .ok_or_else(|| ClientError::UnknownMethod(name.to_string()))?;
        let mut call = ClientCall::new(&self.client_type, method, self.options.version, &self.url);
        let request = call.serialize(values, &self.headers)?;
        Ok((call, request))
    }

    /// Appelle une opération ; rend la valeur de retour (si elle existe)
    /// suivie des paramètres `out`.
    pub async fn invoke(&self, name: &str, values: Vec<Value>) -> Result<Vec<Value>, ClientError> {
        let token = {
            let mut cancel = self.cancel.lock();
            if cancel.is_cancelled() {
                *cancel = CancellationToken::new();
            }
            cancel.clone()
        };
        let (call, request) = self.start(name, values)?;
        let response = send_async(&self.http, request, token).await?;
        call.deserialize(response, &self.headers)
    }

    /// Variante bloquante de [`SoapHttpClient::invoke`].
    pub fn invoke_blocking(&self, name: &str, values: Vec<Value>) -> Result<Vec<Value>, ClientError> {
        while self.abort_rx.try_recv().is_ok() {}
        let (call, request) = self.start(name, values)?;
        let response = send_blocking(&self.agent, request, &self.abort_rx)?;
        call.deserialize(response, &self.headers)
    }

    /// Interrompt l'appel en cours, qui se termine par
    /// [`ClientError::Aborted`].
    pub fn abort(&self) {
        debug!("🛑 Interruption demandée ({})", self.url);
        self.cancel.lock().cancel();
        let _ = self.abort_tx.try_send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::SoapMethodAttribute;
    use crate::method::MethodDecl;
    use crate::reflection::ServiceBuilder;
    use crate::values::SchemaType;
    use std::time::Duration;

    fn proxy() -> Arc<ServiceDescriptor> {
        ServiceBuilder::new("Slow")
            .method(
                MethodDecl::new("Slow", "Wait")
                    .returns(SchemaType::Int)
                    .soap(SoapMethodAttribute::document()),
            )
            .build()
            .unwrap()
    }

    /// Serveur qui accepte la connexion sans jamais répondre.
    async fn silent_server() -> (String, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/slow", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut sockets = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                sockets.push(socket);
            }
        });
        (url, handle)
    }

    #[test]
    fn test_client_type_cached_per_proxy_type() {
        let cache = MetadataCache::new(2);
        let urls = ["http://a/slow", "http://b:8080/slow", "https://c/slow", "http://d/slow"];
        let clients: Vec<_> = urls
            .iter()
            .map(|url| SoapHttpClient::with_cache(proxy(), url, ClientOptions::default(), &cache).unwrap())
            .collect();

        assert_eq!(cache.len(), 1);
        assert!(
            clients
                .iter()
                .all(|c| Arc::ptr_eq(c.client_type(), clients[0].client_type()))
        );
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let client = SoapHttpClient::new(proxy(), "http://127.0.0.1:9/slow", ClientOptions::default()).unwrap();
        let err = client.invoke("Nope", vec![]).await.unwrap_err();
        assert!(matches!(err, ClientError::UnknownMethod(ref n) if n == "Nope"));
    }

    #[tokio::test]
    async fn test_abort_async_call() {
        let (url, server) = silent_server().await;
        let client = Arc::new(SoapHttpClient::new(proxy(), &url, ClientOptions::default()).unwrap());

        let aborter = client.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            aborter.abort();
        });
        let err = client.invoke("Wait", vec![]).await.unwrap_err();
        assert!(matches!(err, ClientError::Aborted));
        server.abort();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_abort_blocking_call() {
        let (url, server) = silent_server().await;
        let client = Arc::new(SoapHttpClient::new(proxy(), &url, ClientOptions::default()).unwrap());

        let caller = client.clone();
        let call = tokio::task::spawn_blocking(move || caller.invoke_blocking("Wait", vec![]));
        tokio::time::sleep(Duration::from_millis(200)).await;
        client.abort();
        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::Aborted));
        server.abort();
    }

    #[tokio::test]
    async fn test_timeout() {
        let (url, server) = silent_server().await;
        let options = ClientOptions::default().with_timeout(Duration::from_millis(200));
        let client = SoapHttpClient::new(proxy(), &url, options).unwrap();
        let err = client.invoke("Wait", vec![]).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout));
        server.abort();
    }
}
