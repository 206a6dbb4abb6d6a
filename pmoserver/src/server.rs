//! # Module Server - API de haut niveau pour Axum
//!
//! Ce module fournit une abstraction simple pour héberger des services HTTP
//! avec Axum, en cachant la configuration du routage.
//!
//! ## Fonctionnalités
//!
//! - 🚀 **Routes JSON simples** : Ajoutez des endpoints API avec `add_route()`
//! - 🧩 **Sous-routeurs** : Montez un service complet avec `add_router()`
//! - 🔀 **Redirections** : Redirigez des routes avec `add_redirect()`
//! - 🔧 **Niveau de log à chaud** : `/api/log_setup` via `init_logging()`
//! - ⚡ **Gestion gracieuse** : Arrêt propre sur Ctrl+C

use crate::logs::{LogState, LoggingOptions, create_logs_router, init_logging};
use anyhow::Result;
use axum::response::Redirect;
use axum::routing::get;
use axum::{Json, Router};
use pmoconfig::get_config;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{
    signal,
    sync::RwLock,
    task::{AbortHandle, JoinHandle},
};
use tracing::{error, info};

/// Info serveur sérialisable
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub base_url: String,
    pub http_port: u16,
}

/// Serveur principal
pub struct Server {
    name: String,
    base_url: String,
    http_port: u16,
    router: Arc<RwLock<Router>>,
    join_handle: Option<JoinHandle<()>>,
    server_abort: Option<AbortHandle>,
    local_addr: Option<SocketAddr>,
    log_state: Option<LogState>,
}

impl Server {
    /// Crée une nouvelle instance de serveur
    ///
    /// # Arguments
    ///
    /// * `name` - Nom du serveur (pour les logs)
    /// * `base_url` - URL de base (ex: "http://localhost:3000")
    /// * `http_port` - Port HTTP à écouter, 0 pour un port libre
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
            router: Arc::new(RwLock::new(Router::new())),
            join_handle: None,
            server_abort: None,
            local_addr: None,
            log_state: None,
        }
    }

    pub fn new_configured() -> Self {
        let config = get_config();
        Self::new("PMO-SOAP-Server", config.get_base_url(), config.get_http_port())
    }

    async fn mount(&mut self, path: &str, route: Router) {
        let mut r = self.router.write().await;
        *r = if path == "/" {
            std::mem::take(&mut *r).merge(route)
        } else {
            let normalized = format!("/{}", path.trim_matches('/'));
            std::mem::take(&mut *r).nest(&normalized, route)
        };
    }

    /// Ajoute une route JSON dynamique
    ///
    /// ```rust,no_run
    /// # use pmoserver::Server;
    /// # #[tokio::main]
    /// # async fn main() {
    /// # let mut server = Server::new("Test", "http://localhost:3000", 3000);
    /// server.add_route("/api/status", || async {
    ///     serde_json::json!({ "status": "online" })
    /// }).await;
    /// # }
    /// ```
    pub async fn add_route<F, Fut, T>(&mut self, path: &str, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let f = Arc::new(f);
        let handler = move || {
            let f = f.clone();
            async move { Json(f().await) }
        };
        self.mount(path, Router::new().route("/", get(handler))).await;
    }

    /// Ajoute un sous-router au serveur
    ///
    /// - Si `path` est "/", merge directement au router principal
    /// - Sinon, nest le router sous le chemin donné
    pub async fn add_router(&mut self, path: &str, sub_router: Router) {
        info!("🧩 Routes montées sous {}", path);
        self.mount(path, sub_router).await;
    }

    /// Redirige `from` vers `to` (308)
    pub async fn add_redirect(&mut self, from: &str, to: &str) {
        let target = to.to_string();
        let route = Router::new().route(
            "/",
            get(move || {
                let target = target.clone();
                async move { Redirect::permanent(&target) }
            }),
        );
        self.mount(from, route).await;
    }

    /// Démarre le serveur HTTP
    ///
    /// Le port est réservé avant le retour ; l'adresse effective est rendue
    /// (utile avec le port 0). Ctrl+C arrête le serveur.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.http_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("📡 Server {} running at {} ({})", self.name, self.base_url, local_addr);

        let router = self.router.read().await.clone();
        let server_task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router.into_make_service()).await {
                error!("❌ HTTP server stopped: {}", e);
            }
        });

        self.server_abort = Some(server_task.abort_handle());

        let shutdown_task = tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => info!("Ctrl+C reçu, arrêt gracieux"),
                Err(e) => {
                    error!("❌ failed to listen for ctrl_c: {}", e);
                    std::future::pending::<()>().await
                }
            }
        });

        self.join_handle = Some(tokio::spawn(async move {
            tokio::select! {
                _ = server_task => {},
                _ = shutdown_task => {},
            }
        }));
        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    /// Attend la fin du serveur
    pub async fn wait(&mut self) {
        if let Some(h) = self.join_handle.take() {
            let _ = h.await;
        }
    }

    /// Arrête le serveur sans attendre Ctrl+C
    pub fn stop(&mut self) {
        if let Some(h) = self.server_abort.take() {
            h.abort();
        }
        if let Some(h) = self.join_handle.take() {
            h.abort();
        }
    }

    /// Adresse d'écoute une fois démarré
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Récupère les infos du serveur
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            name: self.name.clone(),
            base_url: self.base_url.clone(),
            http_port: self.http_port,
        }
    }

    pub fn log_state(&self) -> Option<&LogState> {
        self.log_state.as_ref()
    }

    /// Initialise le logging et enregistre `/api/log_setup`
    pub async fn init_logging(&mut self, options: LoggingOptions) {
        let log_state = init_logging(options);
        self.mount("/api", create_logs_router(log_state.clone())).await;
        self.log_state = Some(log_state);
    }
}

/// Builder pattern
pub struct ServerBuilder {
    name: String,
    base_url: String,
    http_port: u16,
}

impl ServerBuilder {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
        }
    }

    pub fn new_configured() -> Self {
        let config = get_config();
        Self {
            name: "PMO-SOAP-Server".to_string(),
            base_url: config.get_base_url(),
            http_port: config.get_http_port(),
        }
    }

    /// Construit le serveur
    pub fn build(self) -> Server {
        Server::new(self.name, self.base_url, self.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_routes_are_served() {
        let mut server = ServerBuilder::new("Test", "http://localhost", 0).build();
        server
            .add_route("/api/status", || async { serde_json::json!({ "status": "ok" }) })
            .await;
        server
            .add_router("/echo", Router::new().route("/", get(|| async { "echo" })))
            .await;
        let addr = server.start().await.unwrap();
        let base = format!("http://127.0.0.1:{}", addr.port());

        let status = reqwest::get(format!("{}/api/status", base))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        let status: serde_json::Value = serde_json::from_str(&status).unwrap();
        assert_eq!(status["status"], "ok");

        let echo = reqwest::get(format!("{}/echo", base)).await.unwrap().text().await.unwrap();
        assert_eq!(echo, "echo");
        server.stop();
    }

    #[test]
    fn test_info() {
        let server = Server::new("Info", "http://h:1", 1);
        let info = server.info();
        assert_eq!(info.name, "Info");
        assert_eq!(info.http_port, 1);
        assert!(server.local_addr().is_none());
    }
}
