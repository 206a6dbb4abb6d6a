//! # pmoserver - Serveur web haut niveau basé sur Axum
//!
//! Cette crate héberge les services HTTP de l'espace de travail : les
//! points d'accès SOAP y sont montés comme sous-routeurs.
//!
//! ## Fonctionnalités
//!
//! - 🚀 **API de haut niveau** : Interface simple pour créer des serveurs HTTP avec Axum
//! - 🧩 **Sous-routeurs** : montage d'un service complet sous un chemin
//! - 🔧 **Logs** : subscriber `tracing` avec niveau réglable à chaud
//! - ⚡ **Arrêt gracieux** : Gestion propre de l'arrêt sur Ctrl+C
//!
//! ## Exemple d'utilisation
//!
//! ```rust,no_run
//! use pmoserver::{ServerBuilder, logs::LoggingOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = ServerBuilder::new_configured().build();
//!     server.init_logging(LoggingOptions::from_config()).await;
//!
//!     server.add_route("/api/status", || async {
//!         serde_json::json!({"status": "ok"})
//!     }).await;
//!
//!     server.start().await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

pub mod logs;
pub mod server;

pub use logs::{LogState, LoggingOptions, init_logging};
pub use server::{Server, ServerBuilder, ServerInfo};
