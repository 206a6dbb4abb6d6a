//! Extension pour intégrer la configuration SOAP dans pmoconfig
//!
//! Ce module fournit le trait `SoapConfigExt`, qui ajoute à
//! `pmoconfig::Config` les réglages de la section `soap` :
//!
//! ```yaml
//! soap:
//!   protocols: [HttpSoap, HttpSoap12, HttpGet, HttpPost, Documentation]
//!   routing_style: SoapAction
//!   buffer_response: true
//!   diagnostics:
//!     suppress_fault_detail: false
//!   cache:
//!     pressure_threshold: 10
//!   envelope:
//!     read_timeout_secs: 30
//!   client:
//!     timeout_ms: 100000
//! ```

use std::time::Duration;

use anyhow::{Result, anyhow};
use pmoconfig::Config;
use serde_yaml::{Number, Value};
use tracing::warn;

use crate::attributes::SoapServiceRoutingStyle;
use crate::cache::MetadataCache;
use crate::client::ClientOptions;
use crate::reflection::ServiceBuilder;
use crate::server::ServerOptions;
use crate::soap::Protocols;

const DEFAULT_PRESSURE_THRESHOLD: usize = 10;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CLIENT_TIMEOUT_MS: u64 = 100_000;

/// Trait d'extension pour ajouter la configuration SOAP à pmoconfig
///
/// # Exemple
///
/// ```rust,no_run
/// use pmoconfig::get_config;
/// use pmosoap::SoapConfigExt;
///
/// let config = get_config();
/// let options = config.soap_server_options()?;
/// config.set_soap_buffer_response(false)?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub trait SoapConfigExt {
    /// Protocoles activés (défaut : tous)
    fn get_soap_protocols(&self) -> Result<Protocols>;
    fn set_soap_protocols(&self, protocols: Protocols) -> Result<()>;

    /// Style de routage appliqué aux services sans attribut explicite
    fn get_soap_routing_style(&self) -> Result<SoapServiceRoutingStyle>;
    fn set_soap_routing_style(&self, style: SoapServiceRoutingStyle) -> Result<()>;

    fn get_soap_buffer_response(&self) -> Result<bool>;
    fn set_soap_buffer_response(&self, buffer: bool) -> Result<()>;

    fn get_soap_suppress_fault_detail(&self) -> Result<bool>;
    fn set_soap_suppress_fault_detail(&self, suppress: bool) -> Result<()>;

    /// Nombre de constructions par type au-delà duquel le cache ne tient
    /// plus compte de l'hôte
    fn get_soap_cache_pressure_threshold(&self) -> Result<usize>;
    fn set_soap_cache_pressure_threshold(&self, threshold: usize) -> Result<()>;

    fn get_soap_envelope_read_timeout(&self) -> Result<Duration>;
    fn set_soap_envelope_read_timeout(&self, timeout: Duration) -> Result<()>;

    fn get_soap_client_timeout(&self) -> Result<Duration>;
    fn set_soap_client_timeout(&self, timeout: Duration) -> Result<()>;

    /// Réglages d'un point d'accès tirés de la configuration
    fn soap_server_options(&self) -> Result<ServerOptions> {
        Ok(ServerOptions {
            protocols: self.get_soap_protocols()?,
            buffer_response: self.get_soap_buffer_response()?,
            suppress_fault_detail: self.get_soap_suppress_fault_detail()?,
            read_timeout: Some(self.get_soap_envelope_read_timeout()?),
        })
    }

    /// Réglages client (SOAP 1.1) tirés de la configuration
    fn soap_client_options(&self) -> Result<ClientOptions> {
        Ok(ClientOptions::default().with_timeout(self.get_soap_client_timeout()?))
    }

    /// Builder de service qui suit `soap.routing_style`
    fn soap_service_builder(&self, type_name: &str) -> ServiceBuilder {
        let builder = ServiceBuilder::new(type_name);
        match self.get_soap_routing_style() {
            Ok(style) => builder.default_routing_style(style),
            Err(e) => {
                warn!("⚠️ soap.routing_style ignoré : {}", e);
                builder
            }
        }
    }

    /// Applique le seuil de pression configuré au cache.
    fn apply_soap_cache_settings(&self, cache: &MetadataCache) -> Result<()> {
        cache.set_pressure_threshold(self.get_soap_cache_pressure_threshold()?);
        Ok(())
    }
}

fn as_u64(value: Result<Value>) -> Option<u64> {
    match value {
        Ok(Value::Number(n)) => n.as_u64(),
        Ok(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

impl SoapConfigExt for Config {
    fn get_soap_protocols(&self) -> Result<Protocols> {
        match self.get_value(&["soap", "protocols"]) {
            Ok(Value::Sequence(items)) => {
                let names: Vec<String> = items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                Protocols::from_names(&names).map_err(|e| anyhow!(e))
            }
            Ok(Value::String(s)) => Protocols::from_names(s.split(',')).map_err(|e| anyhow!(e)),
            _ => Ok(Protocols::ALL),
        }
    }

    fn set_soap_protocols(&self, protocols: Protocols) -> Result<()> {
        let names = protocols
            .names()
            .into_iter()
            .map(|n| Value::String(n.to_string()))
            .collect();
        self.set_value(&["soap", "protocols"], Value::Sequence(names))
    }

    fn get_soap_routing_style(&self) -> Result<SoapServiceRoutingStyle> {
        match self.get_value(&["soap", "routing_style"]) {
            Ok(Value::String(s)) => s.parse().map_err(|e: String| anyhow!(e)),
            _ => Ok(SoapServiceRoutingStyle::default()),
        }
    }

    fn set_soap_routing_style(&self, style: SoapServiceRoutingStyle) -> Result<()> {
        let name = match style {
            SoapServiceRoutingStyle::SoapAction => "SoapAction",
            SoapServiceRoutingStyle::RequestElement => "RequestElement",
        };
        self.set_value(&["soap", "routing_style"], Value::String(name.to_string()))
    }

    fn get_soap_buffer_response(&self) -> Result<bool> {
        match self.get_value(&["soap", "buffer_response"]) {
            Ok(Value::Bool(b)) => Ok(b),
            _ => Ok(true),
        }
    }

    fn set_soap_buffer_response(&self, buffer: bool) -> Result<()> {
        self.set_value(&["soap", "buffer_response"], Value::Bool(buffer))
    }

    fn get_soap_suppress_fault_detail(&self) -> Result<bool> {
        match self.get_value(&["soap", "diagnostics", "suppress_fault_detail"]) {
            Ok(Value::Bool(b)) => Ok(b),
            _ => Ok(false),
        }
    }

    fn set_soap_suppress_fault_detail(&self, suppress: bool) -> Result<()> {
        self.set_value(&["soap", "diagnostics", "suppress_fault_detail"], Value::Bool(suppress))
    }

    fn get_soap_cache_pressure_threshold(&self) -> Result<usize> {
        match as_u64(self.get_value(&["soap", "cache", "pressure_threshold"])) {
            Some(0) => {
                warn!("⚠️ soap.cache.pressure_threshold = 0 ignoré, valeur par défaut {}", DEFAULT_PRESSURE_THRESHOLD);
                Ok(DEFAULT_PRESSURE_THRESHOLD)
            }
            Some(n) => Ok(n as usize),
            None => Ok(DEFAULT_PRESSURE_THRESHOLD),
        }
    }

    fn set_soap_cache_pressure_threshold(&self, threshold: usize) -> Result<()> {
        self.set_value(
            &["soap", "cache", "pressure_threshold"],
            Value::Number(Number::from(threshold as u64)),
        )
    }

    fn get_soap_envelope_read_timeout(&self) -> Result<Duration> {
        let secs = as_u64(self.get_value(&["soap", "envelope", "read_timeout_secs"]))
            .unwrap_or(DEFAULT_READ_TIMEOUT_SECS);
        Ok(Duration::from_secs(secs))
    }

    fn set_soap_envelope_read_timeout(&self, timeout: Duration) -> Result<()> {
        self.set_value(
            &["soap", "envelope", "read_timeout_secs"],
            Value::Number(Number::from(timeout.as_secs())),
        )
    }

    fn get_soap_client_timeout(&self) -> Result<Duration> {
        let ms = as_u64(self.get_value(&["soap", "client", "timeout_ms"])).unwrap_or(DEFAULT_CLIENT_TIMEOUT_MS);
        Ok(Duration::from_millis(ms))
    }

    fn set_soap_client_timeout(&self, timeout: Duration) -> Result<()> {
        self.set_value(
            &["soap", "client", "timeout_ms"],
            Value::Number(Number::from(timeout.as_millis() as u64)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_defaults() {
        let (_dir, config) = config();
        assert_eq!(config.get_soap_protocols().unwrap(), Protocols::ALL);
        assert_eq!(config.get_soap_routing_style().unwrap(), SoapServiceRoutingStyle::SoapAction);
        assert_eq!(config.get_soap_cache_pressure_threshold().unwrap(), 10);
        assert_eq!(config.get_soap_client_timeout().unwrap(), Duration::from_secs(100));

        let options = config.soap_server_options().unwrap();
        assert!(options.buffer_response);
        assert!(!options.suppress_fault_detail);
        assert_eq!(options.read_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_set_protocols_and_style() {
        let (_dir, config) = config();
        config
            .set_soap_protocols(Protocols::HTTP_SOAP | Protocols::DOCUMENTATION)
            .unwrap();
        config
            .set_soap_routing_style(SoapServiceRoutingStyle::RequestElement)
            .unwrap();
        config.set_soap_suppress_fault_detail(true).unwrap();

        let options = config.soap_server_options().unwrap();
        assert!(options.protocols.contains(Protocols::HTTP_SOAP));
        assert!(!options.protocols.contains(Protocols::HTTP_SOAP12));
        assert!(options.suppress_fault_detail);
        assert_eq!(
            config.get_soap_routing_style().unwrap(),
            SoapServiceRoutingStyle::RequestElement
        );
    }

    #[test]
    fn test_service_builder_follows_routing_style() {
        let (_dir, config) = config();
        config
            .set_soap_routing_style(SoapServiceRoutingStyle::RequestElement)
            .unwrap();
        let service = config.soap_service_builder("Configured").build().unwrap();
        assert_eq!(
            service.soap_service().routing_style,
            SoapServiceRoutingStyle::RequestElement
        );
    }

    #[test]
    fn test_unknown_protocol_is_an_error() {
        let (_dir, config) = config();
        config
            .set_value(
                &["soap", "protocols"],
                Value::Sequence(vec![Value::String("Ftp".into())]),
            )
            .unwrap();
        assert!(config.get_soap_protocols().is_err());
    }

    #[test]
    fn test_cache_and_client_settings() {
        let (_dir, config) = config();
        config.set_soap_cache_pressure_threshold(3).unwrap();
        config.set_soap_client_timeout(Duration::from_millis(1500)).unwrap();

        let cache = MetadataCache::new(10);
        config.apply_soap_cache_settings(&cache).unwrap();
        assert_eq!(cache.pressure_threshold(), 3);
        assert_eq!(
            config.soap_client_options().unwrap().timeout,
            Duration::from_millis(1500)
        );
    }
}
