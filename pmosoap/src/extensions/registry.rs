//! Registre des extensions globales.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::info;

use crate::attributes::SoapExtensionAttribute;
use crate::errors::ConfigError;

static EXTENSION_REGISTRY: Lazy<ExtensionRegistry> = Lazy::new(ExtensionRegistry::new);

/// Registre partagé par tout le processus.
pub fn get_extension_registry() -> &'static ExtensionRegistry {
    &EXTENSION_REGISTRY
}

/// Trie par priorité croissante (tri stable) et refuse les priorités négatives.
pub fn sort_extensions(
    extensions: &[SoapExtensionAttribute],
) -> Result<Vec<SoapExtensionAttribute>, ConfigError> {
    if let Some(bad) = extensions.iter().find(|e| e.priority < 0) {
        return Err(ConfigError::NegativePriority {
            extension: bad.factory.name().to_string(),
            priority: bad.priority,
        });
    }
    let mut sorted = extensions.to_vec();
    sorted.sort_by_key(|e| e.priority);
    Ok(sorted)
}

/// Extensions appliquées à toutes les méthodes de tous les services.
///
/// Les extensions de haute priorité passent avant celles des méthodes, les
/// extensions de basse priorité après.
#[derive(Default)]
pub struct ExtensionRegistry {
    high: RwLock<Vec<SoapExtensionAttribute>>,
    low: RwLock<Vec<SoapExtensionAttribute>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_high(&self, extension: SoapExtensionAttribute) -> Result<(), ConfigError> {
        Self::insert(&self.high, extension, "haute")
    }

    pub fn register_low(&self, extension: SoapExtensionAttribute) -> Result<(), ConfigError> {
        Self::insert(&self.low, extension, "basse")
    }

    fn insert(
        set: &RwLock<Vec<SoapExtensionAttribute>>,
        extension: SoapExtensionAttribute,
        level: &str,
    ) -> Result<(), ConfigError> {
        let mut guard = set.write();
        let mut all = guard.clone();
        all.push(extension);
        let sorted = sort_extensions(&all)?;
        if let Some(last) = all.last() {
            info!("🧩 Extension globale {} (priorité {})", last.factory.name(), level);
        }
        *guard = sorted;
        Ok(())
    }

    pub fn high(&self) -> Vec<SoapExtensionAttribute> {
        self.high.read().clone()
    }

    pub fn low(&self) -> Vec<SoapExtensionAttribute> {
        self.low.read().clone()
    }

    pub fn clear(&self) {
        self.high.write().clear();
        self.low.write().clear();
    }
}
