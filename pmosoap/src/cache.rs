//! # Cache des métadonnées de protocole
//!
//! Les types serveur et client (méthodes réfléchies, tables de routage,
//! documents de découverte) sont construits une seule fois par service et
//! partagés par tous les appels.
//!
//! ## Fonctionnalités
//!
//! - ✅ Construction unique sous verrou (single flight)
//! - ✅ Lecture concurrente via `RwLock`
//! - ✅ Clé avec URL complète, puis clé sans schéma/hôte/port
//! - ✅ Compteur de pression : au-delà du seuil, les insertions se font
//!   sans l'URL pour ne plus multiplier les entrées

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

/// Seuil de pression par défaut.
pub const DEFAULT_PRESSURE_THRESHOLD: usize = 10;

static METADATA_CACHE: Lazy<MetadataCache> = Lazy::new(MetadataCache::default);

/// Cache partagé par tout le processus.
pub fn get_metadata_cache() -> &'static MetadataCache {
    &METADATA_CACHE
}

/// Famille de métadonnées rangées dans le cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    SoapServer,
    SoapClient,
    HttpServer,
    Discovery,
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolKind::SoapServer => "soap-server",
            ProtocolKind::SoapClient => "soap-client",
            ProtocolKind::HttpServer => "http-server",
            ProtocolKind::Discovery => "discovery",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    kind: ProtocolKind,
    type_name: String,
    /// `None` : entrée valable quel que soit l'hôte
    location: Option<String>,
}

type Entry = Arc<dyn Any + Send + Sync>;

/// Cache de métadonnées avec construction unique.
pub struct MetadataCache {
    entries: RwLock<HashMap<CacheKey, Entry>>,
    pressure: RwLock<HashMap<(ProtocolKind, String), AtomicUsize>>,
    construction: Mutex<()>,
    threshold: AtomicUsize,
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(DEFAULT_PRESSURE_THRESHOLD)
    }
}

impl MetadataCache {
    pub fn new(threshold: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            pressure: RwLock::new(HashMap::new()),
            construction: Mutex::new(()),
            threshold: AtomicUsize::new(threshold),
        }
    }

    pub fn pressure_threshold(&self) -> usize {
        self.threshold.load(Ordering::Relaxed)
    }

    pub fn set_pressure_threshold(&self, threshold: usize) {
        info!("🗄️ Seuil de pression du cache : {}", threshold);
        self.threshold.store(threshold, Ordering::Relaxed);
    }

    /// Cherche une entrée : URL complète d'abord, puis clé sans URL.
    pub fn get<T: Any + Send + Sync>(
        &self,
        kind: ProtocolKind,
        type_name: &str,
        location: &str,
    ) -> Option<Arc<T>> {
        let entries = self.entries.read();
        let full = CacheKey {
            kind,
            type_name: type_name.to_string(),
            location: Some(location.to_string()),
        };
        let any = CacheKey {
            location: None,
            ..full.clone()
        };
        entries
            .get(&full)
            .or_else(|| entries.get(&any))
            .cloned()
            .and_then(|e| e.downcast::<T>().ok())
    }

    /// Vrai quand le nombre d'insertions pour ce type a atteint le seuil.
    pub fn is_under_pressure(&self, kind: ProtocolKind, type_name: &str) -> bool {
        self.pressure
            .read()
            .get(&(kind, type_name.to_string()))
            .is_some_and(|c| c.load(Ordering::Relaxed) >= self.pressure_threshold())
    }

    /// Renvoie l'entrée existante ou la construit une seule fois.
    ///
    /// `build` reçoit `true` si l'entrée sera rangée sans l'URL (cache sous
    /// pression) : elle doit alors rester valable pour tout hôte.
    pub fn get_or_build<T, E, F>(
        &self,
        kind: ProtocolKind,
        type_name: &str,
        location: &str,
        build: F,
    ) -> Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        F: FnOnce(bool) -> Result<T, E>,
    {
        if let Some(found) = self.get::<T>(kind, type_name, location) {
            return Ok(found);
        }

        let _guard = self.construction.lock();
        if let Some(found) = self.get::<T>(kind, type_name, location) {
            return Ok(found);
        }

        let host_independent = self.is_under_pressure(kind, type_name);
        let value = Arc::new(build(host_independent)?);
        let key = CacheKey {
            kind,
            type_name: type_name.to_string(),
            location: (!host_independent).then(|| location.to_string()),
        };
        debug!(
            "🗄️ Cache {} {} ({})",
            kind,
            type_name,
            key.location.as_deref().unwrap_or("*")
        );
        self.entries.write().insert(key, value.clone());
        self.pressure
            .write()
            .entry((kind, type_name.to_string()))
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    /// Renvoie l'entrée d'un type, valable pour toute URL, ou la construit
    /// une seule fois.
    pub fn get_or_build_for_type<T, E, F>(
        &self,
        kind: ProtocolKind,
        type_name: &str,
        build: F,
    ) -> Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T, E>,
    {
        let key = CacheKey {
            kind,
            type_name: type_name.to_string(),
            location: None,
        };
        let lookup = || {
            self.entries
                .read()
                .get(&key)
                .cloned()
                .and_then(|e| e.downcast::<T>().ok())
        };
        if let Some(found) = lookup() {
            return Ok(found);
        }

        let _guard = self.construction.lock();
        if let Some(found) = lookup() {
            return Ok(found);
        }

        let value = Arc::new(build()?);
        debug!("🗄️ Cache {} {} (*)", kind, type_name);
        self.entries.write().insert(key.clone(), value.clone());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        let _guard = self.construction.lock();
        self.entries.write().clear();
        self.pressure.write().clear();
    }
}

impl fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataCache")
            .field("entries", &self.len())
            .field("threshold", &self.pressure_threshold())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[test]
    fn test_type_entry_ignores_location() {
        let cache = MetadataCache::new(10);
        let mut calls = 0;
        let a: Arc<String> = cache
            .get_or_build_for_type(ProtocolKind::SoapClient, "Calc", || {
                calls += 1;
                Ok::<_, Infallible>("meta".to_string())
            })
            .unwrap();
        let b: Arc<String> = cache
            .get_or_build_for_type(ProtocolKind::SoapClient, "Calc", || {
                calls += 1;
                Ok::<_, Infallible>("other".to_string())
            })
            .unwrap();
        assert_eq!(calls, 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        // Visible aussi par une recherche avec URL
        let c = cache.get::<String>(ProtocolKind::SoapClient, "Calc", "http://other/calc");
        assert!(c.is_some_and(|c| Arc::ptr_eq(&a, &c)));
    }

    #[test]
    fn test_build_once() {
        let cache = MetadataCache::new(10);
        let mut calls = 0;
        let a: Arc<String> = cache
            .get_or_build(ProtocolKind::SoapServer, "Calc", "http://h/calc", |_| {
                calls += 1;
                Ok::<_, Infallible>("meta".to_string())
            })
            .unwrap();
        let b: Arc<String> = cache
            .get_or_build(ProtocolKind::SoapServer, "Calc", "http://h/calc", |_| {
                Ok::<_, Infallible>("other".to_string())
            })
            .unwrap();
        assert_eq!(calls, 1);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_pressure_switches_to_host_independent_key() {
        let cache = MetadataCache::new(2);
        for host in ["a", "b"] {
            let _: Arc<u32> = cache
                .get_or_build(ProtocolKind::SoapServer, "T", &format!("http://{}/s", host), |any| {
                    assert!(!any);
                    Ok::<_, Infallible>(1)
                })
                .unwrap();
        }
        assert!(cache.is_under_pressure(ProtocolKind::SoapServer, "T"));

        let _: Arc<u32> = cache
            .get_or_build(ProtocolKind::SoapServer, "T", "http://c/s", |any| {
                assert!(any);
                Ok::<_, Infallible>(3)
            })
            .unwrap();
        // Toute autre URL retombe sur l'entrée sans hôte
        assert_eq!(
            cache.get::<u32>(ProtocolKind::SoapServer, "T", "http://d/s").as_deref(),
            Some(&3)
        );
        assert_eq!(
            cache.get::<u32>(ProtocolKind::SoapServer, "T", "http://a/s").as_deref(),
            Some(&1)
        );
        assert!(!cache.is_under_pressure(ProtocolKind::SoapClient, "T"));
    }

    #[test]
    fn test_build_error_is_not_cached() {
        let cache = MetadataCache::default();
        let r: Result<Arc<u8>, &str> =
            cache.get_or_build(ProtocolKind::Discovery, "T", "u", |_| Err("boom"));
        assert_eq!(r.unwrap_err(), "boom");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_single_flight_across_threads() {
        let cache = Arc::new(MetadataCache::default());
        let built = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let built = built.clone();
                std::thread::spawn(move || {
                    let _: Arc<u64> = cache
                        .get_or_build(ProtocolKind::SoapClient, "P", "x", |_| {
                            built.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, Infallible>(7)
                        })
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }
}
