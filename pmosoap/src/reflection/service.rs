//! Réflexion d'un service complet et tables de routage.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use super::{ServiceDescriptor, SoapReflectedMethod, reflect_method};
use crate::attributes::SoapServiceRoutingStyle;
use crate::errors::ConfigError;
use crate::xml::QName;

/// Résultat d'une recherche dans une table de routage.
#[derive(Debug, Clone)]
pub enum Route {
    Found(Arc<SoapReflectedMethod>),
    /// Plusieurs méthodes partagent cette clé
    Ambiguous,
    NotFound,
}

/// Tables par action et par élément de requête.
///
/// La clé de routage configurée doit être unique ; l'autre clé peut être
/// partagée, et ses doublons sont notés pour signaler l'ambiguïté.
#[derive(Debug, Default)]
pub struct RoutingTable {
    by_action: HashMap<String, Arc<SoapReflectedMethod>>,
    by_request_element: HashMap<QName, Arc<SoapReflectedMethod>>,
    duplicate_actions: HashSet<String>,
    duplicate_request_elements: HashSet<QName>,
}

impl RoutingTable {
    fn insert(
        &mut self,
        style: SoapServiceRoutingStyle,
        method: &Arc<SoapReflectedMethod>,
    ) -> Result<(), ConfigError> {
        match self.by_action.get(&method.action) {
            Some(first) if style == SoapServiceRoutingStyle::SoapAction => {
                return Err(ConfigError::BindingAmbiguity {
                    kind: "SOAPAction".to_string(),
                    key: method.action.clone(),
                    first: first.method.name().to_string(),
                    second: method.method.name().to_string(),
                });
            }
            Some(_) => {
                self.duplicate_actions.insert(method.action.clone());
            }
            None => {
                self.by_action.insert(method.action.clone(), method.clone());
            }
        }

        let element = method.request_element.clone();
        match self.by_request_element.get(&element) {
            Some(first) if style == SoapServiceRoutingStyle::RequestElement => {
                return Err(ConfigError::BindingAmbiguity {
                    kind: "request element".to_string(),
                    key: element.to_string(),
                    first: first.method.name().to_string(),
                    second: method.method.name().to_string(),
                });
            }
            Some(_) => {
                self.duplicate_request_elements.insert(element);
            }
            None => {
                self.by_request_element.insert(element, method.clone());
            }
        }
        Ok(())
    }

    pub fn by_action(&self, action: &str) -> Route {
        if self.duplicate_actions.contains(action) {
            return Route::Ambiguous;
        }
        match self.by_action.get(action) {
            Some(m) => Route::Found(m.clone()),
            None => Route::NotFound,
        }
    }

    pub fn by_request_element(&self, element: &QName) -> Route {
        if self.duplicate_request_elements.contains(element) {
            return Route::Ambiguous;
        }
        match self.by_request_element.get(element) {
            Some(m) => Route::Found(m.clone()),
            None => Route::NotFound,
        }
    }
}

/// Toutes les opérations réfléchies d'un service, d'un côté donné.
#[derive(Debug)]
pub struct ReflectedService {
    descriptor: Arc<ServiceDescriptor>,
    methods: Vec<Arc<SoapReflectedMethod>>,
    routing: RoutingTable,
    client: bool,
}

impl ReflectedService {
    /// Réfléchit chaque méthode et construit les tables de routage.
    ///
    /// Côté serveur, deux méthodes partageant la clé de routage ou le
    /// même nom de message rendent le service inutilisable.
    pub fn reflect(descriptor: Arc<ServiceDescriptor>, client: bool) -> Result<Self, ConfigError> {
        let style = descriptor.soap_service().routing_style;
        let mut methods = Vec::new();
        let mut routing = RoutingTable::default();
        let mut names: HashSet<String> = HashSet::new();

        for logical in descriptor.methods() {
            let Some(reflected) = reflect_method(&descriptor, logical, client)? else {
                debug!("⏭️ {} ignorée côté client (sans liaison SOAP)", logical.name());
                continue;
            };
            let reflected = Arc::new(reflected);
            if !client {
                routing.insert(style, &reflected).inspect_err(|e| {
                    warn!("⚠️ Service {} : {}", descriptor.type_name(), e);
                })?;
                if !names.insert(reflected.name.clone()) {
                    return Err(ConfigError::DuplicateMessageName(reflected.name.clone()));
                }
            }
            methods.push(reflected);
        }

        Ok(Self {
            descriptor,
            methods,
            routing,
            client,
        })
    }

    pub fn descriptor(&self) -> &Arc<ServiceDescriptor> {
        &self.descriptor
    }

    pub fn methods(&self) -> &[Arc<SoapReflectedMethod>] {
        &self.methods
    }

    pub fn is_client(&self) -> bool {
        self.client
    }

    pub fn routing_style(&self) -> SoapServiceRoutingStyle {
        self.descriptor.soap_service().routing_style
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    /// Méthode par nom de message.
    pub fn method(&self, name: &str) -> Option<&Arc<SoapReflectedMethod>> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Méthode par nom logique (nom déclaré sans `Begin`).
    pub fn method_by_logical_name(&self, name: &str) -> Option<&Arc<SoapReflectedMethod>> {
        self.methods.iter().find(|m| m.method.name() == name)
    }
}
