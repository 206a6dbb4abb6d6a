//! Métadonnées serveur d'un service : méthodes liées à leurs handlers et
//! extensions, tables de routage.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::ConfigError;
use crate::extensions::{BoundExtension, ExtensionTarget, get_extension_registry};
use crate::handler::OperationHandler;
use crate::reflection::{ReflectedService, Route, ServiceDescriptor, SoapReflectedMethod};
use crate::soap::Protocols;
use crate::xml::QName;

/// Méthode prête à être servie.
pub struct SoapServerMethod {
    pub reflected: Arc<SoapReflectedMethod>,
    pub handler: OperationHandler,
    /// Extensions de la méthode puis globales de basse priorité
    pub extensions: Vec<BoundExtension>,
}

impl std::fmt::Debug for SoapServerMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoapServerMethod")
            .field("name", &self.reflected.name)
            .field("action", &self.reflected.action)
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

/// Métadonnées serveur, construites une fois puis mises en cache.
#[derive(Debug)]
pub struct SoapServerType {
    service: ReflectedService,
    methods: HashMap<String, Arc<SoapServerMethod>>,
    /// Extensions globales de haute priorité, liées au service
    high_extensions: Vec<BoundExtension>,
    protocols: Protocols,
}

impl SoapServerType {
    pub fn new(descriptor: Arc<ServiceDescriptor>, protocols: Protocols) -> Result<Self, ConfigError> {
        let service = ReflectedService::reflect(descriptor.clone(), false)?;
        let registry = get_extension_registry();
        let low = registry.low();

        let mut methods = HashMap::new();
        for reflected in service.methods() {
            let handler = descriptor
                .handler(&reflected.method)
                .cloned()
                .ok_or_else(|| ConfigError::MissingHandler(reflected.method.name().to_string()))?;
            let target = ExtensionTarget::Method {
                service: descriptor.name(),
                method: &reflected.method,
            };
            let mut extensions = BoundExtension::bind_all(&reflected.extensions, target);
            extensions.extend(BoundExtension::bind_all(&low, target));
            debug!("🔗 {} → {}", reflected.action, reflected.name);
            methods.insert(
                reflected.name.clone(),
                Arc::new(SoapServerMethod {
                    reflected: reflected.clone(),
                    handler,
                    extensions,
                }),
            );
        }

        let high_extensions =
            BoundExtension::bind_all(&registry.high(), ExtensionTarget::Service(descriptor.name()));

        info!(
            "✅ Type serveur {} prêt ({} opérations, {:?})",
            descriptor.name(),
            methods.len(),
            protocols.names()
        );
        Ok(Self {
            service,
            methods,
            high_extensions,
            protocols,
        })
    }

    pub fn descriptor(&self) -> &Arc<ServiceDescriptor> {
        self.service.descriptor()
    }

    pub fn service(&self) -> &ReflectedService {
        &self.service
    }

    pub fn protocols(&self) -> Protocols {
        self.protocols
    }

    pub fn high_extensions(&self) -> &[BoundExtension] {
        &self.high_extensions
    }

    /// Méthode par nom de message.
    pub fn method(&self, name: &str) -> Option<&Arc<SoapServerMethod>> {
        self.methods.get(name)
    }

    /// Méthodes dans l'ordre de déclaration.
    pub fn methods(&self) -> Vec<Arc<SoapServerMethod>> {
        self.service
            .methods()
            .iter()
            .filter_map(|m| self.methods.get(&m.name).cloned())
            .collect()
    }

    pub fn by_action(&self, action: &str) -> ServerRoute {
        self.bind_route(self.service.routing().by_action(action))
    }

    pub fn by_request_element(&self, element: &QName) -> ServerRoute {
        self.bind_route(self.service.routing().by_request_element(element))
    }

    fn bind_route(&self, route: Route) -> ServerRoute {
        match route {
            Route::Found(m) => match self.methods.get(&m.name) {
                Some(method) => ServerRoute::Found(method.clone()),
                None => ServerRoute::NotFound,
            },
            Route::Ambiguous => ServerRoute::Ambiguous,
            Route::NotFound => ServerRoute::NotFound,
        }
    }
}

/// Résultat d'un routage côté serveur.
#[derive(Debug, Clone)]
pub enum ServerRoute {
    Found(Arc<SoapServerMethod>),
    Ambiguous,
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{
        SoapBindingUse, SoapParameterStyle, SoapServiceAttribute, SoapServiceRoutingStyle,
        WebMethodAttribute,
    };
    use crate::method::MethodDecl;
    use crate::operation_handler;
    use crate::reflection::ServiceBuilder;
    use crate::values::{SchemaType, Value};

    fn echo() -> OperationHandler {
        operation_handler!(|instance, args| { Ok(args.into_values()) })
    }

    #[test]
    fn test_duplicate_default_action_is_fatal() {
        // Même nom de message via MessageName : même action par défaut
        let a = MethodDecl::new("S", "Ping");
        let b = MethodDecl::new("S", "Ping2").web_method(WebMethodAttribute {
            message_name: Some("Ping".into()),
            ..Default::default()
        });
        let service = ServiceBuilder::new("S")
            .operation(a, echo())
            .operation(b, echo())
            .build()
            .unwrap();
        let err = SoapServerType::new(service, Protocols::ALL).unwrap_err();
        match err {
            ConfigError::BindingAmbiguity { first, second, .. } => {
                assert_eq!(first, "Ping");
                assert_eq!(second, "Ping2");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_handler() {
        let service = ServiceBuilder::new("S")
            .method(MethodDecl::new("S", "Lonely"))
            .build()
            .unwrap();
        assert_eq!(
            SoapServerType::new(service, Protocols::ALL).unwrap_err(),
            ConfigError::MissingHandler("Lonely".into())
        );
    }

    #[test]
    fn test_routes() {
        let service = ServiceBuilder::new("S")
            .soap_service(
                SoapServiceAttribute::document(SoapBindingUse::Literal, SoapParameterStyle::Wrapped)
                    .routed_by(SoapServiceRoutingStyle::RequestElement),
            )
            .operation(
                MethodDecl::new("S", "Add").param("a", SchemaType::Int).returns(SchemaType::Int),
                operation_handler!(|instance, args| { Ok(vec![Value::Int(args.int("a")?)]) }),
            )
            .build()
            .unwrap();
        let server_type = SoapServerType::new(service, Protocols::ALL).unwrap();
        assert!(matches!(
            server_type.by_request_element(&QName::new("http://tempuri.org/", "Add")),
            ServerRoute::Found(m) if m.reflected.name == "Add"
        ));
        assert!(matches!(
            server_type.by_action("http://tempuri.org/Add"),
            ServerRoute::Found(_)
        ));
        assert!(matches!(server_type.by_action("nope"), ServerRoute::NotFound));
        assert_eq!(server_type.methods().len(), 1);
    }
}
