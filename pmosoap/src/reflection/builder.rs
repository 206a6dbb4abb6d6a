//! Enregistrement d'un service : déclarations, handlers et état partagé.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::attributes::{
    SoapBindingStyle, SoapBindingUse, SoapServiceAttribute, SoapServiceRoutingStyle,
    WebServiceAttribute, WebServiceBindingAttribute,
};
use crate::errors::ConfigError;
use crate::handler::OperationHandler;
use crate::headers::HeaderMember;
use crate::method::{LogicalMethod, LogicalMethodTypes, MethodDecl};

/// Description complète d'un service enregistré.
///
/// Construite une fois par [`ServiceBuilder::build`], puis partagée en
/// lecture par le serveur, le client et la découverte.
pub struct ServiceDescriptor {
    type_name: String,
    web_service: WebServiceAttribute,
    soap_service: SoapServiceAttribute,
    bindings: Vec<WebServiceBindingAttribute>,
    members: Vec<HeaderMember>,
    methods: Vec<LogicalMethod>,
    handlers: HashMap<String, OperationHandler>,
    state: Option<Arc<dyn Any + Send + Sync>>,
}

impl ServiceDescriptor {
    /// Nom du type d'implémentation.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Nom publié du service.
    pub fn name(&self) -> &str {
        self.web_service.name.as_deref().unwrap_or(&self.type_name)
    }

    pub fn namespace(&self) -> &str {
        &self.web_service.namespace
    }

    pub fn description(&self) -> &str {
        &self.web_service.description
    }

    pub fn soap_service(&self) -> &SoapServiceAttribute {
        &self.soap_service
    }

    /// Vrai si l'usage par défaut du service est `Encoded`.
    pub fn default_is_encoded(&self) -> bool {
        match self.soap_service.use_ {
            SoapBindingUse::Encoded => true,
            SoapBindingUse::Default => self.soap_service.style == SoapBindingStyle::Rpc,
            SoapBindingUse::Literal => false,
        }
    }

    pub fn bindings(&self) -> &[WebServiceBindingAttribute] {
        &self.bindings
    }

    pub fn binding(&self, name: &str) -> Option<&WebServiceBindingAttribute> {
        self.bindings.iter().find(|b| b.name == name)
    }

    /// Liaison sans nom, appliquée aux méthodes qui n'en désignent aucune.
    pub fn default_binding(&self) -> Option<&WebServiceBindingAttribute> {
        self.bindings.iter().find(|b| b.name.is_empty())
    }

    pub fn members(&self) -> &[HeaderMember] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&HeaderMember> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn methods(&self) -> &[LogicalMethod] {
        &self.methods
    }

    /// Handler d'une méthode, par nom déclaré (`BeginX` pour une paire).
    pub fn handler(&self, method: &LogicalMethod) -> Option<&OperationHandler> {
        self.handlers.get(method.declared_name())
    }

    pub fn state(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.state.clone()
    }
}

impl std::fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("type_name", &self.type_name)
            .field("namespace", &self.web_service.namespace)
            .field("methods", &self.methods.len())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Builder d'un [`ServiceDescriptor`].
///
/// ```rust
/// use pmosoap::operation_handler;
/// use pmosoap::method::MethodDecl;
/// use pmosoap::reflection::ServiceBuilder;
/// use pmosoap::values::{SchemaType, Value};
///
/// let service = ServiceBuilder::new("Calculator")
///     .namespace("http://tempuri.org/")
///     .operation(
///         MethodDecl::new("Calculator", "Add")
///             .param("a", SchemaType::Int)
///             .param("b", SchemaType::Int)
///             .returns(SchemaType::Int),
///         operation_handler!(|instance, args| {
///             Ok(vec![Value::Int(args.int("a")? + args.int("b")?)])
///         }),
///     )
///     .build()
///     .unwrap();
/// assert_eq!(service.methods().len(), 1);
/// ```
#[derive(Clone)]
pub struct ServiceBuilder {
    type_name: String,
    web_service: WebServiceAttribute,
    soap_service: Option<SoapServiceAttribute>,
    bindings: Vec<WebServiceBindingAttribute>,
    members: Vec<HeaderMember>,
    decls: Vec<MethodDecl>,
    handlers: HashMap<String, OperationHandler>,
    state: Option<Arc<dyn Any + Send + Sync>>,
    method_types: LogicalMethodTypes,
    default_routing: Option<SoapServiceRoutingStyle>,
}

impl ServiceBuilder {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            web_service: WebServiceAttribute::default(),
            soap_service: None,
            bindings: Vec::new(),
            members: Vec::new(),
            decls: Vec::new(),
            handlers: HashMap::new(),
            state: None,
            method_types: LogicalMethodTypes::ALL,
            default_routing: None,
        }
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.web_service.namespace = namespace.to_string();
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.web_service.name = Some(name.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.web_service.description = description.to_string();
        self
    }

    pub fn soap_service(mut self, attr: SoapServiceAttribute) -> Self {
        self.soap_service = Some(attr);
        self
    }

    pub fn binding(mut self, attr: WebServiceBindingAttribute) -> Self {
        self.bindings.push(attr);
        self
    }

    pub fn header_member(mut self, member: HeaderMember) -> Self {
        self.members.push(member);
        self
    }

    /// Déclare une méthode sans handler (proxy client, ou `EndX` d'une paire).
    pub fn method(mut self, decl: MethodDecl) -> Self {
        self.decls.push(decl);
        self
    }

    /// Déclare une opération et son handler.
    pub fn operation(mut self, decl: MethodDecl, handler: OperationHandler) -> Self {
        self.handlers.insert(decl.name.clone(), handler);
        self.decls.push(decl);
        self
    }

    pub fn state<T: Any + Send + Sync>(mut self, state: Arc<T>) -> Self {
        self.state = Some(state);
        self
    }

    /// Formes de méthodes retenues (synchrones, paires asynchrones).
    pub fn method_types(mut self, types: LogicalMethodTypes) -> Self {
        self.method_types = types;
        self
    }

    /// Style de routage retenu quand aucun [`SoapServiceAttribute`] n'est
    /// déclaré (valeur de configuration `soap.routing_style`).
    pub fn default_routing_style(mut self, style: SoapServiceRoutingStyle) -> Self {
        self.default_routing = Some(style);
        self
    }

    pub fn build(self) -> Result<Arc<ServiceDescriptor>, ConfigError> {
        let methods = LogicalMethod::create(&self.decls, self.method_types)?;
        info!(
            "📋 Service {} enregistré ({} méthodes, ns={})",
            self.type_name,
            methods.len(),
            self.web_service.namespace
        );
        Ok(Arc::new(ServiceDescriptor {
            type_name: self.type_name,
            web_service: self.web_service,
            soap_service: self.soap_service.unwrap_or_else(|| SoapServiceAttribute {
                routing_style: self.default_routing.unwrap_or_default(),
                ..Default::default()
            }),
            bindings: self.bindings,
            members: self.members,
            methods,
            handlers: self.handlers,
            state: self.state,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation_handler;
    use crate::values::{SchemaType, Value};

    #[test]
    fn test_build_descriptor() {
        let service = ServiceBuilder::new("CalculatorImpl")
            .name("Calculator")
            .namespace("urn:calc")
            .description("Additions")
            .operation(
                MethodDecl::new("CalculatorImpl", "Add").returns(SchemaType::Int),
                operation_handler!(|instance, args| { Ok(vec![Value::Int(1)]) }),
            )
            .state(Arc::new(String::from("shared")))
            .build()
            .unwrap();

        assert_eq!(service.name(), "Calculator");
        assert_eq!(service.type_name(), "CalculatorImpl");
        assert_eq!(service.namespace(), "urn:calc");
        assert!(service.handler(&service.methods()[0]).is_some());
        assert!(service.state().is_some());
        assert!(!service.default_is_encoded());
    }

    #[test]
    fn test_rpc_service_defaults_to_encoded() {
        let service = ServiceBuilder::new("S")
            .soap_service(SoapServiceAttribute::rpc())
            .build()
            .unwrap();
        assert!(service.default_is_encoded());
    }

    #[test]
    fn test_default_routing_style() {
        let service = ServiceBuilder::new("S")
            .default_routing_style(SoapServiceRoutingStyle::RequestElement)
            .build()
            .unwrap();
        assert_eq!(
            service.soap_service().routing_style,
            SoapServiceRoutingStyle::RequestElement
        );

        let explicit = ServiceBuilder::new("S")
            .soap_service(SoapServiceAttribute::rpc())
            .default_routing_style(SoapServiceRoutingStyle::RequestElement)
            .build()
            .unwrap();
        assert_eq!(
            explicit.soap_service().routing_style,
            SoapServiceRoutingStyle::SoapAction
        );
    }

    #[test]
    fn test_unpaired_begin_fails() {
        let begin = MethodDecl::new("S", "BeginWork")
            .param("cb", SchemaType::AsyncCallback)
            .param("state", SchemaType::Object)
            .returns(SchemaType::AsyncResult);
        let err = ServiceBuilder::new("S").method(begin).build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnd { .. }));
    }
}
