//! Appels HTTP GET/POST hors SOAP : `{service}/{méthode}`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use tracing::{debug, info, warn};

use super::http::{SoapRequest, SoapResponse};
use crate::content_type;
use crate::handler::{OperationArgs, OperationError, OperationHandler, ServiceInstance};
use crate::http_binding::{
    is_http_eligible, message_name, read_form_parameters, read_query_parameters, write_return,
};
use crate::method::LogicalMethod;
use crate::reflection::ServiceDescriptor;
use crate::soap::Protocols;

/// Opération accessible en GET/POST.
#[derive(Clone)]
pub struct HttpServerMethod {
    pub name: String,
    pub method: LogicalMethod,
    pub handler: OperationHandler,
}

impl std::fmt::Debug for HttpServerMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServerMethod").field("name", &self.name).finish()
    }
}

/// Opérations éligibles d'un service, par nom publié.
#[derive(Debug)]
pub struct HttpServerType {
    descriptor: Arc<ServiceDescriptor>,
    methods: HashMap<String, HttpServerMethod>,
}

impl HttpServerType {
    pub fn new(descriptor: Arc<ServiceDescriptor>) -> Self {
        let methods: HashMap<String, HttpServerMethod> = descriptor
            .methods()
            .iter()
            .filter(|m| is_http_eligible(m))
            .filter_map(|m| {
                let handler = descriptor.handler(m)?.clone();
                Some((
                    message_name(m),
                    HttpServerMethod {
                        name: message_name(m),
                        method: m.clone(),
                        handler,
                    },
                ))
            })
            .collect();
        debug!(
            "🔗 {} : {} opération(s) GET/POST",
            descriptor.name(),
            methods.len()
        );
        Self {
            descriptor,
            methods,
        }
    }

    pub fn method(&self, name: &str) -> Option<&HttpServerMethod> {
        self.methods.get(name)
    }

    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Traite `GET` ou `POST` sur `{service}/{name}`.
    pub async fn handle(&self, protocols: Protocols, name: &str, request: &SoapRequest) -> SoapResponse {
        let Some(method) = self.method(name) else {
            warn!("⚠️ Méthode HTTP inconnue : {}", name);
            return SoapResponse::text(
                StatusCode::NOT_FOUND,
                format!("Request format is unrecognized for URL unexpectedly ending in '/{}'.", name),
            );
        };

        let values = if request.method == Method::GET && protocols.contains(Protocols::HTTP_GET) {
            read_query_parameters(&method.method, request.query.as_deref().unwrap_or(""))
        } else if request.method == Method::POST && protocols.contains(Protocols::HTTP_POST) {
            if !content_type::matches_base(request.content_type(), content_type::APPLICATION_FORM_URLENCODED) {
                return SoapResponse::text(
                    StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    format!("Request format is invalid: {}.", request.content_type()),
                );
            }
            read_form_parameters(&method.method, &request.body)
        } else {
            return SoapResponse::new(StatusCode::METHOD_NOT_ALLOWED);
        };

        let values = match values {
            Ok(values) => values,
            Err(e) => return SoapResponse::text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        let names = method
            .method
            .in_parameters()
            .iter()
            .map(|p| p.name.clone())
            .collect();
        let instance = Arc::new(ServiceInstance::new(
            self.descriptor.name(),
            self.descriptor.state(),
        ));
        let result = match (method.handler)(instance, OperationArgs::new(names, values)).await {
            Ok(result) => result,
            Err(OperationError::Fault(e)) => {
                return SoapResponse::text(StatusCode::INTERNAL_SERVER_ERROR, e.message);
            }
            Err(e) => return SoapResponse::text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        let Some(ty) = method.method.return_type() else {
            info!("✅ {} {} → 200", request.method, method.name);
            return SoapResponse::new(StatusCode::OK);
        };
        let Some(value) = method.method.return_value(&result) else {
            return SoapResponse::text(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Operation {} returned no value", method.name),
            );
        };
        match write_return(self.descriptor.namespace(), ty, value) {
            Ok(body) => {
                info!("✅ {} {} → 200", request.method, method.name);
                SoapResponse::xml(StatusCode::OK, body)
            }
            Err(e) => SoapResponse::text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}
