//! Types et utilitaires pour les handlers d'opérations SOAP.
//!
//! Chaque opération exposée est associée à un handler asynchrone, enregistré
//! une fois avec le service. Le serveur crée une [`ServiceInstance`] neuve
//! pour chaque appel, y dépose les en-têtes entrants, appelle le handler
//! puis relit les en-têtes sortants.
//!
//! ```text
//! OperationArgs (paramètres in/ref)
//!       ↓
//! OperationHandler (traitement async)
//!       ↓
//! Vec<Value> (retour éventuel en tête, puis paramètres out/ref)
//! ```
//!
//! # Examples
//!
//! ```rust
//! use pmosoap::operation_handler;
//! use pmosoap::values::Value;
//!
//! let add = operation_handler!(|instance, args| {
//!     let a = args.int("a")?;
//!     let b = args.int("b")?;
//!     Ok(vec![Value::Int(a + b)])
//! });
//! ```

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use crate::fault::SoapException;
use crate::headers::{HeaderSlots, SharedHeader, SoapHeader};
use crate::values::Value;

/// Erreur renvoyée par un handler.
#[derive(Error, Debug)]
pub enum OperationError {
    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("Invalid argument {name}: {reason}")]
    InvalidArgument { name: String, reason: String },

    /// Faute SOAP choisie par le handler, renvoyée telle quelle
    #[error(transparent)]
    Fault(#[from] SoapException),

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OperationError {
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            OperationError::MissingArgument(_) | OperationError::InvalidArgument { .. }
        )
    }
}

/// Résultat d'un handler : retour éventuel en tête, puis paramètres `out`.
pub type OperationResult = Result<Vec<Value>, OperationError>;

/// Future retourné par un [`OperationHandler`].
pub type OperationFuture = Pin<Box<dyn Future<Output = OperationResult> + Send>>;

/// Handler d'opération asynchrone.
///
/// Reçoit l'instance de service de l'appel et les arguments d'entrée.
pub type OperationHandler =
    Arc<dyn Fn(Arc<ServiceInstance>, OperationArgs) -> OperationFuture + Send + Sync>;

/// Arguments d'entrée d'une opération, dans l'ordre des paramètres.
#[derive(Debug, Clone, Default)]
pub struct OperationArgs {
    names: Vec<String>,
    values: Vec<Value>,
}

impl OperationArgs {
    pub fn new(names: Vec<String>, values: Vec<Value>) -> Self {
        Self { names, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Valeur d'un paramètre par nom.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.values.get(i))
    }

    pub fn require(&self, name: &str) -> Result<&Value, OperationError> {
        self.get(name)
            .ok_or_else(|| OperationError::MissingArgument(name.to_string()))
    }

    pub fn int(&self, name: &str) -> Result<i64, OperationError> {
        self.require(name)?
            .as_i64()
            .ok_or_else(|| self.invalid(name, "integer expected"))
    }

    pub fn float(&self, name: &str) -> Result<f64, OperationError> {
        self.require(name)?
            .as_f64()
            .ok_or_else(|| self.invalid(name, "number expected"))
    }

    pub fn string(&self, name: &str) -> Result<String, OperationError> {
        self.require(name)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.invalid(name, "string expected"))
    }

    pub fn bool(&self, name: &str) -> Result<bool, OperationError> {
        self.require(name)?
            .as_bool()
            .ok_or_else(|| self.invalid(name, "boolean expected"))
    }

    fn invalid(&self, name: &str, reason: &str) -> OperationError {
        OperationError::InvalidArgument {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Instance de service propre à un appel.
///
/// Porte les membres d'en-tête et, si le service en déclare un, l'état
/// applicatif partagé.
pub struct ServiceInstance {
    service: String,
    headers: HeaderSlots,
    state: Option<Arc<dyn Any + Send + Sync>>,
}

impl ServiceInstance {
    pub fn new(service: &str, state: Option<Arc<dyn Any + Send + Sync>>) -> Self {
        trace!("🎬 Instance de {}", service);
        Self {
            service: service.to_string(),
            headers: HeaderSlots::new(),
            state,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Membres d'en-tête de l'instance.
    pub fn headers(&self) -> &HeaderSlots {
        &self.headers
    }

    /// En-tête reçu dans un membre.
    pub fn header(&self, member: &str) -> Option<SharedHeader> {
        self.headers.header(member)
    }

    /// Place un en-tête à renvoyer dans un membre.
    pub fn set_header(&self, member: &str, header: SoapHeader) {
        self.headers.set_header(member, header);
    }

    /// État applicatif partagé, s'il est du type demandé.
    pub fn state<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.state.clone().and_then(|s| s.downcast::<T>().ok())
    }
}

impl Drop for ServiceInstance {
    fn drop(&mut self) {
        trace!("🧹 Fin de l'instance de {}", self.service);
    }
}

impl std::fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("service", &self.service)
            .field("headers", &self.headers)
            .finish()
    }
}

/// Macro pour créer facilement un [`OperationHandler`].
///
/// Le corps est placé dans un bloc `async move` et doit produire un
/// [`OperationResult`] ; l'opérateur `?` y est utilisable.
///
/// ```ignore
/// let handler = operation_handler!(|instance, args| {
///     let name = args.string("name")?;
///     Ok(vec![Value::String(format!("Hello {}", name))])
/// });
/// ```
#[macro_export]
macro_rules! operation_handler {
    (|$instance:ident, $args:ident| $body:block) => {{
        let handler: $crate::handler::OperationHandler = std::sync::Arc::new(
            move |$instance: std::sync::Arc<$crate::handler::ServiceInstance>,
                  $args: $crate::handler::OperationArgs| {
                let fut: $crate::handler::OperationFuture = Box::pin(async move {
                    #[allow(unused_variables)]
                    let $instance = $instance;
                    let result: $crate::handler::OperationResult = async move $body.await;
                    result
                });
                fut
            },
        );
        handler
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::{SchemaType, StructType};

    #[tokio::test]
    async fn test_macro_handler() {
        let add = operation_handler!(|instance, args| {
            let a = args.int("a")?;
            let b = args.int("b")?;
            Ok(vec![Value::Int(a + b)])
        });
        let args = OperationArgs::new(
            vec!["a".into(), "b".into()],
            vec![Value::Int(2), Value::Int(3)],
        );
        let instance = Arc::new(ServiceInstance::new("Calculator", None));
        let out = add(instance, args).await.unwrap();
        assert_eq!(out, vec![Value::Int(5)]);
    }

    #[tokio::test]
    async fn test_missing_argument() {
        let h = operation_handler!(|instance, args| {
            let x = args.int("x")?;
            Ok(vec![Value::Int(x)])
        });
        let err = h(Arc::new(ServiceInstance::new("S", None)), OperationArgs::default())
            .await
            .unwrap_err();
        assert!(err.is_argument_error());
    }

    #[test]
    fn test_instance_headers_and_state() {
        let instance = ServiceInstance::new("S", Some(Arc::new(42u32)));
        assert_eq!(instance.state::<u32>().as_deref(), Some(&42));
        assert!(instance.state::<String>().is_none());

        let schema = Arc::new(StructType::new("Auth").field("User", SchemaType::String));
        instance.set_header("Auth", SoapHeader::known(schema, Value::Null));
        assert!(instance.header("Auth").is_some());
    }
}
