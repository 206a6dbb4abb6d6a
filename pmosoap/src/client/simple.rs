//! Client HTTP GET/POST simple : paramètres dans l'URL ou dans un
//! formulaire, retour XML.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::transport::{HttpVerb, InboundResponse, OutboundRequest, send_async, send_blocking};
use super::{ClientError, DEFAULT_TIMEOUT};
use crate::content_type;
use crate::http_binding::{message_name, read_return, write_parameters};
use crate::method::LogicalMethod;
use crate::reflection::ServiceDescriptor;
use crate::values::Value;

/// Appels `{service}/{méthode}` sans enveloppe SOAP.
pub struct HttpSimpleClient {
    base_url: String,
    descriptor: Arc<ServiceDescriptor>,
    verb: HttpVerb,
    http: reqwest::Client,
    agent: ureq::Agent,
}

impl std::fmt::Debug for HttpSimpleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSimpleClient")
            .field("base_url", &self.base_url)
            .field("verb", &self.verb)
            .finish()
    }
}

impl HttpSimpleClient {
    pub fn new(descriptor: Arc<ServiceDescriptor>, base_url: &str, verb: HttpVerb) -> Result<Self, ClientError> {
        Self::with_timeout(descriptor, base_url, verb, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        descriptor: Arc<ServiceDescriptor>,
        base_url: &str,
        verb: HttpVerb,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            descriptor,
            verb,
            http,
            agent,
        })
    }

    fn method(&self, name: &str) -> Result<&LogicalMethod, ClientError> {
        self.descriptor
            .methods()
            .iter()
            .find(|m| message_name(m) == name)
            .ok_or_else(|| ClientError::UnknownMethod(name.to_string()))
    }

    fn request(&self, name: &str, values: &[Value]) -> Result<(&LogicalMethod, OutboundRequest), ClientError> {
        let method = self.method(name)?;
        let encoded = write_parameters(method, values)?;
        let url = format!("{}/{}", self.base_url, name);
        let request = match self.verb {
            HttpVerb::Get => OutboundRequest {
                verb: HttpVerb::Get,
                url: if encoded.is_empty() { url } else { format!("{}?{}", url, encoded) },
                headers: Vec::new(),
                body: Vec::new(),
            },
            HttpVerb::Post => OutboundRequest {
                verb: HttpVerb::Post,
                url,
                headers: vec![(
                    "Content-Type".to_string(),
                    content_type::APPLICATION_FORM_URLENCODED.to_string(),
                )],
                body: encoded.into_bytes(),
            },
        };
        Ok((method, request))
    }

    fn read(method: &LogicalMethod, response: InboundResponse) -> Result<Option<Value>, ClientError> {
        if response.status != 200 {
            return Err(ClientError::Transport {
                status: response.status,
                body: response.body_text(),
            });
        }
        match method.return_type() {
            None => Ok(None),
            Some(ty) => {
                debug!("📥 {} : retour {}", method.name(), ty);
                Ok(Some(read_return(ty, &response.body)?))
            }
        }
    }

    /// Appelle l'opération ; `None` pour une méthode sans retour.
    pub async fn invoke(&self, name: &str, values: &[Value]) -> Result<Option<Value>, ClientError> {
        let (method, request) = self.request(name, values)?;
        let response = send_async(&self.http, request, CancellationToken::new()).await?;
        Self::read(method, response)
    }

    pub fn invoke_blocking(&self, name: &str, values: &[Value]) -> Result<Option<Value>, ClientError> {
        let (method, request) = self.request(name, values)?;
        let (_keep, never) = crossbeam_channel::bounded(1);
        let response = send_blocking(&self.agent, request, &never)?;
        Self::read(method, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::MethodDecl;
    use crate::reflection::ServiceBuilder;
    use crate::values::SchemaType;

    fn client(verb: HttpVerb) -> HttpSimpleClient {
        let proxy = ServiceBuilder::new("Calc")
            .method(
                MethodDecl::new("Calc", "Add")
                    .param("a", SchemaType::Int)
                    .param("b", SchemaType::Int)
                    .returns(SchemaType::Int),
            )
            .build()
            .unwrap();
        HttpSimpleClient::new(proxy, "http://h/calc/", verb).unwrap()
    }

    #[test]
    fn test_get_request_url() {
        let c = client(HttpVerb::Get);
        let (_, req) = c.request("Add", &[Value::Int(2), Value::Int(3)]).unwrap();
        assert_eq!(req.url, "http://h/calc/Add?a=2&b=3");
        assert!(req.body.is_empty());
    }

    #[test]
    fn test_post_request_form() {
        let c = client(HttpVerb::Post);
        let (_, req) = c.request("Add", &[Value::Int(2), Value::Int(3)]).unwrap();
        assert_eq!(req.url, "http://h/calc/Add");
        assert_eq!(req.body, b"a=2&b=3");
        assert_eq!(req.headers[0].1, "application/x-www-form-urlencoded");
    }

    #[test]
    fn test_read_return_and_errors() {
        let c = client(HttpVerb::Get);
        let method = c.method("Add").unwrap();
        let ok = InboundResponse {
            status: 200,
            content_type: Some("text/xml".into()),
            content_encoding: None,
            body: br#"<?xml version="1.0"?><int xmlns="http://tempuri.org/">5</int>"#.to_vec(),
        };
        assert_eq!(HttpSimpleClient::read(method, ok).unwrap(), Some(Value::Int(5)));

        let missing = InboundResponse {
            status: 500,
            content_type: Some("text/plain".into()),
            content_encoding: None,
            body: b"Missing parameter: b.".to_vec(),
        };
        assert!(matches!(
            HttpSimpleClient::read(method, missing),
            Err(ClientError::Transport { status: 500, .. })
        ));
        assert!(matches!(c.request("Sub", &[]), Err(ClientError::UnknownMethod(_))));
    }
}
