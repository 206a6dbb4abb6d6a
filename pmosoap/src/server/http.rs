//! Requête et réponse HTTP vues par les protocoles serveur.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::content_type;

/// Taille des fragments d'une réponse non tamponnée.
const CHUNK_SIZE: usize = 8 * 1024;

/// Requête entrante.
#[derive(Debug, Clone)]
pub struct SoapRequest {
    pub method: Method,
    /// URL sans la requête (`scheme://host[:port]/path`)
    pub url: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl SoapRequest {
    /// Reconstruit l'URL publique à partir de `Host` et de `X-Forwarded-Proto`.
    pub fn from_parts(method: Method, uri: &Uri, headers: HeaderMap, body: Bytes) -> Self {
        let scheme = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .or(uri.scheme_str())
            .unwrap_or("http")
            .to_string();
        let host = headers
            .get("host")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| uri.authority().map(|a| a.to_string()))
            .unwrap_or_else(|| "localhost".to_string());
        Self {
            method,
            url: format!("{}://{}{}", scheme, host, uri.path()),
            query: uri.query().map(str::to_string),
            headers,
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> &str {
        self.header(CONTENT_TYPE.as_str()).unwrap_or("")
    }
}

/// Réponse produite par un protocole.
#[derive(Debug, Clone)]
pub struct SoapResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Faux : le corps part en fragments, sans `Content-Length`
    pub buffered: bool,
}

impl SoapResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            content_type: None,
            headers: Vec::new(),
            body: Vec::new(),
            buffered: true,
        }
    }

    pub fn xml(status: StatusCode, body: Vec<u8>) -> Self {
        Self {
            content_type: Some(content_type::compose(content_type::TEXT_XML, "utf-8")),
            body,
            ..Self::new(status)
        }
    }

    pub fn text(status: StatusCode, text: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type::compose(content_type::TEXT_PLAIN, "utf-8")),
            body: text.into().into_bytes(),
            ..Self::new(status)
        }
    }

    pub fn html(body: String) -> Self {
        Self {
            content_type: Some(content_type::compose(content_type::TEXT_HTML, "utf-8")),
            body: body.into_bytes(),
            ..Self::new(StatusCode::OK)
        }
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl IntoResponse for SoapResponse {
    fn into_response(self) -> Response {
        let mut builder = Response::builder().status(self.status);
        if let Some(ct) = &self.content_type {
            builder = builder.header(CONTENT_TYPE, ct.as_str());
        }
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let body = if self.buffered || self.body.is_empty() {
            Body::from(self.body)
        } else {
            let chunks: Vec<Result<Bytes, Infallible>> = self
                .body
                .chunks(CHUNK_SIZE)
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect();
            Body::from_stream(futures::stream::iter(chunks))
        };

        builder
            .body(body)
            .unwrap_or_else(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_url_from_host() {
        let mut headers = HeaderMap::new();
        headers.insert("host", "example.org:8080".parse().unwrap());
        let uri: Uri = "/calc?wsdl".parse().unwrap();
        let req = SoapRequest::from_parts(Method::GET, &uri, headers, Bytes::new());
        assert_eq!(req.url, "http://example.org:8080/calc");
        assert_eq!(req.query.as_deref(), Some("wsdl"));
        assert_eq!(req.content_type(), "");
    }

    #[test]
    fn test_forwarded_proto() {
        let mut headers = HeaderMap::new();
        headers.insert("host", "example.org".parse().unwrap());
        headers.insert("x-forwarded-proto", "https".parse().unwrap());
        let uri: Uri = "/calc".parse().unwrap();
        let req = SoapRequest::from_parts(Method::POST, &uri, headers, Bytes::new());
        assert_eq!(req.url, "https://example.org/calc");
    }

    #[test]
    fn test_response_headers() {
        let mut r = SoapResponse::text(StatusCode::BAD_REQUEST, "bad");
        r.headers.push(("X-Test".into(), "1".into()));
        let resp = r.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.headers()["x-test"], "1");
        assert!(resp.headers()[CONTENT_TYPE].to_str().unwrap().starts_with("text/plain"));
    }
}
