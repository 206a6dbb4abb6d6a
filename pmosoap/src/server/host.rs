//! Adaptateur axum d'un [`SoapEndpoint`].
//!
//! ```text
//! GET  /           → ?wsdl, ?disco, ?schema=…, page de présentation
//! POST /           → SOAP 1.1 / 1.2
//! GET  /{method}   → HTTP GET
//! POST /{method}   → HTTP POST (formulaire)
//! ```
//!
//! Les URL publiques gardent le chemin de montage (`OriginalUri`).
//! Un verbe non activé répond 405 ; un corps qui n'arrive pas dans le délai
//! de lecture répond 408.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes, to_bytes};
use axum::extract::{OriginalUri, Path, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, get, post};

use tracing::warn;

use super::SoapEndpoint;
use super::http::SoapRequest;
use crate::soap::Protocols;

async fn service_get(
    State(endpoint): State<Arc<SoapEndpoint>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let request = SoapRequest::from_parts(method, &uri, headers, Bytes::new());
    endpoint.handle_get(request).await.into_response()
}

/// Lit le corps entier en respectant `read_timeout`.
async fn read_body(endpoint: &SoapEndpoint, body: Body) -> Result<Bytes, Response> {
    let read = to_bytes(body, usize::MAX);
    let result = match endpoint.options().read_timeout {
        Some(limit) => match tokio::time::timeout(limit, read).await {
            Ok(result) => result,
            Err(_) => {
                warn!("⏱️ Lecture de la requête interrompue après {:?}", limit);
                return Err((StatusCode::REQUEST_TIMEOUT, "Request body read timed out.").into_response());
            }
        },
        None => read.await,
    };
    result.map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()).into_response())
}

async fn service_post(
    State(endpoint): State<Arc<SoapEndpoint>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let body = match read_body(&endpoint, body).await {
        Ok(body) => body,
        Err(response) => return response,
    };
    let request = SoapRequest::from_parts(method, &uri, headers, body);
    endpoint.handle_soap(request).await.into_response()
}

async fn method_call(
    State(endpoint): State<Arc<SoapEndpoint>>,
    Path(name): Path<String>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let body = match read_body(&endpoint, body).await {
        Ok(body) => body,
        Err(response) => return response,
    };
    let request = SoapRequest::from_parts(method, &uri, headers, body);
    endpoint.handle_http(&name, request).await.into_response()
}

/// Routeur du service, à monter sous son chemin public.
pub fn router(endpoint: Arc<SoapEndpoint>) -> Router {
    let protocols = endpoint.options().protocols;

    let mut root: MethodRouter<Arc<SoapEndpoint>> = get(service_get);
    if protocols.intersects(Protocols::ANY_HTTP_SOAP) {
        root = root.post(service_post);
    }

    let mut router = Router::new().route("/", root);

    let mut by_name: Option<MethodRouter<Arc<SoapEndpoint>>> = None;
    if protocols.contains(Protocols::HTTP_GET) {
        by_name = Some(get(method_call));
    }
    if protocols.contains(Protocols::HTTP_POST) {
        by_name = Some(match by_name {
            Some(r) => r.post(method_call),
            None => post(method_call),
        });
    }
    if let Some(by_name) = by_name {
        router = router.route("/{method}", by_name);
    }

    router.with_state(endpoint)
}
