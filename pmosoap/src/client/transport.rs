//! Échange HTTP d'un appel client : `reqwest` en asynchrone, `ureq` sur un
//! fil dédié en bloquant.

use crossbeam_channel::{Receiver, select};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::ClientError;
use crate::content_type;

/// Verbe HTTP d'une requête client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    Get,
    Post,
}

/// Requête prête à partir.
#[derive(Debug, Clone)]
pub(crate) struct OutboundRequest {
    pub verb: HttpVerb,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Réponse reçue, corps lu entièrement.
#[derive(Debug, Clone)]
pub(crate) struct InboundResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub body: Vec<u8>,
}

impl InboundResponse {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn header_value(headers: &reqwest::header::HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Envoie la requête ; `cancel` interrompt l'attente.
pub(crate) async fn send_async(
    http: &reqwest::Client,
    request: OutboundRequest,
    cancel: CancellationToken,
) -> Result<InboundResponse, ClientError> {
    debug!("📤 {:?} {} ({} octets)", request.verb, request.url, request.body.len());
    let mut builder = match request.verb {
        HttpVerb::Get => http.get(&request.url),
        HttpVerb::Post => http.post(&request.url).body(request.body),
    };
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let exchange = async {
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = header_value(response.headers(), "content-type");
        let content_encoding = header_value(response.headers(), "content-encoding");
        let body = response.bytes().await?.to_vec();
        Ok::<_, reqwest::Error>(InboundResponse {
            status,
            content_type,
            content_encoding,
            body,
        })
    };

    tokio::select! {
        _ = cancel.cancelled() => {
            debug!("🛑 Appel interrompu");
            Err(ClientError::Aborted)
        }
        result = exchange => {
            let response = result?;
            trace!("📥 HTTP {} ({} octets)", response.status, response.body.len());
            Ok(response)
        }
    }
}

fn exchange_blocking(agent: &ureq::Agent, request: OutboundRequest) -> Result<InboundResponse, ClientError> {
    let mut response = match request.verb {
        HttpVerb::Get => {
            let mut builder = agent.get(&request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            builder.call()?
        }
        HttpVerb::Post => {
            let mut builder = agent.post(&request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            builder.send(&request.body[..])?
        }
    };

    let status = response.status().as_u16();
    let headers = response.headers();
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let content_encoding = headers
        .get(content_type::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.body_mut().read_to_vec()?;
    Ok(InboundResponse {
        status,
        content_type,
        content_encoding,
        body,
    })
}

/// Envoie la requête sur un fil dédié ; un signal sur `abort` libère
/// l'appelant sans attendre la fin de l'échange.
pub(crate) fn send_blocking(
    agent: &ureq::Agent,
    request: OutboundRequest,
    abort: &Receiver<()>,
) -> Result<InboundResponse, ClientError> {
    debug!("📤 {:?} {} ({} octets, bloquant)", request.verb, request.url, request.body.len());
    let (tx, rx) = crossbeam_channel::bounded(1);
    let agent = agent.clone();
    std::thread::spawn(move || {
        let _ = tx.send(exchange_blocking(&agent, request));
    });

    select! {
        recv(rx) -> result => match result {
            Ok(response) => response,
            Err(_) => Err(ClientError::Http("transport thread ended without a response".to_string())),
        },
        recv(abort) -> _ => {
            debug!("🛑 Appel bloquant interrompu");
            Err(ClientError::Aborted)
        }
    }
}
