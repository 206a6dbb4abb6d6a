//! Machine à états d'un appel client.
//!
//! ```text
//! Idle → BeforeSerialize → AfterSerialize → (envoi)
//!      → BeforeDeserialize → AfterDeserialize → Idle
//! ```
//!
//! Les appels asynchrones et bloquants ne diffèrent que par l'échange HTTP.

use std::sync::Arc;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use tracing::{debug, warn};

use super::transport::{HttpVerb, InboundResponse, OutboundRequest};
use super::{ClientError, SoapClientMethod, SoapClientType};
use crate::attributes::SoapHeaderDirection;
use crate::content_type;
use crate::extensions::{ExtensionChain, ExtensionGroup};
use crate::fault::{SoapException, read_fault};
use crate::headers::{HeaderSlots, get_header_members, read_headers, set_header_members, write_headers};
use crate::mapping::{read_members, write_members};
use crate::message::{MessageSide, SoapMessage, SoapMessageStage};
use crate::soap::{
    EnvelopeOptions, SOAP_ACTION_HEADER, SoapVersion, read_envelope, write_envelope,
};
use crate::values::Value;

/// Caractères échappés dans la valeur de `SOAPAction`.
const ACTION_ESCAPE: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'%');

/// Valeur de l'en-tête `SOAPAction` : entre guillemets, échappée.
pub(crate) fn quote_action(action: &str) -> String {
    format!("\"{}\"", utf8_percent_encode(action, ACTION_ESCAPE))
}

/// Un appel en cours, du côté client.
pub(crate) struct ClientCall {
    method: Arc<SoapClientMethod>,
    message: SoapMessage,
    chain: ExtensionChain,
    target_namespace: String,
}

impl ClientCall {
    pub fn new(client_type: &SoapClientType, method: Arc<SoapClientMethod>, version: SoapVersion, url: &str) -> Self {
        let mut message = SoapMessage::new(MessageSide::Client, version, url);
        message.method = Some(method.reflected.clone());
        message.action = method.reflected.action.clone();

        let mut chain = ExtensionChain::new();
        chain.add(ExtensionGroup::High, client_type.high_extensions());
        chain.add(ExtensionGroup::Other, &method.extensions);

        Self {
            target_namespace: client_type.descriptor().namespace().to_string(),
            method,
            message,
            chain,
        }
    }

    pub fn is_one_way(&self) -> bool {
        self.method.reflected.one_way
    }

    fn version(&self) -> SoapVersion {
        self.message.version
    }

    /// Sérialise la requête : en-têtes du proxy, extensions, enveloppe.
    pub fn serialize(&mut self, values: Vec<Value>, slots: &HeaderSlots) -> Result<OutboundRequest, ClientError> {
        let reflected = self.method.reflected.clone();
        let expected = reflected.method.in_parameters().len();
        if values.len() != expected {
            return Err(ClientError::ArityMismatch {
                method: reflected.method.name().to_string(),
                expected,
                found: values.len(),
            });
        }

        self.message.content_type = match self.version() {
            SoapVersion::Soap11 => content_type::compose(content_type::TEXT_XML, "utf-8"),
            SoapVersion::Soap12 => content_type::compose_with_action(
                content_type::APPLICATION_SOAP,
                "utf-8",
                Some(&reflected.action),
            ),
        };
        self.message.in_values = values;
        get_header_members(
            &mut self.message.headers,
            slots,
            &reflected.headers,
            SoapHeaderDirection::IN,
        );

        self.chain
            .run(None, SoapMessageStage::BeforeSerialize, &mut self.message)?;

        let header = write_headers(
            &self.message.headers,
            &reflected.headers,
            SoapHeaderDirection::IN,
            reflected.is_encoded(),
            self.version(),
        )?;
        let body = write_members(&reflected.request_mapping, &self.message.in_values)?;
        let options = EnvelopeOptions {
            encoded: reflected.is_encoded(),
            rpc: reflected.rpc,
            target_namespace: self.target_namespace.clone(),
            types_namespace: reflected.request_mapping.types_namespace.clone(),
            ..EnvelopeOptions::new(self.version())
        };
        let bytes = write_envelope(&options, header, body)?;
        self.message.body = self.chain.filter_outbound(bytes)?;
        self.chain
            .run(None, SoapMessageStage::AfterSerialize, &mut self.message)?;

        let mut headers: Vec<(String, String)> = self
            .message
            .http_headers
            .iter()
            .map(|(n, v)| (n.clone(), v.clone()))
            .collect();
        headers.push(("Content-Type".to_string(), self.message.content_type.clone()));
        if let Some(encoding) = &self.message.content_encoding {
            headers.push((content_type::CONTENT_ENCODING.to_string(), encoding.clone()));
        }
        let action_set = headers
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case(SOAP_ACTION_HEADER));
        if self.version() == SoapVersion::Soap11 && !action_set {
            headers.push((SOAP_ACTION_HEADER.to_string(), quote_action(&self.message.action)));
        }

        debug!(
            "📨 {} → {} ({}, {} octets)",
            reflected.name,
            self.message.url,
            self.version(),
            self.message.body.len()
        );
        Ok(OutboundRequest {
            verb: HttpVerb::Post,
            url: self.message.url.clone(),
            headers,
            body: std::mem::take(&mut self.message.body),
        })
    }

    /// Relit la réponse et rend les valeurs de sortie (retour puis
    /// paramètres `out`).
    pub fn deserialize(mut self, response: InboundResponse, slots: &HeaderSlots) -> Result<Vec<Value>, ClientError> {
        let reflected = self.method.reflected.clone();
        let status = response.status;

        if status >= 300 && status != 400 && status != 500 {
            warn!("⚠️ {} : HTTP {}", reflected.name, status);
            return Err(ClientError::Transport {
                status,
                body: response.body_text(),
            });
        }
        if self.is_one_way() && status != 500 {
            debug!("✅ {} envoyé (sens unique, HTTP {})", reflected.name, status);
            return Ok(Vec::new());
        }

        let raw = response.body_text();
        self.message.content_type = response.content_type.clone().unwrap_or_default();
        self.message.content_encoding = response.content_encoding.clone();
        self.message.body = self.chain.filter_inbound(None, response.body)?;
        self.chain
            .run(None, SoapMessageStage::BeforeDeserialize, &mut self.message)?;

        let ct = self.message.content_type.clone();
        if !content_type::is_soap(&ct) {
            if status == 400 {
                return Err(ClientError::Transport { status, body: raw });
            }
            return Err(ClientError::ContentMismatch {
                content_type: ct,
                body: raw,
            });
        }

        let envelope = read_envelope(&self.message.body)?;
        let Some(version) = SoapVersion::from_envelope_ns(&envelope.namespace) else {
            return Err(ClientError::Fault(SoapException::version_mismatch(format!(
                "Response envelope namespace '{}' is not a SOAP envelope namespace.",
                envelope.namespace
            ))));
        };
        self.message.version = version;

        read_headers(
            envelope.header.as_ref(),
            &reflected.headers,
            SoapHeaderDirection::OUT | SoapHeaderDirection::FAULT,
            false,
            &mut self.message.headers,
        )?;

        let fault = envelope
            .first_body_element()
            .filter(|e| e.name == "Fault" && e.namespace.as_deref() == Some(envelope.namespace.as_str()));
        let direction = match fault {
            Some(element) => {
                let e = read_fault(version, element);
                debug!("📥 {} : faute {} ({})", reflected.name, e.code, e.message);
                self.message.exception = Some(e);
                SoapHeaderDirection::FAULT
            }
            None => {
                if let Some(mapping) = &reflected.response_mapping {
                    self.message.out_values = read_members(mapping, &envelope.body)?;
                }
                SoapHeaderDirection::OUT
            }
        };

        self.chain
            .run(None, SoapMessageStage::AfterDeserialize, &mut self.message)?;
        set_header_members(&self.message.headers, slots, &reflected.headers, direction, true)?;

        if let Some(e) = self.message.exception.take() {
            return Err(ClientError::Fault(e));
        }
        debug!(
            "✅ {} : {} valeur(s) reçue(s)",
            reflected.name,
            self.message.out_values.len()
        );
        Ok(std::mem::take(&mut self.message.out_values))
    }
}
