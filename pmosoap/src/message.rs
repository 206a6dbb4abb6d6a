//! # Message SOAP en cours de traitement
//!
//! Un [`SoapMessage`] accompagne un appel du début à la fin : il porte
//! l'étape courante, les en-têtes, le corps tel qu'il passe sur le fil, le
//! type de contenu, les valeurs des paramètres et la faute éventuelle.
//!
//! Les extensions le reçoivent à chaque étape. Les accès aux valeurs sont
//! contrôlés par l'étape et par le côté (client ou serveur) :
//!
//! | côté    | valeurs d'entrée     | valeurs de sortie    |
//! |---------|----------------------|----------------------|
//! | client  | `BeforeSerialize`    | `AfterDeserialize`   |
//! | serveur | `AfterDeserialize`   | `BeforeSerialize`    |

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::fault::SoapException;
use crate::headers::SoapHeaderCollection;
use crate::reflection::SoapReflectedMethod;
use crate::soap::SoapVersion;
use crate::values::Value;

/// Étape d'un message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoapMessageStage {
    BeforeSerialize,
    AfterSerialize,
    BeforeDeserialize,
    AfterDeserialize,
}

impl SoapMessageStage {
    /// Vrai pour les étapes d'écriture, parcourues dans l'ordre croissant.
    pub fn is_outbound(&self) -> bool {
        matches!(
            self,
            SoapMessageStage::BeforeSerialize | SoapMessageStage::AfterSerialize
        )
    }
}

impl fmt::Display for SoapMessageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SoapMessageStage::BeforeSerialize => "BeforeSerialize",
            SoapMessageStage::AfterSerialize => "AfterSerialize",
            SoapMessageStage::BeforeDeserialize => "BeforeDeserialize",
            SoapMessageStage::AfterDeserialize => "AfterDeserialize",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSide {
    Client,
    Server,
}

/// Accès invalide à un message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MessageError {
    #[error("Content type can only be changed in BeforeSerialize or BeforeDeserialize, not in {0}")]
    ContentTypeLocked(String),

    #[error("In parameters are not available in stage {0}")]
    InValuesUnavailable(String),

    #[error("Out parameters are not available in stage {0}")]
    OutValuesUnavailable(String),

    #[error("Parameter values are not available while a fault is set")]
    FaultCaptured,

    #[error("Method {0} has no return value")]
    VoidReturn(String),

    #[error("No method is bound to the message yet")]
    NoMethod,

    #[error("Parameter index {0} is out of range")]
    IndexOutOfRange(usize),
}

/// Contexte mutable d'un appel.
#[derive(Debug)]
pub struct SoapMessage {
    side: MessageSide,
    stage: Option<SoapMessageStage>,
    pub(crate) version: SoapVersion,
    pub(crate) method: Option<Arc<SoapReflectedMethod>>,
    pub(crate) url: String,
    pub(crate) action: String,
    pub(crate) headers: SoapHeaderCollection,
    pub(crate) body: Vec<u8>,
    pub(crate) content_type: String,
    pub(crate) content_encoding: Option<String>,
    pub(crate) http_headers: HashMap<String, String>,
    pub(crate) in_values: Vec<Value>,
    pub(crate) out_values: Vec<Value>,
    pub(crate) exception: Option<SoapException>,
}

impl SoapMessage {
    pub fn new(side: MessageSide, version: SoapVersion, url: &str) -> Self {
        Self {
            side,
            stage: None,
            version,
            method: None,
            url: url.to_string(),
            action: String::new(),
            headers: SoapHeaderCollection::new(),
            body: Vec::new(),
            content_type: version.content_type().to_string(),
            content_encoding: None,
            http_headers: HashMap::new(),
            in_values: Vec::new(),
            out_values: Vec::new(),
            exception: None,
        }
    }

    pub fn side(&self) -> MessageSide {
        self.side
    }

    /// Étape courante (`None` avant la première étape).
    pub fn stage(&self) -> Option<SoapMessageStage> {
        self.stage
    }

    pub(crate) fn set_stage(&mut self, stage: SoapMessageStage) {
        self.stage = Some(stage);
    }

    pub fn version(&self) -> SoapVersion {
        self.version
    }

    pub fn method(&self) -> Option<&Arc<SoapReflectedMethod>> {
        self.method.as_ref()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn headers(&self) -> &SoapHeaderCollection {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut SoapHeaderCollection {
        &mut self.headers
    }

    /// Octets du corps HTTP à l'étape courante.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn set_content_type(&mut self, content_type: &str) -> Result<(), MessageError> {
        self.ensure_content_type_stage()?;
        self.content_type = content_type.to_string();
        Ok(())
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.content_encoding.as_deref()
    }

    pub fn set_content_encoding(&mut self, encoding: Option<&str>) -> Result<(), MessageError> {
        self.ensure_content_type_stage()?;
        self.content_encoding = encoding.map(str::to_string);
        Ok(())
    }

    /// En-tête HTTP posé par une extension (ex. `SOAPAction`).
    pub fn http_header(&self, name: &str) -> Option<&str> {
        self.http_headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_http_header(&mut self, name: &str, value: &str) {
        self.http_headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
        self.http_headers.insert(name.to_string(), value.to_string());
    }

    pub fn exception(&self) -> Option<&SoapException> {
        self.exception.as_ref()
    }

    pub fn set_exception(&mut self, exception: Option<SoapException>) {
        self.exception = exception;
    }

    /// Valeurs d'entrée, dans l'ordre des paramètres.
    pub fn in_values(&self) -> Result<&[Value], MessageError> {
        self.ensure_no_fault()?;
        let allowed = match self.side {
            MessageSide::Client => SoapMessageStage::BeforeSerialize,
            MessageSide::Server => SoapMessageStage::AfterDeserialize,
        };
        if self.stage != Some(allowed) {
            return Err(MessageError::InValuesUnavailable(self.stage_name()));
        }
        Ok(&self.in_values)
    }

    pub fn in_parameter_value(&self, index: usize) -> Result<&Value, MessageError> {
        self.in_values()?
            .get(index)
            .ok_or(MessageError::IndexOutOfRange(index))
    }

    /// Valeurs de sortie : retour éventuel en tête, puis paramètres `out`.
    pub fn out_values(&self) -> Result<&[Value], MessageError> {
        self.ensure_no_fault()?;
        let allowed = match self.side {
            MessageSide::Client => SoapMessageStage::AfterDeserialize,
            MessageSide::Server => SoapMessageStage::BeforeSerialize,
        };
        if self.stage != Some(allowed) {
            return Err(MessageError::OutValuesUnavailable(self.stage_name()));
        }
        Ok(&self.out_values)
    }

    pub fn return_value(&self) -> Result<&Value, MessageError> {
        let values = self.out_values()?;
        let method = self.method.as_ref().ok_or(MessageError::NoMethod)?;
        method
            .method
            .return_value(values)
            .ok_or_else(|| MessageError::VoidReturn(method.method.name().to_string()))
    }

    pub fn out_parameter_value(&self, index: usize) -> Result<&Value, MessageError> {
        let values = self.out_values()?;
        let method = self.method.as_ref().ok_or(MessageError::NoMethod)?;
        method
            .method
            .out_parameter_values(values)
            .get(index)
            .ok_or(MessageError::IndexOutOfRange(index))
    }

    fn ensure_no_fault(&self) -> Result<(), MessageError> {
        if self.exception.is_some() {
            Err(MessageError::FaultCaptured)
        } else {
            Ok(())
        }
    }

    fn ensure_content_type_stage(&self) -> Result<(), MessageError> {
        match self.stage {
            Some(SoapMessageStage::BeforeSerialize) | Some(SoapMessageStage::BeforeDeserialize) => {
                Ok(())
            }
            _ => Err(MessageError::ContentTypeLocked(self.stage_name())),
        }
    }

    fn stage_name(&self) -> String {
        self.stage
            .map(|s| s.to_string())
            .unwrap_or_else(|| "None".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_only_in_before_stages() {
        let mut m = SoapMessage::new(MessageSide::Client, SoapVersion::Soap11, "http://x");
        assert!(m.set_content_type("text/xml").is_err());
        m.set_stage(SoapMessageStage::BeforeSerialize);
        assert!(m.set_content_type("text/xml; charset=utf-8").is_ok());
        m.set_stage(SoapMessageStage::AfterSerialize);
        assert_eq!(
            m.set_content_type("text/plain"),
            Err(MessageError::ContentTypeLocked("AfterSerialize".into()))
        );
        assert_eq!(m.content_type(), "text/xml; charset=utf-8");
    }

    #[test]
    fn test_values_by_side_and_stage() {
        let mut client = SoapMessage::new(MessageSide::Client, SoapVersion::Soap11, "");
        client.in_values = vec![Value::from(2)];
        client.set_stage(SoapMessageStage::BeforeSerialize);
        assert_eq!(client.in_parameter_value(0).unwrap(), &Value::Int(2));
        assert!(client.out_values().is_err());

        let mut server = SoapMessage::new(MessageSide::Server, SoapVersion::Soap12, "");
        server.set_stage(SoapMessageStage::BeforeSerialize);
        assert!(server.in_values().is_err());
        assert!(server.out_values().is_ok());
        server.set_stage(SoapMessageStage::AfterDeserialize);
        assert!(server.in_values().is_ok());
    }

    #[test]
    fn test_values_blocked_by_fault() {
        let mut m = SoapMessage::new(MessageSide::Server, SoapVersion::Soap11, "");
        m.set_stage(SoapMessageStage::AfterDeserialize);
        m.set_exception(Some(SoapException::server("x")));
        assert_eq!(m.in_values(), Err(MessageError::FaultCaptured));
    }

    #[test]
    fn test_http_header_case_insensitive() {
        let mut m = SoapMessage::new(MessageSide::Client, SoapVersion::Soap11, "");
        m.set_http_header("SOAPAction", "\"a\"");
        m.set_http_header("soapaction", "\"b\"");
        assert_eq!(m.http_header("SoapAction"), Some("\"b\""));
    }
}
