//! # Fautes SOAP
//!
//! [`SoapException`] est la seule erreur placée sur le fil. Elle porte un
//! code qualifié, une chaîne de sous-codes (1.2), les rôles et le détail
//! XML, et sait se traduire d'une version SOAP à l'autre.
//!
//! ## Fonctionnalités
//!
//! - ✅ Codes Server/Client/MustUnderstand/VersionMismatch ↔ Receiver/Sender/…
//! - ✅ Sous-codes chaînés (profondeur bornée à 100 en lecture)
//! - ✅ Fautes d'en-tête (`MustUnderstand`)
//! - ✅ Masquage des détails (interrupteur de diagnostic)
//! - ✅ Lecture et écriture des formes 1.1 et 1.2

pub mod codes;
mod wire;

use std::fmt;

use xmltree::Element;

pub use wire::{read_fault, write_fault};

use crate::xml::QName;

/// Profondeur maximale d'une chaîne de sous-codes relue sur le fil.
pub const MAX_SUBCODE_DEPTH: usize = 100;

/// Message renvoyé à la place du vrai message quand le détail est masqué.
pub const SUPPRESSED_MESSAGE: &str = "An error occurred on the server.";

/// Préfixe des fautes qui enveloppent une erreur applicative.
pub const UNABLE_TO_PROCESS: &str = "Server was unable to process request.";

/// Sous-code SOAP 1.2.
#[derive(Debug, Clone, PartialEq)]
pub struct SoapFaultSubCode {
    pub code: QName,
    pub subcode: Option<Box<SoapFaultSubCode>>,
}

impl SoapFaultSubCode {
    pub fn new(code: QName) -> Self {
        Self {
            code,
            subcode: None,
        }
    }

    pub fn with_subcode(code: QName, subcode: SoapFaultSubCode) -> Self {
        Self {
            code,
            subcode: Some(Box::new(subcode)),
        }
    }

    /// Nombre de niveaux de la chaîne.
    pub fn depth(&self) -> usize {
        1 + self.subcode.as_ref().map_or(0, |s| s.depth())
    }

    /// Vrai si un des niveaux porte ce code.
    pub fn contains(&self, code: &QName) -> bool {
        &self.code == code || self.subcode.as_ref().is_some_and(|s| s.contains(code))
    }
}

/// Origine d'une faute, pour le choix du statut HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultCause {
    #[default]
    None,
    /// Document XML mal formé
    XmlParse,
    /// Type de contenu non SOAP
    UnsupportedMedia,
    /// Argument invalide (désérialisation des paramètres)
    Argument,
    /// Échec d'une extension
    Extension,
}

/// Faute SOAP.
#[derive(Debug, Clone, PartialEq)]
pub struct SoapException {
    pub code: QName,
    pub message: String,
    pub lang: Option<String>,
    pub actor: String,
    pub role: String,
    pub node: String,
    /// Élément de détail (ses enfants sont copiés sous `detail`/`Detail`)
    pub detail: Option<Element>,
    pub subcode: Option<SoapFaultSubCode>,
    /// Faute relative à un en-tête : jamais de détail sur le fil
    pub header_fault: bool,
    pub cause: FaultCause,
}

impl SoapException {
    pub fn new(message: impl Into<String>, code: QName) -> Self {
        Self {
            code,
            message: message.into(),
            lang: None,
            actor: String::new(),
            role: String::new(),
            node: String::new(),
            detail: None,
            subcode: None,
            header_fault: false,
            cause: FaultCause::None,
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(message, codes::server())
    }

    pub fn client(message: impl Into<String>) -> Self {
        Self::new(message, codes::client())
    }

    pub fn version_mismatch(message: impl Into<String>) -> Self {
        Self::new(message, codes::version_mismatch())
    }

    /// Faute d'en-tête `MustUnderstand`.
    pub fn must_understand(message: impl Into<String>) -> Self {
        Self::header(message, codes::must_understand())
    }

    /// Faute d'en-tête avec un code quelconque.
    pub fn header(message: impl Into<String>, code: QName) -> Self {
        let mut e = Self::new(message, code);
        e.header_fault = true;
        e
    }

    /// Enveloppe une erreur applicative quelconque.
    pub fn unable_to_process(inner: impl fmt::Display) -> Self {
        Self::server(format!("{} ---> {}", UNABLE_TO_PROCESS, inner))
    }

    pub fn with_subcode(mut self, subcode: SoapFaultSubCode) -> Self {
        self.subcode = Some(subcode);
        self
    }

    pub fn with_detail(mut self, detail: Element) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }

    pub fn with_node(mut self, node: &str) -> Self {
        self.node = node.to_string();
        self
    }

    pub fn with_lang(mut self, lang: &str) -> Self {
        self.lang = Some(lang.to_string());
        self
    }

    pub fn with_cause(mut self, cause: FaultCause) -> Self {
        self.cause = cause;
        self
    }

    pub fn is_server_fault(&self) -> bool {
        codes::is_server_fault_code(&self.code)
    }

    pub fn is_client_fault(&self) -> bool {
        codes::is_client_fault_code(&self.code)
    }

    pub fn is_must_understand_fault(&self) -> bool {
        codes::is_must_understand_fault_code(&self.code)
    }

    pub fn is_version_mismatch_fault(&self) -> bool {
        codes::is_version_mismatch_fault_code(&self.code)
    }

    /// Vrai si la chaîne de sous-codes contient ce code.
    pub fn has_subcode(&self, code: &QName) -> bool {
        self.subcode.as_ref().is_some_and(|s| s.contains(code))
    }

    /// Copie destinée au fil : si `suppress`, le message devient générique
    /// et le détail disparaît, le code reste inchangé.
    pub fn for_wire(&self, suppress: bool) -> SoapException {
        let mut e = self.clone();
        if suppress {
            e.message = SUPPRESSED_MESSAGE.to_string();
            e.detail = None;
        }
        if e.header_fault {
            e.detail = None;
        }
        e
    }
}

impl fmt::Display for SoapException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.name, self.message)
    }
}

impl std::error::Error for SoapException {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subcode_chain() {
        let chain = SoapFaultSubCode::with_subcode(
            QName::new("urn:a", "One"),
            SoapFaultSubCode::new(QName::new("urn:a", "Two")),
        );
        assert_eq!(chain.depth(), 2);
        assert!(chain.contains(&QName::new("urn:a", "Two")));
        assert!(!chain.contains(&QName::new("urn:a", "Three")));
    }

    #[test]
    fn test_suppression_keeps_code() {
        let e = SoapException::client("secret")
            .with_detail(Element::new("detail"))
            .for_wire(true);
        assert_eq!(e.code, codes::client());
        assert_eq!(e.message, SUPPRESSED_MESSAGE);
        assert!(e.detail.is_none());
    }

    #[test]
    fn test_header_fault_has_no_detail() {
        let e = SoapException::must_understand("h")
            .with_detail(Element::new("detail"))
            .for_wire(false);
        assert!(e.header_fault);
        assert!(e.detail.is_none());
        assert!(e.is_must_understand_fault());
    }

    #[test]
    fn test_unable_to_process_wraps() {
        let e = SoapException::unable_to_process("boom");
        assert!(e.is_server_fault());
        assert!(e.message.starts_with(UNABLE_TO_PROCESS));
        assert!(e.message.ends_with("boom"));
    }
}
