//! Lecture de l'enveloppe SOAP

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use thiserror::Error;
use xmltree::Element;

use crate::xml::{self, QName};

/// Enveloppe parsée : le namespace décide de la version.
#[derive(Debug, Clone)]
pub struct ParsedEnvelope {
    /// Namespace de l'élément `Envelope`
    pub namespace: String,

    /// Élément `Header` s'il est présent
    pub header: Option<Element>,

    /// Élément `Body`
    pub body: Element,
}

impl ParsedEnvelope {
    /// Premier élément du corps.
    pub fn first_body_element(&self) -> Option<&Element> {
        xml::child_elements(&self.body).next()
    }
}

/// Erreur de lecture d'enveloppe
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("XML parse error: {0}")]
    Xml(#[from] xmltree::ParseError),

    #[error("XML read error: {0}")]
    Peek(String),

    #[error("Root element {0} is not a SOAP Envelope")]
    NotAnEnvelope(QName),

    #[error("Missing SOAP Body")]
    MissingBody,
}

impl EnvelopeError {
    /// Vrai si le document n'est pas du XML bien formé.
    pub fn is_xml_error(&self) -> bool {
        matches!(self, EnvelopeError::Xml(_) | EnvelopeError::Peek(_))
    }
}

/// Parse une enveloppe complète, sans vérifier sa version.
pub fn read_envelope(bytes: &[u8]) -> Result<ParsedEnvelope, EnvelopeError> {
    let root = xml::parse(bytes)?;
    if root.name != "Envelope" {
        return Err(EnvelopeError::NotAnEnvelope(QName::of(&root)));
    }
    let namespace = root.namespace.clone().unwrap_or_default();

    let header = xml::find_child(&root, &namespace, "Header").cloned();
    let body = xml::find_child(&root, &namespace, "Body")
        .cloned()
        .ok_or(EnvelopeError::MissingBody)?;

    Ok(ParsedEnvelope {
        namespace,
        header,
        body,
    })
}

/// Nom qualifié du premier élément du corps, lu en flux.
///
/// Le tampon n'est pas consommé : la désérialisation relira le document
/// complet ensuite.
pub fn peek_body_element(bytes: &[u8]) -> Result<Option<QName>, EnvelopeError> {
    let mut reader = NsReader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();

    loop {
        let (resolved, event) = reader
            .read_resolved_event_into(&mut buf)
            .map_err(|e| EnvelopeError::Peek(e.to_string()))?;

        let in_body = path.len() == 2 && path[0] == b"Envelope" && path[1] == b"Body";
        match event {
            Event::Start(ref e) | Event::Empty(ref e) if in_body => {
                let namespace = match resolved {
                    ResolveResult::Bound(Namespace(ns)) => String::from_utf8_lossy(ns).into_owned(),
                    _ => String::new(),
                };
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                return Ok(Some(QName::new(namespace, name)));
            }
            Event::Start(ref e) => {
                path.push(e.local_name().as_ref().to_vec());
            }
            Event::End(_) => {
                if path.pop().is_none() {
                    return Ok(None);
                }
                if in_body {
                    // Corps vide
                    return Ok(None);
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

/// Namespace de l'élément racine, lu en flux.
pub fn peek_envelope_namespace(bytes: &[u8]) -> Result<Option<String>, EnvelopeError> {
    let mut reader = NsReader::from_reader(bytes);
    let mut buf = Vec::new();
    loop {
        let (resolved, event) = reader
            .read_resolved_event_into(&mut buf)
            .map_err(|e| EnvelopeError::Peek(e.to_string()))?;
        match event {
            Event::Start(_) | Event::Empty(_) => {
                return Ok(Some(match resolved {
                    ResolveResult::Bound(Namespace(ns)) => String::from_utf8_lossy(ns).into_owned(),
                    _ => String::new(),
                }));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soap::ns;

    const ADD: &str = r#"<?xml version="1.0"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Header><h:Auth xmlns:h="urn:h"><User>u</User></h:Auth></soap:Header>
  <soap:Body>
    <Add xmlns="http://tempuri.org/"><a>2</a><b>3</b></Add>
  </soap:Body>
</soap:Envelope>"#;

    #[test]
    fn test_read_envelope() {
        let env = read_envelope(ADD.as_bytes()).unwrap();
        assert_eq!(env.namespace, ns::SOAP11_ENVELOPE);
        assert!(env.header.is_some());
        let first = env.first_body_element().unwrap();
        assert_eq!(QName::of(first), QName::new("http://tempuri.org/", "Add"));
    }

    #[test]
    fn test_peek_skips_header() {
        let q = peek_body_element(ADD.as_bytes()).unwrap();
        assert_eq!(q, Some(QName::new("http://tempuri.org/", "Add")));
    }

    #[test]
    fn test_peek_envelope_namespace() {
        assert_eq!(
            peek_envelope_namespace(ADD.as_bytes()).unwrap().as_deref(),
            Some(ns::SOAP11_ENVELOPE)
        );
        assert_eq!(peek_envelope_namespace(b"").unwrap(), None);
    }

    #[test]
    fn test_peek_empty_body() {
        let doc = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"><s:Body/></s:Envelope>"#;
        assert_eq!(peek_body_element(doc.as_bytes()).unwrap(), None);
        let doc = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"><s:Body></s:Body></s:Envelope>"#;
        assert_eq!(peek_body_element(doc.as_bytes()).unwrap(), None);
    }

    #[test]
    fn test_not_an_envelope() {
        let err = read_envelope(b"<Foo/>").unwrap_err();
        assert!(matches!(err, EnvelopeError::NotAnEnvelope(_)));
        let err = read_envelope(b"<Envelope").unwrap_err();
        assert!(err.is_xml_error());
    }
}
