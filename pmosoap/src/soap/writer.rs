//! Construction de l'enveloppe SOAP

use xmltree::Element;

use crate::soap::{SoapVersion, ns};
use crate::xml;

/// Préfixe de l'enveloppe sur le fil.
pub const SOAP_PREFIX: &str = "soap";

/// Déclarations portées par l'élément `Envelope`.
#[derive(Debug, Clone)]
pub struct EnvelopeOptions {
    pub version: SoapVersion,

    /// Sérialisation SOAP-encoded : déclare `soapenc`, `tns` et `types`
    pub encoded: bool,

    /// Déclare `rpc` (SOAP 1.2 seulement)
    pub rpc: bool,

    /// Namespace cible du service (`tns`)
    pub target_namespace: String,

    /// Namespace des types encodés (`types`)
    pub types_namespace: String,
}

impl EnvelopeOptions {
    pub fn new(version: SoapVersion) -> Self {
        Self {
            version,
            encoded: false,
            rpc: false,
            target_namespace: String::new(),
            types_namespace: String::new(),
        }
    }
}

/// Nom préfixé dans le namespace de l'enveloppe (`soap:Body`…).
pub fn soap_name(local: &str) -> String {
    format!("{}:{}", SOAP_PREFIX, local)
}

/// Écrit une enveloppe complète avec sa déclaration XML.
///
/// `header` est l'élément `soap:Header` déjà construit (ou rien), `body`
/// les enfants de `soap:Body` dans l'ordre.
pub fn write_envelope(
    options: &EnvelopeOptions,
    header: Option<Element>,
    body: Vec<Element>,
) -> Result<Vec<u8>, xmltree::Error> {
    let envelope_ns = options.version.envelope_ns();

    let mut envelope = Element::new(&soap_name("Envelope"));
    xml::set_attr(&mut envelope, "xmlns:soap", envelope_ns);
    xml::set_attr(&mut envelope, "xmlns:xsi", ns::XSI);
    xml::set_attr(&mut envelope, "xmlns:xsd", ns::XSD);
    if options.encoded {
        xml::set_attr(&mut envelope, "xmlns:soapenc", options.version.encoding_ns());
        if !options.target_namespace.is_empty() {
            xml::set_attr(&mut envelope, "xmlns:tns", &options.target_namespace);
        }
        if !options.types_namespace.is_empty() {
            xml::set_attr(&mut envelope, "xmlns:types", &options.types_namespace);
        }
    }
    if options.rpc && options.version == SoapVersion::Soap12 {
        xml::set_attr(&mut envelope, "xmlns:rpc", ns::SOAP12_RPC);
    }

    if let Some(header) = header {
        xml::push_child(&mut envelope, header);
    }

    let mut body_elem = Element::new(&soap_name("Body"));
    if options.encoded && options.version == SoapVersion::Soap11 {
        xml::set_attr(
            &mut body_elem,
            &soap_name("encodingStyle"),
            options.version.encoding_ns(),
        );
    }
    for mut child in body {
        // En 1.2 l'attribut encodingStyle est interdit sur Body
        if options.encoded && options.version == SoapVersion::Soap12 {
            xml::set_attr(
                &mut child,
                &soap_name("encodingStyle"),
                options.version.encoding_ns(),
            );
        }
        xml::push_child(&mut body_elem, child);
    }
    xml::push_child(&mut envelope, body_elem);

    xml::to_bytes(&envelope, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soap::read_envelope;

    #[test]
    fn test_write_literal_envelope() {
        let opts = EnvelopeOptions::new(SoapVersion::Soap12);
        let mut add = Element::new("AddResponse");
        xml::set_attr(&mut add, "xmlns", "http://tempuri.org/");
        let bytes = write_envelope(&opts, None, vec![add]).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(!text.contains("Header"));
        assert!(!text.contains("soapenc"));

        let env = read_envelope(&bytes).unwrap();
        assert_eq!(env.namespace, ns::SOAP12_ENVELOPE);
        assert_eq!(env.first_body_element().unwrap().name, "AddResponse");
    }

    #[test]
    fn test_write_encoded_envelope_declares_prefixes() {
        let mut opts = EnvelopeOptions::new(SoapVersion::Soap11);
        opts.encoded = true;
        opts.target_namespace = "http://tempuri.org/".into();
        opts.types_namespace = "http://tempuri.org/encodedTypes".into();
        let bytes = write_envelope(&opts, None, vec![Element::new("q1:Add")]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("xmlns:soapenc=\"http://schemas.xmlsoap.org/soap/encoding/\""));
        assert!(text.contains("xmlns:types=\"http://tempuri.org/encodedTypes\""));
        assert!(text.contains("soap:encodingStyle"));
    }
}
