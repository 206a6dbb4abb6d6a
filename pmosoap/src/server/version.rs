//! Choix et contrôle de la version SOAP d'une requête entrante.

use percent_encoding::percent_decode_str;
use tracing::debug;
use xmltree::Element;

use crate::content_type;
use crate::fault::SoapException;
use crate::soap::{Protocols, SoapVersion, ns, soap_name};
use crate::xml;

/// Version présumée avant lecture de l'enveloppe.
///
/// Avec les deux versions activées, une requête sans en-tête `SOAPAction`
/// ou de type `application/soap+xml` est traitée en 1.2.
pub fn guess_version(
    protocols: Protocols,
    soap_action: Option<&str>,
    content_type: &str,
) -> SoapVersion {
    if protocols.contains(Protocols::ANY_HTTP_SOAP) {
        if soap_action.is_none()
            || content_type::matches_base(content_type, content_type::APPLICATION_SOAP)
        {
            SoapVersion::Soap12
        } else {
            SoapVersion::Soap11
        }
    } else if protocols.contains(Protocols::HTTP_SOAP12) {
        SoapVersion::Soap12
    } else {
        SoapVersion::Soap11
    }
}

/// Compare le namespace reçu à la version courante.
///
/// En cas d'écart, renvoie la version à utiliser pour répondre et la faute
/// `VersionMismatch` à lever.
pub fn check_version(
    protocols: Protocols,
    current: SoapVersion,
    request_ns: &str,
) -> Result<(), (SoapVersion, SoapException)> {
    if request_ns != current.envelope_ns() {
        let fallback = if protocols.supports(SoapVersion::Soap11) {
            SoapVersion::Soap11
        } else {
            SoapVersion::Soap12
        };
        debug!("🔀 Enveloppe {} reçue, réponse en {}", request_ns, fallback);
        return Err((fallback, invalid_envelope_ns(request_ns, fallback.envelope_ns())));
    }
    if protocols.supports(current) {
        return Ok(());
    }
    let expected = if protocols.supports(SoapVersion::Soap11) {
        ns::SOAP11_ENVELOPE
    } else {
        ns::SOAP12_ENVELOPE
    };
    Err((SoapVersion::Soap11, invalid_envelope_ns(request_ns, expected)))
}

fn invalid_envelope_ns(found: &str, expected: &str) -> SoapException {
    SoapException::version_mismatch(format!(
        "Possible SOAP version mismatch: Envelope namespace {} was unexpected. Expecting {}.",
        found, expected
    ))
}

/// Action transmise : guillemets retirés puis décodage `%XX`.
pub fn unescape_action(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|a| a.strip_suffix('"'))
        .unwrap_or(trimmed);
    percent_decode_str(unquoted).decode_utf8_lossy().into_owned()
}

/// Action de la requête : en-tête `SOAPAction` en 1.1, paramètre `action`
/// du type de contenu en 1.2.
pub fn request_action(
    version: SoapVersion,
    soap_action_header: Option<&str>,
    content_type: &str,
) -> Option<String> {
    match version {
        SoapVersion::Soap11 => soap_action_header.map(unescape_action),
        SoapVersion::Soap12 => content_type::action(content_type).map(|a| unescape_action(&a)),
    }
}

/// En-tête `Upgrade` listant les enveloppes acceptées.
pub fn upgrade_header(protocols: Protocols) -> Element {
    let mut header = Element::new(&soap_name("Header"));
    let mut upgrade = Element::new("soap12:Upgrade");
    xml::set_attr(&mut upgrade, "xmlns:soap12", ns::SOAP12_ENVELOPE);
    for version in protocols.soap_versions() {
        let prefix = match version {
            SoapVersion::Soap11 => "soap11",
            SoapVersion::Soap12 => "soap12",
        };
        let mut supported = Element::new("soap12:SupportedEnvelope");
        xml::set_attr(&mut supported, "qname", &format!("{}:Envelope", prefix));
        xml::set_attr(&mut supported, &format!("xmlns:{}", prefix), version.envelope_ns());
        xml::push_child(&mut upgrade, supported);
    }
    xml::push_child(&mut header, upgrade);
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_version_both_enabled() {
        let both = Protocols::ANY_HTTP_SOAP;
        assert_eq!(guess_version(both, None, "text/xml"), SoapVersion::Soap12);
        assert_eq!(
            guess_version(both, Some("\"a\""), "text/xml; charset=utf-8"),
            SoapVersion::Soap11
        );
        assert_eq!(
            guess_version(both, Some("\"a\""), "application/soap+xml"),
            SoapVersion::Soap12
        );
    }

    #[test]
    fn test_guess_version_single() {
        assert_eq!(
            guess_version(Protocols::HTTP_SOAP, None, "application/soap+xml"),
            SoapVersion::Soap11
        );
        assert_eq!(
            guess_version(Protocols::HTTP_SOAP12, Some("x"), "text/xml"),
            SoapVersion::Soap12
        );
    }

    #[test]
    fn test_check_version_switches_helper() {
        let (v, e) =
            check_version(Protocols::HTTP_SOAP, SoapVersion::Soap11, ns::SOAP12_ENVELOPE).unwrap_err();
        assert_eq!(v, SoapVersion::Soap11);
        assert!(e.is_version_mismatch_fault());

        let (v, _) =
            check_version(Protocols::HTTP_SOAP12, SoapVersion::Soap12, "urn:bogus").unwrap_err();
        assert_eq!(v, SoapVersion::Soap12);

        assert!(check_version(Protocols::ALL, SoapVersion::Soap12, ns::SOAP12_ENVELOPE).is_ok());
        let (v, _) =
            check_version(Protocols::HTTP_SOAP12, SoapVersion::Soap11, ns::SOAP11_ENVELOPE).unwrap_err();
        assert_eq!(v, SoapVersion::Soap11);
    }

    #[test]
    fn test_unescape_action() {
        assert_eq!(unescape_action("\"http://tempuri.org/Add\""), "http://tempuri.org/Add");
        assert_eq!(unescape_action("urn:a%20b"), "urn:a b");
        assert_eq!(
            request_action(SoapVersion::Soap12, None, "application/soap+xml; action=\"urn:x\""),
            Some("urn:x".to_string())
        );
        assert_eq!(request_action(SoapVersion::Soap11, None, "text/xml"), None);
    }

    #[test]
    fn test_upgrade_header_lists_enabled_envelopes() {
        let header = upgrade_header(Protocols::HTTP_SOAP);
        let text = xml::to_string(&header).unwrap();
        assert!(text.contains("SupportedEnvelope"));
        assert!(text.contains(ns::SOAP11_ENVELOPE));
        let both = xml::to_string(&upgrade_header(Protocols::ANY_HTTP_SOAP)).unwrap();
        assert_eq!(both.matches("SupportedEnvelope ").count(), 2);
    }
}
