//! Forme des fautes sur le fil, SOAP 1.1 et 1.2.

use xmltree::{Element, XMLNode};

use crate::fault::{MAX_SUBCODE_DEPTH, SoapException, SoapFaultSubCode, codes};
use crate::soap::{SoapVersion, soap_name};
use crate::xml::{self, QName};

/// Construit l'élément `soap:Fault` pour la version donnée.
///
/// Le code est traduit vers la version active ; les sous-codes ne sont
/// écrits qu'en SOAP 1.2.
pub fn write_fault(version: SoapVersion, e: &SoapException) -> Element {
    let mut fault = Element::new(&soap_name("Fault"));
    match version {
        SoapVersion::Soap11 => {
            let code = codes::to_soap11(&e.code);
            let mut faultcode = Element::new("faultcode");
            let text = qualified_text(&mut faultcode, &code, version, 0);
            faultcode.children.push(XMLNode::Text(text));
            xml::push_child(&mut fault, faultcode);

            let mut faultstring = xml::text_element("faultstring", &e.message);
            if let Some(lang) = &e.lang {
                xml::set_attr(&mut faultstring, "xml:lang", lang);
            }
            xml::push_child(&mut fault, faultstring);

            if !e.actor.is_empty() {
                xml::push_child(&mut fault, xml::text_element("faultactor", &e.actor));
            }
            if let Some(detail) = &e.detail {
                xml::push_child(&mut fault, detail_wrapper("detail", detail));
            }
        }
        SoapVersion::Soap12 => {
            let code = codes::to_soap12(&e.code);
            let mut code_elem = Element::new(&soap_name("Code"));
            xml::push_child(&mut code_elem, value_element(&code, version, 0));
            if let Some(sub) = &e.subcode {
                xml::push_child(&mut code_elem, subcode_element(sub, version, 1));
            }
            xml::push_child(&mut fault, code_elem);

            let mut reason = Element::new(&soap_name("Reason"));
            let mut text = xml::text_element(&soap_name("Text"), &e.message);
            xml::set_attr(&mut text, "xml:lang", e.lang.as_deref().unwrap_or("en"));
            xml::push_child(&mut reason, text);
            xml::push_child(&mut fault, reason);

            if !e.node.is_empty() {
                xml::push_child(&mut fault, xml::text_element(&soap_name("Node"), &e.node));
            }
            let role = if e.role.is_empty() { &e.actor } else { &e.role };
            if !role.is_empty() {
                xml::push_child(&mut fault, xml::text_element(&soap_name("Role"), role));
            }
            if let Some(detail) = &e.detail {
                xml::push_child(&mut fault, detail_wrapper(&soap_name("Detail"), detail));
            }
        }
    }
    fault
}

/// Relit un élément `Fault` parsé.
pub fn read_fault(version: SoapVersion, fault: &Element) -> SoapException {
    match version {
        SoapVersion::Soap11 => {
            let code = xml::find_child_local(fault, "faultcode")
                .map(|c| xml::resolve_qname(c, &xml::text(c)))
                .unwrap_or_default();
            let faultstring = xml::find_child_local(fault, "faultstring");
            let mut e = SoapException::new(
                faultstring.map(xml::text).unwrap_or_default(),
                code,
            );
            e.lang = faultstring.and_then(|s| xml::attribute(s, "lang")).map(str::to_string);
            e.actor = xml::find_child_local(fault, "faultactor")
                .map(xml::text)
                .unwrap_or_default();
            e.detail = xml::find_child_local(fault, "detail").cloned();
            e
        }
        SoapVersion::Soap12 => {
            let code_elem = xml::find_child_local(fault, "Code");
            let code = code_elem
                .and_then(|c| xml::find_child_local(c, "Value"))
                .map(|v| xml::resolve_qname(v, &xml::text(v)))
                .unwrap_or_default();
            let subcode = code_elem
                .and_then(|c| xml::find_child_local(c, "Subcode"))
                .and_then(|s| read_subcode(s, 1));

            let text = xml::find_child_local(fault, "Reason")
                .and_then(|r| xml::find_child_local(r, "Text"));
            let mut e = SoapException::new(text.map(xml::text).unwrap_or_default(), code);
            e.lang = text.and_then(|t| xml::attribute(t, "lang")).map(str::to_string);
            e.subcode = subcode;
            e.node = xml::find_child_local(fault, "Node")
                .map(xml::text)
                .unwrap_or_default();
            e.role = xml::find_child_local(fault, "Role")
                .map(xml::text)
                .unwrap_or_default();
            e.detail = xml::find_child_local(fault, "Detail").cloned();
            e
        }
    }
}

fn read_subcode(elem: &Element, depth: usize) -> Option<SoapFaultSubCode> {
    if depth > MAX_SUBCODE_DEPTH {
        return None;
    }
    let value = xml::find_child_local(elem, "Value")?;
    let code = xml::resolve_qname(value, &xml::text(value));
    let next = xml::find_child_local(elem, "Subcode").and_then(|s| read_subcode(s, depth + 1));
    Some(SoapFaultSubCode {
        code,
        subcode: next.map(Box::new),
    })
}

fn subcode_element(sub: &SoapFaultSubCode, version: SoapVersion, idx: usize) -> Element {
    let mut elem = Element::new(&soap_name("Subcode"));
    xml::push_child(&mut elem, value_element(&sub.code, version, idx));
    if let Some(next) = &sub.subcode {
        xml::push_child(&mut elem, subcode_element(next, version, idx + 1));
    }
    elem
}

fn value_element(code: &QName, version: SoapVersion, idx: usize) -> Element {
    let mut value = Element::new(&soap_name("Value"));
    let text = qualified_text(&mut value, code, version, idx);
    value.children.push(XMLNode::Text(text));
    value
}

// Préfixe le nom du code, en déclarant un namespace local si besoin.
fn qualified_text(elem: &mut Element, code: &QName, version: SoapVersion, idx: usize) -> String {
    if code.namespace.is_empty() {
        code.name.clone()
    } else if code.namespace == version.envelope_ns() {
        soap_name(&code.name)
    } else {
        let prefix = format!("q{}", idx);
        xml::set_attr(elem, &format!("xmlns:{}", prefix), &code.namespace);
        format!("{}:{}", prefix, code.name)
    }
}

fn detail_wrapper(name: &str, detail: &Element) -> Element {
    let mut wrapper = Element::new(name);
    wrapper.children = detail.children.clone();
    wrapper
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soap::{EnvelopeOptions, read_envelope, write_envelope};

    fn roundtrip(version: SoapVersion, e: &SoapException) -> SoapException {
        let fault = write_fault(version, e);
        let bytes = write_envelope(&EnvelopeOptions::new(version), None, vec![fault]).unwrap();
        let env = read_envelope(&bytes).unwrap();
        read_fault(version, env.first_body_element().unwrap())
    }

    #[test]
    fn test_soap11_fault() {
        let e = SoapException::server("boom").with_actor("urn:actor");
        let back = roundtrip(SoapVersion::Soap11, &e);
        assert_eq!(back.code, codes::server());
        assert_eq!(back.message, "boom");
        assert_eq!(back.actor, "urn:actor");
    }

    #[test]
    fn test_soap12_translates_codes_and_keeps_subcodes() {
        let e = SoapException::client("bad media").with_subcode(SoapFaultSubCode::with_subcode(
            codes::unsupported_media_type(),
            SoapFaultSubCode::new(QName::new("urn:app", "Detail")),
        ));
        let back = roundtrip(SoapVersion::Soap12, &e);
        assert_eq!(back.code, codes::sender());
        assert!(back.has_subcode(&codes::unsupported_media_type()));
        assert!(back.has_subcode(&QName::new("urn:app", "Detail")));
        assert_eq!(back.lang.as_deref(), Some("en"));
    }

    #[test]
    fn test_soap11_downgrades_receiver() {
        let e = SoapException::new("x", codes::receiver());
        let back = roundtrip(SoapVersion::Soap11, &e);
        assert_eq!(back.code, codes::server());
    }

    #[test]
    fn test_custom_code_namespace_declared() {
        let e = SoapException::new("quota", QName::new("urn:app", "Quota"));
        let back = roundtrip(SoapVersion::Soap11, &e);
        assert_eq!(back.code, QName::new("urn:app", "Quota"));
    }

    #[test]
    fn test_detail_children_copied() {
        let mut detail = Element::new("detail");
        xml::push_child(&mut detail, xml::text_element("reason", "disk full"));
        let e = SoapException::server("x").with_detail(detail);
        let back = roundtrip(SoapVersion::Soap12, &e);
        let d = back.detail.unwrap();
        assert_eq!(d.name, "Detail");
        assert_eq!(xml::text(xml::find_child_local(&d, "reason").unwrap()), "disk full");
    }

    #[test]
    fn test_subcode_depth_is_bounded() {
        let mut chain = SoapFaultSubCode::new(QName::new("urn:a", "Leaf"));
        for i in 0..150 {
            chain = SoapFaultSubCode::with_subcode(QName::new("urn:a", format!("L{}", i)), chain);
        }
        let e = SoapException::server("deep").with_subcode(chain);
        let back = roundtrip(SoapVersion::Soap12, &e);
        assert_eq!(back.subcode.unwrap().depth(), MAX_SUBCODE_DEPTH);
    }
}
