use std::sync::Arc;

use tracing::{debug, warn};
use xmltree::Element;

use crate::attributes::SoapHeaderDirection;
use crate::fault::SoapException;
use crate::headers::{
    HeaderContent, HeaderMemberValue, HeaderSlots, SharedHeader, SoapHeader, SoapHeaderCollection,
    SoapReflectedHeader,
};
use crate::mapping::{MappingError, RefTable, read_value, write_value};
use crate::soap::{SoapVersion, soap_name};
use crate::values::SchemaType;
use crate::xml::{self, QName};

const HEADER_ATTRIBUTES: [&str; 4] = ["mustUnderstand", "actor", "role", "relay"];

/// Lit le contenu de `<Header>` dans la collection.
///
/// Les en-têtes déclarés sont désérialisés dans leur emplacement et marqués
/// compris ; un doublon d'un en-tête déjà lu est ajouté ensuite sans être
/// compris ; les inconnus viennent en dernier, en XML brut.
///
/// Si `check_required` est vrai, renvoie le nom du premier en-tête requis
/// absent. L'appelant décide de l'erreur à lever.
pub fn read_headers(
    header: Option<&Element>,
    mappings: &[SoapReflectedHeader],
    direction: SoapHeaderDirection,
    check_required: bool,
    collection: &mut SoapHeaderCollection,
) -> Result<Option<QName>, MappingError> {
    let custom: Vec<&SoapReflectedHeader> = mappings
        .iter()
        .filter(|m| m.custom && m.direction.overlaps(direction))
        .collect();

    let Some(header) = header else {
        if check_required {
            return Ok(custom
                .iter()
                .find(|m| m.required)
                .and_then(|m| m.header_type.element_name()));
        }
        return Ok(None);
    };

    let refs = RefTable::new();
    let mut slots: Vec<Option<SharedHeader>> = vec![None; custom.len()];
    let mut unreferenced = Vec::new();
    let mut unknown = Vec::new();

    for element in xml::child_elements(header) {
        let qname = QName::of(element);
        let mapping = custom
            .iter()
            .position(|m| m.header_type.element_name().as_ref() == Some(&qname));

        match mapping {
            Some(i) => {
                let crate::headers::HeaderType::Custom(schema) = &custom[i].header_type else {
                    continue;
                };
                let value = read_value(element, &SchemaType::Struct(schema.clone()), &refs)?;
                let h = apply_wire_attributes(SoapHeader::known(schema.clone(), value), element);
                if slots[i].is_none() {
                    h.set_did_understand(true);
                    slots[i] = Some(h.shared());
                } else {
                    unreferenced.push(h.shared());
                }
            }
            None => {
                let h = apply_wire_attributes(SoapHeader::unknown(element.clone()), element);
                unknown.push(h.shared());
            }
        }
    }

    let mut missing = None;
    for (i, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(h) => collection.push(h),
            None if check_required && missing.is_none() && custom[i].required => {
                missing = custom[i].header_type.element_name();
            }
            None => {}
        }
    }
    for h in unreferenced.into_iter().chain(unknown) {
        collection.push(h);
    }

    if let Some(name) = &missing {
        debug!("🔍 En-tête requis absent: {}", name);
    }
    Ok(missing)
}

/// Construit `<soap:Header>` à partir de la collection.
///
/// Renvoie `None` si aucun en-tête n'est écrit.
pub fn write_headers(
    collection: &SoapHeaderCollection,
    mappings: &[SoapReflectedHeader],
    direction: SoapHeaderDirection,
    encoded: bool,
    version: SoapVersion,
) -> Result<Option<Element>, MappingError> {
    if collection.is_empty() {
        return Ok(None);
    }

    let custom: Vec<&SoapReflectedHeader> = mappings
        .iter()
        .filter(|m| m.custom && m.direction.overlaps(direction))
        .collect();
    let mut slots: Vec<Option<&SharedHeader>> = vec![None; custom.len()];
    let mut list: Vec<&SharedHeader> = Vec::new();

    for h in collection.iter() {
        if h.is_unknown() {
            list.push(h);
            continue;
        }
        let free = custom
            .iter()
            .enumerate()
            .position(|(i, m)| slots[i].is_none() && m.header_type.accepts(h));
        match free {
            Some(i) => slots[i] = Some(h),
            None => list.push(h),
        }
    }

    // Encoded : les en-têtes typés en trop suivent les emplacements fixes
    let mut ordered: Vec<&SharedHeader> = slots.into_iter().flatten().collect();
    if encoded {
        ordered.extend(list.iter().copied().filter(|h| !h.is_unknown()));
        ordered.extend(list.iter().copied().filter(|h| h.is_unknown()));
    } else {
        ordered.extend(list);
    }

    let mut header_elem = Element::new(&soap_name("Header"));
    for h in ordered {
        if let Some(e) = header_element(h, encoded, version)? {
            xml::push_child(&mut header_elem, e);
        }
    }

    if header_elem.children.is_empty() {
        Ok(None)
    } else {
        Ok(Some(header_elem))
    }
}

/// Affecte les en-têtes de la collection aux membres correspondants.
///
/// Un membre répété reçoit tous les en-têtes compatibles restants ; un
/// membre simple reçoit le premier, les suivants sont marqués non compris.
/// Côté serveur, un en-tête `mustUnderstand` resté sans membre et non
/// compris lève une faute `MustUnderstand`.
pub fn set_header_members(
    collection: &SoapHeaderCollection,
    target: &HeaderSlots,
    mappings: &[SoapReflectedHeader],
    direction: SoapHeaderDirection,
    client: bool,
) -> Result<(), SoapException> {
    let mut matched = vec![false; collection.len()];

    for mapping in mappings.iter().filter(|m| m.direction.overlaps(direction)) {
        if mapping.repeats {
            let mut all = Vec::new();
            for (i, h) in collection.iter().enumerate() {
                if !matched[i] && mapping.header_type.accepts(h) {
                    matched[i] = true;
                    all.push(h.clone());
                }
            }
            target.set(&mapping.member, Some(HeaderMemberValue::Array(all)));
        } else {
            let mut found = false;
            for (i, h) in collection.iter().enumerate() {
                if matched[i] || !mapping.header_type.accepts(h) {
                    continue;
                }
                if found {
                    h.set_did_understand(false);
                } else {
                    matched[i] = true;
                    found = true;
                    target.set(&mapping.member, Some(HeaderMemberValue::Single(h.clone())));
                }
            }
            if !found {
                target.set(&mapping.member, None);
            }
        }
    }

    if client {
        return Ok(());
    }
    for (i, h) in collection.iter().enumerate() {
        if !matched[i] && h.must_understand() && !h.did_understand() {
            warn!("❌ En-tête non compris: {}", h.name());
            return Err(not_understood(h));
        }
    }
    Ok(())
}

/// Ajoute à la collection les valeurs des membres d'en-tête.
pub fn get_header_members(
    collection: &mut SoapHeaderCollection,
    source: &HeaderSlots,
    mappings: &[SoapReflectedHeader],
    direction: SoapHeaderDirection,
) {
    for mapping in mappings.iter().filter(|m| m.direction.overlaps(direction)) {
        if let Some(value) = source.get(&mapping.member) {
            for h in value.headers() {
                collection.push(h);
            }
        }
    }
}

/// Vérifie qu'aucun en-tête `mustUnderstand` n'est resté non compris.
pub fn ensure_headers_understood(collection: &SoapHeaderCollection) -> Result<(), SoapException> {
    match collection
        .iter()
        .find(|h| h.must_understand() && !h.did_understand())
    {
        Some(h) => Err(not_understood(h)),
        None => Ok(()),
    }
}

fn not_understood(h: &SoapHeader) -> SoapException {
    SoapException::must_understand(format!("SOAP header {} was not understood.", h.name().name))
}

fn header_element(
    h: &SoapHeader,
    encoded: bool,
    version: SoapVersion,
) -> Result<Option<Element>, MappingError> {
    let mut element = match h.content() {
        HeaderContent::Known { schema, value } => {
            if value.is_null() {
                return Ok(None);
            }
            let mut e = write_value(
                &schema.name,
                &SchemaType::Struct(Arc::clone(schema)),
                value,
                encoded,
            )?;
            if let Some(ns) = &schema.namespace {
                xml::set_attr(&mut e, "xmlns", ns);
            }
            e
        }
        HeaderContent::Unknown(raw) => {
            let mut e = raw.clone();
            e.attributes.retain(|k, _| {
                let local = k.rsplit(':').next().unwrap_or(k);
                !HEADER_ATTRIBUTES.contains(&local)
            });
            e
        }
    };

    if h.must_understand() {
        let v = if version == SoapVersion::Soap12 { "true" } else { "1" };
        xml::set_attr(&mut element, &soap_name("mustUnderstand"), v);
    }
    if !h.actor().is_empty() {
        let attr = if version == SoapVersion::Soap12 { "role" } else { "actor" };
        xml::set_attr(&mut element, &soap_name(attr), h.actor());
    }
    if h.relay() && version == SoapVersion::Soap12 {
        xml::set_attr(&mut element, &soap_name("relay"), "true");
    }
    Ok(Some(element))
}

fn apply_wire_attributes(h: SoapHeader, element: &Element) -> SoapHeader {
    let flag = |name: &str| matches!(xml::attribute(element, name), Some("1") | Some("true"));
    let actor = xml::attribute(element, "actor")
        .or_else(|| xml::attribute(element, "role"))
        .unwrap_or_default()
        .to_string();
    h.must_understand_header(flag("mustUnderstand"))
        .with_relay(flag("relay"))
        .with_actor(&actor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::HeaderType;
    use crate::soap::ns;
    use crate::values::{StructType, Value};

    fn auth_schema() -> Arc<StructType> {
        Arc::new(
            StructType::new("Auth")
                .with_namespace("urn:h")
                .field("User", SchemaType::String),
        )
    }

    fn auth_mapping(direction: SoapHeaderDirection) -> SoapReflectedHeader {
        SoapReflectedHeader {
            member: "Auth".into(),
            header_type: HeaderType::Custom(auth_schema()),
            direction,
            repeats: false,
            custom: true,
            required: true,
        }
    }

    fn unknown_mapping() -> SoapReflectedHeader {
        SoapReflectedHeader {
            member: "Others".into(),
            header_type: HeaderType::Unknown,
            direction: SoapHeaderDirection::IN,
            repeats: true,
            custom: false,
            required: false,
        }
    }

    fn header(inner: &str) -> Element {
        let doc = format!(
            r#"<soap:Header xmlns:soap="{}">{}</soap:Header>"#,
            ns::SOAP11_ENVELOPE,
            inner
        );
        xml::parse(doc.as_bytes()).unwrap()
    }

    #[test]
    fn test_read_known_unknown_and_duplicates() {
        let h = header(
            r#"<x:Trace xmlns:x="urn:x" soap:mustUnderstand="1">t</x:Trace>
               <Auth xmlns="urn:h"><User>bob</User></Auth>
               <Auth xmlns="urn:h"><User>eve</User></Auth>"#,
        );
        let mut c = SoapHeaderCollection::new();
        let missing = read_headers(
            Some(&h),
            &[auth_mapping(SoapHeaderDirection::IN)],
            SoapHeaderDirection::IN,
            true,
            &mut c,
        )
        .unwrap();
        assert!(missing.is_none());
        assert_eq!(c.len(), 3);

        let first = c.get(0).unwrap();
        assert!(first.did_understand());
        assert_eq!(
            first.value().unwrap().field("User"),
            Some(&Value::String("bob".into()))
        );
        let dup = c.get(1).unwrap();
        assert!(!dup.did_understand());
        assert_eq!(dup.value().unwrap().field("User"), Some(&Value::String("eve".into())));
        let trace = c.get(2).unwrap();
        assert!(trace.is_unknown());
        assert!(trace.must_understand());
    }

    #[test]
    fn test_read_missing_required() {
        let mut c = SoapHeaderCollection::new();
        let missing = read_headers(
            None,
            &[auth_mapping(SoapHeaderDirection::IN)],
            SoapHeaderDirection::IN,
            true,
            &mut c,
        )
        .unwrap();
        assert_eq!(missing, Some(QName::new("urn:h", "Auth")));

        let empty = header("");
        let missing = read_headers(
            Some(&empty),
            &[auth_mapping(SoapHeaderDirection::IN)],
            SoapHeaderDirection::IN,
            true,
            &mut c,
        )
        .unwrap();
        assert_eq!(missing, Some(QName::new("urn:h", "Auth")));

        let not_checked = read_headers(
            None,
            &[auth_mapping(SoapHeaderDirection::IN)],
            SoapHeaderDirection::IN,
            false,
            &mut c,
        )
        .unwrap();
        assert!(not_checked.is_none());
    }

    #[test]
    fn test_write_omits_empty_header() {
        let c = SoapHeaderCollection::new();
        assert!(write_headers(&c, &[], SoapHeaderDirection::OUT, false, SoapVersion::Soap11)
            .unwrap()
            .is_none());

        let mut c = SoapHeaderCollection::new();
        c.push(SoapHeader::known(auth_schema(), Value::Null).shared());
        assert!(write_headers(
            &c,
            &[auth_mapping(SoapHeaderDirection::OUT)],
            SoapHeaderDirection::OUT,
            false,
            SoapVersion::Soap11
        )
        .unwrap()
        .is_none());
    }

    #[test]
    fn test_write_known_then_unknown() {
        let mut c = SoapHeaderCollection::new();
        let raw = header(r#"<x:Trace xmlns:x="urn:x">t</x:Trace>"#);
        let trace = xml::child_elements(&raw).next().unwrap().clone();
        c.push(SoapHeader::unknown(trace).must_understand_header(true).shared());
        c.push(
            SoapHeader::known(
                auth_schema(),
                Value::Struct(vec![("User".into(), Value::from("bob"))]),
            )
            .shared(),
        );
        let e = write_headers(
            &c,
            &[auth_mapping(SoapHeaderDirection::OUT)],
            SoapHeaderDirection::OUT,
            false,
            SoapVersion::Soap12,
        )
        .unwrap()
        .unwrap();
        let names: Vec<_> = xml::child_elements(&e).map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["Auth".to_string(), "Trace".to_string()]);
        let trace = xml::child_elements(&e).nth(1).unwrap();
        assert_eq!(trace.attributes.get("soap:mustUnderstand").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_set_members_single_and_repeat() {
        let mut c = SoapHeaderCollection::new();
        let a1 = SoapHeader::known(auth_schema(), Value::Null).shared();
        let a2 = SoapHeader::known(auth_schema(), Value::Null).shared();
        let u1 = SoapHeader::unknown(Element::new("U1")).shared();
        let u2 = SoapHeader::unknown(Element::new("U2")).shared();
        a2.set_did_understand(true);
        for h in [&a1, &a2, &u1, &u2] {
            c.push(h.clone());
        }

        let slots = HeaderSlots::new();
        set_header_members(
            &c,
            &slots,
            &[auth_mapping(SoapHeaderDirection::IN), unknown_mapping()],
            SoapHeaderDirection::IN,
            false,
        )
        .unwrap();

        assert!(Arc::ptr_eq(&slots.header("Auth").unwrap(), &a1));
        assert!(!a2.did_understand());
        match slots.get("Others").unwrap() {
            HeaderMemberValue::Array(v) => assert_eq!(v.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_set_members_must_understand_fault() {
        let mut c = SoapHeaderCollection::new();
        c.push(
            SoapHeader::unknown(Element::new("Secret"))
                .must_understand_header(true)
                .shared(),
        );
        let slots = HeaderSlots::new();
        let err = set_header_members(
            &c,
            &slots,
            &[auth_mapping(SoapHeaderDirection::IN)],
            SoapHeaderDirection::IN,
            false,
        )
        .unwrap_err();
        assert!(err.is_must_understand_fault());
        assert!(err.message.contains("Secret"));

        // Côté client, pas de contrôle
        set_header_members(&c, &slots, &[], SoapHeaderDirection::OUT, true).unwrap();
    }

    #[test]
    fn test_get_members_and_ensure() {
        let slots = HeaderSlots::new();
        let h = SoapHeader::known(auth_schema(), Value::Null)
            .must_understand_header(true)
            .shared();
        slots.set("Auth", Some(HeaderMemberValue::Single(h.clone())));
        let mut c = SoapHeaderCollection::new();
        get_header_members(
            &mut c,
            &slots,
            &[auth_mapping(SoapHeaderDirection::IN_OUT)],
            SoapHeaderDirection::OUT,
        );
        assert_eq!(c.len(), 1);
        assert!(ensure_headers_understood(&c).is_err());
        h.set_did_understand(true);
        assert!(ensure_headers_understood(&c).is_ok());
    }
}
