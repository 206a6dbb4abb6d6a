use std::collections::HashMap;

use xmltree::Element;

use crate::mapping::{MappingError, MembersMapping};
use crate::values::{SchemaType, Value};
use crate::xml;

/// Table des éléments `id` d'un corps encodé, pour résoudre les `href`.
#[derive(Debug, Default)]
pub struct RefTable<'a> {
    ids: HashMap<String, &'a Element>,
}

impl<'a> RefTable<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexe les enfants de premier niveau portant un attribut `id`.
    pub fn from_body(body: &'a Element) -> Self {
        let ids = xml::child_elements(body)
            .filter_map(|e| xml::attribute(e, "id").map(|id| (id.to_string(), e)))
            .collect();
        Self { ids }
    }

    /// Suit un `href="#id"` éventuel.
    pub fn resolve(&self, element: &'a Element) -> Result<&'a Element, MappingError> {
        match xml::attribute(element, "href") {
            Some(href) => {
                let id = href.strip_prefix('#').unwrap_or(href);
                self.ids
                    .get(id)
                    .copied()
                    .ok_or_else(|| MappingError::UnresolvedRef(href.to_string()))
            }
            None => Ok(element),
        }
    }
}

/// Relit les valeurs d'une correspondance depuis l'élément `Body`.
///
/// Les membres sont retrouvés par nom local, dans n'importe quel ordre ;
/// un membre absent vaut [`Value::Null`].
pub fn read_members(mapping: &MembersMapping, body: &Element) -> Result<Vec<Value>, MappingError> {
    let refs = RefTable::from_body(body);

    let container = if mapping.has_wrapper {
        let wrapper = xml::child_elements(body)
            .find(|e| mapping.element.matches(e))
            .ok_or_else(|| MappingError::MissingElement(mapping.element.clone()))?;
        refs.resolve(wrapper)?
    } else {
        body
    };

    mapping
        .members
        .iter()
        .map(|member| match xml::find_child_local(container, &member.name) {
            Some(e) => read_value(e, &member.ty, &refs).map_err(|err| match err {
                MappingError::Value { source, .. } => MappingError::value(&member.name, source),
                other => other,
            }),
            None => Ok(Value::Null),
        })
        .collect()
}

/// Relit une valeur depuis un élément selon son type déclaré.
pub fn read_value<'a>(
    element: &'a Element,
    ty: &SchemaType,
    refs: &RefTable<'a>,
) -> Result<Value, MappingError> {
    let element = refs.resolve(element)?;
    if matches!(xml::attribute(element, "nil"), Some("true") | Some("1")) {
        return Ok(Value::Null);
    }

    match ty {
        SchemaType::Array(item_ty) => xml::child_elements(element)
            .map(|child| read_value(child, item_ty, refs))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        SchemaType::Struct(st) => {
            let mut fields = Vec::with_capacity(st.fields.len());
            for field in &st.fields {
                let v = match xml::find_child_local(element, &field.name) {
                    Some(child) => read_value(child, &field.ty, refs)?,
                    None => Value::Null,
                };
                fields.push((field.name.clone(), v));
            }
            Ok(Value::Struct(fields))
        }
        scalar => scalar
            .parse_value(&xml::text(element))
            .map_err(|err| MappingError::value(&element.name, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{MemberMapping, write_members};
    use crate::values::StructType;
    use crate::xml::QName;
    use std::sync::Arc;

    fn body(inner: &str) -> Element {
        let doc = format!(
            r#"<Body xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">{}</Body>"#,
            inner
        );
        xml::parse(doc.as_bytes()).unwrap()
    }

    fn add_mapping() -> MembersMapping {
        MembersMapping::wrapped(
            QName::new("http://tempuri.org/", "Add"),
            vec![
                MemberMapping::new("a", SchemaType::Int),
                MemberMapping::new("b", SchemaType::Int),
            ],
        )
    }

    #[test]
    fn test_read_wrapped_any_order_and_missing() {
        let b = body(r#"<Add xmlns="http://tempuri.org/"><b>3</b></Add>"#);
        let values = read_members(&add_mapping(), &b).unwrap();
        assert_eq!(values, vec![Value::Null, Value::Int(3)]);
    }

    #[test]
    fn test_read_wrapper_namespace_must_match() {
        let b = body(r#"<Add xmlns="urn:other"><a>1</a></Add>"#);
        assert!(matches!(
            read_members(&add_mapping(), &b),
            Err(MappingError::MissingElement(_))
        ));
    }

    #[test]
    fn test_read_nil_and_bad_value() {
        let b = body(r#"<Add xmlns="http://tempuri.org/"><a xsi:nil="true"/><b>x</b></Add>"#);
        let err = read_members(&add_mapping(), &b).unwrap_err();
        match err {
            MappingError::Value { member, .. } => assert_eq!(member, "b"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_read_encoded_href() {
        let point = Arc::new(StructType::new("Point").field("X", SchemaType::Int));
        let mapping = MembersMapping::wrapped(
            QName::new("urn:calc", "Move"),
            vec![MemberMapping::new("p", SchemaType::Struct(point))],
        )
        .with_rpc(true);
        let b = body(
            r##"<q1:Move xmlns:q1="urn:calc"><p href="#id1"/></q1:Move><q2:Point id="id1" xmlns:q2="urn:types"><X>7</X></q2:Point>"##,
        );
        let values = read_members(&mapping, &b).unwrap();
        assert_eq!(values[0].field("X"), Some(&Value::Int(7)));

        let bad = body(r##"<q1:Move xmlns:q1="urn:calc"><p href="#nope"/></q1:Move>"##);
        assert!(matches!(
            read_members(&mapping, &bad),
            Err(MappingError::UnresolvedRef(_))
        ));
    }

    #[test]
    fn test_written_members_read_back() {
        let mapping = add_mapping();
        let elements = write_members(&mapping, &[Value::Int(2), Value::Int(3)]).unwrap();
        let mut b = Element::new("Body");
        for e in elements {
            xml::push_child(&mut b, e);
        }
        // Repasse par le texte pour résoudre les namespaces
        let reparsed = xml::parse(&xml::to_bytes(&b, false).unwrap()).unwrap();
        assert_eq!(
            read_members(&mapping, &reparsed).unwrap(),
            vec![Value::Int(2), Value::Int(3)]
        );
    }
}
