use xmltree::Element;

use crate::mapping::{MappingError, MembersMapping};
use crate::values::{SchemaType, Value, ValueError};
use crate::xml;

const WRAPPER_PREFIX: &str = "q1";

/// Écrit les valeurs selon la correspondance et renvoie les éléments de
/// premier niveau à placer dans le corps (un seul s'il y a un enveloppe).
pub fn write_members(
    mapping: &MembersMapping,
    values: &[Value],
) -> Result<Vec<Element>, MappingError> {
    if values.len() != mapping.members.len() {
        return Err(MappingError::ArityMismatch {
            expected: mapping.members.len(),
            found: values.len(),
        });
    }

    let namespace = mapping.element.namespace.as_str();
    let mut children = Vec::with_capacity(values.len());
    for (member, value) in mapping.members.iter().zip(values) {
        let mut e = write_value(&member.name, &member.ty, value, mapping.encoded)?;
        if !mapping.has_wrapper && !namespace.is_empty() {
            xml::set_attr(&mut e, "xmlns", namespace);
        }
        children.push(e);
    }

    if !mapping.has_wrapper {
        return Ok(children);
    }

    let mut wrapper = if mapping.rpc || mapping.encoded {
        let mut w = Element::new(&format!("{}:{}", WRAPPER_PREFIX, mapping.element.name));
        xml::set_attr(&mut w, &format!("xmlns:{}", WRAPPER_PREFIX), namespace);
        w
    } else {
        let mut w = Element::new(&mapping.element.name);
        if !namespace.is_empty() {
            xml::set_attr(&mut w, "xmlns", namespace);
        }
        w
    };
    for child in children {
        xml::push_child(&mut wrapper, child);
    }
    Ok(vec![wrapper])
}

/// Écrit une valeur sous un élément nommé.
pub fn write_value(
    name: &str,
    ty: &SchemaType,
    value: &Value,
    encoded: bool,
) -> Result<Element, MappingError> {
    if value.is_null() {
        let mut e = Element::new(name);
        xml::set_attr(&mut e, "xsi:nil", "true");
        return Ok(e);
    }
    if !ty.accepts(value) {
        return Err(MappingError::value(
            name,
            ValueError::TypeError {
                expected: ty.to_string(),
                found: value.kind().to_string(),
            },
        ));
    }

    let mut e = Element::new(name);
    match (ty, value) {
        (SchemaType::Array(item_ty), Value::Array(items)) => {
            if encoded {
                xml::set_attr(&mut e, "xsi:type", "soapenc:Array");
                xml::set_attr(
                    &mut e,
                    "soapenc:arrayType",
                    &format!("{}[{}]", encoded_type_name(item_ty), items.len()),
                );
            }
            let item_name = item_element_name(item_ty);
            for item in items {
                xml::push_child(&mut e, write_value(&item_name, item_ty, item, encoded)?);
            }
        }
        (SchemaType::Struct(st), Value::Struct(fields)) => {
            if encoded {
                xml::set_attr(&mut e, "xsi:type", &format!("types:{}", st.name));
            }
            for field in &st.fields {
                let v = fields
                    .iter()
                    .find(|(n, _)| *n == field.name)
                    .map(|(_, v)| v)
                    .unwrap_or(&Value::Null);
                xml::push_child(&mut e, write_value(&field.name, &field.ty, v, encoded)?);
            }
        }
        _ => {
            if encoded {
                xml::set_attr(&mut e, "xsi:type", &encoded_type_name(ty));
            }
            let text = value.to_text().map_err(|err| MappingError::value(name, err))?;
            if !text.is_empty() {
                e.children.push(xmltree::XMLNode::Text(text));
            }
        }
    }
    Ok(e)
}

/// Nom d'élément des items d'un tableau.
pub(crate) fn item_element_name(ty: &SchemaType) -> String {
    match ty {
        SchemaType::Enum(e) => e.name.clone(),
        SchemaType::Struct(s) => s.name.clone(),
        other => other
            .xsd_name()
            .map(str::to_string)
            .unwrap_or_else(|| other.type_name()),
    }
}

fn encoded_type_name(ty: &SchemaType) -> String {
    match ty.xsd_name() {
        Some(name) => format!("xsd:{}", name),
        None => format!("types:{}", ty.type_name()),
    }
}
