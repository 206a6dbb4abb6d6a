//! Valeur de retour d'une opération appelée en GET/POST.

use crate::mapping::{RefTable, read_value, write_value};
use crate::soap::ns;
use crate::values::{SchemaType, Value};
use crate::xml;

use super::HttpBindingError;

/// Écrit le retour comme document XML ; la racine porte le nom du type,
/// dans le namespace du service.
pub fn write_return(
    namespace: &str,
    ty: &SchemaType,
    value: &Value,
) -> Result<Vec<u8>, HttpBindingError> {
    let mut root = write_value(&ty.type_name(), ty, value, false)?;
    xml::set_attr(&mut root, "xmlns:xsi", ns::XSI);
    xml::set_attr(&mut root, "xmlns:xsd", ns::XSD);
    if !namespace.is_empty() {
        xml::set_attr(&mut root, "xmlns", namespace);
    }
    xml::to_bytes(&root, true).map_err(|e| HttpBindingError::Xml(e.to_string()))
}

/// Relit un retour XML selon le type attendu.
pub fn read_return(ty: &SchemaType, body: &[u8]) -> Result<Value, HttpBindingError> {
    let root = xml::parse(body).map_err(|e| HttpBindingError::Xml(e.to_string()))?;
    let refs = RefTable::new();
    Ok(read_value(&root, ty, &refs)?)
}
