//! Petits outils autour de `xmltree` : noms qualifiés, recherche d'enfants,
//! lecture d'attributs indépendante du préfixe et sérialisation.

use std::fmt;
use std::io::BufReader;

use xmltree::{Element, EmitterConfig, XMLNode};

/// Nom qualifié `{namespace}name`. Un namespace vide signifie « non qualifié ».
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct QName {
    pub namespace: String,
    pub name: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// Nom qualifié d'un élément parsé.
    pub fn of(element: &Element) -> Self {
        Self::new(element.namespace.clone().unwrap_or_default(), element.name.clone())
    }

    pub fn matches(&self, element: &Element) -> bool {
        element.name == self.name && element.namespace.as_deref().unwrap_or("") == self.namespace
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.namespace, self.name)
        }
    }
}

/// Parse un document XML complet.
pub fn parse(bytes: &[u8]) -> Result<Element, xmltree::ParseError> {
    Element::parse(BufReader::new(bytes))
}

/// Sérialise un élément, avec ou sans déclaration XML.
pub fn to_bytes(element: &Element, declaration: bool) -> Result<Vec<u8>, xmltree::Error> {
    let mut buf = Vec::new();
    let config = EmitterConfig::new()
        .write_document_declaration(declaration)
        .perform_indent(false);
    element.write_with_config(&mut buf, config)?;
    Ok(buf)
}

pub fn to_string(element: &Element) -> Result<String, xmltree::Error> {
    let bytes = to_bytes(element, false)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Itère sur les enfants éléments, en ignorant texte et commentaires.
pub fn child_elements(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(XMLNode::as_element)
}

/// Premier enfant portant ce nom local dans ce namespace.
pub fn find_child<'a>(element: &'a Element, namespace: &str, name: &str) -> Option<&'a Element> {
    child_elements(element)
        .find(|e| e.name == name && e.namespace.as_deref().unwrap_or("") == namespace)
}

/// Premier enfant portant ce nom local, quel que soit son namespace.
pub fn find_child_local<'a>(element: &'a Element, name: &str) -> Option<&'a Element> {
    child_elements(element).find(|e| e.name == name)
}

/// Lit un attribut par nom local, qu'il soit préfixé ou non.
pub fn attribute<'a>(element: &'a Element, local: &str) -> Option<&'a str> {
    if let Some(v) = element.attributes.get(local) {
        return Some(v.as_str());
    }
    element.attributes.iter().find_map(|(k, v)| {
        k.rsplit_once(':')
            .filter(|(_, l)| *l == local)
            .map(|_| v.as_str())
    })
}

/// Contenu texte concaténé (vide si absent).
pub fn text(element: &Element) -> String {
    element
        .get_text()
        .map(|t| t.into_owned())
        .unwrap_or_default()
}

/// Résout une valeur `prefix:local` selon les déclarations en portée.
pub fn resolve_qname(element: &Element, value: &str) -> QName {
    let value = value.trim();
    let (prefix, local) = match value.split_once(':') {
        Some((p, l)) => (p, l),
        None => ("", value),
    };
    let namespace = element
        .namespaces
        .as_ref()
        .and_then(|ns| ns.get(prefix))
        .map(str::to_string)
        .unwrap_or_default();
    QName::new(namespace, local)
}

/// Élément texte simple, nom éventuellement préfixé.
pub fn text_element(name: &str, value: &str) -> Element {
    let mut e = Element::new(name);
    if !value.is_empty() {
        e.children.push(XMLNode::Text(value.to_string()));
    }
    e
}

pub fn set_attr(element: &mut Element, name: &str, value: &str) {
    element.attributes.insert(name.to_string(), value.to_string());
}

pub fn push_child(element: &mut Element, child: Element) {
    element.children.push(XMLNode::Element(child));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_display() {
        assert_eq!(QName::new("urn:a", "x").to_string(), "urn:a:x");
        assert_eq!(QName::new("", "x").to_string(), "x");
    }

    #[test]
    fn test_resolve_qname_and_attributes() {
        let doc = r#"<a xmlns:p="urn:p" p:flag="1"><b>p:Value</b></a>"#;
        let root = parse(doc.as_bytes()).unwrap();
        let b = find_child_local(&root, "b").unwrap();
        assert_eq!(resolve_qname(b, &text(b)), QName::new("urn:p", "Value"));
        assert_eq!(attribute(&root, "flag"), Some("1"));
        assert_eq!(attribute(&root, "missing"), None);
    }

    #[test]
    fn test_find_child_by_namespace() {
        let doc = r#"<a xmlns="urn:a"><b/><c xmlns="urn:c"/></a>"#;
        let root = parse(doc.as_bytes()).unwrap();
        assert!(find_child(&root, "urn:a", "b").is_some());
        assert!(find_child(&root, "urn:a", "c").is_none());
        assert!(find_child(&root, "urn:c", "c").is_some());
    }

    #[test]
    fn test_write_roundtrip_text() {
        let mut root = Element::new("root");
        push_child(&mut root, text_element("v", "a < b"));
        let s = to_string(&root).unwrap();
        assert!(s.contains("a &lt; b"));
        let back = parse(s.as_bytes()).unwrap();
        assert_eq!(text(find_child_local(&back, "v").unwrap()), "a < b");
    }
}
