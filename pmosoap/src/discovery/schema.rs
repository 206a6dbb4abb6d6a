//! Schémas XSD des messages et des types, un par namespace cible.

use std::collections::HashSet;

use xmltree::Element;

use crate::mapping::MemberMapping;
use crate::soap::ns;
use crate::values::SchemaType;
use crate::xml;

const XSD_PREFIX: &str = "s";

/// Nom préfixé dans le namespace XSD.
pub(crate) fn xsd_name(local: &str) -> String {
    format!("{}:{}", XSD_PREFIX, local)
}

struct SchemaDoc {
    namespace: String,
    items: Vec<Element>,
    /// `e:Nom` pour les éléments, `t:Nom` pour les types
    declared: HashSet<String>,
    imports: Vec<usize>,
}

/// Ensemble des schémas d'un service ; l'identifiant `schemaN` suit
/// l'ordre de création.
#[derive(Default)]
pub struct SchemaSet {
    target_namespace: String,
    docs: Vec<SchemaDoc>,
}

impl SchemaSet {
    pub fn new(target_namespace: &str) -> Self {
        Self {
            target_namespace: target_namespace.to_string(),
            docs: Vec::new(),
        }
    }

    fn doc(&mut self, namespace: &str) -> usize {
        if let Some(i) = self.docs.iter().position(|d| d.namespace == namespace) {
            return i;
        }
        self.docs.push(SchemaDoc {
            namespace: namespace.to_string(),
            items: Vec::new(),
            declared: HashSet::new(),
            imports: Vec::new(),
        });
        self.docs.len() - 1
    }

    /// Préfixe d'un namespace vu depuis un schéma ou depuis le WSDL.
    pub fn prefix(&self, from_namespace: &str, namespace: &str) -> String {
        if namespace == from_namespace {
            return "tns".to_string();
        }
        match self.docs.iter().position(|d| d.namespace == namespace) {
            Some(i) => format!("s{}", i + 1),
            None => "tns".to_string(),
        }
    }

    /// Nom qualifié tel qu'écrit dans le WSDL.
    pub fn wsdl_name(&self, namespace: &str, name: &str) -> String {
        format!("{}:{}", self.prefix(&self.target_namespace, namespace), name)
    }

    /// Prefixes `sN` à déclarer dans le WSDL.
    pub fn foreign_prefixes(&self) -> Vec<(String, String)> {
        self.docs
            .iter()
            .enumerate()
            .filter(|(_, d)| d.namespace != self.target_namespace)
            .map(|(i, d)| (format!("s{}", i + 1), d.namespace.clone()))
            .collect()
    }

    fn import(&mut self, from: usize, to: usize) {
        if from != to && !self.docs[from].imports.contains(&to) {
            self.docs[from].imports.push(to);
        }
    }

    fn claim(&mut self, doc: usize, key: String) -> bool {
        self.docs[doc].declared.insert(key)
    }

    /// Référence de type, en déclarant le type si besoin.
    ///
    /// `types_namespace` reçoit les types qui n'en précisent pas.
    pub fn type_ref(&mut self, from_namespace: &str, types_namespace: &str, ty: &SchemaType) -> String {
        if let Some(name) = ty.xsd_name() {
            let local = if matches!(ty, SchemaType::Guid) { "string" } else { name };
            return xsd_name(local);
        }

        let (namespace, name) = match ty {
            SchemaType::Enum(e) => (e.namespace.clone().unwrap_or_else(|| types_namespace.to_string()), e.name.clone()),
            SchemaType::Struct(s) => (s.namespace.clone().unwrap_or_else(|| types_namespace.to_string()), s.name.clone()),
            SchemaType::Array(_) => (types_namespace.to_string(), ty.type_name()),
            _ => return xsd_name("anyType"),
        };

        let from = self.doc(from_namespace);
        let target = self.doc(&namespace);
        self.import(from, target);

        if self.claim(target, format!("t:{}", name)) {
            let definition = self.define_type(&namespace, types_namespace, &name, ty);
            self.docs[target].items.push(definition);
        }
        format!("{}:{}", self.prefix(from_namespace, &namespace), name)
    }

    fn define_type(&mut self, namespace: &str, types_namespace: &str, name: &str, ty: &SchemaType) -> Element {
        match ty {
            SchemaType::Enum(e) => {
                let mut simple = Element::new(&xsd_name("simpleType"));
                xml::set_attr(&mut simple, "name", name);
                let mut restriction = Element::new(&xsd_name("restriction"));
                xml::set_attr(&mut restriction, "base", &xsd_name("string"));
                for value in &e.values {
                    let mut en = Element::new(&xsd_name("enumeration"));
                    xml::set_attr(&mut en, "value", value);
                    xml::push_child(&mut restriction, en);
                }
                xml::push_child(&mut simple, restriction);
                simple
            }
            SchemaType::Struct(s) => {
                let members: Vec<MemberMapping> = s
                    .fields
                    .iter()
                    .map(|f| MemberMapping::new(&f.name, f.ty.clone()))
                    .collect();
                let mut complex = self.sequence(namespace, types_namespace, &members);
                xml::set_attr(&mut complex, "name", name);
                complex
            }
            SchemaType::Array(item) => {
                let item_name = crate::mapping::item_element_name(item);
                let item_ref = self.type_ref(namespace, types_namespace, item);
                let mut complex = Element::new(&xsd_name("complexType"));
                xml::set_attr(&mut complex, "name", name);
                let mut seq = Element::new(&xsd_name("sequence"));
                let mut e = Element::new(&xsd_name("element"));
                xml::set_attr(&mut e, "minOccurs", "0");
                xml::set_attr(&mut e, "maxOccurs", "unbounded");
                xml::set_attr(&mut e, "name", &item_name);
                xml::set_attr(&mut e, "type", &item_ref);
                xml::push_child(&mut seq, e);
                xml::push_child(&mut complex, seq);
                complex
            }
            _ => Element::new(&xsd_name("complexType")),
        }
    }

    /// `complexType` anonyme contenant une séquence de membres.
    fn sequence(&mut self, namespace: &str, types_namespace: &str, members: &[MemberMapping]) -> Element {
        let mut complex = Element::new(&xsd_name("complexType"));
        let mut seq = Element::new(&xsd_name("sequence"));
        for member in members {
            let type_ref = self.type_ref(namespace, types_namespace, &member.ty);
            let mut e = Element::new(&xsd_name("element"));
            let scalar = member.ty.is_scalar() && !matches!(member.ty, SchemaType::String | SchemaType::AnyUri | SchemaType::Base64Binary);
            xml::set_attr(&mut e, "minOccurs", if scalar { "1" } else { "0" });
            xml::set_attr(&mut e, "maxOccurs", "1");
            xml::set_attr(&mut e, "name", &member.name);
            xml::set_attr(&mut e, "type", &type_ref);
            xml::push_child(&mut seq, e);
        }
        if !members.is_empty() {
            xml::push_child(&mut complex, seq);
        }
        complex
    }

    /// Élément enveloppe d'un message (document wrapped).
    pub fn add_wrapper_element(&mut self, namespace: &str, types_namespace: &str, name: &str, members: &[MemberMapping]) {
        let doc = self.doc(namespace);
        if !self.claim(doc, format!("e:{}", name)) {
            return;
        }
        let complex = self.sequence(namespace, types_namespace, members);
        let mut e = Element::new(&xsd_name("element"));
        xml::set_attr(&mut e, "name", name);
        xml::push_child(&mut e, complex);
        self.docs[doc].items.push(e);
    }

    /// Élément global typé (membres bare, racines de retour HTTP).
    pub fn add_element(&mut self, namespace: &str, types_namespace: &str, name: &str, ty: &SchemaType) {
        let doc = self.doc(namespace);
        if !self.claim(doc, format!("e:{}", name)) {
            return;
        }
        let type_ref = self.type_ref(namespace, types_namespace, ty);
        let mut e = Element::new(&xsd_name("element"));
        xml::set_attr(&mut e, "name", name);
        xml::set_attr(&mut e, "type", &type_ref);
        self.docs[doc].items.push(e);
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Identifiant `schemaN` d'un namespace.
    pub fn schema_id(&self, namespace: &str) -> Option<String> {
        self.docs
            .iter()
            .position(|d| d.namespace == namespace)
            .map(|i| format!("schema{}", i + 1))
    }

    /// Éléments `s:schema`, avec leur identifiant.
    ///
    /// Les imports pointent vers `{base_url}?schema=schemaN`.
    pub fn render(&self, base_url: &str) -> Vec<(String, Element)> {
        self.docs
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                let mut schema = Element::new(&xsd_name("schema"));
                xml::set_attr(&mut schema, "xmlns:s", ns::XSD);
                xml::set_attr(&mut schema, "elementFormDefault", "qualified");
                if !doc.namespace.is_empty() {
                    xml::set_attr(&mut schema, "targetNamespace", &doc.namespace);
                    xml::set_attr(&mut schema, "xmlns:tns", &doc.namespace);
                }
                for &import in &doc.imports {
                    let other = &self.docs[import];
                    xml::set_attr(&mut schema, &format!("xmlns:s{}", import + 1), &other.namespace);
                    let mut imp = Element::new(&xsd_name("import"));
                    xml::set_attr(&mut imp, "namespace", &other.namespace);
                    xml::set_attr(&mut imp, "schemaLocation", &format!("{}?schema=schema{}", base_url, import + 1));
                    xml::push_child(&mut schema, imp);
                }
                for item in &doc.items {
                    xml::push_child(&mut schema, item.clone());
                }
                (format!("schema{}", i + 1), schema)
            })
            .collect()
    }
}
