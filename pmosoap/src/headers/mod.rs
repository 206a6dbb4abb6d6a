//! # En-têtes SOAP
//!
//! Ce module modélise les entrées de `<soap:Header>` et leur circulation
//! entre le message et les membres d'en-tête d'un service (côté serveur) ou
//! d'un proxy (côté client).
//!
//! ## Fonctionnalités
//!
//! - ✅ En-têtes typés (structure connue) ou inconnus (XML brut conservé)
//! - ✅ Attributs `mustUnderstand`, `actor`/`role`, `relay`
//! - ✅ Suivi `did_understand` partagé entre le message et les membres
//! - ✅ Lecture/écriture de `<Header>`, affectation aux membres
//! - ✅ Contrôle final des en-têtes `mustUnderstand` non compris

mod handling;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use xmltree::Element;

pub use handling::{
    ensure_headers_understood, get_header_members, read_headers, set_header_members,
    write_headers,
};

use crate::attributes::SoapHeaderDirection;
use crate::values::{SchemaType, StructType, Value};
use crate::xml::QName;

/// Contenu d'un en-tête.
#[derive(Debug, Clone)]
pub enum HeaderContent {
    /// En-tête dont la structure est déclarée
    Known {
        schema: Arc<StructType>,
        value: Value,
    },
    /// En-tête inconnu, conservé tel quel
    Unknown(Element),
}

/// Entrée de la collection d'en-têtes.
#[derive(Debug)]
pub struct SoapHeader {
    content: HeaderContent,
    must_understand: bool,
    actor: String,
    relay: bool,
    did_understand: AtomicBool,
}

/// En-tête partagé entre le message et les membres.
pub type SharedHeader = Arc<SoapHeader>;

impl SoapHeader {
    pub fn known(schema: Arc<StructType>, value: Value) -> Self {
        Self::with_content(HeaderContent::Known { schema, value })
    }

    pub fn unknown(element: Element) -> Self {
        Self::with_content(HeaderContent::Unknown(element))
    }

    fn with_content(content: HeaderContent) -> Self {
        Self {
            content,
            must_understand: false,
            actor: String::new(),
            relay: false,
            did_understand: AtomicBool::new(false),
        }
    }

    pub fn must_understand_header(mut self, must_understand: bool) -> Self {
        self.must_understand = must_understand;
        self
    }

    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }

    pub fn with_relay(mut self, relay: bool) -> Self {
        self.relay = relay;
        self
    }

    pub fn shared(self) -> SharedHeader {
        Arc::new(self)
    }

    pub fn content(&self) -> &HeaderContent {
        &self.content
    }

    /// Valeur d'un en-tête typé.
    pub fn value(&self) -> Option<&Value> {
        match &self.content {
            HeaderContent::Known { value, .. } => Some(value),
            HeaderContent::Unknown(_) => None,
        }
    }

    /// Élément brut d'un en-tête inconnu.
    pub fn element(&self) -> Option<&Element> {
        match &self.content {
            HeaderContent::Unknown(e) => Some(e),
            HeaderContent::Known { .. } => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.content, HeaderContent::Unknown(_))
    }

    /// Nom qualifié de l'élément d'en-tête.
    pub fn name(&self) -> QName {
        match &self.content {
            HeaderContent::Known { schema, .. } => QName::new(
                schema.namespace.clone().unwrap_or_default(),
                schema.name.clone(),
            ),
            HeaderContent::Unknown(e) => QName::of(e),
        }
    }

    pub fn must_understand(&self) -> bool {
        self.must_understand
    }

    /// Acteur (1.1) ou rôle (1.2).
    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn relay(&self) -> bool {
        self.relay
    }

    pub fn did_understand(&self) -> bool {
        self.did_understand.load(Ordering::Acquire)
    }

    pub fn set_did_understand(&self, understood: bool) {
        self.did_understand.store(understood, Ordering::Release);
    }
}

impl Clone for SoapHeader {
    fn clone(&self) -> Self {
        Self {
            content: self.content.clone(),
            must_understand: self.must_understand,
            actor: self.actor.clone(),
            relay: self.relay,
            did_understand: AtomicBool::new(self.did_understand()),
        }
    }
}

/// Collection ordonnée des en-têtes d'un message.
#[derive(Debug, Clone, Default)]
pub struct SoapHeaderCollection {
    headers: Vec<SharedHeader>,
}

impl SoapHeaderCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, header: SharedHeader) {
        self.headers.push(header);
    }

    pub fn iter(&self) -> impl Iterator<Item = &SharedHeader> {
        self.headers.iter()
    }

    pub fn get(&self, index: usize) -> Option<&SharedHeader> {
        self.headers.get(index)
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn clear(&mut self) {
        self.headers.clear();
    }

    /// Premier en-tête portant ce nom.
    pub fn find(&self, name: &QName) -> Option<&SharedHeader> {
        self.headers.iter().find(|h| &h.name() == name)
    }
}

/// Type d'un membre d'en-tête.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderType {
    /// Type d'en-tête générique : accepte tout en-tête
    Generic,
    /// En-tête inconnu (XML brut)
    Unknown,
    /// En-tête typé par une structure
    Custom(Arc<StructType>),
}

impl HeaderType {
    /// Vrai si l'en-tête peut être affecté à un membre de ce type.
    pub fn accepts(&self, header: &SoapHeader) -> bool {
        match (self, header.content()) {
            (HeaderType::Generic, _) => true,
            (HeaderType::Unknown, HeaderContent::Unknown(_)) => true,
            (HeaderType::Custom(expected), HeaderContent::Known { schema, .. }) => {
                expected.name == schema.name && expected.namespace == schema.namespace
            }
            _ => false,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, HeaderType::Custom(_))
    }

    /// Nom qualifié de l'élément attendu (types personnalisés seulement).
    pub fn element_name(&self) -> Option<QName> {
        match self {
            HeaderType::Custom(s) => Some(QName::new(
                s.namespace.clone().unwrap_or_default(),
                s.name.clone(),
            )),
            _ => None,
        }
    }
}

/// Type déclaré d'un membre de service.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderMemberType {
    Header(HeaderType),
    /// Membre qui n'est pas un en-tête
    Other(SchemaType),
}

/// Membre de service pouvant recevoir un en-tête.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderMember {
    pub name: String,
    pub ty: HeaderMemberType,
    pub is_array: bool,
    pub is_static: bool,
    pub can_read: bool,
    pub can_write: bool,
}

impl HeaderMember {
    pub fn new(name: &str, header_type: HeaderType) -> Self {
        Self {
            name: name.to_string(),
            ty: HeaderMemberType::Header(header_type),
            is_array: false,
            is_static: false,
            can_read: true,
            can_write: true,
        }
    }

    /// Membre ordinaire (non en-tête).
    pub fn other(name: &str, ty: SchemaType) -> Self {
        Self {
            ty: HeaderMemberType::Other(ty),
            ..Self::new(name, HeaderType::Generic)
        }
    }

    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.can_write = false;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.can_read = false;
        self
    }
}

/// En-tête déclaré sur une opération, après validation.
#[derive(Debug, Clone, PartialEq)]
pub struct SoapReflectedHeader {
    pub member: String,
    pub header_type: HeaderType,
    pub direction: SoapHeaderDirection,
    pub repeats: bool,
    pub custom: bool,
    pub required: bool,
}

/// Valeur d'un membre d'en-tête.
#[derive(Debug, Clone)]
pub enum HeaderMemberValue {
    Single(SharedHeader),
    Array(Vec<SharedHeader>),
}

impl HeaderMemberValue {
    pub fn headers(&self) -> Vec<SharedHeader> {
        match self {
            HeaderMemberValue::Single(h) => vec![h.clone()],
            HeaderMemberValue::Array(v) => v.clone(),
        }
    }
}

/// Valeurs des membres d'en-tête d'une instance de service ou d'un proxy.
#[derive(Debug, Default)]
pub struct HeaderSlots {
    values: Mutex<HashMap<String, HeaderMemberValue>>,
}

impl HeaderSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, member: &str) -> Option<HeaderMemberValue> {
        self.values.lock().get(member).cloned()
    }

    /// Affecte ou efface un membre.
    pub fn set(&self, member: &str, value: Option<HeaderMemberValue>) {
        let mut values = self.values.lock();
        match value {
            Some(v) => {
                values.insert(member.to_string(), v);
            }
            None => {
                values.remove(member);
            }
        }
    }

    /// Raccourci pour un en-tête simple.
    pub fn set_header(&self, member: &str, header: SoapHeader) {
        self.set(member, Some(HeaderMemberValue::Single(header.shared())));
    }

    /// Premier en-tête d'un membre.
    pub fn header(&self, member: &str) -> Option<SharedHeader> {
        self.get(member).and_then(|v| v.headers().into_iter().next())
    }

    pub fn clear(&self) {
        self.values.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> Arc<StructType> {
        Arc::new(
            StructType::new("Auth")
                .with_namespace("urn:h")
                .field("User", SchemaType::String),
        )
    }

    #[test]
    fn test_header_type_accepts() {
        let known = SoapHeader::known(auth(), Value::Null);
        let unknown = SoapHeader::unknown(Element::new("X"));
        assert!(HeaderType::Generic.accepts(&known));
        assert!(HeaderType::Generic.accepts(&unknown));
        assert!(HeaderType::Unknown.accepts(&unknown));
        assert!(!HeaderType::Unknown.accepts(&known));
        assert!(HeaderType::Custom(auth()).accepts(&known));
        let other = Arc::new(StructType::new("Auth").with_namespace("urn:other"));
        assert!(!HeaderType::Custom(other).accepts(&known));
    }

    #[test]
    fn test_did_understand_is_shared() {
        let h = SoapHeader::unknown(Element::new("X")).shared();
        let mut c = SoapHeaderCollection::new();
        c.push(h.clone());
        h.set_did_understand(true);
        assert!(c.get(0).unwrap().did_understand());
    }

    #[test]
    fn test_slots() {
        let slots = HeaderSlots::new();
        slots.set_header("Auth", SoapHeader::known(auth(), Value::Null));
        assert_eq!(slots.header("Auth").unwrap().name(), QName::new("urn:h", "Auth"));
        slots.set("Auth", None);
        assert!(slots.get("Auth").is_none());
    }
}
