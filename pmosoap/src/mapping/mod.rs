//! # Correspondances de membres
//!
//! Un [`MembersMapping`] décrit comment une liste ordonnée de valeurs
//! (paramètres d'entrée, valeurs de retour, en-têtes) s'écrit dans le corps
//! SOAP et s'y relit : élément enveloppe ou non, namespace, style
//! littéral ou encodé.
//!
//! ## Formes produites
//!
//! - ✅ Document/Literal/Wrapped : `<Add xmlns="ns"><a>2</a></Add>`
//! - ✅ Document/Literal/Bare : `<a xmlns="ns">2</a>` au premier niveau
//! - ✅ RPC : `<q1:Add xmlns:q1="ns"><a>2</a></q1:Add>`, enfants non qualifiés
//! - ✅ Encoded : attributs `xsi:type`, tableaux `soapenc:Array`, références `href`/`id`
//! - ✅ Valeurs nulles : `xsi:nil="true"`

mod read;
mod write;

use thiserror::Error;

pub use read::{RefTable, read_members, read_value};
pub use write::{write_members, write_value};
pub(crate) use write::item_element_name;

use crate::values::{SchemaType, ValueError};
use crate::xml::QName;

/// Un membre de la correspondance : nom d'élément et type déclaré.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberMapping {
    pub name: String,
    pub ty: SchemaType,
}

impl MemberMapping {
    pub fn new(name: &str, ty: SchemaType) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }
}

/// Correspondance complète entre des valeurs et le corps d'un message.
#[derive(Debug, Clone, PartialEq)]
pub struct MembersMapping {
    /// Élément enveloppe (nom et namespace) ou namespace des membres en Bare
    pub element: QName,
    pub has_wrapper: bool,
    pub members: Vec<MemberMapping>,
    pub encoded: bool,
    /// Enfants non qualifiés sous un enveloppe préfixé
    pub rpc: bool,
    /// Namespace des types encodés (`types:`)
    pub types_namespace: String,
}

impl MembersMapping {
    pub fn wrapped(element: QName, members: Vec<MemberMapping>) -> Self {
        Self {
            element,
            has_wrapper: true,
            members,
            encoded: false,
            rpc: false,
            types_namespace: String::new(),
        }
    }

    pub fn bare(namespace: &str, members: Vec<MemberMapping>) -> Self {
        Self {
            element: QName::new(namespace, ""),
            has_wrapper: false,
            members,
            encoded: false,
            rpc: false,
            types_namespace: String::new(),
        }
    }

    pub fn with_rpc(mut self, rpc: bool) -> Self {
        self.rpc = rpc;
        self
    }

    pub fn with_encoding(mut self, encoded: bool, types_namespace: &str) -> Self {
        self.encoded = encoded;
        self.types_namespace = types_namespace.to_string();
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Erreurs de lecture/écriture d'une correspondance.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("Missing element {0}")]
    MissingElement(QName),

    #[error("Invalid value for '{member}': {source}")]
    Value {
        member: String,
        #[source]
        source: ValueError,
    },

    #[error("Expected {expected} values, got {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("Unresolved reference '{0}'")]
    UnresolvedRef(String),

    #[error("XML write error: {0}")]
    Write(String),
}

impl MappingError {
    pub(crate) fn value(member: &str, source: ValueError) -> Self {
        Self::Value {
            member: member.to_string(),
            source,
        }
    }
}

impl From<xmltree::Error> for MappingError {
    fn from(e: xmltree::Error) -> Self {
        MappingError::Write(e.to_string())
    }
}
