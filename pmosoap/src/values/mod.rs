//! # Types de schéma et valeurs
//!
//! Les paramètres, retours et en-têtes d'une opération sont décrits
//! explicitement par un [`SchemaType`] au moment de l'enregistrement ; les
//! appels transportent des [`Value`].
//!
//! ## Fonctionnalités
//!
//! - ✅ Scalaires XSD (entiers bornés, flottants, chaînes, dates, binaire, GUID)
//! - ✅ Énumérations nommées
//! - ✅ Tableaux à une dimension
//! - ✅ Structures (séquence de champs nommés)
//! - ✅ Conversion texte ↔ valeur avec contrôle des bornes

mod display;
mod errors;
mod fromstr;
mod type_methods;

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use uuid::Uuid;

pub use errors::ValueError;

/// Type déclaré d'un paramètre, d'un retour ou d'un champ.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaType {
    Boolean,
    Byte,          // xsd:byte (i8)
    UnsignedByte,  // xsd:unsignedByte (u8)
    Short,         // xsd:short (i16)
    UnsignedShort, // xsd:unsignedShort (u16)
    Int,           // xsd:int (i32)
    UnsignedInt,   // xsd:unsignedInt (u32)
    Long,          // xsd:long (i64)
    UnsignedLong,  // xsd:unsignedLong (u64)
    Float,
    Double,
    String,
    DateTime,
    Date,
    Time,
    Base64Binary,
    Guid,
    AnyUri,
    Enum(Arc<EnumType>),
    Array(Box<SchemaType>),
    Struct(Arc<StructType>),
    /// Poignée renvoyée par une méthode `BeginX`.
    AsyncResult,
    /// Rappel passé en avant-dernier paramètre d'une méthode `BeginX`.
    AsyncCallback,
    /// État opaque passé en dernier paramètre d'une méthode `BeginX`.
    Object,
}

/// Énumération nommée.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    pub namespace: Option<String>,
    pub values: Vec<String>,
}

impl EnumType {
    pub fn new<I, S>(name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            namespace: None,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }
}

/// Champ d'une structure.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: SchemaType,
}

/// Type structuré : une séquence ordonnée de champs.
///
/// Les en-têtes SOAP typés sont décrits par un `StructType` dont le nom
/// devient le nom de l'élément d'en-tête.
#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    pub name: String,
    pub namespace: Option<String>,
    pub fields: Vec<FieldDecl>,
}

impl StructType {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: None,
            fields: Vec::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    pub fn field(mut self, name: &str, ty: SchemaType) -> Self {
        self.fields.push(FieldDecl {
            name: name.to_string(),
            ty,
        });
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Valeur transportée par un appel.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
    Binary(Vec<u8>),
    Guid(Uuid),
    Uri(String),
    Enum(String),
    Array(Vec<Value>),
    Struct(Vec<(String, Value)>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Uri(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Champ d'une valeur structurée.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Nom court du genre de valeur, pour les messages d'erreur.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int(_) => "int",
            Value::UInt(_) => "unsigned",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::DateTime(_) => "dateTime",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Binary(_) => "base64Binary",
            Value::Guid(_) => "guid",
            Value::Uri(_) => "anyURI",
            Value::Enum(_) => "enum",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt(v as u64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
