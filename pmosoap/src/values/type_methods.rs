use crate::values::{SchemaType, Value};

impl SchemaType {
    /// Nom local XSD des types scalaires.
    pub fn xsd_name(&self) -> Option<&'static str> {
        let name = match self {
            SchemaType::Boolean => "boolean",
            SchemaType::Byte => "byte",
            SchemaType::UnsignedByte => "unsignedByte",
            SchemaType::Short => "short",
            SchemaType::UnsignedShort => "unsignedShort",
            SchemaType::Int => "int",
            SchemaType::UnsignedInt => "unsignedInt",
            SchemaType::Long => "long",
            SchemaType::UnsignedLong => "unsignedLong",
            SchemaType::Float => "float",
            SchemaType::Double => "double",
            SchemaType::String => "string",
            SchemaType::DateTime => "dateTime",
            SchemaType::Date => "date",
            SchemaType::Time => "time",
            SchemaType::Base64Binary => "base64Binary",
            SchemaType::Guid => "guid",
            SchemaType::AnyUri => "anyURI",
            _ => return None,
        };
        Some(name)
    }

    pub fn is_scalar(&self) -> bool {
        self.xsd_name().is_some()
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, SchemaType::Enum(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, SchemaType::Array(_))
    }

    pub fn item_type(&self) -> Option<&SchemaType> {
        match self {
            SchemaType::Array(item) => Some(item),
            _ => None,
        }
    }

    /// Vrai pour les types qu'on peut passer dans une URL ou un formulaire :
    /// scalaires, énumérations, et tableaux à une dimension de ceux-ci.
    pub fn is_http_eligible(&self) -> bool {
        match self {
            SchemaType::Array(item) => item.is_scalar() || item.is_enum(),
            other => other.is_scalar() || other.is_enum(),
        }
    }

    /// Nom du type tel qu'il apparaît dans les schémas produits.
    pub fn type_name(&self) -> String {
        match self {
            SchemaType::Array(item) => format!("ArrayOf{}", capitalize(&item.type_name())),
            other => other.to_string(),
        }
    }

    /// Vérifie grossièrement qu'une valeur peut être écrite sous ce type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (SchemaType::Boolean, Value::Boolean(_)) => true,
            (
                SchemaType::Byte | SchemaType::Short | SchemaType::Int | SchemaType::Long,
                Value::Int(_) | Value::UInt(_),
            ) => true,
            (
                SchemaType::UnsignedByte
                | SchemaType::UnsignedShort
                | SchemaType::UnsignedInt
                | SchemaType::UnsignedLong,
                Value::UInt(_),
            ) => true,
            (
                SchemaType::UnsignedByte
                | SchemaType::UnsignedShort
                | SchemaType::UnsignedInt
                | SchemaType::UnsignedLong,
                Value::Int(v),
            ) => *v >= 0,
            (SchemaType::Float | SchemaType::Double, Value::Float(_) | Value::Int(_)) => true,
            (SchemaType::String, Value::String(_)) => true,
            (SchemaType::AnyUri, Value::Uri(_) | Value::String(_)) => true,
            (SchemaType::DateTime, Value::DateTime(_)) => true,
            (SchemaType::Date, Value::Date(_)) => true,
            (SchemaType::Time, Value::Time(_)) => true,
            (SchemaType::Base64Binary, Value::Binary(_)) => true,
            (SchemaType::Guid, Value::Guid(_)) => true,
            (SchemaType::Enum(e), Value::Enum(v) | Value::String(v)) => e.values.contains(v),
            (SchemaType::Array(item), Value::Array(values)) => {
                values.iter().all(|v| item.accepts(v))
            }
            (SchemaType::Struct(s), Value::Struct(fields)) => fields
                .iter()
                .all(|(name, v)| s.get_field(name).is_some_and(|f| f.ty.accepts(v))),
            _ => false,
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
