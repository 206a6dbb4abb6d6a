use base64::Engine;
use base64::engine::general_purpose;
use std::fmt;

use crate::values::{SchemaType, Value, ValueError};

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaType::Enum(e) => write!(f, "{}", e.name),
            SchemaType::Struct(s) => write!(f, "{}", s.name),
            SchemaType::Array(item) => write!(f, "{}[]", item),
            SchemaType::AsyncResult => write!(f, "IAsyncResult"),
            SchemaType::AsyncCallback => write!(f, "AsyncCallback"),
            SchemaType::Object => write!(f, "Object"),
            scalar => write!(f, "{}", scalar.xsd_name().unwrap_or("anyType")),
        }
    }
}

impl Value {
    /// Représentation texte XSD d'une valeur scalaire.
    pub fn to_text(&self) -> Result<String, ValueError> {
        let s = match self {
            Value::Null => String::new(),
            Value::Boolean(v) => if *v { "true" } else { "false" }.to_string(),
            Value::Int(v) => v.to_string(),
            Value::UInt(v) => v.to_string(),
            Value::Float(v) => format_float(*v),
            Value::String(v) | Value::Uri(v) | Value::Enum(v) => v.clone(),
            Value::DateTime(v) => v.to_rfc3339(),
            Value::Date(v) => v.format("%Y-%m-%d").to_string(),
            Value::Time(v) => v.format("%H:%M:%S%.f").to_string(),
            Value::Binary(v) => general_purpose::STANDARD.encode(v),
            Value::Guid(v) => v.to_string(),
            Value::Array(_) | Value::Struct(_) => {
                return Err(ValueError::NotScalar(self.kind().to_string()));
            }
        };
        Ok(s)
    }
}

fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "INF".to_string()
    } else if v == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        v.to_string()
    }
}
