use base64::Engine;
use base64::engine::general_purpose;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::values::{SchemaType, Value, ValueError};

impl SchemaType {
    /// Lit le contenu texte d'un élément selon le type déclaré.
    ///
    /// Les bornes des entiers courts sont vérifiées. Les tableaux et les
    /// structures n'ont pas de représentation texte.
    pub fn parse_value(&self, text: &str) -> Result<Value, ValueError> {
        let s = text.trim();
        match self {
            SchemaType::Boolean => match s {
                "true" | "1" => Ok(Value::Boolean(true)),
                "false" | "0" => Ok(Value::Boolean(false)),
                _ => Err(ValueError::parse(s, "boolean")),
            },
            SchemaType::Byte => parse_signed(s, i8::MIN as i64, i8::MAX as i64, "byte"),
            SchemaType::Short => parse_signed(s, i16::MIN as i64, i16::MAX as i64, "short"),
            SchemaType::Int => parse_signed(s, i32::MIN as i64, i32::MAX as i64, "int"),
            SchemaType::Long => s
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| ValueError::parse(s, "long")),
            SchemaType::UnsignedByte => parse_unsigned(s, u8::MAX as u64, "unsignedByte"),
            SchemaType::UnsignedShort => parse_unsigned(s, u16::MAX as u64, "unsignedShort"),
            SchemaType::UnsignedInt => parse_unsigned(s, u32::MAX as u64, "unsignedInt"),
            SchemaType::UnsignedLong => s
                .parse::<u64>()
                .map(Value::UInt)
                .map_err(|_| ValueError::parse(s, "unsignedLong")),
            SchemaType::Float | SchemaType::Double => parse_float(s).map(Value::Float),
            SchemaType::String => Ok(Value::String(text.to_string())),
            SchemaType::AnyUri => Ok(Value::Uri(s.to_string())),
            SchemaType::DateTime => parse_datetime(s).map(Value::DateTime),
            SchemaType::Date => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|_| ValueError::parse(s, "date")),
            SchemaType::Time => NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                .map(Value::Time)
                .map_err(|_| ValueError::parse(s, "time")),
            SchemaType::Base64Binary => general_purpose::STANDARD
                .decode(s)
                .map(Value::Binary)
                .map_err(|_| ValueError::parse(s, "base64Binary")),
            SchemaType::Guid => Uuid::parse_str(s)
                .map(Value::Guid)
                .map_err(|_| ValueError::parse(s, "guid")),
            SchemaType::Enum(e) => {
                if e.values.iter().any(|v| v == s) {
                    Ok(Value::Enum(s.to_string()))
                } else {
                    Err(ValueError::UnknownEnumValue {
                        value: s.to_string(),
                        type_name: e.name.clone(),
                    })
                }
            }
            other => Err(ValueError::NotScalar(other.to_string())),
        }
    }

    /// Retrouve un type scalaire à partir de son nom XSD local.
    pub fn from_xsd_name(name: &str) -> Option<SchemaType> {
        let ty = match name {
            "boolean" => SchemaType::Boolean,
            "byte" => SchemaType::Byte,
            "unsignedByte" => SchemaType::UnsignedByte,
            "short" => SchemaType::Short,
            "unsignedShort" => SchemaType::UnsignedShort,
            "int" => SchemaType::Int,
            "unsignedInt" => SchemaType::UnsignedInt,
            "long" => SchemaType::Long,
            "unsignedLong" => SchemaType::UnsignedLong,
            "float" => SchemaType::Float,
            "double" => SchemaType::Double,
            "string" => SchemaType::String,
            "dateTime" => SchemaType::DateTime,
            "date" => SchemaType::Date,
            "time" => SchemaType::Time,
            "base64Binary" => SchemaType::Base64Binary,
            "guid" => SchemaType::Guid,
            "anyURI" => SchemaType::AnyUri,
            _ => return None,
        };
        Some(ty)
    }
}

fn parse_signed(s: &str, min: i64, max: i64, type_name: &str) -> Result<Value, ValueError> {
    let v = s
        .parse::<i64>()
        .map_err(|_| ValueError::parse(s, type_name))?;
    if v < min || v > max {
        return Err(ValueError::RangeError(format!(
            "{} out of range for {} [{}, {}]",
            v, type_name, min, max
        )));
    }
    Ok(Value::Int(v))
}

fn parse_unsigned(s: &str, max: u64, type_name: &str) -> Result<Value, ValueError> {
    let v = s
        .parse::<u64>()
        .map_err(|_| ValueError::parse(s, type_name))?;
    if v > max {
        return Err(ValueError::RangeError(format!(
            "{} out of range for {} [0, {}]",
            v, type_name, max
        )));
    }
    Ok(Value::UInt(v))
}

fn parse_float(s: &str) -> Result<f64, ValueError> {
    match s {
        "INF" => Ok(f64::INFINITY),
        "-INF" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        _ => s.parse::<f64>().map_err(|_| ValueError::parse(s, "double")),
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<chrono::FixedOffset>, ValueError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    // Sans fuseau : UTC
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc().fixed_offset())
        .or_else(|_| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(|d| d.and_time(NaiveTime::MIN).and_utc().fixed_offset())
        })
        .map_err(|_| ValueError::parse(s, "dateTime"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::EnumType;
    use std::sync::Arc;

    #[test]
    fn test_parse_bounded_integers() {
        assert_eq!(SchemaType::Int.parse_value(" 42 ").unwrap(), Value::Int(42));
        assert!(matches!(
            SchemaType::Byte.parse_value("200"),
            Err(ValueError::RangeError(_))
        ));
        assert!(matches!(
            SchemaType::UnsignedShort.parse_value("-1"),
            Err(ValueError::ParseError { .. })
        ));
        assert_eq!(
            SchemaType::UnsignedLong.parse_value("18446744073709551615").unwrap(),
            Value::UInt(u64::MAX)
        );
    }

    #[test]
    fn test_parse_boolean_and_float() {
        assert_eq!(SchemaType::Boolean.parse_value("1").unwrap(), Value::Boolean(true));
        assert_eq!(SchemaType::Boolean.parse_value("false").unwrap(), Value::Boolean(false));
        assert!(SchemaType::Boolean.parse_value("yes").is_err());
        assert_eq!(
            SchemaType::Double.parse_value("-INF").unwrap(),
            Value::Float(f64::NEG_INFINITY)
        );
    }

    #[test]
    fn test_parse_datetime_without_offset_is_utc() {
        let v = SchemaType::DateTime.parse_value("2024-03-01T10:20:30").unwrap();
        match v {
            Value::DateTime(dt) => assert_eq!(dt.offset().local_minus_utc(), 0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_enum() {
        let color = SchemaType::Enum(Arc::new(EnumType::new("Color", ["Red", "Green"])));
        assert_eq!(color.parse_value("Red").unwrap(), Value::Enum("Red".into()));
        assert!(matches!(
            color.parse_value("Blue"),
            Err(ValueError::UnknownEnumValue { .. })
        ));
    }

    #[test]
    fn test_struct_has_no_text_form() {
        let array = SchemaType::Array(Box::new(SchemaType::Int));
        assert!(matches!(array.parse_value("1"), Err(ValueError::NotScalar(_))));
    }
}
