//! Paramètres passés en requête URL ou en formulaire.

use url::form_urlencoded;

use super::{HttpBindingError, is_http_eligible};
use crate::method::LogicalMethod;
use crate::values::{SchemaType, Value};

/// Lit les paramètres d'une requête URL (`a=1&b=2`).
pub fn read_query_parameters(
    method: &LogicalMethod,
    query: &str,
) -> Result<Vec<Value>, HttpBindingError> {
    read_pairs(method, form_urlencoded::parse(query.as_bytes()).into_owned().collect())
}

/// Lit les paramètres d'un corps `application/x-www-form-urlencoded`.
pub fn read_form_parameters(
    method: &LogicalMethod,
    body: &[u8],
) -> Result<Vec<Value>, HttpBindingError> {
    read_pairs(method, form_urlencoded::parse(body).into_owned().collect())
}

fn read_pairs(
    method: &LogicalMethod,
    pairs: Vec<(String, String)>,
) -> Result<Vec<Value>, HttpBindingError> {
    if !is_http_eligible(method) {
        return Err(HttpBindingError::NotEligible(method.name().to_string()));
    }

    method
        .in_parameters()
        .iter()
        .map(|param| {
            let mut raw = pairs
                .iter()
                .filter(|(k, _)| *k == param.name)
                .map(|(_, v)| v.as_str());
            let convert = |ty: &SchemaType, text: &str| {
                ty.parse_value(text)
                    .map_err(|source| HttpBindingError::InvalidParameter {
                        name: param.name.clone(),
                        source,
                    })
            };
            match &param.ty {
                SchemaType::Array(item) => raw
                    .map(|text| convert(item, text))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                ty => match raw.next() {
                    Some(text) => convert(ty, text),
                    None => Err(HttpBindingError::MissingParameter(param.name.clone())),
                },
            }
        })
        .collect()
}

/// Encode les valeurs d'entrée, pour une requête URL comme pour un
/// formulaire ; un tableau répète le nom du paramètre.
pub fn write_parameters(
    method: &LogicalMethod,
    values: &[Value],
) -> Result<String, HttpBindingError> {
    if !is_http_eligible(method) {
        return Err(HttpBindingError::NotEligible(method.name().to_string()));
    }
    let params = method.in_parameters();
    if params.len() != values.len() {
        return Err(HttpBindingError::ArityMismatch {
            expected: params.len(),
            found: values.len(),
        });
    }

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (param, value) in params.iter().zip(values) {
        let items: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            Value::Null => Vec::new(),
            single => vec![single],
        };
        for item in items {
            let text = item
                .to_text()
                .map_err(|source| HttpBindingError::InvalidParameter {
                    name: param.name.clone(),
                    source,
                })?;
            serializer.append_pair(&param.name, &text);
        }
    }
    Ok(serializer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::{LogicalMethodTypes, MethodDecl};
    use crate::values::EnumType;
    use std::sync::Arc;

    fn method() -> LogicalMethod {
        let color = SchemaType::Enum(Arc::new(EnumType::new("Color", ["Red", "Blue"])));
        LogicalMethod::create(
            &[MethodDecl::new("S", "Paint")
                .param("n", SchemaType::Int)
                .param("color", color)
                .param("tags", SchemaType::Array(Box::new(SchemaType::String)))],
            LogicalMethodTypes::ALL,
        )
        .unwrap()
        .remove(0)
    }

    #[test]
    fn test_read_query() {
        let values = read_query_parameters(&method(), "n=3&color=Blue&tags=a&tags=b%20c").unwrap();
        assert_eq!(values[0], Value::Int(3));
        assert_eq!(values[1], Value::Enum("Blue".into()));
        assert_eq!(
            values[2],
            Value::Array(vec![Value::String("a".into()), Value::String("b c".into())])
        );
    }

    #[test]
    fn test_missing_scalar_and_empty_array() {
        assert_eq!(
            read_query_parameters(&method(), "color=Red").unwrap_err(),
            HttpBindingError::MissingParameter("n".into())
        );
        let values = read_form_parameters(&method(), b"n=1&color=Red").unwrap();
        assert_eq!(values[2], Value::Array(vec![]));
    }

    #[test]
    fn test_invalid_value() {
        let err = read_query_parameters(&method(), "n=x&color=Red").unwrap_err();
        assert!(matches!(err, HttpBindingError::InvalidParameter { ref name, .. } if name == "n"));
    }

    #[test]
    fn test_write_then_read_form() {
        let m = method();
        let encoded = write_parameters(
            &m,
            &[
                Value::Int(7),
                Value::Enum("Red".into()),
                Value::Array(vec![Value::String("x&y".into())]),
            ],
        )
        .unwrap();
        assert_eq!(encoded, "n=7&color=Red&tags=x%26y");
        let values = read_form_parameters(&m, encoded.as_bytes()).unwrap();
        assert_eq!(values[2], Value::Array(vec![Value::String("x&y".into())]));
    }
}
