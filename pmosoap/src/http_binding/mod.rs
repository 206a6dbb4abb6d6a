//! # Liaison HTTP GET/POST (hors SOAP)
//!
//! Une opération dont les paramètres d'entrée sont tous simples peut aussi
//! être appelée par `GET {service}/{méthode}?a=1&b=2` ou par un formulaire
//! `POST` encodé `application/x-www-form-urlencoded`. Le retour est un
//! document XML dont la racine porte le nom du type.
//!
//! ## Fonctionnalités
//!
//! - ✅ Éligibilité : scalaires, énumérations et tableaux de ceux-ci, pas de
//!   paramètre `out`
//! - ✅ Lecture de la requête URL et du formulaire
//! - ✅ Écriture du retour XML (vide pour une méthode sans retour)
//! - ✅ Côté client : écriture requête/formulaire, relecture du retour

mod params;
mod returns;

pub use params::{read_form_parameters, read_query_parameters, write_parameters};
pub use returns::{read_return, write_return};

use thiserror::Error;

use crate::mapping::MappingError;
use crate::method::LogicalMethod;
use crate::values::ValueError;

/// Erreurs de la liaison HTTP simple.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HttpBindingError {
    #[error("Missing parameter: {0}.")]
    MissingParameter(String),

    #[error("Cannot convert '{name}': {source}")]
    InvalidParameter { name: String, source: ValueError },

    #[error("Method {0} cannot be called over HTTP GET/POST")]
    NotEligible(String),

    #[error("Expected {expected} parameter values, got {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("Invalid XML return: {0}")]
    Xml(String),
}

/// Vrai si la méthode peut être exposée en GET/POST.
pub fn is_http_eligible(method: &LogicalMethod) -> bool {
    method.out_parameters().is_empty()
        && method
            .in_parameters()
            .iter()
            .all(|p| p.ty.is_http_eligible())
}

/// Nom sous lequel la méthode est publiée (`MessageName` ou nom logique).
pub fn message_name(method: &LogicalMethod) -> String {
    method
        .attributes()
        .web_method
        .as_ref()
        .and_then(|w| w.message_name.clone())
        .unwrap_or_else(|| method.name().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::WebMethodAttribute;
    use crate::method::{LogicalMethodTypes, MethodDecl};
    use crate::values::{SchemaType, StructType};
    use std::sync::Arc;

    fn logical(decl: MethodDecl) -> LogicalMethod {
        LogicalMethod::create(&[decl], LogicalMethodTypes::ALL)
            .unwrap()
            .remove(0)
    }

    #[test]
    fn test_eligibility() {
        let simple = logical(
            MethodDecl::new("S", "Add")
                .param("a", SchemaType::Int)
                .param("tags", SchemaType::Array(Box::new(SchemaType::String)))
                .returns(SchemaType::Struct(Arc::new(StructType::new("Point")))),
        );
        assert!(is_http_eligible(&simple));

        let with_struct = logical(
            MethodDecl::new("S", "Put").param("p", SchemaType::Struct(Arc::new(StructType::new("Point")))),
        );
        assert!(!is_http_eligible(&with_struct));

        let with_out = logical(MethodDecl::new("S", "Get").out_param("x", SchemaType::Int));
        assert!(!is_http_eligible(&with_out));
    }

    #[test]
    fn test_message_name() {
        let renamed = logical(MethodDecl::new("S", "Add").web_method(WebMethodAttribute {
            message_name: Some("AddInts".into()),
            ..Default::default()
        }));
        assert_eq!(message_name(&renamed), "AddInts");
        assert_eq!(message_name(&logical(MethodDecl::new("S", "Ping"))), "Ping");
    }
}
