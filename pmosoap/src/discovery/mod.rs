//! # Documents de découverte
//!
//! Un service publie sa description sur son URL :
//!
//! - `?wsdl` : WSDL 1.1, liaisons SOAP 1.1/1.2 et HTTP selon les protocoles
//! - `?disco` : document DISCO
//! - `?schema=schemaN` : schéma XSD d'un namespace cible
//!
//! ## Fonctionnalités
//!
//! - ✅ Génération unique par type de service, mise en cache
//! - ✅ Réécriture des URL absolues vers le schéma/hôte/port de la requête
//! - ✅ Réponses `text/xml; charset=utf-8`

mod disco;
mod schema;
mod wsdl;

pub use schema::SchemaSet;

use std::borrow::Cow;

use tracing::{debug, info};
use url::Url;

use crate::server::SoapServerType;
use crate::xml;

/// Document demandé par la requête.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryRequest {
    Wsdl,
    Disco,
    Schema(String),
}

impl DiscoveryRequest {
    /// Interprète la requête URL (`wsdl`, `disco`, `schema=schema1`).
    pub fn from_query(query: &str) -> Option<Self> {
        let (key, value) = url::form_urlencoded::parse(query.as_bytes()).next()?;
        match key.to_ascii_lowercase().as_str() {
            "wsdl" => Some(Self::Wsdl),
            "disco" => Some(Self::Disco),
            "schema" if !value.is_empty() => Some(Self::Schema(value.into_owned())),
            _ => None,
        }
    }
}

/// Documents générés pour une URL de base.
#[derive(Debug, Clone)]
pub struct DiscoveryDocuments {
    base_url: String,
    wsdl: String,
    disco: String,
    schemas: Vec<(String, String)>,
}

impl DiscoveryDocuments {
    pub fn generate(server_type: &SoapServerType, base_url: &str) -> Result<Self, xmltree::Error> {
        let (definitions, schema_set) = wsdl::generate(server_type, base_url);
        let wsdl = String::from_utf8_lossy(&xml::to_bytes(&definitions, true)?).into_owned();
        let disco_element = disco::generate(server_type, base_url);
        let disco = String::from_utf8_lossy(&xml::to_bytes(&disco_element, true)?).into_owned();
        let schemas = schema_set
            .render(base_url)
            .into_iter()
            .map(|(id, element)| {
                xml::to_bytes(&element, true).map(|b| (id, String::from_utf8_lossy(&b).into_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "📄 Documents de découverte de {} générés ({} schéma(s))",
            server_type.descriptor().name(),
            schemas.len()
        );
        Ok(Self {
            base_url: base_url.to_string(),
            wsdl,
            disco,
            schemas,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn schema_ids(&self) -> Vec<&str> {
        self.schemas.iter().map(|(id, _)| id.as_str()).collect()
    }

    /// Document demandé, URL réécrites pour `request_url`.
    pub fn document(&self, request: &DiscoveryRequest, request_url: &str) -> Option<String> {
        let text = match request {
            DiscoveryRequest::Wsdl => &self.wsdl,
            DiscoveryRequest::Disco => &self.disco,
            DiscoveryRequest::Schema(id) => {
                &self
                    .schemas
                    .iter()
                    .find(|(sid, _)| sid.eq_ignore_ascii_case(id))?
                    .1
            }
        };
        Some(fix_up_urls(text, &self.base_url, request_url).into_owned())
    }
}

/// Remplace l'URL de génération par celle de la requête quand l'hôte, le
/// port, le schéma ou le chemin diffèrent.
pub fn fix_up_urls<'a>(text: &'a str, cached_base: &str, request_url: &str) -> Cow<'a, str> {
    if cached_base == request_url {
        return Cow::Borrowed(text);
    }
    let (Ok(cached), Ok(requested)) = (Url::parse(cached_base), Url::parse(request_url)) else {
        return Cow::Borrowed(text);
    };
    debug!("🔁 Réécriture {} → {}", cached_base, request_url);

    let mut fixed = text.replace(cached_base, request_url);
    let (from, to) = (
        cached.origin().ascii_serialization(),
        requested.origin().ascii_serialization(),
    );
    if from != to {
        fixed = fixed.replace(&from, &to);
    }
    Cow::Owned(fixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::MethodDecl;
    use crate::operation_handler;
    use crate::reflection::ServiceBuilder;
    use crate::soap::Protocols;
    use crate::values::{SchemaType, Value};

    fn documents() -> DiscoveryDocuments {
        let service = ServiceBuilder::new("Calculator")
            .operation(
                MethodDecl::new("Calculator", "Add")
                    .param("a", SchemaType::Int)
                    .param("b", SchemaType::Int)
                    .returns(SchemaType::Int),
                operation_handler!(|instance, args| {
                    Ok(vec![Value::Int(args.int("a")? + args.int("b")?)])
                }),
            )
            .build()
            .unwrap();
        let st = SoapServerType::new(service, Protocols::ALL).unwrap();
        DiscoveryDocuments::generate(&st, "http://first:8080/calc").unwrap()
    }

    #[test]
    fn test_query_parsing() {
        assert_eq!(DiscoveryRequest::from_query("wsdl"), Some(DiscoveryRequest::Wsdl));
        assert_eq!(DiscoveryRequest::from_query("WSDL"), Some(DiscoveryRequest::Wsdl));
        assert_eq!(DiscoveryRequest::from_query("disco"), Some(DiscoveryRequest::Disco));
        assert_eq!(
            DiscoveryRequest::from_query("schema=schema1"),
            Some(DiscoveryRequest::Schema("schema1".into()))
        );
        assert_eq!(DiscoveryRequest::from_query("op=Add"), None);
        assert_eq!(DiscoveryRequest::from_query("schema="), None);
    }

    #[test]
    fn test_urls_follow_request_host() {
        let docs = documents();
        let same = docs.document(&DiscoveryRequest::Wsdl, "http://first:8080/calc").unwrap();
        assert!(same.contains("http://first:8080/calc"));

        let other = docs.document(&DiscoveryRequest::Wsdl, "https://second/calc").unwrap();
        assert!(other.contains(r#"location="https://second/calc""#));
        assert!(!other.contains("first:8080"));

        let disco = docs.document(&DiscoveryRequest::Disco, "http://third:81/calc").unwrap();
        assert!(disco.contains("http://third:81/calc?wsdl"));
    }

    #[test]
    fn test_schema_documents() {
        let docs = documents();
        assert_eq!(docs.schema_ids(), vec!["schema1"]);
        let schema = docs
            .document(&DiscoveryRequest::Schema("schema1".into()), "http://first:8080/calc")
            .unwrap();
        assert!(schema.contains("targetNamespace=\"http://tempuri.org/\""));
        assert!(docs.document(&DiscoveryRequest::Schema("schema9".into()), "http://x/").is_none());
    }

    #[test]
    fn test_fix_up_keeps_unrelated_text() {
        let text = "<a href=\"http://h:1/s\"/><b>http://other/</b>";
        assert_eq!(fix_up_urls(text, "http://h:1/s", "http://h:1/s"), text);
        assert_eq!(
            fix_up_urls(text, "http://h:1/s", "http://g/s"),
            "<a href=\"http://g/s\"/><b>http://other/</b>"
        );
    }
}
