//! # Réflexion SOAP
//!
//! Transforme les déclarations d'un service ([`ServiceDescriptor`]) en
//! contrat sur le fil : action, éléments de requête et de réponse, style,
//! en-têtes et extensions, et correspondances de membres.
//!
//! ## Règles appliquées
//!
//! - ✅ Style/usage/paramètres : méthode > service > Document/Literal/Wrapped
//! - ✅ Action par défaut `{ns}/{message}` (sans double `/`)
//! - ✅ Élément de réponse RPC/Literal toujours `{méthode}Response`
//! - ✅ Méthodes one-way sans sortie, en-têtes validés, priorités d'extension positives
//! - ✅ Ambiguïtés de routage détectées au niveau du service

mod builder;
mod service;

use std::collections::HashMap;

use tracing::debug;

pub use builder::{ServiceBuilder, ServiceDescriptor};
pub use service::{ReflectedService, Route, RoutingTable};

use crate::attributes::{
    SoapBindingStyle, SoapBindingUse, SoapExtensionAttribute, SoapHeaderDirection,
    SoapMethodAttribute, SoapParameterStyle, SoapServiceRoutingStyle, WebServiceBindingAttribute,
};
use crate::errors::ConfigError;
use crate::extensions::sort_extensions;
use crate::headers::{HeaderMemberType, HeaderType, SoapReflectedHeader};
use crate::mapping::{MemberMapping, MembersMapping};
use crate::method::{LogicalMethod, ParameterDecl};
use crate::xml::QName;

/// Contrat sur le fil d'une opération.
#[derive(Debug, Clone)]
pub struct SoapReflectedMethod {
    pub method: LogicalMethod,
    /// Nom de message (`message_name` ou nom de méthode)
    pub name: String,
    pub action: String,
    pub binding: Option<WebServiceBindingAttribute>,
    pub request_element: QName,
    pub response_element: QName,
    pub rpc: bool,
    pub use_: SoapBindingUse,
    pub parameter_style: SoapParameterStyle,
    pub one_way: bool,
    pub buffer_response: bool,
    pub description: String,
    /// En-têtes personnalisés d'abord, puis génériques
    pub headers: Vec<SoapReflectedHeader>,
    /// Triées par priorité croissante
    pub extensions: Vec<SoapExtensionAttribute>,
    pub request_mapping: MembersMapping,
    /// Absente pour une méthode one-way
    pub response_mapping: Option<MembersMapping>,
    pub in_headers_key: String,
    pub out_headers_key: String,
    /// Revendication WS-I Basic Profile 1.1
    pub wsi_claims: bool,
}

impl SoapReflectedMethod {
    pub fn is_encoded(&self) -> bool {
        self.use_ == SoapBindingUse::Encoded
    }

    pub fn is_bare(&self) -> bool {
        self.parameter_style == SoapParameterStyle::Bare
    }

    /// En-têtes déclarés dans une direction.
    pub fn headers_for(&self, direction: SoapHeaderDirection) -> Vec<SoapReflectedHeader> {
        self.headers
            .iter()
            .filter(|h| h.direction.overlaps(direction))
            .cloned()
            .collect()
    }
}

/// Namespace des types encodés d'un service.
pub fn encoded_namespace(ns: &str, service_default_is_encoded: bool) -> String {
    if service_default_is_encoded {
        ns.to_string()
    } else {
        join_ns(ns, "encodedTypes")
    }
}

/// Namespace des types littéraux d'un service.
pub fn literal_namespace(ns: &str, service_default_is_encoded: bool) -> String {
    if service_default_is_encoded {
        join_ns(ns, "literalTypes")
    } else {
        ns.to_string()
    }
}

/// Action par défaut d'un message.
pub fn default_action(ns: &str, message_name: &str) -> String {
    join_ns(ns, message_name)
}

fn join_ns(ns: &str, suffix: &str) -> String {
    if ns.ends_with('/') {
        format!("{}{}", ns, suffix)
    } else {
        format!("{}/{}", ns, suffix)
    }
}

/// Réfléchit une opération d'un service.
///
/// Côté client, une méthode sans attribut SOAP n'est pas exposée et la
/// fonction renvoie `None`.
pub fn reflect_method(
    service: &ServiceDescriptor,
    method: &LogicalMethod,
    client: bool,
) -> Result<Option<SoapReflectedMethod>, ConfigError> {
    let service_attr = service.soap_service();
    let service_encoded = service.default_is_encoded();
    let default_ns = service.namespace();

    let attr = match &method.attributes().soap {
        Some(a) => a.clone(),
        None if client => return Ok(None),
        None => match service_attr.style {
            SoapBindingStyle::Rpc => SoapMethodAttribute {
                use_: service_attr.use_,
                ..SoapMethodAttribute::rpc()
            },
            _ => SoapMethodAttribute {
                use_: service_attr.use_,
                ..SoapMethodAttribute::document()
            },
        },
    };

    let rpc = attr.style == SoapBindingStyle::Rpc;
    let service_is_document = service_attr.style != SoapBindingStyle::Rpc;
    let use_ = match attr.use_ {
        SoapBindingUse::Default if rpc => SoapBindingUse::Encoded,
        SoapBindingUse::Default => match service_attr.use_ {
            SoapBindingUse::Default => SoapBindingUse::Literal,
            u if service_is_document => u,
            _ => SoapBindingUse::Literal,
        },
        u => u,
    };
    let parameter_style = if rpc {
        SoapParameterStyle::Wrapped
    } else {
        match attr.parameter_style {
            SoapParameterStyle::Default => match service_attr.parameter_style {
                SoapParameterStyle::Default => SoapParameterStyle::Wrapped,
                p if service_is_document => p,
                _ => SoapParameterStyle::Wrapped,
            },
            p => p,
        }
    };
    let encoded = use_ == SoapBindingUse::Encoded;
    let bare = parameter_style == SoapParameterStyle::Bare;

    let binding = match attr.binding.as_deref() {
        Some(name) if !name.is_empty() => {
            if client {
                return Err(ConfigError::Invalid(format!(
                    "binding {} cannot be set on client method {}",
                    name,
                    method.name()
                )));
            }
            Some(service.binding(name).cloned().ok_or_else(|| {
                ConfigError::Invalid(format!("unknown binding {} on {}", name, method.name()))
            })?)
        }
        _ => None,
    };
    let binding_ns = binding
        .as_ref()
        .map(|b| b.namespace.as_str())
        .filter(|ns| !ns.is_empty());

    let web_method = method.attributes().web_method.clone().unwrap_or_default();
    let name = web_method
        .message_name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| method.name().to_string());

    let explicit_request = attr.request_element_name.clone().filter(|n| !n.is_empty());
    let request_name = if rpc {
        match explicit_request {
            Some(n) if client => n,
            _ => method.name().to_string(),
        }
    } else {
        explicit_request.unwrap_or_else(|| name.clone())
    };
    let request_ns_is_default = attr.request_namespace.is_none();
    let request_ns = attr
        .request_namespace
        .clone()
        .or_else(|| binding_ns.map(str::to_string))
        .unwrap_or_else(|| default_ns.to_string());

    let explicit_response = attr.response_element_name.clone().filter(|n| !n.is_empty());
    let response_name = if !rpc || encoded {
        explicit_response.unwrap_or_else(|| format!("{}Response", name))
    } else {
        format!("{}Response", method.name())
    };
    let response_ns_is_default = attr.response_namespace.is_none();
    let response_ns = attr
        .response_namespace
        .clone()
        .or_else(|| binding_ns.map(str::to_string))
        .unwrap_or_else(|| default_ns.to_string());

    let action = attr
        .action
        .clone()
        .unwrap_or_else(|| default_action(default_ns, &name));

    if attr.one_way {
        if !method.out_parameters().is_empty() {
            return Err(ConfigError::OneWayOutParameters(method.name().to_string()));
        }
        if !method.is_void() {
            return Err(ConfigError::OneWayReturnValue(method.name().to_string()));
        }
    }

    let types_ns = encoded_namespace(default_ns, service_encoded);
    let shape = MappingShape {
        encoded,
        rpc,
        bare,
        service_encoded,
        types_ns: &types_ns,
    };

    let request_members = members_of(method.in_parameters());
    let request_mapping = shape.import(
        &request_name,
        &request_ns,
        request_ns_is_default,
        request_members,
    );

    if service_attr.routing_style == SoapServiceRoutingStyle::RequestElement
        && bare
        && request_mapping.len() != 1
    {
        return Err(ConfigError::BareRequestElement {
            method: method.name().to_string(),
            count: request_mapping.len(),
        });
    }

    let request_element = if bare {
        match request_mapping.members.as_slice() {
            [only] => QName::new(request_mapping.element.namespace.clone(), only.name.clone()),
            _ => QName::default(),
        }
    } else {
        request_mapping.element.clone()
    };

    let response_mapping = if attr.one_way {
        None
    } else {
        let mut members = Vec::new();
        if let Some(ret) = method.return_type() {
            let mut result_name = format!("{}Result", name);
            let taken = |n: &str| method.out_parameters().iter().any(|p| p.name == n);
            let mut i = 1;
            while taken(&result_name) {
                result_name = format!("{}Result{}", name, i);
                i += 1;
            }
            members.push(MemberMapping::new(&result_name, ret.clone()));
        }
        members.extend(members_of(method.out_parameters()));
        Some(shape.import(&response_name, &response_ns, response_ns_is_default, members))
    };
    let response_element = match &response_mapping {
        Some(m) if !bare => m.element.clone(),
        _ => QName::new(response_ns.clone(), response_name.clone()),
    };

    let extensions = sort_extensions(&method.attributes().extensions)?;
    let headers = reflect_headers(service, method, attr.one_way)?;

    let wsi_claims = binding
        .as_ref()
        .or_else(|| service.default_binding())
        .is_some_and(|b| b.conforms_to_bp11);

    debug!(
        "🔍 {} → action={} requête={} réponse={}",
        method.name(),
        action,
        request_element,
        response_element
    );

    Ok(Some(SoapReflectedMethod {
        in_headers_key: format!("{}:InHeaders", method.key()),
        out_headers_key: format!("{}:OutHeaders", method.key()),
        method: method.clone(),
        name,
        action,
        binding,
        request_element,
        response_element,
        rpc,
        use_,
        parameter_style,
        one_way: attr.one_way,
        buffer_response: web_method.buffer_response,
        description: web_method.description,
        headers,
        extensions,
        request_mapping,
        response_mapping,
        wsi_claims,
    }))
}

struct MappingShape<'a> {
    encoded: bool,
    rpc: bool,
    bare: bool,
    service_encoded: bool,
    types_ns: &'a str,
}

impl MappingShape<'_> {
    fn import(
        &self,
        element_name: &str,
        ns: &str,
        ns_is_default: bool,
        members: Vec<MemberMapping>,
    ) -> MembersMapping {
        let (element_ns, wrapped) = if self.encoded {
            let ns = if !self.rpc && !self.bare && ns_is_default {
                encoded_namespace(ns, self.service_encoded)
            } else {
                ns.to_string()
            };
            (ns, self.rpc || !self.bare)
        } else {
            let ns = if ns_is_default {
                literal_namespace(ns, self.service_encoded)
            } else {
                ns.to_string()
            };
            (ns, !self.bare)
        };

        let mapping = if wrapped {
            MembersMapping::wrapped(QName::new(element_ns, element_name), members)
        } else {
            MembersMapping::bare(&element_ns, members)
        };
        mapping
            .with_rpc(self.rpc)
            .with_encoding(self.encoded, self.types_ns)
    }
}

fn members_of(params: &[ParameterDecl]) -> Vec<MemberMapping> {
    params
        .iter()
        .map(|p| MemberMapping::new(&p.name, p.ty.clone()))
        .collect()
}

fn header_type_key(ty: &HeaderType) -> String {
    match ty {
        HeaderType::Generic => "SoapHeader".to_string(),
        HeaderType::Unknown => "SoapUnknownHeader".to_string(),
        HeaderType::Custom(s) => format!("{}:{}", s.namespace.clone().unwrap_or_default(), s.name),
    }
}

fn reflect_headers(
    service: &ServiceDescriptor,
    method: &LogicalMethod,
    one_way: bool,
) -> Result<Vec<SoapReflectedHeader>, ConfigError> {
    let mut custom = Vec::new();
    let mut generic = Vec::new();
    let mut seen: HashMap<String, (SoapHeaderDirection, String)> = HashMap::new();

    for attr in &method.attributes().headers {
        let member = service
            .member(&attr.member)
            .ok_or_else(|| ConfigError::HeaderMemberNotFound {
                method: method.name().to_string(),
                member: attr.member.clone(),
            })?;

        let header_type = match &member.ty {
            HeaderMemberType::Header(ht) => ht.clone(),
            HeaderMemberType::Other(_) => {
                return Err(ConfigError::HeaderNotHeaderType(attr.member.clone()));
            }
        };
        let repeats = member.is_array;
        if repeats && header_type.is_custom() {
            return Err(ConfigError::HeaderRepeatsType(attr.member.clone()));
        }
        if member.is_static {
            return Err(ConfigError::HeaderMemberStatic(attr.member.clone()));
        }
        if !member.can_read || !member.can_write {
            return Err(ConfigError::HeaderMemberAccess(attr.member.clone()));
        }
        if one_way && attr.direction.overlaps(SoapHeaderDirection::OUT | SoapHeaderDirection::FAULT) {
            return Err(ConfigError::OneWayOutHeader {
                method: method.name().to_string(),
                member: attr.member.clone(),
            });
        }

        let key = header_type_key(&header_type);
        match seen.get_mut(&key) {
            Some((direction, first)) => {
                if direction.overlaps(attr.direction) {
                    return Err(ConfigError::HeaderAmbiguous {
                        method: method.name().to_string(),
                        first: first.clone(),
                        second: attr.member.clone(),
                    });
                }
                *direction = *direction | attr.direction;
            }
            None => {
                seen.insert(key, (attr.direction, attr.member.clone()));
            }
        }

        let reflected = SoapReflectedHeader {
            member: attr.member.clone(),
            custom: header_type.is_custom(),
            header_type,
            direction: attr.direction,
            repeats,
            required: attr.required,
        };
        if reflected.custom {
            custom.push(reflected);
        } else {
            generic.push(reflected);
        }
    }

    generic.reverse();
    custom.extend(generic);
    Ok(custom)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::attributes::{
        SoapHeaderAttribute, SoapServiceAttribute, WebMethodAttribute, WebServiceBindingAttribute,
    };
    use crate::headers::HeaderMember;
    use crate::method::MethodDecl;
    use crate::values::{SchemaType, StructType};

    fn calc() -> ServiceBuilder {
        ServiceBuilder::new("Calculator").namespace("http://tempuri.org/")
    }

    fn add_decl() -> MethodDecl {
        MethodDecl::new("Calculator", "Add")
            .param("a", SchemaType::Int)
            .param("b", SchemaType::Int)
            .returns(SchemaType::Int)
    }

    fn reflect(builder: ServiceBuilder, client: bool) -> Result<SoapReflectedMethod, ConfigError> {
        let service = builder.build()?;
        let method = service.methods()[0].clone();
        reflect_method(&service, &method, client).map(|m| m.unwrap())
    }

    #[test]
    fn test_document_literal_wrapped_defaults() {
        let m = reflect(calc().method(add_decl()), false).unwrap();
        assert_eq!(m.action, "http://tempuri.org/Add");
        assert!(!m.rpc);
        assert_eq!(m.use_, SoapBindingUse::Literal);
        assert_eq!(m.parameter_style, SoapParameterStyle::Wrapped);
        assert_eq!(m.request_element, QName::new("http://tempuri.org/", "Add"));
        assert_eq!(m.response_element, QName::new("http://tempuri.org/", "AddResponse"));
        let resp = m.response_mapping.unwrap();
        assert_eq!(resp.members[0].name, "AddResult");
        assert!(m.in_headers_key.ends_with(":InHeaders"));
    }

    #[test]
    fn test_action_without_double_slash() {
        let m = reflect(
            ServiceBuilder::new("S").namespace("urn:svc").method(add_decl()),
            false,
        )
        .unwrap();
        assert_eq!(m.action, "urn:svc/Add");
        assert_eq!(encoded_namespace("http://x/", false), "http://x/encodedTypes");
        assert_eq!(literal_namespace("http://x", true), "http://x/literalTypes");
        assert_eq!(literal_namespace("http://x", false), "http://x");
    }

    #[test]
    fn test_message_name_and_overrides() {
        let decl = add_decl()
            .web_method(WebMethodAttribute {
                message_name: Some("AddInts".into()),
                ..Default::default()
            })
            .soap(SoapMethodAttribute {
                request_element_name: Some("AddRequest".into()),
                response_element_name: Some("AddReply".into()),
                ..SoapMethodAttribute::document()
            });
        let m = reflect(calc().method(decl), false).unwrap();
        assert_eq!(m.name, "AddInts");
        assert_eq!(m.action, "http://tempuri.org/AddInts");
        assert_eq!(m.request_element.name, "AddRequest");
        assert_eq!(m.response_element.name, "AddReply");
        assert_eq!(m.response_mapping.unwrap().members[0].name, "AddIntsResult");
    }

    #[test]
    fn test_rpc_naming() {
        let decl = add_decl()
            .web_method(WebMethodAttribute {
                message_name: Some("AddInts".into()),
                ..Default::default()
            })
            .soap(SoapMethodAttribute {
                use_: SoapBindingUse::Literal,
                request_element_name: Some("Custom".into()),
                response_element_name: Some("CustomResponse".into()),
                ..SoapMethodAttribute::rpc()
            });
        let server = reflect(calc().method(decl.clone()), false).unwrap();
        assert!(server.rpc);
        assert_eq!(server.request_element.name, "Add");
        // RPC/Literal : la surcharge de réponse est ignorée
        assert_eq!(server.response_element.name, "AddResponse");

        let client = reflect(calc().method(decl), true).unwrap();
        assert_eq!(client.request_element.name, "Custom");
    }

    #[test]
    fn test_rpc_defaults_to_encoded() {
        let m = reflect(calc().soap_service(SoapServiceAttribute::rpc()).method(add_decl()), false)
            .unwrap();
        assert!(m.rpc);
        assert!(m.is_encoded());
        assert!(m.request_mapping.has_wrapper);
    }

    #[test]
    fn test_document_encoded_uses_encoded_namespace() {
        let decl = add_decl().soap(SoapMethodAttribute {
            use_: SoapBindingUse::Encoded,
            ..SoapMethodAttribute::document()
        });
        let m = reflect(calc().method(decl), false).unwrap();
        assert_eq!(m.request_element.namespace, "http://tempuri.org/encodedTypes");
    }

    #[test]
    fn test_client_skips_methods_without_soap_attribute() {
        let service = calc().method(add_decl()).build().unwrap();
        let method = service.methods()[0].clone();
        assert!(reflect_method(&service, &method, true).unwrap().is_none());
    }

    #[test]
    fn test_one_way_validation() {
        let one_way = SoapMethodAttribute {
            one_way: true,
            ..SoapMethodAttribute::document()
        };
        let err = reflect(calc().method(add_decl().soap(one_way.clone())), false).unwrap_err();
        assert_eq!(err, ConfigError::OneWayReturnValue("Add".into()));

        let with_out = MethodDecl::new("Calculator", "Log")
            .param("msg", SchemaType::String)
            .out_param("id", SchemaType::Int)
            .soap(one_way.clone());
        let err = reflect(calc().method(with_out), false).unwrap_err();
        assert_eq!(err, ConfigError::OneWayOutParameters("Log".into()));

        let ok = MethodDecl::new("Calculator", "Log")
            .param("msg", SchemaType::String)
            .soap(one_way);
        let m = reflect(calc().method(ok), false).unwrap();
        assert!(m.one_way);
        assert!(m.response_mapping.is_none());

        // Sans one-way, retour et sorties sont permis
        assert!(reflect(calc().method(add_decl()), false).is_ok());
    }

    #[test]
    fn test_bare_with_request_element_routing() {
        let service = SoapServiceAttribute::document(SoapBindingUse::Literal, SoapParameterStyle::Bare)
            .routed_by(SoapServiceRoutingStyle::RequestElement);
        let err = reflect(calc().soap_service(service.clone()).method(add_decl()), false).unwrap_err();
        assert_eq!(
            err,
            ConfigError::BareRequestElement {
                method: "Add".into(),
                count: 2
            }
        );

        let single = MethodDecl::new("Calculator", "Square")
            .param("x", SchemaType::Int)
            .returns(SchemaType::Int);
        let m = reflect(calc().soap_service(service).method(single), false).unwrap();
        assert_eq!(m.request_element, QName::new("http://tempuri.org/", "x"));
    }

    fn auth() -> Arc<StructType> {
        Arc::new(StructType::new("Auth").with_namespace("http://tempuri.org/"))
    }

    #[test]
    fn test_header_validation() {
        let base = || {
            calc()
                .header_member(HeaderMember::new("Auth", HeaderType::Custom(auth())))
                .header_member(HeaderMember::new("Auth2", HeaderType::Custom(auth())))
                .header_member(HeaderMember::new("Unknowns", HeaderType::Unknown).array())
                .header_member(HeaderMember::other("Count", SchemaType::Int))
        };

        let missing = add_decl().header(SoapHeaderAttribute::new("Nope", SoapHeaderDirection::IN));
        assert!(matches!(
            reflect(base().method(missing), false),
            Err(ConfigError::HeaderMemberNotFound { .. })
        ));

        let not_header = add_decl().header(SoapHeaderAttribute::new("Count", SoapHeaderDirection::IN));
        assert_eq!(
            reflect(base().method(not_header), false).unwrap_err(),
            ConfigError::HeaderNotHeaderType("Count".into())
        );

        let ambiguous = add_decl()
            .header(SoapHeaderAttribute::new("Auth", SoapHeaderDirection::IN))
            .header(SoapHeaderAttribute::new("Auth2", SoapHeaderDirection::IN_OUT));
        assert_eq!(
            reflect(base().method(ambiguous), false).unwrap_err(),
            ConfigError::HeaderAmbiguous {
                method: "Add".into(),
                first: "Auth".into(),
                second: "Auth2".into()
            }
        );

        let disjoint = add_decl()
            .header(SoapHeaderAttribute::new("Unknowns", SoapHeaderDirection::IN))
            .header(SoapHeaderAttribute::new("Auth", SoapHeaderDirection::IN))
            .header(SoapHeaderAttribute::new("Auth2", SoapHeaderDirection::OUT));
        let m = reflect(base().method(disjoint), false).unwrap();
        let order: Vec<_> = m.headers.iter().map(|h| h.member.as_str()).collect();
        assert_eq!(order, vec!["Auth", "Auth2", "Unknowns"]);
        assert!(m.headers[2].repeats);
    }

    #[test]
    fn test_header_member_constraints() {
        let decl = |m: &str| add_decl().header(SoapHeaderAttribute::new(m, SoapHeaderDirection::IN));
        let b = calc()
            .header_member(HeaderMember::new("S", HeaderType::Generic).static_member())
            .header_member(HeaderMember::new("R", HeaderType::Generic).read_only())
            .header_member(HeaderMember::new("A", HeaderType::Custom(auth())).array());
        assert_eq!(
            reflect(b.clone().method(decl("S")), false).unwrap_err(),
            ConfigError::HeaderMemberStatic("S".into())
        );
        assert_eq!(
            reflect(b.clone().method(decl("R")), false).unwrap_err(),
            ConfigError::HeaderMemberAccess("R".into())
        );
        assert_eq!(
            reflect(b.method(decl("A")), false).unwrap_err(),
            ConfigError::HeaderRepeatsType("A".into())
        );
    }

    #[test]
    fn test_one_way_out_header() {
        let decl = MethodDecl::new("Calculator", "Ping")
            .soap(SoapMethodAttribute {
                one_way: true,
                ..SoapMethodAttribute::document()
            })
            .header(SoapHeaderAttribute::new("Auth", SoapHeaderDirection::OUT));
        let err = reflect(
            calc()
                .header_member(HeaderMember::new("Auth", HeaderType::Custom(auth())))
                .method(decl),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::OneWayOutHeader { .. }));
    }

    #[test]
    fn test_wsi_claim_from_default_binding() {
        let m = reflect(
            calc()
                .binding(WebServiceBindingAttribute {
                    conforms_to_bp11: true,
                    ..Default::default()
                })
                .method(add_decl()),
            false,
        )
        .unwrap();
        assert!(m.wsi_claims);
    }
}
