//! Document WSDL 1.1 d'un service.

use xmltree::Element;

use super::schema::SchemaSet;
use crate::attributes::SoapHeaderDirection;
use crate::headers::HeaderType;
use crate::http_binding::{is_http_eligible, message_name};
use crate::mapping::MembersMapping;
use crate::reflection::SoapReflectedMethod;
use crate::server::SoapServerType;
use crate::soap::{Protocols, SoapVersion, ns};
use crate::values::SchemaType;
use crate::xml;

const HTTP_TRANSPORT: &str = "http://schemas.xmlsoap.org/soap/http";

fn wsdl(local: &str) -> String {
    format!("wsdl:{}", local)
}

fn named(local: &str, name: &str) -> Element {
    let mut e = Element::new(&wsdl(local));
    xml::set_attr(&mut e, "name", name);
    e
}

fn documentation(text: &str) -> Option<Element> {
    (!text.is_empty()).then(|| xml::text_element(&wsdl("documentation"), text))
}

/// Nom de la liaison SOAP 1.1 d'une méthode.
fn binding_name(service: &str, method: &SoapReflectedMethod) -> String {
    method
        .binding
        .as_ref()
        .map(|b| b.name.clone())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("{}Soap", service))
}

fn binding_prefix(version: SoapVersion) -> &'static str {
    match version {
        SoapVersion::Soap11 => "soap",
        SoapVersion::Soap12 => "soap12",
    }
}

/// Produit le WSDL ; les schémas remplis au passage servent aussi
/// `?schema=`.
pub fn generate(server_type: &SoapServerType, base_url: &str) -> (Element, SchemaSet) {
    let descriptor = server_type.descriptor();
    let tns = descriptor.namespace();
    let service = descriptor.name();
    let protocols = server_type.protocols();
    let methods = server_type.service().methods();

    let mut schemas = SchemaSet::new(tns);
    let mut messages: Vec<Element> = Vec::new();
    let mut header_messages: Vec<String> = Vec::new();

    for m in methods {
        messages.push(soap_message(&mut schemas, tns, &format!("{}SoapIn", m.name), &m.request_mapping));
        if let Some(response) = m.response_mapping.as_ref().filter(|_| !m.one_way) {
            messages.push(soap_message(&mut schemas, tns, &format!("{}SoapOut", m.name), response));
        }
        for h in m.headers.iter() {
            let Some(element) = h.header_type.element_name() else { continue };
            if header_messages.contains(&element.name) {
                continue;
            }
            let HeaderType::Custom(st) = &h.header_type else { continue };
            let ty = SchemaType::Struct(st.clone());
            schemas.add_element(&element.namespace, &element.namespace, &element.name, &ty);
            let mut message = named("message", &element.name);
            let mut part = named("part", &element.name);
            xml::set_attr(&mut part, "element", &schemas.wsdl_name(&element.namespace, &element.name));
            xml::push_child(&mut message, part);
            messages.push(message);
            header_messages.push(element.name.clone());
        }
    }

    // Port types et liaisons SOAP, groupés par nom de liaison
    let mut binding_names: Vec<String> = Vec::new();
    for m in methods {
        let name = binding_name(service, m);
        if !binding_names.contains(&name) {
            binding_names.push(name);
        }
    }

    let mut port_types = Vec::new();
    let mut bindings = Vec::new();
    let mut ports = Vec::new();
    for name in &binding_names {
        let group: Vec<&SoapReflectedMethod> = methods
            .iter()
            .map(|m| m.as_ref())
            .filter(|m| &binding_name(service, m) == name)
            .collect();

        let mut port_type = named("portType", name);
        for m in &group {
            let mut op = named("operation", m.method.name());
            if let Some(doc) = documentation(&m.description) {
                xml::push_child(&mut op, doc);
            }
            let mut input = Element::new(&wsdl("input"));
            if m.name != m.method.name() {
                xml::set_attr(&mut input, "name", &m.name);
            }
            xml::set_attr(&mut input, "message", &format!("tns:{}SoapIn", m.name));
            xml::push_child(&mut op, input);
            if !m.one_way {
                let mut output = Element::new(&wsdl("output"));
                if m.name != m.method.name() {
                    xml::set_attr(&mut output, "name", &format!("{}Response", m.name));
                }
                xml::set_attr(&mut output, "message", &format!("tns:{}SoapOut", m.name));
                xml::push_child(&mut op, output);
            }
            xml::push_child(&mut port_type, op);
        }
        port_types.push(port_type);

        for version in protocols.soap_versions() {
            let binding_ref = match version {
                SoapVersion::Soap11 => name.clone(),
                SoapVersion::Soap12 => format!("{}12", name),
            };
            bindings.push(soap_binding(version, &binding_ref, name, &group));
            let mut port = named("port", &binding_ref);
            xml::set_attr(&mut port, "binding", &format!("tns:{}", binding_ref));
            let mut address = Element::new(&format!("{}:address", binding_prefix(version)));
            xml::set_attr(&mut address, "location", base_url);
            xml::push_child(&mut port, address);
            ports.push(port);
        }
    }

    // Liaisons HTTP GET/POST
    let http_methods: Vec<_> = descriptor
        .methods()
        .iter()
        .filter(|m| is_http_eligible(m))
        .collect();
    for (verb, protocol) in [("Get", Protocols::HTTP_GET), ("Post", Protocols::HTTP_POST)] {
        if !protocols.contains(protocol) || http_methods.is_empty() {
            continue;
        }
        let port_name = format!("{}Http{}", service, verb);
        let mut port_type = named("portType", &port_name);
        let mut binding = named("binding", &port_name);
        xml::set_attr(&mut binding, "type", &format!("tns:{}", port_name));
        let mut http_binding = Element::new("http:binding");
        xml::set_attr(&mut http_binding, "verb", &verb.to_uppercase());
        xml::push_child(&mut binding, http_binding);

        for m in &http_methods {
            let op_name = message_name(m);
            let in_name = format!("{}Http{}In", op_name, verb);
            let out_name = format!("{}Http{}Out", op_name, verb);

            let mut in_message = named("message", &in_name);
            for p in m.in_parameters() {
                // Les valeurs passent en texte
                let text_type = if p.ty.is_array() {
                    SchemaType::Array(Box::new(SchemaType::String))
                } else {
                    SchemaType::String
                };
                let mut part = named("part", &p.name);
                xml::set_attr(&mut part, "type", &schemas.type_ref(tns, tns, &text_type));
                xml::push_child(&mut in_message, part);
            }
            messages.push(in_message);
            let mut out_message = named("message", &out_name);
            if let Some(ret) = m.return_type() {
                let root = ret.type_name();
                schemas.add_element(tns, tns, &root, ret);
                let mut part = named("part", "Body");
                xml::set_attr(&mut part, "element", &schemas.wsdl_name(tns, &root));
                xml::push_child(&mut out_message, part);
            }
            messages.push(out_message);

            let mut op = named("operation", &op_name);
            let mut input = Element::new(&wsdl("input"));
            xml::set_attr(&mut input, "message", &format!("tns:{}", in_name));
            let mut output = Element::new(&wsdl("output"));
            xml::set_attr(&mut output, "message", &format!("tns:{}", out_name));
            xml::push_child(&mut op, input);
            xml::push_child(&mut op, output);
            xml::push_child(&mut port_type, op);

            let mut bop = named("operation", &op_name);
            let mut http_op = Element::new("http:operation");
            xml::set_attr(&mut http_op, "location", &format!("/{}", op_name));
            xml::push_child(&mut bop, http_op);
            let mut input = Element::new(&wsdl("input"));
            if verb == "Get" {
                xml::push_child(&mut input, Element::new("http:urlEncoded"));
            } else {
                let mut content = Element::new("mime:content");
                xml::set_attr(&mut content, "type", crate::content_type::APPLICATION_FORM_URLENCODED);
                xml::push_child(&mut input, content);
            }
            let mut output = Element::new(&wsdl("output"));
            if m.return_type().is_some() {
                let mut mime = Element::new("mime:mimeXml");
                xml::set_attr(&mut mime, "part", "Body");
                xml::push_child(&mut output, mime);
            }
            xml::push_child(&mut bop, input);
            xml::push_child(&mut bop, output);
            xml::push_child(&mut binding, bop);
        }
        port_types.push(port_type);
        bindings.push(binding);

        let mut port = named("port", &port_name);
        xml::set_attr(&mut port, "binding", &format!("tns:{}", port_name));
        let mut address = Element::new("http:address");
        xml::set_attr(&mut address, "location", base_url);
        xml::push_child(&mut port, address);
        ports.push(port);
    }

    // Assemblage
    let mut definitions = Element::new(&wsdl("definitions"));
    xml::set_attr(&mut definitions, "xmlns:wsdl", ns::WSDL);
    xml::set_attr(&mut definitions, "xmlns:soap", ns::WSDL_SOAP);
    xml::set_attr(&mut definitions, "xmlns:soap12", ns::WSDL_SOAP12);
    xml::set_attr(&mut definitions, "xmlns:http", ns::WSDL_HTTP);
    xml::set_attr(&mut definitions, "xmlns:mime", ns::WSDL_MIME);
    xml::set_attr(&mut definitions, "xmlns:soapenc", ns::SOAP11_ENCODING);
    xml::set_attr(&mut definitions, "xmlns:s", ns::XSD);
    xml::set_attr(&mut definitions, "xmlns:tns", tns);
    for (prefix, namespace) in schemas.foreign_prefixes() {
        xml::set_attr(&mut definitions, &format!("xmlns:{}", prefix), &namespace);
    }
    xml::set_attr(&mut definitions, "targetNamespace", tns);

    if let Some(doc) = documentation(descriptor.description()) {
        xml::push_child(&mut definitions, doc);
    }
    let mut types = Element::new(&wsdl("types"));
    for (_, schema) in schemas.render(base_url) {
        xml::push_child(&mut types, schema);
    }
    xml::push_child(&mut definitions, types);
    for e in messages.into_iter().chain(port_types).chain(bindings) {
        xml::push_child(&mut definitions, e);
    }
    let mut service_element = named("service", service);
    if let Some(doc) = documentation(descriptor.description()) {
        xml::push_child(&mut service_element, doc);
    }
    for port in ports {
        xml::push_child(&mut service_element, port);
    }
    xml::push_child(&mut definitions, service_element);

    (definitions, schemas)
}

/// Message SOAP : un part `parameters` (wrapped), un part par membre
/// (bare ou RPC).
fn soap_message(schemas: &mut SchemaSet, tns: &str, name: &str, mapping: &MembersMapping) -> Element {
    let element_ns = mapping.element.namespace.as_str();
    let types_ns = if mapping.encoded {
        mapping.types_namespace.as_str()
    } else {
        tns
    };
    let mut message = named("message", name);

    if mapping.rpc || (mapping.encoded && mapping.has_wrapper) {
        for member in &mapping.members {
            let mut part = named("part", &member.name);
            let type_ref = schemas.type_ref(tns, types_ns, &member.ty);
            xml::set_attr(&mut part, "type", &type_ref);
            xml::push_child(&mut message, part);
        }
    } else if mapping.has_wrapper {
        schemas.add_wrapper_element(element_ns, types_ns, &mapping.element.name, &mapping.members);
        let mut part = named("part", "parameters");
        xml::set_attr(&mut part, "element", &schemas.wsdl_name(element_ns, &mapping.element.name));
        xml::push_child(&mut message, part);
    } else {
        for member in &mapping.members {
            schemas.add_element(element_ns, types_ns, &member.name, &member.ty);
            let mut part = named("part", &member.name);
            xml::set_attr(&mut part, "element", &schemas.wsdl_name(element_ns, &member.name));
            xml::push_child(&mut message, part);
        }
    }
    message
}

fn soap_binding(
    version: SoapVersion,
    name: &str,
    port_type: &str,
    methods: &[&SoapReflectedMethod],
) -> Element {
    let prefix = binding_prefix(version);
    let mut binding = named("binding", name);
    xml::set_attr(&mut binding, "type", &format!("tns:{}", port_type));
    let mut soap_binding = Element::new(&format!("{}:binding", prefix));
    xml::set_attr(&mut soap_binding, "transport", HTTP_TRANSPORT);
    xml::push_child(&mut binding, soap_binding);

    for m in methods {
        let mut op = named("operation", m.method.name());
        let mut soap_op = Element::new(&format!("{}:operation", prefix));
        xml::set_attr(&mut soap_op, "soapAction", &m.action);
        xml::set_attr(&mut soap_op, "style", if m.rpc { "rpc" } else { "document" });
        xml::push_child(&mut op, soap_op);

        let mut input = Element::new(&wsdl("input"));
        if m.name != m.method.name() {
            xml::set_attr(&mut input, "name", &m.name);
        }
        xml::push_child(&mut input, soap_body(version, m, &m.request_mapping));
        for header in header_refs(prefix, m, SoapHeaderDirection::IN) {
            xml::push_child(&mut input, header);
        }
        xml::push_child(&mut op, input);

        if let Some(response) = m.response_mapping.as_ref().filter(|_| !m.one_way) {
            let mut output = Element::new(&wsdl("output"));
            if m.name != m.method.name() {
                xml::set_attr(&mut output, "name", &format!("{}Response", m.name));
            }
            xml::push_child(&mut output, soap_body(version, m, response));
            for header in header_refs(prefix, m, SoapHeaderDirection::OUT) {
                xml::push_child(&mut output, header);
            }
            xml::push_child(&mut op, output);
        }
        xml::push_child(&mut binding, op);
    }
    binding
}

fn soap_body(version: SoapVersion, method: &SoapReflectedMethod, mapping: &MembersMapping) -> Element {
    let mut body = Element::new(&format!("{}:body", binding_prefix(version)));
    let encoded = method.is_encoded();
    xml::set_attr(&mut body, "use", if encoded { "encoded" } else { "literal" });
    if method.rpc || encoded {
        xml::set_attr(&mut body, "namespace", &mapping.element.namespace);
    }
    if encoded {
        xml::set_attr(&mut body, "encodingStyle", version.encoding_ns());
    }
    body
}

fn header_refs(prefix: &str, method: &SoapReflectedMethod, direction: SoapHeaderDirection) -> Vec<Element> {
    method
        .headers
        .iter()
        .filter(|h| h.direction.overlaps(direction))
        .filter_map(|h| h.header_type.element_name())
        .map(|element| {
            let mut header = Element::new(&format!("{}:header", prefix));
            xml::set_attr(&mut header, "message", &format!("tns:{}", element.name));
            xml::set_attr(&mut header, "part", &element.name);
            xml::set_attr(
                &mut header,
                "use",
                if method.is_encoded() { "encoded" } else { "literal" },
            );
            header
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::MethodDecl;
    use crate::operation_handler;
    use crate::reflection::ServiceBuilder;
    use crate::values::Value;

    fn calculator(protocols: Protocols) -> SoapServerType {
        let service = ServiceBuilder::new("Calculator")
            .description("Integer arithmetic")
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
        SoapServerType::new(service, protocols).unwrap()
    }

    #[test]
    fn test_wsdl_shape() {
        let (wsdl, schemas) = generate(&calculator(Protocols::ALL), "http://h:8080/calc");
        let text = xml::to_string(&wsdl).unwrap();
        assert!(text.contains(r#"soapAction="http://tempuri.org/Add""#));
        assert!(text.contains(r#"name="CalculatorSoap12""#));
        assert!(text.contains(r#"name="CalculatorHttpGet""#));
        assert!(text.contains(r#"location="http://h:8080/calc""#));
        assert!(text.contains(r#"element="tns:AddResponse""#));
        assert!(text.contains("Integer arithmetic"));
        assert_eq!(schemas.schema_id("http://tempuri.org/").as_deref(), Some("schema1"));
    }

    #[test]
    fn test_wsdl_only_enabled_versions() {
        let (wsdl, _) = generate(&calculator(Protocols::HTTP_SOAP), "http://h/calc");
        let text = xml::to_string(&wsdl).unwrap();
        assert!(text.contains(r#"name="CalculatorSoap""#));
        assert!(!text.contains("CalculatorSoap12"));
        assert!(!text.contains("HttpGet"));
    }
}
