//! Document DISCO : référence au contrat et adresses SOAP.

use xmltree::Element;

use crate::server::SoapServerType;
use crate::soap::{SoapVersion, ns};
use crate::xml;

pub fn generate(server_type: &SoapServerType, base_url: &str) -> Element {
    let descriptor = server_type.descriptor();
    let mut discovery = Element::new("discovery");
    xml::set_attr(&mut discovery, "xmlns", ns::DISCO);

    let mut contract = Element::new("contractRef");
    xml::set_attr(&mut contract, "xmlns", ns::DISCO_SCL);
    xml::set_attr(&mut contract, "ref", &format!("{}?wsdl", base_url));
    xml::set_attr(&mut contract, "docRef", base_url);
    xml::push_child(&mut discovery, contract);

    for (i, version) in server_type.protocols().soap_versions().into_iter().enumerate() {
        let binding = match version {
            SoapVersion::Soap11 => format!("{}Soap", descriptor.name()),
            SoapVersion::Soap12 => format!("{}Soap12", descriptor.name()),
        };
        let prefix = format!("q{}", i + 1);
        let mut soap = Element::new("soap");
        xml::set_attr(&mut soap, "xmlns", ns::DISCO_SOAP);
        xml::set_attr(&mut soap, &format!("xmlns:{}", prefix), descriptor.namespace());
        xml::set_attr(&mut soap, "address", base_url);
        xml::set_attr(&mut soap, "binding", &format!("{}:{}", prefix, binding));
        xml::push_child(&mut discovery, soap);
    }
    discovery
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::MethodDecl;
    use crate::operation_handler;
    use crate::reflection::ServiceBuilder;
    use crate::soap::Protocols;

    #[test]
    fn test_disco_lists_contract_and_bindings() {
        let service = ServiceBuilder::new("Echo")
            .operation(
                MethodDecl::new("Echo", "Ping"),
                operation_handler!(|instance, args| { Ok(vec![]) }),
            )
            .build()
            .unwrap();
        let st = SoapServerType::new(service, Protocols::ALL).unwrap();
        let text = xml::to_string(&generate(&st, "http://h/echo")).unwrap();
        assert!(text.contains(r#"ref="http://h/echo?wsdl""#));
        assert!(text.contains("q1:EchoSoap"));
        assert!(text.contains("q2:EchoSoap12"));
    }
}
