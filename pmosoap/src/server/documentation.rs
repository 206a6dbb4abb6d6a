//! Page HTML de présentation d'un service (GET sans paramètre).

use std::fmt::Write;

use super::http_protocol::HttpServerType;
use super::server_type::SoapServerType;
use crate::soap::Protocols;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Liste des opérations, avec liens vers le WSDL et les appels GET.
pub fn render(server_type: &SoapServerType, http_type: &HttpServerType, base_url: &str) -> String {
    let descriptor = server_type.descriptor();
    let name = escape(descriptor.name());
    let protocols = server_type.protocols();

    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{name} Web Service</title></head><body>\n<h1>{name}</h1>\n"
    );
    if !descriptor.description().is_empty() {
        let _ = writeln!(html, "<p>{}</p>", escape(descriptor.description()));
    }
    let _ = writeln!(
        html,
        "<p>Namespace : <code>{}</code></p>",
        escape(descriptor.namespace())
    );
    let _ = writeln!(
        html,
        "<p><a href=\"{0}?wsdl\">Service Description</a> · <a href=\"{0}?disco\">Discovery</a></p>",
        escape(base_url)
    );

    html.push_str("<h2>Operations</h2>\n<ul>\n");
    for method in server_type.methods() {
        let reflected = &method.reflected;
        let _ = write!(html, "<li><b>{}</b>", escape(&reflected.name));
        if reflected.one_way {
            html.push_str(" <i>(one-way)</i>");
        }
        let _ = write!(html, " <code>{}</code>", escape(&reflected.action));
        if !reflected.description.is_empty() {
            let _ = write!(html, "<br>{}", escape(&reflected.description));
        }
        if protocols.contains(Protocols::HTTP_GET) && http_type.method(&reflected.name).is_some() {
            let params: Vec<String> = reflected
                .method
                .in_parameters()
                .iter()
                .map(|p| format!("{}=", escape(&p.name)))
                .collect();
            let _ = write!(
                html,
                "<br>GET <code>{}/{}?{}</code>",
                escape(base_url),
                escape(&reflected.name),
                params.join("&amp;")
            );
        }
        html.push_str("</li>\n");
    }
    html.push_str("</ul>\n</body></html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::WebMethodAttribute;
    use crate::method::MethodDecl;
    use crate::operation_handler;
    use crate::reflection::ServiceBuilder;
    use crate::values::SchemaType;

    #[test]
    fn test_listing() {
        let service = ServiceBuilder::new("Calc")
            .description("Adds <numbers>")
            .operation(
                MethodDecl::new("Calc", "Add")
                    .param("a", SchemaType::Int)
                    .returns(SchemaType::Int)
                    .web_method(WebMethodAttribute {
                        description: "Sum".into(),
                        ..Default::default()
                    }),
                operation_handler!(|instance, args| { Ok(vec![args.require("a")?.clone()]) }),
            )
            .build()
            .unwrap();
        let st = SoapServerType::new(service.clone(), Protocols::ALL).unwrap();
        let http = HttpServerType::new(service);
        let html = render(&st, &http, "http://h/calc");
        assert!(html.contains("<h1>Calc</h1>"));
        assert!(html.contains("Adds &lt;numbers&gt;"));
        assert!(html.contains("<b>Add</b>"));
        assert!(html.contains("Sum"));
        assert!(html.contains("http://h/calc?wsdl"));
        assert!(html.contains("GET <code>http://h/calc/Add?a=</code>"));
    }
}
