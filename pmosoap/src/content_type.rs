//! Manipulation des en-têtes `Content-Type` MIME.
//!
//! Les fonctions de ce module ne valident pas la grammaire RFC complète :
//! elles extraient le type de base, le `charset` et le paramètre `action`
//! (SOAP 1.2) d'une chaîne telle que reçue sur le fil, et composent les
//! chaînes envoyées par le client et le serveur.

pub const TEXT_BASE: &str = "text";
pub const TEXT_XML: &str = "text/xml";
pub const TEXT_PLAIN: &str = "text/plain";
pub const TEXT_HTML: &str = "text/html";
pub const APPLICATION_BASE: &str = "application";
pub const APPLICATION_XML: &str = "application/xml";
pub const APPLICATION_SOAP: &str = "application/soap+xml";
pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";
pub const APPLICATION_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Nom de l'en-tête HTTP portant l'encodage du corps.
pub const CONTENT_ENCODING: &str = "Content-Encoding";

/// Retourne le type de base (`type/subtype`) sans paramètres.
///
/// ```
/// use pmosoap::content_type;
/// assert_eq!(content_type::base("text/xml; charset=utf-8"), "text/xml");
/// ```
pub fn base(content_type: &str) -> &str {
    match content_type.find(';') {
        Some(idx) => content_type[..idx].trim(),
        None => content_type.trim(),
    }
}

/// Synonyme de [`base`].
pub fn media_type(content_type: &str) -> &str {
    base(content_type)
}

/// Valeur du paramètre `charset`, guillemets retirés.
pub fn charset(content_type: &str) -> Option<String> {
    parameter(content_type, "charset")
}

/// Valeur du paramètre `action` (SOAP 1.2).
pub fn action(content_type: &str) -> Option<String> {
    parameter(content_type, "action")
}

/// Recherche un paramètre par nom (insensible à la casse).
pub fn parameter(content_type: &str, name: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|part| {
        let (key, value) = part.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case(name) {
            return None;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        Some(value.to_string())
    })
}

/// Compose `base; charset=…`.
pub fn compose(content_type: &str, charset: &str) -> String {
    compose_with_action(content_type, charset, None)
}

/// Compose `base; charset=…; action="…"`.
///
/// L'action n'est ajoutée que si elle est fournie, elle est toujours
/// placée entre guillemets.
pub fn compose_with_action(content_type: &str, charset: &str, action: Option<&str>) -> String {
    let mut out = format!("{}; charset={}", base(content_type), charset);
    if let Some(action) = action {
        out.push_str("; action=\"");
        out.push_str(action);
        out.push('"');
    }
    out
}

/// Vrai si le type de base correspond, sans tenir compte de la casse.
pub fn matches_base(content_type: &str, base_type: &str) -> bool {
    base(content_type).eq_ignore_ascii_case(base_type)
}

pub fn is_application(content_type: &str) -> bool {
    base(content_type)
        .split('/')
        .next()
        .is_some_and(|t| t.eq_ignore_ascii_case(APPLICATION_BASE))
}

/// `text/xml` ou `application/soap+xml`.
pub fn is_soap(content_type: &str) -> bool {
    matches_base(content_type, TEXT_XML) || matches_base(content_type, APPLICATION_SOAP)
}

pub fn is_xml(content_type: &str) -> bool {
    matches_base(content_type, TEXT_XML) || matches_base(content_type, APPLICATION_XML)
}

pub fn is_html(content_type: &str) -> bool {
    matches_base(content_type, TEXT_HTML)
}
