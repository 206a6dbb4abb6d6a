//! Codes de faute standards et traduction entre versions.

use crate::soap::ns;
use crate::xml::QName;

pub const SERVER: &str = "Server";
pub const CLIENT: &str = "Client";
pub const RECEIVER: &str = "Receiver";
pub const SENDER: &str = "Sender";
pub const MUST_UNDERSTAND: &str = "MustUnderstand";
pub const VERSION_MISMATCH: &str = "VersionMismatch";
pub const DATA_ENCODING_UNKNOWN: &str = "DataEncodingUnknown";

/// Sous-codes utilisés par le serveur
pub const UNSUPPORTED_MEDIA_TYPE: &str = "UnsupportedMediaType";
pub const BAD_ARGUMENTS: &str = "BadArguments";
pub const PROCEDURE_NOT_PRESENT: &str = "ProcedureNotPresent";

pub fn server() -> QName {
    QName::new(ns::SOAP11_ENVELOPE, SERVER)
}

pub fn client() -> QName {
    QName::new(ns::SOAP11_ENVELOPE, CLIENT)
}

pub fn must_understand() -> QName {
    QName::new(ns::SOAP11_ENVELOPE, MUST_UNDERSTAND)
}

pub fn version_mismatch() -> QName {
    QName::new(ns::SOAP11_ENVELOPE, VERSION_MISMATCH)
}

pub fn receiver() -> QName {
    QName::new(ns::SOAP12_ENVELOPE, RECEIVER)
}

pub fn sender() -> QName {
    QName::new(ns::SOAP12_ENVELOPE, SENDER)
}

pub fn must_understand12() -> QName {
    QName::new(ns::SOAP12_ENVELOPE, MUST_UNDERSTAND)
}

pub fn version_mismatch12() -> QName {
    QName::new(ns::SOAP12_ENVELOPE, VERSION_MISMATCH)
}

pub fn data_encoding_unknown12() -> QName {
    QName::new(ns::SOAP12_ENVELOPE, DATA_ENCODING_UNKNOWN)
}

/// `rpc:BadArguments` (SOAP 1.2)
pub fn bad_arguments() -> QName {
    QName::new(ns::SOAP12_RPC, BAD_ARGUMENTS)
}

/// Sous-code `UnsupportedMediaType` dans le namespace de l'enveloppe 1.2
pub fn unsupported_media_type() -> QName {
    QName::new(ns::SOAP12_ENVELOPE, UNSUPPORTED_MEDIA_TYPE)
}

fn is_soap_code(code: &QName, local: &str) -> bool {
    code.name == local
        && (code.namespace == ns::SOAP11_ENVELOPE || code.namespace == ns::SOAP12_ENVELOPE)
}

pub fn is_server_fault_code(code: &QName) -> bool {
    code == &server() || code == &receiver()
}

pub fn is_client_fault_code(code: &QName) -> bool {
    code == &client() || code == &sender()
}

pub fn is_must_understand_fault_code(code: &QName) -> bool {
    is_soap_code(code, MUST_UNDERSTAND)
}

pub fn is_version_mismatch_fault_code(code: &QName) -> bool {
    is_soap_code(code, VERSION_MISMATCH)
}

/// Traduit un code vers sa forme SOAP 1.2.
pub fn to_soap12(code: &QName) -> QName {
    if code.namespace != ns::SOAP11_ENVELOPE {
        return code.clone();
    }
    match code.name.as_str() {
        SERVER => receiver(),
        CLIENT => sender(),
        MUST_UNDERSTAND => must_understand12(),
        VERSION_MISMATCH => version_mismatch12(),
        _ => code.clone(),
    }
}

/// Traduit un code vers sa forme SOAP 1.1.
pub fn to_soap11(code: &QName) -> QName {
    if code.namespace != ns::SOAP12_ENVELOPE {
        return code.clone();
    }
    match code.name.as_str() {
        RECEIVER => server(),
        SENDER | DATA_ENCODING_UNKNOWN => client(),
        MUST_UNDERSTAND => must_understand(),
        VERSION_MISMATCH => version_mismatch(),
        _ => code.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_standard_codes() {
        for code in [server(), client(), must_understand(), version_mismatch()] {
            let up = to_soap12(&code);
            assert_eq!(up.namespace, ns::SOAP12_ENVELOPE);
            assert_eq!(to_soap11(&up), code);
        }
    }

    #[test]
    fn test_custom_codes_untouched() {
        let custom = QName::new("urn:app", "Quota");
        assert_eq!(to_soap12(&custom), custom);
        assert_eq!(to_soap11(&custom), custom);
    }

    #[test]
    fn test_predicates_accept_both_versions() {
        assert!(is_server_fault_code(&server()));
        assert!(is_server_fault_code(&receiver()));
        assert!(is_client_fault_code(&sender()));
        assert!(is_must_understand_fault_code(&must_understand12()));
        assert!(is_version_mismatch_fault_code(&version_mismatch()));
        assert!(!is_server_fault_code(&QName::new("urn:x", SERVER)));
    }
}
