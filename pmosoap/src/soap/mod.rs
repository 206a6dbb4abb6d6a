//! # Module SOAP - enveloppes et versions
//!
//! Ce module regroupe ce qui dépend directement de la version SOAP :
//! namespaces, types de contenu, lecture de l'enveloppe et écriture
//! de l'enveloppe de réponse ou de requête.
//!
//! ## Fonctionnalités
//!
//! - ✅ SOAP 1.1 (`text/xml` + en-tête `SOAPAction`)
//! - ✅ SOAP 1.2 (`application/soap+xml; action="…"`)
//! - ✅ Parsing d'enveloppes avec contrôle du namespace
//! - ✅ Lecture anticipée du premier élément du corps (routage)
//! - ✅ Construction d'enveloppes (préfixes `soap`, `soapenc`, `tns`, `types`)

mod envelope;
mod writer;

use std::fmt;
use std::str::FromStr;

pub use envelope::{
    EnvelopeError, ParsedEnvelope, peek_body_element, peek_envelope_namespace, read_envelope,
};
pub use writer::{EnvelopeOptions, SOAP_PREFIX, soap_name, write_envelope};

use crate::content_type;

/// Namespaces utilisés sur le fil.
pub mod ns {
    pub const SOAP11_ENVELOPE: &str = "http://schemas.xmlsoap.org/soap/envelope/";
    pub const SOAP11_ENCODING: &str = "http://schemas.xmlsoap.org/soap/encoding/";
    pub const SOAP12_ENVELOPE: &str = "http://www.w3.org/2003/05/soap-envelope";
    pub const SOAP12_ENCODING: &str = "http://www.w3.org/2003/05/soap-encoding";
    pub const SOAP12_RPC: &str = "http://www.w3.org/2003/05/soap-rpc";
    pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
    pub const XSD: &str = "http://www.w3.org/2001/XMLSchema";
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const WSDL: &str = "http://schemas.xmlsoap.org/wsdl/";
    pub const WSDL_SOAP: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
    pub const WSDL_SOAP12: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";
    pub const WSDL_HTTP: &str = "http://schemas.xmlsoap.org/wsdl/http/";
    pub const WSDL_MIME: &str = "http://schemas.xmlsoap.org/wsdl/mime/";
    pub const DISCO: &str = "http://schemas.xmlsoap.org/disco/";
    pub const DISCO_SCL: &str = "http://schemas.xmlsoap.org/disco/scl/";
    pub const DISCO_SOAP: &str = "http://schemas.xmlsoap.org/disco/soap/";
    pub const WSI_BP11: &str = "http://ws-i.org/profiles/basic/1.1";
}

/// Nom de l'en-tête HTTP portant l'action SOAP 1.1.
pub const SOAP_ACTION_HEADER: &str = "SOAPAction";

/// Version du protocole SOAP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoapVersion {
    Soap11,
    Soap12,
}

impl SoapVersion {
    pub fn envelope_ns(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => ns::SOAP11_ENVELOPE,
            SoapVersion::Soap12 => ns::SOAP12_ENVELOPE,
        }
    }

    pub fn encoding_ns(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => ns::SOAP11_ENCODING,
            SoapVersion::Soap12 => ns::SOAP12_ENCODING,
        }
    }

    /// Type de contenu de base d'un message de cette version.
    pub fn content_type(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => content_type::TEXT_XML,
            SoapVersion::Soap12 => content_type::APPLICATION_SOAP,
        }
    }

    /// Version correspondant à un namespace d'enveloppe.
    pub fn from_envelope_ns(namespace: &str) -> Option<SoapVersion> {
        match namespace {
            ns::SOAP11_ENVELOPE => Some(SoapVersion::Soap11),
            ns::SOAP12_ENVELOPE => Some(SoapVersion::Soap12),
            _ => None,
        }
    }

    pub fn protocol(&self) -> Protocols {
        match self {
            SoapVersion::Soap11 => Protocols::HTTP_SOAP,
            SoapVersion::Soap12 => Protocols::HTTP_SOAP12,
        }
    }
}

impl fmt::Display for SoapVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoapVersion::Soap11 => write!(f, "SOAP 1.1"),
            SoapVersion::Soap12 => write!(f, "SOAP 1.2"),
        }
    }
}

/// Ensemble des protocoles activés sur un point d'accès.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Protocols(u8);

impl Protocols {
    pub const NONE: Protocols = Protocols(0);
    pub const HTTP_SOAP: Protocols = Protocols(1);
    pub const HTTP_SOAP12: Protocols = Protocols(2);
    pub const HTTP_GET: Protocols = Protocols(4);
    pub const HTTP_POST: Protocols = Protocols(8);
    pub const DOCUMENTATION: Protocols = Protocols(16);
    pub const ANY_HTTP_SOAP: Protocols = Protocols(3);
    pub const ALL: Protocols = Protocols(31);

    pub fn contains(&self, other: Protocols) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn intersects(&self, other: Protocols) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn supports(&self, version: SoapVersion) -> bool {
        self.contains(version.protocol())
    }

    /// Versions SOAP activées, 1.1 d'abord.
    pub fn soap_versions(&self) -> Vec<SoapVersion> {
        [SoapVersion::Soap11, SoapVersion::Soap12]
            .into_iter()
            .filter(|v| self.supports(*v))
            .collect()
    }

    /// Construit l'ensemble à partir des noms de configuration
    /// (`HttpSoap`, `HttpSoap12`, `HttpGet`, `HttpPost`, `Documentation`).
    pub fn from_names<I, S>(names: I) -> Result<Protocols, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .try_fold(Protocols::NONE, |acc, name| Ok(acc | name.as_ref().parse()?))
    }

    pub fn names(&self) -> Vec<&'static str> {
        [
            (Protocols::HTTP_SOAP, "HttpSoap"),
            (Protocols::HTTP_SOAP12, "HttpSoap12"),
            (Protocols::HTTP_GET, "HttpGet"),
            (Protocols::HTTP_POST, "HttpPost"),
            (Protocols::DOCUMENTATION, "Documentation"),
        ]
        .into_iter()
        .filter(|(p, _)| self.contains(*p))
        .map(|(_, n)| n)
        .collect()
    }
}

impl std::ops::BitOr for Protocols {
    type Output = Protocols;

    fn bitor(self, rhs: Protocols) -> Protocols {
        Protocols(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Protocols {
    fn bitor_assign(&mut self, rhs: Protocols) {
        self.0 |= rhs.0;
    }
}

impl FromStr for Protocols {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "httpsoap" => Ok(Protocols::HTTP_SOAP),
            "httpsoap12" => Ok(Protocols::HTTP_SOAP12),
            "httpget" => Ok(Protocols::HTTP_GET),
            "httppost" => Ok(Protocols::HTTP_POST),
            "documentation" => Ok(Protocols::DOCUMENTATION),
            "anyhttpsoap" => Ok(Protocols::ANY_HTTP_SOAP),
            _ => Err(format!("Protocole inconnu: {}", s)),
        }
    }
}
