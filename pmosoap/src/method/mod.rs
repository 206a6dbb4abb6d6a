//! # Méthodes logiques
//!
//! Une [`LogicalMethod`] est la vue unique d'une opération, qu'elle soit
//! déclarée comme une méthode synchrone ou comme une paire `BeginX`/`EndX`.
//! Elle est construite une fois à l'enregistrement puis partagée en lecture.
//!
//! ## Fonctionnalités
//!
//! - ✅ Appariement `BeginX`/`EndX` (paire incomplète = erreur fatale)
//! - ✅ Paramètres d'entrée/sortie ordonnés, type de retour
//! - ✅ Fusion avec les attributs d'un contrat (en-têtes et extensions seulement)
//! - ✅ Clé stable `{type}:{signature}`, hachée au-delà de 1024 caractères

mod decl;

use base64::Engine;
use base64::engine::general_purpose;
use sha2::{Digest, Sha256};
use tracing::debug;

pub use decl::{MethodDecl, ParameterDecl, ParameterDirection};

use crate::attributes::MethodAttributes;
use crate::errors::ConfigError;
use crate::values::{SchemaType, Value};

const MAX_KEY_LENGTH: usize = 1024;

/// Sélection des formes de méthode à retenir.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalMethodTypes(u8);

impl LogicalMethodTypes {
    pub const SYNC: LogicalMethodTypes = LogicalMethodTypes(1);
    pub const ASYNC: LogicalMethodTypes = LogicalMethodTypes(2);
    pub const ALL: LogicalMethodTypes = LogicalMethodTypes(3);

    pub fn contains(&self, other: LogicalMethodTypes) -> bool {
        self.0 & other.0 != 0
    }
}

/// Vue logique d'une opération.
#[derive(Debug, Clone)]
pub struct LogicalMethod {
    name: String,
    declared_name: String,
    end_name: Option<String>,
    declaring_type: String,
    in_parameters: Vec<ParameterDecl>,
    out_parameters: Vec<ParameterDecl>,
    return_type: Option<SchemaType>,
    is_async: bool,
    attributes: MethodAttributes,
    signature: String,
    key: String,
}

impl LogicalMethod {
    /// Vue d'une méthode synchrone.
    pub fn from_sync(decl: &MethodDecl) -> Result<Self, ConfigError> {
        if decl.is_static {
            return Err(ConfigError::StaticMethod(decl.name.clone()));
        }
        let attributes = merge_contract(&decl.name, decl.contract.as_ref(), &decl.attributes)?;
        let signature = decl.signature();
        Ok(Self {
            name: decl.name.clone(),
            declared_name: decl.name.clone(),
            end_name: None,
            declaring_type: decl.declaring_type.clone(),
            in_parameters: decl.parameters.iter().filter(|p| p.is_in()).cloned().collect(),
            out_parameters: decl.parameters.iter().filter(|p| p.is_out()).cloned().collect(),
            return_type: decl.return_type.clone(),
            is_async: false,
            attributes,
            key: method_key(&decl.declaring_type, &signature),
            signature,
        })
    }

    /// Vue d'une paire `BeginX`/`EndX`.
    pub fn from_pair(begin: &MethodDecl, end: &MethodDecl) -> Result<Self, ConfigError> {
        if begin.is_static || end.is_static {
            return Err(ConfigError::StaticMethod(begin.name.clone()));
        }
        let n = begin.parameters.len();
        if n < 2
            || begin.parameters[n - 2].ty != SchemaType::AsyncCallback
            || begin.parameters[n - 1].ty != SchemaType::Object
        {
            return Err(ConfigError::BadBeginSignature(begin.name.clone()));
        }

        let attributes =
            merge_contract(&begin.name, begin.contract.as_ref(), &begin.attributes)?;
        let signature = begin.signature();
        Ok(Self {
            name: begin.name["Begin".len()..].to_string(),
            declared_name: begin.name.clone(),
            end_name: Some(end.name.clone()),
            declaring_type: begin.declaring_type.clone(),
            in_parameters: begin.parameters[..n - 2]
                .iter()
                .filter(|p| p.is_in())
                .cloned()
                .collect(),
            out_parameters: end.parameters[1..]
                .iter()
                .filter(|p| p.is_out())
                .cloned()
                .collect(),
            return_type: end.return_type.clone(),
            is_async: true,
            attributes,
            key: method_key(&begin.declaring_type, &signature),
            signature,
        })
    }

    /// Partitionne les déclarations en méthodes synchrones et paires
    /// asynchrones, selon `types`.
    pub fn create(
        decls: &[MethodDecl],
        types: LogicalMethodTypes,
    ) -> Result<Vec<LogicalMethod>, ConfigError> {
        let mut methods = Vec::new();

        if types.contains(LogicalMethodTypes::ASYNC) {
            for begin in decls.iter().filter(|d| d.is_begin_method()) {
                let end_name = format!("End{}", &begin.name["Begin".len()..]);
                let end = decls
                    .iter()
                    .find(|d| d.name == end_name && d.is_end_method())
                    .ok_or_else(|| ConfigError::MissingEnd {
                        begin: begin.name.clone(),
                        end: end_name.clone(),
                    })?;
                debug!("🔗 Paire asynchrone {} / {}", begin.name, end.name);
                methods.push(LogicalMethod::from_pair(begin, end)?);
            }
        }

        if types.contains(LogicalMethodTypes::SYNC) {
            for decl in decls
                .iter()
                .filter(|d| !d.is_begin_method() && !d.is_end_method())
            {
                methods.push(LogicalMethod::from_sync(decl)?);
            }
        }

        Ok(methods)
    }

    /// Nom logique (sans le préfixe `Begin` pour une paire).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nom déclaré (`BeginX` pour une paire).
    pub fn declared_name(&self) -> &str {
        &self.declared_name
    }

    pub fn end_name(&self) -> Option<&str> {
        self.end_name.as_deref()
    }

    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    pub fn in_parameters(&self) -> &[ParameterDecl] {
        &self.in_parameters
    }

    pub fn out_parameters(&self) -> &[ParameterDecl] {
        &self.out_parameters
    }

    pub fn return_type(&self) -> Option<&SchemaType> {
        self.return_type.as_ref()
    }

    pub fn is_void(&self) -> bool {
        self.return_type.is_none()
    }

    pub fn is_async(&self) -> bool {
        self.is_async
    }

    pub fn attributes(&self) -> &MethodAttributes {
        &self.attributes
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Clé stable, identique d'une résolution à l'autre.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Nombre de valeurs renvoyées : retour éventuel puis sorties.
    pub fn out_value_count(&self) -> usize {
        self.out_parameters.len() + usize::from(!self.is_void())
    }

    /// Valeur de retour dans un tableau `[retour, sorties…]`.
    pub fn return_value<'a>(&self, out_values: &'a [Value]) -> Option<&'a Value> {
        if self.is_void() {
            None
        } else {
            out_values.first()
        }
    }

    /// Valeurs des paramètres de sortie dans un tableau `[retour, sorties…]`.
    pub fn out_parameter_values<'a>(&self, out_values: &'a [Value]) -> &'a [Value] {
        let offset = usize::from(!self.is_void()).min(out_values.len());
        &out_values[offset..]
    }
}

/// Clé `{type}:{signature}`, remplacée par son empreinte au-delà de 1024
/// caractères.
pub fn method_key(declaring_type: &str, signature: &str) -> String {
    let key = format!("{}:{}", declaring_type, signature);
    if key.len() > MAX_KEY_LENGTH {
        let digest = Sha256::digest(key.as_bytes());
        general_purpose::STANDARD.encode(digest)
    } else {
        key
    }
}

/// Fusionne les attributs d'un contrat et ceux de la méthode.
///
/// Seuls les en-têtes et les extensions peuvent être complétés par la
/// méthode ; toute autre donnée portée à la fois par un contrat et par
/// la méthode est refusée.
pub fn merge_contract(
    method: &str,
    contract: Option<&MethodAttributes>,
    own: &MethodAttributes,
) -> Result<MethodAttributes, ConfigError> {
    let Some(contract) = contract else {
        return Ok(own.clone());
    };

    if own.web_method.is_some() {
        return Err(ConfigError::ContractOverride {
            method: method.to_string(),
            attribute: "WebMethod".to_string(),
        });
    }
    if own.soap.is_some() {
        return Err(ConfigError::ContractOverride {
            method: method.to_string(),
            attribute: "SoapMethod".to_string(),
        });
    }

    let mut merged = contract.clone();
    merged.headers.extend(own.headers.iter().cloned());
    merged.extensions.extend(own.extensions.iter().cloned());
    Ok(merged)
}
