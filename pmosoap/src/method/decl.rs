//! Déclarations de méthodes fournies à l'enregistrement.

use crate::attributes::{
    MethodAttributes, SoapExtensionAttribute, SoapHeaderAttribute, SoapMethodAttribute,
    WebMethodAttribute,
};
use crate::values::SchemaType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterDirection {
    In,
    Out,
    /// Entrée et sortie
    Ref,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDecl {
    pub name: String,
    pub ty: SchemaType,
    pub direction: ParameterDirection,
}

impl ParameterDecl {
    pub fn is_in(&self) -> bool {
        self.direction != ParameterDirection::Out
    }

    pub fn is_out(&self) -> bool {
        self.direction != ParameterDirection::In
    }
}

/// Signature déclarée d'une méthode candidate.
#[derive(Debug, Clone, Default)]
pub struct MethodDecl {
    pub name: String,
    pub declaring_type: String,
    pub is_static: bool,
    pub parameters: Vec<ParameterDecl>,
    /// `None` pour une méthode sans retour
    pub return_type: Option<SchemaType>,
    pub attributes: MethodAttributes,
    /// Attributs du contrat implémenté, s'il y en a un
    pub contract: Option<MethodAttributes>,
}

impl MethodDecl {
    pub fn new(declaring_type: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            declaring_type: declaring_type.to_string(),
            ..Default::default()
        }
    }

    pub fn param(self, name: &str, ty: SchemaType) -> Self {
        self.with_parameter(name, ty, ParameterDirection::In)
    }

    pub fn out_param(self, name: &str, ty: SchemaType) -> Self {
        self.with_parameter(name, ty, ParameterDirection::Out)
    }

    pub fn ref_param(self, name: &str, ty: SchemaType) -> Self {
        self.with_parameter(name, ty, ParameterDirection::Ref)
    }

    fn with_parameter(mut self, name: &str, ty: SchemaType, direction: ParameterDirection) -> Self {
        self.parameters.push(ParameterDecl {
            name: name.to_string(),
            ty,
            direction,
        });
        self
    }

    pub fn returns(mut self, ty: SchemaType) -> Self {
        self.return_type = Some(ty);
        self
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn web_method(mut self, attr: WebMethodAttribute) -> Self {
        self.attributes.web_method = Some(attr);
        self
    }

    pub fn soap(mut self, attr: SoapMethodAttribute) -> Self {
        self.attributes.soap = Some(attr);
        self
    }

    pub fn header(mut self, attr: SoapHeaderAttribute) -> Self {
        self.attributes.headers.push(attr);
        self
    }

    pub fn extension(mut self, attr: SoapExtensionAttribute) -> Self {
        self.attributes.extensions.push(attr);
        self
    }

    pub fn implementing(mut self, contract: MethodAttributes) -> Self {
        self.contract = Some(contract);
        self
    }

    /// Signature affichable : `int Add(int, int)`.
    pub fn signature(&self) -> String {
        let ret = self
            .return_type
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "void".to_string());
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| match p.direction {
                ParameterDirection::In => p.ty.to_string(),
                _ => format!("{}&", p.ty),
            })
            .collect();
        format!("{} {}({})", ret, self.name, params.join(", "))
    }

    /// `BeginX` : renvoie la poignée asynchrone.
    pub fn is_begin_method(&self) -> bool {
        self.name.len() > 5
            && self.name.starts_with("Begin")
            && self.return_type == Some(SchemaType::AsyncResult)
    }

    /// `EndX` : reçoit la poignée asynchrone en premier.
    pub fn is_end_method(&self) -> bool {
        self.name.len() > 3
            && self.name.starts_with("End")
            && self
                .parameters
                .first()
                .is_some_and(|p| p.ty == SchemaType::AsyncResult)
    }
}
