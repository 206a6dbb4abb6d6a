//! Traitement d'une requête SOAP côté serveur.
//!
//! ```text
//! initialisation (version, extensions de haute priorité)
//!       ↓
//! routage (SOAPAction ou élément de requête)
//!       ↓                      ↘ sens unique : 202, suite en tâche de fond
//! lecture des paramètres
//!       ↓
//! invocation du handler
//!       ↓
//! écriture du retour  ──erreur──→  écriture de la faute
//! ```

use std::sync::Arc;

use axum::http::StatusCode;
use tracing::{debug, error, info, warn};

use super::ServerOptions;
use super::http::{SoapRequest, SoapResponse};
use super::server_type::{ServerRoute, SoapServerMethod, SoapServerType};
use super::version::{check_version, guess_version, request_action, upgrade_header};
use crate::attributes::{SoapHeaderDirection, SoapServiceRoutingStyle};
use crate::content_type;
use crate::extensions::{ExtensionChain, ExtensionGroup};
use crate::fault::{FaultCause, SoapException, SoapFaultSubCode, codes, write_fault};
use crate::handler::{OperationArgs, OperationError, ServiceInstance};
use crate::headers::{
    ensure_headers_understood, get_header_members, read_headers, set_header_members, write_headers,
};
use crate::mapping::{read_members, write_members};
use crate::message::{MessageSide, SoapMessage, SoapMessageStage};
use crate::soap::{
    EnvelopeError, EnvelopeOptions, SOAP_ACTION_HEADER, SoapVersion, peek_body_element,
    peek_envelope_namespace, read_envelope, write_envelope,
};
use crate::values::Value;
use crate::xml::QName;

/// Traite une requête SOAP de bout en bout.
pub async fn dispatch(
    server_type: Arc<SoapServerType>,
    options: Arc<ServerOptions>,
    request: SoapRequest,
) -> SoapResponse {
    let mut call = ServerCall::new(server_type, options, &request);

    let deferred = call.initialize().err();
    let method = match call.route() {
        Ok(method) => method,
        Err(e) => {
            let e = call.version_failure().unwrap_or(e);
            return call.write_exception(e);
        }
    };
    call.bind(&method);

    if let Some(e) = deferred {
        return call.write_exception(e);
    }

    if method.reflected.one_way {
        debug!("📨 {} en sens unique : 202", method.reflected.name);
        tokio::spawn(async move {
            if let Err(e) = call.run_one_way(&method).await {
                warn!("⚠️ Appel sens unique {} : {}", method.reflected.name, e);
            }
        });
        return SoapResponse::new(StatusCode::ACCEPTED);
    }

    let result = match call.read_parameters(&method) {
        Ok(()) => call.invoke(&method).await,
        Err(e) => Err(e),
    };
    match result.and_then(|values| call.write_returns(&method, values)) {
        Ok(response) => response,
        Err(e) => call.write_exception(e),
    }
}

/// État d'un appel serveur.
struct ServerCall {
    server_type: Arc<SoapServerType>,
    options: Arc<ServerOptions>,
    message: SoapMessage,
    chain: ExtensionChain,
    action: Option<String>,
    method: Option<Arc<SoapServerMethod>>,
    instance: Option<Arc<ServiceInstance>>,
}

impl ServerCall {
    fn new(server_type: Arc<SoapServerType>, options: Arc<ServerOptions>, request: &SoapRequest) -> Self {
        let soap_action = request.header(SOAP_ACTION_HEADER);
        let content_type = request.content_type();
        let version = guess_version(options.protocols, soap_action, content_type);
        let action = request_action(version, soap_action, content_type);

        let mut message = SoapMessage::new(MessageSide::Server, version, &request.url);
        message.action = action.clone().unwrap_or_default();
        message.content_type = content_type.to_string();
        message.content_encoding = request
            .header(content_type::CONTENT_ENCODING)
            .map(str::to_string);
        message.body = request.body.to_vec();
        for (name, value) in request.headers.iter() {
            if let Ok(value) = value.to_str() {
                message.http_headers.insert(name.as_str().to_string(), value.to_string());
            }
        }
        debug!(
            "📡 {} {} ({}, action {:?})",
            request.method, request.url, version, action
        );

        Self {
            server_type,
            options,
            message,
            chain: ExtensionChain::new(),
            action,
            method: None,
            instance: None,
        }
    }

    fn version(&self) -> SoapVersion {
        self.message.version
    }

    /// Extensions de haute priorité : filtres d'entrée et `BeforeDeserialize`.
    fn initialize(&mut self) -> Result<(), SoapException> {
        let high = self.server_type.high_extensions().to_vec();
        self.chain.add(ExtensionGroup::High, &high);
        let body = std::mem::take(&mut self.message.body);
        self.message.body = self.chain.filter_inbound(Some(ExtensionGroup::High), body)?;
        self.chain.run(
            Some(ExtensionGroup::High),
            SoapMessageStage::BeforeDeserialize,
            &mut self.message,
        )
    }

    fn route(&self) -> Result<Arc<SoapServerMethod>, SoapException> {
        let st = &self.server_type;
        match st.service().routing_style() {
            SoapServiceRoutingStyle::SoapAction => {
                if self.version() == SoapVersion::Soap11 && self.action.is_none() {
                    return Err(SoapException::client(
                        "Unable to handle request without a valid action parameter. Please supply a valid soap action.",
                    ));
                }
                if let Some(action) = &self.action {
                    match st.by_action(action) {
                        ServerRoute::Found(m) => return Ok(m),
                        ServerRoute::Ambiguous => return Err(ambiguous("SOAPAction", action)),
                        ServerRoute::NotFound if self.version() == SoapVersion::Soap11 => {
                            return Err(unknown_action(action));
                        }
                        ServerRoute::NotFound => {}
                    }
                }
                // SOAP 1.2 : l'action est facultative, on retombe sur l'élément
                let element = self.peek_request_element()?;
                match st.by_request_element(&element) {
                    ServerRoute::Found(m) => Ok(m),
                    ServerRoute::Ambiguous => Err(ambiguous("request element", &element.to_string())),
                    ServerRoute::NotFound => match &self.action {
                        Some(action) => Err(unknown_action(action)),
                        None => Err(unknown_element(&element)),
                    },
                }
            }
            SoapServiceRoutingStyle::RequestElement => {
                let element = self.peek_request_element()?;
                match st.by_request_element(&element) {
                    ServerRoute::Found(m) => Ok(m),
                    ServerRoute::Ambiguous => Err(ambiguous("request element", &element.to_string())),
                    ServerRoute::NotFound => {
                        if let Some(action) = &self.action {
                            match st.by_action(action) {
                                ServerRoute::Found(m) => return Ok(m),
                                ServerRoute::Ambiguous => return Err(ambiguous("SOAPAction", action)),
                                ServerRoute::NotFound => {}
                            }
                        }
                        Err(unknown_element(&element))
                    }
                }
            }
        }
    }

    fn peek_request_element(&self) -> Result<QName, SoapException> {
        peek_body_element(&self.message.body)
            .map(Option::unwrap_or_default)
            .map_err(envelope_fault)
    }

    /// Après un échec de routage, une enveloppe d'une autre version
    /// l'emporte sur l'erreur de routage.
    fn version_failure(&mut self) -> Option<SoapException> {
        let namespace = peek_envelope_namespace(&self.message.body).ok().flatten()?;
        match check_version(self.options.protocols, self.version(), &namespace) {
            Ok(()) => None,
            Err((version, e)) => {
                self.message.version = version;
                Some(e)
            }
        }
    }

    fn bind(&mut self, method: &Arc<SoapServerMethod>) {
        self.message.method = Some(method.reflected.clone());
        self.method = Some(method.clone());
    }

    async fn run_one_way(&mut self, method: &Arc<SoapServerMethod>) -> Result<(), SoapException> {
        self.read_parameters(method)?;
        self.invoke(method).await?;
        info!("✅ {} traité (sens unique)", method.reflected.name);
        Ok(())
    }

    fn read_parameters(&mut self, method: &SoapServerMethod) -> Result<(), SoapException> {
        let reflected = &method.reflected;
        self.chain.add(ExtensionGroup::Other, &method.extensions);
        let body = std::mem::take(&mut self.message.body);
        self.message.body = self.chain.filter_inbound(Some(ExtensionGroup::Other), body)?;
        self.chain.run(
            Some(ExtensionGroup::Other),
            SoapMessageStage::BeforeDeserialize,
            &mut self.message,
        )?;

        let ct = self.message.content_type.clone();
        if !content_type::is_soap(&ct) {
            return Err(unsupported_media(&ct));
        }

        let envelope = read_envelope(&self.message.body).map_err(envelope_fault)?;
        if let Err((version, e)) = check_version(self.options.protocols, self.version(), &envelope.namespace) {
            self.message.version = version;
            return Err(e);
        }
        if self.version() == SoapVersion::Soap11 && !content_type::matches_base(&ct, content_type::TEXT_XML) {
            return Err(unsupported_media(&ct));
        }
        let check_required = reflected.wsi_claims && self.version() == SoapVersion::Soap11;
        let missing = read_headers(
            envelope.header.as_ref(),
            &reflected.headers,
            SoapHeaderDirection::IN,
            check_required,
            &mut self.message.headers,
        )
        .map_err(unable_to_read)?;
        if let Some(name) = missing {
            return Err(SoapException::must_understand(format!(
                "Required SOAP header '{}' was not received.",
                name
            )));
        }

        self.message.in_values =
            read_members(&reflected.request_mapping, &envelope.body).map_err(unable_to_read)?;
        debug!(
            "📥 {} : {} paramètre(s) lu(s)",
            reflected.name,
            self.message.in_values.len()
        );
        Ok(())
    }

    async fn invoke(&mut self, method: &SoapServerMethod) -> Result<Vec<Value>, SoapException> {
        let reflected = &method.reflected;
        self.chain
            .run(None, SoapMessageStage::AfterDeserialize, &mut self.message)?;

        let descriptor = self.server_type.descriptor();
        let instance = Arc::new(ServiceInstance::new(descriptor.name(), descriptor.state()));
        self.instance = Some(instance.clone());
        set_header_members(
            &self.message.headers,
            instance.headers(),
            &reflected.headers,
            SoapHeaderDirection::IN,
            false,
        )?;

        let names = reflected
            .method
            .in_parameters()
            .iter()
            .map(|p| p.name.clone())
            .collect();
        let args = OperationArgs::new(names, self.message.in_values.clone());

        match (method.handler)(instance, args).await {
            Ok(values) => {
                let expected = reflected.method.out_value_count();
                if values.len() != expected {
                    error!(
                        "❌ {} a renvoyé {} valeur(s), {} attendue(s)",
                        reflected.name,
                        values.len(),
                        expected
                    );
                    return Err(SoapException::unable_to_process(format!(
                        "operation {} returned {} values, expected {}",
                        reflected.name,
                        values.len(),
                        expected
                    )));
                }
                Ok(values)
            }
            Err(OperationError::Fault(e)) => Err(e),
            Err(e) if e.is_argument_error() && reflected.rpc && self.version() == SoapVersion::Soap12 => {
                Err(SoapException::client(e.to_string())
                    .with_subcode(SoapFaultSubCode::new(codes::bad_arguments()))
                    .with_cause(FaultCause::Argument))
            }
            Err(e) => {
                warn!("⚠️ {} a échoué : {}", reflected.name, e);
                Err(SoapException::unable_to_process(e))
            }
        }
    }

    fn write_returns(
        &mut self,
        method: &SoapServerMethod,
        values: Vec<Value>,
    ) -> Result<SoapResponse, SoapException> {
        let reflected = &method.reflected;
        ensure_headers_understood(&self.message.headers)?;

        self.message.headers.clear();
        self.message.http_headers.clear();
        if let Some(instance) = &self.instance {
            get_header_members(
                &mut self.message.headers,
                instance.headers(),
                &reflected.headers,
                SoapHeaderDirection::OUT,
            );
        }
        self.message.out_values = values;
        self.message.content_type = content_type::compose(self.version().content_type(), "utf-8");

        self.chain
            .run(None, SoapMessageStage::BeforeSerialize, &mut self.message)
            .map_err(extension_failure)?;

        let mapping = reflected
            .response_mapping
            .as_ref()
            .ok_or_else(|| SoapException::unable_to_process("no response mapping"))?;
        let header = write_headers(
            &self.message.headers,
            &reflected.headers,
            SoapHeaderDirection::OUT,
            reflected.is_encoded(),
            self.version(),
        )
        .map_err(SoapException::unable_to_process)?;
        let body = write_members(mapping, &self.message.out_values)
            .map_err(SoapException::unable_to_process)?;
        let options = EnvelopeOptions {
            encoded: reflected.is_encoded(),
            rpc: reflected.rpc,
            target_namespace: self.server_type.descriptor().namespace().to_string(),
            types_namespace: mapping.types_namespace.clone(),
            ..EnvelopeOptions::new(self.version())
        };
        let bytes = write_envelope(&options, header, body).map_err(SoapException::unable_to_process)?;

        self.message.body = self.chain.filter_outbound(bytes).map_err(extension_failure)?;
        self.chain
            .run(None, SoapMessageStage::AfterSerialize, &mut self.message)
            .map_err(extension_failure)?;

        let buffered = reflected.buffer_response && self.options.buffer_response;
        info!("✅ {} → 200 ({} octets)", reflected.name, self.message.body.len());
        Ok(self.response(StatusCode::OK, buffered))
    }

    fn write_exception(&mut self, e: SoapException) -> SoapResponse {
        warn!("⚠️ Faute SOAP {} : {}", e.code, e.message);
        let version = self.version();
        let status = fault_status(&e);
        let upgrade = e.is_version_mismatch_fault();

        self.message.headers.clear();
        self.message.http_headers.clear();
        if let (Some(method), Some(instance)) = (&self.method, &self.instance) {
            get_header_members(
                &mut self.message.headers,
                instance.headers(),
                &method.reflected.headers,
                SoapHeaderDirection::FAULT,
            );
        }
        self.message.exception = Some(e);
        self.message.content_type = content_type::compose(version.content_type(), "utf-8");

        if let Err(failure) = self
            .chain
            .run(None, SoapMessageStage::BeforeSerialize, &mut self.message)
        {
            self.message.exception = Some(extension_failure(failure));
        }

        match self.serialize_fault(upgrade) {
            Ok(()) => self.response(status, true),
            Err(failure) => {
                error!("❌ Impossible d'écrire la faute : {}", failure);
                SoapResponse::text(StatusCode::INTERNAL_SERVER_ERROR, failure.to_string())
            }
        }
    }

    fn serialize_fault(&mut self, upgrade: bool) -> Result<(), SoapException> {
        let version = self.version();
        let wire = self
            .message
            .exception
            .as_ref()
            .map(|e| e.for_wire(self.options.suppress_fault_detail))
            .unwrap_or_else(|| SoapException::server(crate::fault::UNABLE_TO_PROCESS));

        let header = if upgrade {
            Some(upgrade_header(self.options.protocols))
        } else if let Some(method) = &self.method {
            write_headers(
                &self.message.headers,
                &method.reflected.headers,
                SoapHeaderDirection::FAULT,
                method.reflected.is_encoded(),
                version,
            )
            .map_err(SoapException::unable_to_process)?
        } else {
            None
        };

        let bytes = write_envelope(&EnvelopeOptions::new(version), header, vec![write_fault(version, &wire)])
            .map_err(SoapException::unable_to_process)?;
        self.message.body = self.chain.filter_outbound(bytes)?;
        self.chain
            .run(None, SoapMessageStage::AfterSerialize, &mut self.message)
    }

    fn response(&mut self, status: StatusCode, buffered: bool) -> SoapResponse {
        let mut response = SoapResponse::new(status);
        response.content_type = Some(self.message.content_type.clone());
        if let Some(encoding) = &self.message.content_encoding {
            response
                .headers
                .push((content_type::CONTENT_ENCODING.to_string(), encoding.clone()));
        }
        response
            .headers
            .extend(self.message.http_headers.drain());
        response.body = std::mem::take(&mut self.message.body);
        response.buffered = buffered;
        response
    }
}

/// Statut HTTP d'une faute.
pub fn fault_status(e: &SoapException) -> StatusCode {
    match e.cause {
        FaultCause::XmlParse if e.is_client_fault() => StatusCode::BAD_REQUEST,
        FaultCause::UnsupportedMedia => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn envelope_fault(e: EnvelopeError) -> SoapException {
    let fault = SoapException::client(format!("Server was unable to read request. ---> {}", e));
    if e.is_xml_error() {
        fault.with_cause(FaultCause::XmlParse)
    } else {
        fault
    }
}

fn unable_to_read(e: impl std::fmt::Display) -> SoapException {
    SoapException::client(format!("Server was unable to read request. ---> {}", e))
        .with_cause(FaultCause::Argument)
}

fn unsupported_media(ct: &str) -> SoapException {
    SoapException::client(format!(
        "Unsupported content type '{}' for a SOAP request.",
        ct
    ))
    .with_subcode(SoapFaultSubCode::new(codes::unsupported_media_type()))
    .with_cause(FaultCause::UnsupportedMedia)
}

fn extension_failure(e: SoapException) -> SoapException {
    if e.cause == FaultCause::Extension {
        return e;
    }
    SoapException::server(format!("SOAP extension error: {}", e.message)).with_cause(FaultCause::Extension)
}

fn unknown_action(action: &str) -> SoapException {
    SoapException::client(format!(
        "Server did not recognize the value of HTTP Header SOAPAction: {}.",
        action
    ))
}

fn unknown_element(element: &QName) -> SoapException {
    SoapException::client(format!(
        "The request element <{} xmlns='{}'> was not recognized.",
        element.name, element.namespace
    ))
}

fn ambiguous(kind: &str, key: &str) -> SoapException {
    SoapException::client(format!(
        "Several operations share the {} '{}'; the request cannot be routed.",
        kind, key
    ))
}
