//! # Extensions SOAP
//!
//! Une extension observe un message à ses quatre étapes et peut filtrer les
//! octets qui passent sur le fil. Elle est décrite par une fabrique
//! ([`SoapExtensionFactory`]) qui calcule une fois un initialiseur par
//! méthode ou par service, puis crée une instance par appel.
//!
//! ## Ordre d'exécution
//!
//! Les extensions d'un appel forment deux groupes : les extensions globales
//! de haute priorité, puis les extensions de la méthode suivies des
//! extensions globales de basse priorité.
//!
//! - ✅ `BeforeSerialize` / `AfterSerialize` : ordre croissant
//! - ✅ `BeforeDeserialize` / `AfterDeserialize` : ordre décroissant
//! - ✅ Filtres d'octets : croissant en sortie, décroissant en entrée
//! - ✅ Chaîne de filtres figée avant le premier appel d'étape

mod registry;

use std::any::Any;
use std::sync::Arc;

use tracing::{debug, trace};

pub use registry::{ExtensionRegistry, get_extension_registry, sort_extensions};

use crate::attributes::SoapExtensionAttribute;
use crate::fault::SoapException;
use crate::message::{SoapMessage, SoapMessageStage};
use crate::method::LogicalMethod;

/// Donnée calculée une fois par cible et transmise à chaque instance.
pub type ExtensionInitializer = Arc<dyn Any + Send + Sync>;

/// Cible d'un initialiseur.
#[derive(Debug, Clone, Copy)]
pub enum ExtensionTarget<'a> {
    /// Extension déclarée sur une opération
    Method {
        service: &'a str,
        method: &'a LogicalMethod,
    },
    /// Extension globale, initialisée par service
    Service(&'a str),
}

/// Filtre appliqué aux octets du message.
pub trait StreamFilter: Send {
    /// Octets produits par la sérialisation, vers le fil.
    fn outbound(&mut self, bytes: Vec<u8>) -> Result<Vec<u8>, SoapException> {
        Ok(bytes)
    }

    /// Octets reçus du fil, vers la désérialisation.
    fn inbound(&mut self, bytes: Vec<u8>) -> Result<Vec<u8>, SoapException> {
        Ok(bytes)
    }
}

/// Instance d'extension, propre à un appel.
pub trait SoapExtension: Send {
    /// Filtre à insérer dans la chaîne, demandé une seule fois par appel.
    fn chain_stream(&mut self) -> Option<Box<dyn StreamFilter>> {
        None
    }

    fn before_serialize(&mut self, _message: &mut SoapMessage) -> Result<(), SoapException> {
        Ok(())
    }

    fn after_serialize(&mut self, _message: &mut SoapMessage) -> Result<(), SoapException> {
        Ok(())
    }

    fn before_deserialize(&mut self, _message: &mut SoapMessage) -> Result<(), SoapException> {
        Ok(())
    }

    fn after_deserialize(&mut self, _message: &mut SoapMessage) -> Result<(), SoapException> {
        Ok(())
    }
}

/// Fabrique d'extensions.
pub trait SoapExtensionFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Calcule l'initialiseur d'une cible (mis en cache par l'appelant).
    fn initializer(&self, _target: ExtensionTarget<'_>) -> ExtensionInitializer {
        Arc::new(())
    }

    fn create(&self, initializer: &ExtensionInitializer) -> Box<dyn SoapExtension>;
}

/// Extension déclarée accompagnée de son initialiseur.
#[derive(Clone)]
pub struct BoundExtension {
    pub attribute: SoapExtensionAttribute,
    pub initializer: ExtensionInitializer,
}

impl BoundExtension {
    pub fn bind(attribute: &SoapExtensionAttribute, target: ExtensionTarget<'_>) -> Self {
        Self {
            initializer: attribute.factory.initializer(target),
            attribute: attribute.clone(),
        }
    }

    pub fn bind_all(attributes: &[SoapExtensionAttribute], target: ExtensionTarget<'_>) -> Vec<Self> {
        attributes.iter().map(|a| Self::bind(a, target)).collect()
    }

    pub fn create(&self) -> Box<dyn SoapExtension> {
        self.attribute.factory.create(&self.initializer)
    }
}

impl std::fmt::Debug for BoundExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundExtension")
            .field("attribute", &self.attribute)
            .finish()
    }
}

/// Groupe d'extensions d'un appel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionGroup {
    /// Extensions globales de haute priorité
    High,
    /// Extensions de la méthode puis globales de basse priorité
    Other,
}

struct Member {
    extension: Box<dyn SoapExtension>,
    filter: Option<Box<dyn StreamFilter>>,
}

/// Extensions instanciées pour un appel.
#[derive(Default)]
pub struct ExtensionChain {
    high: Vec<Member>,
    other: Vec<Member>,
}

impl ExtensionChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instancie les extensions d'un groupe et fige leurs filtres.
    pub fn add(&mut self, group: ExtensionGroup, bound: &[BoundExtension]) {
        let members = bound.iter().map(|b| {
            let mut extension = b.create();
            let filter = extension.chain_stream();
            Member { extension, filter }
        });
        match group {
            ExtensionGroup::High => self.high.extend(members),
            ExtensionGroup::Other => self.other.extend(members),
        }
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.other.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Passe le message à l'étape `stage` et appelle les extensions du
    /// groupe (ou de tous les groupes si `None`).
    ///
    /// Une faute posée par une extension via
    /// [`SoapMessage::set_exception`] interrompt la chaîne et est rendue en
    /// erreur. Un message qui portait déjà une faute (écriture d'une faute,
    /// faute reçue par le client) la garde : les extensions peuvent alors la
    /// remplacer sans interrompre l'étape.
    pub fn run(
        &mut self,
        group: Option<ExtensionGroup>,
        stage: SoapMessageStage,
        message: &mut SoapMessage,
    ) -> Result<(), SoapException> {
        message.set_stage(stage);
        let faulted = message.exception.is_some();
        for member in self.ordered(group, stage.is_outbound()) {
            trace!("🧩 Extension à l'étape {}", stage);
            let ext = &mut member.extension;
            match stage {
                SoapMessageStage::BeforeSerialize => ext.before_serialize(message)?,
                SoapMessageStage::AfterSerialize => ext.after_serialize(message)?,
                SoapMessageStage::BeforeDeserialize => ext.before_deserialize(message)?,
                SoapMessageStage::AfterDeserialize => ext.after_deserialize(message)?,
            }
            if !faulted {
                if let Some(e) = message.exception.take() {
                    debug!("🧩 Faute posée par une extension à l'étape {} : {}", stage, e.message);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Applique les filtres de sortie, dans l'ordre croissant.
    pub fn filter_outbound(&mut self, mut bytes: Vec<u8>) -> Result<Vec<u8>, SoapException> {
        for member in self.ordered(None, true) {
            if let Some(filter) = member.filter.as_mut() {
                bytes = filter.outbound(bytes)?;
            }
        }
        Ok(bytes)
    }

    /// Applique les filtres d'entrée du groupe, dans l'ordre décroissant.
    pub fn filter_inbound(
        &mut self,
        group: Option<ExtensionGroup>,
        mut bytes: Vec<u8>,
    ) -> Result<Vec<u8>, SoapException> {
        for member in self.ordered(group, false) {
            if let Some(filter) = member.filter.as_mut() {
                bytes = filter.inbound(bytes)?;
            }
        }
        Ok(bytes)
    }

    fn ordered(&mut self, group: Option<ExtensionGroup>, ascending: bool) -> Vec<&mut Member> {
        let (high, other): (Vec<&mut Member>, Vec<&mut Member>) = match group {
            Some(ExtensionGroup::High) => (self.high.iter_mut().collect(), Vec::new()),
            Some(ExtensionGroup::Other) => (Vec::new(), self.other.iter_mut().collect()),
            None => (self.high.iter_mut().collect(), self.other.iter_mut().collect()),
        };
        if ascending {
            high.into_iter().chain(other).collect()
        } else {
            other.into_iter().rev().chain(high.into_iter().rev()).collect()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::message::MessageSide;
    use crate::soap::SoapVersion;
    use parking_lot::Mutex;

    /// Extension de test qui journalise ses appels.
    pub(crate) struct Recorder {
        pub name: String,
        pub log: Arc<Mutex<Vec<String>>>,
    }

    impl SoapExtensionFactory for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn create(&self, _initializer: &ExtensionInitializer) -> Box<dyn SoapExtension> {
            Box::new(RecorderInstance {
                name: self.name.clone(),
                log: self.log.clone(),
            })
        }
    }

    struct RecorderInstance {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl RecorderInstance {
        fn record(&self, message: &SoapMessage) {
            let stage = message.stage().map(|s| s.to_string()).unwrap_or_default();
            self.log.lock().push(format!("{}:{}", self.name, stage));
        }
    }

    impl SoapExtension for RecorderInstance {
        fn before_serialize(&mut self, m: &mut SoapMessage) -> Result<(), SoapException> {
            self.record(m);
            Ok(())
        }
        fn after_serialize(&mut self, m: &mut SoapMessage) -> Result<(), SoapException> {
            self.record(m);
            Ok(())
        }
        fn before_deserialize(&mut self, m: &mut SoapMessage) -> Result<(), SoapException> {
            self.record(m);
            Ok(())
        }
        fn after_deserialize(&mut self, m: &mut SoapMessage) -> Result<(), SoapException> {
            self.record(m);
            Ok(())
        }
    }

    pub(crate) fn recorder(name: &str, log: &Arc<Mutex<Vec<String>>>, priority: i32) -> SoapExtensionAttribute {
        SoapExtensionAttribute::new(
            Arc::new(Recorder {
                name: name.to_string(),
                log: log.clone(),
            }),
            priority,
        )
    }

    /// Extension de test qui pose une faute sur le message à une étape.
    pub(crate) struct Veto {
        pub stage: SoapMessageStage,
        pub fault: SoapException,
    }

    impl SoapExtensionFactory for Veto {
        fn name(&self) -> &str {
            "veto"
        }

        fn create(&self, _initializer: &ExtensionInitializer) -> Box<dyn SoapExtension> {
            Box::new(VetoInstance {
                stage: self.stage,
                fault: self.fault.clone(),
            })
        }
    }

    struct VetoInstance {
        stage: SoapMessageStage,
        fault: SoapException,
    }

    impl VetoInstance {
        fn check(&self, m: &mut SoapMessage) -> Result<(), SoapException> {
            if m.stage() == Some(self.stage) && m.exception().is_none() {
                m.set_exception(Some(self.fault.clone()));
            }
            Ok(())
        }
    }

    impl SoapExtension for VetoInstance {
        fn before_serialize(&mut self, m: &mut SoapMessage) -> Result<(), SoapException> {
            self.check(m)
        }
        fn after_serialize(&mut self, m: &mut SoapMessage) -> Result<(), SoapException> {
            self.check(m)
        }
        fn before_deserialize(&mut self, m: &mut SoapMessage) -> Result<(), SoapException> {
            self.check(m)
        }
        fn after_deserialize(&mut self, m: &mut SoapMessage) -> Result<(), SoapException> {
            self.check(m)
        }
    }

    pub(crate) fn veto(stage: SoapMessageStage, fault: SoapException, priority: i32) -> SoapExtensionAttribute {
        SoapExtensionAttribute::new(Arc::new(Veto { stage, fault }), priority)
    }

    struct Suffix(&'static str);

    impl StreamFilter for Suffix {
        fn outbound(&mut self, mut bytes: Vec<u8>) -> Result<Vec<u8>, SoapException> {
            bytes.extend_from_slice(self.0.as_bytes());
            Ok(bytes)
        }
        fn inbound(&mut self, mut bytes: Vec<u8>) -> Result<Vec<u8>, SoapException> {
            bytes.extend_from_slice(self.0.as_bytes());
            Ok(bytes)
        }
    }

    struct SuffixFactory(&'static str);

    impl SoapExtensionFactory for SuffixFactory {
        fn name(&self) -> &str {
            self.0
        }
        fn create(&self, _initializer: &ExtensionInitializer) -> Box<dyn SoapExtension> {
            Box::new(SuffixExtension(self.0))
        }
    }

    struct SuffixExtension(&'static str);

    impl SoapExtension for SuffixExtension {
        fn chain_stream(&mut self) -> Option<Box<dyn StreamFilter>> {
            Some(Box::new(Suffix(self.0)))
        }
    }

    fn bind(attrs: &[SoapExtensionAttribute]) -> Vec<BoundExtension> {
        BoundExtension::bind_all(attrs, ExtensionTarget::Service("Test"))
    }

    #[test]
    fn test_stage_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = ExtensionChain::new();
        chain.add(ExtensionGroup::High, &bind(&[recorder("h", &log, 0)]));
        chain.add(
            ExtensionGroup::Other,
            &bind(&[recorder("one", &log, 1), recorder("two", &log, 2)]),
        );
        let mut m = SoapMessage::new(MessageSide::Client, SoapVersion::Soap11, "");

        chain.run(None, SoapMessageStage::BeforeSerialize, &mut m).unwrap();
        chain.run(None, SoapMessageStage::AfterDeserialize, &mut m).unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                "h:BeforeSerialize",
                "one:BeforeSerialize",
                "two:BeforeSerialize",
                "two:AfterDeserialize",
                "one:AfterDeserialize",
                "h:AfterDeserialize",
            ]
        );
    }

    #[test]
    fn test_group_only() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = ExtensionChain::new();
        chain.add(ExtensionGroup::High, &bind(&[recorder("h", &log, 0)]));
        chain.add(ExtensionGroup::Other, &bind(&[recorder("o", &log, 0)]));
        let mut m = SoapMessage::new(MessageSide::Server, SoapVersion::Soap11, "");
        chain
            .run(Some(ExtensionGroup::High), SoapMessageStage::BeforeDeserialize, &mut m)
            .unwrap();
        assert_eq!(*log.lock(), vec!["h:BeforeDeserialize"]);
        assert_eq!(m.stage(), Some(SoapMessageStage::BeforeDeserialize));
    }

    #[test]
    fn test_fault_set_on_message_stops_the_stage() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = ExtensionChain::new();
        chain.add(
            ExtensionGroup::Other,
            &bind(&[
                veto(SoapMessageStage::BeforeSerialize, SoapException::client("denied"), 1),
                recorder("after", &log, 2),
            ]),
        );
        let mut m = SoapMessage::new(MessageSide::Client, SoapVersion::Soap11, "");

        let err = chain
            .run(None, SoapMessageStage::BeforeSerialize, &mut m)
            .unwrap_err();
        assert_eq!(err.message, "denied");
        assert!(err.is_client_fault());
        assert!(m.exception().is_none());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_message_already_faulted_keeps_running() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = ExtensionChain::new();
        chain.add(
            ExtensionGroup::Other,
            &bind(&[
                veto(SoapMessageStage::BeforeSerialize, SoapException::client("denied"), 1),
                recorder("after", &log, 2),
            ]),
        );
        let mut m = SoapMessage::new(MessageSide::Server, SoapVersion::Soap11, "");
        m.set_exception(Some(SoapException::server("handler failed")));

        chain.run(None, SoapMessageStage::BeforeSerialize, &mut m).unwrap();
        assert_eq!(m.exception().unwrap().message, "handler failed");
        assert_eq!(*log.lock(), vec!["after:BeforeSerialize"]);
    }

    #[test]
    fn test_filter_order() {
        let mut chain = ExtensionChain::new();
        let attrs = [
            SoapExtensionAttribute::new(Arc::new(SuffixFactory("a")), 1),
            SoapExtensionAttribute::new(Arc::new(SuffixFactory("b")), 2),
        ];
        chain.add(ExtensionGroup::Other, &bind(&attrs));
        assert_eq!(chain.filter_outbound(b"x".to_vec()).unwrap(), b"xab".to_vec());
        assert_eq!(chain.filter_inbound(None, b"x".to_vec()).unwrap(), b"xba".to_vec());
    }
}
