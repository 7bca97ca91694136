//! Collections of interface signatures and the seam to the IDL front end.

use std::{collections::HashMap, sync::Arc};

use tracing::debug;
use uguid::{guid, Guid};

use crate::{
    interface::{
        signature::{InterfaceSignature, MethodSignature},
        types::{Direction, MarshalType},
    },
    Result,
};

/// `IID_IUnknown`
pub const IID_IUNKNOWN: Guid = guid!("00000000-0000-0000-c000-000000000046");

/// `IID_IClassFactory`
pub const IID_ICLASSFACTORY: Guid = guid!("00000001-0000-0000-c000-000000000046");

/// Source of interface signatures, implemented by the IDL front end.
pub trait SignatureProvider {
    /// All interfaces this provider describes.
    ///
    /// # Errors
    /// Provider specific; typically [`crate::Error::InvalidSignature`].
    fn signatures(&self) -> Result<Vec<InterfaceSignature>>;
}

impl SignatureProvider for Vec<InterfaceSignature> {
    fn signatures(&self) -> Result<Vec<InterfaceSignature>> {
        Ok(self.clone())
    }
}

/// The interfaces known to a [`crate::linker::InterfaceLinker`], by name.
#[derive(Debug, Clone, Default)]
pub struct SignatureSet {
    interfaces: HashMap<String, Arc<InterfaceSignature>>,
}

impl SignatureSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding `IUnknown` and `IClassFactory`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut set = Self::new();
        set.insert(iunknown());
        set.insert(iclassfactory());
        set
    }

    /// Collect everything `provider` describes on top of the builtins.
    ///
    /// # Errors
    /// Propagates the provider's error.
    pub fn from_provider(provider: &dyn SignatureProvider) -> Result<Self> {
        let mut set = Self::with_builtins();
        set.extend_from(provider)?;
        Ok(set)
    }

    /// Add everything `provider` describes, replacing interfaces of the same name.
    ///
    /// # Errors
    /// Propagates the provider's error.
    pub fn extend_from(&mut self, provider: &dyn SignatureProvider) -> Result<()> {
        for signature in provider.signatures()? {
            self.insert(signature);
        }
        Ok(())
    }

    /// Add one interface, returning the one it replaces.
    pub fn insert(&mut self, signature: InterfaceSignature) -> Option<Arc<InterfaceSignature>> {
        let replaced = self
            .interfaces
            .insert(signature.name.clone(), Arc::new(signature));
        if let Some(old) = &replaced {
            debug!(interface = %old.name, "replacing interface signature");
        }
        replaced
    }

    /// The interface called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<InterfaceSignature>> {
        self.interfaces.get(name)
    }

    /// The interface with identifier `iid`.
    #[must_use]
    pub fn by_iid(&self, iid: &Guid) -> Option<&Arc<InterfaceSignature>> {
        self.interfaces
            .values()
            .find(|signature| signature.iid.as_ref() == Some(iid))
    }

    /// Number of interfaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    /// All interfaces in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<InterfaceSignature>> {
        self.interfaces.values()
    }
}

impl SignatureProvider for SignatureSet {
    fn signatures(&self) -> Result<Vec<InterfaceSignature>> {
        Ok(self.iter().map(|signature| (**signature).clone()).collect())
    }
}

fn iunknown() -> InterfaceSignature {
    InterfaceSignature {
        name: "IUnknown".to_string(),
        iid: Some(IID_IUNKNOWN),
        base: None,
        methods: vec![
            MethodSignature::new("QueryInterface")
                .param("riid", MarshalType::Guid, Direction::In)
                .param("ppvObject", MarshalType::Interface, Direction::Out),
            MethodSignature::new("AddRef").returns(MarshalType::U32),
            MethodSignature::new("Release").returns(MarshalType::U32),
        ],
    }
}

fn iclassfactory() -> InterfaceSignature {
    InterfaceSignature {
        name: "IClassFactory".to_string(),
        iid: Some(IID_ICLASSFACTORY),
        base: Some("IUnknown".to_string()),
        methods: vec![
            MethodSignature::new("CreateInstance")
                .param("pUnkOuter", MarshalType::Interface, Direction::In)
                .param("riid", MarshalType::Guid, Direction::In)
                .param("ppvObject", MarshalType::Interface, Direction::Out),
            MethodSignature::new("LockServer").param("fLock", MarshalType::Bool, Direction::In),
        ],
    }
}
