use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use lsd_dapp_interface::Address;
use serde_json::Value;

use super::{ConnectorKind, SdkFactory, SessionError, Signer};
use crate::sdk::{LsdWizard, MockWizard, SdkError};

/// A signature request observed by [`MockSigner`].
#[derive(Clone, Debug, PartialEq)]
pub enum SignRequest {
    Message(Vec<u8>),
    TypedData(Value),
}

#[derive(Clone)]
pub struct MockSigner {
    connector: ConnectorKind,
    address: Result<Address, SessionError>,
    requests: Arc<Mutex<Vec<SignRequest>>>,
}

impl MockSigner {
    pub fn new(connector: ConnectorKind, address: impl Into<Address>) -> Self {
        Self {
            connector,
            address: Ok(address.into()),
            requests: Arc::default(),
        }
    }

    /// Signer whose address lookup fails.
    pub fn failing(connector: ConnectorKind) -> Self {
        Self {
            connector,
            address: Err(SessionError::SignerUnavailable("mock signer offline".into())),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<SignRequest> {
        self.lock_requests().clone()
    }

    fn lock_requests(&self) -> MutexGuard<'_, Vec<SignRequest>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Signer for MockSigner {
    fn connector(&self) -> ConnectorKind {
        self.connector
    }

    async fn address(&self) -> Result<Address, SessionError> {
        self.address.clone()
    }

    async fn sign_message(&self, message: &[u8]) -> Result<String, SessionError> {
        self.lock_requests()
            .push(SignRequest::Message(message.to_vec()));
        Ok(format!("0x{}", hex::encode(message)))
    }

    async fn sign_typed_data(&self, typed_data: &Value) -> Result<String, SessionError> {
        self.lock_requests()
            .push(SignRequest::TypedData(typed_data.clone()));
        Ok("0xtyped".to_string())
    }
}

/// Factory handing out clones of one [`MockWizard`].
#[derive(Clone)]
pub struct MockSdkFactory {
    sdk: MockWizard,
    builds: Arc<AtomicUsize>,
}

impl MockSdkFactory {
    pub fn new(sdk: MockWizard) -> Self {
        Self {
            sdk,
            builds: Arc::default(),
        }
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl SdkFactory for MockSdkFactory {
    fn build(
        &self,
        _signer: Arc<dyn Signer>,
        _chain_id: u64,
    ) -> Result<Arc<dyn LsdWizard>, SdkError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.sdk.clone()))
    }
}
