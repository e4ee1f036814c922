use lsd_dapp_interface::{DappAction, FundingRequirement};
use tracing::info;

use crate::deposit::{add_0x, DepositError, DepositObject, KeystoreObject};
use crate::error_map::capitalize_reason;
use crate::forms::{validate_keystore_password, ValidationError};
use crate::sdk::{SdkError, TransactionResult};
use crate::session::Session;
use crate::telemetry::DappTelemetry;

/// Shown when the keystore cannot be decoded with the supplied password.
pub const INVALID_KEYSTORE_MESSAGE: &str = "Please ensure the password and validator file are correct.";

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StakeError {
    #[error("no wallet is connected")]
    NotConnected,
    #[error("the SDK is not available for the connected wallet")]
    SdkUnavailable,
    #[error("the validator still needs funding before it can be staked")]
    FundingIncomplete,
    #[error(transparent)]
    Password(#[from] ValidationError),
    #[error("Please ensure the password and validator file are correct.")]
    InvalidKeystore(String),
    #[error("expected withdrawal credentials are not configured")]
    MissingExpectedCredentials,
    #[error("Incorrect withdrawal credentials")]
    CredentialsMismatch { expected: String, found: String },
    #[error("{reason}")]
    Submission { reason: String },
}

impl From<DepositError> for StakeError {
    fn from(err: DepositError) -> Self {
        match err {
            DepositError::MissingExpectedCredentials => StakeError::MissingExpectedCredentials,
            DepositError::CredentialsMismatch { expected, found } => {
                StakeError::CredentialsMismatch { expected, found }
            }
            other => StakeError::InvalidKeystore(other.to_string()),
        }
    }
}

impl StakeError {
    pub(crate) fn submission(err: SdkError) -> Self {
        let reason = match &err {
            SdkError::InvalidKeystore(detail) => return StakeError::InvalidKeystore(detail.clone()),
            SdkError::Rejected => "user rejected the request".to_string(),
            other => other.reason().map(str::to_string).unwrap_or_else(|| other.to_string()),
        };
        StakeError::Submission {
            reason: capitalize_reason(&reason),
        }
    }
}

/// Inputs collected by the approval step.
#[derive(Clone, Debug)]
pub struct StakeRequest<'a> {
    pub funding: &'a FundingRequirement,
    pub deposit: &'a DepositObject,
    pub keystore: &'a KeystoreObject,
    pub withdrawal_credentials: &'a str,
}

/// Submits the BLS-authenticated stake transaction for a funded validator.
///
/// The returned transaction is not yet confirmed; callers wait on it so the
/// pending confirmation stays observable.
#[derive(Clone, Debug, Default)]
pub struct StakeSubmitter {
    telemetry: DappTelemetry,
}

impl StakeSubmitter {
    pub fn new(telemetry: DappTelemetry) -> Self {
        Self { telemetry }
    }

    /// Checks the request, signs the depositor payload and sends `stake`.
    pub async fn submit(
        &self,
        session: &Session,
        request: StakeRequest<'_>,
    ) -> Result<TransactionResult, StakeError> {
        let result = self.run(session, request).await;
        self.telemetry.observe(DappAction::Stake, result)
    }

    async fn run(
        &self,
        session: &Session,
        request: StakeRequest<'_>,
    ) -> Result<TransactionResult, StakeError> {
        let account = session
            .require_account()
            .map_err(|_| StakeError::NotConnected)?;
        let (Some(sdk), Some(signer)) = (session.sdk(), session.signer.as_ref()) else {
            return Err(StakeError::SdkUnavailable);
        };
        if !request.funding.is_satisfied() {
            return Err(StakeError::FundingIncomplete);
        }
        validate_keystore_password(request.keystore.password())?;
        request
            .deposit
            .validate_credentials(request.withdrawal_credentials)?;

        let entries = sdk
            .deposit_data_from_keystore(request.keystore)
            .await
            .map_err(StakeError::submission)?;
        let decoded = DepositObject::from_entries(entries)?;
        decoded.validate_credentials(request.withdrawal_credentials)?;
        let deposit = decoded.primary();

        let network = sdk
            .lsdn_for_bls_public_key(&deposit.pubkey)
            .await
            .map_err(StakeError::submission)?;
        let payload = sdk
            .personal_sign_initials(
                signer.as_ref(),
                &add_0x(&deposit.pubkey),
                &add_0x(&deposit.signature),
                &account.address,
                session.signing_method(),
            )
            .await
            .map_err(StakeError::submission)?;
        let authentication = sdk
            .bls_authentication(request.keystore, decoded.entries(), &payload)
            .await
            .map_err(StakeError::submission)?;

        info!(network = %network, bls_public_key = %deposit.pubkey, "submitting stake");
        sdk.stake(&network, &authentication)
            .await
            .map_err(StakeError::submission)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lsd_dapp_interface::{Account, Wei};

    use super::*;
    use crate::deposit::fixtures::{entry, keystore, CREDENTIALS, PUBKEY};
    use crate::sdk::{MockWizard, SigningMethod};
    use crate::session::{ConnectorKind, MockSigner, SignRequest};

    fn setup(connector: ConnectorKind) -> (MockWizard, MockSigner, Session) {
        let sdk = MockWizard::new().with_network(PUBKEY, "0xlsm");
        sdk.set_deposit_data(vec![entry(CREDENTIALS)]);
        let signer = MockSigner::new(connector, "0xabc");
        let session = Session::new(
            Account::direct("0xabc"),
            connector,
            Arc::new(signer.clone()),
            Arc::new(sdk.clone()),
        );
        (sdk, signer, session)
    }

    fn deposit(credentials: &str) -> DepositObject {
        DepositObject::from_entries(vec![entry(credentials)]).unwrap()
    }

    #[tokio::test]
    async fn stakes_through_the_full_sequence() {
        let (sdk, signer, session) = setup(ConnectorKind::Injected);
        let funding = FundingRequirement::default();
        let deposit = deposit(CREDENTIALS);
        let keystore = keystore("correct horse");

        let result = StakeSubmitter::default()
            .submit(
                &session,
                StakeRequest {
                    funding: &funding,
                    deposit: &deposit,
                    keystore: &keystore,
                    withdrawal_credentials: CREDENTIALS,
                },
            )
            .await
            .unwrap();
        assert!(result.hash().as_str().starts_with("0x"));

        let methods: Vec<_> = sdk.calls().iter().map(|call| call.method).collect();
        assert_eq!(
            methods,
            vec![
                "deposit_data_from_keystore",
                "lsdn_for_bls_public_key",
                "personal_sign_initials",
                "bls_authentication",
                "stake",
            ]
        );
        let sign = &sdk.calls_to("personal_sign_initials")[0];
        assert_eq!(sign.args[0], format!("0x{PUBKEY}"));
        assert_eq!(sign.args[3], format!("{:?}", SigningMethod::PersonalSign));
        assert!(matches!(signer.requests()[0], SignRequest::Message(_)));
    }

    #[tokio::test]
    async fn wallet_connect_signs_typed_data() {
        let (_sdk, signer, session) = setup(ConnectorKind::WalletConnect);
        let funding = FundingRequirement::default();
        let deposit = deposit(CREDENTIALS);
        let keystore = keystore("correct horse");
        StakeSubmitter::default()
            .submit(
                &session,
                StakeRequest {
                    funding: &funding,
                    deposit: &deposit,
                    keystore: &keystore,
                    withdrawal_credentials: CREDENTIALS,
                },
            )
            .await
            .unwrap();
        assert!(matches!(signer.requests()[0], SignRequest::TypedData(_)));
    }

    #[tokio::test]
    async fn mismatched_credentials_stop_before_any_sdk_call() {
        let (sdk, signer, session) = setup(ConnectorKind::Injected);
        let funding = FundingRequirement::default();
        let other = "02".repeat(32);
        let deposit = deposit(&other);
        let keystore = keystore("correct horse");

        let err = StakeSubmitter::default()
            .submit(
                &session,
                StakeRequest {
                    funding: &funding,
                    deposit: &deposit,
                    keystore: &keystore,
                    withdrawal_credentials: CREDENTIALS,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Incorrect withdrawal credentials");
        assert!(sdk.calls().is_empty());
        assert!(signer.requests().is_empty());
    }

    #[tokio::test]
    async fn preconditions_are_checked_first() {
        let (sdk, _signer, session) = setup(ConnectorKind::Injected);
        let deposit = deposit(CREDENTIALS);
        let keystore = keystore("correct horse");
        let unfunded = FundingRequirement::new(Wei::from_ether(24), Wei::ZERO);
        let err = StakeSubmitter::default()
            .submit(
                &session,
                StakeRequest {
                    funding: &unfunded,
                    deposit: &deposit,
                    keystore: &keystore,
                    withdrawal_credentials: CREDENTIALS,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, StakeError::FundingIncomplete);

        let funded = FundingRequirement::default();
        let short = crate::deposit::fixtures::keystore("short");
        let err = StakeSubmitter::default()
            .submit(
                &session,
                StakeRequest {
                    funding: &funded,
                    deposit: &deposit,
                    keystore: &short,
                    withdrawal_credentials: CREDENTIALS,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Your password must be 8 or more characters.");
        assert!(sdk.calls().is_empty());
    }

    #[tokio::test]
    async fn reverts_are_capitalized_and_keystore_errors_mapped() {
        let (sdk, _signer, session) = setup(ConnectorKind::Injected);
        let funding = FundingRequirement::default();
        let deposit = deposit(CREDENTIALS);
        let keystore = keystore("correct horse");
        let request = StakeRequest {
            funding: &funding,
            deposit: &deposit,
            keystore: &keystore,
            withdrawal_credentials: CREDENTIALS,
        };

        sdk.fail(
            "stake",
            SdkError::Reverted {
                reason: "execution reverted: not enough".into(),
            },
        );
        let err = StakeSubmitter::default()
            .submit(&session, request.clone())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Execution reverted: not enough");

        sdk.fail(
            "deposit_data_from_keystore",
            SdkError::InvalidKeystore("bad mac".into()),
        );
        let err = StakeSubmitter::default()
            .submit(&session, request)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), INVALID_KEYSTORE_MESSAGE);
    }

    #[tokio::test]
    async fn disconnected_sessions_are_rejected() {
        let funding = FundingRequirement::default();
        let deposit = deposit(CREDENTIALS);
        let keystore = keystore("correct horse");
        let err = StakeSubmitter::default()
            .submit(
                &Session::disconnected(),
                StakeRequest {
                    funding: &funding,
                    deposit: &deposit,
                    keystore: &keystore,
                    withdrawal_credentials: CREDENTIALS,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, StakeError::NotConnected);
    }
}
