//! Shield/Unshield Orchestrator
//!
//! ```text
//! shield:    Idle ─▶ LoadingCircuit ─▶ GeneratingProof ─▶ Complete
//!                         │                  │
//!                         └──────────────────┴──────────▶ Error
//! unshield:  Idle ─▶ Complete | Error
//! ```
//!
//! A shielded note is persisted only after its deposit proof succeeded.
//! Unshield records the spend locally as `Pending` before the chain has
//! confirmed anything; `confirm_unshield` / `reject_unshield` settle it.

use num_bigint::BigUint;
use serde::Serialize;
use shade_notestore::{KeyValueStore, NoteStore, StoredNote};
use shade_primitives::{FieldElement, Note};
use shade_prover::{
    ArtifactSource, CircuitType, DepositPublicInputs, DepositRequest, Proof, ProofClient,
    ProvingBackend,
};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::WalletError;
use crate::amount::{Balance, DEFAULT_DECIMALS, parse_units};
use crate::identity::WalletIdentity;

/// Progress of the current shield/unshield operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum WalletStatus {
    Idle,
    LoadingCircuit,
    GeneratingProof,
    Complete,
    Error(String),
}

/// Result of a successful shield
#[derive(Debug, Clone)]
pub struct ShieldReceipt {
    pub note: StoredNote,
    pub proof: Proof<DepositPublicInputs>,
    pub balance: Balance,
}

/// Result of a successful unshield
#[derive(Debug, Clone)]
pub struct UnshieldReceipt {
    pub note: StoredNote,
    pub balance: Balance,
}

pub struct Wallet<S, A, B: ProvingBackend, I> {
    store: NoteStore<S>,
    prover: ProofClient<A, B>,
    identity: I,
    decimals: u32,
    status: watch::Sender<WalletStatus>,
}

impl<S, A, B, I> Wallet<S, A, B, I>
where
    S: KeyValueStore,
    A: ArtifactSource,
    B: ProvingBackend,
    I: WalletIdentity,
{
    pub fn new(store: NoteStore<S>, prover: ProofClient<A, B>, identity: I) -> Self {
        let (status, _) = watch::channel(WalletStatus::Idle);
        Self {
            store,
            prover,
            identity,
            decimals: DEFAULT_DECIMALS,
            status,
        }
    }

    pub fn with_decimals(mut self, decimals: u32) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn store(&self) -> &NoteStore<S> {
        &self.store
    }

    pub fn prover(&self) -> &ProofClient<A, B> {
        &self.prover
    }

    pub fn identity(&self) -> &I {
        &self.identity
    }

    pub fn status(&self) -> WalletStatus {
        self.status.borrow().clone()
    }

    /// Watch status transitions
    pub fn subscribe(&self) -> watch::Receiver<WalletStatus> {
        self.status.subscribe()
    }

    /// Return to `Idle`, e.g. after the UI has shown an error
    pub fn reset(&self) {
        self.set_status(WalletStatus::Idle);
    }

    fn set_status(&self, status: WalletStatus) {
        self.status.send_replace(status);
    }

    fn finish<T>(&self, result: Result<T, WalletError>) -> Result<T, WalletError> {
        match &result {
            Ok(_) => self.set_status(WalletStatus::Complete),
            Err(e) => {
                warn!("Wallet operation failed: {}", e);
                self.set_status(WalletStatus::Error(e.to_string()));
            }
        }
        result
    }

    /// Shield `amount` (decimal, in whole units) into a new private note
    pub async fn shield(&self, amount: &str, pin: &str) -> Result<ShieldReceipt, WalletError> {
        let result = self.try_shield(amount, pin).await;
        self.finish(result)
    }

    async fn try_shield(&self, amount: &str, pin: &str) -> Result<ShieldReceipt, WalletError> {
        if amount.trim().is_empty() {
            return Err(WalletError::InputValidation("amount is required".to_string()));
        }
        if pin.is_empty() {
            return Err(WalletError::InputValidation("PIN is required".to_string()));
        }

        let value = parse_units(amount, self.decimals)?;
        let owner = self.identity.owner()?;
        // A wrong PIN must not cost a proof
        self.store.check_pin(pin)?;

        let note = Note::new(owner, value, &mut rand::rngs::OsRng);

        self.set_status(WalletStatus::LoadingCircuit);
        self.prover.preload(CircuitType::Deposit).await?;

        self.set_status(WalletStatus::GeneratingProof);
        let proof = self
            .prover
            .generate_deposit_proof(&DepositRequest { note })
            .await?;

        let stored = self.store.save(&note, pin)?;
        let balance = self.balance(pin)?;

        info!(
            "Shielded {} into note {} (balance {})",
            amount.trim(),
            stored.commitment,
            balance
        );
        Ok(ShieldReceipt {
            note: stored,
            proof,
            balance,
        })
    }

    /// Mark the note with `nullifier` as spent (pending confirmation)
    pub async fn unshield(
        &self,
        nullifier: &FieldElement,
        pin: &str,
    ) -> Result<UnshieldReceipt, WalletError> {
        let result = self.try_unshield(nullifier, pin);
        self.finish(result)
    }

    fn try_unshield(
        &self,
        nullifier: &FieldElement,
        pin: &str,
    ) -> Result<UnshieldReceipt, WalletError> {
        if pin.is_empty() {
            return Err(WalletError::InputValidation("PIN is required".to_string()));
        }

        let note = self
            .store
            .find_by_nullifier(nullifier, pin)?
            .ok_or(WalletError::NotFound(*nullifier))?;
        if note.spent() {
            return Err(WalletError::AlreadySpent(*nullifier));
        }
        if !self.store.mark_spent(nullifier, pin)? {
            return Err(WalletError::AlreadySpent(*nullifier));
        }

        let note = self
            .store
            .find_by_nullifier(nullifier, pin)?
            .ok_or(WalletError::NotFound(*nullifier))?;
        let balance = self.balance(pin)?;

        info!("Unshielded note {} (balance {})", note.commitment, balance);
        Ok(UnshieldReceipt { note, balance })
    }

    /// The unshield landed on-chain
    pub fn confirm_unshield(&self, nullifier: &FieldElement, pin: &str) -> Result<(), WalletError> {
        if self.store.confirm_spend(nullifier, pin)? {
            return Ok(());
        }
        Err(self.not_pending(nullifier, pin))
    }

    /// The unshield was rejected; the note becomes spendable again
    pub fn reject_unshield(&self, nullifier: &FieldElement, pin: &str) -> Result<(), WalletError> {
        if self.store.reject_spend(nullifier, pin)? {
            return Ok(());
        }
        Err(self.not_pending(nullifier, pin))
    }

    fn not_pending(&self, nullifier: &FieldElement, pin: &str) -> WalletError {
        match self.store.find_by_nullifier(nullifier, pin) {
            Ok(Some(note)) => WalletError::InputValidation(format!(
                "note {} has no pending spend ({:?})",
                note.commitment,
                note.spend_state()
            )),
            Ok(None) => WalletError::NotFound(*nullifier),
            Err(e) => e.into(),
        }
    }

    /// Sum of all unspent notes, as an integer so large notes never wrap mod p
    pub fn balance(&self, pin: &str) -> Result<Balance, WalletError> {
        let total: BigUint = self
            .store
            .list_unspent(pin)?
            .iter()
            .map(|n| n.value.to_biguint())
            .sum();
        Ok(Balance::new(total, self.decimals))
    }

    pub fn notes(&self, pin: &str) -> Result<Vec<StoredNote>, WalletError> {
        Ok(self.store.load_all(pin)?)
    }
}
