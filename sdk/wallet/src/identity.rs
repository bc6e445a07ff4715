//! The wallet's public identity
//!
//! Key derivation and signing stay with the HD wallet; the orchestrator only
//! needs the public address to derive note owners.

use shade_primitives::FieldElement;

use crate::WalletError;

pub trait WalletIdentity: Send + Sync {
    /// Hex-encoded public address, `0x`-prefixed
    fn address(&self) -> String;

    /// The address as a note owner
    fn owner(&self) -> Result<FieldElement, WalletError> {
        let address = self.address();
        FieldElement::from_address(&address)
            .map_err(|e| WalletError::InputValidation(format!("wallet address {}: {}", address, e)))
    }
}

/// A fixed address, for watch-only use and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticIdentity(pub String);

impl StaticIdentity {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }
}

impl WalletIdentity for StaticIdentity {
    fn address(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_from_address() {
        let identity = StaticIdentity::new("0xabc123");
        assert_eq!(identity.owner().unwrap(), FieldElement::from_u64(0xabc123));

        let bad = StaticIdentity::new("not-an-address");
        assert!(matches!(bad.owner(), Err(WalletError::InputValidation(_))));
    }
}
