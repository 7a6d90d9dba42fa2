use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::fmt;

use crate::error::AppError;

/// An address together with the key that signs for it.
#[derive(Clone)]
pub struct Wallet {
    address: Address,
    signer: EthereumWallet,
}

impl Wallet {
    /// `index` is only used to identify the key in errors.
    pub fn from_private_key(index: usize, key: &str) -> Result<Self, AppError> {
        let invalid = |reason: String| AppError::InvalidKey { index, reason };
        let key_bytes = hex::decode(key.trim().trim_start_matches("0x"))
            .map_err(|e| invalid(format!("invalid hex: {e}")))?;
        if key_bytes.len() != 32 {
            return Err(invalid(format!("expected 32 bytes, got {}", key_bytes.len())));
        }
        let signer =
            PrivateKeySigner::from_slice(&key_bytes).map_err(|e| invalid(e.to_string()))?;
        Ok(Self::from_signer(signer))
    }

    pub fn from_signer(signer: PrivateKeySigner) -> Self {
        Self {
            address: signer.address(),
            signer: EthereumWallet::from(signer),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer(&self) -> &EthereumWallet {
        &self.signer
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet").field("address", &self.address).finish()
    }
}

/// Builds one wallet per key, failing on the first malformed key.
pub fn load_wallets<'a>(keys: impl IntoIterator<Item = &'a str>) -> Result<Vec<Wallet>, AppError> {
    keys.into_iter()
        .enumerate()
        .map(|(i, key)| Wallet::from_private_key(i + 1, key))
        .collect()
}
