use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signer::keypair::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::VersionedTransaction;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::SignerError;

/// Anything that can sign on behalf of the user's wallet
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Public key of the connected account
    fn pubkey(&self) -> Option<Pubkey>;

    /// Sign the transaction in place of the fee payer
    async fn sign_transaction(&self, tx: VersionedTransaction) -> Result<VersionedTransaction, SignerError>;
}

/// Signs with a keypair held in memory
pub struct KeypairSigner {
    keypair: Keypair,
}

impl KeypairSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Load a keypair file, either a JSON byte array or a base58 string
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(&path)
            .with_context(|| format!("Failed to open keypair file at {:?}", path.as_ref()))?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .with_context(|| format!("Failed to read keypair file at {:?}", path.as_ref()))?;

        Self::from_bytes_or_base58(&bytes)
    }

    fn from_bytes_or_base58(bytes: &[u8]) -> Result<Self> {
        if let Ok(keypair_bytes) = serde_json::from_slice::<Vec<u8>>(bytes) {
            if keypair_bytes.len() == 64 {
                return Ok(Self::new(Keypair::from_bytes(&keypair_bytes)?));
            }
        }

        let text = String::from_utf8_lossy(bytes).trim().to_string();
        if let Ok(keypair_bytes) = bs58::decode(&text).into_vec() {
            if keypair_bytes.len() == 64 {
                return Ok(Self::new(Keypair::from_bytes(&keypair_bytes)?));
            }
        }

        Err(anyhow::anyhow!("Failed to parse keypair file"))
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

#[async_trait]
impl WalletSigner for KeypairSigner {
    fn is_connected(&self) -> bool {
        true
    }

    fn pubkey(&self) -> Option<Pubkey> {
        Some(self.keypair.pubkey())
    }

    async fn sign_transaction(&self, tx: VersionedTransaction) -> Result<VersionedTransaction, SignerError> {
        VersionedTransaction::try_new(tx.message, &[&self.keypair])
            .map_err(|e| SignerError::Failed(e.to_string()))
    }
}
