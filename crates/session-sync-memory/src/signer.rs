use session_sync::{Error, Result, WalletSigner};
use sha2::{Digest, Sha256};

/// Wallet signer producing a deterministic signature per (seed, message),
/// the way a real wallet's deterministic ECDSA yields the same signature for
/// the same message. Distinct seeds model distinct wallets.
pub struct StaticWalletSigner {
    seed: Vec<u8>,
}

impl StaticWalletSigner {
    pub fn new(seed: impl AsRef<[u8]>) -> Self {
        Self {
            seed: seed.as_ref().to_vec(),
        }
    }
}

impl WalletSigner for StaticWalletSigner {
    fn sign_message(&self, message: &str) -> Result<Vec<u8>> {
        let mut hasher = Sha256::new();
        hasher.update(&self.seed);
        hasher.update(message.as_bytes());
        Ok(hasher.finalize().to_vec())
    }
}

/// Wallet signer that rejects every signature request.
pub struct DecliningWalletSigner;

impl WalletSigner for DecliningWalletSigner {
    fn sign_message(&self, _message: &str) -> Result<Vec<u8>> {
        Err(Error::UserDeclined)
    }
}
