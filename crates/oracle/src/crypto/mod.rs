mod ecdsa;
mod keys;

pub use self::ecdsa::{EcdsaSignature, EcdsaSigner, EcdsaVerifier, SignatureError};
pub use keys::{KeyError, KeyPair, PublicKey};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}
