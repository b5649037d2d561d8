//! Validator identity and Ed25519 signing of attestations

use std::fmt;

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand_core::OsRng;

use crate::{AttestError, Attestation, VerifyError, ATTESTATION_VERSION};

/// Signing key of a running validator. Provisioned from configuration; the
/// public half is the validator's identity.
pub struct ValidatorKey {
    signing_key: SigningKey,
}

impl ValidatorKey {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { signing_key: SigningKey::from_bytes(&seed) }
    }

    /// Parse a 32-byte seed given as 64 hex chars (an optional `0x` prefix is accepted).
    pub fn from_seed_hex(s: &str) -> Result<Self, AttestError> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| AttestError::Key(e.to_string()))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| AttestError::Key(format!("expected 32 bytes, got {}", b.len())))?;
        Ok(Self::from_seed(seed))
    }

    /// Fresh random key. For tests and demos only: a deployed validator must
    /// keep a stable, provisioned identity.
    pub fn generate() -> Self {
        Self { signing_key: SigningKey::generate(&mut OsRng) }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// `0x` + hex of the Ed25519 public key.
    pub fn identity(&self) -> String {
        format!("0x{}", hex::encode(self.verifying_key().to_bytes()))
    }

    pub fn sign(&self, att: &Attestation) -> Result<String, AttestError> {
        let bytes = att.canonical_bytes()?;
        let sig = self.signing_key.sign(&bytes);
        Ok(format!("0x{}", hex::encode(sig.to_bytes())))
    }
}

impl fmt::Debug for ValidatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorKey").field("identity", &self.identity()).finish_non_exhaustive()
    }
}

pub fn parse_identity(identity: &str) -> Result<VerifyingKey, VerifyError> {
    let raw = decode_0x(identity).ok_or(VerifyError::MalformedIdentity)?;
    let bytes: [u8; 32] = raw.try_into().map_err(|_| VerifyError::MalformedIdentity)?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| VerifyError::MalformedIdentity)
}

/// Check that `att.signature` was produced by `att.validator` over the rest of the document.
pub fn verify(att: &Attestation) -> Result<(), VerifyError> {
    if att.version != ATTESTATION_VERSION {
        return Err(VerifyError::UnsupportedVersion(att.version.clone()));
    }
    let vk = parse_identity(&att.validator)?;

    let raw = decode_0x(&att.signature).ok_or(VerifyError::MalformedSignature)?;
    let sig = Signature::from_slice(&raw).map_err(|_| VerifyError::MalformedSignature)?;

    let bytes = att
        .canonical_bytes()
        .map_err(|e| VerifyError::Serialization(e.to_string()))?;
    vk.verify(&bytes, &sig).map_err(|_| VerifyError::BadSignature)
}

fn decode_0x(s: &str) -> Option<Vec<u8>> {
    hex::decode(s.strip_prefix("0x")?).ok()
}
