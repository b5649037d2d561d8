use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttestError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid signing key: {0}")]
    Key(String),

    #[error("Invalid token id: {0}")]
    TokenId(String),
}

/// Why an attestation document failed verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("unsupported attestation version {0:?}")]
    UnsupportedVersion(String),

    #[error("validator identity is not an Ed25519 public key")]
    MalformedIdentity,

    #[error("signature is not 0x-prefixed 64-byte hex")]
    MalformedSignature,

    #[error("signature does not match document")]
    BadSignature,

    #[error("Serialization error: {0}")]
    Serialization(String),
}
