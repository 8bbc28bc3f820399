//! Compact JWS parsing and verification
//!
//! Challenge responses are signed by the account key. The VA only needs
//! the narrow slice of JOSE that covers them: compact serialization
//! (`header.payload.signature`, base64url without padding), RS256, and
//! RSA public keys in JWK form. Anything outside that is rejected.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use rsa::{BigUint, RsaPublicKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

/// Errors from JWS parsing or verification
#[derive(Debug, Error)]
pub enum JwsError {
    #[error("expected compact serialization with three segments")]
    Format,

    #[error("segment is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("JSON in header or payload is invalid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported signature algorithm {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("account key is not a usable RSA public key")]
    BadKey,

    #[error("signature verification failed")]
    BadSignature,
}

/// An account's public key, JWK-encoded
///
/// Only RSA keys (`kty: "RSA"`) are accepted; `n` and `e` are base64url
/// big-endian integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub n: String,
    pub e: String,
}

impl Jwk {
    /// Decode into an [`RsaPublicKey`]
    pub fn rsa_public_key(&self) -> Result<RsaPublicKey, JwsError> {
        if self.kty != "RSA" {
            return Err(JwsError::UnsupportedAlgorithm(self.kty.clone()));
        }
        let n = BigUint::from_bytes_be(&URL_SAFE_NO_PAD.decode(&self.n)?);
        let e = BigUint::from_bytes_be(&URL_SAFE_NO_PAD.decode(&self.e)?);
        RsaPublicKey::new(n, e).map_err(|_| JwsError::BadKey)
    }
}

#[derive(Debug, Deserialize)]
struct JwsHeader {
    alg: String,
}

/// A JWS in compact serialization
///
/// Segments are kept in their transmitted base64url form; decoding is
/// validated at parse time so accessors cannot fail on shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Jws {
    protected: String,
    payload: String,
    signature: String,
}

impl Jws {
    /// Parse `header.payload.signature`, checking every segment decodes
    pub fn parse_compact(input: &str) -> Result<Self, JwsError> {
        let mut segments = input.split('.');
        let (protected, payload, signature) = match (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) {
            (Some(h), Some(p), Some(s), None) => (h, p, s),
            _ => return Err(JwsError::Format),
        };
        URL_SAFE_NO_PAD.decode(protected)?;
        URL_SAFE_NO_PAD.decode(payload)?;
        let sig = URL_SAFE_NO_PAD.decode(signature)?;
        if sig.is_empty() {
            return Err(JwsError::Format);
        }
        Ok(Self {
            protected: protected.to_string(),
            payload: payload.to_string(),
            signature: signature.to_string(),
        })
    }

    /// The compact serialization
    pub fn compact(&self) -> String {
        format!("{}.{}.{}", self.protected, self.payload, self.signature)
    }

    /// Raw signature bytes
    pub fn signature_bytes(&self) -> Result<Vec<u8>, JwsError> {
        Ok(URL_SAFE_NO_PAD.decode(&self.signature)?)
    }

    /// Decode the payload segment
    pub fn decoded_payload(&self) -> Result<Vec<u8>, JwsError> {
        Ok(URL_SAFE_NO_PAD.decode(&self.payload)?)
    }

    /// Deserialize the payload as JSON
    pub fn payload_json<T: DeserializeOwned>(&self) -> Result<T, JwsError> {
        Ok(serde_json::from_slice(&self.decoded_payload()?)?)
    }

    /// Verify the signature against the account key
    ///
    /// The header's `alg` must be RS256 and the signature must cover the
    /// signing input `protected.payload`.
    pub fn verify(&self, key: &Jwk) -> Result<(), JwsError> {
        let header: JwsHeader = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(&self.protected)?)?;
        if header.alg != "RS256" {
            return Err(JwsError::UnsupportedAlgorithm(header.alg));
        }

        let verifying_key = VerifyingKey::<Sha256>::new(key.rsa_public_key()?);
        let signature = Signature::try_from(self.signature_bytes()?.as_slice())
            .map_err(|_| JwsError::BadSignature)?;
        let signing_input = format!("{}.{}", self.protected, self.payload);

        verifying_key
            .verify(signing_input.as_bytes(), &signature)
            .map_err(|_| JwsError::BadSignature)
    }
}

impl TryFrom<String> for Jws {
    type Error = JwsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Jws::parse_compact(&value)
    }
}

impl From<Jws> for String {
    fn from(value: Jws) -> Self {
        value.compact()
    }
}
