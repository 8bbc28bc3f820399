//! The DVSNI challenge prover
//!
//! Control is proven inside the TLS handshake itself: the VA derives a
//! name from the challenge's validation signature, offers it as SNI, and
//! requires the presented certificate to list that name. No application
//! data is exchanged.

use std::net::{IpAddr, Ipv4Addr};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::authority::ValidationAuthority;
use crate::challenge::{fail, succeed};
use crate::http::HOP_TIMEOUT;
use crate::problem::ProblemDetails;
use crate::tls;
use crate::types::{Challenge, Identifier};

/// Suffix of every derived DVSNI name.
pub const DVSNI_SUFFIX: &str = "acme.invalid";

/// Derive the SNI name from the validation signature's raw bytes
///
/// The signature is base64url-encoded, that encoding is SHA-256 hashed,
/// and the hex digest is split into two 32-character labels under
/// `acme.invalid`.
pub fn dvsni_name(signature: &[u8]) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(signature);
    let digest = hex::encode(Sha256::digest(encoded.as_bytes()));
    format!("{}.{}.{}", &digest[..32], &digest[32..], DVSNI_SUFFIX)
}

enum HandshakeError {
    Connect(String),
    Tls(String),
}

impl ValidationAuthority {
    /// Validate a DVSNI challenge against its identifier
    pub async fn validate_dvsni(
        &self,
        identifier: &Identifier,
        challenge: Challenge,
    ) -> Challenge {
        if !identifier.is_dns() {
            return fail(
                challenge,
                ProblemDetails::malformed("identifier type for DVSNI challenge was not DNS"),
            );
        }
        if !challenge.token_is_sane() {
            return fail(
                challenge,
                ProblemDetails::malformed("challenge token is not sane"),
            );
        }
        let signature = match challenge
            .validation
            .as_ref()
            .map(|validation| validation.signature_bytes())
        {
            Some(Ok(signature)) if !signature.is_empty() => signature,
            _ => {
                return fail(
                    challenge,
                    ProblemDetails::malformed("challenge has no usable validation signature"),
                )
            }
        };
        let port = self.config.ports.dvsni_port;
        if port == 0 {
            return fail(
                challenge,
                ProblemDetails::malformed("no port configured for DVSNI challenge"),
            );
        }

        let z_name = dvsni_name(&signature);

        self.log.audit(format!(
            "Attempting to validate DVSNI for {}",
            identifier.value
        ));

        let addresses = match self.resolver.lookup_host(&identifier.value).await {
            Ok(addresses) => addresses,
            Err(e) => return fail(challenge, ProblemDetails::connection(e.to_string())),
        };
        if addresses.is_empty() {
            self.log
                .info(format!("No IPv4 addresses found for {}", identifier.value));
            return fail(
                challenge,
                ProblemDetails::unknown_host(format!(
                    "no IPv4 addresses found for {}",
                    identifier.value
                )),
            );
        }
        let address = addresses[0];
        self.log.info(format!(
            "Resolved addresses for {} [using {}]: {:?}",
            identifier.value, address, addresses
        ));

        let handshake = handshake_for_names(address, port, &z_name);
        let dns_names = match tokio::time::timeout(HOP_TIMEOUT, handshake).await {
            Err(_) => {
                return fail(
                    challenge,
                    ProblemDetails::connection(format!(
                        "DVSNI handshake with {} timed out after {:?}",
                        identifier.value, HOP_TIMEOUT
                    )),
                )
            }
            Ok(Err(HandshakeError::Connect(detail))) => {
                return fail(challenge, ProblemDetails::connection(detail))
            }
            Ok(Err(HandshakeError::Tls(detail))) => {
                return fail(challenge, ProblemDetails::tls(detail))
            }
            Ok(Ok(names)) => names,
        };

        if dns_names
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&z_name))
        {
            succeed(challenge)
        } else {
            fail(
                challenge,
                ProblemDetails::unauthorized(format!(
                    "correct name not found in TLS certificate presented by {}",
                    identifier.value
                )),
            )
        }
    }
}

/// Dial, handshake with SNI set to the derived name, and read the leaf
/// certificate's DNS names
async fn handshake_for_names(
    address: Ipv4Addr,
    port: u16,
    z_name: &str,
) -> Result<Vec<String>, HandshakeError> {
    let stream = TcpStream::connect((IpAddr::V4(address), port))
        .await
        .map_err(|e| HandshakeError::Connect(format!("dialing {address}:{port}: {e}")))?;

    let client_config =
        tls::challenge_client_config().map_err(|e| HandshakeError::Tls(e.to_string()))?;
    let server_name = rustls::pki_types::ServerName::try_from(z_name.to_string())
        .map_err(|_| HandshakeError::Tls(format!("derived name {z_name:?} is not a valid SNI")))?;

    let tls_stream = TlsConnector::from(client_config)
        .connect(server_name, stream)
        .await
        .map_err(|e| HandshakeError::Tls(format!("handshake failed: {e}")))?;

    let (_, session) = tls_stream.get_ref();
    let leaf = session
        .peer_certificates()
        .and_then(|certificates| certificates.first())
        .ok_or_else(|| HandshakeError::Tls("server presented no certificate".to_string()))?;

    tls::leaf_dns_names(leaf.as_ref()).map_err(|e| HandshakeError::Tls(e.to_string()))
}
