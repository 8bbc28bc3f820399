//! TLS client plumbing for challenge connections
//!
//! Challenge servers present self-signed certificates as a matter of
//! protocol, so chain verification is deliberately disabled here — the
//! proof of control is the certificate *content* (DVSNI) or the signed
//! payload it transports (HTTPS fetch), never the chain. Handshake
//! mechanics, SNI, and signature checks inside the handshake all remain
//! active.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{aws_lc_rs, verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use thiserror::Error;
use x509_parser::prelude::{FromDer, GeneralName, X509Certificate};

/// Errors from inspecting a presented certificate
#[derive(Debug, Error)]
pub enum CertInspectError {
    #[error("presented certificate could not be parsed: {0}")]
    Parse(String),
}

/// Client config for challenge connections: full handshake, no chain check
pub(crate) fn challenge_client_config() -> Result<Arc<ClientConfig>, rustls::Error> {
    let provider = Arc::new(aws_lc_rs::default_provider());
    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
        .with_no_client_auth();
    Ok(Arc::new(config))
}

/// DNS names in the certificate's subjectAltName extension
pub(crate) fn leaf_dns_names(der: &[u8]) -> Result<Vec<String>, CertInspectError> {
    let (_, certificate) =
        X509Certificate::from_der(der).map_err(|e| CertInspectError::Parse(e.to_string()))?;

    let san = certificate
        .subject_alternative_name()
        .map_err(|e| CertInspectError::Parse(e.to_string()))?;

    let mut names = Vec::new();
    if let Some(extension) = san {
        for general_name in &extension.value.general_names {
            if let GeneralName::DNSName(name) = general_name {
                names.push((*name).to_string());
            }
        }
    }
    Ok(names)
}

/// Accepts any server certificate; handshake signatures are still checked
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
