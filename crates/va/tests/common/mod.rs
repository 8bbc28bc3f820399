//! Shared fixtures for validation authority tests: a mock resolver with
//! canned zones, a mock registration authority, signed test payloads, and
//! minimal challenge servers.

#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use parking_lot::Mutex;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use sha2::Sha256;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_rustls::TlsAcceptor;

use perimeter_config::{PortConfig, VaConfig};
use perimeter_va::authority::RaError;
use perimeter_va::jws::{Jwk, Jws};
use perimeter_va::{
    Authorization, CaaRecord, Challenge, DnsError, DnsResolver, Identifier, RegistrationAuthority,
    ValidationAuthority,
};

/// Token published at `_acme-challenge.good.bin.coffee` in the mock zones.
pub const GOOD_TOKEN: &str = "yfCBb-bRTLz8Wd1C0lTUQK3qlKj3-t2tYGwx5Hj7r_w";

/// A 43-character token built from one repeated character
pub fn token_of(fill: char) -> String {
    fill.to_string().repeat(43)
}

// ============================================================================
// Mock DNS
// ============================================================================

/// Resolver with canned zones
///
/// Everything resolves to 127.0.0.1 except the names below; the CAA tree
/// covers present/absent/critical policies behind CNAME and DNAME chains,
/// alias loops, and a zone whose server always fails.
pub struct MockDnsResolver;

fn servfail(name: &str) -> DnsError {
    DnsError::servfail(name, "SERVFAIL")
}

#[async_trait]
impl DnsResolver for MockDnsResolver {
    async fn lookup_host(&self, name: &str) -> Result<Vec<Ipv4Addr>, DnsError> {
        match name {
            "always.invalid" | "invalid.invalid" => Ok(Vec::new()),
            "servfail.com" => Err(servfail(name)),
            _ => Ok(vec![Ipv4Addr::LOCALHOST]),
        }
    }

    async fn lookup_cname(&self, name: &str) -> Result<Option<String>, DnsError> {
        let target = match name {
            "cname-absent.com" => "absent.com",
            "cname-critical.com" => "critical.com",
            "cname-present.com" => "present.com",
            "cname2-present.com" => "cname-present.com",
            "cname-nx.com" => "nonexistent.com",
            "www.caa-loop.com" => "a.cname-loop.com",
            "a.cname-loop.com" => "b.cname-loop.com",
            "b.cname-loop.com" => "a.cname-loop.com",
            "cname-servfail.com" => "servfail.com",
            "cname2servfail.com" => "cname-servfail.com",
            "cname-and-dname.com" => "somewhere.com",
            "servfail.com" => return Err(servfail(name)),
            _ => return Ok(None),
        };
        Ok(Some(target.to_string()))
    }

    async fn lookup_dname(&self, name: &str) -> Result<Option<String>, DnsError> {
        let target = match name {
            "dname-present.com" => "present.com",
            "dname2cname.com" => "cname-present.com",
            "a.dname-loop.com" => "b.dname-loop.com",
            "b.dname-loop.com" => "a.dname-loop.com",
            "dname-servfail.com" => "servfail.com",
            "cname-and-dname.com" => "elsewhere.com",
            "servfail.com" => return Err(servfail(name)),
            _ => return Ok(None),
        };
        Ok(Some(target.to_string()))
    }

    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, DnsError> {
        if name.ends_with("servfail.com") {
            return Err(servfail(name));
        }
        match name {
            "_acme-challenge.good.bin.coffee" => Ok(vec![GOOD_TOKEN.to_string()]),
            "_acme-challenge.wrong.bin.coffee" => Ok(vec![token_of('x')]),
            _ => Ok(Vec::new()),
        }
    }

    async fn lookup_caa(&self, name: &str) -> Result<Vec<CaaRecord>, DnsError> {
        let records = match name {
            "reserved.com" => vec![CaaRecord::new(false, "issue", ";")],
            "critical.com" => vec![CaaRecord::new(true, "tbs", "Unknown")],
            "present.com" => vec![CaaRecord::new(false, "issue", "letsencrypt.org")],
            "wild.com" => vec![
                CaaRecord::new(false, "issue", "letsencrypt.org"),
                CaaRecord::new(false, "issuewild", ";"),
            ],
            "iodef-only.com" => vec![CaaRecord::new(
                false,
                "iodef",
                "mailto:security@example.com",
            )],
            "servfail.com" => return Err(servfail(name)),
            _ => Vec::new(),
        };
        Ok(records)
    }
}

// ============================================================================
// Mock RA
// ============================================================================

/// Registration authority that records every callback
#[derive(Default)]
pub struct MockRegistrationAuthority {
    pub last: Mutex<Option<Authorization>>,
    pub calls: AtomicUsize,
    pub notify: Notify,
}

impl MockRegistrationAuthority {
    pub fn last_authorization(&self) -> Option<Authorization> {
        self.last.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Wait for the next callback, bounded
    pub async fn wait_for_update(&self, limit: Duration) {
        tokio::time::timeout(limit, self.notify.notified())
            .await
            .expect("timed out waiting for the RA callback");
    }
}

#[async_trait]
impl RegistrationAuthority for MockRegistrationAuthority {
    async fn on_validation_update(&self, authorization: Authorization) -> Result<(), RaError> {
        *self.last.lock() = Some(authorization);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_one();
        Ok(())
    }
}

/// A validation authority wired to the mock resolver and a fresh mock RA
pub fn test_va(config: VaConfig) -> (ValidationAuthority, Arc<MockRegistrationAuthority>) {
    let ra = Arc::new(MockRegistrationAuthority::default());
    let va = ValidationAuthority::new(config, Arc::new(MockDnsResolver), ra.clone());
    (va, ra)
}

/// Config with every challenge port unconfigured
pub fn config_without_ports() -> VaConfig {
    VaConfig {
        ports: PortConfig::none(),
        ..VaConfig::default()
    }
}

/// One-challenge authorization for the given identifier
pub fn authorization_for(identifier: Identifier, challenges: Vec<Challenge>) -> Authorization {
    Authorization {
        id: token_of('z'),
        registration_id: 1,
        identifier,
        challenges,
    }
}

// ============================================================================
// Account keys and signed payloads
// ============================================================================

/// An RSA account key that signs challenge payloads
pub struct TestAccountKey {
    key: RsaPrivateKey,
}

impl TestAccountKey {
    fn generate() -> Self {
        Self {
            key: RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("generate RSA key"),
        }
    }

    /// The key every test challenge is signed with
    pub fn shared() -> &'static TestAccountKey {
        static KEY: OnceLock<TestAccountKey> = OnceLock::new();
        KEY.get_or_init(TestAccountKey::generate)
    }

    /// A different key, for signature-mismatch cases
    pub fn alternate() -> &'static TestAccountKey {
        static KEY: OnceLock<TestAccountKey> = OnceLock::new();
        KEY.get_or_init(TestAccountKey::generate)
    }

    pub fn jwk(&self) -> Jwk {
        let public = self.key.to_public_key();
        Jwk {
            kty: "RSA".to_string(),
            n: URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
        }
    }

    /// Sign a JSON payload into a compact JWS string
    pub fn sign_json(&self, payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
        let signing_input = format!("{header}.{body}");
        let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(self.key.clone());
        let signature = signing_key.sign(signing_input.as_bytes());
        format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        )
    }

    /// The JWS a simpleHttp challenge server must publish
    pub fn simple_http_body(&self, token: &str, tls: bool) -> String {
        self.sign_json(&serde_json::json!({
            "type": "simpleHttp",
            "token": token,
            "tls": tls,
        }))
    }

    /// The detached validation signature carried by dvsni/dns challenges
    pub fn validation_jws(&self, challenge_type: &str, token: &str) -> Jws {
        let compact = self.sign_json(&serde_json::json!({
            "type": challenge_type,
            "token": token,
        }));
        Jws::parse_compact(&compact).expect("compact JWS round-trip")
    }
}

// ============================================================================
// Challenge servers
// ============================================================================

fn tls_server_config(san: &str) -> rustls::ServerConfig {
    let key = rcgen::KeyPair::generate().expect("generate certificate key");
    let params = rcgen::CertificateParams::new(vec![san.to_string()]).expect("params");
    let cert = params.self_signed(&key).expect("self-signed certificate");

    let certs = vec![cert.der().clone()];
    let key_der = rustls::pki_types::PrivateKeyDer::Pkcs8(key.serialize_der().into());
    rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key_der)
        .expect("server config")
}

/// TLS server presenting a certificate for `san`
///
/// Completes handshakes and, when a body is given, answers one HTTP GET
/// per connection. Returns the bound port.
pub async fn spawn_tls_server(san: &str, body: Option<String>) -> u16 {
    let config = Arc::new(tls_server_config(san));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let acceptor = TlsAcceptor::from(config);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            let body = body.clone();
            tokio::spawn(async move {
                let Ok(mut tls) = acceptor.accept(stream).await else {
                    return;
                };
                if let Some(body) = body {
                    let mut request = vec![0u8; 4096];
                    let _ = tls.read(&mut request).await;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = tls.write_all(response.as_bytes()).await;
                }
                let _ = tls.shutdown().await;
            });
        }
    });

    port
}

/// TCP server that accepts connections and never speaks
///
/// Stands in for a challenge host that stalls the handshake.
pub async fn spawn_silent_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    port
}

/// TCP server that answers every connection with bytes that are not TLS
pub async fn spawn_garbage_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let _ = stream.write_all(b"this is not a TLS handshake").await;
            let _ = stream.shutdown().await;
        }
    });
    port
}

/// A TCP port with nothing listening on it
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    listener.local_addr().expect("local addr").port()
}
