//! Safe HTTP fetcher for challenge validation
//!
//! A challenge fetch cannot be handed to an off-the-shelf HTTP client:
//! the standard redirect follower re-resolves hostnames at connect time,
//! which lets a DNS rebinding attacker answer the lookup with one address
//! and the connection with another. This fetcher resolves each hop's
//! hostname exactly once, dials the resolved address itself, and keeps the
//! original hostname in the Host header and SNI. Redirects are followed
//! explicitly, with scheme and port policing, a hop cap, and a
//! [`ValidationRecord`] appended per hop.

use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use hyper::header;
use hyper::{Body, Request, StatusCode};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;
use url::Url;

use perimeter_common::ValidationLog;
use perimeter_config::VaConfig;

use crate::dns::{DnsError, DnsResolver};
use crate::problem::ProblemDetails;
use crate::tls;
use crate::types::ValidationRecord;

/// Deadline covering one hop: connect, handshake, request, and body read.
pub(crate) const HOP_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = "perimeter-va/0.3";

/// Failures from the fetcher, classified at the transport layer
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("no IPv4 addresses found for {host}")]
    UnknownHost { host: String },

    #[error(transparent)]
    Dns(#[from] DnsError),

    #[error("connection failure: {0}")]
    Connect(String),

    #[error("TLS failure: {0}")]
    Tls(String),

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("too many redirects (limit {limit})")]
    TooManyRedirects { limit: usize },

    #[error("redirect to {url} uses port {port}, expected {expected}")]
    PortMismatch {
        url: String,
        port: u16,
        expected: u16,
    },

    #[error("unsupported URL scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("unauthorized response ({status})")]
    Unauthorized { status: u16, detail: String },
}

impl FetchError {
    /// Translate into the public taxonomy
    pub fn problem(&self) -> ProblemDetails {
        match self {
            FetchError::Malformed(_) | FetchError::UnsupportedScheme(_) => {
                ProblemDetails::malformed(self.to_string())
            }
            FetchError::UnknownHost { .. } => ProblemDetails::unknown_host(self.to_string()),
            FetchError::Dns(_)
            | FetchError::Connect(_)
            | FetchError::Timeout { .. }
            | FetchError::TooManyRedirects { .. }
            | FetchError::PortMismatch { .. } => ProblemDetails::connection(self.to_string()),
            FetchError::Tls(_) => ProblemDetails::tls(self.to_string()),
            FetchError::Unauthorized { status, detail } => {
                ProblemDetails::unauthorized(format!("{status} response: {detail}"))
            }
        }
    }
}

enum HopOutcome {
    Body(Vec<u8>),
    Redirect(Url),
}

/// The fetcher: resolver-pinned GET with explicit redirect handling
pub struct HttpFetcher {
    resolver: Arc<dyn DnsResolver>,
    config: Arc<VaConfig>,
    log: Arc<ValidationLog>,
}

impl HttpFetcher {
    pub fn new(
        resolver: Arc<dyn DnsResolver>,
        config: Arc<VaConfig>,
        log: Arc<ValidationLog>,
    ) -> Self {
        Self {
            resolver,
            config,
            log,
        }
    }

    /// Fetch a challenge URL, following redirects
    ///
    /// The hop records are returned in both outcomes: a failed validation
    /// keeps the trail of everything it contacted.
    pub async fn fetch(&self, url: &str) -> (Vec<ValidationRecord>, Result<Vec<u8>, FetchError>) {
        let mut records = Vec::new();

        let mut current = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                return (
                    records,
                    Err(FetchError::Malformed(format!("could not parse {url:?}: {e}"))),
                )
            }
        };

        // One initial request plus up to max_redirects followed hops. A
        // chain that revisits a URL keeps redirecting until the cap trips.
        for _ in 0..=self.config.max_redirects {
            match self.fetch_hop(&mut records, &current).await {
                Ok(HopOutcome::Body(body)) => return (records, Ok(body)),
                Ok(HopOutcome::Redirect(next)) => {
                    self.log.info(format!(
                        "redirect from {:?} to {:?}",
                        current.as_str(),
                        next.as_str()
                    ));
                    current = next;
                }
                Err(e) => return (records, Err(e)),
            }
        }

        (
            records,
            Err(FetchError::TooManyRedirects {
                limit: self.config.max_redirects,
            }),
        )
    }

    /// Resolve, dial, and issue one GET under the hop deadline
    async fn fetch_hop(
        &self,
        records: &mut Vec<ValidationRecord>,
        url: &Url,
    ) -> Result<HopOutcome, FetchError> {
        let use_tls = match url.scheme() {
            "http" => false,
            "https" => true,
            other => return Err(FetchError::UnsupportedScheme(other.to_string())),
        };

        let host = url
            .host_str()
            .ok_or_else(|| FetchError::Malformed(format!("no hostname in {url}")))?
            .to_string();
        if host.parse::<IpAddr>().is_ok() {
            return Err(FetchError::Malformed(format!(
                "hostname {host} is an IP address literal"
            )));
        }

        let configured_port = if use_tls {
            self.config.ports.simple_https_port
        } else {
            self.config.ports.simple_http_port
        };
        if configured_port == 0 {
            return Err(FetchError::Malformed(format!(
                "no port configured for scheme {:?}",
                url.scheme()
            )));
        }
        // An explicit port in the URL must be the configured challenge
        // port for its scheme; the scheme default is substituted when the
        // URL carries none.
        let port = match url.port() {
            Some(explicit) if explicit != configured_port => {
                return Err(FetchError::PortMismatch {
                    url: url.to_string(),
                    port: explicit,
                    expected: configured_port,
                })
            }
            Some(explicit) => explicit,
            None => configured_port,
        };

        let addresses = self.resolver.lookup_host(&host).await?;
        if addresses.is_empty() {
            self.log.info(format!("No IPv4 addresses found for {host}"));
            return Err(FetchError::UnknownHost { host });
        }
        let address = addresses[0];
        self.log.info(format!(
            "Resolved addresses for {host} [using {address}]: {addresses:?}"
        ));

        records.push(ValidationRecord {
            url: url.to_string(),
            hostname: host.clone(),
            port,
            addresses_resolved: addresses,
            address_used: address,
        });

        match tokio::time::timeout(
            HOP_TIMEOUT,
            self.request_hop(&host, address, port, url, use_tls),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                timeout: HOP_TIMEOUT,
            }),
        }
    }

    async fn request_hop(
        &self,
        host: &str,
        address: Ipv4Addr,
        port: u16,
        url: &Url,
        use_tls: bool,
    ) -> Result<HopOutcome, FetchError> {
        debug!(%host, %address, port, tls = use_tls, "dialing challenge host");

        // The connection goes to the pinned address; the name travels in
        // the Host header and SNI only.
        let stream = TcpStream::connect((IpAddr::V4(address), port))
            .await
            .map_err(|e| FetchError::Connect(format!("dialing {address}:{port}: {e}")))?;

        let default_port = if use_tls { 443 } else { 80 };
        let host_header = if port == default_port {
            host.to_string()
        } else {
            format!("{host}:{port}")
        };

        if use_tls {
            let client_config =
                tls::challenge_client_config().map_err(|e| FetchError::Tls(e.to_string()))?;
            let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
                .map_err(|_| FetchError::Malformed(format!("{host:?} is not a valid SNI name")))?;
            let tls_stream = TlsConnector::from(client_config)
                .connect(server_name, stream)
                .await
                .map_err(|e| FetchError::Tls(format!("handshake with {host}: {e}")))?;
            self.send_request(tls_stream, &host_header, url).await
        } else {
            self.send_request(stream, &host_header, url).await
        }
    }

    async fn send_request<S>(
        &self,
        stream: S,
        host_header: &str,
        url: &Url,
    ) -> Result<HopOutcome, FetchError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sender, connection) = hyper::client::conn::handshake(stream)
            .await
            .map_err(|e| FetchError::Connect(e.to_string()))?;
        tokio::spawn(async move {
            let _ = connection.await;
        });

        let path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        let request = Request::get(path)
            .header(header::HOST, host_header)
            .header(header::USER_AGENT, USER_AGENT)
            .body(Body::empty())
            .map_err(|e| FetchError::Malformed(e.to_string()))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| FetchError::Connect(e.to_string()))?;

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(header::LOCATION)
                .ok_or_else(|| FetchError::Connect(format!("{status} without a Location header")))?
                .to_str()
                .map_err(|_| FetchError::Connect("Location header is not valid text".into()))?;
            let next = url
                .join(location)
                .map_err(|e| FetchError::Connect(format!("bad Location {location:?}: {e}")))?;
            return Ok(HopOutcome::Redirect(next));
        }

        let body = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(|e| FetchError::Connect(e.to_string()))?;

        if status.is_success() {
            return Ok(HopOutcome::Body(body.to_vec()));
        }

        let detail = if status == StatusCode::NOT_FOUND {
            format!("challenge file not found at {url}")
        } else {
            String::from_utf8_lossy(&body).into_owned()
        };
        Err(FetchError::Unauthorized {
            status: status.as_u16(),
            detail,
        })
    }
}
