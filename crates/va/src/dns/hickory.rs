//! Production resolver backed by hickory-dns
//!
//! Queries go to explicitly configured nameservers (or the platform
//! defaults) over UDP with caching disabled: a validation must observe
//! the zone as it is now, not as it was. Every lookup carries the
//! configured deadline on top of hickory's own per-attempt timeout.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::rr::rdata::caa::{Property, Value};
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::{Resolver, TokioResolver};
use tracing::trace;

use super::{CaaRecord, DnsError, DnsResolver};

/// Hickory-backed [`DnsResolver`] implementation
#[derive(Debug)]
pub struct HickoryResolver {
    resolver: TokioResolver,
    timeout: Duration,
}

impl HickoryResolver {
    /// Build a resolver against the given nameservers
    ///
    /// An empty nameserver list falls back to the defaults hickory ships
    /// with. `timeout` bounds each query issued through the trait.
    pub fn new(nameservers: &[IpAddr], timeout: Duration) -> Self {
        let resolver_config = if nameservers.is_empty() {
            ResolverConfig::default()
        } else {
            let mut config = ResolverConfig::new();
            for ip in nameservers {
                config.add_name_server(NameServerConfig::new(
                    SocketAddr::new(*ip, 53),
                    Protocol::Udp,
                ));
            }
            config
        };

        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 2;
        opts.cache_size = 0;

        let resolver =
            Resolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
                .with_options(opts)
                .build();

        Self { resolver, timeout }
    }

    async fn with_deadline<T, F>(&self, name: &str, query: F) -> Result<T, DnsError>
    where
        F: Future<Output = Result<T, DnsError>>,
    {
        match tokio::time::timeout(self.timeout, query).await {
            Ok(result) => result,
            Err(_) => Err(DnsError::Timeout {
                name: name.to_string(),
                timeout: self.timeout,
            }),
        }
    }

    /// Fetch all records of one type, mapped through `extract`
    async fn lookup_rdata<T>(
        &self,
        name: &str,
        record_type: RecordType,
        extract: fn(&RData) -> Option<T>,
    ) -> Result<Vec<T>, DnsError> {
        match self.resolver.lookup(name, record_type).await {
            Ok(lookup) => Ok(lookup.iter().filter_map(extract).collect()),
            Err(e) => empty_on_missing(name, e),
        }
    }
}

#[async_trait]
impl DnsResolver for HickoryResolver {
    async fn lookup_host(&self, name: &str) -> Result<Vec<Ipv4Addr>, DnsError> {
        self.with_deadline(name, async {
            match self.resolver.ipv4_lookup(name).await {
                Ok(lookup) => Ok(lookup.iter().map(|a| a.0).collect()),
                Err(e) => empty_on_missing(name, e),
            }
        })
        .await
    }

    async fn lookup_cname(&self, name: &str) -> Result<Option<String>, DnsError> {
        let targets = self
            .with_deadline(name, self.lookup_rdata(name, RecordType::CNAME, |rdata| {
                match rdata {
                    RData::CNAME(target) => Some(trim_root(&target.0.to_utf8())),
                    _ => None,
                }
            }))
            .await?;
        Ok(targets.into_iter().next())
    }

    async fn lookup_dname(&self, name: &str) -> Result<Option<String>, DnsError> {
        let targets = self
            .with_deadline(name, self.lookup_rdata(name, RecordType::DNAME, |rdata| {
                match rdata {
                    RData::DNAME(target) => Some(trim_root(&target.0.to_utf8())),
                    _ => None,
                }
            }))
            .await?;
        Ok(targets.into_iter().next())
    }

    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, DnsError> {
        self.with_deadline(name, async {
            match self.resolver.txt_lookup(name).await {
                Ok(records) => Ok(records
                    .iter()
                    .map(|txt| {
                        txt.txt_data()
                            .iter()
                            .map(|data| String::from_utf8_lossy(data))
                            .collect::<String>()
                    })
                    .collect()),
                Err(e) => empty_on_missing(name, e),
            }
        })
        .await
    }

    async fn lookup_caa(&self, name: &str) -> Result<Vec<CaaRecord>, DnsError> {
        let records = self
            .with_deadline(name, self.lookup_rdata(name, RecordType::CAA, |rdata| {
                match rdata {
                    RData::CAA(caa) => Some(CaaRecord::new(
                        caa.issuer_critical(),
                        tag_string(caa.tag()),
                        value_string(caa.value()),
                    )),
                    _ => None,
                }
            }))
            .await?;
        trace!(name, count = records.len(), "CAA lookup complete");
        Ok(records)
    }
}

/// Map "the record does not exist" onto an empty answer
///
/// Hickory reports NXDOMAIN and empty answers as errors; the resolver
/// interface treats both as ordinary empty results and reserves errors
/// for SERVFAIL-class failures.
fn empty_on_missing<T, E: std::fmt::Display>(name: &str, error: E) -> Result<Vec<T>, DnsError> {
    let message = error.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("no records found")
        || lowered.contains("no record found")
        || lowered.contains("nxdomain")
    {
        Ok(Vec::new())
    } else {
        Err(DnsError::servfail(name, message))
    }
}

fn trim_root(name: &str) -> String {
    name.trim_end_matches('.').to_string()
}

fn tag_string(tag: &Property) -> String {
    tag.as_str().to_string()
}

/// Render a CAA value the way it appears in zone files
fn value_string(value: &Value) -> String {
    match value {
        Value::Issuer(None, params) if params.is_empty() => ";".to_string(),
        Value::Issuer(name, params) => {
            let mut rendered = name
                .as_ref()
                .map(|n| trim_root(&n.to_utf8()))
                .unwrap_or_default();
            for param in params {
                rendered.push_str("; ");
                rendered.push_str(param.key());
                rendered.push('=');
                rendered.push_str(param.value());
            }
            rendered
        }
        Value::Url(url) => url.to_string(),
        Value::Unknown(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    }
}
