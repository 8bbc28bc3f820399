//! CAA policy checking
//!
//! Before issuing for a name, the CA must find the CAA RRset closest to
//! it and check that the set authorizes this CA. The climb starts at the
//! leaf and walks ancestor by ancestor toward the root; at each node,
//! CNAME/DNAME aliases are chased (bounded, loop-checked) before the CAA
//! query. The first node with any CAA records decides — policy from a
//! farther ancestor never overrides a nearer one.

use std::collections::HashSet;

use thiserror::Error;
use tracing::debug;

use crate::authority::ValidationAuthority;
use crate::dns::{CaaRecord, DnsError};
use crate::types::Identifier;

/// Cap on alias hops chased per node.
const MAX_ALIAS_HOPS: usize = 8;

/// Errors that abort a CAA check
///
/// Any of these means issuance cannot proceed: the tree could not be
/// examined, so neither presence nor permission is known.
#[derive(Debug, Error)]
pub enum CaaError {
    #[error("alias loop detected at {name}")]
    AliasLoop { name: String },

    #[error("more than {MAX_ALIAS_HOPS} aliases while resolving {name}")]
    TooManyAliases { name: String },

    #[error("{name} has both CNAME and DNAME records")]
    AliasConflict { name: String },

    #[error(transparent)]
    Dns(#[from] DnsError),
}

/// Outcome of a CAA check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaaCheckResult {
    /// Whether any CAA RRset was found in the climb.
    pub present: bool,
    /// Whether policy permits this CA to issue.
    pub valid: bool,
}

/// A parsed CAA RRset, grouped by tag
#[derive(Debug, Default)]
struct CaaSet {
    issue: Vec<CaaRecord>,
    issuewild: Vec<CaaRecord>,
    unknown: Vec<CaaRecord>,
}

impl CaaSet {
    fn from_records(records: Vec<CaaRecord>) -> Self {
        let mut set = CaaSet::default();
        for record in records {
            match record.tag.to_ascii_lowercase().as_str() {
                "issue" => set.issue.push(record),
                "issuewild" => set.issuewild.push(record),
                // iodef names a reporting endpoint; it carries no
                // issuance restriction.
                "iodef" => {}
                _ => set.unknown.push(record),
            }
        }
        set
    }

    /// An unrecognized tag with the critical flag forbids issuance
    fn has_critical_unknown(&self) -> bool {
        self.unknown.iter().any(|record| record.issuer_critical)
    }

    /// Records that constrain the requested name
    ///
    /// Wildcard requests are governed by issuewild when any exist, and by
    /// issue otherwise; base names by issue alone.
    fn relevant(&self, wildcard: bool) -> &[CaaRecord] {
        if wildcard && !self.issuewild.is_empty() {
            &self.issuewild
        } else {
            &self.issue
        }
    }
}

/// Whether a CAA issue/issuewild value names the given issuer domain
///
/// The value's domain part ends at the first `;` (parameters follow);
/// comparison is case-insensitive. An empty domain part — the `";"`
/// reserve-everything form — matches no issuer.
fn issuer_domain_matches(value: &str, issuer_domain: &str) -> bool {
    let domain = value.split(';').next().unwrap_or("").trim();
    !domain.is_empty() && !issuer_domain.is_empty() && domain.eq_ignore_ascii_case(issuer_domain)
}

impl ValidationAuthority {
    /// Check CAA policy for an identifier
    ///
    /// Returns which of the identifier's ancestors published CAA (if any)
    /// and whether the configured issuer domain is authorized. Resolver
    /// failures abort the check.
    pub async fn check_caa_records(
        &self,
        identifier: &Identifier,
    ) -> Result<CaaCheckResult, CaaError> {
        let name = identifier.value.trim_end_matches('.');
        let wildcard = name.starts_with("*.");
        let base_name = name.strip_prefix("*.").unwrap_or(name);

        let set = match self.closest_caa_set(base_name).await? {
            None => {
                // No CAA anywhere in the tree: issuance is permitted.
                return Ok(CaaCheckResult {
                    present: false,
                    valid: true,
                });
            }
            Some(set) => set,
        };

        let mut valid = true;
        if set.has_critical_unknown() {
            valid = false;
        }
        let relevant = set.relevant(wildcard);
        if !relevant.is_empty()
            && !relevant
                .iter()
                .any(|record| issuer_domain_matches(&record.value, &self.config.issuer_domain))
        {
            valid = false;
        }

        debug!(name, wildcard, valid, "CAA policy evaluated");
        Ok(CaaCheckResult {
            present: true,
            valid,
        })
    }

    /// Find the nearest ancestor's CAA RRset, chasing aliases per node
    async fn closest_caa_set(&self, name: &str) -> Result<Option<CaaSet>, CaaError> {
        let labels: Vec<&str> = name.split('.').filter(|label| !label.is_empty()).collect();

        for start in 0..labels.len() {
            let ancestor = labels[start..].join(".");
            let target = self.chase_aliases(&ancestor).await?;
            let records = self.resolver.lookup_caa(&target).await?;
            if !records.is_empty() {
                debug!(%ancestor, %target, count = records.len(), "found CAA RRset");
                return Ok(Some(CaaSet::from_records(records)));
            }
        }
        Ok(None)
    }

    /// Follow CNAME/DNAME from a name to its canonical target
    async fn chase_aliases(&self, name: &str) -> Result<String, CaaError> {
        let mut current = name.to_string();
        let mut visited = HashSet::new();
        visited.insert(current.clone());

        for _ in 0..MAX_ALIAS_HOPS {
            let cname = self.resolver.lookup_cname(&current).await?;
            let dname = self.resolver.lookup_dname(&current).await?;

            let next = match (cname, dname) {
                (Some(_), Some(_)) => return Err(CaaError::AliasConflict { name: current }),
                (Some(target), None) | (None, Some(target)) => {
                    target.trim_end_matches('.').to_string()
                }
                (None, None) => return Ok(current),
            };

            if !visited.insert(next.clone()) {
                return Err(CaaError::AliasLoop { name: next });
            }
            current = next;
        }

        Err(CaaError::TooManyAliases {
            name: name.to_string(),
        })
    }
}
