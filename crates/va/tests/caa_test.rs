//! CAA checker tests: the climb, alias chasing, and policy evaluation
//!
//! The canned zones model a CAA tree with present, absent, and
//! critical-unknown policies reachable directly, through CNAME/DNAME
//! chains, from nonexistent children, and behind failing servers.

mod common;

use perimeter_config::VaConfig;
use perimeter_va::{CaaError, Identifier};

use common::test_va;

fn caa_config() -> VaConfig {
    VaConfig {
        issuer_domain: "letsencrypt.org".to_string(),
        ..VaConfig::default()
    }
}

#[tokio::test]
async fn policy_table() {
    // (domain, present, valid)
    let cases = [
        // Reserved: an issue record that names no CA.
        ("reserved.com", true, false),
        // Critical flag on a tag the checker does not understand.
        ("critical.com", true, false),
        ("nx.critical.com", true, false),
        ("cname-critical.com", true, false),
        ("nx.cname-critical.com", true, false),
        // Absent: no CAA anywhere in the climb.
        ("absent.com", false, true),
        ("cname-absent.com", false, true),
        ("nx.cname-absent.com", false, true),
        ("cname-nx.com", false, true),
        ("example.co.uk", false, true),
        // Present and permitting this CA.
        ("present.com", true, true),
        ("cname-present.com", true, true),
        ("cname2-present.com", true, true),
        ("nx.cname2-present.com", true, true),
        ("dname-present.com", true, true),
        ("dname2cname.com", true, true),
        // Only an iodef record: present, but no issuance restriction.
        ("iodef-only.com", true, true),
    ];

    let (va, _ra) = test_va(caa_config());
    for (domain, present, valid) in cases {
        let result = va
            .check_caa_records(&Identifier::dns(domain))
            .await
            .unwrap_or_else(|e| panic!("{domain}: unexpected error {e}"));
        assert_eq!(result.present, present, "{domain} presence");
        assert_eq!(result.valid, valid, "{domain} validity");
    }
}

#[tokio::test]
async fn wildcards_are_governed_by_issuewild() {
    let (va, _ra) = test_va(caa_config());

    // wild.com: issue allows this CA, issuewild allows nobody.
    let base = va
        .check_caa_records(&Identifier::dns("wild.com"))
        .await
        .unwrap();
    assert!(base.present && base.valid);

    let wildcard = va
        .check_caa_records(&Identifier::dns("*.wild.com"))
        .await
        .unwrap();
    assert!(wildcard.present && !wildcard.valid);

    // present.com has no issuewild; the issue record governs wildcards too.
    let fallback = va
        .check_caa_records(&Identifier::dns("*.present.com"))
        .await
        .unwrap();
    assert!(fallback.present && fallback.valid);
}

#[tokio::test]
async fn broken_trees_surface_errors() {
    let failing = [
        "www.caa-loop.com",
        "a.cname-loop.com",
        "a.dname-loop.com",
        "cname-servfail.com",
        "cname2servfail.com",
        "dname-servfail.com",
        "cname-and-dname.com",
        "servfail.com",
    ];

    let (va, _ra) = test_va(caa_config());
    for domain in failing {
        let result = va.check_caa_records(&Identifier::dns(domain)).await;
        assert!(result.is_err(), "{domain} should error, got {result:?}");
    }
}

#[tokio::test]
async fn error_kinds_are_distinguished() {
    let (va, _ra) = test_va(caa_config());

    assert!(matches!(
        va.check_caa_records(&Identifier::dns("a.cname-loop.com"))
            .await,
        Err(CaaError::AliasLoop { .. })
    ));
    assert!(matches!(
        va.check_caa_records(&Identifier::dns("cname-and-dname.com"))
            .await,
        Err(CaaError::AliasConflict { .. })
    ));
    assert!(matches!(
        va.check_caa_records(&Identifier::dns("servfail.com")).await,
        Err(CaaError::Dns(_))
    ));
}

#[tokio::test]
async fn another_issuer_is_rejected() {
    let config = VaConfig {
        issuer_domain: "other-ca.example".to_string(),
        ..VaConfig::default()
    };
    let (va, _ra) = test_va(config);

    let result = va
        .check_caa_records(&Identifier::dns("present.com"))
        .await
        .unwrap();
    assert!(result.present);
    assert!(!result.valid);
}

#[tokio::test]
async fn trailing_dots_are_tolerated() {
    let (va, _ra) = test_va(caa_config());
    let result = va
        .check_caa_records(&Identifier::dns("present.com."))
        .await
        .unwrap();
    assert!(result.present && result.valid);
}
