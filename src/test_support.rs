//! Shared fixtures for unit tests.
//!
//! The PEM files under `tests/fixtures/` have fixed validity windows:
//! - `valid-chain.pem`: leaf 2021-07-01..2021-10-01, then the CA 2021-01-01..2031-01-01
//! - `expired-chain.pem`: leaf 2021-04-01..2021-07-15, then the same CA
//! - `ec.crt`: EC leaf 2021-07-01..2021-10-01
//! - `hostname-mismatch.crt`: RSA leaf 2021-07-01..2021-10-01 whose only SAN is the DNS name
//!   `10.0.0.5`, which cannot verify without an IP SAN
//!
//! Leaf certificates carry `backup.example.com` and `*.backup.example.com`.

use crate::credential::{CredentialRecord, Identity};
use chrono::{DateTime, TimeZone, Utc};

pub const VALID_CHAIN: &str = include_str!("../tests/fixtures/valid-chain.pem");
pub const EXPIRED_CHAIN: &str = include_str!("../tests/fixtures/expired-chain.pem");
pub const EC_CERT: &str = include_str!("../tests/fixtures/ec.crt");
pub const HOSTNAME_MISMATCH_CERT: &str = include_str!("../tests/fixtures/hostname-mismatch.crt");
pub const RSA_PKCS8_KEY: &str = include_str!("../tests/fixtures/rsa-pkcs8.key");
pub const RSA_PKCS1_KEY: &str = include_str!("../tests/fixtures/rsa-pkcs1.key");
pub const EC_PKCS8_KEY: &str = include_str!("../tests/fixtures/ec.key");
pub const EC_SEC1_KEY: &str = include_str!("../tests/fixtures/ec-sec1.key");

/// Midnight UTC on the given date.
pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

pub fn identity() -> Identity {
    Identity::new("default", "web-tls").unwrap()
}

pub fn tls_record(key: &str, chain: &str) -> CredentialRecord {
    CredentialRecord::new_tls(&identity(), key.as_bytes(), chain.as_bytes())
}

pub fn valid_record() -> CredentialRecord {
    tls_record(RSA_PKCS8_KEY, VALID_CHAIN)
}

pub fn expired_record() -> CredentialRecord {
    tls_record(RSA_PKCS8_KEY, EXPIRED_CHAIN)
}
