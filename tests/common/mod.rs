//! Common test utilities for all integration tests.
//!
//! Fixture validity windows (all times 00:00:00 UTC):
//! - `valid-chain.pem`: leaf 2021-07-01..2021-10-01, CA 2021-01-01..2031-01-01
//! - `expired-chain.pem`: leaf 2021-04-01..2021-07-15, same CA
//! - `ec.crt`: EC leaf 2021-07-01..2021-10-01
//! - `hostname-mismatch.crt`: leaf 2021-07-01..2021-10-01 with the DNS SAN `10.0.0.5` only

#![allow(dead_code)]

use cert_backup::cluster::MemorySecretStore;
use cert_backup::credential::{CredentialRecord, FixedClock, Identity};
use cert_backup::storage::MemoryStorage;
use cert_backup::{CredentialValidator, Reconciler};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

pub const VALID_CHAIN: &str = include_str!("../fixtures/valid-chain.pem");
pub const EXPIRED_CHAIN: &str = include_str!("../fixtures/expired-chain.pem");
pub const EC_CERT: &str = include_str!("../fixtures/ec.crt");
pub const HOSTNAME_MISMATCH_CERT: &str = include_str!("../fixtures/hostname-mismatch.crt");
pub const RSA_PKCS8_KEY: &str = include_str!("../fixtures/rsa-pkcs8.key");
pub const RSA_PKCS1_KEY: &str = include_str!("../fixtures/rsa-pkcs1.key");
pub const EC_PKCS8_KEY: &str = include_str!("../fixtures/ec.key");

/// Midnight UTC on the given date.
pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

/// The instant every scenario runs at.
pub fn scenario_now() -> DateTime<Utc> {
    at(2021, 8, 1)
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

/// A valid record carrying server bookkeeping, as it would be read back from a cluster.
pub fn valid_record_with_bookkeeping() -> CredentialRecord {
    let mut record = valid_record();
    record.metadata.resource_version = Some("4242".to_string());
    record.metadata.uid = Some("9f1c2d3e-0000-4000-8000-000000000000".to_string());
    record.metadata.creation_timestamp = Some("2021-07-01T00:00:00Z".to_string());
    record
}

pub fn validator() -> CredentialValidator {
    CredentialValidator::new(Arc::new(FixedClock::new(scenario_now())))
}

/// Reconciler over fresh in-memory storage and secret store, judging at [`scenario_now`].
pub fn memory_reconciler() -> (Reconciler, MemoryStorage, MemorySecretStore) {
    let storage = MemoryStorage::new();
    let secrets = MemorySecretStore::new();
    let reconciler =
        Reconciler::new(validator(), Arc::new(storage.clone()), Arc::new(secrets.clone()));
    (reconciler, storage, secrets)
}
