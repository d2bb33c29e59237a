//! # Credential Validation
//!
//! Decides whether a [`CredentialRecord`] holds a usable TLS credential. Validation has two
//! separate outcomes:
//!
//! - `Ok(ValidationOutcome)`: the credential could be judged. `valid == false` is a normal
//!   business result carrying an [`InvalidReason`].
//! - `Err(ValidationError)`: the credential could not be judged at all (missing fields,
//!   malformed PEM, a non-RSA private key).
//!
//! A credential is valid when its private key is RSA, every certificate in the chain satisfies
//! `not_before <= now <= not_after`, and every DNS name on a certificate verifies against that
//! certificate. There is no chain building against a trust root.

pub mod hostname;

use crate::credential::{
    Clock, CredentialRecord, SystemClock, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY,
};
use chrono::{DateTime, Utc};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, PrivateKeyInfo};
use rsa::RsaPrivateKey;
use rustls::pki_types::{pem::PemObject, CertificateDer, PrivateKeyDer};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use x509_parser::prelude::{FromDer, GeneralName, X509Certificate};

/// OID of `rsaEncryption` in PKCS#8 `AlgorithmIdentifier`s.
const RSA_ENCRYPTION_OID: &str = "1.2.840.113549.1.1.1";

/// Errors that prevent a credential from being judged.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required data field is absent from the record.
    #[error("Credential is missing data field '{field}'")]
    MissingField { field: &'static str },

    /// The private key field holds no decodable PEM private key.
    #[error("Private key is not valid PEM: {reason}")]
    InvalidPrivateKeyPem { reason: String },

    /// The private key is labelled RSA but its contents do not decode.
    #[error("Private key is not a valid RSA key: {reason}")]
    InvalidRsaKey { reason: String },

    /// The private key uses an algorithm other than RSA.
    #[error("Unsupported private key type: {algorithm} (only RSA keys are supported)")]
    UnsupportedKeyType { algorithm: String },

    /// The certificate field is not valid PEM.
    #[error("Certificate chain is not valid PEM: {reason}")]
    InvalidCertificatePem { reason: String },

    /// A PEM certificate block does not hold a valid X.509 certificate.
    #[error("Certificate {index} in chain could not be decoded: {reason}")]
    InvalidCertificate { index: usize, reason: String },
}

impl ValidationError {
    /// True for the unsupported-key-algorithm case.
    pub fn is_unsupported_key(&self) -> bool {
        matches!(self, Self::UnsupportedKeyType { .. })
    }

    /// True for malformed or missing input.
    pub fn is_parse_error(&self) -> bool {
        !self.is_unsupported_key()
    }
}

/// Why a well-formed credential was judged invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// The certificate field contained no certificates.
    EmptyChain,

    /// A certificate's validity window has not started.
    NotYetValid { index: usize, subject: String, not_before: DateTime<Utc> },

    /// A certificate's validity window has ended.
    Expired { index: usize, subject: String, not_after: DateTime<Utc> },

    /// A DNS name on a certificate does not verify against it.
    HostnameMismatch { index: usize, subject: String, name: String },
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyChain => write!(f, "certificate chain is empty"),
            Self::NotYetValid { index, subject, not_before } => {
                write!(f, "certificate {} ({}) is not valid before {}", index, subject, not_before)
            }
            Self::Expired { index, subject, not_after } => {
                write!(f, "certificate {} ({}) expired at {}", index, subject, not_after)
            }
            Self::HostnameMismatch { index, subject, name } => {
                write!(f, "certificate {} ({}) does not verify for host '{}'", index, subject, name)
            }
        }
    }
}

/// Result of judging a credential that could be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub cause: Option<InvalidReason>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self { valid: true, cause: None }
    }

    pub fn invalid(cause: InvalidReason) -> Self {
        Self { valid: false, cause: Some(cause) }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Decoded form of a credential record: one RSA key and the certificate chain, leaf first.
///
/// Rebuilt on every validation and never persisted.
pub struct ParsedCredential {
    pub private_key: RsaPrivateKey,
    pub certificates: Vec<CertificateDer<'static>>,
}

impl fmt::Debug for ParsedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedCredential")
            .field("private_key", &"[REDACTED]")
            .field("certificates", &self.certificates.len())
            .finish()
    }
}

impl ParsedCredential {
    /// Decode the key and certificate fields of `record`.
    ///
    /// The key is decoded first, so a non-RSA key is reported even when the certificate
    /// field is also broken.
    pub fn parse(record: &CredentialRecord) -> Result<Self, ValidationError> {
        let key_pem = record
            .private_key_pem()
            .ok_or(ValidationError::MissingField { field: TLS_PRIVATE_KEY_KEY })?;
        let cert_pem = record
            .certificate_chain_pem()
            .ok_or(ValidationError::MissingField { field: TLS_CERT_KEY })?;

        let private_key = parse_rsa_private_key(key_pem)?;

        let certificates = CertificateDer::pem_slice_iter(cert_pem)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ValidationError::InvalidCertificatePem { reason: e.to_string() })?;

        let parsed = Self { private_key, certificates };
        parsed.x509_certificates()?;
        Ok(parsed)
    }

    /// Decode the chain into X.509 structures borrowing from `self`.
    pub fn x509_certificates(&self) -> Result<Vec<X509Certificate<'_>>, ValidationError> {
        self.certificates
            .iter()
            .enumerate()
            .map(|(index, der)| {
                X509Certificate::from_der(der.as_ref())
                    .map(|(_, cert)| cert)
                    .map_err(|e| ValidationError::InvalidCertificate { index, reason: e.to_string() })
            })
            .collect()
    }
}

fn parse_rsa_private_key(pem: &[u8]) -> Result<RsaPrivateKey, ValidationError> {
    let der = PrivateKeyDer::from_pem_slice(pem)
        .map_err(|e| ValidationError::InvalidPrivateKeyPem { reason: e.to_string() })?;

    match der {
        PrivateKeyDer::Pkcs1(key) => RsaPrivateKey::from_pkcs1_der(key.secret_pkcs1_der())
            .map_err(|e| ValidationError::InvalidRsaKey { reason: e.to_string() }),
        PrivateKeyDer::Pkcs8(key) => {
            let info = PrivateKeyInfo::try_from(key.secret_pkcs8_der())
                .map_err(|e| ValidationError::InvalidPrivateKeyPem { reason: e.to_string() })?;
            let oid = info.algorithm.oid.to_string();
            if oid != RSA_ENCRYPTION_OID {
                return Err(ValidationError::UnsupportedKeyType {
                    algorithm: key_algorithm_name(&oid),
                });
            }
            RsaPrivateKey::from_pkcs8_der(key.secret_pkcs8_der())
                .map_err(|e| ValidationError::InvalidRsaKey { reason: e.to_string() })
        }
        PrivateKeyDer::Sec1(_) => {
            Err(ValidationError::UnsupportedKeyType { algorithm: "EC".to_string() })
        }
        _ => Err(ValidationError::UnsupportedKeyType { algorithm: "unknown".to_string() }),
    }
}

fn key_algorithm_name(oid: &str) -> String {
    match oid {
        "1.2.840.10045.2.1" => "EC".to_string(),
        "1.3.101.112" => "Ed25519".to_string(),
        "1.3.101.113" => "Ed448".to_string(),
        "1.2.840.10040.4.1" => "DSA".to_string(),
        other => other.to_string(),
    }
}

/// Judges credential validity against an injected [`Clock`].
#[derive(Debug, Clone)]
pub struct CredentialValidator {
    clock: Arc<dyn Clock>,
}

impl Default for CredentialValidator {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl CredentialValidator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Parse and judge `record` at the clock's current time.
    pub fn validate(&self, record: &CredentialRecord) -> Result<ValidationOutcome, ValidationError> {
        Self::validate_at(record, self.clock.now())
    }

    /// Parse and judge `record` at `now`.
    pub fn validate_at(
        record: &CredentialRecord,
        now: DateTime<Utc>,
    ) -> Result<ValidationOutcome, ValidationError> {
        let parsed = ParsedCredential::parse(record)?;
        Self::judge(&parsed, now)
    }

    /// Judge an already parsed credential at `now`.
    pub fn judge(
        parsed: &ParsedCredential,
        now: DateTime<Utc>,
    ) -> Result<ValidationOutcome, ValidationError> {
        let certificates = parsed.x509_certificates()?;
        if certificates.is_empty() {
            return Ok(ValidationOutcome::invalid(InvalidReason::EmptyChain));
        }

        let now = now.timestamp();
        for (index, cert) in certificates.iter().enumerate() {
            for name in dns_names(index, cert)? {
                if !hostname::verify_hostname(cert, name) {
                    return Ok(ValidationOutcome::invalid(InvalidReason::HostnameMismatch {
                        index,
                        subject: cert.subject().to_string(),
                        name: name.to_string(),
                    }));
                }
            }

            let validity = cert.validity();
            let not_before = validity.not_before.timestamp();
            let not_after = validity.not_after.timestamp();
            if now < not_before {
                return Ok(ValidationOutcome::invalid(InvalidReason::NotYetValid {
                    index,
                    subject: cert.subject().to_string(),
                    not_before: to_datetime(not_before),
                }));
            }
            if now > not_after {
                return Ok(ValidationOutcome::invalid(InvalidReason::Expired {
                    index,
                    subject: cert.subject().to_string(),
                    not_after: to_datetime(not_after),
                }));
            }
        }

        Ok(ValidationOutcome::valid())
    }
}

fn dns_names<'a>(
    index: usize,
    cert: &'a X509Certificate<'a>,
) -> Result<Vec<&'a str>, ValidationError> {
    let san = cert
        .subject_alternative_name()
        .map_err(|e| ValidationError::InvalidCertificate { index, reason: e.to_string() })?;

    Ok(san
        .map(|ext| {
            ext.value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some(*dns),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default())
}

fn to_datetime(timestamp: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{FixedClock, Identity};
    use crate::test_support::{self, at};

    fn validator_at(y: i32, m: u32, d: u32) -> CredentialValidator {
        CredentialValidator::new(Arc::new(FixedClock::new(at(y, m, d))))
    }

    #[test]
    fn test_valid_chain_inside_window() {
        let outcome = validator_at(2021, 8, 1).validate(&test_support::valid_record()).unwrap();
        assert_eq!(outcome, ValidationOutcome::valid());
    }

    #[test]
    fn test_pkcs1_rsa_key_is_accepted() {
        let record = test_support::tls_record(test_support::RSA_PKCS1_KEY, test_support::VALID_CHAIN);
        assert!(validator_at(2021, 8, 1).validate(&record).unwrap().is_valid());
    }

    #[test]
    fn test_before_window_is_invalid() {
        let outcome = validator_at(2021, 5, 1).validate(&test_support::valid_record()).unwrap();
        assert!(!outcome.valid);
        assert!(matches!(outcome.cause, Some(InvalidReason::NotYetValid { index: 0, .. })));
    }

    #[test]
    fn test_expired_leaf_is_invalid() {
        let outcome = validator_at(2021, 8, 1).validate(&test_support::expired_record()).unwrap();
        assert!(!outcome.valid);
        match outcome.cause {
            Some(InvalidReason::Expired { index, subject, .. }) => {
                assert_eq!(index, 0);
                assert!(subject.contains("backup.example.com"));
            }
            other => panic!("unexpected cause: {:?}", other),
        }
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let record = test_support::valid_record();
        let not_after = at(2021, 10, 1);
        assert!(CredentialValidator::validate_at(&record, not_after).unwrap().valid);
        assert!(CredentialValidator::validate_at(&record, at(2021, 7, 1)).unwrap().valid);

        let late = not_after + chrono::Duration::seconds(1);
        assert!(!CredentialValidator::validate_at(&record, late).unwrap().valid);
    }

    #[test]
    fn test_san_that_fails_verification_is_invalid() {
        let record = test_support::tls_record(
            test_support::RSA_PKCS8_KEY,
            test_support::HOSTNAME_MISMATCH_CERT,
        );
        let outcome = validator_at(2021, 8, 1).validate(&record).unwrap();

        assert!(!outcome.is_valid());
        match outcome.cause {
            Some(InvalidReason::HostnameMismatch { index, subject, name }) => {
                assert_eq!(index, 0);
                assert!(subject.contains("mismatch.example.com"));
                assert_eq!(name, "10.0.0.5");
            }
            other => panic!("unexpected cause: {:?}", other),
        }
    }

    #[test]
    fn test_ec_key_is_unsupported() {
        for key in [test_support::EC_PKCS8_KEY, test_support::EC_SEC1_KEY] {
            let record = test_support::tls_record(key, test_support::EC_CERT);
            let err = validator_at(2021, 8, 1).validate(&record).unwrap_err();
            assert!(err.is_unsupported_key(), "expected unsupported key, got {err}");
            assert!(err.to_string().contains("EC"));
        }
    }

    #[test]
    fn test_missing_fields_are_parse_errors() {
        let mut record = test_support::valid_record();
        record.data.remove(TLS_CERT_KEY);
        let err = validator_at(2021, 8, 1).validate(&record).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { field: TLS_CERT_KEY }));
        assert!(err.is_parse_error());

        let mut record = test_support::valid_record();
        record.data.remove(TLS_PRIVATE_KEY_KEY);
        let err = validator_at(2021, 8, 1).validate(&record).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { field: TLS_PRIVATE_KEY_KEY }));
    }

    #[test]
    fn test_garbage_key_is_parse_error() {
        let record = test_support::tls_record("not a key", test_support::VALID_CHAIN);
        let err = validator_at(2021, 8, 1).validate(&record).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPrivateKeyPem { .. }));
    }

    #[test]
    fn test_empty_chain_is_invalid_not_error() {
        let record = test_support::tls_record(test_support::RSA_PKCS8_KEY, "");
        let outcome = validator_at(2021, 8, 1).validate(&record).unwrap();
        assert_eq!(outcome, ValidationOutcome::invalid(InvalidReason::EmptyChain));
    }

    #[test]
    fn test_undecodable_certificate_is_parse_error() {
        let bogus = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
        let record = test_support::tls_record(test_support::RSA_PKCS8_KEY, bogus);
        let err = validator_at(2021, 8, 1).validate(&record).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCertificate { index: 0, .. }));
    }

    #[test]
    fn test_parsed_credential_keeps_chain_order() {
        let parsed = ParsedCredential::parse(&test_support::valid_record()).unwrap();
        let certs = parsed.x509_certificates().unwrap();
        assert_eq!(certs.len(), 2);
        assert!(certs[0].subject().to_string().contains("backup.example.com"));
        assert!(certs[1].subject().to_string().contains("Cert Backup Test CA"));
        assert!(!format!("{:?}", parsed).contains("RsaPrivateKey"));
    }

    #[test]
    fn test_identity_of_fixture_record() {
        assert_eq!(
            test_support::valid_record().identity().unwrap(),
            Identity::new("default", "web-tls").unwrap()
        );
    }
}
