//! Certificate operations, status model and subject alternative names

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use crate::error::Result;
use crate::fields::Fields;
use crate::session::Session;
use crate::transport::Transport;

/// Revocation state of a certificate
///
/// Discriminants are the bits used by `cert/list` filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificateStatus {
    Expired = 1,
    Good = 2,
    Revoked = 4,
    Hold = 8,
}

impl CertificateStatus {
    pub const ALL: [CertificateStatus; 4] = [
        CertificateStatus::Expired,
        CertificateStatus::Good,
        CertificateStatus::Revoked,
        CertificateStatus::Hold,
    ];

    /// Wire name sent to `cert/status`
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::Expired => "expired",
            CertificateStatus::Good => "good",
            CertificateStatus::Revoked => "revoked",
            CertificateStatus::Hold => "hold",
        }
    }

    pub fn bits(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertificateStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "expired" => Ok(CertificateStatus::Expired),
            "good" => Ok(CertificateStatus::Good),
            "revoked" => Ok(CertificateStatus::Revoked),
            "hold" => Ok(CertificateStatus::Hold),
            _ => Err(format!("Unknown certificate status: {}", s)),
        }
    }
}

/// Set of statuses selected by `cert/list`, sent as a bitmask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFilter(u8);

impl StatusFilter {
    pub fn all() -> Self {
        CertificateStatus::ALL.into_iter().collect()
    }

    pub fn contains(&self, status: CertificateStatus) -> bool {
        self.0 & status.bits() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl From<CertificateStatus> for StatusFilter {
    fn from(status: CertificateStatus) -> Self {
        StatusFilter(status.bits())
    }
}

impl BitOr for CertificateStatus {
    type Output = StatusFilter;

    fn bitor(self, rhs: CertificateStatus) -> StatusFilter {
        StatusFilter(self.bits() | rhs.bits())
    }
}

impl BitOr<CertificateStatus> for StatusFilter {
    type Output = StatusFilter;

    fn bitor(self, rhs: CertificateStatus) -> StatusFilter {
        StatusFilter(self.0 | rhs.bits())
    }
}

impl FromIterator<CertificateStatus> for StatusFilter {
    fn from_iter<I: IntoIterator<Item = CertificateStatus>>(iter: I) -> Self {
        StatusFilter(iter.into_iter().fold(0, |acc, s| acc | s.bits()))
    }
}

/// Representation requested from `cert/details`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CertificateFormat {
    /// PEM certificate
    #[default]
    Cert,
    /// PEM certificate followed by the CA chain
    Chain,
    /// PEM certificate signing request
    Csr,
    /// Unencrypted PEM private key
    KeyDecrypted,
    /// Passphrase-encrypted PEM private key
    KeyEncrypted,
    /// Base64 PKCS#12 bundle
    Pkcs12,
}

impl CertificateFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateFormat::Cert => "cert",
            CertificateFormat::Chain => "chain",
            CertificateFormat::Csr => "csr",
            CertificateFormat::KeyDecrypted => "key.dec",
            CertificateFormat::KeyEncrypted => "key.enc",
            CertificateFormat::Pkcs12 => "pkcs12",
        }
    }
}

impl fmt::Display for CertificateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertificateFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cert" => Ok(CertificateFormat::Cert),
            "chain" => Ok(CertificateFormat::Chain),
            "csr" => Ok(CertificateFormat::Csr),
            "key.dec" | "key" => Ok(CertificateFormat::KeyDecrypted),
            "key.enc" => Ok(CertificateFormat::KeyEncrypted),
            "pkcs12" | "p12" => Ok(CertificateFormat::Pkcs12),
            _ => Err(format!("Unknown certificate format: {}", s)),
        }
    }
}

/// One subject alternative name; empty attributes are not sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectAltName {
    #[serde(rename = "DNS", alias = "dns")]
    pub dns: String,
    #[serde(alias = "Email")]
    pub email: String,
    #[serde(rename = "IP", alias = "ip")]
    pub ip: String,
    #[serde(rename = "URI", alias = "uri")]
    pub uri: String,
}

impl SubjectAltName {
    pub fn dns(name: impl Into<String>) -> Self {
        Self {
            dns: name.into(),
            ..Default::default()
        }
    }

    pub fn email(address: impl Into<String>) -> Self {
        Self {
            email: address.into(),
            ..Default::default()
        }
    }

    pub fn ip(address: impl Into<String>) -> Self {
        Self {
            ip: address.into(),
            ..Default::default()
        }
    }

    pub fn uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dns.is_empty() && self.email.is_empty() && self.ip.is_empty() && self.uri.is_empty()
    }

    /// Append the `SANs[index][...]` fields for every non-empty attribute
    fn push_fields(&self, index: usize, fields: &mut Fields) {
        let attributes = [
            ("email", &self.email),
            ("DNS", &self.dns),
            ("IP", &self.ip),
            ("URI", &self.uri),
        ];

        for (key, value) in attributes {
            if !value.is_empty() {
                fields.push(format!("SANs[{}][{}]", index, key), value);
            }
        }
    }
}

/// Parses `dns:example.com`, `email:a@b.c`, `ip:10.0.0.1` or `uri:https://...`
impl FromStr for SubjectAltName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (kind, value) = s
            .split_once(':')
            .ok_or_else(|| format!("Expected <kind>:<value>, got: {}", s))?;

        if value.is_empty() {
            return Err(format!("Empty subject alternative name: {}", s));
        }

        match kind.to_lowercase().as_str() {
            "dns" => Ok(SubjectAltName::dns(value)),
            "email" => Ok(SubjectAltName::email(value)),
            "ip" => Ok(SubjectAltName::ip(value)),
            "uri" => Ok(SubjectAltName::uri(value)),
            _ => Err(format!("Unknown subject alternative name kind: {}", kind)),
        }
    }
}

/// Build the indexed SAN fields; the index is the position in `alt_names`
pub fn san_fields(alt_names: &[SubjectAltName]) -> Fields {
    let mut fields = Fields::new();
    for (index, san) in alt_names.iter().enumerate() {
        san.push_fields(index, &mut fields);
    }
    fields
}

/// Distinguished name of a certificate to issue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSubject {
    pub common_name: String,
    pub organizational_unit: String,
    pub organization: String,
    pub locality: String,
    pub state_code: String,
    pub country_code: String,
}

impl CertificateSubject {
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            ..Default::default()
        }
    }

    pub fn with_organizational_unit(mut self, unit: impl Into<String>) -> Self {
        self.organizational_unit = unit.into();
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = organization.into();
        self
    }

    pub fn with_locality(mut self, locality: impl Into<String>) -> Self {
        self.locality = locality.into();
        self
    }

    pub fn with_state_code(mut self, state_code: impl Into<String>) -> Self {
        self.state_code = state_code.into();
        self
    }

    pub fn with_country_code(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = country_code.into();
        self
    }
}

/// Certificate subject and state returned by `cert/details`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateInfo {
    pub id: i64,
    pub status: String,
    #[serde(rename = "C")]
    pub country_code: String,
    #[serde(rename = "ST")]
    pub state_code: String,
    #[serde(rename = "L")]
    pub locality: String,
    #[serde(rename = "O")]
    pub organization: String,
    #[serde(rename = "OU")]
    pub organizational_unit: String,
    #[serde(rename = "CN")]
    pub common_name: String,
    pub alt: Vec<SubjectAltName>,
}

impl CertificateInfo {
    /// Typed status, if the server sent a known one
    pub fn status(&self) -> Option<CertificateStatus> {
        self.status.parse().ok()
    }
}

/// Entry of `cert/list`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateListItem {
    pub id: i64,
    pub name: String,
    pub status: String,
    /// Expiry as a Unix timestamp
    pub expires: i64,
}

impl CertificateListItem {
    pub fn status(&self) -> Option<CertificateStatus> {
        self.status.parse().ok()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.expires, 0)
    }
}

#[derive(Deserialize)]
struct CertIdResponse {
    cert_id: i64,
}

#[derive(Deserialize)]
struct CertificateFiles {
    #[serde(default)]
    pem: String,
    #[serde(default)]
    pkcs12: String,
}

impl CertificateFiles {
    /// PEM when present, the PKCS#12 blob otherwise
    fn into_preferred(self) -> String {
        if !self.pem.is_empty() {
            self.pem
        } else {
            self.pkcs12
        }
    }
}

/// Certificate operations over a connected session
pub struct Certificates<'a, T: Transport> {
    session: &'a Session<T>,
}

impl<'a, T: Transport> Certificates<'a, T> {
    pub fn new(session: &'a Session<T>) -> Self {
        Self { session }
    }

    /// Issue a certificate signed by `ca_id` and return its id
    pub fn create(
        &self,
        ca_id: i64,
        subject: &CertificateSubject,
        alt_names: &[SubjectAltName],
    ) -> Result<i64> {
        let mut fields = Fields::new()
            .with("C", &subject.country_code)
            .with("CN", &subject.common_name)
            .with("L", &subject.locality)
            .with("O", &subject.organization)
            .with("OU", &subject.organizational_unit)
            .with("ST", &subject.state_code)
            .with("ca_id", ca_id);

        for (name, value) in san_fields(alt_names).iter() {
            fields.push(name, value.clone());
        }

        let response: CertIdResponse = self.session.call("cert/new", fields)?;
        Ok(response.cert_id)
    }

    /// Certificate material in the requested format
    ///
    /// Returns the PEM text when the server sends one, otherwise the PKCS#12
    /// blob.
    pub fn get(&self, cert_id: i64, format: CertificateFormat) -> Result<String> {
        let fields = Fields::new()
            .with("cert_id", cert_id)
            .with("what", format.as_str());

        let files: CertificateFiles = self.session.call("cert/details", fields)?;
        Ok(files.into_preferred())
    }

    pub fn details(&self, cert_id: i64) -> Result<CertificateInfo> {
        self.session
            .call("cert/details", Fields::new().with("cert_id", cert_id))
    }

    /// Certificates of `ca_id` whose status is in `filter`
    pub fn list(
        &self,
        ca_id: i64,
        filter: impl Into<StatusFilter>,
    ) -> Result<Vec<CertificateListItem>> {
        let filter = filter.into();
        let fields = Fields::new()
            .with("ca_id", ca_id)
            .with("what", i64::from(filter.bits()));

        self.session.call("cert/list", fields)
    }

    /// Reissue with a new key pair; returns the new certificate id
    pub fn reissue(&self, cert_id: i64) -> Result<i64> {
        let response: CertIdResponse = self
            .session
            .call("cert/reissue", Fields::new().with("cert_id", cert_id))?;
        Ok(response.cert_id)
    }

    /// Change the status, e.g. revoke or put on hold
    pub fn set_status(&self, cert_id: i64, status: CertificateStatus) -> Result<()> {
        let fields = Fields::new()
            .with("cert_id", cert_id)
            .with("status", status);

        let _: IgnoredAny = self.session.call("cert/status", fields)?;
        Ok(())
    }
}
