//! Certificate authority operations

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Result;
use crate::fields::Fields;
use crate::session::Session;
use crate::transport::Transport;

/// Signature hash used by a new CA
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashMethod {
    Sha1,
    #[default]
    Sha256,
}

impl HashMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashMethod::Sha1 => "sha1",
            HashMethod::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sha1" => Ok(HashMethod::Sha1),
            "sha256" => Ok(HashMethod::Sha256),
            _ => Err(format!("Unknown hash method: {}", s)),
        }
    }
}

/// Entry of `ca/list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaListItem {
    pub id: i64,
    pub name: String,
}

/// CA subject and settings returned by `ca/details`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaInfo {
    pub id: i64,
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
    #[serde(rename = "E")]
    pub email: String,
    #[serde(rename = "hash_alg")]
    pub hash_algorithm: String,
}

#[derive(Deserialize)]
struct CaIdResponse {
    ca_id: i64,
}

#[derive(Deserialize)]
struct PemResponse {
    #[serde(default)]
    pem: String,
}

/// CA operations over a connected session
pub struct CertificateAuthorities<'a, T: Transport> {
    session: &'a Session<T>,
}

impl<'a, T: Transport> CertificateAuthorities<'a, T> {
    pub fn new(session: &'a Session<T>) -> Self {
        Self { session }
    }

    /// Create a CA and return its id
    pub fn create(
        &self,
        organization: &str,
        locality: &str,
        state_code: &str,
        country_code: &str,
        hash_method: HashMethod,
    ) -> Result<i64> {
        let fields = Fields::new()
            .with("C", country_code)
            .with("L", locality)
            .with("O", organization)
            .with("ST", state_code)
            .with("hash_method", hash_method.as_str());

        let response: CaIdResponse = self.session.call("ca/new", fields)?;
        Ok(response.ca_id)
    }

    pub fn list(&self) -> Result<Vec<CaListItem>> {
        self.session.call("ca/list", Fields::new())
    }

    pub fn details(&self, ca_id: i64) -> Result<CaInfo> {
        self.session.call("ca/details", Fields::new().with("ca_id", ca_id))
    }

    /// PEM encoded CA certificate
    pub fn get(&self, ca_id: i64) -> Result<String> {
        let fields = Fields::new().with("ca_id", ca_id).with("what", "cert");
        let response: PemResponse = self.session.call("ca/details", fields)?;
        Ok(response.pem)
    }

    pub fn delete(&self, ca_id: i64) -> Result<()> {
        let _: IgnoredAny = self
            .session
            .call("ca/delete", Fields::new().with("ca_id", ca_id))?;
        Ok(())
    }
}
