//! TinyCert client library
//!
//! Manages certificate authorities and the certificates they sign through the
//! TinyCert HTTP API. Every request is a signed, URL-encoded form POST; the
//! [`Session`] owns the credentials and the authentication token, and the
//! [`CertificateAuthorities`] and [`Certificates`] resources borrow it.
//!
//! ```rust,no_run
//! use tinycert::{CertificateAuthorities, Session, SessionConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::new(SessionConfig::from_env()?)?;
//!
//! let authorities = session.with_connection(|session| {
//!     CertificateAuthorities::new(session).list()
//! })?;
//!
//! for ca in authorities {
//!     println!("{} {}", ca.id, ca.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod ca;
pub mod certificate;
pub mod config;
pub mod error;
pub mod fields;
pub mod session;
pub mod signer;
pub mod transport;

pub use ca::{CaInfo, CaListItem, CertificateAuthorities, HashMethod};
pub use certificate::{
    CertificateFormat, CertificateInfo, CertificateListItem, CertificateStatus,
    CertificateSubject, Certificates, StatusFilter, SubjectAltName,
};
pub use config::{SessionConfig, SessionConfigBuilder, DEFAULT_SERVER_URL, DEFAULT_TIMEOUT};
pub use error::{Result, TinyCertError};
pub use fields::{FieldValue, Fields};
pub use session::{Session, SessionState, SignedRequest};
pub use signer::sign;
pub use transport::{HttpTransport, RawResponse, Transport};
