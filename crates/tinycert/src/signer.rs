//! HMAC-SHA256 request digest

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Lowercase hex HMAC-SHA256 of `canonical`, keyed with the raw API key bytes
pub fn sign(canonical: &str, api_key: &str) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(api_key.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(canonical.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
