//! ACS3-HMAC-SHA256 request signing.
//!
//! The canonical request is
//!
//! ```text
//! METHOD\nURI\nQUERY\nCANONICAL_HEADERS\nSIGNED_HEADERS\nHEX(SHA256(body))
//! ```
//!
//! where every canonical header line ends in `\n`. The string to sign is
//! `ACS3-HMAC-SHA256\n` followed by the hex SHA-256 of the canonical request,
//! and the signature is its hex HMAC-SHA256 under the access key secret.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use certrenew_config::Credentials;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "ACS3-HMAC-SHA256";

/// Header carrying the hex SHA-256 of the request body
pub const CONTENT_SHA256_HEADER: &str = "x-acs-content-sha256";

/// Signs requests with an access key pair
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Credentials,
}

impl Signer {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Compute the `Authorization` header value.
    ///
    /// `headers` must be keyed by lowercase name and already contain
    /// `x-acs-content-sha256`. Every header in the map is signed.
    pub fn authorization(
        &self,
        method: &str,
        path: &str,
        canonical_query: &str,
        headers: &BTreeMap<String, String>,
    ) -> String {
        let payload_hash = headers
            .get(CONTENT_SHA256_HEADER)
            .map(String::as_str)
            .unwrap_or_default();

        let mut canonical_headers = String::new();
        for (name, value) in headers {
            canonical_headers.push_str(&format!("{}:{}\n", name, value.trim()));
        }
        let signed_headers = headers.keys().map(String::as_str).collect::<Vec<_>>().join(";");

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, path, canonical_query, canonical_headers, signed_headers, payload_hash
        );

        let string_to_sign = format!("{}\n{}", ALGORITHM, sha256_hex(canonical_request.as_bytes()));
        let signature = hex::encode(hmac_sha256(
            self.credentials.access_key_secret().as_bytes(),
            string_to_sign.as_bytes(),
        ));

        format!(
            "{} Credential={},SignedHeaders={},Signature={}",
            ALGORITHM,
            self.credentials.access_key_id(),
            signed_headers,
            signature
        )
    }
}

/// Hex-encoded SHA-256 digest
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Build a canonical query string: parameters sorted by name, names and
/// values percent-encoded per RFC 3986.
pub fn canonical_query(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (urlencoding::encode(k).into_owned(), urlencoding::encode(v).into_owned()))
        .collect();
    encoded.sort();

    encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
