//! AWS Signature Version 4
//!
//! Reference: <https://docs.aws.amazon.com/IAM/latest/UserGuide/reference_sigv-create-signed-request.html>

use std::fmt::Write;

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// HMAC-SHA256 of `data` under `key`
pub(crate) fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Percent-encode everything outside the RFC 3986 unreserved set
pub(crate) fn uri_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Sorted, encoded query string
pub(crate) fn canonical_query(params: &[(&str, &str)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (uri_encode(k), uri_encode(v)))
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Credentials and scope for one service/region pair
pub(crate) struct Signer<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub region: &'a str,
    pub service: &'a str,
}

impl Signer<'_> {
    /// Build the `Authorization` header value
    ///
    /// `amz_date` is the `x-amz-date` value (`YYYYMMDD'T'HHMMSS'Z'`); it must
    /// also be present in `headers`.
    pub(crate) fn authorization(
        &self,
        method: &str,
        uri: &str,
        query: &[(&str, &str)],
        headers: &[(String, String)],
        payload: &str,
        amz_date: &str,
    ) -> String {
        let date = amz_date.get(..8).unwrap_or(amz_date);

        // 1. Canonical request
        let mut sorted_headers: Vec<(String, &str)> = headers
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.trim()))
            .collect();
        sorted_headers.sort();

        let canonical_headers = sorted_headers.iter().fold(String::new(), |mut acc, (k, v)| {
            let _ = writeln!(acc, "{k}:{v}");
            acc
        });
        let signed_headers = sorted_headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let hashed_payload = hex::encode(Sha256::digest(payload.as_bytes()));
        let canonical_request = format!(
            "{method}\n{uri}\n{}\n{canonical_headers}\n{signed_headers}\n{hashed_payload}",
            canonical_query(query)
        );

        tracing::trace!(canonical_request = %canonical_request, "SigV4 canonical request");

        // 2. String to sign
        let credential_scope = format!("{date}/{}/{}/aws4_request", self.region, self.service);
        let hashed_canonical_request = hex::encode(Sha256::digest(canonical_request.as_bytes()));
        let string_to_sign =
            format!("{ALGORITHM}\n{amz_date}\n{credential_scope}\n{hashed_canonical_request}");

        // 3. Signature
        let secret_date = hmac_sha256(
            format!("AWS4{}", self.secret_access_key).as_bytes(),
            date.as_bytes(),
        );
        let secret_region = hmac_sha256(&secret_date, self.region.as_bytes());
        let secret_service = hmac_sha256(&secret_region, self.service.as_bytes());
        let secret_signing = hmac_sha256(&secret_service, b"aws4_request");
        let signature = hex::encode(hmac_sha256(&secret_signing, string_to_sign.as_bytes()));

        // 4. Authorization
        format!(
            "{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.access_key_id
        )
    }
}
