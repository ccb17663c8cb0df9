//! Fully buffered HTTP response.
//!
//! The body is kept as raw bytes; scene descriptors are parsed from it with
//! `serde_json::from_slice`.

#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL of the response (after redirects, if any).
    pub url: url::Url,

    /// Numeric HTTP status code (e.g., `200`, `404`).
    pub status: u16,

    /// Raw response body bytes.
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
