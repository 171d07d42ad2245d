use crate::foundation::error::{LoopforgeError, LoopforgeResult};

/// Acquire raw source bytes for a URI.
///
/// `http://` and `https://` URIs go through the blocking client; anything
/// else is read from the local filesystem so harnesses can run offline.
pub(crate) fn fetch_source_bytes(
    client: &reqwest::blocking::Client,
    uri: &str,
) -> LoopforgeResult<Vec<u8>> {
    if is_http_url(uri) {
        let response = client.get(uri).send().map_err(|e| {
            LoopforgeError::download_failed(format!("request to '{uri}' failed: {e}"))
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoopforgeError::download_failed(format!(
                "'{uri}' answered {status}"
            )));
        }
        let bytes = response.bytes().map_err(|e| {
            LoopforgeError::download_failed(format!("reading body of '{uri}' failed: {e}"))
        })?;
        return Ok(bytes.to_vec());
    }

    std::fs::read(uri)
        .map_err(|e| LoopforgeError::download_failed(format!("reading '{uri}' failed: {e}")))
}

fn is_http_url(s: &str) -> bool {
    let s = s.trim();
    s.starts_with("http://") || s.starts_with("https://")
}
