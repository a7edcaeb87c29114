//! Blocking HTTP helpers for the acquisition and market paths.
//!
//! A client is built per call. `reqwest::blocking::Client` owns a runtime
//! internally and panics if dropped inside an async context, so none is
//! kept in long-lived structs that the server might hold.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;

pub fn client(user_agent: &str, timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build http client")
}

/// GET `url` and return the body, failing on non-2xx status.
pub fn get_bytes(client: &Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("GET {} failed", url))?;
    let status = response.status();
    if !status.is_success() {
        bail!("GET {} returned {}", url, status);
    }
    let bytes = response
        .bytes()
        .with_context(|| format!("reading body of {} failed", url))?;
    Ok(bytes.to_vec())
}

pub fn get_text(client: &Client, url: &str) -> Result<String> {
    let bytes = get_bytes(client, url)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// GET `url` and return the status with the body, whatever the status.
/// Only transport failures are errors.
pub fn get_text_with_status(client: &Client, url: &str) -> Result<(StatusCode, String)> {
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("GET {} failed", url))?;
    let status = response.status();
    let body = response
        .text()
        .with_context(|| format!("reading body of {} failed", url))?;
    Ok((status, body))
}
