//! Checks run before touching the network.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

/// Timeout of the connectivity check.
pub const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for the connectivity check.
#[derive(Debug, thiserror::Error)]
pub enum ConnectivityError {
    #[error("could not reach {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to create HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Whether the process runs with root privileges, required for raw sockets.
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Make sure `url` answers with a success status within `timeout`.
///
/// # Errors
///
/// Returns [`ConnectivityError`] when the request fails or is not successful.
pub async fn check_connectivity(url: &str, timeout: Duration) -> Result<(), ConnectivityError> {
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(ConnectivityError::ClientBuild)?;

    debug!(%url, ?timeout, "checking connectivity");
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| ConnectivityError::Unreachable {
            url: url.to_string(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(ConnectivityError::HttpStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    Ok(())
}
