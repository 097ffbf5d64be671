//! MAC address vendor lookup.
//!
//! Vendor names come from an HTTP API that answers `GET {base}{mac}` with
//! the vendor name as plain text. Answers are cached per OUI (the first
//! three bytes of the MAC) and requests are spaced out because the public
//! API rate-limits aggressively.

use std::future::Future;
use std::time::Duration;

use moka::future::Cache;
use pnet::util::MacAddr;
use reqwest::Client;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::NOT_AVAILABLE;

/// Default timeout for HTTP requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Upper bound of cached vendor names.
const CACHE_CAPACITY: u64 = 4096;

/// User-Agent header value for HTTP requests.
const USER_AGENT: &str = concat!("diamond/", env!("CARGO_PKG_VERSION"));

/// Trait for vendor lookups.
///
/// Lookups never fail: an unknown vendor is reported as [`NOT_AVAILABLE`].
pub trait VendorLookup: Send + Sync {
    fn vendor(&self, mac: MacAddr) -> impl Future<Output = String> + Send;
}

/// Error type for vendor API requests.
#[derive(Debug, thiserror::Error)]
pub enum VendorLookupError {
    #[error("vendor API returned status {status} for {mac}")]
    HttpStatus { mac: MacAddr, status: u16 },

    #[error("network error looking up {mac}: {source}")]
    Network {
        mac: MacAddr,
        #[source]
        source: reqwest::Error,
    },

    #[error("vendor API returned an empty name for {0}")]
    Empty(MacAddr),

    #[error("failed to create HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Vendor lookup backed by a macvendors-style HTTP API.
pub struct MacVendors {
    client: Client,
    base_url: String,
    cache: Cache<[u8; 3], String>,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl MacVendors {
    /// Create a client for `base_url`, waiting at least `min_interval`
    /// between two requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>, min_interval: Duration) -> Result<Self, VendorLookupError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(VendorLookupError::ClientBuild)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            cache: Cache::builder().max_capacity(CACHE_CAPACITY).build(),
            min_interval,
            last_request: Mutex::new(None),
        })
    }

    /// Query the API for `mac`, bypassing the cache.
    pub async fn fetch(&self, mac: MacAddr) -> Result<String, VendorLookupError> {
        let mut last_request = self.last_request.lock().await;
        if let Some(last) = *last_request {
            tokio::time::sleep_until(last + self.min_interval).await;
        }

        let url = format!("{}{mac}", self.base_url);
        let result = self.client.get(&url).send().await;
        *last_request = Some(Instant::now());
        drop(last_request);

        let response = result.map_err(|source| VendorLookupError::Network { mac, source })?;
        if !response.status().is_success() {
            return Err(VendorLookupError::HttpStatus {
                mac,
                status: response.status().as_u16(),
            });
        }

        let name = response
            .text()
            .await
            .map_err(|source| VendorLookupError::Network { mac, source })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(VendorLookupError::Empty(mac));
        }

        Ok(name.to_string())
    }
}

impl VendorLookup for MacVendors {
    async fn vendor(&self, mac: MacAddr) -> String {
        let oui = [mac.0, mac.1, mac.2];
        if let Some(name) = self.cache.get(&oui).await {
            return name;
        }

        match self.fetch(mac).await {
            Ok(name) => {
                debug!(%mac, vendor = %name, "vendor resolved");
                self.cache.insert(oui, name.clone()).await;
                name
            }
            Err(err) => {
                warn!("could not get vendor name: {err}");
                NOT_AVAILABLE.into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MAC: MacAddr = MacAddr(0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e);

    fn client(server: &MockServer) -> MacVendors {
        MacVendors::new(format!("{}/", server.uri()), Duration::ZERO).unwrap()
    }

    #[tokio::test]
    async fn should_return_vendor_name_from_api() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/00:1a:2b:3c:4d:5e"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Ayecom Technology Co., Ltd.\n"))
            .mount(&server)
            .await;

        let vendors = client(&server);

        assert_eq!(vendors.vendor(MAC).await, "Ayecom Technology Co., Ltd.");
    }

    #[tokio::test]
    async fn should_fall_back_to_placeholder_when_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let vendors = client(&server);

        assert!(matches!(
            vendors.fetch(MAC).await,
            Err(VendorLookupError::HttpStatus { status: 404, .. })
        ));
        assert_eq!(vendors.vendor(MAC).await, NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn should_fall_back_to_placeholder_when_unreachable() {
        let vendors = MacVendors::new("http://127.0.0.1:1/", Duration::ZERO).unwrap();

        assert!(matches!(
            vendors.fetch(MAC).await,
            Err(VendorLookupError::Network { .. })
        ));
        assert_eq!(vendors.vendor(MAC).await, NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn should_cache_vendor_per_oui() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Acme"))
            .expect(1)
            .mount(&server)
            .await;

        let vendors = client(&server);
        let sibling = MacAddr::new(0x00, 0x1a, 0x2b, 0x00, 0x00, 0x01);

        assert_eq!(vendors.vendor(MAC).await, "Acme");
        assert_eq!(vendors.vendor(sibling).await, "Acme");
    }

    #[tokio::test]
    async fn should_send_user_agent_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(wiremock::matchers::header("User-Agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string("Acme"))
            .expect(1)
            .mount(&server)
            .await;

        let vendors = client(&server);

        assert_eq!(vendors.vendor(MAC).await, "Acme");
    }

    #[tokio::test]
    async fn should_reject_empty_vendor_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("   "))
            .mount(&server)
            .await;

        let vendors = client(&server);

        assert!(matches!(vendors.fetch(MAC).await, Err(VendorLookupError::Empty(_))));
    }
}
