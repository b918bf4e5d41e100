//! HTTP retrieval of remote CSV resources.
//!
//! The pipeline only talks to the [`HttpFetcher`] trait, so the web shell and
//! the tests can swap the transport. [`ReqwestFetcher`] is the default
//! implementation and needs the `http` feature.

use anyhow::Result;

/// Status code and body of one HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub bytes: Vec<u8>,
}

impl FetchResponse {
    pub fn ok(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            bytes: bytes.into(),
        }
    }
}

/// Performs a single GET request for a URL.
///
/// Implementations must be `Send + Sync` so one pipeline can serve several
/// request handlers. Transport failures are returned as errors; any HTTP
/// status, including error statuses, is returned as a response.
pub trait HttpFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FetchResponse>;

    /// Name for logging.
    fn name(&self) -> &str;
}

/// Fetcher used when the crate is built without HTTP support.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledFetcher;

impl HttpFetcher for DisabledFetcher {
    fn fetch(&self, _url: &str) -> Result<FetchResponse> {
        anyhow::bail!("URL sources are not supported in this build")
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

#[cfg(feature = "http")]
pub use reqwest_fetcher::ReqwestFetcher;

#[cfg(feature = "http")]
mod reqwest_fetcher {
    use super::{FetchResponse, HttpFetcher};
    use anyhow::Result;
    use reqwest::blocking::Client;
    use std::time::Duration;
    use tracing::debug;

    const USER_AGENT: &str = concat!("datasift/", env!("CARGO_PKG_VERSION"));

    /// Blocking reqwest client with a request timeout.
    pub struct ReqwestFetcher {
        client: Client,
    }

    impl ReqwestFetcher {
        /// Create a fetcher whose requests give up after `timeout_secs`.
        ///
        /// # Errors
        ///
        /// Returns an error if the HTTP client cannot be created.
        pub fn new(timeout_secs: u64) -> crate::error::Result<Self> {
            let client = Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .user_agent(USER_AGENT)
                .build()?;
            Ok(Self { client })
        }
    }

    impl HttpFetcher for ReqwestFetcher {
        fn fetch(&self, url: &str) -> Result<FetchResponse> {
            let response = self.client.get(url).send()?;
            let status = response.status().as_u16();
            debug!("GET {} -> {}", url, status);
            let bytes = response.bytes()?.to_vec();
            Ok(FetchResponse { status, bytes })
        }

        fn name(&self) -> &str {
            "reqwest"
        }
    }
}
