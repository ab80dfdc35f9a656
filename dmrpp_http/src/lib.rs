//! A synchronous HTTP transport for the [`dmrpp`](https://docs.rs/dmrpp/latest/dmrpp/index.html) crate.
//!
//! [`HttpTransport`] reads byte ranges of `http://` and `https://` chunk sources with HTTP range requests.
//! Each transfer handle owns a [`reqwest::blocking::Client`] holding at most one idle connection per host, so a pooled handle is a reusable connection.
//!
//! Response status codes are mapped as follows:
//! - `206 Partial Content`: the body is the requested range,
//! - `200 OK`: accepted only for a range starting at offset zero (the byte count check rejects a longer body),
//! - `404 Not Found`, `410 Gone`, `416 Range Not Satisfiable`: [`StorageError::NotFound`],
//! - anything else, and connection failures and timeouts: [`StorageError::TransportError`].
//!
//! ## Licence
//! `dmrpp_http` is licensed under either of
//! - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//! - the MIT license <http://opensource.org/licenses/MIT>, at your option.

use std::time::Duration;

use dmrpp_storage::byte_range::ByteRange;
use dmrpp_storage::{
    ChunkSource, RangeBody, StorageError, TransferHandle, TransferHandleTraits, TransportTraits,
};
use reqwest::{header::RANGE, StatusCode};

/// A synchronous HTTP transport.
///
/// The default configuration has a 60 second per-request timeout and honours system proxy settings.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    system_proxy: bool,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(60)),
            connect_timeout: None,
            user_agent: None,
            system_proxy: true,
        }
    }
}

impl HttpTransport {
    /// Create a new HTTP transport with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Set the per-request timeout.
    ///
    /// The timeout covers connecting, sending the request and reading the entire response body.
    /// [`None`] disables the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Option<Duration>) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Set the `User-Agent` header sent with every request.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set whether or not to honour system proxy settings (e.g. `HTTP_PROXY`).
    #[must_use]
    pub fn with_system_proxy(mut self, system_proxy: bool) -> Self {
        self.system_proxy = system_proxy;
        self
    }
}

fn transport_error(err: &reqwest::Error) -> StorageError {
    if err.is_timeout() {
        StorageError::TransportError(format!("timed out: {err}"))
    } else {
        StorageError::TransportError(err.to_string())
    }
}

impl TransportTraits for HttpTransport {
    fn create_handle(&self) -> Result<TransferHandle, StorageError> {
        let mut builder = reqwest::blocking::Client::builder()
            .pool_max_idle_per_host(1)
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout);
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        if !self.system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build().map_err(|err| transport_error(&err))?;
        log::debug!("created HTTP transfer handle with timeout {:?}", self.timeout);
        Ok(Box::new(HttpTransferHandle { client }))
    }
}

struct HttpTransferHandle {
    client: reqwest::blocking::Client,
}

impl TransferHandleTraits for HttpTransferHandle {
    fn open_range(
        &mut self,
        source: &ChunkSource,
        byte_range: ByteRange,
    ) -> Result<RangeBody<'_>, StorageError> {
        if !source.is_http() {
            return Err(StorageError::UnsupportedSource(source.clone()));
        }
        let response = self
            .client
            .get(source.url().clone())
            .header(RANGE, byte_range.to_http_range())
            .send()
            .map_err(|err| transport_error(&err))?;
        match response.status() {
            StatusCode::PARTIAL_CONTENT => Ok(Box::new(response)),
            StatusCode::OK if byte_range.offset() == 0 => Ok(Box::new(response)),
            StatusCode::OK => Err(StorageError::TransportError(format!(
                "{source} ignored the range request for {byte_range}"
            ))),
            StatusCode::NOT_FOUND | StatusCode::GONE | StatusCode::RANGE_NOT_SATISFIABLE => Err(
                StorageError::NotFound(format!("{source} [{byte_range}]: {}", response.status())),
            ),
            status => Err(StorageError::TransportError(format!(
                "{source} [{byte_range}]: unexpected status {status}"
            ))),
        }
    }
}
