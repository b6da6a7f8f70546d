//! Shared HTTP client construction.

use std::sync::OnceLock;
use std::time::Duration;

use tracing::debug;

use crate::{Error, Result};

/// Install the aws-lc-rs rustls provider once per process.
///
/// reqwest is built without a bundled provider, so this must run before the
/// first `Client` is created.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build a `reqwest::Client` with the given request timeout.
pub fn build_client(request_timeout: Duration) -> Result<reqwest::Client> {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("unturned-monitor/", env!("CARGO_PKG_VERSION")));
    if request_timeout > Duration::ZERO {
        builder = builder.timeout(request_timeout);
    }

    builder
        .build()
        .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))
}
