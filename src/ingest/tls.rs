use std::sync::Once;

static INSTALL: Once = Once::new();

/// rustls needs a process-wide crypto provider before the first `wss://`
/// handshake. Safe to call from every connect attempt.
pub fn install_crypto_provider() {
    INSTALL.call_once(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            tracing::debug!("rustls crypto provider already installed");
        }
    });
}
