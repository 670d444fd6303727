use tracing::warn;

/// Session-layer behavior switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Issue a new refresh token on every refresh, invalidating the old
    /// one. Default: `true`.
    pub rotate_refresh_tokens: bool,

    /// Reject a refresh whose `device_info` differs from the session's.
    /// When off, a mismatch is only logged. Default: `false`.
    pub bind_refresh_to_device: bool,

    /// Batch size used by `clean_expired_sessions`. Default: 500.
    pub sweep_batch_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rotate_refresh_tokens: true,
            bind_refresh_to_device: false,
            sweep_batch_size: 500,
        }
    }
}

impl SessionConfig {
    /// Fixes out-of-range values. Called by `SessionManager::new`.
    pub fn validated(mut self) -> Self {
        if self.sweep_batch_size == 0 {
            warn!("sweep_batch_size of 0 is not usable, using 1");
            self.sweep_batch_size = 1;
        }
        self
    }
}
