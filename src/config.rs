//! Session-level tuning, distinct from CLI/file configuration. This
//! is internal behavior governing a single session's runtime limits
//! and verbosity.

/// Construction-time options for a [`crate::session::Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Reject `init_scops` if the front-end reports more SCoPs than this.
    pub max_scops: usize,
    /// Emit a `tracing` event for every oracle verdict, not just rejections.
    pub verbose_oracle: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig { max_scops: 4096, verbose_oracle: false }
    }
}
