use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Explicit, cheaply clonable state handed to every pipeline component.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub config: Arc<Config>,
    /// Cancelling this stops the coordinator from waiting on outstanding fetches.
    pub cancel: CancellationToken,
}

impl Context {
    pub fn new(config: Config) -> Self {
        Self { config: Arc::new(config), cancel: CancellationToken::new() }
    }
}
