use std::sync::Arc;

use crate::adapters::line::LineInboundAdapter;
use crate::config::RouterConfig;
use crate::dispatcher::EventDispatcher;

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub(super) config: Arc<RouterConfig>,
    pub(super) dispatcher: Arc<EventDispatcher>,
    pub(super) inbound: LineInboundAdapter,
}

impl AppState {
    pub fn new(config: Arc<RouterConfig>, dispatcher: Arc<EventDispatcher>) -> Self {
        Self {
            config,
            dispatcher,
            inbound: LineInboundAdapter::new(),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }
}
