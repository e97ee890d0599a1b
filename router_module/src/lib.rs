pub mod adapters;
pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod forecast;
pub mod intent;
pub mod service;
pub mod task_board;

pub use config::{load_router_config, parse_router_config, resolve_router_config_path, RouterConfig};
pub use dispatcher::{EventDispatcher, EventOutcome, ReplyOutcome, SideEffectOutcome};
pub use error::{ExternalService, RouterError};
