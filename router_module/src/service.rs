mod handlers;
mod server;
mod state;
mod verify;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use server::{build_router, build_state, run_server};
pub use state::AppState;
pub use verify::PUSH_TOKEN_HEADER;
