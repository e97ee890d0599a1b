//! Messaging platform adapters.
//!
//! Only LINE is wired up; the `InboundAdapter` trait keeps payload parsing separate
//! from dispatch.

pub mod line;

pub use line::{
    sign_line_body, verify_line_signature, LineInboundAdapter, LineMessagingClient, LineWebhook,
};
