//! `classguard-gateway` — the only path from callers to storage.
//!
//! Every `read`, `write` and `call` goes through the policy engine first;
//! storage only ever sees filters that already carry the caller's scope.

pub mod error;
pub mod gateway;
pub mod mutation;

mod activity;
mod defaults;
mod resolve;

pub use error::{GatewayError, GatewayResult};
pub use gateway::QueryGateway;
pub use mutation::Mutation;
pub use resolve::resolve_filter;
