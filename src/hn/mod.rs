// Hacker News API module.
// Provides the caching client, endpoint operations, and response types.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::HnClient;
pub use endpoints::Endpoints;
pub use types::*;
