// hnkit library root.
// Cached, retrying Hacker News client with comment tree materialization.

pub mod cache;
pub mod config;
pub mod error;
pub mod hn;
pub mod net;
pub mod tree;

pub use cache::{CacheConfig, ErrorSink, Freshness, SwrCache};
pub use config::ClientConfig;
pub use error::{HnError, Result};
pub use hn::{Endpoints, HnClient, Item, ItemType, SearchResults, StoryList, Updates, User};
pub use net::{Hook, HookRegistry, RateLimiter, Request, Response, RetryPolicy, Transport, fetch};
pub use tree::{ItemSource, TreeMaterializer, TreeNode};
