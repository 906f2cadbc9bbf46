// Comment tree materialization.
// Resolves descendants under a shared fan-out limit; failed branches become placeholders.

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{HnError, Result};
use crate::hn::{HnClient, Item};

/// Anything that can resolve an item by id.
#[async_trait]
pub trait ItemSource: Send + Sync {
    async fn resolve(&self, id: u64, cancel: &CancellationToken) -> Result<Item>;
}

#[async_trait]
impl<S: ItemSource + ?Sized> ItemSource for Arc<S> {
    async fn resolve(&self, id: u64, cancel: &CancellationToken) -> Result<Item> {
        (**self).resolve(id, cancel).await
    }
}

#[async_trait]
impl ItemSource for HnClient {
    async fn resolve(&self, id: u64, cancel: &CancellationToken) -> Result<Item> {
        self.item(id, cancel).await
    }
}

/// An item with its materialized children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub item: Item,
    /// Live children in the item's `kids` order. Empty at the depth limit.
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn leaf(item: Item) -> Self {
        Self {
            item,
            children: Vec::new(),
        }
    }

    /// Stand-in for a child that failed to resolve.
    pub fn placeholder(id: u64) -> Self {
        Self::leaf(Item::placeholder(id))
    }

    /// Number of nodes in this subtree, including this one.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(TreeNode::len).sum::<usize>()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Result of resolving one child: a subtree or the error that replaced it.
enum ChildOutcome {
    Resolved(TreeNode),
    Failed { id: u64, error: HnError },
}

/// Builds trees from an [`ItemSource`] with bounded concurrency.
pub struct TreeMaterializer<S> {
    source: S,
    limiter: Arc<Semaphore>,
}

impl<S: ItemSource> TreeMaterializer<S> {
    /// A materializer with its own limiter of `fanout_limit` permits.
    pub fn new(source: S, fanout_limit: usize) -> Self {
        Self::with_limiter(source, Arc::new(Semaphore::new(fanout_limit.max(1))))
    }

    /// A materializer that shares `limiter` with other materializers.
    pub fn with_limiter(source: S, limiter: Arc<Semaphore>) -> Self {
        Self { source, limiter }
    }

    /// Resolve `root_id` and its descendants down to `max_depth` levels below it.
    ///
    /// Root failures and cancellation are returned as errors. A child that fails
    /// becomes a deleted placeholder and is left out of its parent's children.
    pub async fn materialize(
        &self,
        root_id: u64,
        max_depth: usize,
        cancel: &CancellationToken,
    ) -> Result<TreeNode> {
        if cancel.is_cancelled() {
            return Err(HnError::Cancelled);
        }

        let root = self.source.resolve(root_id, cancel).await?;
        let tree = self.expand(root, 0, max_depth, cancel).await?;
        debug!(root_id, nodes = tree.len(), "materialized tree");
        Ok(tree)
    }

    fn expand<'a>(
        &'a self,
        item: Item,
        depth: usize,
        max_depth: usize,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<TreeNode>> {
        async move {
            if depth >= max_depth || item.kids.is_empty() {
                return Ok(TreeNode::leaf(item));
            }

            let outcomes = join_all(
                item.kids
                    .iter()
                    .map(|&id| self.resolve_child(id, depth + 1, max_depth, cancel)),
            )
            .await;

            if cancel.is_cancelled() {
                return Err(HnError::Cancelled);
            }

            let children = outcomes
                .into_iter()
                .map(|outcome| match outcome {
                    ChildOutcome::Resolved(node) => node,
                    ChildOutcome::Failed { id, error } => {
                        warn!(id, parent = item.id, error = %error, "child failed to resolve");
                        TreeNode::placeholder(id)
                    }
                })
                .filter(|node| !node.item.is_removed())
                .collect();

            Ok(TreeNode { item, children })
        }
        .boxed()
    }

    async fn resolve_child(
        &self,
        id: u64,
        depth: usize,
        max_depth: usize,
        cancel: &CancellationToken,
    ) -> ChildOutcome {
        let resolved = {
            let permit = tokio::select! {
                _ = cancel.cancelled() => {
                    return ChildOutcome::Failed { id, error: HnError::Cancelled };
                }
                permit = self.limiter.acquire() => permit,
            };
            let Ok(_permit) = permit else {
                return ChildOutcome::Failed {
                    id,
                    error: HnError::Other("fan-out limiter closed".to_string()),
                };
            };
            self.source.resolve(id, cancel).await
        };

        match resolved {
            Ok(item) => match self.expand(item, depth, max_depth, cancel).await {
                Ok(node) => ChildOutcome::Resolved(node),
                Err(error) => ChildOutcome::Failed { id, error },
            },
            Err(error) => ChildOutcome::Failed { id, error },
        }
    }
}
