// Hacker News API endpoint functions.
// URL builders and typed, cache-backed methods for each endpoint.

use futures::future::try_join_all;
use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{HnError, Result};

use super::client::{HnClient, cancellable};
use super::types::{Item, SearchResults, StoryList, Updates, User};

/// Base URLs for the item API and the search API.
#[derive(Debug, Clone)]
pub struct Endpoints {
    api_base: Url,
    search_base: Url,
}

impl Endpoints {
    pub fn new(api_base: &str, search_base: &str) -> Result<Self> {
        Ok(Self {
            api_base: parse_base(api_base)?,
            search_base: parse_base(search_base)?,
        })
    }

    pub fn item(&self, id: u64) -> Result<Url> {
        join(&self.api_base, &format!("item/{}.json", id))
    }

    pub fn user(&self, name: &str) -> Result<Url> {
        if name.is_empty() || name.contains(['/', '?', '#']) {
            return Err(HnError::InvalidConfig(format!("invalid user name {:?}", name)));
        }
        join(&self.api_base, &format!("user/{}.json", name))
    }

    pub fn stories(&self, list: StoryList) -> Result<Url> {
        join(&self.api_base, &list.path())
    }

    pub fn max_item(&self) -> Result<Url> {
        join(&self.api_base, "maxitem.json")
    }

    pub fn updates(&self) -> Result<Url> {
        join(&self.api_base, "updates.json")
    }

    /// Story search, newest relevance first.
    pub fn search(&self, query: &str, page: u32) -> Result<Url> {
        let mut url = join(&self.search_base, "search")?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("tags", "story")
            .append_pair("page", &page.to_string());
        Ok(url)
    }
}

/// Parse a base URL, making sure relative joins land beneath it.
fn parse_base(raw: &str) -> Result<Url> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    let url = Url::parse(&normalized)
        .map_err(|e| HnError::InvalidConfig(format!("invalid base url {:?}: {}", raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(HnError::InvalidConfig(format!("{:?} cannot be a base url", raw)));
    }
    Ok(url)
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| HnError::InvalidConfig(format!("cannot build url for {}: {}", path, e)))
}

// Cache loads are shared by every caller waiting on a key, so they run under
// their own token. A caller that cancels stops waiting through `cancellable`
// and the load finishes for everyone else.
impl HnClient {
    /// Get an item, served from the cache when fresh enough.
    pub async fn item(&self, id: u64, cancel: &CancellationToken) -> Result<Item> {
        let client = self.clone();
        let token = CancellationToken::new();
        let key = id.to_string();
        let load = self
            .items()
            .get(&key, move || async move { client.fetch_item(id, &token).await });
        cancellable(cancel, load).await
    }

    /// Fetch an item from the network and replace the cached copy.
    pub async fn refresh_item(&self, id: u64, cancel: &CancellationToken) -> Result<Item> {
        let client = self.clone();
        let token = CancellationToken::new();
        let key = id.to_string();
        let load = self
            .items()
            .refresh(&key, move || async move { client.fetch_item(id, &token).await });
        cancellable(cancel, load).await
    }

    /// Get a user profile.
    pub async fn user(&self, name: &str, cancel: &CancellationToken) -> Result<User> {
        let client = self.clone();
        let token = CancellationToken::new();
        let owned = name.to_string();
        let load = self
            .users()
            .get(name, move || async move { client.fetch_user(&owned, &token).await });
        cancellable(cancel, load).await
    }

    /// Get the ranked ids of a story list.
    pub async fn story_ids(&self, list: StoryList, cancel: &CancellationToken) -> Result<Vec<u64>> {
        let client = self.clone();
        let token = CancellationToken::new();
        let load = self.lists().get(list.name(), move || async move {
            let url = client.endpoints().stories(list)?;
            Ok(client.get_json(url, &token).await?.unwrap_or_default())
        });
        cancellable(cancel, load).await
    }

    /// Get up to `limit` live stories from a list, in rank order.
    ///
    /// Items are fetched through the bulk rate limiter; deleted and dead ones are skipped.
    pub async fn stories(
        &self,
        list: StoryList,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Item>> {
        let ids = self.story_ids(list, cancel).await?;
        let fetches = ids
            .into_iter()
            .take(limit)
            .map(|id| self.bulk().schedule(self.item(id, cancel)));
        let items = try_join_all(fetches).await?;

        Ok(items.into_iter().filter(|item| !item.is_removed()).collect())
    }

    /// Largest item id currently assigned.
    pub async fn max_item(&self, cancel: &CancellationToken) -> Result<u64> {
        let url = self.endpoints().max_item()?;
        self.get_json(url, cancel)
            .await?
            .ok_or_else(|| HnError::Validation("maxitem returned null".to_string()))
    }

    /// Recently changed items and profiles.
    pub async fn updates(&self, cancel: &CancellationToken) -> Result<Updates> {
        let url = self.endpoints().updates()?;
        Ok(self.get_json(url, cancel).await?.unwrap_or_default())
    }

    /// Invalidate every cached item and profile reported as changed.
    pub async fn apply_updates(&self, cancel: &CancellationToken) -> Result<Updates> {
        let updates = self.updates(cancel).await?;
        for id in &updates.items {
            self.invalidate_item(*id);
        }
        for name in &updates.profiles {
            self.invalidate_user(name);
        }
        debug!(
            items = updates.items.len(),
            profiles = updates.profiles.len(),
            "applied upstream updates"
        );
        Ok(updates)
    }

    /// Search stories. Results are not cached.
    pub async fn search(
        &self,
        query: &str,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<SearchResults> {
        let url = self.endpoints().search(query, page)?;
        self.bulk()
            .schedule(async {
                self.get_json(url, cancel)
                    .await?
                    .ok_or_else(|| HnError::Validation("search returned null".to_string()))
            })
            .await
    }

    async fn fetch_item(&self, id: u64, cancel: &CancellationToken) -> Result<Item> {
        let url = self.endpoints().item(id)?;
        let item: Item = self
            .get_json(url, cancel)
            .await?
            .ok_or_else(|| HnError::NotFound(format!("item {}", id)))?;
        item.validate(id)?;
        Ok(item)
    }

    async fn fetch_user(&self, name: &str, cancel: &CancellationToken) -> Result<User> {
        let url = self.endpoints().user(name)?;
        let user: User = self
            .get_json(url, cancel)
            .await?
            .ok_or_else(|| HnError::NotFound(format!("user {}", name)))?;
        user.validate(name)?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::net::mock::{MockTransport, response};
    use crate::net::{HookRegistry, RetryPolicy};
    use std::sync::Arc;
    use std::time::Duration;

    fn endpoints() -> Endpoints {
        Endpoints::new("https://hn.test/v0", "https://search.test/api/v1/").unwrap()
    }

    fn client(transport: Arc<MockTransport>) -> HnClient {
        let config = ClientConfig {
            api_base: "https://hn.test/v0/".to_string(),
            search_base: "https://search.test/api/v1/".to_string(),
            retry: RetryPolicy::no_retry(),
            bulk_interval: Duration::ZERO,
            ..ClientConfig::default()
        };
        HnClient::with_parts(config, transport, HookRegistry::new()).unwrap()
    }

    /// Serve `{"id": N}` items, `[1,2,3]` for story lists, and 404 elsewhere.
    fn fake_api() -> Arc<MockTransport> {
        MockTransport::new(|req, _| {
            let path = req.url.path().to_string();
            if let Some(id) = path
                .strip_prefix("/v0/item/")
                .and_then(|rest| rest.strip_suffix(".json"))
            {
                let body = match id {
                    "404" => "null".to_string(),
                    "2" => r#"{"id": 2, "type": "story", "dead": true}"#.to_string(),
                    "13" => r#"{"id": 31, "type": "story"}"#.to_string(),
                    _ => format!(r#"{{"id": {id}, "type": "story"}}"#),
                };
                return Ok(response(req, 200, &body));
            }
            match path.as_str() {
                "/v0/topstories.json" => Ok(response(req, 200, "[1, 2, 3, 4]")),
                "/v0/user/pg.json" => Ok(response(
                    req,
                    200,
                    r#"{"id": "pg", "created": 1160418092, "karma": 155111}"#,
                )),
                "/v0/updates.json" => Ok(response(
                    req,
                    200,
                    r#"{"items": [1, 3], "profiles": ["pg"]}"#,
                )),
                "/v0/maxitem.json" => Ok(response(req, 200, "9130260")),
                "/api/v1/search" => Ok(response(
                    req,
                    200,
                    r#"{"hits": [{"objectID": "1", "title": "rust"}], "nbHits": 1, "page": 0, "nbPages": 1}"#,
                )),
                _ => Ok(response(req, 404, "")),
            }
        })
    }

    #[test]
    fn test_url_builders() {
        let endpoints = endpoints();

        assert_eq!(
            endpoints.item(8863).unwrap().as_str(),
            "https://hn.test/v0/item/8863.json"
        );
        assert_eq!(
            endpoints.user("pg").unwrap().as_str(),
            "https://hn.test/v0/user/pg.json"
        );
        assert_eq!(
            endpoints.stories(StoryList::Best).unwrap().as_str(),
            "https://hn.test/v0/beststories.json"
        );
        assert_eq!(
            endpoints.max_item().unwrap().as_str(),
            "https://hn.test/v0/maxitem.json"
        );
        assert_eq!(
            endpoints.search("rust async", 2).unwrap().as_str(),
            "https://search.test/api/v1/search?query=rust+async&tags=story&page=2"
        );
    }

    #[test]
    fn test_user_name_rejects_path_characters() {
        assert!(endpoints().user("../item/1").is_err());
        assert!(endpoints().user("").is_err());
    }

    #[test]
    fn test_invalid_base_rejected() {
        assert!(matches!(
            Endpoints::new("mailto:someone", "https://search.test/"),
            Err(HnError::InvalidConfig(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_item_is_cached_after_first_fetch() {
        let transport = fake_api();
        let client = client(transport.clone());
        let cancel = CancellationToken::new();

        let item = client.item(7, &cancel).await.unwrap();
        assert_eq!(item.id, 7);
        client.item(7, &cancel).await.unwrap();
        assert_eq!(transport.calls(), 1);

        client.refresh_item(7, &cancel).await.unwrap();
        assert_eq!(transport.calls(), 2);

        client.invalidate_item(7);
        client.item(7, &cancel).await.unwrap();
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_null_item_is_not_found() {
        let client = client(fake_api());

        let err = client.item(404, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, HnError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mismatched_item_is_validation_error() {
        let client = client(fake_api());

        let err = client.item(13, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, HnError::Validation(_)));
        assert!(!client.items().has("13"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stories_skip_dead_and_respect_limit() {
        let client = client(fake_api());

        let stories = client
            .stories(StoryList::Top, 3, &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<u64> = stories.iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_and_updates_invalidation() {
        let transport = fake_api();
        let client = client(transport.clone());
        let cancel = CancellationToken::new();

        let user = client.user("pg", &cancel).await.unwrap();
        assert_eq!(user.karma, 155111);
        client.item(1, &cancel).await.unwrap();
        client.item(5, &cancel).await.unwrap();

        let updates = client.apply_updates(&cancel).await.unwrap();
        assert_eq!(updates.items, vec![1, 3]);

        assert!(!client.items().has("1"));
        assert!(client.items().has("5"));
        assert!(!client.users().has("pg"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_item_and_search() {
        let client = client(fake_api());
        let cancel = CancellationToken::new();

        assert_eq!(client.max_item(&cancel).await.unwrap(), 9130260);

        let results = client.search("rust", 0, &cancel).await.unwrap();
        assert_eq!(results.total_hits, 1);
        assert_eq!(results.hits[0].title.as_deref(), Some("rust"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_caller_stops_waiting() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let transport = fake_api();
        let client = client(transport.clone());
        let err = client.item(1, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(transport.calls(), 0);
    }

    /// Items 1 and 2 with 1 -> [2, 3], every call taking 100ms.
    fn slow_api() -> Arc<MockTransport> {
        MockTransport::delayed(Duration::from_millis(100), |req, _| {
            let body = match req.url.path() {
                "/v0/item/1.json" => r#"{"id": 1, "type": "story", "kids": [2, 3]}"#,
                "/v0/item/2.json" => r#"{"id": 2, "type": "comment"}"#,
                "/v0/item/3.json" => r#"{"id": 3, "type": "comment"}"#,
                _ => "null",
            };
            Ok(response(req, 200, body))
        })
    }

    fn cancel_after(cancel: &CancellationToken, millis: u64) {
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            trigger.cancel();
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelling_one_caller_leaves_other_waiters() {
        let transport = slow_api();
        let client = client(transport.clone());
        let first = CancellationToken::new();
        let second = CancellationToken::new();
        cancel_after(&first, 10);

        let (a, b) = tokio::join!(client.item(1, &first), client.item(1, &second));

        assert!(a.unwrap_err().is_cancelled());
        assert_eq!(b.unwrap().id, 1);
        assert!(!second.is_cancelled());
        assert_eq!(transport.calls(), 1);
        assert!(client.items().has("1"));
        assert!(!client.items().is_loading("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_load_still_caches_for_later_callers() {
        let transport = slow_api();
        let client = client(transport.clone());
        let cancel = CancellationToken::new();
        cancel_after(&cancel, 10);

        assert!(client.item(2, &cancel).await.unwrap_err().is_cancelled());
        tokio::time::sleep(Duration::from_millis(200)).await;

        let item = client.item(2, &CancellationToken::new()).await.unwrap();
        assert_eq!(item.id, 2);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_tree_does_not_strip_concurrent_tree() {
        let client = client(slow_api());
        let first = CancellationToken::new();
        let second = CancellationToken::new();
        cancel_after(&first, 150);

        let (a, b) = tokio::join!(client.tree(1, 1, &first), client.tree(1, 1, &second));

        assert!(a.unwrap_err().is_cancelled());
        let tree = b.unwrap();
        let kids: Vec<u64> = tree.children.iter().map(|child| child.item.id).collect();
        assert_eq!(kids, vec![2, 3]);
    }
}
