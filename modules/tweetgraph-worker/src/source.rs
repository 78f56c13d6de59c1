use anyhow::Result;
use async_trait::async_trait;

use apify_client::{ApifyClient, ApifyError, TweetItem};
use tweetgraph_common::{Profile, ResultRecord, SearchItem};

use crate::traits::ContentSource;

/// X/Twitter content source backed by Apify actors.
pub struct ApifySource {
    client: ApifyClient,
}

impl ApifySource {
    pub fn new(client: ApifyClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContentSource for ApifySource {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchItem>> {
        let items = self.client.search_tweets(query, max_results).await?;
        Ok(items
            .into_iter()
            .filter_map(into_search_item)
            .take(max_results as usize)
            .collect())
    }

    async fn profile(&self, handle: &str) -> Result<Option<Profile>> {
        match self.client.get_profile(handle).await {
            Ok(p) => Ok(p.id.map(|user_id| Profile {
                username: p.user_name.unwrap_or_else(|| handle.to_string()),
                user_id,
                name: p.name,
            })),
            Err(ApifyError::ProfileNotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Map one dataset item to a search outcome. Placeholders and retweets are dropped;
/// error items and items missing required fields become `Failed`.
pub fn into_search_item(mut item: TweetItem) -> Option<SearchItem> {
    if item.is_placeholder() || item.is_retweet.unwrap_or(false) {
        return None;
    }
    if let Some(error) = item.error.take() {
        return Some(SearchItem::Failed(error));
    }

    let created_at = match item.created_at_utc() {
        Some(dt) => dt,
        None => {
            return Some(SearchItem::Failed(format!(
                "tweet {} has no parseable createdAt",
                item.id.as_deref().unwrap_or("?")
            )))
        }
    };
    let text = item.content().map(str::to_string);
    let author = item.author.unwrap_or_default();

    match (item.id, author.user_name, text) {
        (Some(id), Some(username), Some(text)) => Some(SearchItem::Record(ResultRecord {
            id,
            username,
            user_id: author.id,
            text,
            created_at,
            permanent_url: item.url,
        })),
        (id, _, _) => Some(SearchItem::Failed(format!(
            "tweet {} is missing id, author or text",
            id.as_deref().unwrap_or("?")
        ))),
    }
}
