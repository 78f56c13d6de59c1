use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

// --- Tweet search ---

/// Input for X/Twitter advanced search via apidojo/tweet-scraper.
#[derive(Debug, Clone, Serialize)]
pub struct TweetSearchInput {
    #[serde(rename = "searchTerms")]
    pub search_terms: Vec<String>,
    #[serde(rename = "maxItems")]
    pub max_items: u32,
    /// "Latest" or "Top".
    pub sort: String,
}

/// Author info nested inside a tweet item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TweetAuthor {
    pub id: Option<String>,
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    pub name: Option<String>,
}

/// A single dataset item from the tweet scraper.
///
/// The actor reports problems in-band: an item may carry `error` instead of tweet
/// fields, and an empty search yields a lone `{"noResults": true}` placeholder.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TweetItem {
    pub id: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "fullText")]
    pub full_text: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    pub author: Option<TweetAuthor>,
    #[serde(rename = "isRetweet")]
    pub is_retweet: Option<bool>,
    #[serde(rename = "noResults")]
    pub no_results: Option<bool>,
    pub error: Option<String>,
}

impl TweetItem {
    /// Returns whichever text field is populated, preferring `fullText`.
    pub fn content(&self) -> Option<&str> {
        self.full_text.as_deref().or(self.text.as_deref())
    }

    /// True for the placeholder item the actor emits when a search matched nothing.
    pub fn is_placeholder(&self) -> bool {
        self.no_results.unwrap_or(false)
    }

    /// Parse `createdAt`. The actor emits Twitter's legacy format
    /// (`Sat Jan 01 10:00:00 +0000 2022`); RFC 3339 is accepted too.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?;
        DateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %z %Y")
            .or_else(|_| DateTime::parse_from_rfc3339(raw))
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

// --- Profiles ---

/// Input for the apidojo/twitter-user-scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct UserScraperInput {
    #[serde(rename = "twitterHandles")]
    pub twitter_handles: Vec<String>,
    #[serde(rename = "maxItems")]
    pub max_items: u32,
}

/// A user profile from the Apify dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: Option<String>,
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    pub name: Option<String>,
    pub error: Option<String>,
}
