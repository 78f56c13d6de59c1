pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{RunData, TweetAuthor, TweetItem, TweetSearchInput, UserProfile, UserScraperInput};

use serde::de::DeserializeOwned;
use serde::Serialize;
use types::ApiResponse;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor ID for apidojo/tweet-scraper.
const TWEET_SCRAPER: &str = "61RPP7dywgiy0JPD0";

/// Actor path for apidojo/twitter-user-scraper.
const USER_SCRAPER: &str = "apidojo~twitter-user-scraper";

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, BASE_URL)
    }

    /// Point the client at a different API root (e.g. a local proxy).
    pub fn with_base_url(token: String, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Start an actor run. Returns immediately with run metadata.
    pub async fn start_run<I: Serialize>(&self, actor: &str, input: &I) -> Result<RunData> {
        let url = format!("{}/acts/{}/runs", self.base_url, actor);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Poll until a run completes. Uses `waitForFinish=60` for efficient long-polling.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<RunData> {
        loop {
            let url = format!("{}/actor-runs/{}?waitForFinish=60", self.base_url, run_id);
            let resp = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;

            let resp = check_status(resp).await?;
            let api_resp: ApiResponse<RunData> = resp.json().await?;
            match api_resp.data.status.as_str() {
                "SUCCEEDED" => return Ok(api_resp.data),
                "FAILED" | "ABORTED" | "TIMED-OUT" => {
                    return Err(ApifyError::RunFailed {
                        run_id: run_id.to_string(),
                        status: api_resp.data.status,
                    });
                }
                _ => {
                    tracing::debug!(run_id, status = %api_resp.data.status, "Run still in progress");
                    continue;
                }
            }
        }
    }

    /// Fetch dataset items from a completed run.
    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let url = format!("{}/datasets/{}/items?format=json", self.base_url, dataset_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let items: Vec<T> = resp.json().await?;
        Ok(items)
    }

    /// Run an actor end-to-end: start, poll, fetch the default dataset.
    async fn run_actor<I: Serialize, T: DeserializeOwned>(
        &self,
        actor: &str,
        input: &I,
    ) -> Result<Vec<T>> {
        let run = self.start_run(actor, input).await?;
        tracing::info!(run_id = %run.id, actor, "Apify run started, polling for completion");

        let completed = self.wait_for_run(&run.id).await?;
        tracing::info!(
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            "Run completed, fetching results"
        );

        self.get_dataset_items(&completed.default_dataset_id).await
    }

    /// Run an advanced-search query, newest first, capped at `max_items`.
    ///
    /// Items are returned as the actor produced them, including in-band error
    /// items and the no-results placeholder.
    pub async fn search_tweets(&self, query: &str, max_items: u32) -> Result<Vec<TweetItem>> {
        tracing::info!(query, max_items, "Starting X/Twitter search");

        let input = TweetSearchInput {
            search_terms: vec![query.to_string()],
            max_items,
            sort: "Latest".to_string(),
        };
        let items: Vec<TweetItem> = self.run_actor(TWEET_SCRAPER, &input).await?;
        tracing::info!(count = items.len(), "Fetched tweet items");

        Ok(items)
    }

    /// Look up a single user profile by handle.
    pub async fn get_profile(&self, handle: &str) -> Result<UserProfile> {
        tracing::debug!(handle, "Looking up X/Twitter profile");

        let input = UserScraperInput {
            twitter_handles: vec![handle.to_string()],
            max_items: 1,
        };
        let profiles: Vec<UserProfile> = self.run_actor(USER_SCRAPER, &input).await?;

        profiles
            .into_iter()
            .find(|p| p.error.is_none() && p.id.is_some())
            .ok_or_else(|| ApifyError::ProfileNotFound(handle.to_string()))
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApifyError::Api {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(resp)
}
