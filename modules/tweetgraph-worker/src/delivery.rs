use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use tweetgraph_common::{DateWindow, RequestGroup, ResultRecord, Ticket, TweetGraphError};

use crate::loopback::LoopbackClient;
use crate::traits::{DeliveryStats, GroupSink};

const INSERT_PATH: &str = "/TwitScraps/insert2GraphDB";

/// Hands request groups to the ticket API, which performs the graph writes itself.
/// One POST of `{tweets, id}` per group.
pub struct LoopbackDelivery {
    api: LoopbackClient,
}

impl LoopbackDelivery {
    pub fn new(api: LoopbackClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl GroupSink for LoopbackDelivery {
    async fn deliver(
        &self,
        ticket: &Ticket,
        _window: &DateWindow,
        groups: &[RequestGroup],
        cancel: &CancellationToken,
    ) -> Result<DeliveryStats, TweetGraphError> {
        let mut stats = DeliveryStats::default();

        for (i, group) in groups.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(TweetGraphError::Cancelled);
            }
            self.api
                .post(INSERT_PATH, &InsertBody::from(group))
                .await
                .map_err(|e| {
                    TweetGraphError::Delivery(format!("group {} of {}: {e:#}", i + 1, groups.len()))
                })?;
            stats.groups += 1;
            stats.tweets += group.tweets.len() as u64;
        }

        info!(
            ticket_id = ticket.id,
            groups = stats.groups,
            tweets = stats.tweets,
            url = %self.api.url(INSERT_PATH),
            "Delivered to ingestion API"
        );
        Ok(stats)
    }
}

// --- Wire format ---
//
// The ingestion endpoint reads tweets in the scraper library's shape: untagged Go
// struct fields, so keys are the capitalized field names. Absent strings are "".

#[derive(Debug, Serialize)]
struct InsertBody<'a> {
    tweets: Vec<InsertTweet<'a>>,
    id: i64,
}

#[derive(Debug, Serialize)]
struct InsertTweet<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    #[serde(rename = "Username")]
    username: &'a str,
    #[serde(rename = "UserID")]
    user_id: &'a str,
    #[serde(rename = "Text")]
    text: &'a str,
    #[serde(rename = "TimeParsed")]
    time_parsed: DateTime<Utc>,
    #[serde(rename = "Timestamp")]
    timestamp: i64,
    #[serde(rename = "PermanentURL")]
    permanent_url: &'a str,
}

impl<'a> From<&'a RequestGroup> for InsertBody<'a> {
    fn from(group: &'a RequestGroup) -> Self {
        Self {
            tweets: group.tweets.iter().map(InsertTweet::from).collect(),
            id: group.id,
        }
    }
}

impl<'a> From<&'a ResultRecord> for InsertTweet<'a> {
    fn from(record: &'a ResultRecord) -> Self {
        Self {
            id: &record.id,
            username: &record.username,
            user_id: record.user_id.as_deref().unwrap_or(""),
            text: &record.text,
            time_parsed: record.created_at,
            timestamp: record.created_at.timestamp(),
            permanent_url: record.permanent_url.as_deref().unwrap_or(""),
        }
    }
}
