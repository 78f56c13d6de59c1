// Trait seams between the pipeline and its external collaborators.
//
// TicketStore:  the job queue the worker claims work from.
// ContentSource: search + profile lookup against X/Twitter.
// GraphSink:    the three MERGE upserts against the graph.
// GroupSink:    where request groups go once scraped (graph ingest or API hand-off).
//
// Each has one production adapter and one mock in `testing`, so a whole cycle
// runs in tests with no network and no database.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;

use tweetgraph_common::{
    DateWindow, Profile, RequestGroup, ResultRecord, SearchItem, Ticket, TweetGraphError,
    TwitterAccount,
};
use tweetgraph_graph::{GraphWriter, PostingRow};

// ---------------------------------------------------------------------------
// TicketStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Claim one eligible ticket (not running, window not yet over on `today`)
    /// and mark it running. `None` when nothing is eligible.
    async fn claim(&self, today: NaiveDate) -> Result<Option<Ticket>>;

    /// Clear the running flag, unconditionally.
    async fn release(&self, ticket_id: i64) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ContentSource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Run one search, returning at most `max_results` items in source order.
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchItem>>;

    /// Look up an author by handle. `None` if the account does not exist.
    async fn profile(&self, handle: &str) -> Result<Option<Profile>>;
}

// ---------------------------------------------------------------------------
// GraphSink
// ---------------------------------------------------------------------------

#[async_trait]
pub trait GraphSink: Send + Sync {
    async fn merge_accounts(&self, accounts: &[TwitterAccount]) -> Result<u64>;

    async fn merge_tweets(&self, tweets: &[ResultRecord]) -> Result<u64>;

    async fn merge_postings(&self, tag: &str, postings: &[PostingRow]) -> Result<u64>;
}

#[async_trait]
impl GraphSink for GraphWriter {
    async fn merge_accounts(&self, accounts: &[TwitterAccount]) -> Result<u64> {
        Ok(self.merge_accounts(accounts).await?)
    }

    async fn merge_tweets(&self, tweets: &[ResultRecord]) -> Result<u64> {
        Ok(self.merge_tweets(tweets).await?)
    }

    async fn merge_postings(&self, tag: &str, postings: &[PostingRow]) -> Result<u64> {
        Ok(self.merge_postings(tag, postings).await?)
    }
}

// ---------------------------------------------------------------------------
// GroupSink
// ---------------------------------------------------------------------------

/// Totals reported by a [`GroupSink`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub groups: usize,
    pub accounts: u64,
    pub tweets: u64,
    pub postings: u64,
    /// Authors whose profile could not be resolved; their tweets get no POSTED edge.
    pub unresolved_authors: usize,
}

#[async_trait]
pub trait GroupSink: Send + Sync {
    /// Deliver every group for `ticket`. Any failure is fatal to the cycle.
    async fn deliver(
        &self,
        ticket: &Ticket,
        window: &DateWindow,
        groups: &[RequestGroup],
        cancel: &CancellationToken,
    ) -> std::result::Result<DeliveryStats, TweetGraphError>;
}
