use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tweetgraph_common::{
    DateWindow, DayChunk, InBandErrorPolicy, ResultRecord, SearchItem, Ticket, TweetGraphError,
};

use crate::traits::ContentSource;

/// Base search query for a ticket, before the per-day date clause is added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    base: String,
}

impl SearchQuery {
    /// `-filter:retweets [keyword] [(from:account)]`
    pub fn for_ticket(ticket: &Ticket) -> Self {
        let mut base = String::from("-filter:retweets");
        if let Some(keyword) = &ticket.keyword {
            base.push(' ');
            base.push_str(keyword);
        }
        if let Some(account) = &ticket.account {
            base.push_str(" (from:");
            base.push_str(account.trim_start_matches('@'));
            base.push(')');
        }
        Self { base }
    }

    /// Full query for one day chunk.
    pub fn for_chunk(&self, chunk: &DayChunk) -> String {
        format!(
            "{} since:{} until:{}",
            self.base,
            chunk.start.format("%Y-%m-%d"),
            chunk.end.format("%Y-%m-%d")
        )
        .trim()
        .to_string()
    }
}

/// Counters for one scrape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub chunks: usize,
    pub records: usize,
    /// In-band item failures that were skipped.
    pub failed_items: usize,
    /// Chunk calls repeated after a transport error.
    pub retries: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOutput {
    pub records: Vec<ResultRecord>,
    pub stats: SearchStats,
}

/// Runs a ticket's search one day at a time, oldest day first, pausing between calls.
pub struct SearchExecutor<'a> {
    source: &'a dyn ContentSource,
    delay: Duration,
    max_results: u32,
    retries: u32,
    policy: InBandErrorPolicy,
}

impl<'a> SearchExecutor<'a> {
    pub fn new(
        source: &'a dyn ContentSource,
        delay: Duration,
        max_results: u32,
        retries: u32,
        policy: InBandErrorPolicy,
    ) -> Self {
        Self {
            source,
            delay,
            max_results,
            retries,
            policy,
        }
    }

    pub async fn run(
        &self,
        ticket: &Ticket,
        window: &DateWindow,
        cancel: &CancellationToken,
    ) -> Result<SearchOutput, TweetGraphError> {
        let query = SearchQuery::for_ticket(ticket);
        let mut output = SearchOutput::default();

        for (i, chunk) in window.days().enumerate() {
            if i > 0 {
                pause(self.delay, cancel).await?;
            }

            let q = query.for_chunk(&chunk);
            let items = self.search_chunk(&q, cancel, &mut output.stats).await?;
            let before = output.records.len();

            for item in items {
                match item {
                    SearchItem::Record(record) => output.records.push(record),
                    SearchItem::Failed(reason) => match self.policy {
                        InBandErrorPolicy::Abort => {
                            return Err(TweetGraphError::Source(format!(
                                "search '{q}' returned an error item: {reason}"
                            )));
                        }
                        InBandErrorPolicy::Skip => {
                            warn!(query = %q, %reason, "Skipping failed result item");
                            output.stats.failed_items += 1;
                        }
                    },
                }
            }

            output.stats.chunks += 1;
            info!(
                ticket_id = ticket.id,
                day = %chunk.start,
                count = output.records.len() - before,
                "Scraped day"
            );
        }

        output.stats.records = output.records.len();
        Ok(output)
    }

    /// One chunk call, retried with exponential backoff on transport errors.
    async fn search_chunk(
        &self,
        query: &str,
        cancel: &CancellationToken,
        stats: &mut SearchStats,
    ) -> Result<Vec<SearchItem>, TweetGraphError> {
        let mut attempt = 0u32;
        loop {
            let result = tokio::select! {
                biased;

                _ = cancel.cancelled() => return Err(TweetGraphError::Cancelled),
                r = self.source.search(query, self.max_results) => r,
            };

            match result {
                Ok(items) => return Ok(items),
                Err(e) if attempt < self.retries => {
                    let backoff = self.delay * 2u32.saturating_pow(attempt);
                    warn!(query, attempt, error = %e, ?backoff, "Search failed, retrying");
                    attempt += 1;
                    stats.retries += 1;
                    pause(backoff, cancel).await?;
                }
                Err(e) => {
                    return Err(TweetGraphError::Source(format!(
                        "search '{query}' failed after {} attempt(s): {e:#}",
                        attempt + 1
                    )));
                }
            }
        }
    }
}

/// Sleep unless the cycle is cancelled first.
pub async fn pause(delay: Duration, cancel: &CancellationToken) -> Result<(), TweetGraphError> {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(TweetGraphError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
