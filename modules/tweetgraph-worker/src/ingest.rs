use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tweetgraph_common::{DateWindow, RequestGroup, Ticket, TweetGraphError, TwitterAccount};
use tweetgraph_graph::PostingRow;

use crate::traits::{ContentSource, DeliveryStats, GraphSink, GroupSink};

/// Writes request groups into the graph in three MERGE phases:
/// accounts (once per cycle), then tweets and POSTED edges (once per group).
pub struct Ingestor {
    graph: Arc<dyn GraphSink>,
    source: Arc<dyn ContentSource>,
}

impl Ingestor {
    pub fn new(graph: Arc<dyn GraphSink>, source: Arc<dyn ContentSource>) -> Self {
        Self { graph, source }
    }

    /// Distinct authors in first-seen order, with their external ids. Ids embedded
    /// in the results are used directly; the rest are looked up by handle.
    async fn resolve_accounts(
        &self,
        ticket: &Ticket,
        window: &DateWindow,
        groups: &[RequestGroup],
        cancel: &CancellationToken,
    ) -> Result<(Vec<TwitterAccount>, usize), TweetGraphError> {
        let mut ids: HashMap<&str, Option<&str>> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();
        for record in groups.iter().flat_map(|g| &g.tweets) {
            let entry = ids.entry(record.username.as_str()).or_insert_with(|| {
                order.push(record.username.as_str());
                None
            });
            if entry.is_none() {
                *entry = record.user_id.as_deref();
            }
        }

        let mut accounts = Vec::with_capacity(order.len());
        let mut unresolved = 0usize;
        for username in order {
            let user_id = match ids.get(username).copied().flatten() {
                Some(id) => id.to_string(),
                None => {
                    check_cancelled(cancel)?;
                    let profile = self.source.profile(username).await.map_err(|e| {
                        TweetGraphError::Source(format!("profile lookup for @{username}: {e:#}"))
                    })?;
                    match profile {
                        Some(p) => p.user_id,
                        None => {
                            warn!(username, "Profile not found, skipping author");
                            unresolved += 1;
                            continue;
                        }
                    }
                }
            };
            accounts.push(TwitterAccount {
                username: username.to_string(),
                user_id,
                from: window.first(),
                to: window.last(),
                created_by: ticket.created_by,
            });
        }

        Ok((accounts, unresolved))
    }
}

#[async_trait]
impl GroupSink for Ingestor {
    async fn deliver(
        &self,
        ticket: &Ticket,
        window: &DateWindow,
        groups: &[RequestGroup],
        cancel: &CancellationToken,
    ) -> Result<DeliveryStats, TweetGraphError> {
        let mut stats = DeliveryStats::default();
        if groups.is_empty() {
            return Ok(stats);
        }

        // Phase 1: accounts
        let (accounts, unresolved) = self.resolve_accounts(ticket, window, groups, cancel).await?;
        stats.unresolved_authors = unresolved;
        check_cancelled(cancel)?;
        stats.accounts = self
            .graph
            .merge_accounts(&accounts)
            .await
            .map_err(graph_error("account upsert"))?;

        let user_ids: HashMap<&str, &str> = accounts
            .iter()
            .map(|a| (a.username.as_str(), a.user_id.as_str()))
            .collect();
        let tag = ticket.context_tag();

        // Phases 2 and 3: tweets then postings, one call each per group
        for group in groups {
            check_cancelled(cancel)?;
            stats.tweets += self
                .graph
                .merge_tweets(&group.tweets)
                .await
                .map_err(graph_error("tweet upsert"))?;

            let postings: Vec<PostingRow> = group
                .tweets
                .iter()
                .filter_map(|t| {
                    user_ids.get(t.username.as_str()).map(|user_id| PostingRow {
                        username: t.username.clone(),
                        user_id: user_id.to_string(),
                        tweet_id: t.id.clone(),
                    })
                })
                .collect();

            check_cancelled(cancel)?;
            stats.postings += self
                .graph
                .merge_postings(&tag, &postings)
                .await
                .map_err(graph_error("posting upsert"))?;
            stats.groups += 1;
        }

        info!(
            ticket_id = ticket.id,
            groups = stats.groups,
            accounts = stats.accounts,
            tweets = stats.tweets,
            postings = stats.postings,
            tag = tag.as_str(),
            "Ingested into graph"
        );
        Ok(stats)
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), TweetGraphError> {
    if cancel.is_cancelled() {
        return Err(TweetGraphError::Cancelled);
    }
    Ok(())
}

fn graph_error(phase: &'static str) -> impl Fn(anyhow::Error) -> TweetGraphError {
    move |e| TweetGraphError::Graph(format!("{phase} failed: {e:#}"))
}
