use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use tweetgraph_common::{Ticket, TicketOrder};

use crate::loopback::LoopbackClient;
use crate::traits::TicketStore;

const COLLECTION: &str = "/TwitScraps";

/// Ticket store backed by the LoopBack `TwitScraps` REST collection.
///
/// Claiming lists a few eligible candidates, then marks one running with a
/// conditional update (`where id = ? and statusRunning = false`). The store reports
/// how many rows it changed, so two workers racing for the same ticket cannot both win.
pub struct LoopbackTicketStore {
    api: LoopbackClient,
    order: TicketOrder,
    candidates: u32,
}

#[derive(Debug, Deserialize)]
struct UpdateCount {
    count: u64,
}

impl LoopbackTicketStore {
    pub fn new(api: LoopbackClient, order: TicketOrder, candidates: u32) -> Self {
        Self {
            api,
            order,
            candidates,
        }
    }

    async fn try_mark_running(&self, ticket_id: i64) -> Result<bool> {
        let update: UpdateCount = self
            .api
            .post_json(
                &format!("{COLLECTION}/update"),
                &[("where", unclaimed_where(ticket_id).to_string())],
                &json!({ "statusRunning": true }),
            )
            .await?;
        Ok(update.count == 1)
    }
}

#[async_trait]
impl TicketStore for LoopbackTicketStore {
    async fn claim(&self, today: NaiveDate) -> Result<Option<Ticket>> {
        let filter = eligible_filter(today, self.order, self.candidates);
        let candidates: Vec<Ticket> = self
            .api
            .get_json(COLLECTION, &[("filter", filter.to_string())])
            .await?;

        debug!(count = candidates.len(), "Fetched candidate tickets");

        for ticket in candidates.into_iter().filter(|t| is_eligible(t, today)) {
            if self.try_mark_running(ticket.id).await? {
                info!(ticket_id = ticket.id, "Claimed ticket");
                return Ok(Some(Ticket {
                    running: true,
                    ..ticket
                }));
            }
            debug!(ticket_id = ticket.id, "Ticket claimed by another worker, trying next");
        }

        Ok(None)
    }

    async fn release(&self, ticket_id: i64) -> Result<()> {
        self.api
            .patch(
                &format!("{COLLECTION}/{ticket_id}"),
                &json!({ "statusRunning": false }),
            )
            .await?;
        info!(ticket_id, "Released ticket");
        Ok(())
    }
}

/// LoopBack filter for tickets that are idle and whose window has not ended.
pub fn eligible_filter(today: NaiveDate, order: TicketOrder, limit: u32) -> Value {
    let order = match order {
        TicketOrder::OldestFirst => "id ASC",
        TicketOrder::NewestFirst => "id DESC",
    };
    json!({
        "where": {
            "statusRunning": false,
            "or": [
                { "to": null },
                { "to": "" },
                { "to": { "gte": today.format("%Y-%m-%d").to_string() } },
            ],
        },
        "order": order,
        "limit": limit,
    })
}

/// `where` clause for the conditional claim.
pub fn unclaimed_where(ticket_id: i64) -> Value {
    json!({ "id": ticket_id, "statusRunning": false })
}

/// Client-side recheck of the eligibility rules, in case the store's filter is looser.
pub fn is_eligible(ticket: &Ticket, today: NaiveDate) -> bool {
    !ticket.running && ticket.until.map_or(true, |until| until >= today)
}
