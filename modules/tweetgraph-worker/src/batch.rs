use tweetgraph_common::{RequestGroup, ResultRecord};

/// Split scraped records into groups of at most `size`, keeping input order.
/// Every group but the last holds exactly `size` records; no empty group is emitted.
pub fn batch(records: Vec<ResultRecord>, ticket_id: i64, size: usize) -> Vec<RequestGroup> {
    let size = size.max(1);
    let mut groups = Vec::with_capacity(records.len().div_ceil(size));
    let mut records = records.into_iter().peekable();

    while records.peek().is_some() {
        groups.push(RequestGroup {
            tweets: records.by_ref().take(size).collect(),
            id: ticket_id,
        });
    }

    groups
}
