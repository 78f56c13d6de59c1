use chrono::NaiveDate;
use neo4rs::{query, BoltInteger, BoltMap, BoltString, BoltType};
use tracing::debug;

use tweetgraph_common::{ResultRecord, TwitterAccount};

use crate::GraphClient;

/// One `(:TwitterAccount)-[:POSTED]->(:Tweet)` edge to upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct PostingRow {
    pub username: String,
    pub user_id: String,
    pub tweet_id: String,
}

/// Node and edge totals, for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphCounts {
    pub accounts: i64,
    pub tweets: i64,
    pub postings: i64,
}

/// Write-side wrapper for the tweet graph. Every write is a MERGE, so re-running
/// the same input never duplicates nodes or edges.
pub struct GraphWriter {
    client: GraphClient,
}

impl GraphWriter {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Upsert author nodes keyed on (username, user_id). Creation stamps the
    /// attribution window and creator; an existing node is left untouched.
    pub async fn merge_accounts(&self, accounts: &[TwitterAccount]) -> Result<u64, neo4rs::Error> {
        if accounts.is_empty() {
            return Ok(0);
        }

        let rows: Vec<BoltType> = accounts
            .iter()
            .map(|a| {
                bolt_map(vec![
                    ("username", bolt_str(&a.username)),
                    ("user_id", bolt_str(&a.user_id)),
                    ("from", bolt_str(&format_date(a.from))),
                    ("to", bolt_str(&format_date(a.to))),
                    ("created_by", BoltType::Integer(BoltInteger::new(a.created_by))),
                ])
            })
            .collect();

        let q = query(
            "UNWIND $rows AS row
             MERGE (a:TwitterAccount {username: row.username, user_id: row.user_id})
             ON CREATE SET
                 a.created_at = datetime(),
                 a.created_by = row.created_by,
                 a.from = date(row.from),
                 a.to = date(row.to)
             RETURN count(a) AS merged",
        )
        .param("rows", rows);

        self.merged_count(q).await
    }

    /// Upsert tweet nodes keyed on (id, text, date). Creation stamps `ingested_at`.
    pub async fn merge_tweets(&self, tweets: &[ResultRecord]) -> Result<u64, neo4rs::Error> {
        if tweets.is_empty() {
            return Ok(0);
        }

        let rows: Vec<BoltType> = tweets
            .iter()
            .map(|t| {
                bolt_map(vec![
                    ("id", bolt_str(&t.id)),
                    ("text", bolt_str(&t.text)),
                    ("date", bolt_str(&format_date(t.created_date()))),
                ])
            })
            .collect();

        let q = query(
            "UNWIND $rows AS row
             MERGE (t:Tweet {id: row.id, text: row.text, date: date(row.date)})
             ON CREATE SET t.ingested_at = datetime()
             RETURN count(t) AS merged",
        )
        .param("rows", rows);

        self.merged_count(q).await
    }

    /// Upsert POSTED edges and set the boolean `tag` property to true on each,
    /// whether the edge is new or already existed.
    pub async fn merge_postings(&self, tag: &str, postings: &[PostingRow]) -> Result<u64, neo4rs::Error> {
        if postings.is_empty() {
            return Ok(0);
        }

        let rows: Vec<BoltType> = postings
            .iter()
            .map(|p| {
                bolt_map(vec![
                    ("username", bolt_str(&p.username)),
                    ("user_id", bolt_str(&p.user_id)),
                    ("tweet_id", bolt_str(&p.tweet_id)),
                ])
            })
            .collect();

        // Property keys can't be parameters; the tag is quoted as an identifier.
        let cypher = format!(
            "UNWIND $rows AS row
             MATCH (a:TwitterAccount {{username: row.username, user_id: row.user_id}})
             MATCH (t:Tweet {{id: row.tweet_id}})
             MERGE (a)-[r:POSTED]->(t)
             SET r.`{}` = true
             RETURN count(r) AS merged",
            tag.replace('`', "")
        );
        let q = query(&cypher).param("rows", rows);

        self.merged_count(q).await
    }

    /// Count accounts, tweets and POSTED edges.
    pub async fn counts(&self) -> Result<GraphCounts, neo4rs::Error> {
        let q = query(
            "CALL { MATCH (a:TwitterAccount) RETURN count(a) AS accounts }
             CALL { MATCH (t:Tweet) RETURN count(t) AS tweets }
             CALL { MATCH ()-[r:POSTED]->() RETURN count(r) AS postings }
             RETURN accounts, tweets, postings",
        );

        let mut stream = self.client.graph.execute(q).await?;
        if let Some(row) = stream.next().await? {
            return Ok(GraphCounts {
                accounts: row.get("accounts").unwrap_or(0),
                tweets: row.get("tweets").unwrap_or(0),
                postings: row.get("postings").unwrap_or(0),
            });
        }
        Ok(GraphCounts::default())
    }

    /// Read the tag properties set on a POSTED edge.
    pub async fn posting_tags(&self, username: &str, tweet_id: &str) -> Result<Vec<String>, neo4rs::Error> {
        let q = query(
            "MATCH (:TwitterAccount {username: $username})-[r:POSTED]->(:Tweet {id: $tweet_id})
             RETURN [k IN keys(r) WHERE r[k] = true] AS tags",
        )
        .param("username", username)
        .param("tweet_id", tweet_id);

        let mut stream = self.client.graph.execute(q).await?;
        let mut tags = Vec::new();
        while let Some(row) = stream.next().await? {
            let row_tags: Vec<String> = row.get("tags").unwrap_or_default();
            tags.extend(row_tags);
        }
        tags.sort();
        Ok(tags)
    }

    async fn merged_count(&self, q: neo4rs::Query) -> Result<u64, neo4rs::Error> {
        let mut stream = self.client.graph.execute(q).await?;
        let mut merged = 0u64;
        while let Some(row) = stream.next().await? {
            let n: i64 = row.get("merged").unwrap_or(0);
            merged += n as u64;
        }
        debug!(merged, "Upsert statement applied");
        Ok(merged)
    }
}

fn bolt_str(s: &str) -> BoltType {
    BoltType::String(BoltString::from(s))
}

fn bolt_map(pairs: Vec<(&str, BoltType)>) -> BoltType {
    BoltType::Map(BoltMap::from_iter(
        pairs
            .into_iter()
            .map(|(k, v)| (BoltString::from(k), v)),
    ))
}

fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}
