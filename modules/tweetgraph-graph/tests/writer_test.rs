#![cfg(feature = "test-utils")]

// MERGE idempotence against a real Neo4j.
//
// Requirements: Docker (for Neo4j via testcontainers)
//
// Run with: cargo test -p tweetgraph-graph --features test-utils --test writer_test

use chrono::{NaiveDate, TimeZone, Utc};
use tweetgraph_common::{ResultRecord, TwitterAccount};
use tweetgraph_graph::{migrate::migrate, GraphClient, GraphCounts, GraphWriter, PostingRow};

async fn setup() -> (impl std::any::Any, GraphClient) {
    let (container, client) = tweetgraph_graph::testutil::neo4j_container().await;
    migrate(&client).await.expect("migrate failed");
    (container, client)
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn account() -> TwitterAccount {
    TwitterAccount {
        username: "acme".into(),
        user_id: "42".into(),
        from: day(2022, 1, 1),
        to: day(2022, 1, 1),
        created_by: 3,
    }
}

fn tweets() -> Vec<ResultRecord> {
    (1..=3)
        .map(|i| ResultRecord {
            id: format!("100{i}"),
            username: "acme".into(),
            user_id: Some("42".into()),
            text: format!("tweet number {i}"),
            created_at: Utc.with_ymd_and_hms(2022, 1, 1, 9 + i, 0, 0).unwrap(),
            permanent_url: None,
        })
        .collect()
}

fn postings(tweets: &[ResultRecord]) -> Vec<PostingRow> {
    tweets
        .iter()
        .map(|t| PostingRow {
            username: "acme".into(),
            user_id: "42".into(),
            tweet_id: t.id.clone(),
        })
        .collect()
}

async fn ingest(writer: &GraphWriter, tag: &str) {
    let tweets = tweets();
    writer.merge_accounts(&[account()]).await.unwrap();
    writer.merge_tweets(&tweets).await.unwrap();
    writer.merge_postings(tag, &postings(&tweets)).await.unwrap();
}

#[tokio::test]
async fn rerunning_ingestion_creates_no_duplicates() {
    let (_container, client) = setup().await;
    let writer = GraphWriter::new(client);

    ingest(&writer, "posted").await;
    let once = writer.counts().await.unwrap();
    ingest(&writer, "posted").await;
    let twice = writer.counts().await.unwrap();

    assert_eq!(
        once,
        GraphCounts {
            accounts: 1,
            tweets: 3,
            postings: 3
        }
    );
    assert_eq!(once, twice);
}

#[tokio::test]
async fn keyword_tags_accumulate_on_one_edge() {
    let (_container, client) = setup().await;
    let writer = GraphWriter::new(client);

    ingest(&writer, "alpha").await;
    ingest(&writer, "beta").await;

    assert_eq!(writer.counts().await.unwrap().postings, 3);
    let tags = writer.posting_tags("acme", "1001").await.unwrap();
    assert_eq!(tags, vec!["alpha".to_string(), "beta".to_string()]);
}

#[tokio::test]
async fn account_attribution_is_not_overwritten() {
    let (_container, client) = setup().await;
    let writer = GraphWriter::new(client.clone());

    writer.merge_accounts(&[account()]).await.unwrap();
    let mut later = account();
    later.created_by = 99;
    later.from = day(2023, 5, 1);
    writer.merge_accounts(&[later]).await.unwrap();

    let mut stream = client
        .inner()
        .execute(tweetgraph_graph::query(
            "MATCH (a:TwitterAccount {username: 'acme'}) RETURN a.created_by AS created_by, toString(a.from) AS from",
        ))
        .await
        .unwrap();
    let row = stream.next().await.unwrap().expect("account row");
    assert_eq!(row.get::<i64>("created_by").unwrap(), 3);
    assert_eq!(row.get::<String>("from").unwrap(), "2022-01-01");
    assert!(stream.next().await.unwrap().is_none());
}
