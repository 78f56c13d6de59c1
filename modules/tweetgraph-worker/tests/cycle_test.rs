// Whole-cycle tests: claim → scrape → batch → ingest → release, with every
// external boundary mocked. No network, no database.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use tweetgraph_common::{InBandErrorPolicy, SearchItem, Ticket, TweetGraphError};
use tweetgraph_worker::ingest::Ingestor;
use tweetgraph_worker::testing::{
    day, profile, record, ticket, Journal, MemoryGraph, MockSource, MockTicketStore, RecordingSink,
};
use tweetgraph_worker::traits::GroupSink;
use tweetgraph_worker::{CycleOutcome, CycleState, PipelineSettings, Worker};

const ACME_QUERY: &str = "-filter:retweets (from:acme) since:2022-01-01 until:2022-01-02";

fn settings() -> PipelineSettings {
    PipelineSettings {
        search_delay: Duration::ZERO,
        ..PipelineSettings::default()
    }
}

fn acme_ticket(id: i64, keyword: Option<&str>) -> Ticket {
    Ticket {
        account: Some("acme".into()),
        keyword: keyword.map(String::from),
        since: Some(day("2022-01-01")),
        until: Some(day("2022-01-02")),
        ..ticket(id)
    }
}

fn acme_records(n: usize) -> Vec<SearchItem> {
    (1..=n)
        .map(|i| SearchItem::Record(record(&i.to_string(), "acme", "2022-01-01")))
        .collect()
}

fn worker(
    store: &Arc<MockTicketStore>,
    source: &Arc<MockSource>,
    sink: Arc<dyn GroupSink>,
    settings: PipelineSettings,
) -> Worker {
    Worker::new(store.clone(), source.clone(), sink, settings).with_today(day("2022-01-01"))
}

fn graph_worker(
    store: &Arc<MockTicketStore>,
    source: &Arc<MockSource>,
    graph: &Arc<MemoryGraph>,
) -> Worker {
    let ingestor = Arc::new(Ingestor::new(graph.clone(), source.clone()));
    worker(store, source, ingestor, settings())
}

#[tokio::test]
async fn single_day_ticket_end_to_end() {
    let journal = Journal::new();
    let store = Arc::new(MockTicketStore::new(vec![acme_ticket(7, None)]).with_journal(journal.clone()));
    let source = Arc::new(
        MockSource::new()
            .on_search(ACME_QUERY, acme_records(3))
            .on_profile(profile("acme", "42"))
            .with_journal(journal.clone()),
    );
    let graph = Arc::new(MemoryGraph::new());

    let outcome = graph_worker(&store, &source, &graph)
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    let CycleOutcome::Completed(stats) = outcome else {
        panic!("expected completed cycle");
    };
    assert_eq!(stats.ticket_id, 7);
    assert_eq!(stats.days, 1);
    assert_eq!(stats.search.records, 3);
    assert_eq!(stats.delivery.groups, 1);

    assert_eq!(source.queries(), vec![ACME_QUERY.to_string()]);
    assert_eq!(
        graph.calls(),
        vec![
            ("accounts".to_string(), 1),
            ("tweets".to_string(), 3),
            ("postings".to_string(), 3),
        ]
    );
    assert_eq!(graph.counts(), (1, 3, 3));
    assert_eq!(graph.tags("acme", "1"), vec!["posted".to_string()]);
    assert_eq!(store.running(7), Some(false));

    assert_eq!(
        journal.entries(),
        vec![
            "claim:7".to_string(),
            format!("search:{ACME_QUERY}"),
            "release:7".to_string(),
        ]
    );
}

#[tokio::test]
async fn author_is_stamped_with_window_and_creator() {
    let store = Arc::new(MockTicketStore::new(vec![Ticket {
        created_by: 3,
        ..acme_ticket(7, None)
    }]));
    let source = Arc::new(
        MockSource::new()
            .on_search(ACME_QUERY, acme_records(1))
            .on_profile(profile("acme", "42")),
    );
    let graph = Arc::new(MemoryGraph::new());

    graph_worker(&store, &source, &graph)
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    let account = graph.account("acme").unwrap();
    assert_eq!(account.user_id, "42");
    assert_eq!(account.from, day("2022-01-01"));
    assert_eq!(account.to, day("2022-01-01"));
    assert_eq!(account.created_by, 3);
}

#[tokio::test]
async fn multi_day_ticket_searches_each_day_in_order() {
    let store = Arc::new(MockTicketStore::new(vec![Ticket {
        since: Some(day("2021-12-29")),
        until: Some(day("2022-01-01")),
        ..acme_ticket(7, None)
    }]));
    let source = Arc::new(MockSource::new());
    let sink = Arc::new(RecordingSink::new());

    let outcome = worker(&store, &source, sink, settings())
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, CycleOutcome::Completed(s) if s.days == 3 && s.search.chunks == 3));
    assert_eq!(
        source.queries(),
        vec![
            "-filter:retweets (from:acme) since:2021-12-29 until:2021-12-30".to_string(),
            "-filter:retweets (from:acme) since:2021-12-30 until:2021-12-31".to_string(),
            "-filter:retweets (from:acme) since:2021-12-31 until:2022-01-01".to_string(),
        ]
    );
}

#[tokio::test]
async fn future_days_are_not_searched() {
    let store = Arc::new(MockTicketStore::new(vec![Ticket {
        since: Some(day("2021-12-31")),
        until: Some(day("2022-03-01")),
        ..acme_ticket(7, None)
    }]));
    let source = Arc::new(MockSource::new());

    let outcome = worker(&store, &source, Arc::new(RecordingSink::new()), settings())
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, CycleOutcome::Completed(s) if s.days == 2));
    assert_eq!(
        source.queries(),
        vec![
            "-filter:retweets (from:acme) since:2021-12-31 until:2022-01-01".to_string(),
            ACME_QUERY.to_string(),
        ]
    );
}

#[tokio::test]
async fn oversized_lookback_still_releases_ticket() {
    let store = Arc::new(MockTicketStore::new(vec![Ticket {
        since: None,
        until: None,
        ..acme_ticket(7, None)
    }]));
    let source = Arc::new(MockSource::new());
    let huge = PipelineSettings {
        default_window_days: i64::MAX,
        ..settings()
    };
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = worker(&store, &source, Arc::new(RecordingSink::new()), huge)
        .run_cycle(&cancel)
        .await
        .unwrap();

    assert!(matches!(outcome, CycleOutcome::Failed { error: TweetGraphError::Cancelled, .. }));
    assert_eq!(store.running(7), Some(false));
}

#[tokio::test]
async fn open_ended_ticket_runs_through_today() {
    let store = Arc::new(MockTicketStore::new(vec![Ticket {
        since: Some(day("2021-12-30")),
        until: None,
        ..acme_ticket(7, None)
    }]));
    let source = Arc::new(MockSource::new());

    let outcome = worker(&store, &source, Arc::new(RecordingSink::new()), settings())
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, CycleOutcome::Completed(s) if s.days == 3));
    assert_eq!(
        source.queries().last().map(String::as_str),
        Some("-filter:retweets (from:acme) since:2022-01-01 until:2022-01-02")
    );
}

#[tokio::test]
async fn forty_five_results_become_three_groups() {
    let store = Arc::new(MockTicketStore::new(vec![acme_ticket(7, None)]));
    let source = Arc::new(MockSource::new().on_search(ACME_QUERY, acme_records(45)));
    let sink = Arc::new(RecordingSink::new());

    worker(&store, &source, sink.clone(), settings())
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(sink.group_sizes(), vec![20, 20, 5]);
    assert!(sink.groups().iter().all(|g| g.id == 7));
}

#[tokio::test]
async fn no_eligible_ticket_is_idle() {
    let journal = Journal::new();
    let expired = Ticket {
        until: Some(day("2021-12-31")),
        ..acme_ticket(1, None)
    };
    let running = Ticket {
        running: true,
        ..acme_ticket(2, None)
    };
    let store = Arc::new(MockTicketStore::new(vec![expired, running]).with_journal(journal.clone()));
    let source = Arc::new(MockSource::new().with_journal(journal.clone()));

    let outcome = worker(&store, &source, Arc::new(RecordingSink::new()), settings())
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, CycleOutcome::Idle));
    assert!(journal.entries().is_empty());
}

#[tokio::test]
async fn claim_error_is_returned_and_nothing_released() {
    let journal = Journal::new();
    let store = Arc::new(
        MockTicketStore::new(vec![acme_ticket(7, None)])
            .failing_claim()
            .with_journal(journal.clone()),
    );
    let source = Arc::new(MockSource::new().with_journal(journal.clone()));

    let result = worker(&store, &source, Arc::new(RecordingSink::new()), settings())
        .run_cycle(&CancellationToken::new())
        .await;

    assert!(matches!(result, Err(TweetGraphError::TicketStore(_))));
    assert!(journal.entries().is_empty());
    assert_eq!(store.running(7), Some(false));
}

#[tokio::test]
async fn search_failure_still_releases_ticket() {
    let journal = Journal::new();
    let store = Arc::new(MockTicketStore::new(vec![acme_ticket(7, None)]).with_journal(journal.clone()));
    let source = Arc::new(
        MockSource::new()
            .failing_search(ACME_QUERY, 10)
            .with_journal(journal.clone()),
    );

    let outcome = worker(&store, &source, Arc::new(RecordingSink::new()), settings())
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    match outcome {
        CycleOutcome::Failed {
            ticket_id,
            state,
            error,
        } => {
            assert_eq!(ticket_id, 7);
            assert_eq!(state, CycleState::Scraping);
            assert!(matches!(error, TweetGraphError::Source(_)));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    // First attempt plus two retries
    assert_eq!(source.queries().len(), 3);
    assert_eq!(journal.entries().last().map(String::as_str), Some("release:7"));
    assert_eq!(store.running(7), Some(false));
}

#[tokio::test]
async fn transient_search_failure_is_retried() {
    let store = Arc::new(MockTicketStore::new(vec![acme_ticket(7, None)]));
    let source = Arc::new(
        MockSource::new()
            .on_search(ACME_QUERY, acme_records(2))
            .failing_search(ACME_QUERY, 1),
    );

    let outcome = worker(&store, &source, Arc::new(RecordingSink::new()), settings())
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    let CycleOutcome::Completed(stats) = outcome else {
        panic!("expected completed cycle");
    };
    assert_eq!(stats.search.retries, 1);
    assert_eq!(stats.search.records, 2);
    assert_eq!(source.queries().len(), 2);
}

#[tokio::test]
async fn ingest_failure_still_releases_ticket() {
    let store = Arc::new(MockTicketStore::new(vec![acme_ticket(7, None)]));
    let source = Arc::new(
        MockSource::new()
            .on_search(ACME_QUERY, acme_records(3))
            .on_profile(profile("acme", "42")),
    );
    let graph = Arc::new(MemoryGraph::new().fail_on("tweets"));

    let outcome = graph_worker(&store, &source, &graph)
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        CycleOutcome::Failed {
            state: CycleState::Ingesting,
            error: TweetGraphError::Graph(_),
            ..
        }
    ));
    assert_eq!(store.running(7), Some(false));
}

#[tokio::test]
async fn cancelled_cycle_still_releases_ticket() {
    let store = Arc::new(MockTicketStore::new(vec![acme_ticket(7, None)]));
    let source = Arc::new(MockSource::new().on_search(ACME_QUERY, acme_records(3)));
    let graph = Arc::new(MemoryGraph::new());

    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = graph_worker(&store, &source, &graph).run_cycle(&cancel).await.unwrap();

    assert!(matches!(
        outcome,
        CycleOutcome::Failed {
            error: TweetGraphError::Cancelled,
            ..
        }
    ));
    assert_eq!(graph.counts(), (0, 0, 0));
    assert_eq!(store.running(7), Some(false));
}

#[tokio::test]
async fn release_failure_does_not_fail_a_completed_cycle() {
    let journal = Journal::new();
    let store = Arc::new(
        MockTicketStore::new(vec![acme_ticket(7, None)])
            .failing_release()
            .with_journal(journal.clone()),
    );
    let source = Arc::new(MockSource::new().on_search(ACME_QUERY, acme_records(1)));

    let outcome = worker(&store, &source, Arc::new(RecordingSink::new()), settings())
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, CycleOutcome::Completed(_)));
    assert_eq!(journal.position("release:7"), Some(1));
}

#[tokio::test]
async fn rerunning_a_ticket_is_idempotent() {
    let store = Arc::new(MockTicketStore::new(vec![acme_ticket(7, None)]));
    let source = Arc::new(
        MockSource::new()
            .on_search(ACME_QUERY, acme_records(3))
            .on_profile(profile("acme", "42")),
    );
    let graph = Arc::new(MemoryGraph::new());
    let w = graph_worker(&store, &source, &graph);

    for _ in 0..2 {
        let outcome = w.run_cycle(&CancellationToken::new()).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Completed(_)));
    }

    assert_eq!(graph.counts(), (1, 3, 3));
    assert_eq!(graph.tags("acme", "2"), vec!["posted".to_string()]);
}

#[tokio::test]
async fn keyword_tags_accumulate_on_one_edge() {
    let source = Arc::new(
        MockSource::new()
            .on_search(
                "-filter:retweets alpha (from:acme) since:2022-01-01 until:2022-01-02",
                acme_records(1),
            )
            .on_search(
                "-filter:retweets beta (from:acme) since:2022-01-01 until:2022-01-02",
                acme_records(1),
            )
            .on_profile(profile("acme", "42")),
    );
    let graph = Arc::new(MemoryGraph::new());

    for (id, keyword) in [(1, "alpha"), (2, "beta")] {
        let store = Arc::new(MockTicketStore::new(vec![acme_ticket(id, Some(keyword))]));
        let outcome = graph_worker(&store, &source, &graph)
            .run_cycle(&CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, CycleOutcome::Completed(_)));
    }

    assert_eq!(graph.counts(), (1, 1, 1));
    assert_eq!(
        graph.tags("acme", "1"),
        vec!["alpha".to_string(), "beta".to_string()]
    );
}

fn mixed_items() -> Vec<SearchItem> {
    let mut items = acme_records(2);
    items.insert(1, SearchItem::Failed("rate limited".into()));
    items
}

#[tokio::test]
async fn in_band_errors_are_skipped_by_default() {
    let store = Arc::new(MockTicketStore::new(vec![acme_ticket(7, None)]));
    let source = Arc::new(MockSource::new().on_search(ACME_QUERY, mixed_items()));
    let sink = Arc::new(RecordingSink::new());

    let outcome = worker(&store, &source, sink.clone(), settings())
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    let CycleOutcome::Completed(stats) = outcome else {
        panic!("expected completed cycle");
    };
    assert_eq!(stats.search.failed_items, 1);
    assert_eq!(stats.search.records, 2);
    assert_eq!(sink.group_sizes(), vec![2]);
}

#[tokio::test]
async fn in_band_errors_abort_when_configured() {
    let store = Arc::new(MockTicketStore::new(vec![acme_ticket(7, None)]));
    let source = Arc::new(MockSource::new().on_search(ACME_QUERY, mixed_items()));
    let sink = Arc::new(RecordingSink::new());
    let abort = PipelineSettings {
        in_band_errors: InBandErrorPolicy::Abort,
        ..settings()
    };

    let outcome = worker(&store, &source, sink.clone(), abort)
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        CycleOutcome::Failed {
            state: CycleState::Scraping,
            error: TweetGraphError::Source(_),
            ..
        }
    ));
    assert!(sink.groups().is_empty());
    assert_eq!(store.running(7), Some(false));
}
