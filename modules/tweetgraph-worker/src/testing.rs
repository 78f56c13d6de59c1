// Test mocks for the scrape pipeline.
//
// One mock per trait boundary:
// - MockTicketStore (TicketStore): in-memory tickets with a running flag
// - MockSource (ContentSource): HashMap-based query→items, handle→profile
// - MemoryGraph (GraphSink): MERGE semantics over BTreeMaps
// - RecordingSink (GroupSink): keeps every group it is handed
//
// A shared Journal records the order of external calls across mocks.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use tweetgraph_common::{
    DateWindow, Profile, RequestGroup, ResultRecord, SearchItem, Ticket, TweetGraphError,
    TwitterAccount,
};
use tweetgraph_graph::PostingRow;

use crate::tickets::is_eligible;
use crate::traits::{ContentSource, DeliveryStats, GraphSink, GroupSink, TicketStore};

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

/// Ordered log of calls, shared between mocks.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Position of the first entry starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.0.lock().unwrap().iter().position(|e| e.starts_with(prefix))
    }
}

// ---------------------------------------------------------------------------
// MockTicketStore
// ---------------------------------------------------------------------------

/// Tickets held in insertion order. Claims take the first eligible one.
pub struct MockTicketStore {
    tickets: Mutex<Vec<Ticket>>,
    fail_claim: bool,
    fail_release: bool,
    journal: Journal,
}

impl MockTicketStore {
    pub fn new(tickets: Vec<Ticket>) -> Self {
        Self {
            tickets: Mutex::new(tickets),
            fail_claim: false,
            fail_release: false,
            journal: Journal::new(),
        }
    }

    pub fn failing_claim(mut self) -> Self {
        self.fail_claim = true;
        self
    }

    pub fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    /// Current running flag, `None` for an unknown id.
    pub fn running(&self, id: i64) -> Option<bool> {
        self.tickets
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.running)
    }
}

#[async_trait]
impl TicketStore for MockTicketStore {
    async fn claim(&self, today: NaiveDate) -> Result<Option<Ticket>> {
        if self.fail_claim {
            bail!("MockTicketStore: claim failed");
        }
        let mut tickets = self.tickets.lock().unwrap();
        let Some(ticket) = tickets.iter_mut().find(|t| is_eligible(t, today)) else {
            return Ok(None);
        };
        ticket.running = true;
        self.journal.push(format!("claim:{}", ticket.id));
        Ok(Some(ticket.clone()))
    }

    async fn release(&self, ticket_id: i64) -> Result<()> {
        self.journal.push(format!("release:{ticket_id}"));
        if self.fail_release {
            bail!("MockTicketStore: release failed");
        }
        if let Some(t) = self.tickets.lock().unwrap().iter_mut().find(|t| t.id == ticket_id) {
            t.running = false;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// Unregistered queries return no items; unregistered handles have no profile.
/// Builder pattern: `.on_search()`, `.failing_search()`, `.on_profile()`.
pub struct MockSource {
    searches: HashMap<String, Vec<SearchItem>>,
    failures: Mutex<HashMap<String, u32>>,
    profiles: HashMap<String, Profile>,
    queries: Mutex<Vec<String>>,
    lookups: Mutex<Vec<String>>,
    journal: Journal,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            searches: HashMap::new(),
            failures: Mutex::new(HashMap::new()),
            profiles: HashMap::new(),
            queries: Mutex::new(Vec::new()),
            lookups: Mutex::new(Vec::new()),
            journal: Journal::new(),
        }
    }

    pub fn on_search(mut self, query: &str, items: Vec<SearchItem>) -> Self {
        self.searches.insert(query.to_string(), items);
        self
    }

    /// Make the next `times` calls for `query` fail before it starts answering.
    pub fn failing_search(self, query: &str, times: u32) -> Self {
        self.failures.lock().unwrap().insert(query.to_string(), times);
        self
    }

    pub fn on_profile(mut self, profile: Profile) -> Self {
        self.profiles.insert(profile.username.clone(), profile);
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    /// Every query issued, in order, including failed attempts.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn profile_lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentSource for MockSource {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchItem>> {
        self.queries.lock().unwrap().push(query.to_string());
        self.journal.push(format!("search:{query}"));

        if let Some(remaining) = self.failures.lock().unwrap().get_mut(query) {
            if *remaining > 0 {
                *remaining -= 1;
                bail!("MockSource: search failed for {query}");
            }
        }

        let mut items = self.searches.get(query).cloned().unwrap_or_default();
        items.truncate(max_results as usize);
        Ok(items)
    }

    async fn profile(&self, handle: &str) -> Result<Option<Profile>> {
        self.lookups.lock().unwrap().push(handle.to_string());
        Ok(self.profiles.get(handle).cloned())
    }
}

// ---------------------------------------------------------------------------
// MemoryGraph
// ---------------------------------------------------------------------------

type AccountKey = (String, String);
type TweetKey = (String, String, NaiveDate);

#[derive(Default)]
struct GraphState {
    accounts: BTreeMap<AccountKey, TwitterAccount>,
    tweets: BTreeSet<TweetKey>,
    postings: BTreeMap<(AccountKey, String), BTreeSet<String>>,
    calls: Vec<(String, usize)>,
}

/// In-memory graph with the same MERGE keys as the Neo4j writer: accounts on
/// (username, user_id), tweets on (id, text, date), edges on (account, tweet id).
/// Edges are only created when both ends exist.
pub struct MemoryGraph {
    state: Mutex<GraphState>,
    fail_on: Option<&'static str>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GraphState::default()),
            fail_on: None,
        }
    }

    /// Fail every call of one kind: `"accounts"`, `"tweets"` or `"postings"`.
    pub fn fail_on(mut self, kind: &'static str) -> Self {
        self.fail_on = Some(kind);
        self
    }

    /// `(accounts, tweets, postings)`
    pub fn counts(&self) -> (usize, usize, usize) {
        let s = self.state.lock().unwrap();
        (s.accounts.len(), s.tweets.len(), s.postings.len())
    }

    /// Upsert calls in order, as `(kind, rows)`.
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn account_id(&self, username: &str) -> Option<String> {
        let s = self.state.lock().unwrap();
        s.accounts
            .keys()
            .find(|(u, _)| u == username)
            .map(|(_, id)| id.clone())
    }

    pub fn account(&self, username: &str) -> Option<TwitterAccount> {
        let s = self.state.lock().unwrap();
        s.accounts
            .iter()
            .find(|((u, _), _)| u == username)
            .map(|(_, a)| a.clone())
    }

    /// Tags set on the edge from `username` to `tweet_id`, sorted.
    pub fn tags(&self, username: &str, tweet_id: &str) -> Vec<String> {
        let s = self.state.lock().unwrap();
        s.postings
            .iter()
            .filter(|(((u, _), t), _)| u == username && t == tweet_id)
            .flat_map(|(_, tags)| tags.iter().cloned())
            .collect()
    }

    fn record_call(&self, kind: &str, rows: usize) -> Result<()> {
        self.state.lock().unwrap().calls.push((kind.to_string(), rows));
        if self.fail_on == Some(kind) {
            bail!("MemoryGraph: {kind} upsert failed");
        }
        Ok(())
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphSink for MemoryGraph {
    async fn merge_accounts(&self, accounts: &[TwitterAccount]) -> Result<u64> {
        self.record_call("accounts", accounts.len())?;
        let mut s = self.state.lock().unwrap();
        for a in accounts {
            s.accounts
                .entry((a.username.clone(), a.user_id.clone()))
                .or_insert_with(|| a.clone());
        }
        Ok(accounts.len() as u64)
    }

    async fn merge_tweets(&self, tweets: &[ResultRecord]) -> Result<u64> {
        self.record_call("tweets", tweets.len())?;
        let mut s = self.state.lock().unwrap();
        for t in tweets {
            s.tweets.insert((t.id.clone(), t.text.clone(), t.created_date()));
        }
        Ok(tweets.len() as u64)
    }

    async fn merge_postings(&self, tag: &str, postings: &[PostingRow]) -> Result<u64> {
        self.record_call("postings", postings.len())?;
        let mut s = self.state.lock().unwrap();
        let mut merged = 0u64;
        for p in postings {
            let account = (p.username.clone(), p.user_id.clone());
            let tweet_exists = s.tweets.iter().any(|(id, _, _)| *id == p.tweet_id);
            if !s.accounts.contains_key(&account) || !tweet_exists {
                continue;
            }
            s.postings
                .entry((account, p.tweet_id.clone()))
                .or_default()
                .insert(tag.to_string());
            merged += 1;
        }
        Ok(merged)
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// Keeps delivered groups instead of writing them anywhere.
#[derive(Default)]
pub struct RecordingSink {
    groups: Mutex<Vec<RequestGroup>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> Vec<RequestGroup> {
        self.groups.lock().unwrap().clone()
    }

    pub fn group_sizes(&self) -> Vec<usize> {
        self.groups.lock().unwrap().iter().map(|g| g.tweets.len()).collect()
    }
}

#[async_trait]
impl GroupSink for RecordingSink {
    async fn deliver(
        &self,
        _ticket: &Ticket,
        _window: &DateWindow,
        groups: &[RequestGroup],
        cancel: &CancellationToken,
    ) -> std::result::Result<DeliveryStats, TweetGraphError> {
        if cancel.is_cancelled() {
            return Err(TweetGraphError::Cancelled);
        }
        self.groups.lock().unwrap().extend_from_slice(groups);
        Ok(DeliveryStats {
            groups: groups.len(),
            tweets: groups.iter().map(|g| g.tweets.len() as u64).sum(),
            ..DeliveryStats::default()
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// A record posted at noon UTC on `date`, with no embedded author id.
pub fn record(id: &str, username: &str, date: &str) -> ResultRecord {
    let d = day(date);
    ResultRecord {
        id: id.to_string(),
        username: username.to_string(),
        user_id: None,
        text: format!("tweet {id} by {username}"),
        created_at: Utc.from_utc_datetime(&d.and_hms_opt(12, 0, 0).unwrap()),
        permanent_url: None,
    }
}

/// An idle ticket with no account, keyword or bounds.
pub fn ticket(id: i64) -> Ticket {
    Ticket {
        id,
        account: None,
        account_id: None,
        keyword: None,
        since: None,
        until: None,
        created_at: None,
        created_by: 1,
        running: false,
    }
}

pub fn profile(username: &str, user_id: &str) -> Profile {
    Profile {
        username: username.to_string(),
        user_id: user_id.to_string(),
        name: None,
    }
}
