use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tweetgraph_common::{Config, DateWindow, InBandErrorPolicy, Ticket, TweetGraphError};

use crate::batch::batch;
use crate::search::{SearchExecutor, SearchStats};
use crate::traits::{ContentSource, DeliveryStats, GroupSink, TicketStore};

/// Knobs for one cycle, taken from [`Config`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub search_delay: Duration,
    pub max_results_per_chunk: u32,
    pub search_chunk_retries: u32,
    pub in_band_errors: InBandErrorPolicy,
    pub batch_size: usize,
    pub default_window_days: i64,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            search_delay: config.search_delay,
            max_results_per_chunk: config.max_results_per_chunk,
            search_chunk_retries: config.search_chunk_retries,
            in_band_errors: config.in_band_errors,
            batch_size: config.batch_size,
            default_window_days: config.default_window_days,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            search_delay: Duration::from_secs(2),
            max_results_per_chunk: 1000,
            search_chunk_retries: 2,
            in_band_errors: InBandErrorPolicy::Skip,
            batch_size: 20,
            default_window_days: 30,
        }
    }
}

/// Where a cycle is. Failures from any state go straight to `Releasing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Claiming,
    Scraping,
    Ingesting,
    Releasing,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Claiming => write!(f, "claiming"),
            Self::Scraping => write!(f, "scraping"),
            Self::Ingesting => write!(f, "ingesting"),
            Self::Releasing => write!(f, "releasing"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub ticket_id: i64,
    pub days: usize,
    pub search: SearchStats,
    pub delivery: DeliveryStats,
}

impl fmt::Display for CycleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ticket={} days={} records={} failed_items={} retries={} groups={} accounts={} tweets={} postings={}",
            self.ticket_id,
            self.days,
            self.search.records,
            self.search.failed_items,
            self.search.retries,
            self.delivery.groups,
            self.delivery.accounts,
            self.delivery.tweets,
            self.delivery.postings,
        )
    }
}

#[derive(Debug)]
pub enum CycleOutcome {
    /// No eligible ticket.
    Idle,
    Completed(CycleStats),
    /// The ticket was claimed but scraping or ingestion failed. It has been released.
    Failed {
        ticket_id: i64,
        state: CycleState,
        error: TweetGraphError,
    },
}

/// Runs one ticket through claim → scrape → ingest → release per cycle.
pub struct Worker {
    tickets: Arc<dyn TicketStore>,
    source: Arc<dyn ContentSource>,
    sink: Arc<dyn GroupSink>,
    settings: PipelineSettings,
    today: Option<NaiveDate>,
}

impl Worker {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        source: Arc<dyn ContentSource>,
        sink: Arc<dyn GroupSink>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            tickets,
            source,
            sink,
            settings,
            today: None,
        }
    }

    /// Pin "today" instead of reading the clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Run one cycle. Returns `Err` only when claiming fails, in which case no
    /// ticket is held. Once a ticket is claimed it is always released, and scrape
    /// or ingest failures are reported as [`CycleOutcome::Failed`].
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleOutcome, TweetGraphError> {
        let mut state = CycleState::Idle;
        enter(&mut state, CycleState::Claiming, None);

        let today = self.today();
        let ticket = match self.tickets.claim(today).await {
            Ok(Some(ticket)) => ticket,
            Ok(None) => {
                info!("No eligible ticket");
                enter(&mut state, CycleState::Idle, None);
                return Ok(CycleOutcome::Idle);
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), "Failed to claim ticket");
                return Err(TweetGraphError::TicketStore(format!("{e:#}")));
            }
        };

        info!(
            ticket_id = ticket.id,
            account = ticket.account.as_deref().unwrap_or(""),
            keyword = ticket.keyword.as_deref().unwrap_or(""),
            "Processing ticket"
        );

        let result = self.process(&ticket, today, &mut state, cancel).await;
        let failed_in = state;

        // Always release, whatever happened above
        enter(&mut state, CycleState::Releasing, Some(ticket.id));
        if let Err(e) = self.tickets.release(ticket.id).await {
            warn!(ticket_id = ticket.id, error = %format!("{e:#}"), "Failed to release ticket");
        }
        enter(&mut state, CycleState::Idle, Some(ticket.id));

        match result {
            Ok(stats) => {
                info!("Cycle complete. {stats}");
                Ok(CycleOutcome::Completed(stats))
            }
            Err(error) => {
                error!(ticket_id = ticket.id, state = %failed_in, %error, "Cycle failed");
                Ok(CycleOutcome::Failed {
                    ticket_id: ticket.id,
                    state: failed_in,
                    error,
                })
            }
        }
    }

    async fn process(
        &self,
        ticket: &Ticket,
        today: NaiveDate,
        state: &mut CycleState,
        cancel: &CancellationToken,
    ) -> Result<CycleStats, TweetGraphError> {
        enter(state, CycleState::Scraping, Some(ticket.id));
        let window = DateWindow::resolve(
            ticket.since,
            ticket.until,
            today,
            self.settings.default_window_days,
        );
        info!(
            ticket_id = ticket.id,
            first = %window.first(),
            last = %window.last(),
            days = window.len_days(),
            "Resolved date window"
        );

        let executor = SearchExecutor::new(
            self.source.as_ref(),
            self.settings.search_delay,
            self.settings.max_results_per_chunk,
            self.settings.search_chunk_retries,
            self.settings.in_band_errors,
        );
        let output = executor.run(ticket, &window, cancel).await?;

        enter(state, CycleState::Ingesting, Some(ticket.id));
        let groups = batch(output.records, ticket.id, self.settings.batch_size);
        let delivery = self.sink.deliver(ticket, &window, &groups, cancel).await?;

        Ok(CycleStats {
            ticket_id: ticket.id,
            days: window.len_days(),
            search: output.stats,
            delivery,
        })
    }
}

fn enter(state: &mut CycleState, next: CycleState, ticket_id: Option<i64>) {
    debug!(from = %state, to = %next, ticket_id, "Cycle state");
    *state = next;
}
