use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::TweetGraphError;

/// Upper bound for `DEFAULT_WINDOW_DAYS`, ten years of day chunks.
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// How the search executor treats a result item that carries an error payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InBandErrorPolicy {
    /// Record the failure, drop the item, keep the rest of the chunk.
    Skip,
    /// Fail the whole chunk (and with it the cycle).
    Abort,
}

/// Which eligible ticket is claimed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketOrder {
    OldestFirst,
    NewestFirst,
}

/// Where request groups are delivered after scraping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Upsert directly into Neo4j.
    Graph,
    /// POST each group to the ticket API's ingestion endpoint.
    Api,
}

impl FromStr for InBandErrorPolicy {
    type Err = TweetGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "abort" => Ok(Self::Abort),
            other => Err(TweetGraphError::Config(format!(
                "IN_BAND_ERRORS must be 'skip' or 'abort', got '{other}'"
            ))),
        }
    }
}

impl FromStr for TicketOrder {
    type Err = TweetGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "oldest" => Ok(Self::OldestFirst),
            "desc" | "newest" => Ok(Self::NewestFirst),
            other => Err(TweetGraphError::Config(format!(
                "TICKET_ORDER must be 'asc' or 'desc', got '{other}'"
            ))),
        }
    }
}

impl FromStr for DeliveryMode {
    type Err = TweetGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "graph" => Ok(Self::Graph),
            "api" => Ok(Self::Api),
            other => Err(TweetGraphError::Config(format!(
                "DELIVERY must be 'graph' or 'api', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graph => write!(f, "graph"),
            Self::Api => write!(f, "api"),
        }
    }
}

/// Worker configuration, read once at startup from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    // Neo4j
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,

    // Ticket API
    pub ticket_api_url: String,
    pub api_token: Option<String>,
    pub ticket_order: TicketOrder,
    pub claim_candidates: u32,

    // Content source
    pub apify_token: String,
    pub search_delay: Duration,
    pub max_results_per_chunk: u32,
    pub search_chunk_retries: u32,
    pub in_band_errors: InBandErrorPolicy,

    // Pipeline
    pub batch_size: usize,
    pub default_window_days: i64,
    pub delivery: DeliveryMode,

    /// `None` runs a single cycle and exits.
    pub scrape_interval: Option<Duration>,
}

impl Config {
    /// Load `.env` (if present) and read configuration from the process environment.
    pub fn from_env() -> Result<Self, TweetGraphError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TweetGraphError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| {
                TweetGraphError::Config(format!("{key} environment variable is required"))
            })
        };

        let delivery: DeliveryMode = parse_or(get("DELIVERY"), DeliveryMode::Graph)?;

        let (neo4j_uri, neo4j_user, neo4j_password) = match delivery {
            DeliveryMode::Graph => (
                required("NEO4J_URI")?,
                required("NEO4J_USER")?,
                required("NEO4J_PASSWORD")?,
            ),
            DeliveryMode::Api => (
                get("NEO4J_URI").unwrap_or_default(),
                get("NEO4J_USER").unwrap_or_default(),
                get("NEO4J_PASSWORD").unwrap_or_default(),
            ),
        };

        let batch_size: usize = parse_num(get("BATCH_SIZE"), "BATCH_SIZE", 20)?;
        if batch_size == 0 {
            return Err(TweetGraphError::Config(
                "BATCH_SIZE must be greater than zero".to_string(),
            ));
        }

        let claim_candidates: u32 = parse_num(get("CLAIM_CANDIDATES"), "CLAIM_CANDIDATES", 5)?;
        if claim_candidates == 0 {
            return Err(TweetGraphError::Config(
                "CLAIM_CANDIDATES must be greater than zero".to_string(),
            ));
        }

        let default_window_days: i64 =
            parse_num(get("DEFAULT_WINDOW_DAYS"), "DEFAULT_WINDOW_DAYS", 30)?;
        if !(1..=MAX_WINDOW_DAYS).contains(&default_window_days) {
            return Err(TweetGraphError::Config(format!(
                "DEFAULT_WINDOW_DAYS must be between 1 and {MAX_WINDOW_DAYS}, got {default_window_days}"
            )));
        }

        let interval_minutes: u64 =
            parse_num(get("SCRAPE_INTERVAL_MINUTES"), "SCRAPE_INTERVAL_MINUTES", 10)?;

        Ok(Self {
            neo4j_uri,
            neo4j_user,
            neo4j_password,
            ticket_api_url: required("TICKET_API_URL")?.trim_end_matches('/').to_string(),
            api_token: get("API_TOKEN"),
            ticket_order: parse_or(get("TICKET_ORDER"), TicketOrder::OldestFirst)?,
            claim_candidates,
            apify_token: required("APIFY_TOKEN")?,
            search_delay: Duration::from_secs(parse_num(
                get("SEARCH_DELAY_SECS"),
                "SEARCH_DELAY_SECS",
                2,
            )?),
            max_results_per_chunk: parse_num(
                get("MAX_RESULTS_PER_CHUNK"),
                "MAX_RESULTS_PER_CHUNK",
                1000,
            )?,
            search_chunk_retries: parse_num(
                get("SEARCH_CHUNK_RETRIES"),
                "SEARCH_CHUNK_RETRIES",
                2,
            )?,
            in_band_errors: parse_or(get("IN_BAND_ERRORS"), InBandErrorPolicy::Skip)?,
            batch_size,
            default_window_days,
            delivery,
            scrape_interval: (interval_minutes > 0)
                .then(|| Duration::from_secs(interval_minutes * 60)),
        })
    }

    /// Log the loaded configuration with secrets truncated.
    pub fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            if val.is_empty() {
                return "<not set>".to_string();
            }
            let n = val.chars().take(5).map(char::len_utf8).sum::<usize>();
            format!("{}...({} chars)", &val[..n], val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  NEO4J_URI: {}", self.neo4j_uri);
        tracing::info!("  NEO4J_USER: {}", self.neo4j_user);
        tracing::info!("  NEO4J_PASSWORD: {}", preview(&self.neo4j_password));
        tracing::info!("  TICKET_API_URL: {}", self.ticket_api_url);
        tracing::info!(
            "  API_TOKEN: {}",
            preview(self.api_token.as_deref().unwrap_or_default())
        );
        tracing::info!("  APIFY_TOKEN: {}", preview(&self.apify_token));
        tracing::info!(
            delivery = %self.delivery,
            batch_size = self.batch_size,
            delay_secs = self.search_delay.as_secs(),
            max_results = self.max_results_per_chunk,
            interval_secs = self.scrape_interval.map(|d| d.as_secs()).unwrap_or(0),
            "  Pipeline settings"
        );
    }
}

fn parse_or<T: FromStr<Err = TweetGraphError>>(
    value: Option<String>,
    default: T,
) -> Result<T, TweetGraphError> {
    value.map(|v| v.parse()).unwrap_or(Ok(default))
}

fn parse_num<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T, TweetGraphError> {
    match value {
        Some(v) => v
            .parse()
            .map_err(|_| TweetGraphError::Config(format!("{key} must be a number, got '{v}'"))),
        None => Ok(default),
    }
}
