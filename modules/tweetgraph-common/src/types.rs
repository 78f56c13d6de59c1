use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Edge tag used when a ticket carries no keyword.
pub const DEFAULT_CONTEXT_TAG: &str = "posted";

// --- Tickets ---

/// A unit of scraping work, as stored in the ticket API's `TwitScraps` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: i64,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub account: Option<String>,
    /// Store-defined account reference; not interpreted by the worker.
    #[serde(default)]
    pub account_id: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub keyword: Option<String>,
    /// First day to scrape (inclusive).
    #[serde(rename = "from", default, deserialize_with = "de_opt_day")]
    pub since: Option<NaiveDate>,
    /// Day the window ends on (exclusive, like the search `until:` operator).
    #[serde(rename = "to", default, deserialize_with = "de_opt_day")]
    pub until: Option<NaiveDate>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub created_by: i64,
    #[serde(rename = "statusRunning", default, deserialize_with = "de_flag")]
    pub running: bool,
}

impl Ticket {
    /// Boolean edge property name for the query context that produced a match.
    pub fn context_tag(&self) -> String {
        context_tag(self.keyword.as_deref())
    }
}

/// Turn a keyword into a graph property identifier. Falls back to [`DEFAULT_CONTEXT_TAG`].
pub fn context_tag(keyword: Option<&str>) -> String {
    let Some(keyword) = keyword else {
        return DEFAULT_CONTEXT_TAG.to_string();
    };

    let mut tag = String::with_capacity(keyword.len());
    for c in keyword.trim().chars() {
        if c.is_alphanumeric() {
            tag.extend(c.to_lowercase());
        } else if !tag.is_empty() && !tag.ends_with('_') {
            tag.push('_');
        }
    }
    let tag = tag.trim_end_matches('_');

    match tag.chars().next() {
        None => DEFAULT_CONTEXT_TAG.to_string(),
        Some(c) if c.is_numeric() => format!("k_{tag}"),
        Some(_) => tag.to_string(),
    }
}

// --- Content source ---

/// A single post retrieved from the content source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub id: String,
    pub username: String,
    /// Author's external account id, when the source embeds it in the result.
    pub user_id: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub permanent_url: Option<String>,
}

impl ResultRecord {
    /// Creation day, used as part of the tweet's graph key.
    pub fn created_date(&self) -> NaiveDate {
        self.created_at.date_naive()
    }
}

/// Per-item outcome of a search call. Sources report partial failures in-band.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchItem {
    Record(ResultRecord),
    Failed(String),
}

/// An author profile looked up by handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub username: String,
    pub user_id: String,
    pub name: Option<String>,
}

// --- Graph entities ---

/// An author node. Attribution fields are stamped only when the node is first created.
#[derive(Debug, Clone, PartialEq)]
pub struct TwitterAccount {
    pub username: String,
    pub user_id: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub created_by: i64,
}

/// A bounded batch of results tagged with the ticket that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestGroup {
    pub tweets: Vec<ResultRecord>,
    pub id: i64,
}

// --- Lenient ticket decoding ---

fn de_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// Accepts `null`, `""`, `YYYY-MM-DD` or any timestamp that starts with a date.
fn de_opt_day<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = de_opt_string(deserializer)? else {
        return Ok(None);
    };
    let day = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map(Some)
        .map_err(|e| serde::de::Error::custom(format!("invalid date '{raw}': {e}")))
}

/// `statusRunning` has been stored both as a boolean and as 0/1.
fn de_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(i)) => i != 0,
        None => false,
    })
}
