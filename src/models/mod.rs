use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Ticker ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ticker {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

impl Ticker {
    pub fn new(id: impl Into<String>, symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            name: name.into(),
        }
    }
}

// ── Filing ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Filing {
    pub id: String,
    /// Ticker record id.
    pub ticker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker_symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker_name: Option<String>,
    #[serde(rename = "type")]
    pub filing_type: String, // 10-K, 10-Q, 8-K
    #[serde(with = "record_date")]
    pub date: NaiveDate,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub url: String,
}

/// Filing payload for record creation (no id yet).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewFiling {
    pub ticker: String,
    #[serde(rename = "type")]
    pub filing_type: String,
    #[serde(with = "record_date")]
    pub date: NaiveDate,
    pub title: String,
    pub summary: String,
    pub url: String,
}

// ── Watchlist ─────────────────────────────────────────────────────────────────

/// Join row associating a user with a ticker they follow.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct WatchlistEntry {
    pub id: String,
    pub user: String,
    pub ticker: String,
    #[serde(default)]
    pub expand: Option<TickerExpand>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct TickerExpand {
    #[serde(default)]
    pub ticker: Option<Ticker>,
}

/// Raw filing record as returned with `expand=ticker`.
#[derive(Debug, Clone, Deserialize)]
pub struct FilingRecord {
    #[serde(flatten)]
    pub filing: Filing,
    #[serde(default)]
    pub expand: Option<TickerExpand>,
}

impl FilingRecord {
    pub fn into_filing(self) -> Filing {
        let mut filing = self.filing;
        if let Some(ticker) = self.expand.and_then(|e| e.ticker) {
            filing.ticker_symbol = Some(ticker.symbol);
            filing.ticker_name = Some(ticker.name);
        }
        filing
    }
}

// ── Users ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

// ── Dates ─────────────────────────────────────────────────────────────────────

/// Record dates travel as `2023-10-27 00:00:00.000Z`; plain `2023-10-27` is
/// accepted too. Only the calendar date is kept.
pub mod record_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn parse(s: &str) -> Option<NaiveDate> {
        let day = s.trim().get(..10)?;
        NaiveDate::parse_from_str(day, FORMAT).ok()
    }

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid record date '{}'", s)))
    }
}
