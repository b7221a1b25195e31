//! CSV loader for seed tickers and filings.
//!
//! Tickers: `symbol,name`. Filings: `symbol,type,date,title,summary,url`.
//! Rows that cannot be cleaned are logged and skipped.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::admin::seed::{SeedFiling, SeedTicker};

/// A ticker row as it appears in the file, before cleaning.
#[derive(Debug, Deserialize)]
struct RawTickerRow {
    symbol: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFilingRow {
    symbol: Option<String>,
    #[serde(rename = "type", alias = "filing_type")]
    filing_type: Option<String>,
    date: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    url: Option<String>,
}

// ── Cleaning ──────────────────────────────────────────────────────────────────

pub fn normalise_symbol(s: &str) -> String {
    s.trim().to_uppercase()
}

/// Filing types are upper case with a dash: "10k" → "10-K", "8-k" → "8-K".
pub fn normalise_filing_type(s: &str) -> String {
    let s = s.trim().to_uppercase();
    match s.find(|c: char| c.is_ascii_alphabetic()) {
        Some(i) if i > 0 && !s[..i].ends_with('-') => format!("{}-{}", &s[..i], &s[i..]),
        _ => s,
    }
}

/// Parse dates: ISO, record timestamps ("2023-10-27 00:00:00.000Z"),
/// "Oct 27, 2023" or US slashes.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    for format in ["%Y-%m-%d", "%b %d, %Y", "%m/%d/%Y", "%d %b %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, format) {
            return Some(d);
        }
    }
    crate::models::record_date::parse(s)
}

fn present(field: Option<String>) -> Option<String> {
    field.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn clean_ticker(row: RawTickerRow) -> Option<SeedTicker> {
    let symbol = normalise_symbol(&present(row.symbol)?);
    let name = present(row.name).unwrap_or_else(|| symbol.clone());
    Some(SeedTicker { symbol, name })
}

fn clean_filing(row: RawFilingRow) -> Option<SeedFiling> {
    let symbol = normalise_symbol(&present(row.symbol)?);
    let date_str = present(row.date)?;
    let Some(date) = parse_date(&date_str) else {
        warn!("Unparseable date {:?} for {}", date_str, symbol);
        return None;
    };

    Some(SeedFiling {
        symbol,
        filing_type: normalise_filing_type(&present(row.filing_type)?),
        date,
        title: present(row.title)?,
        summary: present(row.summary).unwrap_or_default(),
        url: present(row.url).unwrap_or_default(),
    })
}

// ── Loading ───────────────────────────────────────────────────────────────────

fn load_rows<R, T>(path: &Path, clean: impl Fn(R) -> Option<T>) -> Result<Vec<T>>
where
    R: serde::de::DeserializeOwned,
{
    debug!("Loading {:?}", path);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .with_context(|| format!("Failed to open {:?}", path))?;

    let mut out = Vec::new();
    for (i, result) in reader.deserialize::<R>().enumerate() {
        let raw = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Row {} in {:?}: {}", i + 1, path, e);
                continue;
            }
        };
        match clean(raw) {
            Some(row) => out.push(row),
            None => warn!("Row {} in {:?}: missing required fields, skipped", i + 1, path),
        }
    }
    Ok(out)
}

pub fn load_tickers(path: &Path) -> Result<Vec<SeedTicker>> {
    let tickers = load_rows(path, clean_ticker)?;
    info!("{:?}: {} tickers loaded", path, tickers.len());
    Ok(tickers)
}

pub fn load_filings(path: &Path) -> Result<Vec<SeedFiling>> {
    let filings = load_rows(path, clean_filing)?;
    info!("{:?}: {} filings loaded", path, filings.len());
    Ok(filings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 10, 27);
        assert_eq!(parse_date("2023-10-27"), expected);
        assert_eq!(parse_date("Oct 27, 2023"), expected);
        assert_eq!(parse_date("10/27/2023"), expected);
        assert_eq!(parse_date("2023-10-27 00:00:00.000Z"), expected);
        assert_eq!(parse_date("last week"), None);
    }

    #[test]
    fn test_normalise_filing_type() {
        assert_eq!(normalise_filing_type("10k"), "10-K");
        assert_eq!(normalise_filing_type(" 8-k "), "8-K");
        assert_eq!(normalise_filing_type("10-Q"), "10-Q");
        assert_eq!(normalise_filing_type("S-1"), "S-1");
    }

    #[test]
    fn test_load_tickers_skips_blank_symbols() {
        let file = csv_file("symbol, name\n aapl ,Apple Inc.\n,Nameless\nnvda,\n");
        let tickers = load_tickers(file.path()).unwrap();

        assert_eq!(
            tickers,
            vec![
                SeedTicker { symbol: "AAPL".into(), name: "Apple Inc.".into() },
                SeedTicker { symbol: "NVDA".into(), name: "NVDA".into() },
            ]
        );
    }

    #[test]
    fn test_load_filings() {
        let file = csv_file(
            "symbol,type,date,title,summary,url\n\
             msft,10k,\"Jul 27, 2023\",Annual Report,Record revenue,https://example.com/msft\n\
             aapl,10-Q,someday,Quarterly Report,,\n\
             tsla,10-Q,2023-10-18,,,\n",
        );
        let filings = load_filings(file.path()).unwrap();

        // bad date and missing title are dropped
        assert_eq!(filings.len(), 1);
        let msft = &filings[0];
        assert_eq!(msft.symbol, "MSFT");
        assert_eq!(msft.filing_type, "10-K");
        assert_eq!(msft.date, NaiveDate::from_ymd_opt(2023, 7, 27).unwrap());
        assert_eq!(msft.url, "https://example.com/msft");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_tickers(Path::new("/nonexistent/tickers.csv")).is_err());
    }
}
