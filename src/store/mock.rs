//! Bundled sample dataset used when the record service is unavailable.
//!
//! Sample ticker ids are their symbols, so a filing's `ticker` field and the
//! key it is grouped under are both the symbol.

use chrono::NaiveDate;

use crate::models::{Filing, Ticker};

pub const TICKERS: [(&str, &str); 8] = [
    ("AAPL", "Apple Inc."),
    ("MSFT", "Microsoft Corporation"),
    ("GOOGL", "Alphabet Inc."),
    ("AMZN", "Amazon.com, Inc."),
    ("META", "Meta Platforms, Inc."),
    ("TSLA", "Tesla, Inc."),
    ("NVDA", "NVIDIA Corporation"),
    ("JPM", "JPMorgan Chase & Co."),
];

/// Symbols shown as the watchlist when a user has none of their own.
pub const DEFAULT_WATCHLIST: [&str; 3] = ["AAPL", "MSFT", "GOOGL"];

pub struct SampleFiling {
    pub id: &'static str,
    pub symbol: &'static str,
    pub kind: &'static str,
    pub date: (i32, u32, u32),
    pub title: &'static str,
    pub summary: &'static str,
    pub url: &'static str,
}

impl SampleFiling {
    pub fn date(&self) -> NaiveDate {
        let (y, m, d) = self.date;
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
    }
}

pub const FILINGS: &[SampleFiling] = &[
    SampleFiling {
        id: "aapl-10k-2023",
        symbol: "AAPL",
        kind: "10-K",
        date: (2023, 10, 27),
        title: "Annual Report",
        summary: "Apple reported a record annual revenue of $394.3 billion with iPhone sales continuing to be the main revenue driver. Services segment showed strong growth, reaching $85.2 billion. The company faces challenges in China market but continues to innovate with new AI capabilities.",
        url: "https://www.sec.gov/Archives/edgar/data/320193/000032019323000077/aapl-20230930.htm",
    },
    SampleFiling {
        id: "aapl-10q-2023q3",
        symbol: "AAPL",
        kind: "10-Q",
        date: (2023, 7, 20),
        title: "Quarterly Report",
        summary: "Apple reported a slight decline in quarterly revenue to $81.8 billion (-1.4% YoY). iPhone and Services segments performed well, while Mac and iPad sales decreased. The company announced a $90 billion share repurchase authorization.",
        url: "https://www.sec.gov/Archives/edgar/data/320193/000032019323000077/aapl-20230624.htm",
    },
    SampleFiling {
        id: "msft-10k-2023",
        symbol: "MSFT",
        kind: "10-K",
        date: (2023, 7, 27),
        title: "Annual Report",
        summary: "Microsoft achieved record revenue of $211.9 billion (+7% YoY), driven by cloud services growth. Azure revenue grew by 27%. The company continues to invest heavily in AI technology across its product portfolio and announced layoffs of approximately 10,000 employees.",
        url: "https://www.sec.gov/Archives/edgar/data/789019/000095017023034773/msft-20230630.htm",
    },
    SampleFiling {
        id: "msft-8k-2023",
        symbol: "MSFT",
        kind: "8-K",
        date: (2023, 1, 18),
        title: "Current Report",
        summary: "Microsoft announced a strategic partnership with OpenAI, investing $10 billion. The company plans to integrate ChatGPT technology across Microsoft products including Azure, Bing, and Microsoft 365.",
        url: "https://www.sec.gov/Archives/edgar/data/789019/000119312523009797/d464154d8k.htm",
    },
    SampleFiling {
        id: "googl-10q-2023q2",
        symbol: "GOOGL",
        kind: "10-Q",
        date: (2023, 7, 25),
        title: "Quarterly Report",
        summary: "Alphabet reported Q2 revenue of $74.6 billion (+7% YoY). Google Search remains the main revenue driver. YouTube ad revenue recovered after previous declines. Google Cloud achieved profitability for the first time with $8 billion in revenue.",
        url: "https://www.sec.gov/Archives/edgar/data/1652044/000165204423000069/goog-20230630.htm",
    },
    SampleFiling {
        id: "tsla-10q-2023q3",
        symbol: "TSLA",
        kind: "10-Q",
        date: (2023, 10, 18),
        title: "Quarterly Report",
        summary: "Tesla reported Q3 revenue of $23.4 billion (-1% YoY) with automotive revenue down 3%. Delivered 435,059 vehicles with reduced average selling prices. Energy generation and storage business grew 40% YoY. The company continues to invest in AI and robotics.",
        url: "https://www.sec.gov/Archives/edgar/data/1318605/000095017023051558/tsla-20230930.htm",
    },
    SampleFiling {
        id: "amzn-10q-2023q3",
        symbol: "AMZN",
        kind: "10-Q",
        date: (2023, 10, 26),
        title: "Quarterly Report",
        summary: "Amazon reported Q3 revenue of $143.1 billion (+13% YoY). AWS revenue grew 12% YoY to $23.1 billion. Advertising services showed strong growth at $12.1 billion. The company continues to reduce workforce and optimize operations for greater efficiency.",
        url: "https://www.sec.gov/Archives/edgar/data/1018724/000101872423000080/amzn-20230930.htm",
    },
];

pub fn tickers() -> Vec<Ticker> {
    TICKERS
        .iter()
        .map(|(symbol, name)| Ticker::new(*symbol, *symbol, *name))
        .collect()
}

pub fn default_watchlist() -> Vec<Ticker> {
    tickers()
        .into_iter()
        .filter(|t| DEFAULT_WATCHLIST.contains(&t.symbol.as_str()))
        .collect()
}

fn name_of(symbol: &str) -> Option<&'static str> {
    TICKERS.iter().find(|(s, _)| *s == symbol).map(|(_, name)| *name)
}

/// Sample filings for `symbol`, in bundled order. Empty for unknown symbols.
pub fn filings_for_symbol(symbol: &str) -> Vec<Filing> {
    FILINGS
        .iter()
        .filter(|f| f.symbol == symbol)
        .map(|f| Filing {
            id: f.id.to_string(),
            ticker: f.symbol.to_string(),
            ticker_symbol: Some(f.symbol.to_string()),
            ticker_name: name_of(f.symbol).map(str::to_string),
            filing_type: f.kind.to_string(),
            date: f.date(),
            title: f.title.to_string(),
            summary: f.summary.to_string(),
            url: f.url.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_shape() {
        assert_eq!(tickers().len(), 8);
        let watch: Vec<String> = default_watchlist().into_iter().map(|t| t.id).collect();
        assert_eq!(watch, vec!["AAPL", "MSFT", "GOOGL"]);
    }

    #[test]
    fn test_filings_for_symbol_keeps_order() {
        let ids: Vec<String> = filings_for_symbol("AAPL").into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec!["aapl-10k-2023", "aapl-10q-2023q3"]);
        assert!(filings_for_symbol("NVDA").is_empty());
    }

    #[test]
    fn test_sample_dates_are_valid() {
        assert!(FILINGS.iter().all(|f| f.date() != NaiveDate::MIN));
    }
}
