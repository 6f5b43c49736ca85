use super::FactorVector;

/// Indicator identifiers the strategy generator can emit, matching its
/// function registry.
const INDICATOR_VOCAB: &[&str] = &[
    "rsi", "stochastic", "williams_r", "cci", "momentum", "demarker", "rvi", "ao", "ac", "sma",
    "ema", "dema", "tema", "macd", "bollinger", "envelopes", "sar", "trix", "bulls", "bears",
    "atr", "adx", "std_dev", "stddev", "obv", "mfi", "chaikin", "force", "volumes", "bwmfi",
];

/// Filter and trade-management constructs.
const FILTER_VOCAB: &[&str] = &[
    "crossover",
    "crossunder",
    "threshold",
    "breakout",
    "stop_loss",
    "take_profit",
    "trailing_stop",
    "regime",
    "session",
    "volatility_filter",
    "trend_filter",
    "volume_filter",
];

/// Price/volume series a strategy can reference directly.
const SERIES_VOCAB: &[&str] = &["open", "high", "low", "close", "volume", "bid", "ask", "vwap"];

/// Identifiers whose following string literal names a dataset,
/// e.g. `load("BTC-USD")`.
const DATASET_MARKERS: &[&str] = &["load", "load_data", "read", "dataset", "data", "symbol", "fetch"];

/// Derives a sparse factor vector from strategy source text.
///
/// Deterministic and pure: the same code always yields the same vector,
/// which is what allows vectors to be cached per genome id. Code that
/// contains nothing recognizable yields an empty vector rather than an
/// error, so malformed code never blocks ingestion.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, code: &str) -> FactorVector {
        let mut vector = FactorVector::new();
        let mut previous_ident: Option<String> = None;

        let mut chars = code.chars().peekable();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_alphabetic() || c == '_' {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c.to_ascii_lowercase());
                        chars.next();
                    } else {
                        break;
                    }
                }
                if INDICATOR_VOCAB.contains(&ident.as_str()) {
                    bump(&mut vector, "indicator", &ident);
                } else if FILTER_VOCAB.contains(&ident.as_str()) {
                    bump(&mut vector, "filter", &ident);
                } else if SERIES_VOCAB.contains(&ident.as_str()) {
                    bump(&mut vector, "dataset", &ident);
                }
                previous_ident = Some(ident);
            } else if c == '"' || c == '\'' {
                let quote = c;
                chars.next();
                let mut literal = String::new();
                for c in chars.by_ref() {
                    if c == quote || c == '\n' {
                        break;
                    }
                    literal.push(c);
                }
                let names_dataset = previous_ident
                    .as_deref()
                    .map_or(false, |ident| DATASET_MARKERS.contains(&ident));
                if names_dataset && is_dataset_name(&literal) {
                    bump(&mut vector, "dataset", &literal.to_ascii_lowercase());
                }
                previous_ident = None;
            } else {
                // Punctuation between a marker and its literal (e.g. `load(`)
                // must not reset the marker.
                if !matches!(c, '(' | ' ' | '\t' | '=') {
                    previous_ident = None;
                }
                chars.next();
            }
        }

        vector
    }
}

fn bump(vector: &mut FactorVector, kind: &str, name: &str) {
    *vector.entry(format!("{}:{}", kind, name)).or_insert(0.0) += 1.0;
}

fn is_dataset_name(literal: &str) -> bool {
    !literal.is_empty()
        && literal.len() <= 32
        && literal
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
}
