//! Obfuscation analysis heuristic.
//!
//! Coarse classifier: a fixed table of named regex signals, each worth 20
//! points. No false-positive or false-negative guarantees.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Points contributed by each matched signal.
const SIGNAL_WEIGHT: u32 = 20;
/// Score at or above which content is judged obfuscated.
const OBFUSCATED_THRESHOLD: u32 = 40;

static SIGNALS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("base64", r"base64_decode"),
        ("strrev", r"strrev"),
        ("eval", r"eval\s*\("),
        ("obfuscated", r"\$obfuscated"),
        ("encoded", r"[A-Za-z0-9+/]{20,}={0,2}"),
    ]
    .iter()
    .filter_map(|(name, pattern)| Regex::new(pattern).ok().map(|re| (*name, re)))
    .collect()
});

/// Heuristic judgment about one piece of content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub is_obfuscated: bool,
    /// 0..=100, in steps of 20 per matched signal.
    pub confidence: u32,
    pub signals: Vec<String>,
}

/// Score `content` against the signal table.
pub fn analyze(content: &str) -> AnalysisResult {
    let mut score = 0;
    let mut signals = Vec::new();

    for (name, regex) in SIGNALS.iter() {
        if regex.is_match(content) {
            score += SIGNAL_WEIGHT;
            signals.push((*name).to_string());
        }
    }

    AnalysisResult {
        is_obfuscated: score >= OBFUSCATED_THRESHOLD,
        confidence: score.min(100),
        signals,
    }
}
