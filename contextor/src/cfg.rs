//! Runtime configuration loaded from environment variables.

use std::str::FromStr;

use crate::api_types::Language;
use crate::error::ContextorError;

/// Knobs of the question answering pipeline. All fields have defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct ContextorConfig {
    /// Candidates requested from the rerank service per sub-query.
    pub rerank_top_n: usize,
    /// Reranked candidates scoring below this are dropped.
    pub relevance_floor: f32,
    /// Cap on generated sub-questions (the original question is not counted).
    pub max_sub_queries: usize,
    /// Answer language when the request names none.
    pub default_language: Language,
}

impl Default for ContextorConfig {
    fn default() -> Self {
        Self {
            rerank_top_n: 5,
            relevance_floor: 0.2,
            max_sub_queries: 4,
            default_language: Language::Chinese,
        }
    }
}

impl ContextorConfig {
    /// Build from environment variables with sensible defaults.
    ///
    /// Reads `RERANK_TOP_N`, `RELEVANCE_FLOOR`, `MAX_SUB_QUERIES` and
    /// `ANSWER_LANGUAGE`.
    pub fn from_env() -> Result<Self, ContextorError> {
        let d = Self::default();
        let cfg = Self {
            rerank_top_n: parse("RERANK_TOP_N", d.rerank_top_n)?,
            relevance_floor: parse("RELEVANCE_FLOOR", d.relevance_floor)?,
            max_sub_queries: parse("MAX_SUB_QUERIES", d.max_sub_queries)?,
            default_language: parse("ANSWER_LANGUAGE", d.default_language)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ContextorError> {
        if self.rerank_top_n == 0 {
            return Err(ContextorError::Config("rerank_top_n must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.relevance_floor) {
            return Err(ContextorError::Config(format!(
                "relevance_floor {} is outside 0.0..=1.0",
                self.relevance_floor
            )));
        }
        Ok(())
    }
}

fn parse<T: FromStr>(k: &str, dflt: T) -> Result<T, ContextorError> {
    match std::env::var(k) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .map_err(|_| ContextorError::Config(format!("{k}: cannot parse '{v}'"))),
        _ => Ok(dflt),
    }
}
