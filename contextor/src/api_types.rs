//! Public API types re-used by external crates (e.g., the HTTP API layer).

use std::fmt;
use std::str::FromStr;

use futures::stream::BoxStream;
use rag_store::Predicate;
use serde::{Deserialize, Serialize};

use crate::error::ContextorError;

/// Output language of the synthesized answer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Chinese,
    English,
}

impl FromStr for Language {
    type Err = ContextorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chinese" | "zh" | "cn" => Ok(Self::Chinese),
            "english" | "en" => Ok(Self::English),
            other => Err(ContextorError::Config(format!("unknown language '{other}'"))),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Language::Chinese => "chinese",
            Language::English => "english",
        })
    }
}

/// One question the pipeline searches for. Ordinal 0 is the user's question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuery {
    pub text: String,
    pub ordinal: usize,
}

/// A reranked chunk handed to synthesis; `rank` is 1-based and global.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub rank: usize,
    pub relevance_score: f32,
    pub text: String,
    pub document_id: String,
    pub page: i64,
}

/// Per-request options.
///
/// `include_documents: None` searches every document; `Some(vec![])` is
/// rejected as an empty inclusion set.
#[derive(Clone, Debug)]
pub struct AskOptions {
    pub include_documents: Option<Vec<String>>,
    pub exclude_documents: Vec<String>,
    /// Search blocked documents too (off by default).
    pub include_blocked: bool,
    /// Falls back to the configured default language.
    pub language: Option<Language>,
    /// Expand the question into sub-questions before searching.
    pub decompose: bool,
}

impl Default for AskOptions {
    fn default() -> Self {
        Self {
            include_documents: None,
            exclude_documents: Vec::new(),
            include_blocked: false,
            language: None,
            decompose: true,
        }
    }
}

impl AskOptions {
    /// Restricts the search to the given documents.
    pub fn only(documents: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            include_documents: Some(documents.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn predicate(&self) -> Predicate {
        let mut p = Predicate::any().exclude(self.exclude_documents.iter().cloned());
        if let Some(ids) = &self.include_documents {
            p = p.include(ids.iter().cloned());
        }
        if !self.include_blocked {
            p = p.unblocked_only();
        }
        p
    }
}

/// Retrieval result without synthesis.
#[derive(Clone, Debug, Serialize)]
pub struct Retrieval {
    pub sub_queries: Vec<SubQuery>,
    pub references: Vec<Reference>,
}

/// Final answer together with what it was built from.
#[derive(Clone, Debug, Serialize)]
pub struct QaAnswer {
    pub answer: String,
    pub sub_queries: Vec<SubQuery>,
    pub references: Vec<Reference>,
}

/// Streaming answer: retrieval is already done, fragments arrive as generated.
pub struct AnswerStream {
    pub sub_queries: Vec<SubQuery>,
    pub references: Vec<Reference>,
    pub fragments: BoxStream<'static, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_hide_blocked_documents() {
        let p = AskOptions::default().predicate();
        assert_eq!(p.to_string(), "blocked == false");
    }

    #[test]
    fn inclusion_and_blocked_flag_compose() {
        let mut opts = AskOptions::only(["a.pdf"]);
        opts.include_blocked = true;
        let p = opts.predicate();
        assert_eq!(p.include_documents, Some(vec!["a.pdf".to_string()]));
        assert!(!p.exclude_blocked);
    }

    #[test]
    fn language_parses_loosely() {
        assert_eq!("English".parse::<Language>().unwrap(), Language::English);
        assert_eq!("zh".parse::<Language>().unwrap(), Language::Chinese);
        assert!("klingon".parse::<Language>().is_err());
    }
}
