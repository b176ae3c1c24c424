use contextor::{AskOptions, Language};
use serde::Deserialize;

use crate::error_handler::AppError;

/// Body of `POST /api/query` and `POST /api/query/stream`.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    /// Natural language question.
    pub query: String,
    /// Documents the answer may draw from; must not be empty.
    pub active_documents: Vec<String>,
    /// `chinese` (default) or `english`.
    #[serde(default)]
    pub language: Option<String>,
    /// Set to `false` to skip question decomposition.
    #[serde(default)]
    pub split: Option<bool>,
}

impl QueryRequest {
    /// Validates the request and converts it into pipeline options.
    pub fn into_parts(self) -> Result<(String, AskOptions), AppError> {
        if self.query.trim().is_empty() {
            return Err(AppError::BadRequest("query must not be empty".into()));
        }
        let documents: Vec<String> = self
            .active_documents
            .into_iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();
        if documents.is_empty() {
            return Err(AppError::BadRequest(
                "active_documents must name at least one document".into(),
            ));
        }

        let mut opts = AskOptions::only(documents);
        opts.language = self
            .language
            .as_deref()
            .map(str::parse::<Language>)
            .transpose()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        opts.decompose = self.split.unwrap_or(true);
        Ok((self.query, opts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(docs: &[&str], language: Option<&str>) -> QueryRequest {
        QueryRequest {
            query: "What is covered?".into(),
            active_documents: docs.iter().map(|d| d.to_string()).collect(),
            language: language.map(str::to_string),
            split: None,
        }
    }

    #[test]
    fn empty_active_documents_are_rejected() {
        assert!(matches!(req(&[], None).into_parts(), Err(AppError::BadRequest(_))));
        assert!(matches!(req(&["  "], None).into_parts(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn options_follow_the_request() {
        let (q, opts) = req(&["warranty.pdf"], Some("english")).into_parts().unwrap();
        assert_eq!(q, "What is covered?");
        assert_eq!(opts.include_documents, Some(vec!["warranty.pdf".to_string()]));
        assert_eq!(opts.language, Some(Language::English));
        assert!(opts.decompose);
        assert!(!opts.include_blocked);
    }

    #[test]
    fn unknown_language_is_a_bad_request() {
        assert!(matches!(
            req(&["a.pdf"], Some("latin")).into_parts(),
            Err(AppError::BadRequest(_))
        ));
    }
}
