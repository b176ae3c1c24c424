//! Search predicate and its conversion to Qdrant `Filter`.
//!
//! A predicate is an AND of up to three clauses over scalar payload fields:
//! `document_id IN {...}`, `document_id NOT IN {...}` and `blocked == false`.
//! It is either handed to Qdrant or evaluated in-process against hits.

use std::fmt;

use qdrant_client::qdrant::{Condition, Filter};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::RagError;
use crate::record::{SearchHit, fields};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    /// `Some(ids)` restricts hits to these documents; `None` means any document.
    pub include_documents: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_documents: Vec<String>,
    #[serde(default)]
    pub exclude_blocked: bool,
}

impl Predicate {
    /// No restriction at all.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn include(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.include_documents = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn exclude(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude_documents.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn unblocked_only(mut self) -> Self {
        self.exclude_blocked = true;
        self
    }

    pub fn is_trivial(&self) -> bool {
        self.include_documents.is_none() && self.exclude_documents.is_empty() && !self.exclude_blocked
    }

    /// Rejects predicates that cannot match anything meaningful.
    ///
    /// An explicit but empty inclusion set is an error, not "match all".
    pub fn validate(&self) -> Result<(), RagError> {
        if let Some(ids) = &self.include_documents {
            if ids.is_empty() {
                return Err(RagError::InvalidPredicate(
                    "document inclusion set is empty".into(),
                ));
            }
        }
        let all = self.include_documents.iter().flatten().chain(&self.exclude_documents);
        for id in all {
            if id.trim().is_empty() {
                return Err(RagError::InvalidPredicate("blank document id".into()));
            }
        }
        Ok(())
    }

    /// In-process evaluation against a hit's scalar fields.
    pub fn matches(&self, hit: &SearchHit) -> bool {
        if self.exclude_blocked && hit.blocked {
            return false;
        }
        if let Some(ids) = &self.include_documents {
            if !ids.iter().any(|id| *id == hit.document_id) {
                return false;
            }
        }
        !self.exclude_documents.iter().any(|id| *id == hit.document_id)
    }

    /// Native Qdrant filter. `None` for a trivial predicate.
    pub fn to_qdrant_filter(&self) -> Option<Filter> {
        if self.is_trivial() {
            return None;
        }
        let mut must: Vec<Condition> = Vec::new();
        let mut must_not: Vec<Condition> = Vec::new();

        if let Some(ids) = &self.include_documents {
            must.push(Condition::matches(fields::DOCUMENT_ID, ids.clone()));
        }
        if !self.exclude_documents.is_empty() {
            must_not.push(Condition::matches(
                fields::DOCUMENT_ID,
                self.exclude_documents.clone(),
            ));
        }
        if self.exclude_blocked {
            must.push(Condition::matches(fields::BLOCKED, false));
        }

        debug!(must = must.len(), must_not = must_not.len(), "predicate -> qdrant filter");
        Some(Filter {
            must,
            must_not,
            ..Default::default()
        })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut clauses = Vec::new();
        if let Some(ids) = &self.include_documents {
            clauses.push(format!("{} in {:?}", fields::DOCUMENT_ID, ids));
        }
        if !self.exclude_documents.is_empty() {
            clauses.push(format!("{} not in {:?}", fields::DOCUMENT_ID, self.exclude_documents));
        }
        if self.exclude_blocked {
            clauses.push(format!("{} == false", fields::BLOCKED));
        }
        if clauses.is_empty() {
            f.write_str("true")
        } else {
            f.write_str(&clauses.join(" and "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(doc: &str, blocked: bool) -> SearchHit {
        SearchHit {
            id: format!("{doc}-1"),
            text: "t".into(),
            document_id: doc.into(),
            page: 1,
            blocked,
            distance: 0.1,
        }
    }

    #[test]
    fn evaluates_all_clauses() {
        let p = Predicate::any().include(["a", "b"]).exclude(["b"]).unblocked_only();
        assert!(p.matches(&hit("a", false)));
        assert!(!p.matches(&hit("a", true)));
        assert!(!p.matches(&hit("b", false)));
        assert!(!p.matches(&hit("c", false)));
    }

    #[test]
    fn empty_inclusion_set_is_invalid() {
        let p = Predicate::any().include(Vec::<String>::new());
        assert!(matches!(p.validate(), Err(RagError::InvalidPredicate(_))));
        assert!(Predicate::any().exclude([" "]).validate().is_err());
        assert!(Predicate::any().validate().is_ok());
    }

    #[test]
    fn renders_as_expression() {
        let p = Predicate::any().include(["a.pdf"]).unblocked_only();
        assert_eq!(p.to_string(), r#"document_id in ["a.pdf"] and blocked == false"#);
        assert_eq!(Predicate::any().to_string(), "true");
    }

    #[test]
    fn qdrant_filter_splits_must_and_must_not() {
        assert!(Predicate::any().to_qdrant_filter().is_none());
        let f = Predicate::any()
            .include(["a"])
            .exclude(["b"])
            .unblocked_only()
            .to_qdrant_filter()
            .unwrap();
        assert_eq!(f.must.len(), 2);
        assert_eq!(f.must_not.len(), 1);
    }
}
