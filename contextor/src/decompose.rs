//! Query decomposition: one fast-model call that expands a question into
//! sub-questions. Any failure degrades to the question alone.

use std::collections::HashSet;
use std::sync::Arc;

use ai_llm_service::ChatMessage;
use tracing::{debug, info, warn};

use crate::api_types::SubQuery;
use crate::error::ContextorError;
use crate::llm::ChatModel;

pub const DECOMPOSE_SYSTEM: &str =
    "Split the query into 3-4 sub-questions. Output only the questions, with python list format.";

#[derive(Clone)]
pub struct QueryDecomposer {
    chat: Arc<dyn ChatModel>,
    max_sub_queries: usize,
}

impl QueryDecomposer {
    pub fn new(chat: Arc<dyn ChatModel>, max_sub_queries: usize) -> Self {
        Self {
            chat,
            max_sub_queries,
        }
    }

    /// Returns the question as ordinal 0, followed by the generated sub-questions.
    ///
    /// Never fails: a completion error or unparseable output yields only the
    /// original question.
    pub async fn decompose(&self, question: &str) -> Vec<SubQuery> {
        let messages = [
            ChatMessage::system(DECOMPOSE_SYSTEM),
            ChatMessage::user(question),
        ];
        let raw = match self.chat.complete(&messages).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "decomposition call failed; using the question alone");
                return original_only(question);
            }
        };

        match parse_sub_questions(&raw) {
            Ok(items) => {
                let subs = assemble(question, items, self.max_sub_queries);
                info!(sub_queries = subs.len(), "question decomposed");
                subs
            }
            Err(e) => {
                warn!(error = %e, "decomposition output is not a list; using the question alone");
                original_only(question)
            }
        }
    }
}

pub fn original_only(question: &str) -> Vec<SubQuery> {
    vec![SubQuery {
        text: question.to_string(),
        ordinal: 0,
    }]
}

/// Prepends the verbatim question, drops blanks and repeats, caps the rest.
fn assemble(question: &str, items: Vec<String>, cap: usize) -> Vec<SubQuery> {
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(question.trim().to_lowercase());

    let mut out = original_only(question);
    for item in items {
        if out.len() > cap {
            break;
        }
        let text = item.trim();
        if text.is_empty() || !seen.insert(text.to_lowercase()) {
            continue;
        }
        out.push(SubQuery {
            text: text.to_string(),
            ordinal: out.len(),
        });
    }
    out
}

/// Extracts a list of strings from model output.
///
/// Accepts a JSON array or a Python list literal, optionally inside a
/// fenced code block or surrounded by prose.
pub fn parse_sub_questions(raw: &str) -> Result<Vec<String>, ContextorError> {
    let body = strip_fence(raw.trim());
    let (start, end) = match (body.find('['), body.rfind(']')) {
        (Some(s), Some(e)) if s < e => (s, e),
        _ => {
            return Err(ContextorError::DecompositionParse(format!(
                "no list in output: {}",
                preview(raw)
            )));
        }
    };
    let slice = &body[start..=end];

    if let Ok(items) = serde_json::from_str::<Vec<String>>(slice) {
        debug!(items = items.len(), "parsed JSON list");
        return Ok(items);
    }
    parse_python_list(slice).ok_or_else(|| {
        ContextorError::DecompositionParse(format!("malformed list: {}", preview(slice)))
    })
}

fn strip_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // Drop the info string (e.g. "python") on the opening line.
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Parses `['a', "b", ...]` with backslash escapes; `None` on anything else.
fn parse_python_list(s: &str) -> Option<Vec<String>> {
    let inner = s.trim().strip_prefix('[')?.strip_suffix(']')?;
    let mut out = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(quote) = chars.next() else {
            break;
        };
        if quote != '\'' && quote != '"' {
            return None;
        }

        let mut item = String::new();
        let mut closed = false;
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next()? {
                    'n' => item.push('\n'),
                    't' => item.push('\t'),
                    other => item.push(other),
                },
                c if c == quote => {
                    closed = true;
                    break;
                }
                c => item.push(c),
            }
        }
        if !closed {
            return None;
        }
        out.push(item);

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            Some(',') => continue,
            None => break,
            Some(_) => return None,
        }
    }
    Some(out)
}

fn preview(s: &str) -> String {
    let mut p: String = s.chars().take(80).collect();
    if p.len() < s.len() {
        p.push('…');
    }
    p
}
