//! Prompt builder: language-specific system message + questions and
//! ranked references.

use ai_llm_service::ChatMessage;

use crate::api_types::{Language, Reference, SubQuery};

const BASE_SYSTEM: &str = "You are a helpful assistant that answers questions in detail, based on the provided context. \
Provide page numbers of the context in your answer. \
You need to answer as detailed as possible and be consistent with the given context.";

const IMAGE_LINKS_PREFIXED: &str = "You need to use markdown format to answer, if you need to use pictures in the reference, \
in your markdown, write the image link as {pdf_name}/{original_image_link}.";

const IMAGE_LINKS_VERBATIM: &str = "You need to use markdown format to answer, if you need to use pictures in the reference, \
copy the image link to the answer as a markdown link format, because the image file will be put besides your response, \
do not modify anything about the link, JUST COPY THE LINK AND MAKE IT TO BE MARKDOWN.";

/// System instruction for the given answer language.
pub fn system_prompt(language: Language) -> String {
    let (directive, links) = match language {
        Language::Chinese => ("Use Chinese to answer.", IMAGE_LINKS_PREFIXED),
        Language::English => ("Use English to answer.", IMAGE_LINKS_VERBATIM),
    };
    format!("{BASE_SYSTEM} {directive} {links}")
}

/// Lists every sub-question, then every reference in rank order.
pub fn build_user_prompt(subs: &[SubQuery], references: &[Reference]) -> String {
    let mut out = String::from("Questions:\n");
    for s in subs {
        out.push_str(&format!("{}. {}\n", s.ordinal + 1, s.text.trim()));
    }

    out.push_str("\nReferences:\n");
    if references.is_empty() {
        out.push_str("(no relevant references were found)\n");
    }
    for r in references {
        out.push_str(&format!(
            "==[{}]== {} :: page {} (relevance {:.3})\n{}\n\n",
            r.rank,
            r.document_id,
            r.page,
            r.relevance_score,
            r.text.trim()
        ));
    }
    out
}

pub fn build_messages(
    subs: &[SubQuery],
    references: &[Reference],
    language: Language,
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt(language)),
        ChatMessage::user(build_user_prompt(subs, references)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompts_differ_in_language_and_links() {
        let zh = system_prompt(Language::Chinese);
        let en = system_prompt(Language::English);
        assert!(zh.contains("Use Chinese") && zh.contains("{pdf_name}/{original_image_link}"));
        assert!(en.contains("Use English") && en.contains("JUST COPY THE LINK"));
    }

    #[test]
    fn user_prompt_keeps_reference_order() {
        let subs = vec![
            SubQuery { text: "What is X?".into(), ordinal: 0 },
            SubQuery { text: "Where is X used?".into(), ordinal: 1 },
        ];
        let refs = vec![
            Reference { rank: 1, relevance_score: 0.9, text: "first".into(), document_id: "a.pdf".into(), page: 3 },
            Reference { rank: 2, relevance_score: 0.4, text: "second".into(), document_id: "b.pdf".into(), page: 1 },
        ];
        let p = build_user_prompt(&subs, &refs);
        assert!(p.starts_with("Questions:\n1. What is X?\n2. Where is X used?\n"));
        let first = p.find("first").unwrap();
        let second = p.find("second").unwrap();
        assert!(first < second);
        assert!(p.contains("==[1]== a.pdf :: page 3 (relevance 0.900)"));
    }

    #[test]
    fn empty_references_are_stated() {
        let p = build_user_prompt(&[SubQuery { text: "q".into(), ordinal: 0 }], &[]);
        assert!(p.contains("no relevant references"));
    }
}
