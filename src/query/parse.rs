//! Search-string parser
//!
//! Grammar, after splitting on whitespace:
//!
//! ```text
//! token     = scope | word
//! scope     = "in:" reference
//! reference = "/topics/" id | "/" segment "/topics/" id
//! id        = 1*( ALPHA / DIGIT / "-" / "_" )
//! segment   = 1*( ALPHA / DIGIT / "-" / "_" )
//! ```
//!
//! An `in:` token whose reference does not match exactly is an ordinary word.

use super::types::QuerySpec;
use crate::graph::TopicId;

const SCOPE_PREFIX: &str = "in:";
const TOPICS_SEGMENT: &str = "topics";

/// Parse a raw search string
pub fn parse(raw: &str) -> QuerySpec {
    let mut spec = QuerySpec {
        raw_input: raw.to_string(),
        ..QuerySpec::default()
    };

    for token in raw.split_whitespace() {
        let scope = token
            .strip_prefix(SCOPE_PREFIX)
            .and_then(parse_topic_reference);
        match scope {
            Some(topic) => {
                spec.explicit_topic_scopes.insert(topic);
            }
            None => spec.free_text_tokens.push(token.to_string()),
        }
    }
    spec
}

/// Parse `/topics/<id>` or `/<segment>/topics/<id>`
pub fn parse_topic_reference(reference: &str) -> Option<TopicId> {
    let rest = reference.strip_prefix('/')?;
    let parts: Vec<&str> = rest.split('/').collect();
    let id = match parts.as_slice() {
        [TOPICS_SEGMENT, id] => *id,
        [segment, TOPICS_SEGMENT, id] if is_identifier(segment) => *id,
        _ => return None,
    };
    is_identifier(id).then(|| TopicId::from(id))
}

/// The `in:` token that scopes a search to `topic`
pub fn scope_token(topic: &TopicId) -> String {
    format!("{}/{}/{}", SCOPE_PREFIX, TOPICS_SEGMENT, topic)
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
