use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_SEARCH_SIZE: usize = 100;

/// 0 edits up to 2 chars, 1 up to 5, 2 beyond.
pub fn auto_fuzziness(term: &str) -> usize {
    match term.chars().count() {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

/// Full-text match against `content` requiring every term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchQuery {
    pub text: String,
    pub size: usize,
}

impl MatchQuery {
    pub fn to_request_body(&self) -> Value {
        json!({
            "query": {
                "match": {
                    "content": {
                        "query": self.text,
                        "operator": "and",
                        "fuzziness": "AUTO",
                    }
                }
            },
            "size": self.size,
        })
    }
}

/// Returns `None` for a blank query; no search should be issued.
pub fn build_match_query(query: &str, size: usize) -> Option<MatchQuery> {
    if query.trim().is_empty() {
        return None;
    }

    Some(MatchQuery {
        text: query.to_string(),
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_queries_build_nothing() {
        assert!(build_match_query("", DEFAULT_SEARCH_SIZE).is_none());
        assert!(build_match_query("   ", DEFAULT_SEARCH_SIZE).is_none());
    }

    #[test]
    fn request_body_requires_all_terms_with_auto_fuzziness() {
        let query = build_match_query("hydraulic pump", 25).expect("query is not blank");
        let body = query.to_request_body();

        assert_eq!(body["size"], 25);
        assert_eq!(body["query"]["match"]["content"]["query"], "hydraulic pump");
        assert_eq!(body["query"]["match"]["content"]["operator"], "and");
        assert_eq!(body["query"]["match"]["content"]["fuzziness"], "AUTO");
    }

    #[test]
    fn auto_fuzziness_scales_with_term_length() {
        assert_eq!(auto_fuzziness("ab"), 0);
        assert_eq!(auto_fuzziness("pump"), 1);
        assert_eq!(auto_fuzziness("hydraulic"), 2);
    }
}
