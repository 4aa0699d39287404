use crate::models::{Excerpt, SearchHit};
use crate::query::auto_fuzziness;
use crate::segmenter::Sentences;
use serde::{Deserialize, Serialize};

/// How a sentence is re-checked against the query after the store matched its document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPolicy {
    /// Case-insensitive substring containment of the raw query.
    #[default]
    Literal,
    /// Every query term lies within the AUTO edit distance of some word of the sentence.
    Fuzzy,
}

impl MatchPolicy {
    pub fn matches(&self, sentence: &str, query: &str) -> bool {
        match self {
            MatchPolicy::Literal => sentence.to_lowercase().contains(&query.to_lowercase()),
            MatchPolicy::Fuzzy => fuzzy_contains(sentence, query),
        }
    }
}

/// Turns hits into excerpts, keeping hit order and sentence order.
pub fn highlight(hits: &[SearchHit], query: &str, policy: MatchPolicy) -> Vec<Excerpt> {
    let mut excerpts = Vec::new();

    for hit in hits {
        for sentence in Sentences::new(&hit.content) {
            if policy.matches(sentence, query) {
                excerpts.push(Excerpt {
                    title: hit.title.clone(),
                    highlighted_text: sentence.to_string(),
                });
            }
        }
    }

    excerpts
}

fn fuzzy_contains(sentence: &str, query: &str) -> bool {
    let words = sentence
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>();

    let mut terms = query.split_whitespace().map(str::to_lowercase).peekable();
    if terms.peek().is_none() {
        return false;
    }

    terms.all(|term| {
        let allowed = auto_fuzziness(&term);
        words
            .iter()
            .any(|word| edit_distance(word, &term) <= allowed)
    })
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(title: &str, content: &str) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn single_matching_sentence_becomes_one_excerpt() {
        let hits = vec![hit("pets.pdf", "The cat sat. The dog ran fast.")];

        let excerpts = highlight(&hits, "dog", MatchPolicy::Literal);

        assert_eq!(
            excerpts,
            vec![Excerpt {
                title: "pets.pdf".to_string(),
                highlighted_text: "The dog ran fast.".to_string(),
            }]
        );
    }

    #[test]
    fn excerpts_follow_hit_order_then_sentence_order() {
        let hits = vec![
            hit("b.pdf", "Pumps fail. Valves leak. Pump seals wear."),
            hit("a.pdf", "No match here. A PUMP again."),
        ];

        let excerpts = highlight(&hits, "pump", MatchPolicy::Literal);
        let flattened = excerpts
            .iter()
            .map(|excerpt| (excerpt.title.as_str(), excerpt.highlighted_text.as_str()))
            .collect::<Vec<_>>();

        assert_eq!(
            flattened,
            vec![
                ("b.pdf", "Pumps fail."),
                ("b.pdf", "Pump seals wear."),
                ("a.pdf", "A PUMP again."),
            ]
        );
    }

    #[test]
    fn literal_policy_drops_fuzzy_only_matches() {
        let hits = vec![hit("typo.pdf", "The hydralic pump failed.")];

        assert!(highlight(&hits, "hydraulic", MatchPolicy::Literal).is_empty());
        assert_eq!(highlight(&hits, "hydraulic", MatchPolicy::Fuzzy).len(), 1);
    }

    #[test]
    fn fuzzy_policy_requires_every_term() {
        assert!(MatchPolicy::Fuzzy.matches("Hydraulic pumps fail often.", "hydraulic pump"));
        assert!(!MatchPolicy::Fuzzy.matches("Hydraulic valves fail often.", "hydraulic pump"));
        assert!(!MatchPolicy::Fuzzy.matches("Anything.", "  "));
    }

    #[test]
    fn edit_distance_counts_single_char_edits() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("pump", "pump"), 0);
    }
}
