//! TF-IDF keyword index.
//!
//! Built by adding every document of a collection into a shared
//! term-frequency/inverse-document-frequency accumulator. Query scoring
//! sums per-term TF-IDF weights over the query's whitespace-tokenized
//! terms, plus a flat 0.5 bonus for a literal substring match of the
//! whole query and 0.2 per query word present as a standalone token.
//!
//! An index is built once per process lifetime for a given collection and
//! cached by the orchestrator, unlike the full-text inverted index,
//! which is rebuilt on every call.

use std::collections::HashMap;

/// Width of generated excerpts, in characters.
const EXCERPT_CHARS: usize = 160;

const WHOLE_QUERY_BONUS: f64 = 0.5;
const WORD_TOKEN_BONUS: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub filename: String,
    pub excerpt: String,
    pub score: f64,
}

struct IndexedDoc {
    filename: String,
    content: String,
    folded: String,
    token_counts: HashMap<String, usize>,
    token_total: usize,
}

pub struct KeywordIndex {
    docs: Vec<IndexedDoc>,
    document_frequency: HashMap<String, usize>,
}

/// Lowercased alphanumeric word tokens.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

impl KeywordIndex {
    pub fn build(files: Vec<(String, String)>) -> Self {
        let mut docs = Vec::with_capacity(files.len());
        let mut document_frequency: HashMap<String, usize> = HashMap::new();

        for (filename, content) in files {
            let tokens = tokenize(&content);
            let token_total = tokens.len();
            let mut token_counts: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *token_counts.entry(token).or_insert(0) += 1;
            }
            for token in token_counts.keys() {
                *document_frequency.entry(token.clone()).or_insert(0) += 1;
            }
            docs.push(IndexedDoc {
                folded: content.to_lowercase(),
                content,
                filename,
                token_counts,
                token_total,
            });
        }

        Self {
            docs,
            document_frequency,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// TF-IDF weight of one term in one document; 0.0 when absent.
    pub fn score(&self, term: &str, doc_index: usize) -> f64 {
        let doc = match self.docs.get(doc_index) {
            Some(d) => d,
            None => return 0.0,
        };
        let folded_term = term.to_lowercase();
        let count = match doc.token_counts.get(&folded_term) {
            Some(&c) if doc.token_total > 0 => c,
            _ => return 0.0,
        };

        let tf = count as f64 / doc.token_total as f64;
        let df = *self.document_frequency.get(&folded_term).unwrap_or(&0);
        let idf = (((1 + self.docs.len()) as f64) / ((1 + df) as f64)).ln() + 1.0;
        tf * idf
    }

    /// Rank documents for a query, best first, truncated to `top_k`.
    pub fn query(&self, query: &str, top_k: usize) -> Vec<KeywordHit> {
        let folded_query = query.to_lowercase();
        let terms: Vec<&str> = query.split_whitespace().collect();
        let words = tokenize(query);

        let mut hits: Vec<KeywordHit> = Vec::new();

        for (doc_index, doc) in self.docs.iter().enumerate() {
            let mut score: f64 = terms.iter().map(|t| self.score(t, doc_index)).sum();

            if !folded_query.is_empty() && doc.folded.contains(&folded_query) {
                score += WHOLE_QUERY_BONUS;
            }
            for word in &words {
                if doc.token_counts.contains_key(word) {
                    score += WORD_TOKEN_BONUS;
                }
            }

            if score > 0.0 {
                hits.push(KeywordHit {
                    filename: doc.filename.clone(),
                    excerpt: excerpt_around(&doc.content, &words, EXCERPT_CHARS),
                    score,
                });
            }
        }

        // Deterministic: score descending, then filename ascending.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        hits.truncate(top_k);
        hits
    }
}

/// A character window of `content` centered on the first occurrence of
/// any of the given words; the head of the document when none occur.
pub(crate) fn excerpt_around(content: &str, words: &[String], width: usize) -> String {
    let folded = content.to_lowercase();
    let hit = words
        .iter()
        .filter_map(|w| folded.find(w.as_str()))
        .min()
        .unwrap_or(0);

    let start = hit.saturating_sub(width / 4);
    // Snap to a char boundary.
    let start = (start..=hit).find(|&i| content.is_char_boundary(i)).unwrap_or(0);

    let excerpt: String = content[start..].chars().take(width).collect();
    excerpt.replace('\n', " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<(String, String)> {
        vec![
            (
                "rust.md".to_string(),
                "Rust ownership and borrowing. The borrow checker enforces ownership rules."
                    .to_string(),
            ),
            (
                "python.md".to_string(),
                "Python uses reference counting and a garbage collector.".to_string(),
            ),
            (
                "mixed.md".to_string(),
                "Both Rust and Python are widely used languages.".to_string(),
            ),
        ]
    }

    #[test]
    fn test_rare_term_outweighs_common() {
        let index = KeywordIndex::build(corpus());
        // "ownership" appears only in rust.md; "and" appears everywhere.
        let rare = index.score("ownership", 0);
        let common = index.score("and", 0);
        assert!(rare > 0.0);
        assert!(rare > common);
    }

    #[test]
    fn test_absent_term_scores_zero() {
        let index = KeywordIndex::build(corpus());
        assert_eq!(index.score("kubernetes", 0), 0.0);
        assert_eq!(index.score("ownership", 1), 0.0);
    }

    #[test]
    fn test_query_ranks_topical_doc_first() {
        let index = KeywordIndex::build(corpus());
        let hits = index.query("borrow checker", 10);
        assert!(!hits.is_empty());
        assert_eq!(hits[0].filename, "rust.md");
    }

    #[test]
    fn test_whole_query_substring_bonus() {
        let index = KeywordIndex::build(corpus());
        let with_phrase = index.query("garbage collector", 10);
        assert_eq!(with_phrase[0].filename, "python.md");
        // The phrase doc gets term weights + word bonuses + the 0.5
        // whole-query bonus; no other doc shares these words.
        assert!(with_phrase[0].score > 0.5 + 2.0 * 0.2);
    }

    #[test]
    fn test_no_match_is_empty() {
        let index = KeywordIndex::build(corpus());
        assert!(index.query("zeppelin", 10).is_empty());
    }

    #[test]
    fn test_top_k_truncation_and_tie_order() {
        let index = KeywordIndex::build(corpus());
        let hits = index.query("rust", 1);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_excerpt_centers_on_first_hit() {
        let filler = "x ".repeat(300);
        let content = format!("{}needle in the middle {}", filler, filler);
        let excerpt = excerpt_around(&content, &["needle".to_string()], 80);
        assert!(excerpt.contains("needle"));
        assert!(excerpt.len() <= 80);
    }
}
