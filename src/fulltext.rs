//! Per-query inverted-index full-text search.
//!
//! Builds a term → postings map over a collection's documents and scores
//! by query-term coverage. The index is rebuilt on every call; it is the
//! throwaway counterpart to the cached [`crate::keyword::KeywordIndex`].

use std::collections::HashMap;

use crate::keyword::{excerpt_around, tokenize};

const EXCERPT_CHARS: usize = 160;

#[derive(Debug, Clone)]
pub struct FulltextHit {
    pub filename: String,
    pub excerpt: String,
    /// Fraction of query terms present, in (0, 1].
    pub score: f64,
    pub occurrences: usize,
}

struct FtDoc {
    filename: String,
    content: String,
}

pub struct InvertedIndex {
    docs: Vec<FtDoc>,
    /// term → (doc index, occurrence count)
    postings: HashMap<String, Vec<(usize, usize)>>,
}

impl InvertedIndex {
    pub fn build(files: Vec<(String, String)>) -> Self {
        let mut docs = Vec::with_capacity(files.len());
        let mut postings: HashMap<String, Vec<(usize, usize)>> = HashMap::new();

        for (doc_index, (filename, content)) in files.into_iter().enumerate() {
            let mut counts: HashMap<String, usize> = HashMap::new();
            for token in tokenize(&content) {
                *counts.entry(token).or_insert(0) += 1;
            }
            for (token, count) in counts {
                postings.entry(token).or_default().push((doc_index, count));
            }
            docs.push(FtDoc { filename, content });
        }

        Self { docs, postings }
    }

    pub fn search(&self, query: &str, top_k: usize) -> Vec<FulltextHit> {
        let mut terms = tokenize(query);
        terms.sort();
        terms.dedup();
        if terms.is_empty() {
            return Vec::new();
        }

        // doc index → (matched terms, total occurrences)
        let mut matched: HashMap<usize, (usize, usize)> = HashMap::new();
        for term in &terms {
            if let Some(entries) = self.postings.get(term) {
                for &(doc_index, count) in entries {
                    let entry = matched.entry(doc_index).or_insert((0, 0));
                    entry.0 += 1;
                    entry.1 += count;
                }
            }
        }

        let mut hits: Vec<FulltextHit> = matched
            .into_iter()
            .map(|(doc_index, (term_hits, occurrences))| {
                let doc = &self.docs[doc_index];
                FulltextHit {
                    filename: doc.filename.clone(),
                    excerpt: excerpt_around(&doc.content, &terms, EXCERPT_CHARS),
                    score: term_hits as f64 / terms.len() as f64,
                    occurrences,
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.occurrences.cmp(&a.occurrences))
                .then_with(|| a.filename.cmp(&b.filename))
        });
        hits.truncate(top_k);
        hits
    }
}
