//! Line-oriented boolean/substring matcher.
//!
//! Queries support `AND`/`OR`/`NOT` (word forms or `&`/`|`/`!`).
//! Precedence, lowest to highest: OR, AND, NOT. The query is split on
//! OR first, and each branch is a conjunction of possibly-negated terms.
//! A branch matches a line only if every required term is present and
//! every negated term is absent.
//!
//! Scoring: an exact full-line match scores 1.0; otherwise
//! `min(occurrences * 0.3, 0.9)` with a 0.1 bonus when the line starts
//! with the query, capped at 1.0.
//!
//! Each match carries two lines of context either side, with matched
//! terms highlighted using `>>>`/`<<<` markers. A malformed expression is
//! not an error at this boundary: the whole query falls back to a literal
//! substring term.

use crate::error::{Result, RetrievalError};

const CONTEXT_LINES: usize = 2;
const HIGHLIGHT_OPEN: &str = ">>>";
const HIGHLIGHT_CLOSE: &str = "<<<";

#[derive(Debug, Clone, Copy, Default)]
pub struct MatchOptions {
    pub case_sensitive: bool,
    pub whole_words: bool,
}

#[derive(Debug, Clone)]
struct Term {
    text: String,
    negated: bool,
}

#[derive(Debug, Clone)]
pub struct LineMatch {
    /// 1-based line number.
    pub line_number: usize,
    pub line: String,
    pub highlighted: String,
    pub score: f64,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
}

/// Search `lines` with a boolean query, returning matches in line order.
pub fn search_lines(query: &str, lines: &[String], options: &MatchOptions) -> Vec<LineMatch> {
    let branches = match parse_query(query) {
        Ok(b) => b,
        Err(_) => {
            // Malformed expression: treat the whole query as a literal.
            vec![vec![Term {
                text: query.trim().to_string(),
                negated: false,
            }]]
        }
    };

    let mut matches = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let branch = match branches.iter().find(|b| branch_matches(b, line, options)) {
            Some(b) => b,
            None => continue,
        };

        let score = score_line(query, line, branch, options);
        let context_before = lines[i.saturating_sub(CONTEXT_LINES)..i].to_vec();
        let context_after = lines[(i + 1)..lines.len().min(i + 1 + CONTEXT_LINES)].to_vec();

        matches.push(LineMatch {
            line_number: i + 1,
            line: line.clone(),
            highlighted: highlight(line, branch, options),
            score,
            context_before,
            context_after,
        });
    }

    matches
}

/// Parse into OR-branches of conjunctive terms.
fn parse_query(query: &str) -> Result<Vec<Vec<Term>>> {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(RetrievalError::QuerySyntax("empty query".to_string()));
    }

    let mut branches: Vec<Vec<Term>> = Vec::new();
    let mut current: Vec<Term> = Vec::new();
    let mut negate_next = false;

    for token in &tokens {
        let upper = token.to_uppercase();
        match upper.as_str() {
            "OR" | "|" => {
                if negate_next {
                    return Err(RetrievalError::QuerySyntax(
                        "NOT must be followed by a term".to_string(),
                    ));
                }
                if current.is_empty() {
                    return Err(RetrievalError::QuerySyntax(
                        "OR with an empty branch".to_string(),
                    ));
                }
                branches.push(std::mem::take(&mut current));
            }
            "AND" | "&" => {
                if negate_next {
                    return Err(RetrievalError::QuerySyntax(
                        "NOT must be followed by a term".to_string(),
                    ));
                }
            }
            "NOT" | "!" => {
                negate_next = true;
            }
            _ => {
                let (text, negated) = if let Some(rest) = token.strip_prefix('!') {
                    if rest.is_empty() {
                        (token.to_string(), negate_next)
                    } else {
                        (rest.to_string(), true)
                    }
                } else {
                    (token.to_string(), negate_next)
                };
                current.push(Term { text, negated });
                negate_next = false;
            }
        }
    }

    if negate_next {
        return Err(RetrievalError::QuerySyntax(
            "dangling NOT at end of query".to_string(),
        ));
    }
    if current.is_empty() {
        return Err(RetrievalError::QuerySyntax(
            "OR with an empty branch".to_string(),
        ));
    }
    branches.push(current);

    Ok(branches)
}

fn fold(text: &str, options: &MatchOptions) -> String {
    if options.case_sensitive {
        text.to_string()
    } else {
        text.to_lowercase()
    }
}

/// Case-fold a line, keeping a per-byte map from folded offsets back to
/// the originating char's start offset in the original line. Lowercasing
/// can change byte lengths (U+1E9E folds shorter, U+0130 folds to a
/// two-char sequence), so folded offsets must never slice the original
/// line directly.
fn fold_offsets(line: &str) -> (String, Vec<usize>) {
    let mut folded = String::with_capacity(line.len());
    let mut origin = Vec::with_capacity(line.len());
    for (idx, ch) in line.char_indices() {
        for low in ch.to_lowercase() {
            folded.push(low);
            for _ in 0..low.len_utf8() {
                origin.push(idx);
            }
        }
    }
    (folded, origin)
}

/// Occurrences of `term` in `text`, as byte ranges into `text`.
fn scan_ranges(text: &str, term: &str, whole_words: bool) -> Vec<(usize, usize)> {
    if whole_words {
        let mut ranges = Vec::new();
        let mut word_start: Option<usize> = None;
        for (idx, ch) in text.char_indices() {
            if ch.is_alphanumeric() || ch == '_' {
                if word_start.is_none() {
                    word_start = Some(idx);
                }
            } else if let Some(start) = word_start.take() {
                if &text[start..idx] == term {
                    ranges.push((start, idx));
                }
            }
        }
        if let Some(start) = word_start {
            if &text[start..] == term {
                ranges.push((start, text.len()));
            }
        }
        ranges
    } else {
        text.match_indices(term)
            .map(|(idx, m)| (idx, idx + m.len()))
            .collect()
    }
}

/// Byte ranges of every occurrence of `term` in `line`, always expressed
/// in the original line's coordinates.
fn occurrence_ranges(line: &str, term: &str, options: &MatchOptions) -> Vec<(usize, usize)> {
    let folded_term = fold(term, options);
    if folded_term.is_empty() {
        return Vec::new();
    }
    if options.case_sensitive {
        return scan_ranges(line, &folded_term, options.whole_words);
    }

    // Match on the folded line, then translate each range back through
    // the offset map, widening the end to the original char's boundary.
    let (folded_line, origin) = fold_offsets(line);
    scan_ranges(&folded_line, &folded_term, options.whole_words)
        .into_iter()
        .map(|(start, end)| {
            let from = origin[start];
            let last = origin[end - 1];
            let to = last + line[last..].chars().next().map_or(0, char::len_utf8);
            (from, to)
        })
        .collect()
}

fn branch_matches(branch: &[Term], line: &str, options: &MatchOptions) -> bool {
    branch.iter().all(|term| {
        let present = !occurrence_ranges(line, &term.text, options).is_empty();
        present != term.negated
    })
}

fn score_line(query: &str, line: &str, branch: &[Term], options: &MatchOptions) -> f64 {
    let folded_line = fold(line.trim(), options);
    let folded_query = fold(query.trim(), options);

    if folded_line == folded_query {
        return 1.0;
    }

    let occurrences: usize = branch
        .iter()
        .filter(|t| !t.negated)
        .map(|t| occurrence_ranges(line, &t.text, options).len())
        .sum();

    let mut score = (occurrences as f64 * 0.3).min(0.9);
    if folded_line.starts_with(&folded_query) {
        score += 0.1;
    }
    score.min(1.0)
}

/// Wrap every occurrence of the branch's required terms in highlight
/// markers, preserving the original line's casing.
fn highlight(line: &str, branch: &[Term], options: &MatchOptions) -> String {
    let mut ranges: Vec<(usize, usize)> = branch
        .iter()
        .filter(|t| !t.negated)
        .flat_map(|t| occurrence_ranges(line, &t.text, options))
        .collect();
    ranges.sort();

    // Merge overlaps so nested markers never appear.
    let mut merged: Vec<(usize, usize)> = Vec::new();
    for (start, end) in ranges {
        match merged.last_mut() {
            Some(last) if start < last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }

    let mut out = String::with_capacity(line.len());
    let mut cursor = 0;
    for (start, end) in merged {
        out.push_str(&line[cursor..start]);
        out.push_str(HIGHLIGHT_OPEN);
        out.push_str(&line[start..end]);
        out.push_str(HIGHLIGHT_CLOSE);
        cursor = end;
    }
    out.push_str(&line[cursor..]);
    out
}
