//! Minimal text analysis for full-text and suggest matching.

/// Split text into lowercase alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// One term of a full-text query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    text: String,
    prefix: bool,
}

impl Term {
    /// Whether a document token satisfies this term.
    pub fn matches(&self, token: &str) -> bool {
        if self.prefix {
            token.starts_with(&self.text)
        } else {
            token == self.text
        }
    }
}

/// Parse a full-text query into terms.
///
/// Returns `None` when the query matches every document (`*` or blank).
/// A trailing `*` on a word makes it a prefix term.
pub fn parse_query(query: &str) -> Option<Vec<Term>> {
    let query = query.trim();
    if query.is_empty() || query == "*" {
        return None;
    }

    let terms = query
        .split_whitespace()
        .flat_map(|word| {
            let prefix = word.ends_with('*');
            let tokens = tokenize(word);
            let last = tokens.len().saturating_sub(1);
            tokens
                .into_iter()
                .enumerate()
                .map(move |(i, text)| Term {
                    text,
                    prefix: prefix && i == last,
                })
        })
        .collect::<Vec<_>>();

    Some(terms)
}

/// Whether `value` has a word starting with `prefix`.
///
/// With `fuzzy`, a word also matches when its leading characters are within
/// one edit of `prefix`.
pub fn suggest_matches(value: &str, prefix: &str, fuzzy: bool) -> bool {
    let prefix = prefix.trim().to_lowercase();
    if prefix.is_empty() {
        return false;
    }
    let prefix_len = prefix.chars().count();

    tokenize(value).iter().any(|word| {
        if word.starts_with(&prefix) {
            return true;
        }
        if !fuzzy {
            return false;
        }
        let head: String = word.chars().take(prefix_len).collect();
        strsim::levenshtein(&head, &prefix) <= 1
    })
}
