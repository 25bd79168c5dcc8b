//! Fuzzy course-name resolution.
//!
//! Curators type course names by hand, so "organic  chemestry" should land on
//! the existing "Organic Chemistry" entry instead of creating a near-duplicate.
//! Names are compared with a token-sort ratio: normalize, sort the words, then
//! take a normalized Levenshtein similarity scaled to 0..=100.

pub use shelf_domain::catalog::normalize_name as normalize;

fn sorted_tokens(s: &str) -> String {
    let normalized = normalize(s);
    let mut tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Token-sort similarity in `0..=100`.  Symmetric; word order does not count.
pub fn score(a: &str, b: &str) -> u8 {
    let a = sorted_tokens(a);
    let b = sorted_tokens(b);
    (strsim::normalized_levenshtein(&a, &b) * 100.0).round() as u8
}

/// Best-scoring known name for `candidate`, first one wins ties.
pub fn best_match<'a, S: AsRef<str>>(candidate: &str, known: &'a [S]) -> Option<(&'a str, u8)> {
    let mut best: Option<(&str, u8)> = None;
    for name in known {
        let s = score(candidate, name.as_ref());
        if best.map_or(true, |(_, top)| s > top) {
            best = Some((name.as_ref(), s));
        }
    }
    best
}

/// Outcome of [`resolve_detailed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub name: String,
    /// Similarity of the winning known name, `None` when nothing was known.
    pub score: Option<u8>,
    /// `true` when a known name was substituted for the candidate.
    pub corrected: bool,
}

/// Map `candidate` onto a known name when one is close enough.
///
/// An exact match after normalization always wins.  Otherwise the best
/// token-sort score is accepted when it reaches `threshold`; below that the
/// candidate comes back unchanged.
pub fn resolve_detailed<S: AsRef<str>>(candidate: &str, known: &[S], threshold: u8) -> Resolution {
    let wanted = normalize(candidate);
    if let Some(exact) = known.iter().find(|k| normalize(k.as_ref()) == wanted) {
        let name = exact.as_ref().to_string();
        return Resolution {
            corrected: name != candidate,
            name,
            score: Some(100),
        };
    }

    match best_match(candidate, known) {
        Some((name, s)) if s >= threshold => Resolution {
            name: name.to_string(),
            score: Some(s),
            corrected: true,
        },
        best => Resolution {
            name: candidate.to_string(),
            score: best.map(|(_, s)| s),
            corrected: false,
        },
    }
}

pub fn resolve<S: AsRef<str>>(candidate: &str, known: &[S], threshold: u8) -> String {
    resolve_detailed(candidate, known, threshold).name
}
