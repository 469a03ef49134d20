use serde::{Deserialize, Serialize};

/// Best candidate for a raw phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionMatch {
    pub candidate: String,
    /// Similarity in `0..=100`.
    pub score: u8,
}

/// Minimum score a best match needs before it is accepted.
///
/// The default of 0 accepts whatever scores highest, however poor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPolicy {
    #[serde(default)]
    pub min_score: u8,
}

impl MatchPolicy {
    pub fn accepts(&self, m: &ConditionMatch) -> bool {
        m.score >= self.min_score
    }
}

/// Pick the candidate most similar to `raw_phrase`.
///
/// Comparison ignores case and surrounding whitespace. Similarity is the
/// Indel ratio `2 * LCS / (|a| + |b|)` over chars. Among equal ratios the
/// earliest candidate wins. Returns `None` only when `candidates` is empty.
pub fn best_match<S: AsRef<str>>(raw_phrase: &str, candidates: &[S]) -> Option<ConditionMatch> {
    let phrase: Vec<char> = normalize(raw_phrase).chars().collect();
    let mut best: Option<(usize, f64)> = None;

    for (idx, candidate) in candidates.iter().enumerate() {
        let candidate: Vec<char> = normalize(candidate.as_ref()).chars().collect();
        let ratio = indel_ratio(&phrase, &candidate);
        if best.is_none_or(|(_, top)| ratio > top) {
            best = Some((idx, ratio));
        }
    }

    best.map(|(idx, ratio)| ConditionMatch {
        candidate: candidates[idx].as_ref().to_string(),
        score: (ratio * 100.0).round() as u8,
    })
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// `1.0` for two empty strings.
fn indel_ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    (2 * lcs_len(a, b)) as f64 / total as f64
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];

    for x in a {
        for (j, y) in b.iter().enumerate() {
            row[j + 1] = if x == y { prev[j] + 1 } else { prev[j + 1].max(row[j]) };
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}
