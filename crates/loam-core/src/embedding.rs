//! Stored embedding records and vector helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One cached embedding, keyed by note id in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEmbedding {
    pub note_id: String,
    /// Fingerprint of the note content the vector was computed from.
    pub chunk_hash: String,
    pub model: String,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub content_preview: String,
}

impl StoredEmbedding {
    /// Freshness policy: model matches, content fingerprint matches, and
    /// the record is within the age window.
    pub fn is_fresh(&self, model: &str, chunk_hash: &str, max_age_days: i64) -> bool {
        self.model == model
            && self.chunk_hash == chunk_hash
            && (Utc::now() - self.created_at).num_days() <= max_age_days
    }
}

/// Parse a bracketed float list as found in an `EMBEDDING` property.
/// Returns `None` when the value is not a parseable vector.
pub fn parse_vector(raw: &str) -> Option<Vec<f32>> {
    let inner = raw.trim().strip_prefix('[')?.strip_suffix(']')?;
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }
    inner
        .split(',')
        .map(|part| part.trim().parse::<f32>().ok())
        .collect()
}

/// Cosine similarity of two vectors; 0.0 on dimension mismatch or a zero
/// magnitude on either side.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_vector_accepts_bracketed_floats() {
        assert_eq!(parse_vector("[0.1, -0.2, 3.0]"), Some(vec![0.1, -0.2, 3.0]));
        assert_eq!(parse_vector("[]"), Some(vec![]));
        assert_eq!(parse_vector("not a vector"), None);
        assert_eq!(parse_vector("[0.1, nah]"), None);
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5, 0.5, 0.1];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
    }

    #[test]
    fn cosine_guards_mismatched_and_zero_vectors() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn freshness_requires_model_hash_and_age() {
        let record = StoredEmbedding {
            note_id: "a".into(),
            chunk_hash: "h1".into(),
            model: "m1".into(),
            vector: vec![0.1],
            created_at: Utc::now(),
            content_preview: String::new(),
        };
        assert!(record.is_fresh("m1", "h1", 30));
        assert!(!record.is_fresh("m2", "h1", 30));
        assert!(!record.is_fresh("m1", "h2", 30));

        let old = StoredEmbedding {
            created_at: Utc::now() - chrono::Duration::days(40),
            ..record
        };
        assert!(!old.is_fresh("m1", "h1", 30));
    }
}
