//! Bundled deterministic text embedding
//!
//! A hashed-token encoder: tokens hash into signed buckets of a fixed-size
//! vector, which is then L2-normalised. No model weights to load, stable
//! across runs, and fast enough that a search is dominated by the cosine
//! scan rather than the query embedding.

use sha2::{Digest, Sha256};

/// Embedding dimensionality
pub const EMBEDDING_DIM: usize = 384;

/// Embed a text into a normalised `EMBEDDING_DIM`-vector.
pub fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0_f32; EMBEDDING_DIM];

    for token in text
        .split(|ch: char| !ch.is_alphanumeric() && ch != '_')
        .filter(|token| token.len() >= 3)
    {
        let token = token.to_ascii_lowercase();
        let digest = Sha256::digest(token.as_bytes());
        let idx = u16::from_le_bytes([digest[0], digest[1]]) as usize % EMBEDDING_DIM;
        let sign = if digest[2] % 2 == 0 { 1.0 } else { -1.0 };
        vector[idx] += sign;
    }

    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }

    vector
}

/// Cosine similarity between two vectors of equal dimension.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot = a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    let a_norm = a.iter().map(|value| value * value).sum::<f32>().sqrt();
    let b_norm = b.iter().map(|value| value * value).sum::<f32>().sqrt();

    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }

    dot / (a_norm * b_norm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_dimension_and_determinism() {
        let a = embed("create a todo list with due dates");
        let b = embed("create a todo list with due dates");
        assert_eq!(a.len(), EMBEDDING_DIM);
        assert_eq!(a, b);
    }

    #[test]
    fn test_embedding_is_normalised() {
        let v = embed("async fastapi endpoint returning items");
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_similar_texts_score_higher() {
        let todo_a = embed("todo list application with tasks and due dates");
        let todo_b = embed("task list app where todos have due dates");
        let unrelated = embed("docker container port mapping bridge network");

        let related_score = cosine_similarity(&todo_a, &todo_b);
        let unrelated_score = cosine_similarity(&todo_a, &unrelated);
        assert!(related_score > unrelated_score);
    }

    #[test]
    fn test_empty_text_embeds_to_zero_vector() {
        let v = embed("");
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(cosine_similarity(&v, &embed("anything")), 0.0);
    }

    #[test]
    fn test_mismatched_dims_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
    }
}
