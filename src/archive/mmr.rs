//! Maximal Marginal Relevance re-ranking.
//!
//! Each step picks the candidate maximizing
//! `λ × sim(query, doc) - (1 - λ) × max(sim(doc, selected))`.
//!
//! λ = 1.0 is plain relevance ordering, λ = 0.0 only rewards distance from
//! what was already picked.

/// MMR parameters for one search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MmrConfig {
    /// Results returned after re-ranking.
    pub k: usize,
    /// Nearest neighbours fetched before re-ranking.
    pub fetch_k: usize,
    /// 0.0 = pure diversity, 1.0 = pure relevance.
    pub lambda: f32,
}

impl Default for MmrConfig {
    fn default() -> Self {
        Self {
            k: 4,
            fetch_k: 20,
            lambda: 0.1,
        }
    }
}

impl MmrConfig {
    /// Clamps lambda to 0..=1 and k to fetch_k.
    pub fn new(k: usize, fetch_k: usize, lambda: f32) -> Self {
        Self {
            k: k.min(fetch_k),
            fetch_k,
            lambda: lambda.clamp(0.0, 1.0),
        }
    }
}

pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity, 0.0 when either side has no length.
pub fn cosine_similarity(a: &[f32], b: &[f32], mag_a: f32, mag_b: f32) -> f32 {
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (mag_a * mag_b)
}

/// Returns indices into `candidates`, in selection order.
///
/// The first pick is always the candidate closest to the query, so that a
/// lambda of zero still anchors the result set on something relevant.
pub fn mmr_select(query: &[f32], candidates: &[Vec<f32>], k: usize, lambda: f32) -> Vec<usize> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let k = k.min(candidates.len());
    let query_mag = magnitude(query);
    let mags: Vec<f32> = candidates.iter().map(|c| magnitude(c)).collect();
    let relevance: Vec<f32> = candidates
        .iter()
        .zip(&mags)
        .map(|(c, &mag)| cosine_similarity(query, c, query_mag, mag))
        .collect();

    let mut selected: Vec<usize> = Vec::with_capacity(k);
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    // highest similarity to anything selected so far, per candidate
    let mut max_similarity = vec![f32::NEG_INFINITY; candidates.len()];

    while selected.len() < k {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (pos, &idx) in remaining.iter().enumerate() {
            let score = match selected.is_empty() {
                true => relevance[idx],
                false => lambda * relevance[idx] - (1.0 - lambda) * max_similarity[idx],
            };

            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }

        let best = remaining.remove(best_pos);
        selected.push(best);

        for &idx in &remaining {
            let sim = cosine_similarity(
                &candidates[idx],
                &candidates[best],
                mags[idx],
                mags[best],
            );
            if sim > max_similarity[idx] {
                max_similarity[idx] = sim;
            }
        }
    }

    selected
}
