//! Seeded k-means++ over document vectors and cluster naming.

use rag_core::TextGenerator;
use tracing::{debug, warn};

const NAME_SAMPLE_CHARS: usize = 500;
const NAME_MAX_CHARS: usize = 40;

/// SplitMix64 generator; same seed, same sequence on every platform.
#[derive(Clone, Debug)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

#[derive(Clone, Debug)]
pub struct KMeans {
    pub centroids: Vec<Vec<f32>>,
    /// `assignments[i]` is the centroid index of point `i`.
    pub assignments: Vec<usize>,
    pub iterations: usize,
}

/// Number of clusters for `n` documents: the configured value or 2, capped at `n`.
pub fn choose_k(n: usize, configured: Option<usize>) -> usize {
    if n == 0 {
        return 0;
    }
    configured.unwrap_or(2).clamp(1, n)
}

fn sq_dist(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum()
}

fn nearest(point: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = sq_dist(point, c);
        if d < best_d {
            best = i;
            best_d = d;
        }
    }
    best
}

/// k-means++ seeding followed by Lloyd iterations.
///
/// `k` is capped at the number of points. An emptied cluster keeps its
/// previous centroid.
pub fn kmeans(points: &[Vec<f32>], k: usize, seed: u64, max_iter: usize) -> KMeans {
    let n = points.len();
    let k = k.min(n);
    if k == 0 {
        return KMeans {
            centroids: Vec::new(),
            assignments: Vec::new(),
            iterations: 0,
        };
    }
    let dim = points[0].len();
    let mut rng = SplitMix64::new(seed);

    let mut chosen = vec![(rng.next_u64() % n as u64) as usize];
    let mut d2: Vec<f64> = points.iter().map(|p| sq_dist(p, &points[chosen[0]])).collect();
    while chosen.len() < k {
        let total: f64 = d2.iter().sum();
        let next = if total <= 0.0 {
            // All remaining points coincide with a centroid.
            (0..n).find(|i| !chosen.contains(i)).unwrap_or(0)
        } else {
            let target = rng.next_f64() * total;
            let mut acc = 0.0;
            let mut pick = n - 1;
            for (i, d) in d2.iter().enumerate() {
                acc += d;
                if acc > target {
                    pick = i;
                    break;
                }
            }
            pick
        };
        chosen.push(next);
        for (i, p) in points.iter().enumerate() {
            d2[i] = d2[i].min(sq_dist(p, &points[next]));
        }
    }

    let mut centroids: Vec<Vec<f32>> = chosen.iter().map(|&i| points[i].clone()).collect();
    let mut assignments = vec![usize::MAX; n];
    let mut iterations = 0;

    for iter in 0..max_iter.max(1) {
        iterations = iter + 1;
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let c = nearest(p, &centroids);
            if assignments[i] != c {
                assignments[i] = c;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![vec![0f64; dim]; k];
        let mut counts = vec![0usize; k];
        for (p, &c) in points.iter().zip(&assignments) {
            counts[c] += 1;
            for (s, x) in sums[c].iter_mut().zip(p) {
                *s += f64::from(*x);
            }
        }
        for c in 0..k {
            if counts[c] > 0 {
                centroids[c] = sums[c]
                    .iter()
                    .map(|s| (s / counts[c] as f64) as f32)
                    .collect();
            }
        }
    }

    debug!(n, k, iterations, "kmeans done");
    KMeans {
        centroids,
        assignments,
        iterations,
    }
}

/// Lowercased, `_`-joined slug of a model reply; `cluster_{index}` when unusable.
pub fn normalize_name(reply: &str, index: usize) -> String {
    let first_line = reply.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let cleaned: String = first_line
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { ' ' })
        .collect();
    let slug = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    let slug: String = slug.chars().take(NAME_MAX_CHARS).collect();
    if slug.is_empty() {
        format!("cluster_{index}")
    } else {
        slug
    }
}

/// Names a cluster from a sample member's text.
pub async fn name_cluster(generator: &dyn TextGenerator, sample: &str, index: usize) -> String {
    let excerpt: String = sample.chars().take(NAME_SAMPLE_CHARS).collect();
    let prompt = format!(
        "Based on this document sample, suggest a SHORT category name (1-2 words):\n\n{excerpt}\n\nCategory name:"
    );
    match generator.complete(&prompt, None).await {
        Ok(reply) => normalize_name(&reply, index),
        Err(e) => {
            warn!(index, error = %e, "cluster naming failed");
            format!("cluster_{index}")
        }
    }
}
