use imgsim_core::DescriptorSet;
use log::warn;
use serde::{Deserialize, Serialize};

/// Distance between descriptor vectors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Euclidean distance
    #[default]
    L2,
    /// Sum of absolute differences
    L1,
}

impl DistanceMetric {
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::L2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
            DistanceMetric::L1 => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
        }
    }
}

/// Query row paired with its nearest train row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatcherConfig {
    pub metric: DistanceMetric,
    pub cross_check: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::L2,
            cross_check: true,
        }
    }
}

/// Exhaustive nearest-neighbour matcher with optional mutual-nearest filtering
#[derive(Debug, Clone, Copy)]
pub struct BruteForceMatcher {
    metric: DistanceMetric,
    cross_check: bool,
}

impl Default for BruteForceMatcher {
    fn default() -> Self {
        Self::from_config(&MatcherConfig::default())
    }
}

impl BruteForceMatcher {
    pub fn new(metric: DistanceMetric, cross_check: bool) -> Self {
        Self { metric, cross_check }
    }

    pub fn from_config(cfg: &MatcherConfig) -> Self {
        Self::new(cfg.metric, cfg.cross_check)
    }

    /// Nearest train row for every query row, sorted by ascending distance.
    ///
    /// Ties go to the lowest index. With cross-checking on, a pair survives
    /// only if the query row is also the train row's nearest query row, so
    /// the result is one-to-one.
    pub fn match_descriptors(&self, query: &DescriptorSet, train: &DescriptorSet) -> Vec<Match> {
        if query.is_empty() || train.is_empty() {
            return Vec::new();
        }
        if query.dim() != train.dim() {
            warn!(
                "Cannot compare descriptors of length {} and {}",
                query.dim(),
                train.dim()
            );
            return Vec::new();
        }

        let cols = train.len();
        let distances: Vec<f32> = query
            .rows()
            .flat_map(|q| train.rows().map(move |t| self.metric.distance(q, t)))
            .collect();

        let mut best_query_for_train = vec![(usize::MAX, f32::INFINITY); cols];
        if self.cross_check {
            for (i, row) in distances.chunks_exact(cols).enumerate() {
                for (j, &d) in row.iter().enumerate() {
                    if d < best_query_for_train[j].1 {
                        best_query_for_train[j] = (i, d);
                    }
                }
            }
        }

        let mut matches: Vec<Match> = distances
            .chunks_exact(cols)
            .enumerate()
            .filter_map(|(query_idx, row)| {
                let (train_idx, distance) = nearest(row)?;
                if self.cross_check && best_query_for_train[train_idx].0 != query_idx {
                    return None;
                }
                Some(Match { query_idx, train_idx, distance })
            })
            .collect();

        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches
    }

    /// Similarity score: number of retained matches, 0 when either side is absent
    pub fn score(&self, query: Option<&DescriptorSet>, train: Option<&DescriptorSet>) -> usize {
        match (query, train) {
            (Some(query), Some(train)) => self.match_descriptors(query, train).len(),
            _ => 0,
        }
    }
}

/// Index and value of the first minimum
fn nearest(row: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &d) in row.iter().enumerate() {
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((idx, d)),
        }
    }
    best
}
