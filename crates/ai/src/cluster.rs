//! Performance clustering: seeded k-means++ over standardised performance,
//! satisfaction, and sprint velocity.
//!
//! Batch-scoped: centroids come from every row, so an employee's cluster may
//! change when the batch changes. Labels are re-derived from centroids on
//! every run (strongest composite first), never fixed to a cluster index.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use gwo_core::stats::{mean, stddev_sample};
use gwo_core::{EngineError, EngineResult};

use crate::features::{Feature, FeatureBatch};
use crate::model::{ModelScope, PredictionModel};
use crate::result::{Factor, PredictionResult, PredictionScore, rank_factors};

const CLUSTER_FEATURES: [Feature; 3] = [Feature::Performance, Feature::Satisfaction, Feature::SprintVelocity];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterParams {
    pub version: String,
    pub clusters: usize,
    pub max_iterations: usize,
    pub seed: u64,
    /// Labels from strongest to weakest cluster; one per cluster.
    pub labels: Vec<String>,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            clusters: 3,
            max_iterations: 100,
            seed: 42,
            labels: vec![
                "high performer".to_string(),
                "steady contributor".to_string(),
                "needs support".to_string(),
            ],
        }
    }
}

impl ClusterParams {
    pub fn validate(&self) -> EngineResult<()> {
        if self.clusters == 0 {
            return Err(EngineError::config("models.cluster.clusters must be >= 1"));
        }
        if self.max_iterations == 0 {
            return Err(EngineError::config("models.cluster.max_iterations must be >= 1"));
        }
        if self.labels.len() != self.clusters {
            return Err(EngineError::config(format!(
                "models.cluster.labels has {} entries for {} clusters",
                self.labels.len(),
                self.clusters
            )));
        }
        Ok(())
    }

    /// Label of the weakest cluster.
    pub fn weakest_label(&self) -> Option<&str> {
        self.labels.last().map(String::as_str)
    }
}

/// Fitted centroids and per-row assignments.
#[derive(Debug, Clone, PartialEq)]
struct Fit {
    centroids: Vec<[f64; 3]>,
    assignments: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct ClusterModel {
    params: ClusterParams,
}

impl ClusterModel {
    pub const NAME: &'static str = "performance_cluster";

    pub fn new(params: ClusterParams) -> EngineResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &ClusterParams {
        &self.params
    }

    fn fit(&self, data: &[[f64; 3]]) -> Fit {
        let k = self.params.clusters.min(data.len());
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut centroids = init_centroids(data, k, &mut rng);
        let mut assignments = vec![usize::MAX; data.len()];

        for _ in 0..self.params.max_iterations {
            let next: Vec<usize> = data.iter().map(|x| nearest(&centroids, x)).collect();
            if next == assignments {
                break;
            }
            assignments = next;

            let mut sums = vec![[0.0; 3]; k];
            let mut counts = vec![0usize; k];
            for (x, &c) in data.iter().zip(&assignments) {
                counts[c] += 1;
                for (s, v) in sums[c].iter_mut().zip(x) {
                    *s += v;
                }
            }
            for ((centroid, sum), count) in centroids.iter_mut().zip(&sums).zip(&counts) {
                // an empty cluster keeps its previous centroid
                if *count > 0 {
                    *centroid = sum.map(|s| s / *count as f64);
                }
            }
        }

        Fit {
            centroids,
            assignments,
        }
    }
}

/// k-means++ seeding: first centroid uniform, the rest proportional to squared
/// distance from the nearest chosen centroid.
fn init_centroids(data: &[[f64; 3]], k: usize, rng: &mut StdRng) -> Vec<[f64; 3]> {
    let mut centroids = Vec::with_capacity(k);
    if data.is_empty() || k == 0 {
        return centroids;
    }
    centroids.push(data[rng.gen_range(0..data.len())]);

    while centroids.len() < k {
        let distances: Vec<f64> = data
            .iter()
            .map(|x| {
                centroids
                    .iter()
                    .map(|c| distance_squared(x, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = distances.iter().sum();
        if total <= f64::EPSILON {
            // every point coincides with a centroid already
            centroids.push(centroids[centroids.len() - 1]);
            continue;
        }

        let target = rng.gen_range(0.0..total);
        let mut cumulative = 0.0;
        let mut chosen = data.len() - 1;
        for (i, d) in distances.iter().enumerate() {
            cumulative += d;
            if cumulative > target {
                chosen = i;
                break;
            }
        }
        centroids.push(data[chosen]);
    }
    centroids
}

fn nearest(centroids: &[[f64; 3]], x: &[f64; 3]) -> usize {
    centroids
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| distance_squared(x, a).total_cmp(&distance_squared(x, b)))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn distance_squared(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Standardise each column to zero mean and unit sample spread (a constant
/// column becomes all zeros).
fn standardise(batch: &FeatureBatch) -> Vec<[f64; 3]> {
    let columns: Vec<(f64, f64)> = CLUSTER_FEATURES
        .iter()
        .map(|f| {
            let values: Vec<f64> = batch.rows().iter().map(|r| r.get(*f)).collect();
            let m = mean(&values).unwrap_or_default();
            (m, stddev_sample(&values, m))
        })
        .collect();

    batch
        .rows()
        .iter()
        .map(|row| {
            let mut z = [0.0; 3];
            for (i, feature) in CLUSTER_FEATURES.iter().enumerate() {
                let (m, sd) = columns[i];
                z[i] = if sd > f64::EPSILON { (row.get(*feature) - m) / sd } else { 0.0 };
            }
            z
        })
        .collect()
}

impl PredictionModel for ClusterModel {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn version(&self) -> &str {
        &self.params.version
    }

    fn scope(&self) -> ModelScope {
        ModelScope::Batch
    }

    fn predict_batch(&self, batch: &FeatureBatch, computed_at: DateTime<Utc>) -> Vec<EngineResult<PredictionResult>> {
        if batch.is_empty() {
            return Vec::new();
        }
        let data = standardise(batch);
        let fit = self.fit(&data);

        // rank clusters by centroid composite, strongest first
        let mut order: Vec<usize> = (0..fit.centroids.len()).collect();
        order.sort_by(|a, b| {
            let ca: f64 = fit.centroids[*a].iter().sum();
            let cb: f64 = fit.centroids[*b].iter().sum();
            cb.total_cmp(&ca).then_with(|| a.cmp(b))
        });
        // with fewer clusters than labels the ranks are spread over the label
        // list, so the weakest cluster still gets the last label
        let span = self.params.labels.len().saturating_sub(1);
        let last = order.len().saturating_sub(1);
        let mut rank = vec![0; order.len()];
        for (r, c) in order.iter().enumerate() {
            rank[*c] = if last == 0 { 0 } else { (r * span + last / 2) / last };
        }

        batch
            .rows()
            .iter()
            .zip(&fit.assignments)
            .zip(&data)
            .map(|((row, &cluster), z)| -> EngineResult<PredictionResult> {
                let id = rank[cluster];
                let label = self
                    .params
                    .labels
                    .get(id)
                    .cloned()
                    .ok_or_else(|| EngineError::computation(format!("no label for cluster {id}")))?;
                let factors = CLUSTER_FEATURES
                    .iter()
                    .enumerate()
                    .map(|(i, f)| Factor::new(f.describe(z[i] >= 0.0), *f, z[i]))
                    .collect();
                Ok(PredictionResult {
                    employee_id: row.employee_id.clone(),
                    department: row.department,
                    model: Self::NAME.to_string(),
                    model_version: self.params.version.clone(),
                    score: PredictionScore::Cluster { id, label },
                    risk_band: None,
                    factors: rank_factors(factors),
                    computed_at,
                })
            })
            .collect()
    }
}
