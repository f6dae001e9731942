//! `gwo-ai` — feature extraction, prediction models, and recommendations.
//!
//! Models emit **insights**, never record mutations:
//! - they consume a [`FeatureBatch`] extracted from a validated record set,
//! - they hold no state between calls,
//! - a failure for one employee is reported for that employee only.

pub mod burnout;
pub mod cluster;
pub mod features;
pub mod model;
pub mod params;
pub mod recommend;
pub mod result;
pub mod turnover;

pub use burnout::{BurnoutCeilings, BurnoutModel, BurnoutParams, BurnoutWeights};
pub use cluster::{ClusterModel, ClusterParams};
pub use features::{FEATURE_COUNT, Feature, FeatureBatch, FeatureVector};
pub use model::{ModelRunner, ModelScope, PredictionModel};
pub use params::ModelParameters;
pub use recommend::{
    Priority, Recommendation, RecommendationCategory, RecommendationEngine, RecommendationParams, Trigger,
};
pub use result::{
    Factor, ModelRun, PredictionFailure, PredictionResult, PredictionScore, RiskBand, rank_factors,
};
pub use turnover::{FeatureWeights, TurnoverModel, TurnoverParams};
