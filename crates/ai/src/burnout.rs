//! Burnout risk: weighted sum of clamp-normalised stress components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gwo_core::{EngineError, EngineResult};

use crate::features::{Feature, FeatureBatch, FeatureVector};
use crate::model::{ModelScope, PredictionModel};
use crate::result::{Factor, PredictionResult, PredictionScore, RiskBand, rank_factors};

/// Component weights; must be non-negative and sum to 1.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurnoutWeights {
    pub crunch_level: f64,
    pub crunch_trend: f64,
    pub low_satisfaction: f64,
    pub falling_satisfaction: f64,
    pub velocity_volatility: f64,
}

impl Default for BurnoutWeights {
    fn default() -> Self {
        Self {
            crunch_level: 0.35,
            crunch_trend: 0.15,
            low_satisfaction: 0.25,
            falling_satisfaction: 0.15,
            velocity_volatility: 0.10,
        }
    }
}

/// Raw values at which each component saturates to 1.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurnoutCeilings {
    /// Monthly crunch hours.
    pub crunch_hours: f64,
    /// Month-over-month crunch-hour increase.
    pub crunch_trend: f64,
    /// Satisfaction drop versus the previous period.
    pub satisfaction_drop: f64,
    /// Coefficient of variation of sprint velocity.
    pub velocity_volatility: f64,
}

impl Default for BurnoutCeilings {
    fn default() -> Self {
        Self {
            crunch_hours: 100.0,
            crunch_trend: 40.0,
            satisfaction_drop: 3.0,
            velocity_volatility: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurnoutParams {
    pub version: String,
    pub weights: BurnoutWeights,
    pub ceilings: BurnoutCeilings,
}

impl Default for BurnoutParams {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            weights: BurnoutWeights::default(),
            ceilings: BurnoutCeilings::default(),
        }
    }
}

impl BurnoutParams {
    pub fn validate(&self) -> EngineResult<()> {
        let w = self.weights;
        let weights = [
            w.crunch_level,
            w.crunch_trend,
            w.low_satisfaction,
            w.falling_satisfaction,
            w.velocity_volatility,
        ];
        if weights.iter().any(|v| !(v.is_finite() && *v >= 0.0)) {
            return Err(EngineError::config("models.burnout.weights must be finite and >= 0"));
        }
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > 1e-9 {
            return Err(EngineError::config(format!(
                "models.burnout.weights must sum to 1 (got {total})"
            )));
        }
        let c = self.ceilings;
        if [c.crunch_hours, c.crunch_trend, c.satisfaction_drop, c.velocity_volatility]
            .iter()
            .any(|v| !(v.is_finite() && *v > 0.0))
        {
            return Err(EngineError::config("models.burnout.ceilings must be > 0"));
        }
        Ok(())
    }
}

/// Burnout risk in [0, 1] with a risk band.
///
/// Employee-scoped.
#[derive(Debug, Clone)]
pub struct BurnoutModel {
    params: BurnoutParams,
}

impl BurnoutModel {
    pub const NAME: &'static str = "burnout_risk";

    pub fn new(params: BurnoutParams) -> EngineResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn predict(&self, row: &FeatureVector, computed_at: DateTime<Utc>) -> EngineResult<PredictionResult> {
        let w = self.params.weights;
        let c = self.params.ceilings;
        let unit = |v: f64| v.clamp(0.0, 1.0);

        let components = [
            (
                Feature::CrunchHours,
                "high crunch hours",
                w.crunch_level,
                unit(row.get(Feature::CrunchHours) / c.crunch_hours),
            ),
            (
                Feature::CrunchHoursTrend,
                "rising crunch hours",
                w.crunch_trend,
                unit(row.get(Feature::CrunchHoursTrend) / c.crunch_trend),
            ),
            (
                Feature::Satisfaction,
                "low satisfaction",
                w.low_satisfaction,
                unit((10.0 - row.get(Feature::Satisfaction)) / 9.0),
            ),
            (
                Feature::SatisfactionTrend,
                "falling satisfaction",
                w.falling_satisfaction,
                unit(-row.get(Feature::SatisfactionTrend) / c.satisfaction_drop),
            ),
            (
                Feature::VelocityVolatility,
                "volatile sprint velocity",
                w.velocity_volatility,
                unit(row.get(Feature::VelocityVolatility) / c.velocity_volatility),
            ),
        ];

        let factors: Vec<Factor> = components
            .iter()
            .map(|(feature, label, weight, level)| Factor::new(*label, *feature, weight * level))
            .collect();
        let score = unit(factors.iter().map(|f| f.impact).sum());

        Ok(PredictionResult {
            employee_id: row.employee_id.clone(),
            department: row.department,
            model: Self::NAME.to_string(),
            model_version: self.params.version.clone(),
            score: PredictionScore::Probability(score),
            risk_band: Some(RiskBand::from_score(score)),
            factors: rank_factors(factors),
            computed_at,
        })
    }
}

impl PredictionModel for BurnoutModel {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn version(&self) -> &str {
        &self.params.version
    }

    fn scope(&self) -> ModelScope {
        ModelScope::Employee
    }

    fn predict_batch(&self, batch: &FeatureBatch, computed_at: DateTime<Utc>) -> Vec<EngineResult<PredictionResult>> {
        batch.rows().iter().map(|row| self.predict(row, computed_at)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gwo_core::{Department, EmployeeId};
    use proptest::prelude::*;

    use crate::features::FEATURE_COUNT;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
    }

    fn row(values: [(Feature, f64); 5]) -> FeatureVector {
        let mut v = [0.0; FEATURE_COUNT];
        v[Feature::Satisfaction.index()] = 10.0;
        v[Feature::Performance.index()] = 3.0;
        for (feature, value) in values {
            v[feature.index()] = value;
        }
        FeatureVector::new(EmployeeId::new("e1"), Department::Programming, v).unwrap()
    }

    #[test]
    fn crunch_dominates_for_overworked_unhappy_employee() {
        let model = BurnoutModel::new(BurnoutParams::default()).unwrap();
        let r = model
            .predict(
                &row([
                    (Feature::CrunchHours, 80.0),
                    (Feature::Satisfaction, 3.0),
                    (Feature::CrunchHoursTrend, 0.0),
                    (Feature::SatisfactionTrend, 0.0),
                    (Feature::VelocityVolatility, 0.0),
                ]),
                at(),
            )
            .unwrap();
        assert_eq!(r.top_factor().map(|f| f.name.as_str()), Some("high crunch hours"));
        // 0.35 * 0.8 + 0.25 * 7/9
        let expected = 0.28 + 0.25 * 7.0 / 9.0;
        assert!((r.probability().unwrap() - expected).abs() < 1e-12);
        assert_eq!(r.risk_band, Some(RiskBand::Moderate));
    }

    #[test]
    fn saturated_components_reach_critical() {
        let model = BurnoutModel::new(BurnoutParams::default()).unwrap();
        let r = model
            .predict(
                &row([
                    (Feature::CrunchHours, 150.0),
                    (Feature::Satisfaction, 1.0),
                    (Feature::CrunchHoursTrend, 60.0),
                    (Feature::SatisfactionTrend, -4.0),
                    (Feature::VelocityVolatility, 0.9),
                ]),
                at(),
            )
            .unwrap();
        assert!((r.probability().unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(r.risk_band, Some(RiskBand::Critical));
    }

    #[test]
    fn weights_must_sum_to_one() {
        let params = BurnoutParams {
            weights: BurnoutWeights {
                crunch_level: 0.9,
                ..BurnoutWeights::default()
            },
            ..BurnoutParams::default()
        };
        assert!(BurnoutModel::new(params).is_err());
    }

    proptest! {
        #[test]
        fn score_stays_in_unit_interval(
            crunch in 0.0f64..300.0,
            satisfaction in 1.0f64..=10.0,
            crunch_trend in -80.0f64..80.0,
            satisfaction_trend in -9.0f64..=9.0,
            volatility in 0.0f64..3.0,
        ) {
            let model = BurnoutModel::new(BurnoutParams::default()).unwrap();
            let r = model.predict(&row([
                (Feature::CrunchHours, crunch),
                (Feature::Satisfaction, satisfaction),
                (Feature::CrunchHoursTrend, crunch_trend),
                (Feature::SatisfactionTrend, satisfaction_trend),
                (Feature::VelocityVolatility, volatility),
            ]), at()).unwrap();
            let score = r.probability().unwrap();
            prop_assert!((0.0..=1.0).contains(&score));
            prop_assert_eq!(r.risk_band, Some(RiskBand::from_score(score)));
        }
    }
}
