//! Turnover risk: logistic model over standardised features.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gwo_core::{EngineError, EngineResult};

use crate::features::{FEATURE_COUNT, Feature, FeatureBatch, FeatureVector};
use crate::model::{ModelScope, PredictionModel};
use crate::result::{Factor, PredictionResult, PredictionScore, RiskBand, rank_factors};

/// One number per feature, in configuration-friendly form.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeights {
    pub satisfaction: f64,
    pub performance: f64,
    pub crunch_hours: f64,
    pub tenure_years: f64,
    pub sprint_velocity: f64,
    pub satisfaction_trend: f64,
    pub crunch_hours_trend: f64,
    pub velocity_volatility: f64,
}

impl FeatureWeights {
    pub fn get(&self, feature: Feature) -> f64 {
        self.to_array()[feature.index()]
    }

    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.satisfaction,
            self.performance,
            self.crunch_hours,
            self.tenure_years,
            self.sprint_velocity,
            self.satisfaction_trend,
            self.crunch_hours_trend,
            self.velocity_volatility,
        ]
    }
}

/// Turnover model parameters (`[models.turnover]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnoverParams {
    pub version: String,
    pub intercept: f64,
    pub coefficients: FeatureWeights,
    /// Population means used for standardisation.
    pub means: FeatureWeights,
    /// Population spreads used for standardisation; all must be > 0.
    pub scales: FeatureWeights,
}

impl Default for TurnoverParams {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            intercept: -1.0,
            coefficients: FeatureWeights {
                satisfaction: -0.9,
                performance: -0.3,
                crunch_hours: 0.6,
                tenure_years: -0.2,
                sprint_velocity: -0.1,
                satisfaction_trend: -0.5,
                crunch_hours_trend: 0.3,
                velocity_volatility: 0.0,
            },
            means: FeatureWeights {
                satisfaction: 7.0,
                performance: 3.5,
                crunch_hours: 20.0,
                tenure_years: 3.0,
                sprint_velocity: 35.0,
                satisfaction_trend: 0.0,
                crunch_hours_trend: 0.0,
                velocity_volatility: 0.15,
            },
            scales: FeatureWeights {
                satisfaction: 1.5,
                performance: 0.8,
                crunch_hours: 20.0,
                tenure_years: 2.5,
                sprint_velocity: 10.0,
                satisfaction_trend: 1.0,
                crunch_hours_trend: 10.0,
                velocity_volatility: 0.1,
            },
        }
    }
}

impl TurnoverParams {
    pub fn validate(&self) -> EngineResult<()> {
        let numbers = self
            .coefficients
            .to_array()
            .into_iter()
            .chain(self.means.to_array())
            .chain([self.intercept]);
        if numbers.into_iter().any(|v| !v.is_finite()) {
            return Err(EngineError::config("models.turnover values must be finite"));
        }
        if let Some(f) = Feature::ALL
            .iter()
            .find(|f| !(self.scales.get(**f).is_finite() && self.scales.get(**f) > 0.0))
        {
            return Err(EngineError::config(format!("models.turnover.scales.{f} must be > 0")));
        }
        Ok(())
    }
}

/// Probability that an employee leaves within the planning horizon.
///
/// Employee-scoped: each score depends only on that employee's vector.
#[derive(Debug, Clone)]
pub struct TurnoverModel {
    params: TurnoverParams,
}

impl TurnoverModel {
    pub const NAME: &'static str = "turnover_risk";

    pub fn new(params: TurnoverParams) -> EngineResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn predict(&self, row: &FeatureVector, computed_at: DateTime<Utc>) -> EngineResult<PredictionResult> {
        let p = &self.params;
        let mut logit = p.intercept;
        let mut factors = Vec::with_capacity(FEATURE_COUNT);

        for feature in Feature::ALL.iter().copied() {
            let coefficient = p.coefficients.get(feature);
            if coefficient == 0.0 {
                continue;
            }
            let z = (row.get(feature) - p.means.get(feature)) / p.scales.get(feature);
            let contribution = coefficient * z;
            logit += contribution;
            factors.push(Factor::new(feature.describe(z >= 0.0), feature, contribution));
        }

        let probability = 1.0 / (1.0 + (-logit).exp());
        if !probability.is_finite() {
            return Err(EngineError::computation(format!(
                "turnover logit {logit} for employee {} is not finite",
                row.employee_id
            )));
        }

        Ok(PredictionResult {
            employee_id: row.employee_id.clone(),
            department: row.department,
            model: Self::NAME.to_string(),
            model_version: p.version.clone(),
            score: PredictionScore::Probability(probability),
            risk_band: Some(RiskBand::from_score(probability)),
            factors: rank_factors(factors),
            computed_at,
        })
    }
}

impl PredictionModel for TurnoverModel {
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

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
    }

    fn row(id: &str, satisfaction: f64, crunch: f64) -> FeatureVector {
        let means = TurnoverParams::default().means.to_array();
        let mut values = means;
        values[Feature::Satisfaction.index()] = satisfaction;
        values[Feature::CrunchHours.index()] = crunch;
        FeatureVector::new(EmployeeId::new(id), Department::Art, values).unwrap()
    }

    #[test]
    fn average_employee_scores_the_intercept() {
        let model = TurnoverModel::new(TurnoverParams::default()).unwrap();
        let r = model.predict(&row("avg", 7.0, 20.0), at()).unwrap();
        let expected = 1.0 / (1.0 + 1.0f64.exp());
        assert!((r.probability().unwrap() - expected).abs() < 1e-12);
        assert!(r.factors.is_empty());
    }

    #[test]
    fn unhappy_overworked_employee_is_high_risk_with_explained_factors() {
        let model = TurnoverModel::new(TurnoverParams::default()).unwrap();
        let r = model.predict(&row("e1", 3.0, 80.0), at()).unwrap();
        assert!(r.probability().unwrap() > 0.9);
        // satisfaction: -0.9 * (3-7)/1.5 = 2.4; crunch: 0.6 * (80-20)/20 = 1.8
        assert_eq!(r.factors[0].name, "low satisfaction");
        assert!((r.factors[0].impact - 2.4).abs() < 1e-12);
        assert_eq!(r.factors[1].name, "high crunch hours");
        assert_eq!(r.risk_band, Some(RiskBand::Critical));
    }

    #[test]
    fn result_does_not_depend_on_other_rows() {
        let model = TurnoverModel::new(TurnoverParams::default()).unwrap();
        let alone = FeatureBatch::from_vectors(vec![row("a", 5.0, 45.0)]);
        let crowd = FeatureBatch::from_vectors(vec![row("a", 5.0, 45.0), row("b", 9.0, 0.0), row("c", 2.0, 90.0)]);
        let solo = model.predict_batch(&alone, at()).remove(0).unwrap();
        let shared = model.predict_batch(&crowd, at()).remove(0).unwrap();
        assert_eq!(solo, shared);
    }

    #[test]
    fn zero_scale_is_rejected() {
        let mut params = TurnoverParams::default();
        params.scales.tenure_years = 0.0;
        assert!(matches!(TurnoverModel::new(params), Err(EngineError::Config(_))));
    }
}
