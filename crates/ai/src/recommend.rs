//! Recommendation engine: turns flagged predictions and KPI context into an
//! ordered list of interventions.
//!
//! Pure transformation. Every recommendation names the factor (or KPI) that
//! triggered it.

use serde::{Deserialize, Serialize};

use gwo_core::{EngineError, EngineResult};
use gwo_kpi::{KpiReport, KpiStatus};

use crate::burnout::BurnoutModel;
use crate::result::{Factor, PredictionResult, RiskBand};
use crate::turnover::TurnoverModel;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    fn from_band(band: Option<RiskBand>) -> Self {
        match band {
            Some(RiskBand::Critical | RiskBand::High) => Priority::High,
            Some(RiskBand::Low) => Priority::Low,
            Some(RiskBand::Moderate) | None => Priority::Medium,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    Workload,
    Engagement,
    Growth,
    Retention,
}

/// What caused a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Trigger {
    Model {
        model: String,
        factor: String,
        impact: f64,
        /// |impact| over the largest |impact| in the same prediction, in [0, 1].
        /// Models score on different scales; this is what orders their
        /// suggestions against each other.
        relative_impact: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        score: Option<f64>,
    },
    Kpi {
        kpi: String,
        status: KpiStatus,
        value: f64,
    },
}

impl Trigger {
    fn strength(&self) -> f64 {
        match self {
            Trigger::Model { relative_impact, .. } => *relative_impact,
            Trigger::Kpi { .. } => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub action: String,
    pub category: RecommendationCategory,
    pub priority: Priority,
    pub trigger: Trigger,
}

/// `[recommendations]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationParams {
    /// Factors with a smaller |impact| never trigger an action.
    pub min_impact: f64,
    /// Turnover probability from which the employee counts as flagged.
    pub turnover_action_threshold: f64,
}

impl Default for RecommendationParams {
    fn default() -> Self {
        Self {
            min_impact: 0.05,
            turnover_action_threshold: 0.5,
        }
    }
}

impl RecommendationParams {
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.min_impact.is_finite() && self.min_impact >= 0.0) {
            return Err(EngineError::config("recommendations.min_impact must be >= 0"));
        }
        if !(0.0..=1.0).contains(&self.turnover_action_threshold) {
            return Err(EngineError::config(
                "recommendations.turnover_action_threshold must be within [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Action for a risk-driving factor label.
fn factor_action(factor: &str) -> Option<(&'static str, RecommendationCategory)> {
    use RecommendationCategory::*;
    let rule = match factor {
        "high crunch hours" => ("schedule workload review", Workload),
        "rising crunch hours" => ("cap overtime for the next sprint", Workload),
        "volatile sprint velocity" => ("stabilise sprint scope with the team lead", Workload),
        "low satisfaction" => ("hold a one-on-one engagement check-in", Engagement),
        "falling satisfaction" => ("follow up on the recent satisfaction drop", Engagement),
        "low performance" => ("agree a development plan with a mentor", Growth),
        "low sprint velocity" => ("review blockers and tooling with the team lead", Growth),
        "short tenure" => ("assign an onboarding buddy", Retention),
        _ => return None,
    };
    Some(rule)
}

/// Studio-level action for a KPI that needs attention.
fn kpi_action(kpi: &str) -> Option<(&'static str, RecommendationCategory)> {
    use RecommendationCategory::*;
    let rule = match kpi {
        "crunch_impact" => ("review the studio crunch policy before the next milestone", Workload),
        "team_synergy" => ("run cross-team collaboration sessions", Engagement),
        "avg_satisfaction" => ("launch a studio engagement survey", Engagement),
        _ => return None,
    };
    Some(rule)
}

const URGENT_RETENTION: &str = "draft an urgent retention plan";

#[derive(Debug, Clone)]
pub struct RecommendationEngine {
    params: RecommendationParams,
    support_label: Option<String>,
}

impl RecommendationEngine {
    /// `support_label` is the cluster label that flags an employee for support
    /// (the weakest cluster).
    pub fn new(params: RecommendationParams, support_label: Option<String>) -> EngineResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            support_label,
        })
    }

    pub fn params(&self) -> &RecommendationParams {
        &self.params
    }

    fn is_flagged(&self, prediction: &PredictionResult) -> bool {
        match prediction.model.as_str() {
            TurnoverModel::NAME => prediction
                .probability()
                .is_some_and(|p| p >= self.params.turnover_action_threshold),
            BurnoutModel::NAME => prediction.risk_band.is_some_and(|b| b >= RiskBand::Moderate),
            _ => match (prediction.cluster_label(), self.support_label.as_deref()) {
                (Some(label), Some(support)) => label == support,
                _ => false,
            },
        }
    }

    /// Factors pushing this prediction towards risk, strongest first.
    fn drivers<'a>(&self, prediction: &'a PredictionResult) -> impl Iterator<Item = &'a Factor> + 'a {
        // cluster factors are z-scores: the "low" side is what needs support
        let sign = if prediction.probability().is_some() { 1.0 } else { -1.0 };
        let min_impact = self.params.min_impact;
        prediction
            .factors
            .iter()
            .filter(move |f| sign * f.impact > 0.0 && f.impact.abs() >= min_impact)
    }

    fn from_prediction(&self, prediction: &PredictionResult) -> Vec<Recommendation> {
        let priority = Priority::from_band(prediction.risk_band);
        let scale = prediction.factors.iter().map(|f| f.impact.abs()).fold(0.0, f64::max);
        let trigger = |f: &Factor| Trigger::Model {
            model: prediction.model.clone(),
            factor: f.name.clone(),
            impact: f.impact,
            relative_impact: if scale > 0.0 { f.impact.abs() / scale } else { 0.0 },
            score: prediction.probability(),
        };

        let mut out: Vec<Recommendation> = self
            .drivers(prediction)
            .filter_map(|f| {
                factor_action(&f.name).map(|(action, category)| Recommendation {
                    action: action.to_string(),
                    category,
                    priority,
                    trigger: trigger(f),
                })
            })
            .collect();

        if prediction.model == TurnoverModel::NAME && prediction.risk_band == Some(RiskBand::Critical) {
            if let Some(top) = self.drivers(prediction).next() {
                out.insert(
                    0,
                    Recommendation {
                        action: URGENT_RETENTION.to_string(),
                        category: RecommendationCategory::Retention,
                        priority: Priority::High,
                        trigger: trigger(top),
                    },
                );
            }
        }
        out
    }

    /// Interventions for one employee.
    ///
    /// The first entry comes from the highest-scoring flagged risk (its
    /// strongest factor); the remaining model suggestions follow by relative
    /// impact descending. Each action appears once, keeping its strongest
    /// trigger.
    /// KPI-driven studio suggestions come last, critical first.
    pub fn recommend(&self, predictions: &[&PredictionResult], kpis: Option<&KpiReport>) -> Vec<Recommendation> {
        let mut flagged: Vec<&PredictionResult> = predictions.iter().copied().filter(|p| self.is_flagged(p)).collect();
        // probability models outrank cluster assignments; ties by model name
        flagged.sort_by(|a, b| {
            let sa = a.probability().unwrap_or(f64::NEG_INFINITY);
            let sb = b.probability().unwrap_or(f64::NEG_INFINITY);
            sb.total_cmp(&sa).then_with(|| a.model.cmp(&b.model))
        });

        let mut out: Vec<Recommendation> = Vec::new();
        let mut rest: Vec<Recommendation> = Vec::new();
        for (i, prediction) in flagged.iter().enumerate() {
            let mut recs = self.from_prediction(prediction).into_iter();
            if i == 0 {
                out.extend(recs.next());
            }
            rest.extend(recs);
        }

        rest.sort_by(|a, b| {
            b.trigger
                .strength()
                .total_cmp(&a.trigger.strength())
                .then_with(|| b.priority.cmp(&a.priority))
                .then_with(|| a.action.cmp(&b.action))
        });
        for rec in rest {
            if !out.iter().any(|r| r.action == rec.action) {
                out.push(rec);
            }
        }

        if let Some(report) = kpis {
            out.extend(self.studio(report));
        }
        out
    }

    /// Studio-level suggestions from KPIs at warning or critical.
    pub fn studio(&self, report: &KpiReport) -> Vec<Recommendation> {
        let mut recs: Vec<(KpiStatus, Recommendation)> = report
            .results
            .iter()
            .filter(|r| r.status.needs_attention())
            .filter_map(|r| {
                let (action, category) = kpi_action(&r.name)?;
                let priority = if r.status == KpiStatus::Critical {
                    Priority::High
                } else {
                    Priority::Medium
                };
                Some((
                    r.status,
                    Recommendation {
                        action: action.to_string(),
                        category,
                        priority,
                        trigger: Trigger::Kpi {
                            kpi: r.name.clone(),
                            status: r.status,
                            value: r.value,
                        },
                    },
                ))
            })
            .collect();
        recs.sort_by(|(sa, a), (sb, b)| sa.cmp(sb).then_with(|| a.action.cmp(&b.action)));
        recs.into_iter().map(|(_, r)| r).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use gwo_core::{Department, EmployeeId, Fingerprint, SnapshotVersion};
    use gwo_kpi::{Direction, KpiCategory, KpiResult, Trend};
    use std::collections::BTreeMap;

    use crate::features::Feature;
    use crate::result::PredictionScore;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
    }

    fn prediction(model: &str, score: f64, factors: Vec<Factor>) -> PredictionResult {
        PredictionResult {
            employee_id: EmployeeId::new("e1"),
            department: Department::Programming,
            model: model.to_string(),
            model_version: "1.0.0".to_string(),
            score: PredictionScore::Probability(score),
            risk_band: Some(RiskBand::from_score(score)),
            factors,
            computed_at: at(),
        }
    }

    fn engine() -> RecommendationEngine {
        RecommendationEngine::new(RecommendationParams::default(), Some("needs support".to_string())).unwrap()
    }

    fn actions(recs: &[Recommendation]) -> Vec<&str> {
        recs.iter().map(|r| r.action.as_str()).collect()
    }

    #[test]
    fn highest_scoring_risk_leads_then_relative_impact_order() {
        let burnout = prediction(
            BurnoutModel::NAME,
            0.47,
            vec![
                Factor::new("high crunch hours", Feature::CrunchHours, 0.28),
                Factor::new("low satisfaction", Feature::Satisfaction, 0.19),
            ],
        );
        let turnover = prediction(
            TurnoverModel::NAME,
            0.7,
            vec![
                Factor::new("low performance", Feature::Performance, 0.6),
                Factor::new("low satisfaction", Feature::Satisfaction, 0.4),
                Factor::new("long tenure", Feature::TenureYears, -0.3),
            ],
        );

        let recs = engine().recommend(&[&burnout, &turnover], None);
        assert_eq!(
            actions(&recs),
            [
                "agree a development plan with a mentor",
                "schedule workload review",
                "hold a one-on-one engagement check-in",
            ]
        );
        // 0.19 of 0.28 beats 0.4 of 0.6, so the burnout trigger is kept
        assert!(matches!(&recs[2].trigger, Trigger::Model { model, .. } if model == BurnoutModel::NAME));
        assert_eq!(recs[0].priority, Priority::High);
    }

    #[test]
    fn models_on_different_scales_are_compared_relative_to_their_strongest_factor() {
        // turnover contributions are logits, burnout contributions are weighted shares
        let turnover = prediction(
            TurnoverModel::NAME,
            0.9,
            vec![
                Factor::new("low satisfaction", Feature::Satisfaction, 3.0),
                Factor::new("short tenure", Feature::TenureYears, 0.9),
            ],
        );
        let burnout = prediction(
            BurnoutModel::NAME,
            0.8,
            vec![
                Factor::new("high crunch hours", Feature::CrunchHours, 0.3),
                Factor::new("rising crunch hours", Feature::CrunchHoursTrend, 0.25),
            ],
        );

        let recs = engine().recommend(&[&turnover, &burnout], None);
        let order = actions(&recs);
        let position = |action: &str| order.iter().position(|a| *a == action).unwrap();
        assert!(position("schedule workload review") < position("assign an onboarding buddy"));
        assert!(position("cap overtime for the next sprint") < position("assign an onboarding buddy"));

        let Trigger::Model { relative_impact, .. } = &recs[position("schedule workload review")].trigger else {
            panic!("expected a model trigger");
        };
        assert_eq!(*relative_impact, 1.0);
    }

    #[test]
    fn unflagged_and_weak_factors_produce_nothing() {
        let calm = prediction(
            BurnoutModel::NAME,
            0.2,
            vec![Factor::new("high crunch hours", Feature::CrunchHours, 0.2)],
        );
        let faint = prediction(
            TurnoverModel::NAME,
            0.55,
            vec![Factor::new("low satisfaction", Feature::Satisfaction, 0.01)],
        );
        assert!(engine().recommend(&[&calm, &faint], None).is_empty());
    }

    #[test]
    fn critical_turnover_adds_urgent_retention_first() {
        let turnover = prediction(
            TurnoverModel::NAME,
            0.93,
            vec![
                Factor::new("low satisfaction", Feature::Satisfaction, 2.4),
                Factor::new("high crunch hours", Feature::CrunchHours, 1.8),
            ],
        );
        let recs = engine().recommend(&[&turnover], None);
        assert_eq!(recs[0].action, URGENT_RETENTION);
        assert_eq!(recs.len(), 3);
    }

    #[test]
    fn support_cluster_uses_low_side_factors() {
        let cluster = PredictionResult {
            score: PredictionScore::Cluster {
                id: 2,
                label: "needs support".to_string(),
            },
            risk_band: None,
            ..prediction(
                "performance_cluster",
                0.0,
                vec![
                    Factor::new("low performance", Feature::Performance, -1.3),
                    Factor::new("high satisfaction", Feature::Satisfaction, 0.4),
                ],
            )
        };
        let recs = engine().recommend(&[&cluster], None);
        assert_eq!(actions(&recs), ["agree a development plan with a mentor"]);
        assert_eq!(recs[0].priority, Priority::Medium);
    }

    #[test]
    fn kpi_context_follows_model_suggestions() {
        let kpi = |name: &str, status: KpiStatus| KpiResult {
            name: name.to_string(),
            category: KpiCategory::Wellbeing,
            value: 7.0,
            target: 5.0,
            direction: Direction::LowerIsBetter,
            trend: Trend::Stable,
            status,
            department_breakdown: BTreeMap::new(),
            sample_size: 3,
            insufficient_data: Vec::new(),
            computed_at: at(),
            fingerprint: Fingerprint::compute(&SnapshotVersion::from_bytes(b"v"), "kpi", &()).unwrap(),
        };
        let report = KpiReport {
            fingerprint: Fingerprint::compute(&SnapshotVersion::from_bytes(b"v"), "kpi", &()).unwrap(),
            records_version: SnapshotVersion::from_bytes(b"v"),
            computed_at: at(),
            results: vec![
                kpi("avg_satisfaction", KpiStatus::Warning),
                kpi("crunch_impact", KpiStatus::Critical),
                kpi("bug_fix_rate", KpiStatus::Critical),
                kpi("team_synergy", KpiStatus::Good),
            ],
            not_computable: Vec::new(),
            failures: Vec::new(),
        };
        let burnout = prediction(
            BurnoutModel::NAME,
            0.65,
            vec![Factor::new("high crunch hours", Feature::CrunchHours, 0.3)],
        );

        let recs = engine().recommend(&[&burnout], Some(&report));
        assert_eq!(
            actions(&recs),
            [
                "schedule workload review",
                "review the studio crunch policy before the next milestone",
                "launch a studio engagement survey",
            ]
        );
        assert_eq!(recs[1].priority, Priority::High);
        assert_eq!(recs[2].priority, Priority::Medium);
    }
}
