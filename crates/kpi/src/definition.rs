//! KPI definitions and the registry that validates them.
//!
//! Every KPI is a typed descriptor (aggregation rule, target, direction,
//! thresholds) registered up front. Lookups by name go through the registry,
//! never through ad-hoc string dispatch at computation time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use gwo_core::{EmployeeRecord, EngineError, EngineResult, closed_enum};

closed_enum! {
    /// Employee fields a KPI can aggregate.
    RecordField, "field" {
        Salary => "salary",
        SatisfactionScore => "satisfaction_score",
        PerformanceScore => "performance_score",
        YearsExperience => "years_experience",
        SprintVelocity => "sprint_velocity",
        BugFixRate => "bug_fix_rate",
        InnovationIndex => "innovation_index",
        CrunchHoursLastMonth => "crunch_hours_last_month",
        TeamCollaborationScore => "team_collaboration_score",
        CrossDepartmentCollaborations => "cross_department_collaborations",
    }
}

impl RecordField {
    /// Value of this field on one record, if present.
    pub fn value(&self, e: &EmployeeRecord) -> Option<f64> {
        match self {
            RecordField::Salary => Some(e.salary),
            RecordField::SatisfactionScore => Some(e.satisfaction_score),
            RecordField::PerformanceScore => Some(e.performance_score),
            RecordField::YearsExperience => Some(e.years_experience),
            RecordField::SprintVelocity => e.metrics.sprint_velocity,
            RecordField::BugFixRate => e.metrics.bug_fix_rate,
            RecordField::InnovationIndex => e.metrics.innovation_index,
            RecordField::CrunchHoursLastMonth => e.metrics.crunch_hours_last_month,
            RecordField::TeamCollaborationScore => e.metrics.team_collaboration_score,
            RecordField::CrossDepartmentCollaborations => {
                e.metrics.cross_department_collaborations.map(f64::from)
            }
        }
    }
}

closed_enum! {
    /// Grouping used by the `category` filter.
    KpiCategory, "category" {
        Engagement => "engagement",
        Delivery => "delivery",
        Quality => "quality",
        Innovation => "innovation",
        Wellbeing => "wellbeing",
        Cost => "cost",
    }
}

/// Gaming-specific formulas that don't reduce to a single-field rule.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomFormula {
    /// Mean of per-team sprint velocity, excluding under-sampled teams.
    SprintVelocity,
    /// Batch-scoped comparison of over/under crunch-threshold cohorts.
    CrunchImpact,
    /// Blend of innovation contributions and cross-department collaboration.
    InnovationIndex,
}

/// How a KPI turns a record set into one number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregationRule {
    Mean {
        field: RecordField,
    },
    WeightedMean {
        value: RecordField,
        weight: RecordField,
    },
    /// Sum of numerator over sum of denominator.
    Ratio {
        numerator: RecordField,
        denominator: RecordField,
    },
    Custom {
        formula: CustomFormula,
    },
}

impl AggregationRule {
    /// Fields that must be present on at least one record for the rule to
    /// be computable.
    pub fn required_fields(&self) -> Vec<RecordField> {
        match self {
            AggregationRule::Mean { field } => vec![*field],
            AggregationRule::WeightedMean { value, weight } => vec![*value, *weight],
            AggregationRule::Ratio {
                numerator,
                denominator,
            } => vec![*numerator, *denominator],
            AggregationRule::Custom { formula } => match formula {
                CustomFormula::SprintVelocity => vec![RecordField::SprintVelocity],
                CustomFormula::CrunchImpact => vec![
                    RecordField::CrunchHoursLastMonth,
                    RecordField::SatisfactionScore,
                ],
                CustomFormula::InnovationIndex => vec![RecordField::InnovationIndex],
            },
        }
    }
}

/// Whether exceeding the target is good or bad.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// Attainment ratios separating the four status levels.
///
/// Attainment is `value / target` (or `target / value` when lower is better).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusThresholds {
    pub critical: f64,
    pub warning: f64,
    pub excellent: f64,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            critical: 0.8,
            warning: 0.95,
            excellent: 1.1,
        }
    }
}

/// A named KPI and everything needed to compute and grade it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiDefinition {
    pub name: String,
    pub category: KpiCategory,
    pub rule: AggregationRule,
    pub target: f64,
    pub direction: Direction,
    #[serde(default)]
    pub thresholds: StatusThresholds,
}

impl KpiDefinition {
    fn check(&self) -> EngineResult<()> {
        let fail = |msg: String| Err(EngineError::config(format!("kpi `{}`: {msg}", self.name)));

        if self.name.trim().is_empty() {
            return Err(EngineError::config("kpi name must not be empty"));
        }
        if !(self.target.is_finite() && self.target > 0.0) {
            return fail(format!("target must be finite and > 0 (got {})", self.target));
        }
        let t = self.thresholds;
        let ordered = t.critical > 0.0 && t.critical < t.warning && t.warning <= 1.0 && t.excellent >= 1.0;
        if !(ordered && t.excellent.is_finite()) {
            return fail(format!(
                "thresholds must satisfy 0 < critical < warning <= 1 <= excellent (got {t:?})"
            ));
        }
        match &self.rule {
            AggregationRule::WeightedMean { value, weight } if value == weight => {
                fail("weighted mean needs distinct value and weight fields".to_string())
            }
            AggregationRule::Ratio {
                numerator,
                denominator,
            } if numerator == denominator => {
                fail("ratio needs distinct numerator and denominator fields".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Registry of KPI definitions keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KpiRegistry {
    definitions: BTreeMap<String, KpiDefinition>,
}

impl KpiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the studio's standard KPI set.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for definition in builtin_definitions() {
            if let Err(e) = registry.register(definition) {
                tracing::error!(error = %e, "built-in kpi rejected");
            }
        }
        registry
    }

    /// Build a registry from explicit definitions, rejecting the whole set if
    /// any definition is invalid.
    pub fn from_definitions(definitions: impl IntoIterator<Item = KpiDefinition>) -> EngineResult<Self> {
        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition)?;
        }
        Ok(registry)
    }

    /// Validate and add a definition.
    pub fn register(&mut self, definition: KpiDefinition) -> EngineResult<()> {
        definition.check()?;
        if self.definitions.contains_key(&definition.name) {
            return Err(EngineError::config(format!(
                "kpi `{}` registered twice",
                definition.name
            )));
        }
        self.definitions.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&KpiDefinition> {
        self.definitions.get(name)
    }

    /// Definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = &KpiDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn def(
    name: &str,
    category: KpiCategory,
    rule: AggregationRule,
    target: f64,
    direction: Direction,
) -> KpiDefinition {
    KpiDefinition {
        name: name.to_string(),
        category,
        rule,
        target,
        direction,
        thresholds: StatusThresholds::default(),
    }
}

/// The standard studio KPI set.
pub fn builtin_definitions() -> Vec<KpiDefinition> {
    use AggregationRule::*;
    use Direction::*;
    use KpiCategory::*;

    vec![
        def(
            "avg_satisfaction",
            Engagement,
            Mean {
                field: RecordField::SatisfactionScore,
            },
            8.0,
            HigherIsBetter,
        ),
        def(
            "avg_performance",
            Delivery,
            Mean {
                field: RecordField::PerformanceScore,
            },
            4.0,
            HigherIsBetter,
        ),
        def(
            "experience_weighted_performance",
            Delivery,
            WeightedMean {
                value: RecordField::PerformanceScore,
                weight: RecordField::YearsExperience,
            },
            4.0,
            HigherIsBetter,
        ),
        def(
            "sprint_velocity",
            Delivery,
            Custom {
                formula: CustomFormula::SprintVelocity,
            },
            40.0,
            HigherIsBetter,
        ),
        def(
            "bug_fix_rate",
            Quality,
            Mean {
                field: RecordField::BugFixRate,
            },
            85.0,
            HigherIsBetter,
        ),
        def(
            "innovation_index",
            Innovation,
            Custom {
                formula: CustomFormula::InnovationIndex,
            },
            75.0,
            HigherIsBetter,
        ),
        def(
            "crunch_impact",
            Wellbeing,
            Custom {
                formula: CustomFormula::CrunchImpact,
            },
            5.0,
            LowerIsBetter,
        ),
        def(
            "team_synergy",
            Engagement,
            Mean {
                field: RecordField::TeamCollaborationScore,
            },
            8.0,
            HigherIsBetter,
        ),
        def(
            "salary_per_story_point",
            Cost,
            Ratio {
                numerator: RecordField::Salary,
                denominator: RecordField::SprintVelocity,
            },
            2500.0,
            LowerIsBetter,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_is_complete_and_valid() {
        let registry = KpiRegistry::builtin();
        assert_eq!(registry.len(), builtin_definitions().len());
        assert!(KpiRegistry::from_definitions(builtin_definitions()).is_ok());
        assert_eq!(
            registry.get("crunch_impact").map(|d| d.direction),
            Some(Direction::LowerIsBetter)
        );
    }

    #[test]
    fn registration_rejects_bad_definitions() {
        let mut registry = KpiRegistry::new();

        let mut zero_target = builtin_definitions().remove(0);
        zero_target.target = 0.0;
        assert!(matches!(registry.register(zero_target), Err(EngineError::Config(_))));

        let mut inverted = builtin_definitions().remove(0);
        inverted.thresholds = StatusThresholds {
            critical: 0.9,
            warning: 0.8,
            excellent: 1.2,
        };
        assert!(registry.register(inverted).is_err());

        let mut same_fields = builtin_definitions().remove(0);
        same_fields.rule = AggregationRule::Ratio {
            numerator: RecordField::Salary,
            denominator: RecordField::Salary,
        };
        assert!(registry.register(same_fields).is_err());

        let ok = builtin_definitions().remove(0);
        registry.register(ok.clone()).unwrap();
        assert!(registry.register(ok).is_err());
    }

    #[test]
    fn rules_deserialize_from_tagged_toml_shape() {
        let rule: AggregationRule = serde_json::from_str(
            r#"{ "kind": "weighted_mean", "value": "performance_score", "weight": "years_experience" }"#,
        )
        .unwrap();
        assert_eq!(
            rule.required_fields(),
            vec![RecordField::PerformanceScore, RecordField::YearsExperience]
        );
    }
}
