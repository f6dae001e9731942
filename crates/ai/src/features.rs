//! Feature extraction shared by every prediction model.

use chrono::NaiveDate;
use serde::Serialize;

use gwo_core::stats::coefficient_of_variation;
use gwo_core::{Department, EmployeeId, EmployeeRecord, EngineError, EngineResult, RecordSet, closed_enum};

closed_enum! {
    /// Model input features, in vector order.
    Feature, "feature" {
        Satisfaction => "satisfaction",
        Performance => "performance",
        CrunchHours => "crunch_hours",
        TenureYears => "tenure_years",
        SprintVelocity => "sprint_velocity",
        SatisfactionTrend => "satisfaction_trend",
        CrunchHoursTrend => "crunch_hours_trend",
        VelocityVolatility => "velocity_volatility",
    }
}

pub const FEATURE_COUNT: usize = 8;

impl Feature {
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Human-readable factor label for a deviation in the given direction.
    pub fn describe(&self, positive: bool) -> String {
        let (up, down, noun) = match self {
            Feature::Satisfaction => ("high", "low", "satisfaction"),
            Feature::Performance => ("high", "low", "performance"),
            Feature::CrunchHours => ("high", "low", "crunch hours"),
            Feature::TenureYears => ("long", "short", "tenure"),
            Feature::SprintVelocity => ("high", "low", "sprint velocity"),
            Feature::SatisfactionTrend => ("rising", "falling", "satisfaction"),
            Feature::CrunchHoursTrend => ("rising", "falling", "crunch hours"),
            Feature::VelocityVolatility => ("volatile", "steady", "sprint velocity"),
        };
        format!("{} {noun}", if positive { up } else { down })
    }

    /// Inclusive accepted range; `None` means unbounded on that side.
    pub fn bounds(&self) -> (Option<f64>, Option<f64>) {
        match self {
            Feature::Satisfaction => (Some(1.0), Some(10.0)),
            Feature::Performance => (Some(1.0), Some(5.0)),
            Feature::SatisfactionTrend => (Some(-9.0), Some(9.0)),
            Feature::CrunchHours | Feature::TenureYears | Feature::SprintVelocity | Feature::VelocityVolatility => {
                (Some(0.0), None)
            }
            Feature::CrunchHoursTrend => (None, None),
        }
    }

    fn check(&self, value: f64) -> Result<(), String> {
        if !value.is_finite() {
            return Err(format!("value {value} is not finite"));
        }
        match self.bounds() {
            (Some(min), _) if value < min => Err(format!("value {value} is below {min}")),
            (_, Some(max)) if value > max => Err(format!("value {value} is above {max}")),
            _ => Ok(()),
        }
    }
}

/// Fixed-length model input for one employee.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub employee_id: EmployeeId,
    pub department: Department,
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Build a vector from explicit values; every value must be finite and
    /// within [`Feature::bounds`].
    pub fn new(
        employee_id: EmployeeId,
        department: Department,
        values: [f64; FEATURE_COUNT],
    ) -> EngineResult<Self> {
        for feature in Feature::ALL {
            if let Err(reason) = feature.check(values[feature.index()]) {
                return Err(EngineError::invalid_feature(&employee_id, feature.as_str(), reason));
            }
        }
        Ok(Self {
            employee_id,
            department,
            values,
        })
    }

    /// Extract the features of `record` as of `as_of`.
    ///
    /// Crunch hours and sprint velocity are required; absent trends count as
    /// no change.
    pub fn from_record(record: &EmployeeRecord, as_of: NaiveDate) -> EngineResult<Self> {
        let m = &record.metrics;
        let required = |feature: Feature, value: Option<f64>| {
            value.ok_or_else(|| EngineError::invalid_feature(&record.id, feature.as_str(), "absent from record"))
        };

        let mut values = [0.0; FEATURE_COUNT];
        values[Feature::Satisfaction.index()] = record.satisfaction_score;
        values[Feature::Performance.index()] = record.performance_score;
        values[Feature::CrunchHours.index()] = required(Feature::CrunchHours, m.crunch_hours_last_month)?;
        values[Feature::TenureYears.index()] = record.tenure_years(as_of);
        values[Feature::SprintVelocity.index()] = required(Feature::SprintVelocity, m.sprint_velocity)?;
        values[Feature::SatisfactionTrend.index()] = m.satisfaction_trend.unwrap_or_default();
        values[Feature::CrunchHoursTrend.index()] = m.crunch_hours_trend.unwrap_or_default();
        values[Feature::VelocityVolatility.index()] = coefficient_of_variation(&m.velocity_history);

        Self::new(record.id.clone(), record.department, values)
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }
}

/// Feature vectors for a batch of employees, sorted by employee id, plus the
/// employees whose features could not be extracted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureBatch {
    rows: Vec<FeatureVector>,
    rejected: Vec<(EmployeeId, EngineError)>,
}

impl FeatureBatch {
    pub fn from_vectors(mut rows: Vec<FeatureVector>) -> Self {
        rows.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));
        Self {
            rows,
            rejected: Vec::new(),
        }
    }

    /// Extract features for every employee (optionally one department).
    /// Extraction failures are kept per employee; they never abort the batch.
    pub fn extract(records: &RecordSet, department: Option<Department>) -> Self {
        let mut rows = Vec::new();
        let mut rejected = Vec::new();
        for e in records
            .employees
            .iter()
            .filter(|e| department.is_none_or(|d| e.department == d))
        {
            match FeatureVector::from_record(e, records.as_of) {
                Ok(v) => rows.push(v),
                Err(err) => rejected.push((e.id.clone(), err)),
            }
        }
        rejected.sort_by(|a, b| a.0.cmp(&b.0));
        let mut batch = Self::from_vectors(rows);
        batch.rejected = rejected;
        batch
    }

    pub fn rows(&self) -> &[FeatureVector] {
        &self.rows
    }

    pub fn rejected(&self) -> &[(EmployeeId, EngineError)] {
        &self.rejected
    }

    pub fn get(&self, employee_id: &EmployeeId) -> Option<&FeatureVector> {
        self.rows
            .binary_search_by(|v| v.employee_id.cmp(employee_id))
            .ok()
            .map(|i| &self.rows[i])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwo_core::{GamingMetrics, Level};

    fn record(id: &str) -> EmployeeRecord {
        EmployeeRecord {
            id: EmployeeId::new(id),
            department: Department::Programming,
            level: Level::Mid,
            team_id: None,
            salary: 70_000.0,
            satisfaction_score: 6.0,
            performance_score: 3.0,
            years_experience: 3.0,
            hire_date: NaiveDate::from_ymd_opt(2022, 6, 30).unwrap(),
            recorded_on: None,
            metrics: GamingMetrics {
                sprint_velocity: Some(30.0),
                crunch_hours_last_month: Some(25.0),
                velocity_history: vec![20.0, 30.0, 40.0],
                ..GamingMetrics::default()
            },
        }
    }

    #[test]
    fn extraction_fills_vector_in_fixed_order() {
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let v = FeatureVector::from_record(&record("e1"), as_of).unwrap();
        assert_eq!(v.get(Feature::Satisfaction), 6.0);
        assert_eq!(v.get(Feature::CrunchHours), 25.0);
        assert!((v.get(Feature::TenureYears) - 731.0 / 365.25).abs() < 1e-12);
        assert_eq!(v.get(Feature::SatisfactionTrend), 0.0);
        assert!((v.get(Feature::VelocityVolatility) - 10.0 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn missing_required_metric_rejects_only_that_employee() {
        let mut broken = record("e2");
        broken.metrics.crunch_hours_last_month = None;
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let set = RecordSet::new(as_of, vec![broken, record("e1")], Vec::new()).unwrap();

        let batch = FeatureBatch::extract(&set, None);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.rejected().len(), 1);
        match &batch.rejected()[0].1 {
            EngineError::InvalidFeature { employee_id, feature, .. } => {
                assert_eq!(employee_id.as_str(), "e2");
                assert_eq!(feature, "crunch_hours");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_finite_values_are_invalid_features() {
        let mut values = [1.0; FEATURE_COUNT];
        values[Feature::SprintVelocity.index()] = f64::NAN;
        let err = FeatureVector::new(EmployeeId::new("e9"), Department::Art, values).unwrap_err();
        assert_eq!(err.code(), "invalid_feature");
    }

    fn rejected_feature(values: [f64; FEATURE_COUNT]) -> (String, String) {
        match FeatureVector::new(EmployeeId::new("e1"), Department::Programming, values).unwrap_err() {
            EngineError::InvalidFeature { employee_id, feature, .. } => (employee_id.as_str().to_string(), feature),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn out_of_range_values_name_the_feature_and_employee() {
        let valid = [7.0, 3.0, 20.0, 2.0, 30.0, 0.0, 0.0, 0.1];
        assert!(FeatureVector::new(EmployeeId::new("e1"), Department::Programming, valid).is_ok());

        let cases = [
            (Feature::Satisfaction, 50.0),
            (Feature::Performance, 0.0),
            (Feature::CrunchHours, -10.0),
            (Feature::TenureYears, -3.0),
            (Feature::SprintVelocity, -5.0),
            (Feature::SatisfactionTrend, 40.0),
            (Feature::VelocityVolatility, -1.0),
        ];
        for (feature, value) in cases {
            let mut values = valid;
            values[feature.index()] = value;
            let (employee, name) = rejected_feature(values);
            assert_eq!(employee, "e1");
            assert_eq!(name, feature.as_str());
        }

        let mut falling_crunch = valid;
        falling_crunch[Feature::CrunchHoursTrend.index()] = -60.0;
        assert!(FeatureVector::new(EmployeeId::new("e1"), Department::Programming, falling_crunch).is_ok());
    }
}
