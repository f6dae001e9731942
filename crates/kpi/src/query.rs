//! Filters applied before KPI aggregation.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use gwo_core::{Department, EmployeeRecord, EngineError, EngineResult, closed_enum};

use crate::definition::KpiCategory;

/// Inclusive date range over `recorded_on`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> EngineResult<Self> {
        if start > end {
            return Err(EngineError::invalid_parameter(
                "time_window",
                format!("{start}..{end}"),
                ["start <= end"],
            ));
        }
        Ok(Self { start, end })
    }

    /// Window of `days` days ending on `end` (inclusive).
    pub fn ending_on(end: NaiveDate, days: u64) -> Self {
        let start = end
            .checked_sub_days(Days::new(days.saturating_sub(1)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    pub fn len_days(&self) -> u64 {
        ((self.end - self.start).num_days() + 1).max(1) as u64
    }

    /// The window of equal length immediately before this one.
    pub fn preceding(&self) -> Option<Self> {
        let end = self.start.pred_opt()?;
        Some(Self::ending_on(end, self.len_days()))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

closed_enum! {
    /// Named windows accepted by the `time_period` filter.
    TimePeriod, "time_period" {
        Last30Days => "last_30_days",
        LastQuarter => "last_quarter",
        LastYear => "last_year",
        All => "all",
    }
}

impl TimePeriod {
    /// Concrete window ending on `as_of`; `None` for [`TimePeriod::All`].
    pub fn window(&self, as_of: NaiveDate) -> Option<TimeWindow> {
        let days = match self {
            TimePeriod::Last30Days => 30,
            TimePeriod::LastQuarter => 91,
            TimePeriod::LastYear => 365,
            TimePeriod::All => return None,
        };
        Some(TimeWindow::ending_on(as_of, days))
    }
}

/// Optional filters for one KPI computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiQuery {
    pub category: Option<KpiCategory>,
    pub department: Option<Department>,
    pub window: Option<TimeWindow>,
}

impl KpiQuery {
    /// Parse string filters as they arrive from a caller.
    ///
    /// Unknown values fail with `InvalidParameter` listing the valid options;
    /// nothing is silently defaulted.
    pub fn parse(
        category: Option<&str>,
        department: Option<&str>,
        time_period: Option<&str>,
        as_of: NaiveDate,
    ) -> EngineResult<Self> {
        let category = category.map(str::parse::<KpiCategory>).transpose()?;
        let department = department.map(str::parse::<Department>).transpose()?;
        let window = match time_period {
            Some(p) => p.parse::<TimePeriod>()?.window(as_of),
            None => None,
        };
        Ok(Self {
            category,
            department,
            window,
        })
    }

    pub fn with_department(mut self, department: Department) -> Self {
        self.department = Some(department);
        self
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Employees matching the department filter and `window` (which may be
    /// this query's window or its predecessor).
    pub(crate) fn select<'a>(
        &self,
        employees: &'a [EmployeeRecord],
        window: Option<&TimeWindow>,
    ) -> Vec<&'a EmployeeRecord> {
        employees
            .iter()
            .filter(|e| self.department.is_none_or(|d| e.department == d))
            .filter(|e| match window {
                Some(w) => e.recorded_on.is_some_and(|d| w.contains(d)),
                None => true,
            })
            .collect()
    }
}
