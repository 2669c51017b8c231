use crate::domain::errors::{DomainError, DomainResult};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ===== Calendar =====

/// Day excluded from business time. Recurring holidays repeat on the same
/// month and day every year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: String,
    #[serde(default)]
    pub recurring: bool,
}

impl Holiday {
    pub fn matches(&self, date: NaiveDate) -> bool {
        if self.recurring {
            self.date.month() == date.month() && self.date.day() == date.day()
        } else {
            self.date == date
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarSettings {
    /// Hour of day (0-23) at which business time starts.
    pub start_hour: u32,
    /// Hour of day (1-24) at which business time stops.
    pub end_hour: u32,
    pub weekdays: Vec<Weekday>,
    #[serde(default)]
    pub holidays: Vec<Holiday>,
    /// IANA timezone the hours are expressed in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            start_hour: 8,
            end_hour: 18,
            weekdays: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            holidays: Vec::new(),
            timezone: default_timezone(),
        }
    }
}

impl CalendarSettings {
    pub fn validate(&self) -> DomainResult<()> {
        if self.start_hour >= self.end_hour || self.end_hour > 24 {
            return Err(DomainError::Validation(format!(
                "Business hours must satisfy 0 <= start < end <= 24 (got {}..{})",
                self.start_hour, self.end_hour
            )));
        }
        if self.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(DomainError::Validation(format!(
                "Invalid timezone: {}",
                self.timezone
            )));
        }
        Ok(())
    }
}

// ===== Configuration =====

/// Snapshot of the SLA rules: one limit per priority plus the calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaConfig {
    pub limits: BTreeMap<String, f64>,
    pub calendar: CalendarSettings,
}

impl SlaConfig {
    pub fn limit_for(&self, priority: &str) -> DomainResult<f64> {
        self.limits
            .get(priority)
            .copied()
            .ok_or_else(|| DomainError::UnknownPriority(priority.to_string()))
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.limits.is_empty() {
            return Err(DomainError::Validation(
                "At least one priority limit is required".to_string(),
            ));
        }
        for (priority, hours) in &self.limits {
            if priority.trim().is_empty() {
                return Err(DomainError::Validation(
                    "Priority labels must not be empty".to_string(),
                ));
            }
            if !hours.is_finite() || *hours <= 0.0 {
                return Err(DomainError::Validation(format!(
                    "SLA limit for '{}' must be a positive number of hours",
                    priority
                )));
            }
        }
        self.calendar.validate()
    }
}

impl Default for SlaConfig {
    fn default() -> Self {
        let limits = [("Critical", 4.0), ("High", 8.0), ("Normal", 24.0), ("Low", 72.0)]
            .into_iter()
            .map(|(p, h)| (p.to_string(), h))
            .collect();
        Self {
            limits,
            calendar: CalendarSettings::default(),
        }
    }
}

// ===== Evaluation =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    OnTrack,
    Violated,
    /// Cancelled tickets report figures but never count as violations.
    Excluded,
}

impl std::fmt::Display for SlaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlaStatus::OnTrack => write!(f, "on_track"),
            SlaStatus::Violated => write!(f, "violated"),
            SlaStatus::Excluded => write!(f, "excluded"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlaEvaluation {
    #[serde(serialize_with = "rounded")]
    pub elapsed_wall_hours: f64,
    #[serde(serialize_with = "rounded")]
    pub elapsed_business_hours: f64,
    pub sla_limit_hours: f64,
    pub status: SlaStatus,
    #[serde(serialize_with = "rounded_opt")]
    pub resolution_wall_hours: Option<f64>,
    #[serde(serialize_with = "rounded_opt")]
    pub resolution_business_hours: Option<f64>,
}

// Figures are exact in memory and rounded only on the wire.
fn rounded<S: serde::Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round2(*value))
}

fn rounded_opt<S: serde::Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_some(&round2(*v)),
        None => serializer.serialize_none(),
    }
}

/// SLA result recorded on the completion event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlaOutcome {
    pub business_hours: f64,
    pub limit_hours: f64,
    pub status: SlaStatus,
}

impl From<&SlaEvaluation> for SlaOutcome {
    fn from(evaluation: &SlaEvaluation) -> Self {
        Self {
            business_hours: round2(evaluation.elapsed_business_hours),
            limit_hours: evaluation.sla_limit_hours,
            status: evaluation.status,
        }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
