//! The slice of a report the picture pipeline needs from the report store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Issue category of a report; the first segment of every object key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Potholes,
    BurnedOutLamps,
    BurnedOutSemaphores,
    SewerLids,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::Potholes => "potholes",
            IssueCategory::BurnedOutLamps => "burned_out_lamps",
            IssueCategory::BurnedOutSemaphores => "burned_out_semaphores",
            IssueCategory::SewerLids => "sewer_lids",
        }
    }
}

impl FromStr for IssueCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "potholes" => Ok(IssueCategory::Potholes),
            "burned_out_lamps" => Ok(IssueCategory::BurnedOutLamps),
            "burned_out_semaphores" => Ok(IssueCategory::BurnedOutSemaphores),
            "sewer_lids" => Ok(IssueCategory::SewerLids),
            _ => Err(anyhow::anyhow!("Invalid issue category: {}", s)),
        }
    }
}

impl Display for IssueCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Report lookup result used by attach and detach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub id: Uuid,
    pub coordinate: String,
    pub reported_at: DateTime<Utc>,
    pub issue_category: IssueCategory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_category_round_trips_through_str() {
        for category in [
            IssueCategory::Potholes,
            IssueCategory::BurnedOutLamps,
            IssueCategory::BurnedOutSemaphores,
            IssueCategory::SewerLids,
        ] {
            assert_eq!(category.as_str().parse::<IssueCategory>().unwrap(), category);
        }
        assert!("graffiti".parse::<IssueCategory>().is_err());
    }
}
