//! Fulfillment workflow of a project: the fixed pipeline of stages and the
//! detail document each operational stage carries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use validator::Validate;

use crate::errors::ServiceError;
use crate::media::validate_image_refs;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProjectStage {
    TechnicalVisit,
    Measurement,
    Verification,
    Workshop,
    Warehouse,
    Logistics,
    Completed,
    Cancelled,
}

impl ProjectStage {
    /// Stages that carry a detail document, in pipeline order.
    pub const OPERATIONAL: [ProjectStage; 6] = [
        ProjectStage::TechnicalVisit,
        ProjectStage::Measurement,
        ProjectStage::Verification,
        ProjectStage::Workshop,
        ProjectStage::Warehouse,
        ProjectStage::Logistics,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, ProjectStage::Completed | ProjectStage::Cancelled)
    }

    pub fn is_operational(self) -> bool {
        !self.is_terminal()
    }

    fn position(self) -> usize {
        ProjectStage::iter()
            .position(|stage| stage == self)
            .unwrap_or_default()
    }

    /// The stage that follows in the pipeline, if any.
    pub fn next(self) -> Option<ProjectStage> {
        match self {
            ProjectStage::TechnicalVisit => Some(ProjectStage::Measurement),
            ProjectStage::Measurement => Some(ProjectStage::Verification),
            ProjectStage::Verification => Some(ProjectStage::Workshop),
            ProjectStage::Workshop => Some(ProjectStage::Warehouse),
            ProjectStage::Warehouse => Some(ProjectStage::Logistics),
            ProjectStage::Logistics => Some(ProjectStage::Completed),
            ProjectStage::Completed | ProjectStage::Cancelled => None,
        }
    }

    /// Allowed moves: advance one step, go back to an earlier operational
    /// stage for rework, or cancel. Terminal stages never move.
    pub fn can_transition_to(self, target: ProjectStage) -> bool {
        if self.is_terminal() || self == target {
            return false;
        }
        if target == ProjectStage::Cancelled {
            return true;
        }
        if self.next() == Some(target) {
            return true;
        }
        target.is_operational() && target.position() < self.position()
    }

    pub fn transition_to(self, target: ProjectStage) -> Result<ProjectStage, ServiceError> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(ServiceError::InvalidOperation(format!(
                "Cannot move project from {} to {}",
                self, target
            )))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TechnicalVisitDetail {
    pub scheduled_at: Option<DateTime<Utc>>,
    pub visited_at: Option<DateTime<Utc>>,
    #[validate(length(max = 120))]
    pub technician: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 4000))]
    pub observations: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct OpeningMeasurement {
    #[validate(length(min = 1, max = 60))]
    pub label: String,
    #[validate(range(min = 1, max = 20000))]
    pub width_mm: u32,
    #[validate(range(min = 1, max = 20000))]
    pub height_mm: u32,
    #[validate(range(min = 1, max = 1000))]
    pub quantity: u32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct MeasurementDetail {
    pub measured_at: Option<DateTime<Utc>>,
    #[validate(length(max = 120))]
    pub measured_by: Option<String>,
    #[serde(default)]
    pub openings: Vec<OpeningMeasurement>,
    #[validate(length(max = 4000))]
    pub observations: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct VerificationDetail {
    pub verified_at: Option<DateTime<Utc>>,
    #[validate(length(max = 120))]
    pub verified_by: Option<String>,
    pub approved: Option<bool>,
    #[validate(length(max = 4000))]
    pub observations: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct WorkshopDetail {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[validate(length(max = 120))]
    pub responsible: Option<String>,
    #[validate(length(max = 4000))]
    pub observations: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct WarehouseDetail {
    pub received_at: Option<DateTime<Utc>>,
    #[validate(length(max = 120))]
    pub location: Option<String>,
    pub packages: Option<u32>,
    #[validate(length(max = 4000))]
    pub observations: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LogisticsDetail {
    pub scheduled_delivery: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    #[validate(length(max = 60))]
    pub vehicle: Option<String>,
    #[validate(length(max = 120))]
    pub driver: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 4000))]
    pub observations: Option<String>,
}

/// Stage detail keyed by the stage it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "detail", rename_all = "snake_case")]
pub enum StageDetail {
    TechnicalVisit(TechnicalVisitDetail),
    Measurement(MeasurementDetail),
    Verification(VerificationDetail),
    Workshop(WorkshopDetail),
    Warehouse(WarehouseDetail),
    Logistics(LogisticsDetail),
}

impl StageDetail {
    /// Parses a raw JSON document as the detail of `stage`.
    pub fn parse(stage: ProjectStage, raw: Value) -> Result<Self, ServiceError> {
        let invalid = |e: serde_json::Error| {
            ServiceError::ValidationError(format!("Invalid {} detail: {}", stage, e))
        };
        let detail = match stage {
            ProjectStage::TechnicalVisit => {
                StageDetail::TechnicalVisit(serde_json::from_value(raw).map_err(invalid)?)
            }
            ProjectStage::Measurement => {
                StageDetail::Measurement(serde_json::from_value(raw).map_err(invalid)?)
            }
            ProjectStage::Verification => {
                StageDetail::Verification(serde_json::from_value(raw).map_err(invalid)?)
            }
            ProjectStage::Workshop => {
                StageDetail::Workshop(serde_json::from_value(raw).map_err(invalid)?)
            }
            ProjectStage::Warehouse => {
                StageDetail::Warehouse(serde_json::from_value(raw).map_err(invalid)?)
            }
            ProjectStage::Logistics => {
                StageDetail::Logistics(serde_json::from_value(raw).map_err(invalid)?)
            }
            ProjectStage::Completed | ProjectStage::Cancelled => {
                return Err(ServiceError::InvalidInput(format!(
                    "Stage {} has no detail document",
                    stage
                )))
            }
        };
        detail.validate()?;
        Ok(detail)
    }

    pub fn stage(&self) -> ProjectStage {
        match self {
            StageDetail::TechnicalVisit(_) => ProjectStage::TechnicalVisit,
            StageDetail::Measurement(_) => ProjectStage::Measurement,
            StageDetail::Verification(_) => ProjectStage::Verification,
            StageDetail::Workshop(_) => ProjectStage::Workshop,
            StageDetail::Warehouse(_) => ProjectStage::Warehouse,
            StageDetail::Logistics(_) => ProjectStage::Logistics,
        }
    }

    fn validate(&self) -> Result<(), ServiceError> {
        match self {
            StageDetail::TechnicalVisit(d) => {
                d.validate()?;
                validate_image_refs(&d.photos)?;
            }
            StageDetail::Measurement(d) => {
                d.validate()?;
                for opening in &d.openings {
                    opening.validate()?;
                }
                validate_image_refs(&d.photos)?;
            }
            StageDetail::Verification(d) => d.validate()?,
            StageDetail::Workshop(d) => {
                d.validate()?;
                if let (Some(start), Some(end)) = (d.started_at, d.finished_at) {
                    if end < start {
                        return Err(ServiceError::ValidationError(
                            "Workshop finish cannot precede its start".to_string(),
                        ));
                    }
                }
            }
            StageDetail::Warehouse(d) => d.validate()?,
            StageDetail::Logistics(d) => d.validate()?,
        }
        Ok(())
    }

    /// The stored JSON document (without the stage tag).
    pub fn to_document(&self) -> Result<Value, ServiceError> {
        let value = match self {
            StageDetail::TechnicalVisit(d) => serde_json::to_value(d)?,
            StageDetail::Measurement(d) => serde_json::to_value(d)?,
            StageDetail::Verification(d) => serde_json::to_value(d)?,
            StageDetail::Workshop(d) => serde_json::to_value(d)?,
            StageDetail::Warehouse(d) => serde_json::to_value(d)?,
            StageDetail::Logistics(d) => serde_json::to_value(d)?,
        };
        Ok(value)
    }
}

/// Document stored for a stage with no detail yet.
pub fn empty_detail() -> Value {
    Value::Object(serde_json::Map::new())
}
