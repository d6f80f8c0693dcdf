//! Per-period statistics stored in a summary.
//!
//! [`Period`] is sealed: [`CgmPeriod`] and [`BgmPeriod`] are the only
//! statistics shapes a [`Summary`](super::Summary) can carry.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// Discriminant of a summary's statistics shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryType {
    /// Continuous glucose monitoring.
    Cgm,
    /// Blood glucose meter.
    Bgm,
}

impl SummaryType {
    /// Stored form of the discriminant.
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryType::Cgm => "cgm",
            SummaryType::Bgm => "bgm",
        }
    }
}

impl fmt::Display for SummaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SummaryType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cgm" => Ok(SummaryType::Cgm),
            "bgm" => Ok(SummaryType::Bgm),
            other => Err(ValidationError::InvalidArgument {
                argument: "summary type".to_string(),
                message: format!("unknown summary type '{}'", other),
            }),
        }
    }
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::CgmPeriod {}
    impl Sealed for super::BgmPeriod {}
}

/// Statistics shape of a summary.
pub trait Period:
    sealed::Sealed
    + Serialize
    + DeserializeOwned
    + Default
    + Clone
    + fmt::Debug
    + PartialEq
    + Send
    + Sync
    + 'static
{
    /// Discriminant stored in the summary's `type` field.
    const SUMMARY_TYPE: SummaryType;

    /// Returns the discriminant for this shape.
    fn summary_type() -> SummaryType {
        Self::SUMMARY_TYPE
    }

    /// Overwrites this period with statistics received from an external
    /// payload.
    fn populate(&mut self, external: &Value) -> Result<(), ValidationError>;

    /// Renders this period in the external payload shape.
    fn export(&self) -> Value;
}

/// Mean glucose with its units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageGlucose {
    /// `mmol/L` or `mg/dL`.
    pub units: String,
    /// Mean value in `units`.
    pub value: f64,
}

/// CGM statistics for one period.
///
/// Each `has_*` flag marks whether the matching statistic was computed. The
/// `*_percent`, `*_minutes` and `*_records` fields share their stored names.
// Statistic fields are named after their stored keys
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CgmPeriod {
    pub has_average_glucose: bool,
    pub has_glucose_management_indicator: bool,
    #[serde(rename = "hasTimeCGMUsePercent")]
    pub has_time_cgm_use_percent: bool,
    pub has_time_in_target_percent: bool,
    pub has_time_in_high_percent: bool,
    pub has_time_in_very_high_percent: bool,
    pub has_time_in_low_percent: bool,
    pub has_time_in_very_low_percent: bool,

    #[serde(rename = "timeCGMUsePercent")]
    pub time_cgm_use_percent: Option<f64>,
    #[serde(rename = "timeCGMUseMinutes")]
    pub time_cgm_use_minutes: i64,
    #[serde(rename = "timeCGMUseRecords")]
    pub time_cgm_use_records: i64,

    pub average_glucose: Option<AverageGlucose>,
    pub glucose_management_indicator: Option<f64>,

    pub time_in_target_percent: Option<f64>,
    pub time_in_target_minutes: i64,
    pub time_in_target_records: i64,

    pub time_in_low_percent: Option<f64>,
    pub time_in_low_minutes: i64,
    pub time_in_low_records: i64,

    pub time_in_very_low_percent: Option<f64>,
    pub time_in_very_low_minutes: i64,
    pub time_in_very_low_records: i64,

    pub time_in_high_percent: Option<f64>,
    pub time_in_high_minutes: i64,
    pub time_in_high_records: i64,

    pub time_in_very_high_percent: Option<f64>,
    pub time_in_very_high_minutes: i64,
    pub time_in_very_high_records: i64,
}

const CGM_REQUIRED_FLAGS: &[&str] = &[
    "hasAverageGlucose",
    "hasGlucoseManagementIndicator",
    "hasTimeCGMUsePercent",
    "hasTimeInTargetPercent",
    "hasTimeInHighPercent",
    "hasTimeInVeryHighPercent",
    "hasTimeInLowPercent",
    "hasTimeInVeryLowPercent",
];

impl Period for CgmPeriod {
    const SUMMARY_TYPE: SummaryType = SummaryType::Cgm;

    fn populate(&mut self, external: &Value) -> Result<(), ValidationError> {
        require_fields(external, CGM_REQUIRED_FLAGS)?;
        *self = decode_stats(external)?;
        Ok(())
    }

    fn export(&self) -> Value {
        let mut exported = serde_json::to_value(self).unwrap_or(Value::Null);
        // Consumers expect the average glucose object even when unset.
        if let Some(map) = exported.as_object_mut() {
            if map.get("averageGlucose").is_none_or(Value::is_null) {
                map.insert(
                    "averageGlucose".to_string(),
                    serde_json::json!({ "units": "", "value": 0.0 }),
                );
            }
        }
        exported
    }
}

/// BGM statistics for one period.
///
/// Each `has_*` flag marks whether the matching statistic was computed. The
/// `*_percent`, `*_minutes` and `*_records` fields share their stored names.
// Statistic fields are named after their stored keys
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BgmPeriod {
    pub has_average_glucose: bool,
    pub has_time_in_target_percent: bool,
    pub has_time_in_high_percent: bool,
    pub has_time_in_very_high_percent: bool,
    pub has_time_in_low_percent: bool,
    pub has_time_in_very_low_percent: bool,

    pub average_glucose: AverageGlucose,
    pub total_records: i64,

    pub time_in_target_percent: f64,
    pub time_in_target_records: i64,

    pub time_in_low_percent: f64,
    pub time_in_low_records: i64,

    pub time_in_very_low_percent: f64,
    pub time_in_very_low_records: i64,

    pub time_in_high_percent: f64,
    pub time_in_high_records: i64,

    pub time_in_very_high_percent: f64,
    pub time_in_very_high_records: i64,
}

impl Period for BgmPeriod {
    const SUMMARY_TYPE: SummaryType = SummaryType::Bgm;

    fn populate(&mut self, external: &Value) -> Result<(), ValidationError> {
        *self = decode_stats(external)?;
        Ok(())
    }

    fn export(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn require_fields(external: &Value, fields: &[&str]) -> Result<(), ValidationError> {
    let Some(object) = external.as_object() else {
        return Err(ValidationError::InvalidArgument {
            argument: "stats".to_string(),
            message: "expected an object".to_string(),
        });
    };

    match fields.iter().find(|field| !object.contains_key(**field)) {
        Some(missing) => Err(ValidationError::MissingRequiredField {
            field: format!("stats.{}", missing),
        }),
        None => Ok(()),
    }
}

fn decode_stats<T: DeserializeOwned>(external: &Value) -> Result<T, ValidationError> {
    serde_json::from_value(external.clone()).map_err(|err| ValidationError::InvalidArgument {
        argument: "stats".to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_type_round_trip() {
        assert_eq!(CgmPeriod::summary_type().to_string(), "cgm");
        assert_eq!(BgmPeriod::summary_type().to_string(), "bgm");
        assert_eq!("cgm".parse::<SummaryType>().unwrap(), SummaryType::Cgm);
        assert!("cbg".parse::<SummaryType>().is_err());
    }

    #[test]
    fn test_cgm_field_names() {
        let period = CgmPeriod {
            has_time_cgm_use_percent: true,
            time_cgm_use_percent: Some(0.85),
            ..Default::default()
        };
        let value = serde_json::to_value(&period).unwrap();
        assert_eq!(value["hasTimeCGMUsePercent"], json!(true));
        assert_eq!(value["timeCGMUsePercent"], json!(0.85));
        assert_eq!(value["timeInVeryLowPercent"], Value::Null);
    }

    #[test]
    fn test_cgm_populate_requires_flags() {
        let mut period = CgmPeriod::default();
        let err = period
            .populate(&json!({ "timeCGMUsePercent": 0.5 }))
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingRequiredField { .. }));
    }

    #[test]
    fn test_cgm_populate_and_export() {
        let mut payload = serde_json::Map::new();
        for flag in CGM_REQUIRED_FLAGS {
            payload.insert(flag.to_string(), json!(true));
        }
        payload.insert("timeInTargetPercent".to_string(), json!(0.7));
        payload.insert("timeInTargetMinutes".to_string(), json!(1008));

        let mut period = CgmPeriod::default();
        period.populate(&Value::Object(payload)).unwrap();
        assert_eq!(period.time_in_target_percent, Some(0.7));
        assert_eq!(period.time_in_target_minutes, 1008);
        assert!(period.has_average_glucose);

        let exported = period.export();
        assert_eq!(exported["timeInTargetPercent"], json!(0.7));
        assert_eq!(exported["averageGlucose"]["value"], json!(0.0));
    }

    #[test]
    fn test_bgm_populate_defaults_missing_values() {
        let mut period = BgmPeriod::default();
        period
            .populate(&json!({ "hasTimeInLowPercent": true, "timeInLowPercent": 0.04 }))
            .unwrap();
        assert!(period.has_time_in_low_percent);
        assert_eq!(period.time_in_low_percent, 0.04);
        assert_eq!(period.total_records, 0);
        assert_eq!(period.export()["timeInLowPercent"], json!(0.04));
    }
}
