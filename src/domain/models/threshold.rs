//! Coverage thresholds and their validation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::ConfigError;

/// A gated coverage axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageAxis {
    Lines,
    Branches,
}

impl CoverageAxis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lines => "lines",
            Self::Branches => "branches",
        }
    }
}

impl fmt::Display for CoverageAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A threshold value as written in a config file, CLI flag or environment
/// variable: either a number or text that still has to be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdSetting {
    Percent(f64),
    Text(String),
}

impl From<f64> for ThresholdSetting {
    fn from(value: f64) -> Self {
        Self::Percent(value)
    }
}

impl From<&str> for ThresholdSetting {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Minimum percentage for one axis. `None` means the axis is not gated.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Threshold(Option<f64>);

impl Threshold {
    pub const DISABLED: Self = Self(None);

    /// Validate a percentage in `[0, 100]`.
    pub fn at(axis: CoverageAxis, pct: f64) -> Result<Self, ConfigError> {
        if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
            return Err(ConfigError::InvalidThreshold {
                axis: axis.as_str(),
                value: pct.to_string(),
            });
        }
        Ok(Self(Some(pct)))
    }

    /// Interpret a raw setting. Absent or blank text disables the axis.
    pub fn from_setting(
        axis: CoverageAxis,
        setting: Option<&ThresholdSetting>,
    ) -> Result<Self, ConfigError> {
        match setting {
            None => Ok(Self::DISABLED),
            Some(ThresholdSetting::Percent(pct)) => Self::at(axis, *pct),
            Some(ThresholdSetting::Text(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    return Ok(Self::DISABLED);
                }
                let pct = text.parse::<f64>().map_err(|_| ConfigError::InvalidThreshold {
                    axis: axis.as_str(),
                    value: text.to_string(),
                })?;
                Self::at(axis, pct).map_err(|_| ConfigError::InvalidThreshold {
                    axis: axis.as_str(),
                    value: text.to_string(),
                })
            }
        }
    }

    pub fn minimum(&self) -> Option<f64> {
        self.0
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }
}

/// Per-axis minimums for one run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ThresholdConfig {
    pub lines_min: Threshold,
    pub branches_min: Threshold,
}

impl ThresholdConfig {
    pub fn new(lines_min: Option<f64>, branches_min: Option<f64>) -> Result<Self, ConfigError> {
        Ok(Self {
            lines_min: lines_min
                .map(|pct| Threshold::at(CoverageAxis::Lines, pct))
                .transpose()?
                .unwrap_or_default(),
            branches_min: branches_min
                .map(|pct| Threshold::at(CoverageAxis::Branches, pct))
                .transpose()?
                .unwrap_or_default(),
        })
    }

    pub fn from_settings(
        lines_min: Option<&ThresholdSetting>,
        branches_min: Option<&ThresholdSetting>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            lines_min: Threshold::from_setting(CoverageAxis::Lines, lines_min)?,
            branches_min: Threshold::from_setting(CoverageAxis::Branches, branches_min)?,
        })
    }

    /// Both axes ungated.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_disabled(&self) -> bool {
        !self.lines_min.is_enabled() && !self.branches_min.is_enabled()
    }

    pub fn for_axis(&self, axis: CoverageAxis) -> Threshold {
        match axis {
            CoverageAxis::Lines => self.lines_min,
            CoverageAxis::Branches => self.branches_min,
        }
    }
}
