use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use crate::domain::{AngleTag, CorrectionMode, CorrectionScope, CorrectionSettings};
use crate::error::{Error, Result};

pub const STRENGTH_RANGE: (u8, u8) = (1, 100);
pub const LINE_PRESERVATION_RANGE: (u8, u8) = (0, 100);

/// Unvalidated settings as they arrive from a form, a CLI flag or a stored
/// record. Absent fields are filled from a base (defaults or current settings).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SettingsInput {
    pub mode: Option<String>,
    pub scope: Option<String>,
    #[serde(alias = "angleTag")]
    pub angle_tag: Option<String>,
    pub strength: Option<f64>,
    #[serde(alias = "linePreservation")]
    pub line_preservation: Option<f64>,
    #[serde(alias = "absoluteLineFidelity")]
    pub absolute_line_fidelity: Option<bool>,
}

/// Validate `input` over the default settings.
pub fn normalize(input: &SettingsInput) -> Result<CorrectionSettings> {
    normalize_over(&CorrectionSettings::default(), input)
}

/// Validate `input`, taking absent fields from `base`.
///
/// Percentages are rounded and clamped into range. Unknown labels for
/// mode, angle or scope fail with [`Error::InvalidSetting`] naming the field.
pub fn normalize_over(base: &CorrectionSettings, input: &SettingsInput) -> Result<CorrectionSettings> {
    Ok(CorrectionSettings {
        mode: parse_field("mode", input.mode.as_deref(), base.mode)?,
        scope: parse_field("scope", input.scope.as_deref(), base.scope)?,
        angle_tag: parse_field("angle_tag", input.angle_tag.as_deref(), base.angle_tag)?,
        strength: percent_field("strength", input.strength, STRENGTH_RANGE, base.strength)?,
        line_preservation: percent_field(
            "line_preservation",
            input.line_preservation,
            LINE_PRESERVATION_RANGE,
            base.line_preservation,
        )?,
        absolute_line_fidelity: input
            .absolute_line_fidelity
            .unwrap_or(base.absolute_line_fidelity),
    })
}

/// Rebuild settings from a stored JSON record without ever failing.
/// Each missing, mistyped or unknown field falls back to its default on its own,
/// so a record written by an older or newer schema keeps whatever still parses.
pub fn recover(record: &Value) -> CorrectionSettings {
    let defaults = CorrectionSettings::default();
    let Some(obj) = record.as_object() else {
        tracing::warn!("stored settings are not an object, using defaults");
        return defaults;
    };
    let field = |snake: &str, camel: &str| obj.get(snake).or_else(|| obj.get(camel));

    CorrectionSettings {
        mode: recover_label("mode", field("mode", "mode"), defaults.mode),
        scope: recover_label("scope", field("scope", "scope"), defaults.scope),
        angle_tag: recover_label("angle_tag", field("angle_tag", "angleTag"), defaults.angle_tag),
        strength: field("strength", "strength")
            .and_then(Value::as_f64)
            .and_then(|v| clamp_percent(v, STRENGTH_RANGE))
            .unwrap_or(defaults.strength),
        line_preservation: field("line_preservation", "linePreservation")
            .and_then(Value::as_f64)
            .and_then(|v| clamp_percent(v, LINE_PRESERVATION_RANGE))
            .unwrap_or(defaults.line_preservation),
        absolute_line_fidelity: field("absolute_line_fidelity", "absoluteLineFidelity")
            .and_then(Value::as_bool)
            .unwrap_or(defaults.absolute_line_fidelity),
    }
}

fn parse_field<T: FromStr>(field: &'static str, raw: Option<&str>, fallback: T) -> Result<T> {
    match raw {
        None => Ok(fallback),
        Some(s) => s.trim().parse().map_err(|_| Error::InvalidSetting {
            field,
            value: s.to_string(),
        }),
    }
}

fn percent_field(field: &'static str, raw: Option<f64>, range: (u8, u8), fallback: u8) -> Result<u8> {
    match raw {
        None => Ok(fallback),
        Some(v) => clamp_percent(v, range).ok_or_else(|| Error::InvalidSetting {
            field,
            value: v.to_string(),
        }),
    }
}

/// Round to an integral percentage and clamp into `range`. NaN and infinities are rejected.
fn clamp_percent(value: f64, (min, max): (u8, u8)) -> Option<u8> {
    value
        .is_finite()
        .then(|| value.round().clamp(f64::from(min), f64::from(max)) as u8)
}

fn recover_label<T: FromStr>(field: &str, raw: Option<&Value>, fallback: T) -> T {
    match raw {
        None => fallback,
        Some(value) => match value.as_str().map(str::parse::<T>) {
            Some(Ok(parsed)) => parsed,
            _ => {
                tracing::warn!(field, %value, "unrecognized stored setting, using default");
                fallback
            }
        },
    }
}

/// Parse the label of an angle tag; convenience for boundary layers.
pub fn parse_angle(raw: &str) -> Result<AngleTag> {
    parse_field("angle_tag", Some(raw), AngleTag::Generic)
}

/// Every accepted label, for help text at the boundary.
pub fn known_labels() -> (Vec<&'static str>, Vec<&'static str>, Vec<&'static str>) {
    (
        CorrectionMode::ALL.iter().map(|m| m.label()).collect(),
        AngleTag::ALL.iter().map(|a| a.label()).collect(),
        CorrectionScope::ALL.iter().map(|s| s.label()).collect(),
    )
}
