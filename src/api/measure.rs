use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest pool measurement for one Flipr device, flattened from the cloud
/// survey payload. Refreshed wholesale on every poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolMeasure {
    /// Disinfectant level in mV.
    pub chlorine: f64,
    pub ph: f64,
    /// Water temperature in °C.
    pub temperature: f64,
    /// When the probe took the measurement (UTC).
    pub date_time: DateTime<Utc>,
    /// Redox potential in mV.
    pub red_ox: f64,
}

/// Raw `GET /modules/{id}/survey/last` payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SurveyPayload {
    date_time: DateTime<Utc>,
    temperature: f64,
    #[serde(rename = "PH")]
    ph: SurveyValue,
    oxydo_reduction_potentiel: SurveyValue,
    desinfectant: SurveyValue,
}

/// Probe readings come wrapped in an object carrying label/deviation
/// metadata; only the value itself is kept.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SurveyValue {
    value: f64,
}

impl From<SurveyPayload> for PoolMeasure {
    fn from(raw: SurveyPayload) -> Self {
        PoolMeasure {
            chlorine: raw.desinfectant.value,
            ph: raw.ph.value,
            temperature: raw.temperature,
            date_time: raw.date_time,
            red_ox: raw.oxydo_reduction_potentiel.value,
        }
    }
}
