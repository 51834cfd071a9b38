use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::coordinator::CoordinatorHandle;

pub const DOMAIN: &str = "flipr";
pub const NAME: &str = "Flipr";
pub const MANUFACTURER: &str = "CTAC-TECH";
pub const ATTRIBUTION: &str = "Flipr Data";

/// The five measurement fields a Flipr device reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Chlorine,
    Ph,
    Temperature,
    DateTime,
    RedOx,
}

impl SensorKind {
    pub const ALL: [SensorKind; 5] = [
        SensorKind::Chlorine,
        SensorKind::Ph,
        SensorKind::Temperature,
        SensorKind::DateTime,
        SensorKind::RedOx,
    ];

    /// Stable key used in unique ids.
    pub fn key(self) -> &'static str {
        match self {
            SensorKind::Chlorine => "chlorine",
            SensorKind::Ph => "ph",
            SensorKind::Temperature => "temperature",
            SensorKind::DateTime => "date_time",
            SensorKind::RedOx => "red_ox",
        }
    }

    pub fn description(self) -> &'static SensorDescription {
        match self {
            SensorKind::Chlorine => &CHLORINE,
            SensorKind::Ph => &PH,
            SensorKind::Temperature => &TEMPERATURE,
            SensorKind::DateTime => &DATE_TIME,
            SensorKind::RedOx => &RED_OX,
        }
    }
}

static CHLORINE: SensorDescription = SensorDescription {
    label: "Chlorine",
    unit: Some("mV"),
    icon: "mdi:pool",
    device_class: None,
};

static PH: SensorDescription = SensorDescription {
    label: "PH",
    unit: Some("ph"),
    icon: "mdi:pool",
    device_class: None,
};

static TEMPERATURE: SensorDescription = SensorDescription {
    label: "Water Temp",
    unit: Some("°C"),
    icon: "mdi:coolant-temperature",
    device_class: Some(DeviceClass::Temperature),
};

static DATE_TIME: SensorDescription = SensorDescription {
    label: "Date Measure",
    unit: None,
    icon: "mdi:clock",
    device_class: Some(DeviceClass::Timestamp),
};

static RED_OX: SensorDescription = SensorDescription {
    label: "Red OX",
    unit: Some("mV"),
    icon: "mdi:pool",
    device_class: None,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Temperature,
    Timestamp,
}

/// Static display metadata for one sensor kind.
#[derive(Debug, PartialEq, Eq)]
pub struct SensorDescription {
    pub label: &'static str,
    pub unit: Option<&'static str>,
    pub icon: &'static str,
    pub device_class: Option<DeviceClass>,
}

/// Value a sensor currently exposes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    Measure(f64),
    Timestamp(DateTime<Utc>),
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Measure(v) => write!(f, "{v}"),
            StateValue::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

/// Identifies the physical Flipr device every sensor belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: (&'static str, String),
    pub name: &'static str,
    pub manufacturer: &'static str,
}

/// Read-only sensor projecting one field of the coordinator's latest measure.
///
/// While the last poll failed the state reads as `None`; the stale measure
/// stays cached in the coordinator and reappears once a refresh succeeds.
pub struct FliprSensor {
    coordinator: CoordinatorHandle,
    flipr_id: String,
    kind: SensorKind,
}

impl FliprSensor {
    pub fn new(coordinator: CoordinatorHandle, flipr_id: &str, kind: SensorKind) -> Self {
        FliprSensor {
            coordinator,
            flipr_id: flipr_id.to_string(),
            kind,
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn unique_id(&self) -> String {
        format!("{}-{}", self.flipr_id, self.kind.key())
    }

    pub fn name(&self) -> String {
        format!("{} {} {}", NAME, self.flipr_id, self.kind.description().label)
    }

    pub fn state(&self) -> Option<StateValue> {
        if !self.available() {
            return None;
        }
        self.coordinator.data().map(|measure| match self.kind {
            SensorKind::Chlorine => StateValue::Measure(measure.chlorine),
            SensorKind::Ph => StateValue::Measure(measure.ph),
            SensorKind::Temperature => StateValue::Measure(measure.temperature),
            SensorKind::DateTime => StateValue::Timestamp(measure.date_time),
            SensorKind::RedOx => StateValue::Measure(measure.red_ox),
        })
    }

    pub fn available(&self) -> bool {
        self.coordinator.last_update_success() && self.coordinator.data().is_some()
    }

    pub fn unit_of_measurement(&self) -> Option<&'static str> {
        self.kind.description().unit
    }

    pub fn icon(&self) -> &'static str {
        self.kind.description().icon
    }

    pub fn device_class(&self) -> Option<DeviceClass> {
        self.kind.description().device_class
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            identifiers: (DOMAIN, self.flipr_id.clone()),
            name: NAME,
            manufacturer: MANUFACTURER,
        }
    }

    pub fn attribution(&self) -> &'static str {
        ATTRIBUTION
    }
}

/// Build the full sensor set for one device.
pub fn setup_sensors(coordinator: &CoordinatorHandle, flipr_id: &str) -> Vec<FliprSensor> {
    SensorKind::ALL
        .iter()
        .map(|kind| FliprSensor::new(coordinator.clone(), flipr_id, *kind))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FliprError, PoolMeasure};
    use crate::coordinator::FliprCoordinator;
    use chrono::TimeZone;

    fn measure() -> PoolMeasure {
        PoolMeasure {
            chlorine: 0.32,
            ph: 7.01,
            temperature: 10.5,
            date_time: Utc.with_ymd_and_hms(2021, 2, 15, 9, 10, 32).unwrap(),
            red_ox: 657.58,
        }
    }

    fn refreshed_handle() -> CoordinatorHandle {
        let m = measure();
        let mut coordinator =
            FliprCoordinator::new("AB256C", move || Ok::<_, FliprError>(m.clone()));
        coordinator.first_refresh().unwrap();
        coordinator.handle()
    }

    #[test]
    fn metadata_table_matches_sensor_kinds() {
        let temp = SensorKind::Temperature.description();
        assert_eq!(temp.unit, Some("°C"));
        assert_eq!(temp.icon, "mdi:coolant-temperature");
        assert_eq!(temp.device_class, Some(DeviceClass::Temperature));

        let date = SensorKind::DateTime.description();
        assert_eq!(date.unit, None);
        assert_eq!(date.icon, "mdi:clock");
        assert_eq!(date.device_class, Some(DeviceClass::Timestamp));

        for kind in [SensorKind::Chlorine, SensorKind::RedOx] {
            let desc = kind.description();
            assert_eq!(desc.unit, Some("mV"));
            assert_eq!(desc.icon, "mdi:pool");
            assert_eq!(desc.device_class, None);
        }

        assert_eq!(SensorKind::Ph.description().unit, Some("ph"));
    }

    #[test]
    fn state_projects_fields_of_the_latest_measure() {
        let sensors = setup_sensors(&refreshed_handle(), "AB256C");
        assert_eq!(sensors.len(), 5);

        for sensor in &sensors {
            let expected = match sensor.kind() {
                SensorKind::Chlorine => StateValue::Measure(0.32),
                SensorKind::Ph => StateValue::Measure(7.01),
                SensorKind::Temperature => StateValue::Measure(10.5),
                SensorKind::DateTime => StateValue::Timestamp(measure().date_time),
                SensorKind::RedOx => StateValue::Measure(657.58),
            };
            assert_eq!(sensor.state(), Some(expected));
            assert!(sensor.available());
        }
    }

    #[test]
    fn sensors_carry_device_identity() {
        let sensor = FliprSensor::new(refreshed_handle(), "AB256C", SensorKind::RedOx);

        assert_eq!(sensor.unique_id(), "AB256C-red_ox");
        assert_eq!(sensor.name(), "Flipr AB256C Red OX");
        assert_eq!(sensor.attribution(), ATTRIBUTION);

        let info = sensor.device_info();
        assert_eq!(info.identifiers, (DOMAIN, "AB256C".to_string()));
        assert_eq!(info.manufacturer, MANUFACTURER);
    }

    #[test]
    fn sensor_is_unavailable_before_first_refresh() {
        let coordinator = FliprCoordinator::new("AB256C", || Ok::<_, FliprError>(measure()));
        let sensor = FliprSensor::new(coordinator.handle(), "AB256C", SensorKind::Ph);

        assert_eq!(sensor.state(), None);
        assert!(!sensor.available());
    }

    #[test]
    fn state_is_masked_while_updates_fail() {
        use std::time::Duration;

        let mut polls = 0u32;
        let source = move || {
            polls += 1;
            if polls == 1 {
                Ok(measure())
            } else {
                Err(FliprError::Auth("token expired".into()))
            }
        };
        let mut coordinator =
            FliprCoordinator::with_interval("AB256C", source, Duration::from_millis(5));
        coordinator.first_refresh().unwrap();

        let sensor = FliprSensor::new(coordinator.handle(), "AB256C", SensorKind::Ph);
        assert_eq!(sensor.state(), Some(StateValue::Measure(7.01)));

        coordinator.start();
        for _ in 0..1000 {
            if !sensor.available() {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }

        assert!(!sensor.available());
        assert_eq!(sensor.state(), None);
        // The measure itself stays cached for the next successful refresh.
        assert_eq!(coordinator.handle().data(), Some(measure()));

        coordinator.shutdown();
    }
}
