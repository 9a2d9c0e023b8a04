//! Structural contracts for every payload that enters or leaves the crate.
//!
//! Each grammar is a typed struct that refuses unknown keys. [`validate`]
//! deserializes a raw document into its grammar, reporting the path of the
//! first violation, then runs the grammar's semantic [`Schema::check`].

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schedule::{GetSchedule, PutSchedule, ScheduleBackup};
use crate::types::*;
use crate::{Error, Result};

/// A semantic violation found after the document parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub path: String,
    pub reason: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }

    fn within(self, prefix: &str) -> Self {
        let path = if self.path.is_empty() {
            prefix.to_string()
        } else {
            format!("{prefix}.{}", self.path)
        };
        Self { path, ..self }
    }
}

pub type Checked = std::result::Result<(), Violation>;

pub trait Schema: DeserializeOwned + Serialize {
    const NAME: &'static str;

    fn check(&self) -> Checked {
        Ok(())
    }
}

pub fn validate<S: Schema>(doc: &Value) -> Result<S> {
    let parsed: S = serde_path_to_error::deserialize(doc)
        .map_err(|e| Error::validation(S::NAME, e.path().to_string(), e.inner().to_string()))?;
    parsed
        .check()
        .map_err(|v| Error::validation(S::NAME, v.path, v.reason))?;
    Ok(parsed)
}

/// Re-serializes a validated document. Personal fields come back masked, so
/// this form is for diagnostics only.
pub fn normalized<S: Schema>(doc: &S) -> Result<Value> {
    Ok(serde_json::to_value(doc)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    FullConfig,
    LocationConfig,
    LocationStatus,
    SystemStatus,
    ZoneStatus,
    DhwStatus,
    GetSchedule,
    PutSchedule,
    ScheduleBackup,
    SystemModeRequest,
    HeatSetpointRequest,
    DhwStateRequest,
}

/// Validates `doc` against the grammar for `kind`, returning its normalized form.
pub fn validate_document(kind: SchemaKind, doc: &Value) -> Result<Value> {
    fn run<S: Schema>(doc: &Value) -> Result<Value> {
        normalized(&validate::<S>(doc)?)
    }
    match kind {
        SchemaKind::FullConfig => run::<FullConfig>(doc),
        SchemaKind::LocationConfig => run::<LocationConfig>(doc),
        SchemaKind::LocationStatus => run::<LocationStatus>(doc),
        SchemaKind::SystemStatus => run::<SystemStatus>(doc),
        SchemaKind::ZoneStatus => run::<ZoneStatus>(doc),
        SchemaKind::DhwStatus => run::<DhwStatus>(doc),
        SchemaKind::GetSchedule => run::<GetSchedule>(doc),
        SchemaKind::PutSchedule => run::<PutSchedule>(doc),
        SchemaKind::ScheduleBackup => run::<ScheduleBackup>(doc),
        SchemaKind::SystemModeRequest => run::<SystemModeRequest>(doc),
        SchemaKind::HeatSetpointRequest => run::<HeatSetpointRequest>(doc),
        SchemaKind::DhwStateRequest => run::<DhwStateRequest>(doc),
    }
}

fn check_each<T>(items: &[T], field: &str, f: impl Fn(&T) -> Checked) -> Checked {
    for (i, item) in items.iter().enumerate() {
        f(item).map_err(|v| v.within(&format!("{field}[{i}]")))?;
    }
    Ok(())
}

// -- Installation config (GET) --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TimeZone {
    pub time_zone_id: String,
    pub display_name: String,
    pub offset_minutes: i32,
    pub current_offset_minutes: i32,
    pub supports_daylight_saving: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LocationOwner {
    pub user_id: String,
    pub username: MaskedEmail,
    pub firstname: String,
    pub lastname: Masked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LocationInfo {
    pub location_id: LocationId,
    pub name: String,
    pub street_address: Masked,
    pub city: Masked,
    pub country: String,
    pub postcode: Masked,
    pub location_type: String,
    pub use_daylight_save_switching: bool,
    pub time_zone: TimeZone,
    pub location_owner: LocationOwner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GatewayInfo {
    pub gateway_id: GatewayId,
    pub mac: String,
    pub crc: Masked,
    pub is_wi_fi: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PermanentModeCapability {
    pub system_mode: SystemMode,
    pub can_be_permanent: bool,
    pub can_be_temporary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TemporaryModeCapability {
    pub system_mode: SystemMode,
    pub can_be_permanent: bool,
    pub can_be_temporary: bool,
    /// e.g. `"99.00:00:00"`
    pub max_duration: String,
    /// e.g. `"1.00:00:00"`
    pub timing_resolution: String,
    pub timing_mode: TimingMode,
}

/// An allowed system mode, in one of exactly two shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemModeCapability {
    Temporary(TemporaryModeCapability),
    Permanent(PermanentModeCapability),
}

impl SystemModeCapability {
    pub fn mode(&self) -> SystemMode {
        match self {
            SystemModeCapability::Temporary(c) => c.system_mode,
            SystemModeCapability::Permanent(c) => c.system_mode,
        }
    }

    pub fn can_be_temporary(&self) -> bool {
        matches!(self, SystemModeCapability::Temporary(_))
    }

    fn check(&self) -> Checked {
        match self {
            SystemModeCapability::Permanent(c) => {
                if !c.system_mode.is_permanent_only() {
                    return Err(Violation::new(
                        "systemMode",
                        format!("{} requires duration fields", c.system_mode),
                    ));
                }
                if !c.can_be_permanent || c.can_be_temporary {
                    return Err(Violation::new(
                        "canBeTemporary",
                        "permanent-only mode must be permanent and not temporary",
                    ));
                }
            }
            SystemModeCapability::Temporary(c) => {
                if c.system_mode.is_permanent_only() {
                    return Err(Violation::new(
                        "systemMode",
                        format!("{} cannot carry duration fields", c.system_mode),
                    ));
                }
                if !c.can_be_permanent || !c.can_be_temporary {
                    return Err(Violation::new(
                        "canBeTemporary",
                        "temporary mode must be both permanent and temporary",
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SetpointCapabilities {
    pub max_heat_setpoint: f64,
    pub min_heat_setpoint: f64,
    pub value_resolution: f64,
    pub can_control_heat: bool,
    pub can_control_cool: bool,
    pub allowed_setpoint_modes: Vec<ZoneMode>,
    pub max_duration: String,
    pub timing_resolution: TimingResolution,
}

impl SetpointCapabilities {
    pub fn allows(&self, celsius: f64) -> bool {
        (self.min_heat_setpoint..=self.max_heat_setpoint).contains(&celsius)
    }

    fn check(&self) -> Checked {
        let bounds = Setpoint::MIN..=Setpoint::MAX;
        if !bounds.contains(&self.min_heat_setpoint) {
            return Err(Violation::new("minHeatSetpoint", "outside 5.0..=35.0"));
        }
        if !bounds.contains(&self.max_heat_setpoint) {
            return Err(Violation::new("maxHeatSetpoint", "outside 5.0..=35.0"));
        }
        if self.min_heat_setpoint > self.max_heat_setpoint {
            return Err(Violation::new(
                "minHeatSetpoint",
                "greater than maxHeatSetpoint",
            ));
        }
        Ok(())
    }
}

fn check_switchpoint_bounds(min: u8, max: u8) -> Checked {
    if min > max {
        return Err(Violation::new(
            "minSwitchpointsPerDay",
            "greater than maxSwitchpointsPerDay",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScheduleCapabilities {
    pub max_switchpoints_per_day: u8,
    pub min_switchpoints_per_day: u8,
    pub timing_resolution: TimingResolution,
    pub setpoint_value_resolution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DhwScheduleCapabilities {
    pub max_switchpoints_per_day: u8,
    pub min_switchpoints_per_day: u8,
    pub timing_resolution: TimingResolution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DhwStateCapabilities {
    pub allowed_states: Vec<DhwState>,
    pub allowed_modes: Vec<ZoneMode>,
    pub max_duration: String,
    pub timing_resolution: TimingResolution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ZoneConfig {
    pub zone_id: ZoneId,
    pub model_type: ZoneModelType,
    pub name: String,
    pub setpoint_capabilities: SetpointCapabilities,
    pub schedule_capabilities: ScheduleCapabilities,
    pub zone_type: ZoneType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DhwConfig {
    pub dhw_id: DhwId,
    pub dhw_state_capabilities_response: DhwStateCapabilities,
    pub schedule_capabilities_response: DhwScheduleCapabilities,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SystemConfig {
    pub system_id: SystemId,
    pub model_type: SystemModelType,
    pub allowed_system_modes: Vec<SystemModeCapability>,
    pub zones: Vec<ZoneConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhw: Option<DhwConfig>,
}

/// The vendor never reports more zones than this per controller.
pub const MAX_ZONES: usize = 12;

impl Schema for SystemConfig {
    const NAME: &'static str = "control system config";

    fn check(&self) -> Checked {
        if self.zones.is_empty() || self.zones.len() > MAX_ZONES {
            return Err(Violation::new(
                "zones",
                format!("expected 1..={MAX_ZONES} zones, got {}", self.zones.len()),
            ));
        }
        check_each(&self.allowed_system_modes, "allowedSystemModes", |m| m.check())?;
        check_each(&self.zones, "zones", |z| {
            z.setpoint_capabilities
                .check()
                .map_err(|v| v.within("setpointCapabilities"))?;
            check_switchpoint_bounds(
                z.schedule_capabilities.min_switchpoints_per_day,
                z.schedule_capabilities.max_switchpoints_per_day,
            )
            .map_err(|v| v.within("scheduleCapabilities"))
        })?;
        if let Some(dhw) = &self.dhw {
            let caps = &dhw.schedule_capabilities_response;
            check_switchpoint_bounds(caps.min_switchpoints_per_day, caps.max_switchpoints_per_day)
                .map_err(|v| v.within("dhw.scheduleCapabilitiesResponse"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GatewayConfig {
    pub gateway_info: GatewayInfo,
    pub temperature_control_systems: Vec<SystemConfig>,
}

/// `location/{id}/installationInfo?includeTemperatureControlSystems=True`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LocationConfig {
    pub location_info: LocationInfo,
    pub gateways: Vec<GatewayConfig>,
}

impl Schema for LocationConfig {
    const NAME: &'static str = "location config";

    fn check(&self) -> Checked {
        check_each(&self.gateways, "gateways", |g| {
            check_each(&g.temperature_control_systems, "temperatureControlSystems", |s| {
                s.check()
            })
        })
    }
}

/// `location/installationInfo?userId=..&includeTemperatureControlSystems=True`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FullConfig(pub Vec<LocationConfig>);

impl Schema for FullConfig {
    const NAME: &'static str = "installation config";

    fn check(&self) -> Checked {
        for (i, loc) in self.0.iter().enumerate() {
            loc.check().map_err(|v| v.within(&format!("[{i}]")))?;
        }
        Ok(())
    }
}

// -- Status (GET) --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ActiveFault {
    pub fault_type: String,
    pub since: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TemperatureStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub is_available: bool,
}

impl TemperatureStatus {
    fn check(&self) -> Checked {
        if self.is_available && self.temperature.is_none() {
            return Err(Violation::new("temperature", "missing while available"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SetpointStatus {
    pub target_heat_temperature: f64,
    pub setpoint_mode: ZoneMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ZoneStatus {
    pub zone_id: ZoneId,
    pub name: String,
    pub temperature_status: TemperatureStatus,
    pub setpoint_status: SetpointStatus,
    pub active_faults: Vec<ActiveFault>,
}

impl Schema for ZoneStatus {
    const NAME: &'static str = "zone status";

    fn check(&self) -> Checked {
        self.temperature_status
            .check()
            .map_err(|v| v.within("temperatureStatus"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DhwStateStatus {
    pub state: DhwState,
    pub mode: ZoneMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DhwStatus {
    pub dhw_id: DhwId,
    pub temperature_status: TemperatureStatus,
    pub state_status: DhwStateStatus,
    pub active_faults: Vec<ActiveFault>,
}

impl Schema for DhwStatus {
    const NAME: &'static str = "dhw status";

    fn check(&self) -> Checked {
        self.temperature_status
            .check()
            .map_err(|v| v.within("temperatureStatus"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SystemModeStatus {
    pub mode: SystemMode,
    pub is_permanent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SystemStatus {
    pub system_id: SystemId,
    pub zones: Vec<ZoneStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhw: Option<DhwStatus>,
    pub active_faults: Vec<ActiveFault>,
    pub system_mode_status: SystemModeStatus,
}

impl Schema for SystemStatus {
    const NAME: &'static str = "control system status";

    fn check(&self) -> Checked {
        check_each(&self.zones, "zones", |z| z.check())?;
        if let Some(dhw) = &self.dhw {
            dhw.check().map_err(|v| v.within("dhw"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GatewayStatus {
    pub gateway_id: GatewayId,
    pub temperature_control_systems: Vec<SystemStatus>,
    pub active_faults: Vec<ActiveFault>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LocationStatus {
    pub location_id: LocationId,
    pub gateways: Vec<GatewayStatus>,
}

impl Schema for LocationStatus {
    const NAME: &'static str = "location status";

    fn check(&self) -> Checked {
        check_each(&self.gateways, "gateways", |g| {
            check_each(&g.temperature_control_systems, "temperatureControlSystems", |s| {
                s.check()
            })
        })
    }
}

// -- Requests (PUT) --

/// `temperatureControlSystem/{id}/mode`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct SystemModeRequest {
    pub system_mode: SystemMode,
    pub time_until: Option<String>,
    pub permanent: bool,
}

impl Schema for SystemModeRequest {
    const NAME: &'static str = "system mode request";

    fn check(&self) -> Checked {
        match (&self.time_until, self.permanent) {
            (None, true) => Ok(()),
            (Some(until), false) => check_api_time(until).map_err(|v| v.within("TimeUntil")),
            (None, false) => Err(Violation::new("TimeUntil", "temporary mode needs an end time")),
            (Some(_), true) => Err(Violation::new(
                "Permanent",
                "permanent mode cannot have an end time",
            )),
        }
    }
}

/// `temperatureZone/{id}/heatSetpoint`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HeatSetpointRequest {
    pub setpoint_mode: ZoneMode,
    pub heat_setpoint_value: f64,
    pub time_until: Option<String>,
}

impl Schema for HeatSetpointRequest {
    const NAME: &'static str = "heat setpoint request";

    fn check(&self) -> Checked {
        match self.setpoint_mode {
            ZoneMode::FollowSchedule => {}
            ZoneMode::PermanentOverride | ZoneMode::TemporaryOverride => {
                Setpoint::try_from(self.heat_setpoint_value)
                    .map_err(|e| Violation::new("heatSetpointValue", e))?;
            }
            other => {
                return Err(Violation::new(
                    "setpointMode",
                    format!("{other:?} cannot be requested"),
                ));
            }
        }
        match (&self.time_until, self.setpoint_mode) {
            (Some(until), ZoneMode::TemporaryOverride) => {
                check_api_time(until).map_err(|v| v.within("timeUntil"))
            }
            (None, ZoneMode::TemporaryOverride) => {
                Err(Violation::new("timeUntil", "temporary override needs an end time"))
            }
            (Some(_), _) => Err(Violation::new("timeUntil", "only temporary overrides end")),
            (None, _) => Ok(()),
        }
    }
}

/// `domesticHotWater/{id}/state`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DhwStateRequest {
    pub mode: ZoneMode,
    pub state: Option<DhwState>,
    pub until_time: Option<String>,
}

impl Schema for DhwStateRequest {
    const NAME: &'static str = "dhw state request";

    fn check(&self) -> Checked {
        match (self.mode, self.state, &self.until_time) {
            (ZoneMode::FollowSchedule, None, None) => Ok(()),
            (ZoneMode::PermanentOverride, Some(_), None) => Ok(()),
            (ZoneMode::TemporaryOverride, Some(_), Some(until)) => {
                check_api_time(until).map_err(|v| v.within("untilTime"))
            }
            (mode, _, _) => Err(Violation::new(
                "mode",
                format!("inconsistent state/untilTime for {mode:?}"),
            )),
        }
    }
}

fn check_api_time(s: &str) -> Checked {
    chrono::NaiveDateTime::parse_from_str(s, crate::protocol::API_TIME_FORMAT)
        .map(|_| ())
        .map_err(|_| Violation::new("", format!("{s:?} is not YYYY-MM-DDTHH:MM:SSZ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serializer;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Opaque;

    impl Serialize for Opaque {
        fn serialize<S: Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("opaque value"))
        }
    }

    impl Schema for Opaque {
        const NAME: &'static str = "opaque";
    }

    #[test]
    fn normalized_surfaces_serialization_failure() {
        let err = normalized(&Opaque).unwrap_err();
        assert!(matches!(err, Error::Json(_)), "{err:?}");
        assert!(err.to_string().contains("opaque value"), "{err}");
    }

    fn zone_config(id: &str, name: &str) -> Value {
        json!({
            "zoneId": id,
            "modelType": "HeatingZone",
            "name": name,
            "setpointCapabilities": {
                "maxHeatSetpoint": 35.0,
                "minHeatSetpoint": 5.0,
                "valueResolution": 0.5,
                "canControlHeat": true,
                "canControlCool": false,
                "allowedSetpointModes": ["PermanentOverride", "FollowSchedule", "TemporaryOverride"],
                "maxDuration": "1.00:00:00",
                "timingResolution": "00:10:00"
            },
            "scheduleCapabilities": {
                "maxSwitchpointsPerDay": 6,
                "minSwitchpointsPerDay": 1,
                "timingResolution": "00:10:00",
                "setpointValueResolution": 0.5
            },
            "zoneType": "RadiatorZone"
        })
    }

    fn system_config() -> Value {
        json!({
            "systemId": "1234567",
            "modelType": "EvoTouch",
            "allowedSystemModes": [
                {"systemMode": "Auto", "canBePermanent": true, "canBeTemporary": false},
                {
                    "systemMode": "Away", "canBePermanent": true, "canBeTemporary": true,
                    "maxDuration": "99.00:00:00", "timingResolution": "1.00:00:00",
                    "timingMode": "Period"
                }
            ],
            "zones": [zone_config("3432521", "Lounge")]
        })
    }

    #[test]
    fn accepts_minimal_system_config() {
        let cfg: SystemConfig = validate(&system_config()).unwrap();
        assert_eq!(cfg.zones.len(), 1);
        assert!(cfg.dhw.is_none());
        assert!(cfg.allowed_system_modes[1].can_be_temporary());
    }

    #[test]
    fn rejects_extra_fields_with_path() {
        let mut doc = system_config();
        doc["zones"][0]["colour"] = json!("red");
        let err = validate::<SystemConfig>(&doc).unwrap_err();
        match err {
            Error::Validation { path, reason, .. } => {
                assert!(path.starts_with("zones[0]"), "{path}");
                assert!(reason.contains("colour"), "{reason}");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_zone_id_shape() {
        let mut doc = system_config();
        doc["zones"][0]["zoneId"] = json!("zone-1");
        let err = validate::<SystemConfig>(&doc).unwrap_err();
        assert!(err.to_string().contains("zones[0].zoneId"), "{err}");
    }

    #[test]
    fn mode_capability_must_match_one_shape() {
        let mut doc = system_config();
        doc["allowedSystemModes"][1] = json!({
            "systemMode": "Away", "canBePermanent": true, "canBeTemporary": true,
            "maxDuration": "99.00:00:00", "timingMode": "Period"
        });
        assert!(validate::<SystemConfig>(&doc).is_err());

        let mut doc = system_config();
        doc["allowedSystemModes"][1]["timingMode"] = json!("Forever");
        assert!(validate::<SystemConfig>(&doc).is_err());

        let mut doc = system_config();
        doc["allowedSystemModes"][0]["systemMode"] = json!("Away");
        let err = validate::<SystemConfig>(&doc).unwrap_err();
        assert!(err.to_string().contains("allowedSystemModes[0]"), "{err}");
    }

    #[test]
    fn zone_count_is_bounded() {
        let mut doc = system_config();
        doc["zones"] = json!([]);
        assert!(validate::<SystemConfig>(&doc).is_err());

        let zones: Vec<Value> = (0..13)
            .map(|i| zone_config(&format!("100000{i:02}"), &format!("Zone {i}")))
            .collect();
        doc["zones"] = Value::Array(zones);
        let err = validate::<SystemConfig>(&doc).unwrap_err();
        assert!(err.to_string().contains("1..=12"), "{err}");
    }

    #[test]
    fn location_config_masks_personal_fields() {
        let doc = json!({
            "locationInfo": {
                "locationId": "2738909",
                "name": "My Home",
                "streetAddress": "1 High Street",
                "city": "London",
                "country": "UnitedKingdom",
                "postcode": "E1 1AA",
                "locationType": "Residential",
                "useDaylightSaveSwitching": true,
                "timeZone": {
                    "timeZoneId": "GMTStandardTime",
                    "displayName": "(UTC+00:00) Dublin, Edinburgh, Lisbon, London",
                    "offsetMinutes": 0,
                    "currentOffsetMinutes": 60,
                    "supportsDaylightSaving": true
                },
                "locationOwner": {
                    "userId": "2263181",
                    "username": "someone@example.com",
                    "firstname": "Sam",
                    "lastname": "Smith"
                }
            },
            "gateways": [{
                "gatewayInfo": {
                    "gatewayId": "2499896", "mac": "00D02DEE0000",
                    "crc": "1234", "isWiFi": false
                },
                "temperatureControlSystems": [system_config()]
            }]
        });
        let masked = validate_document(SchemaKind::LocationConfig, &doc).unwrap();
        let info = &masked["locationInfo"];
        assert_eq!(info["streetAddress"], MASKED_TEXT);
        assert_eq!(info["locationOwner"]["username"], MASKED_EMAIL);
        assert_eq!(info["locationOwner"]["lastname"], MASKED_TEXT);
        assert_eq!(info["locationOwner"]["firstname"], "Sam");
        assert_eq!(info["name"], "My Home");
    }

    #[test]
    fn available_zone_needs_temperature() {
        let doc = json!({
            "zoneId": "3432521",
            "name": "Lounge",
            "temperatureStatus": {"isAvailable": true},
            "setpointStatus": {"targetHeatTemperature": 21.0, "setpointMode": "FollowSchedule"},
            "activeFaults": []
        });
        let err = validate::<ZoneStatus>(&doc).unwrap_err();
        assert!(err.to_string().contains("temperatureStatus.temperature"), "{err}");
    }

    #[test]
    fn unavailable_zone_parses_without_temperature() {
        let doc = json!({
            "zoneId": "3432521",
            "name": "Lounge",
            "temperatureStatus": {"isAvailable": false},
            "setpointStatus": {
                "targetHeatTemperature": 21.0,
                "setpointMode": "TemporaryOverride",
                "until": "2023-10-30T18:40:00Z"
            },
            "activeFaults": [{"faultType": "TempZoneActuatorLowBattery", "since": "2023-10-01T10:00:00"}]
        });
        let status: ZoneStatus = validate(&doc).unwrap();
        assert!(status.temperature_status.temperature.is_none());
        assert!(status.setpoint_status.until.is_some());
        assert_eq!(status.active_faults.len(), 1);
    }

    #[test]
    fn system_mode_request_permanence_matches_end_time() {
        let ok = json!({"SystemMode": "Away", "TimeUntil": null, "Permanent": true});
        assert!(validate::<SystemModeRequest>(&ok).is_ok());
        let ok = json!({"SystemMode": "Away", "TimeUntil": "2024-01-01T00:00:00Z", "Permanent": false});
        assert!(validate::<SystemModeRequest>(&ok).is_ok());
        let bad = json!({"SystemMode": "Away", "TimeUntil": null, "Permanent": false});
        assert!(validate::<SystemModeRequest>(&bad).is_err());
        let bad = json!({"SystemMode": "Away", "TimeUntil": "tomorrow", "Permanent": false});
        assert!(validate::<SystemModeRequest>(&bad).is_err());
        let bad = json!({"SystemMode": "Sleep", "TimeUntil": null, "Permanent": true});
        assert!(validate::<SystemModeRequest>(&bad).is_err());
    }

    #[test]
    fn heat_setpoint_request_bounds() {
        let ok = json!({"setpointMode": "PermanentOverride", "heatSetpointValue": 35.0, "timeUntil": null});
        assert!(validate::<HeatSetpointRequest>(&ok).is_ok());
        let bad = json!({"setpointMode": "PermanentOverride", "heatSetpointValue": 36.0, "timeUntil": null});
        assert!(validate::<HeatSetpointRequest>(&bad).is_err());
        let cancel = json!({"setpointMode": "FollowSchedule", "heatSetpointValue": 0.0, "timeUntil": null});
        assert!(validate::<HeatSetpointRequest>(&cancel).is_ok());
    }
}
