use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};

use crate::schedule::ScheduleKind;
use crate::types::*;

/// Timestamp format the vendor accepts for end times.
pub const API_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Legacy quick actions end at midnight of the given day.
pub const LEGACY_DATE_FORMAT: &str = "%Y-%m-%dT00:00:00Z";

pub const REST_BASE_URL: &str = "https://tccna.honeywell.com/WebAPI/emea/api/v1";
pub const REST_AUTH_URL: &str = "https://tccna.honeywell.com/Auth/OAuth/Token";
pub const REST_AUTH_SCOPE: &str =
    "EMEA-V1-Basic EMEA-V1-Anonymous EMEA-V1-Get-Current-User-Account";
pub const REST_APP_CREDENTIAL: &str = "Basic NGEyMzEwODktZDJiNi00MWJkLWE1ZWItMTZhMGE0MjJiOTk5OjFhMTVjZGI4LTQyZGUtNDA3Yi1hZGQwLTA1OWY5MmM1MzBjYg==";

pub const LEGACY_BASE_URL: &str = "https://tccna.honeywell.com/WebAPI/api";
pub const LEGACY_APPLICATION_ID: &str = "91db1612-73fd-4500-91b2-e63b069b185c";

/// Comm-task state that ends legacy polling.
pub const TASK_SUCCEEDED: &str = "Succeeded";

pub fn api_time(t: &DateTime<Utc>) -> String {
    t.format(API_TIME_FORMAT).to_string()
}

// -- REST paths --

pub fn user_account() -> &'static str {
    "userAccount"
}

pub fn installation(user_id: &str) -> String {
    format!("location/installationInfo?userId={user_id}&includeTemperatureControlSystems=True")
}

pub fn location_status(id: &LocationId) -> String {
    format!("location/{id}/status?includeTemperatureControlSystems=True")
}

pub fn system_status(id: &SystemId) -> String {
    format!("temperatureControlSystem/{id}/status")
}

pub fn system_mode(id: &SystemId) -> String {
    format!("temperatureControlSystem/{id}/mode")
}

pub fn zone_setpoint(id: &ZoneId) -> String {
    format!("temperatureZone/{id}/heatSetpoint")
}

pub fn dhw_state(id: &DhwId) -> String {
    format!("domesticHotWater/{id}/state")
}

pub fn schedule(kind: ScheduleKind, id: &str) -> String {
    let entity = match kind {
        ScheduleKind::Zone => "temperatureZone",
        ScheduleKind::HotWater => "domesticHotWater",
    };
    format!("{entity}/{id}/schedule")
}

// -- REST bodies --

/// Without an end time the mode is permanent and `TimeUntil` is null.
pub fn system_mode_body(mode: SystemMode, until: Option<&DateTime<Utc>>) -> Value {
    json!({
        "SystemMode": mode.as_str(),
        "TimeUntil": until.map(api_time),
        "Permanent": until.is_none(),
    })
}

pub fn zone_override_body(setpoint: Setpoint, until: Option<&DateTime<Utc>>) -> Value {
    let mode = if until.is_some() {
        "TemporaryOverride"
    } else {
        "PermanentOverride"
    };
    json!({
        "setpointMode": mode,
        "heatSetpointValue": setpoint.celsius(),
        "timeUntil": until.map(api_time),
    })
}

pub fn zone_follow_schedule_body() -> Value {
    json!({
        "setpointMode": "FollowSchedule",
        "heatSetpointValue": 0.0,
        "timeUntil": null,
    })
}

/// `None` state returns hot water to its schedule.
pub fn dhw_state_body(state: Option<DhwState>, until: Option<&DateTime<Utc>>) -> Value {
    let mode = match (state, until) {
        (None, _) => "FollowSchedule",
        (Some(_), None) => "PermanentOverride",
        (Some(_), Some(_)) => "TemporaryOverride",
    };
    json!({
        "mode": mode,
        "state": state,
        "untilTime": state.and(until).map(api_time),
    })
}

// -- Legacy paths and bodies --

pub fn legacy_session() -> &'static str {
    "Session"
}

pub fn legacy_session_body(username: &str, password: &str) -> Value {
    json!({
        "Username": username,
        "Password": password,
        "ApplicationId": LEGACY_APPLICATION_ID,
    })
}

pub fn legacy_account() -> &'static str {
    "accountInfo"
}

pub fn legacy_locations(user_id: &str) -> String {
    format!("locations?userId={user_id}&allData=True")
}

pub fn legacy_system_mode(location_id: &str) -> String {
    format!("evoTouchSystems?locationId={location_id}")
}

pub fn legacy_heat_setpoint(device_id: &str) -> String {
    format!("devices/{device_id}/thermostat/changeableValues/heatSetpoint")
}

pub fn legacy_changeable_values(device_id: &str) -> String {
    format!("devices/{device_id}/thermostat/changeableValues")
}

pub fn legacy_comm_task(task_id: &str) -> String {
    format!("commTasks?commTaskId={task_id}")
}

pub fn legacy_quick_action_body(mode: SystemMode, until: Option<NaiveDate>) -> Value {
    json!({
        "QuickAction": mode.as_str(),
        "QuickActionNextTime": until.map(|d| d.format(LEGACY_DATE_FORMAT).to_string()),
    })
}

pub fn legacy_heat_setpoint_body(setpoint: Setpoint, until: Option<&DateTime<Utc>>) -> Value {
    let status = if until.is_some() { "Temporary" } else { "Hold" };
    json!({
        "Value": setpoint.celsius(),
        "Status": status,
        "NextTime": until.map(api_time),
    })
}

pub fn legacy_cancel_override_body() -> Value {
    json!({
        "Value": null,
        "Status": "Scheduled",
        "NextTime": null,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotWaterOverride {
    On,
    Off,
    /// Follow the schedule.
    Auto,
}

pub fn legacy_dhw_body(over: HotWaterOverride, until: Option<&DateTime<Utc>>) -> Value {
    let (status, mode) = match over {
        HotWaterOverride::On => ("Hold", Some("DHWOn")),
        HotWaterOverride::Off => ("Hold", Some("DHWOff")),
        HotWaterOverride::Auto => ("Scheduled", None),
    };
    json!({
        "Status": status,
        "Mode": mode,
        "NextTime": mode.and(until).map(api_time),
        "SpecialModes": null,
        "HeatSetpoint": null,
        "CoolSetpoint": null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 12, 30, 0).unwrap()
    }

    #[test]
    fn permanent_mode_has_null_end_time() {
        let body = system_mode_body(SystemMode::Away, None);
        assert_eq!(body["SystemMode"], "Away");
        assert_eq!(body["Permanent"], true);
        assert!(body["TimeUntil"].is_null());
    }

    #[test]
    fn temporary_mode_formats_end_time() {
        let body = system_mode_body(SystemMode::AutoWithEco, Some(&noon()));
        assert_eq!(body["Permanent"], false);
        assert_eq!(body["TimeUntil"], "2024-03-09T12:30:00Z");
    }

    #[test]
    fn rest_paths() {
        let sys = SystemId::try_from("1234567").unwrap();
        assert_eq!(system_mode(&sys), "temperatureControlSystem/1234567/mode");
        assert_eq!(
            schedule(ScheduleKind::HotWater, "3933910"),
            "domesticHotWater/3933910/schedule"
        );
        assert!(installation("42").contains("userId=42"));
    }

    #[test]
    fn zone_override_modes() {
        let sp = Setpoint::try_from(21.5).unwrap();
        let held = zone_override_body(sp, None);
        assert_eq!(held["setpointMode"], "PermanentOverride");
        assert_eq!(held["heatSetpointValue"], 21.5);
        assert!(held["timeUntil"].is_null());

        let temp = zone_override_body(sp, Some(&noon()));
        assert_eq!(temp["setpointMode"], "TemporaryOverride");
        assert_eq!(temp["timeUntil"], "2024-03-09T12:30:00Z");

        assert_eq!(zone_follow_schedule_body()["setpointMode"], "FollowSchedule");
    }

    #[test]
    fn dhw_reset_ignores_end_time() {
        let body = dhw_state_body(None, Some(&noon()));
        assert_eq!(body["mode"], "FollowSchedule");
        assert!(body["state"].is_null());
        assert!(body["untilTime"].is_null());

        let on = dhw_state_body(Some(DhwState::On), None);
        assert_eq!(on["mode"], "PermanentOverride");
        assert_eq!(on["state"], "On");
    }

    #[test]
    fn quick_action_uses_date_only() {
        let day = NaiveDate::from_ymd_opt(2024, 12, 25).unwrap();
        let body = legacy_quick_action_body(SystemMode::DayOff, Some(day));
        assert_eq!(body["QuickAction"], "DayOff");
        assert_eq!(body["QuickActionNextTime"], "2024-12-25T00:00:00Z");
        assert!(legacy_quick_action_body(SystemMode::Auto, None)["QuickActionNextTime"].is_null());
    }

    #[test]
    fn legacy_heat_setpoint_statuses() {
        let sp = Setpoint::try_from(19.0).unwrap();
        assert_eq!(legacy_heat_setpoint_body(sp, None)["Status"], "Hold");
        let temp = legacy_heat_setpoint_body(sp, Some(&noon()));
        assert_eq!(temp["Status"], "Temporary");
        assert_eq!(temp["NextTime"], "2024-03-09T12:30:00Z");

        let cancel = legacy_cancel_override_body();
        assert!(cancel["Value"].is_null());
        assert_eq!(cancel["Status"], "Scheduled");
    }

    #[test]
    fn legacy_dhw_shapes() {
        let on = legacy_dhw_body(HotWaterOverride::On, Some(&noon()));
        assert_eq!(on["Status"], "Hold");
        assert_eq!(on["Mode"], "DHWOn");
        assert_eq!(on["NextTime"], "2024-03-09T12:30:00Z");
        assert!(on["SpecialModes"].is_null());

        let auto = legacy_dhw_body(HotWaterOverride::Auto, Some(&noon()));
        assert_eq!(auto["Status"], "Scheduled");
        assert!(auto["Mode"].is_null());
        assert!(auto["NextTime"].is_null());
    }
}
