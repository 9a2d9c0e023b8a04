//! Client for the older session-based API.
//!
//! Writes here are asynchronous on the server: each returns a comm-task id
//! that is polled under the client's [`RetryPolicy`] before the call returns.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info};

use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{self, HotWaterOverride};
use crate::task::{self, RetryPolicy};
use crate::transport::Transport;
use crate::types::*;
use crate::{Error, Result};

const LEGACY_SCHEMA: &str = "legacy location";

fn id_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected an id, got {other}"))),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyHeatSetpoint {
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyChangeableValues {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub heat_setpoint: Option<LegacyHeatSetpoint>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyThermostat {
    #[serde(default)]
    pub indoor_temperature: Option<f64>,
    #[serde(default)]
    pub allowed_modes: Vec<String>,
    pub changeable_values: LegacyChangeableValues,
}

/// A zone or hot water device as listed under a legacy location.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyDevice {
    #[serde(rename = "deviceID", deserialize_with = "id_string")]
    pub device_id: String,
    pub name: String,
    pub thermostat_model_type: ThermostatKind,
    pub thermostat: LegacyThermostat,
}

#[derive(Debug, Clone, Deserialize)]
struct LegacyLocation {
    #[serde(rename = "locationID", deserialize_with = "id_string")]
    location_id: String,
    devices: Vec<LegacyDevice>,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    #[serde(rename = "userID", deserialize_with = "id_string")]
    user_id: String,
}

fn parse<D: serde::de::DeserializeOwned>(doc: &Value) -> Result<D> {
    serde_path_to_error::deserialize(doc)
        .map_err(|e| Error::validation(LEGACY_SCHEMA, e.path().to_string(), e.inner().to_string()))
}

struct LegacyData {
    location_id: String,
    devices: Vec<LegacyDevice>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl LegacyData {
    fn new(location: LegacyLocation) -> Self {
        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();
        for (idx, dev) in location.devices.iter().enumerate() {
            by_id.insert(dev.device_id.clone(), idx);
            by_name.insert(dev.name.clone(), idx);
        }
        Self {
            location_id: location.location_id,
            devices: location.devices,
            by_id,
            by_name,
        }
    }

    fn device(&self, zone: &ZoneRef) -> Result<&LegacyDevice> {
        let idx = match zone {
            ZoneRef::ByName(name) => self.by_name.get(name),
            ZoneRef::ById(id) => self.by_id.get(id),
        };
        idx.map(|&i| &self.devices[i])
            .ok_or_else(|| Error::Lookup(format!("{zone} in location {}", self.location_id)))
    }

    fn hotwater(&self) -> Result<&LegacyDevice> {
        self.devices
            .iter()
            .find(|d| d.thermostat_model_type == ThermostatKind::DomesticHotWater)
            .ok_or_else(|| Error::Lookup(format!("hot water in location {}", self.location_id)))
    }
}

pub struct LegacyClientBuilder<T> {
    transport: T,
    retry: RetryPolicy,
    log_mode: Option<MessageLogMode>,
    log_path: Option<PathBuf>,
}

impl<T: Transport> LegacyClientBuilder<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            log_mode: None,
            log_path: None,
        }
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Requests and commands only; legacy responses carry unmasked personal data.
    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<PathBuf>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<LegacyClient<T>> {
        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, path)?),
            _ => None,
        };
        Ok(LegacyClient {
            transport: self.transport,
            retry: self.retry,
            logger,
            data: None,
        })
    }
}

pub struct LegacyClient<T> {
    transport: T,
    retry: RetryPolicy,
    logger: Option<MessageLogger>,
    data: Option<LegacyData>,
}

impl<T: Transport> LegacyClient<T> {
    pub fn builder(transport: T) -> LegacyClientBuilder<T> {
        LegacyClientBuilder::new(transport)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn get_logged(&mut self, path: &str) -> Result<Value> {
        if let Some(ref mut logger) = self.logger {
            logger.log_request("GET", path, None);
        }
        self.transport.get(path).await
    }

    /// Loads the account's first location and indexes its devices.
    async fn populate(&mut self, force_refresh: bool) -> Result<&LegacyData> {
        if self.data.is_none() || force_refresh {
            let account: AccountInfo = parse(&self.get_logged(protocol::legacy_account()).await?)?;
            let raw = self
                .get_logged(&protocol::legacy_locations(&account.user_id))
                .await?;
            let mut locations: Vec<LegacyLocation> = parse(&raw)?;
            if locations.is_empty() {
                return Err(Error::Lookup(format!("no locations for user {}", account.user_id)));
            }
            let data = LegacyData::new(locations.swap_remove(0));
            debug!(
                location_id = %data.location_id,
                devices = data.devices.len(),
                "loaded legacy location"
            );
            self.data = Some(data);
        }
        self.data
            .as_ref()
            .ok_or_else(|| Error::Lookup("legacy location not loaded".into()))
    }

    pub async fn devices(&mut self) -> Result<&[LegacyDevice]> {
        Ok(&self.populate(false).await?.devices)
    }

    /// Current temperature and setpoint of every device. Setpoints default
    /// to 0.0 when the device reports none.
    pub async fn temperatures(&mut self, force_refresh: bool) -> Result<Vec<TemperatureReport>> {
        let data = self.populate(force_refresh).await?;
        Ok(data
            .devices
            .iter()
            .map(|d| TemperatureReport {
                thermostat: d.thermostat_model_type,
                id: d.device_id.clone(),
                name: d.name.clone(),
                temp: d.thermostat.indoor_temperature,
                setpoint: Some(
                    d.thermostat
                        .changeable_values
                        .heat_setpoint
                        .as_ref()
                        .and_then(|h| h.value)
                        .unwrap_or(0.0),
                ),
            })
            .collect())
    }

    pub async fn get_modes(&mut self, zone: &ZoneRef) -> Result<Vec<String>> {
        let data = self.populate(false).await?;
        Ok(data.device(zone)?.thermostat.allowed_modes.clone())
    }

    /// Submits a write and waits for its comm task to succeed.
    async fn write_and_wait(
        &mut self,
        action: &str,
        target: &str,
        path: &str,
        body: &Value,
    ) -> Result<()> {
        if let Some(ref mut logger) = self.logger {
            logger.log_command(action, Some(target), body);
            logger.log_request("PUT", path, Some(body));
        }
        let resp = self.transport.put(path, body).await?;
        let task_id = task::task_id(&resp)?;
        debug!(action, task_id = %task_id, "waiting for comm task");
        task::wait_for_task(&self.transport, &task_id, &self.retry).await
    }

    // -- System mode --

    /// `until` is a date; the mode ends at midnight UTC of that day.
    pub async fn set_status(&mut self, mode: SystemMode, until: Option<NaiveDate>) -> Result<()> {
        let location_id = self.populate(false).await?.location_id.clone();
        let body = protocol::legacy_quick_action_body(mode, until);
        info!(
            location_id = %location_id,
            mode = %mode,
            until = ?until,
            "setting legacy system mode"
        );
        self.write_and_wait(
            "set_status",
            &location_id,
            &protocol::legacy_system_mode(&location_id),
            &body,
        )
        .await
    }

    pub async fn set_status_normal(&mut self) -> Result<()> {
        self.set_status(SystemMode::Auto, None).await
    }

    pub async fn set_status_custom(&mut self, until: Option<NaiveDate>) -> Result<()> {
        self.set_status(SystemMode::Custom, until).await
    }

    pub async fn set_status_eco(&mut self, until: Option<NaiveDate>) -> Result<()> {
        self.set_status(SystemMode::AutoWithEco, until).await
    }

    pub async fn set_status_away(&mut self, until: Option<NaiveDate>) -> Result<()> {
        self.set_status(SystemMode::Away, until).await
    }

    pub async fn set_status_dayoff(&mut self, until: Option<NaiveDate>) -> Result<()> {
        self.set_status(SystemMode::DayOff, until).await
    }

    pub async fn set_status_heatingoff(&mut self, until: Option<NaiveDate>) -> Result<()> {
        self.set_status(SystemMode::HeatingOff, until).await
    }

    // -- Zones --

    async fn device_id(&mut self, zone: &ZoneRef) -> Result<String> {
        Ok(self.populate(false).await?.device(zone)?.device_id.clone())
    }

    /// Holds `zone` at `celsius`, indefinitely or until `until`.
    pub async fn set_temperature(
        &mut self,
        zone: &ZoneRef,
        celsius: f64,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let setpoint = Setpoint::try_from(celsius)
            .map_err(|e| Error::validation("legacy heat setpoint", "Value", e))?;
        let device_id = self.device_id(zone).await?;
        let body = protocol::legacy_heat_setpoint_body(setpoint, until.as_ref());
        info!(
            device_id = %device_id,
            setpoint = %setpoint,
            until = ?until,
            "setting legacy setpoint"
        );
        self.write_and_wait(
            "set_temperature",
            &device_id,
            &protocol::legacy_heat_setpoint(&device_id),
            &body,
        )
        .await
    }

    pub async fn cancel_temp_override(&mut self, zone: &ZoneRef) -> Result<()> {
        let device_id = self.device_id(zone).await?;
        info!(device_id = %device_id, "cancelling legacy override");
        self.write_and_wait(
            "cancel_temp_override",
            &device_id,
            &protocol::legacy_heat_setpoint(&device_id),
            &protocol::legacy_cancel_override_body(),
        )
        .await
    }

    // -- Hot water --

    async fn set_dhw(
        &mut self,
        over: HotWaterOverride,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let device_id = self.populate(false).await?.hotwater()?.device_id.clone();
        let body = protocol::legacy_dhw_body(over, until.as_ref());
        info!(device_id = %device_id, state = ?over, until = ?until, "setting legacy hot water");
        self.write_and_wait(
            "set_dhw",
            &device_id,
            &protocol::legacy_changeable_values(&device_id),
            &body,
        )
        .await
    }

    pub async fn set_dhw_on(&mut self, until: Option<DateTime<Utc>>) -> Result<()> {
        self.set_dhw(HotWaterOverride::On, until).await
    }

    pub async fn set_dhw_off(&mut self, until: Option<DateTime<Utc>>) -> Result<()> {
        self.set_dhw(HotWaterOverride::Off, until).await
    }

    /// Hot water follows its schedule again.
    pub async fn set_dhw_auto(&mut self) -> Result<()> {
        self.set_dhw(HotWaterOverride::Auto, None).await
    }
}
