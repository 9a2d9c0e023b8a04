use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::installation::{ControlSystem, HotWater, Location};
use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol;
use crate::schedule::{GetSchedule, PutSchedule, ScheduleBackup, ScheduleKind};
use crate::schema::{
    self, DhwStateRequest, FullConfig, HeatSetpointRequest, LocationStatus, Schema,
    SystemModeRequest, SystemStatus,
};
use crate::transport::Transport;
use crate::types::*;
use crate::{Error, Result};

pub struct EvohomeClientBuilder<T> {
    transport: T,
    log_mode: Option<MessageLogMode>,
    log_path: Option<PathBuf>,
}

impl<T: Transport> EvohomeClientBuilder<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            log_mode: None,
            log_path: None,
        }
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<PathBuf>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<EvohomeClient<T>> {
        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, path)?),
            _ => None,
        };
        Ok(EvohomeClient {
            transport: self.transport,
            user_id: None,
            locations: Vec::new(),
            logger,
        })
    }
}

/// A schedule target resolved against the graph, ready for a request.
struct ScheduleTarget {
    kind: ScheduleKind,
    id: String,
    name: String,
    min_switchpoints: u8,
    max_switchpoints: u8,
}

/// Client for the REST API. Writes complete with the HTTP response.
pub struct EvohomeClient<T> {
    transport: T,
    user_id: Option<String>,
    locations: Vec<Location>,
    logger: Option<MessageLogger>,
}

impl<T: Transport> EvohomeClient<T> {
    pub fn builder(transport: T) -> EvohomeClientBuilder<T> {
        EvohomeClientBuilder::new(transport)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // -- Discovery --

    /// Fetches the account's user id. Cached after the first call.
    pub async fn user_id(&mut self) -> Result<String> {
        if let Some(id) = &self.user_id {
            return Ok(id.clone());
        }
        let path = protocol::user_account();
        self.log_request("GET", path, None);
        let account = self.transport.get(path).await?;
        let id = match account.get("userId") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(Error::validation("user account", "userId", "missing")),
        };
        debug!(user_id = %id, "resolved user account");
        self.user_id = Some(id.clone());
        Ok(id)
    }

    /// Fetches and builds the whole installation, replacing any earlier one.
    pub async fn installation(&mut self) -> Result<&[Location]> {
        let user_id = self.user_id().await?;
        let config: FullConfig = self.get_validated(&protocol::installation(&user_id)).await?;
        let locations = config
            .0
            .iter()
            .map(Location::build)
            .collect::<Result<Vec<_>>>()?;
        info!(locations = locations.len(), "installation loaded");
        self.locations = locations;
        Ok(&self.locations)
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn location(&self, id: &LocationId) -> Result<&Location> {
        self.locations
            .iter()
            .find(|l| &l.id == id)
            .ok_or_else(|| Error::Lookup(format!("location {id}")))
    }

    pub fn control_system(&self, id: &SystemId) -> Result<&ControlSystem> {
        self.locations
            .iter()
            .flat_map(Location::control_systems)
            .find(|s| &s.id == id)
            .ok_or_else(|| Error::Lookup(format!("control system {id}")))
    }

    /// The only control system of a single-system installation.
    pub fn single_system(&self) -> Result<&ControlSystem> {
        let mut systems = self.locations.iter().flat_map(Location::control_systems);
        match (systems.next(), systems.next()) {
            (Some(sys), None) => Ok(sys),
            (None, _) => Err(Error::Lookup("installation has no control system".into())),
            (Some(_), Some(_)) => Err(Error::Lookup(
                "installation has more than one control system".into(),
            )),
        }
    }

    fn control_system_mut(&mut self, id: &SystemId) -> Result<&mut ControlSystem> {
        self.locations
            .iter_mut()
            .find_map(|l| l.control_system_mut(id))
            .ok_or_else(|| Error::Lookup(format!("control system {id}")))
    }

    fn location_of(&self, id: &SystemId) -> Result<LocationId> {
        self.locations
            .iter()
            .find(|l| l.control_systems().any(|s| &s.id == id))
            .map(|l| l.id.clone())
            .ok_or_else(|| Error::Lookup(format!("control system {id}")))
    }

    // -- Status --

    pub async fn refresh_location_status(&mut self, id: &LocationId) -> Result<()> {
        self.apply_location_status(id).await?;
        Ok(())
    }

    /// Fetches and applies a location status, returning it for coverage checks.
    async fn apply_location_status(&mut self, id: &LocationId) -> Result<LocationStatus> {
        self.location(id)?;
        let status: LocationStatus = self.get_validated(&protocol::location_status(id)).await?;
        let location = self
            .locations
            .iter_mut()
            .find(|l| &l.id == id)
            .ok_or_else(|| Error::Lookup(format!("location {id}")))?;
        location.apply_status(&status)?;
        Ok(status)
    }

    /// Refreshes every location, one request at a time.
    pub async fn refresh_status(&mut self) -> Result<()> {
        let ids: Vec<LocationId> = self.locations.iter().map(|l| l.id.clone()).collect();
        for id in &ids {
            self.refresh_location_status(id).await?;
        }
        Ok(())
    }

    pub async fn refresh_system_status(&mut self, id: &SystemId) -> Result<()> {
        self.control_system(id)?;
        let status: SystemStatus = self.get_validated(&protocol::system_status(id)).await?;
        self.control_system_mut(id)?.apply_status(&status)
    }

    /// Hot water then zones, from a status fetched by this call. Fails with a
    /// lookup error when that status leaves out the system or any of its
    /// zones or hot water.
    pub async fn temperatures(&mut self, id: &SystemId) -> Result<Vec<TemperatureReport>> {
        let location = self.location_of(id)?;
        let status = self.apply_location_status(&location).await?;
        let sys_status = status
            .gateways
            .iter()
            .flat_map(|g| &g.temperature_control_systems)
            .find(|s| &s.system_id == id)
            .ok_or_else(|| {
                Error::Lookup(format!("control system {id} in status of location {location}"))
            })?;
        let system = self.control_system(id)?;
        if let Some(missing) = system.missing_from(sys_status) {
            return Err(Error::Lookup(format!("{missing} in status of system {id}")));
        }
        Ok(system.temperature_report())
    }

    // -- System mode --

    pub async fn set_system_mode(
        &mut self,
        id: &SystemId,
        mode: SystemMode,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let system = self.control_system(id)?;
        let cap = system.mode_capability(mode).ok_or_else(|| {
            Error::validation(
                SystemModeRequest::NAME,
                "SystemMode",
                format!("{mode} is not allowed on system {id}"),
            )
        })?;
        if until.is_some() && !cap.can_be_temporary() {
            return Err(Error::validation(
                SystemModeRequest::NAME,
                "TimeUntil",
                format!("{mode} can only be set permanently"),
            ));
        }

        let body = protocol::system_mode_body(mode, until.as_ref());
        schema::validate::<SystemModeRequest>(&body)?;
        info!(system_id = %id, mode = %mode, until = ?until, "setting system mode");
        self.send_command("set_system_mode", id.as_str(), &protocol::system_mode(id), &body)
            .await
    }

    pub async fn set_status_normal(&mut self, id: &SystemId) -> Result<()> {
        self.set_system_mode(id, SystemMode::Auto, None).await
    }

    /// Normal mode with every zone returned to its schedule.
    pub async fn set_status_reset(&mut self, id: &SystemId) -> Result<()> {
        self.set_system_mode(id, SystemMode::AutoWithReset, None).await
    }

    pub async fn set_status_custom(
        &mut self,
        id: &SystemId,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.set_system_mode(id, SystemMode::Custom, until).await
    }

    pub async fn set_status_eco(
        &mut self,
        id: &SystemId,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.set_system_mode(id, SystemMode::AutoWithEco, until).await
    }

    pub async fn set_status_away(
        &mut self,
        id: &SystemId,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.set_system_mode(id, SystemMode::Away, until).await
    }

    pub async fn set_status_dayoff(
        &mut self,
        id: &SystemId,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.set_system_mode(id, SystemMode::DayOff, until).await
    }

    pub async fn set_status_heatingoff(
        &mut self,
        id: &SystemId,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.set_system_mode(id, SystemMode::HeatingOff, until).await
    }

    // -- Zones --

    pub async fn set_zone_temperature(
        &mut self,
        system: &SystemId,
        zone: &ZoneRef,
        celsius: f64,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let z = self.control_system(system)?.zone(zone)?;
        let setpoint = Setpoint::try_from(celsius)
            .map_err(|e| Error::validation(HeatSetpointRequest::NAME, "heatSetpointValue", e))?;
        let caps = &z.setpoint_capabilities;
        if !caps.allows(celsius) {
            return Err(Error::validation(
                HeatSetpointRequest::NAME,
                "heatSetpointValue",
                format!(
                    "{celsius} outside {}..={} for zone {}",
                    caps.min_heat_setpoint, caps.max_heat_setpoint, z.id
                ),
            ));
        }
        let zone_id = z.id.clone();

        let body = protocol::zone_override_body(setpoint, until.as_ref());
        schema::validate::<HeatSetpointRequest>(&body)?;
        info!(zone_id = %zone_id, setpoint = %setpoint, until = ?until, "overriding zone setpoint");
        self.send_command(
            "set_zone_temperature",
            zone_id.as_str(),
            &protocol::zone_setpoint(&zone_id),
            &body,
        )
        .await
    }

    pub async fn cancel_zone_override(&mut self, system: &SystemId, zone: &ZoneRef) -> Result<()> {
        let zone_id = self.control_system(system)?.zone(zone)?.id.clone();
        let body = protocol::zone_follow_schedule_body();
        schema::validate::<HeatSetpointRequest>(&body)?;
        info!(zone_id = %zone_id, "cancelling zone override");
        self.send_command(
            "cancel_zone_override",
            zone_id.as_str(),
            &protocol::zone_setpoint(&zone_id),
            &body,
        )
        .await
    }

    // -- Hot water --

    fn hotwater(&self, system: &SystemId) -> Result<&HotWater> {
        self.control_system(system)?
            .hotwater()
            .ok_or_else(|| Error::Lookup(format!("hot water in system {system}")))
    }

    async fn set_hotwater_state(
        &mut self,
        system: &SystemId,
        state: Option<DhwState>,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let dhw_id = self.hotwater(system)?.id.clone();
        let body = protocol::dhw_state_body(state, until.as_ref());
        schema::validate::<DhwStateRequest>(&body)?;
        info!(dhw_id = %dhw_id, state = ?state, until = ?until, "setting hot water state");
        self.send_command(
            "set_hotwater_state",
            dhw_id.as_str(),
            &protocol::dhw_state(&dhw_id),
            &body,
        )
        .await
    }

    pub async fn set_hotwater_on(
        &mut self,
        system: &SystemId,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.set_hotwater_state(system, Some(DhwState::On), until).await
    }

    pub async fn set_hotwater_off(
        &mut self,
        system: &SystemId,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.set_hotwater_state(system, Some(DhwState::Off), until).await
    }

    /// Returns hot water to its schedule.
    pub async fn reset_hotwater(&mut self, system: &SystemId) -> Result<()> {
        self.set_hotwater_state(system, None, None).await
    }

    // -- Schedules --

    fn zone_target(&self, system: &SystemId, zone: &ZoneRef) -> Result<ScheduleTarget> {
        let z = self.control_system(system)?.zone(zone)?;
        Ok(ScheduleTarget {
            kind: ScheduleKind::Zone,
            id: z.id.to_string(),
            name: z.name.clone(),
            min_switchpoints: z.schedule_capabilities.min_switchpoints_per_day,
            max_switchpoints: z.schedule_capabilities.max_switchpoints_per_day,
        })
    }

    fn hotwater_target(&self, system: &SystemId) -> Result<ScheduleTarget> {
        let hw = self.hotwater(system)?;
        Ok(ScheduleTarget {
            kind: ScheduleKind::HotWater,
            id: hw.id.to_string(),
            name: HotWater::NAME.to_string(),
            min_switchpoints: hw.schedule_capabilities.min_switchpoints_per_day,
            max_switchpoints: hw.schedule_capabilities.max_switchpoints_per_day,
        })
    }

    /// Every schedule target in the system: zones in order, then hot water.
    fn schedule_targets(&self, system: &SystemId) -> Result<Vec<ScheduleTarget>> {
        let sys = self.control_system(system)?;
        let mut targets = sys
            .zones()
            .iter()
            .map(|z| self.zone_target(system, &ZoneRef::ById(z.id.to_string())))
            .collect::<Result<Vec<_>>>()?;
        if sys.hotwater().is_some() {
            targets.push(self.hotwater_target(system)?);
        }
        Ok(targets)
    }

    async fn fetch_schedule(&mut self, target: &ScheduleTarget) -> Result<GetSchedule> {
        let schedule: GetSchedule = self
            .get_validated(&protocol::schedule(target.kind, &target.id))
            .await?;
        if let Some(kind) = schedule.kind()
            && kind != target.kind
        {
            return Err(Error::validation(
                GetSchedule::NAME,
                "dailySchedules",
                format!("{kind:?} switchpoints returned for {}", target.id),
            ));
        }
        Ok(schedule)
    }

    /// Converts to the PUT grammar and checks it against the target.
    fn prepare_schedule(target: &ScheduleTarget, schedule: &GetSchedule) -> Result<Value> {
        let put = PutSchedule::from(schedule);
        if let Some(kind) = put.kind()
            && kind != target.kind
        {
            return Err(Error::validation(
                PutSchedule::NAME,
                "DailySchedules",
                format!("{kind:?} switchpoints cannot be sent to {}", target.id),
            ));
        }
        if let Some((day, count)) =
            put.day_outside(target.min_switchpoints, target.max_switchpoints)
        {
            return Err(Error::validation(
                PutSchedule::NAME,
                format!("DailySchedules[{day}].Switchpoints"),
                format!(
                    "{count} switchpoints, {} allows {}..={}",
                    target.id, target.min_switchpoints, target.max_switchpoints
                ),
            ));
        }
        let body = serde_json::to_value(&put)?;
        schema::validate::<PutSchedule>(&body)?;
        Ok(body)
    }

    async fn send_schedule(&mut self, target: &ScheduleTarget, body: &Value) -> Result<()> {
        self.send_command(
            "set_schedule",
            &target.id,
            &protocol::schedule(target.kind, &target.id),
            body,
        )
        .await
    }

    pub async fn get_zone_schedule(
        &mut self,
        system: &SystemId,
        zone: &ZoneRef,
    ) -> Result<GetSchedule> {
        let target = self.zone_target(system, zone)?;
        self.fetch_schedule(&target).await
    }

    pub async fn get_hotwater_schedule(&mut self, system: &SystemId) -> Result<GetSchedule> {
        let target = self.hotwater_target(system)?;
        self.fetch_schedule(&target).await
    }

    pub async fn set_zone_schedule(
        &mut self,
        system: &SystemId,
        zone: &ZoneRef,
        schedule: &GetSchedule,
    ) -> Result<()> {
        let target = self.zone_target(system, zone)?;
        let body = Self::prepare_schedule(&target, schedule)?;
        self.send_schedule(&target, &body).await
    }

    pub async fn set_hotwater_schedule(
        &mut self,
        system: &SystemId,
        schedule: &GetSchedule,
    ) -> Result<()> {
        let target = self.hotwater_target(system)?;
        let body = Self::prepare_schedule(&target, schedule)?;
        self.send_schedule(&target, &body).await
    }

    /// Fetches every zone and hot water schedule, one request at a time.
    pub async fn backup_schedules(&mut self, system: &SystemId) -> Result<ScheduleBackup> {
        let targets = self.schedule_targets(system)?;
        info!(system_id = %system, entities = targets.len(), "backing up schedules");
        let mut backup = ScheduleBackup::default();
        for target in &targets {
            info!(id = %target.id, name = %target.name, "fetching schedule");
            let schedule = self.fetch_schedule(target).await?;
            backup.insert(target.id.clone(), target.name.clone(), schedule);
        }
        Ok(backup)
    }

    /// Writes every entry of `backup` back. All entries are checked against
    /// the installation first; nothing is sent if any of them fails.
    pub async fn restore_schedules(
        &mut self,
        system: &SystemId,
        backup: &ScheduleBackup,
    ) -> Result<()> {
        let targets = self.schedule_targets(system)?;
        let mut prepared = Vec::with_capacity(backup.len());
        for (id, entry) in backup.iter() {
            let target = targets
                .iter()
                .find(|t| &t.id == id)
                .ok_or_else(|| Error::Lookup(format!("{id} ({}) in system {system}", entry.name)))?;
            let body = Self::prepare_schedule(target, &entry.schedule)?;
            prepared.push((target, body));
        }

        info!(system_id = %system, entities = prepared.len(), "restoring schedules");
        for (target, body) in &prepared {
            info!(id = %target.id, name = %target.name, "restoring schedule");
            self.send_schedule(target, body).await?;
        }
        Ok(())
    }

    pub async fn backup_schedules_to(
        &mut self,
        system: &SystemId,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let backup = self.backup_schedules(system).await?;
        backup.save(path)
    }

    pub async fn restore_schedules_from(
        &mut self,
        system: &SystemId,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let backup = ScheduleBackup::load(path)?;
        self.restore_schedules(system, &backup).await
    }

    // -- Wire helpers --

    fn log_request(&mut self, method: &str, path: &str, body: Option<&Value>) {
        if let Some(ref mut logger) = self.logger {
            logger.log_request(method, path, body);
        }
    }

    async fn get_validated<S: Schema>(&mut self, path: &str) -> Result<S> {
        self.log_request("GET", path, None);
        let raw = self.transport.get(path).await?;
        let doc: S = schema::validate(&raw)?;
        if let Some(ref mut logger) = self.logger {
            match schema::normalized(&doc) {
                Ok(normal) => logger.log_response(path, &normal),
                Err(e) => warn!(path, "failed to log {} response: {e}", S::NAME),
            }
        }
        Ok(doc)
    }

    async fn send_command(
        &mut self,
        action: &str,
        target: &str,
        path: &str,
        body: &Value,
    ) -> Result<()> {
        if let Some(ref mut logger) = self.logger {
            logger.log_command(action, Some(target), body);
        }
        self.log_request("PUT", path, Some(body));
        self.transport.put(path, body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installation::tests::{system_config, system_status};
    use crate::schedule::tests::{dhw_week, zone_week};
    use crate::transport::fake::FakeTransport;
    use crate::ErrorKind;
    use chrono::TimeZone;
    use serde_json::json;

    const SYS: &str = "1234567";

    fn installation_doc() -> Value {
        json!([{
            "locationInfo": {
                "locationId": "2738909",
                "name": "Home",
                "streetAddress": "1 Main Street",
                "city": "Springfield",
                "country": "UnitedKingdom",
                "postcode": "AB1 2CD",
                "locationType": "Residential",
                "useDaylightSaveSwitching": true,
                "timeZone": {
                    "timeZoneId": "GMTStandardTime",
                    "displayName": "(UTC+00:00) Dublin, Edinburgh, Lisbon, London",
                    "offsetMinutes": 0,
                    "currentOffsetMinutes": 0,
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
                    "gatewayId": "2499896",
                    "mac": "00D02DEE4E56",
                    "crc": "1234",
                    "isWiFi": false
                },
                "temperatureControlSystems": [system_config(true)]
            }]
        }])
    }

    fn location_status_doc() -> Value {
        json!({
            "locationId": "2738909",
            "gateways": [{
                "gatewayId": "2499896",
                "temperatureControlSystems": [system_status(true)],
                "activeFaults": []
            }]
        })
    }

    async fn loaded() -> EvohomeClient<FakeTransport> {
        let fake = FakeTransport::default();
        fake.on_get("userAccount", json!({"userId": "2263181"}))
            .on_get(&protocol::installation("2263181"), installation_doc());
        let mut client = EvohomeClient::builder(fake).build().unwrap();
        client.installation().await.unwrap();
        client
    }

    fn sys() -> SystemId {
        SystemId::try_from(SYS).unwrap()
    }

    fn schedule_path(kind: ScheduleKind, id: &str) -> String {
        protocol::schedule(kind, id)
    }

    #[tokio::test]
    async fn installation_builds_graph() {
        let client = loaded().await;
        assert_eq!(client.locations().len(), 1);
        let system = client.single_system().unwrap();
        assert_eq!(system.zones().len(), 2);
        assert!(system.hotwater().is_some());
        assert_eq!(client.locations()[0].owner.username.as_str(), MASKED_EMAIL);
    }

    #[tokio::test]
    async fn temperatures_refresh_before_reporting() {
        let mut client = loaded().await;
        client
            .transport()
            .on_get(&protocol::location_status(&client.locations()[0].id), location_status_doc());

        let report = client.temperatures(&sys()).await.unwrap();
        assert_eq!(report.len(), 3);
        assert_eq!(report[0].thermostat, ThermostatKind::DomesticHotWater);
        assert_eq!(report[1].name, "Lounge");
        assert_eq!(report[1].temp, Some(20.5));
        assert_eq!(report[2].name, "Bedroom");
        assert_eq!(report[2].temp, None);

        let status_path = protocol::location_status(&client.locations()[0].id);
        assert_eq!(client.transport().gets_of(&status_path), 1);
        client.temperatures(&sys()).await.unwrap();
        assert_eq!(client.transport().gets_of(&status_path), 2);
    }

    #[tokio::test]
    async fn temperatures_fail_when_status_omits_system() {
        let mut client = loaded().await;
        let status_path = protocol::location_status(&client.locations()[0].id);
        let mut empty = location_status_doc();
        empty["gateways"][0]["temperatureControlSystems"] = json!([]);
        client
            .transport()
            .on_get(&status_path, location_status_doc())
            .on_get(&status_path, empty);

        client.temperatures(&sys()).await.unwrap();
        let err = client.temperatures(&sys()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lookup);
        assert_eq!(client.transport().gets_of(&status_path), 2);
    }

    #[tokio::test]
    async fn temperatures_fail_when_status_omits_a_zone() {
        let mut client = loaded().await;
        let status_path = protocol::location_status(&client.locations()[0].id);
        let mut partial = location_status_doc();
        partial["gateways"][0]["temperatureControlSystems"][0]["zones"]
            .as_array_mut()
            .unwrap()
            .pop();
        client.transport().on_get(&status_path, partial);

        let err = client.temperatures(&sys()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lookup);
        assert!(err.to_string().contains("3432522"), "{err}");
    }

    #[tokio::test]
    async fn zone_setpoint_respects_advertised_maximum() {
        let mut doc = installation_doc();
        doc[0]["gateways"][0]["temperatureControlSystems"][0]["zones"][0]["setpointCapabilities"]
            ["maxHeatSetpoint"] = json!(30.0);
        let fake = FakeTransport::default();
        fake.on_get("userAccount", json!({"userId": "2263181"}))
            .on_get(&protocol::installation("2263181"), doc);
        let mut client = EvohomeClient::builder(fake).build().unwrap();
        client.installation().await.unwrap();

        let err = client
            .set_zone_temperature(&sys(), &ZoneRef::name("Lounge"), 32.0, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("30"), "{err}");
        assert!(client.transport().puts().is_empty());

        client
            .set_zone_temperature(&sys(), &ZoneRef::name("Lounge"), 30.0, None)
            .await
            .unwrap();
        assert_eq!(client.transport().puts().len(), 1);
    }

    #[tokio::test]
    async fn mode_change_sends_validated_body() {
        let mut client = loaded().await;
        let until = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 0).unwrap();
        client.set_status_away(&sys(), Some(until)).await.unwrap();
        client.set_status_normal(&sys()).await.unwrap();

        let puts = client.transport().puts();
        assert_eq!(puts[0].0, "temperatureControlSystem/1234567/mode");
        assert_eq!(
            puts[0].1,
            json!({"SystemMode": "Away", "TimeUntil": "2024-01-02T03:04:00Z", "Permanent": false})
        );
        assert_eq!(
            puts[1].1,
            json!({"SystemMode": "Auto", "TimeUntil": null, "Permanent": true})
        );
    }

    #[tokio::test]
    async fn disallowed_modes_are_rejected_before_sending() {
        let mut client = loaded().await;
        let err = client.set_status_eco(&sys(), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let until = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 0).unwrap();
        let err = client.set_status_heatingoff(&sys(), Some(until)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(client.transport().puts().is_empty());
    }

    #[tokio::test]
    async fn zone_override_checks_capabilities() {
        let mut client = loaded().await;
        client
            .set_zone_temperature(&sys(), &ZoneRef::name("Lounge"), 21.5, None)
            .await
            .unwrap();
        let err = client
            .set_zone_temperature(&sys(), &ZoneRef::name("Lounge"), 36.0, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = client
            .cancel_zone_override(&sys(), &ZoneRef::name("Kitchen"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lookup);

        let puts = client.transport().puts();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].0, "temperatureZone/3432521/heatSetpoint");
        assert_eq!(puts[0].1["setpointMode"], "PermanentOverride");
    }

    #[tokio::test]
    async fn hotwater_reset_follows_schedule() {
        let mut client = loaded().await;
        client.reset_hotwater(&sys()).await.unwrap();
        let puts = client.transport().puts();
        assert_eq!(puts[0].0, "domesticHotWater/3933910/state");
        assert_eq!(
            puts[0].1,
            json!({"mode": "FollowSchedule", "state": null, "untilTime": null})
        );
    }

    #[tokio::test]
    async fn backup_then_restore_sends_put_grammar() {
        let mut client = loaded().await;
        client
            .transport()
            .on_get(&schedule_path(ScheduleKind::Zone, "3432521"), zone_week(21.0))
            .on_get(&schedule_path(ScheduleKind::Zone, "3432522"), zone_week(18.0))
            .on_get(&schedule_path(ScheduleKind::HotWater, "3933910"), dhw_week());

        let backup = client.backup_schedules(&sys()).await.unwrap();
        assert_eq!(backup.len(), 3);
        assert_eq!(backup.get("3933910").unwrap().name, HotWater::NAME);

        client.restore_schedules(&sys(), &backup).await.unwrap();
        let puts = client.transport().puts();
        assert_eq!(puts.len(), 3);
        let lounge = puts
            .iter()
            .find(|(p, _)| p == "temperatureZone/3432521/schedule")
            .unwrap();
        assert!(lounge.1.get("DailySchedules").is_some());
        assert_eq!(lounge.1["DailySchedules"][0]["DayOfWeek"], 0);
    }

    #[tokio::test]
    async fn restore_with_unknown_id_sends_nothing() {
        let mut client = loaded().await;
        let mut backup = ScheduleBackup::default();
        backup.insert(
            "3432521",
            "Lounge",
            schema::validate(&zone_week(20.0)).unwrap(),
        );
        backup.insert(
            "9999999",
            "Garage",
            schema::validate(&zone_week(20.0)).unwrap(),
        );

        let err = client.restore_schedules(&sys(), &backup).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lookup);
        assert!(client.transport().puts().is_empty());
    }

    #[tokio::test]
    async fn restore_rejects_wrong_schedule_kind() {
        let mut client = loaded().await;
        let mut backup = ScheduleBackup::default();
        backup.insert("3432521", "Lounge", schema::validate(&dhw_week()).unwrap());

        let err = client.restore_schedules(&sys(), &backup).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(client.transport().puts().is_empty());
    }
}
