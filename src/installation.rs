//! The installation tree: Location → Gateway → ControlSystem → Zone / HotWater.
//!
//! Topology is fixed at construction from a validated config payload. Status
//! payloads overwrite leaf attributes in place and never add or remove entities.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::schema::{
    self, ActiveFault, DhwConfig, DhwScheduleCapabilities, DhwStateCapabilities, DhwStatus,
    GatewayConfig, GatewayInfo, GatewayStatus, LocationConfig, LocationOwner, LocationStatus,
    ScheduleCapabilities, SetpointCapabilities, SystemConfig, SystemModeCapability,
    SystemModeStatus, SystemStatus, TimeZone, ZoneConfig, ZoneStatus,
};
use crate::types::*;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub model_type: ZoneModelType,
    pub zone_type: ZoneType,
    pub setpoint_capabilities: SetpointCapabilities,
    pub schedule_capabilities: ScheduleCapabilities,
    pub temperature: Option<f64>,
    pub is_available: bool,
    pub setpoint: Option<f64>,
    pub setpoint_mode: Option<ZoneMode>,
    pub setpoint_until: Option<DateTime<Utc>>,
    pub active_faults: Vec<ActiveFault>,
}

impl Zone {
    fn from_config(cfg: &ZoneConfig) -> Self {
        Self {
            id: cfg.zone_id.clone(),
            name: cfg.name.clone(),
            model_type: cfg.model_type,
            zone_type: cfg.zone_type,
            setpoint_capabilities: cfg.setpoint_capabilities.clone(),
            schedule_capabilities: cfg.schedule_capabilities.clone(),
            temperature: None,
            is_available: false,
            setpoint: None,
            setpoint_mode: None,
            setpoint_until: None,
            active_faults: Vec::new(),
        }
    }

    fn apply_status(&mut self, status: &ZoneStatus) {
        self.is_available = status.temperature_status.is_available;
        self.temperature = status
            .temperature_status
            .temperature
            .filter(|_| status.temperature_status.is_available);
        self.setpoint = Some(status.setpoint_status.target_heat_temperature);
        self.setpoint_mode = Some(status.setpoint_status.setpoint_mode);
        self.setpoint_until = status.setpoint_status.until;
        self.active_faults = status.active_faults.clone();
    }
}

#[derive(Debug, Clone)]
pub struct HotWater {
    pub id: DhwId,
    pub state_capabilities: DhwStateCapabilities,
    pub schedule_capabilities: DhwScheduleCapabilities,
    pub temperature: Option<f64>,
    pub is_available: bool,
    pub state: Option<DhwState>,
    pub mode: Option<ZoneMode>,
    pub until: Option<DateTime<Utc>>,
    pub active_faults: Vec<ActiveFault>,
}

impl HotWater {
    /// Display name used in schedule backups.
    pub const NAME: &'static str = "Domestic Hot Water";

    fn from_config(cfg: &DhwConfig) -> Self {
        Self {
            id: cfg.dhw_id.clone(),
            state_capabilities: cfg.dhw_state_capabilities_response.clone(),
            schedule_capabilities: cfg.schedule_capabilities_response.clone(),
            temperature: None,
            is_available: false,
            state: None,
            mode: None,
            until: None,
            active_faults: Vec::new(),
        }
    }

    fn apply_status(&mut self, status: &DhwStatus) {
        self.is_available = status.temperature_status.is_available;
        self.temperature = status
            .temperature_status
            .temperature
            .filter(|_| status.temperature_status.is_available);
        self.state = Some(status.state_status.state);
        self.mode = Some(status.state_status.mode);
        self.until = status.state_status.until;
        self.active_faults = status.active_faults.clone();
    }
}

#[derive(Debug, Clone)]
pub struct ControlSystem {
    pub id: SystemId,
    pub model_type: SystemModelType,
    pub allowed_modes: Vec<SystemModeCapability>,
    pub mode_status: Option<SystemModeStatus>,
    pub active_faults: Vec<ActiveFault>,
    zones: Vec<Zone>,
    zones_by_name: HashMap<String, usize>,
    zones_by_id: HashMap<ZoneId, usize>,
    hotwater: Option<HotWater>,
}

impl ControlSystem {
    /// Builds a control system from a raw `temperatureControlSystems[]` entry.
    pub fn from_config(config: &Value) -> Result<Self> {
        match config.get("systemId") {
            Some(Value::String(id)) if !id.is_empty() => {}
            _ => return Err(Error::Config("control system config has no systemId".into())),
        }
        let cfg: SystemConfig = schema::validate(config)?;
        Self::build(&cfg)
    }

    pub fn build(cfg: &SystemConfig) -> Result<Self> {
        let mut zones = Vec::with_capacity(cfg.zones.len());
        let mut zones_by_name = HashMap::new();
        let mut zones_by_id = HashMap::new();

        for (idx, zone_cfg) in cfg.zones.iter().enumerate() {
            let zone = Zone::from_config(zone_cfg);
            if zones_by_id.insert(zone.id.clone(), idx).is_some() {
                return Err(Error::Config(format!(
                    "zone {} appears twice in system {}",
                    zone.id, cfg.system_id
                )));
            }
            if let Some(prev) = zones_by_name.insert(zone.name.clone(), idx) {
                warn!(
                    system_id = %cfg.system_id,
                    name = %zone.name,
                    shadowed = %cfg.zones[prev].zone_id,
                    "duplicate zone name, later zone wins"
                );
            }
            zones.push(zone);
        }

        let hotwater = cfg.dhw.as_ref().map(HotWater::from_config);
        if let Some(dhw) = &hotwater
            && zones_by_id.keys().any(|z| z.as_str() == dhw.id.as_str())
        {
            return Err(Error::Config(format!(
                "dhw {} shares an id with a zone in system {}",
                dhw.id, cfg.system_id
            )));
        }

        debug!(
            system_id = %cfg.system_id,
            zones = zones.len(),
            dhw = hotwater.is_some(),
            "built control system"
        );

        Ok(Self {
            id: cfg.system_id.clone(),
            model_type: cfg.model_type,
            allowed_modes: cfg.allowed_system_modes.clone(),
            mode_status: None,
            active_faults: Vec::new(),
            zones,
            zones_by_name,
            zones_by_id,
            hotwater,
        })
    }

    /// Zones in config order.
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn hotwater(&self) -> Option<&HotWater> {
        self.hotwater.as_ref()
    }

    pub fn zone_by_id(&self, id: &str) -> Option<&Zone> {
        let key = ZoneId::try_from(id).ok()?;
        self.zones_by_id.get(&key).map(|&idx| &self.zones[idx])
    }

    pub fn zone_by_name(&self, name: &str) -> Option<&Zone> {
        self.zones_by_name.get(name).map(|&idx| &self.zones[idx])
    }

    pub fn zone(&self, zone: &ZoneRef) -> Result<&Zone> {
        let found = match zone {
            ZoneRef::ByName(name) => self.zone_by_name(name),
            ZoneRef::ById(id) => self.zone_by_id(id),
        };
        found.ok_or_else(|| Error::Lookup(format!("{zone} in system {}", self.id)))
    }

    pub fn mode_capability(&self, mode: SystemMode) -> Option<&SystemModeCapability> {
        self.allowed_modes.iter().find(|c| c.mode() == mode)
    }

    /// Checks that every entity named by `status` exists here.
    fn check_status(&self, status: &SystemStatus) -> Result<()> {
        if status.system_id != self.id {
            return Err(Error::Lookup(format!(
                "status for system {} applied to system {}",
                status.system_id, self.id
            )));
        }
        for zone in &status.zones {
            if !self.zones_by_id.contains_key(&zone.zone_id) {
                return Err(Error::Lookup(format!(
                    "zone {} in system {}",
                    zone.zone_id, self.id
                )));
            }
        }
        if let Some(dhw) = &status.dhw {
            match &self.hotwater {
                Some(hw) if hw.id == dhw.dhw_id => {}
                _ => {
                    return Err(Error::Lookup(format!(
                        "dhw {} in system {}",
                        dhw.dhw_id, self.id
                    )));
                }
            }
        }
        Ok(())
    }

    fn apply_checked(&mut self, status: &SystemStatus) {
        for zone_status in &status.zones {
            if let Some(&idx) = self.zones_by_id.get(&zone_status.zone_id) {
                self.zones[idx].apply_status(zone_status);
            }
        }
        if let (Some(hw), Some(dhw_status)) = (self.hotwater.as_mut(), status.dhw.as_ref()) {
            hw.apply_status(dhw_status);
        }
        self.mode_status = Some(status.system_mode_status.clone());
        self.active_faults = status.active_faults.clone();
    }

    /// Overwrites leaf attributes from a validated status. Nothing is touched
    /// when the status names an entity this system does not have.
    pub fn apply_status(&mut self, status: &SystemStatus) -> Result<()> {
        self.check_status(status)?;
        self.apply_checked(status);
        Ok(())
    }

    /// The first zone or hot water that `status` carries no reading for.
    pub(crate) fn missing_from(&self, status: &SystemStatus) -> Option<String> {
        if let Some(hw) = &self.hotwater
            && status.dhw.as_ref().is_none_or(|d| d.dhw_id != hw.id)
        {
            return Some(format!("dhw {}", hw.id));
        }
        self.zones
            .iter()
            .find(|z| !status.zones.iter().any(|s| s.zone_id == z.id))
            .map(|z| format!("zone {}", z.id))
    }

    /// Hot water first, then zones in config order, from the current attributes.
    pub fn temperature_report(&self) -> Vec<TemperatureReport> {
        let mut result = Vec::with_capacity(self.zones.len() + 1);

        if let Some(hw) = &self.hotwater {
            result.push(TemperatureReport {
                thermostat: ThermostatKind::DomesticHotWater,
                id: hw.id.to_string(),
                name: String::new(),
                temp: hw.temperature,
                setpoint: None,
            });
        }

        for zone in &self.zones {
            result.push(TemperatureReport {
                thermostat: ThermostatKind::EmeaZone,
                id: zone.id.to_string(),
                name: zone.name.clone(),
                temp: zone.temperature.filter(|_| zone.is_available),
                setpoint: zone.setpoint,
            });
        }

        result
    }
}

#[derive(Debug, Clone)]
pub struct Gateway {
    pub id: GatewayId,
    pub mac: String,
    pub info: GatewayInfo,
    pub active_faults: Vec<ActiveFault>,
    control_systems: Vec<ControlSystem>,
}

impl Gateway {
    fn build(cfg: &GatewayConfig) -> Result<Self> {
        let control_systems = cfg
            .temperature_control_systems
            .iter()
            .map(ControlSystem::build)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            id: cfg.gateway_info.gateway_id.clone(),
            mac: cfg.gateway_info.mac.clone(),
            info: cfg.gateway_info.clone(),
            active_faults: Vec::new(),
            control_systems,
        })
    }

    pub fn control_systems(&self) -> &[ControlSystem] {
        &self.control_systems
    }

    fn check_status(&self, status: &GatewayStatus) -> Result<()> {
        for sys_status in &status.temperature_control_systems {
            let sys = self
                .control_systems
                .iter()
                .find(|s| s.id == sys_status.system_id)
                .ok_or_else(|| {
                    Error::Lookup(format!(
                        "system {} on gateway {}",
                        sys_status.system_id, self.id
                    ))
                })?;
            sys.check_status(sys_status)?;
        }
        Ok(())
    }

    fn apply_checked(&mut self, status: &GatewayStatus) {
        for sys_status in &status.temperature_control_systems {
            if let Some(sys) = self
                .control_systems
                .iter_mut()
                .find(|s| s.id == sys_status.system_id)
            {
                sys.apply_checked(sys_status);
            }
        }
        self.active_faults = status.active_faults.clone();
    }
}

#[derive(Debug, Clone)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub owner: LocationOwner,
    pub time_zone: TimeZone,
    gateways: Vec<Gateway>,
}

impl Location {
    /// Builds a location from a raw `installationInfo` entry.
    pub fn from_config(config: &Value) -> Result<Self> {
        if config.pointer("/locationInfo/locationId").is_none() {
            return Err(Error::Config("location config has no locationId".into()));
        }
        let cfg: LocationConfig = schema::validate(config)?;
        Self::build(&cfg)
    }

    pub fn build(cfg: &LocationConfig) -> Result<Self> {
        let gateways = cfg
            .gateways
            .iter()
            .map(Gateway::build)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            id: cfg.location_info.location_id.clone(),
            name: cfg.location_info.name.clone(),
            owner: cfg.location_info.location_owner.clone(),
            time_zone: cfg.location_info.time_zone.clone(),
            gateways,
        })
    }

    pub fn gateways(&self) -> &[Gateway] {
        &self.gateways
    }

    pub fn control_systems(&self) -> impl Iterator<Item = &ControlSystem> {
        self.gateways.iter().flat_map(|g| g.control_systems.iter())
    }

    pub(crate) fn control_system_mut(&mut self, id: &SystemId) -> Option<&mut ControlSystem> {
        self.gateways
            .iter_mut()
            .flat_map(|g| g.control_systems.iter_mut())
            .find(|s| &s.id == id)
    }

    pub fn apply_status(&mut self, status: &LocationStatus) -> Result<()> {
        if status.location_id != self.id {
            return Err(Error::Lookup(format!(
                "status for location {} applied to location {}",
                status.location_id, self.id
            )));
        }
        for gw_status in &status.gateways {
            let gw = self
                .gateways
                .iter()
                .find(|g| g.id == gw_status.gateway_id)
                .ok_or_else(|| {
                    Error::Lookup(format!(
                        "gateway {} in location {}",
                        gw_status.gateway_id, self.id
                    ))
                })?;
            gw.check_status(gw_status)?;
        }
        for gw_status in &status.gateways {
            if let Some(gw) = self
                .gateways
                .iter_mut()
                .find(|g| g.id == gw_status.gateway_id)
            {
                gw.apply_checked(gw_status);
            }
        }
        Ok(())
    }
}
