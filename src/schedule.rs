//! Weekly schedules in their two wire grammars.
//!
//! The REST API returns schedules with camelCase keys and day names
//! ([`GetSchedule`]) but accepts them with PascalCase keys and day ordinals
//! ([`PutSchedule`]). The two are kept apart and converted explicitly.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{self, Checked, Schema, Violation};
use crate::types::*;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleKind {
    Zone,
    HotWater,
}

// -- GET grammar --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GetZoneSwitchpoint {
    pub heat_setpoint: Setpoint,
    pub time_of_day: TimeOfDay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GetDhwSwitchpoint {
    pub dhw_state: DhwState,
    pub time_of_day: TimeOfDay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GetSwitchpoint {
    Zone(GetZoneSwitchpoint),
    HotWater(GetDhwSwitchpoint),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GetDaySchedule {
    pub day_of_week: DayOfWeek,
    pub switchpoints: Vec<GetSwitchpoint>,
}

/// A schedule as returned by `GET {temperatureZone|domesticHotWater}/{id}/schedule`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GetSchedule {
    pub daily_schedules: Vec<GetDaySchedule>,
}

impl GetSwitchpoint {
    fn kind(&self) -> ScheduleKind {
        match self {
            GetSwitchpoint::Zone(_) => ScheduleKind::Zone,
            GetSwitchpoint::HotWater(_) => ScheduleKind::HotWater,
        }
    }
}

impl GetSchedule {
    /// `None` when the schedule holds no switchpoints at all.
    pub fn kind(&self) -> Option<ScheduleKind> {
        self.daily_schedules
            .iter()
            .flat_map(|d| d.switchpoints.first())
            .map(GetSwitchpoint::kind)
            .next()
    }

    pub fn day(&self, day: DayOfWeek) -> Option<&GetDaySchedule> {
        self.daily_schedules.iter().find(|d| d.day_of_week == day)
    }
}

fn check_week<D>(days: &[D], field: &str, day_of: impl Fn(&D) -> Option<DayOfWeek>) -> Checked {
    if days.len() != 7 {
        return Err(Violation::new(
            field,
            format!("expected 7 day entries, got {}", days.len()),
        ));
    }
    let mut seen = [false; 7];
    for (i, d) in days.iter().enumerate() {
        let day = day_of(d).ok_or_else(|| Violation::new(format!("{field}[{i}]"), "no such day"))?;
        let slot = &mut seen[day.ordinal() as usize];
        if *slot {
            return Err(Violation::new(
                format!("{field}[{i}]"),
                format!("{day:?} appears twice"),
            ));
        }
        *slot = true;
    }
    Ok(())
}

fn check_uniform(
    field: &str,
    kinds: impl Iterator<Item = (usize, usize, ScheduleKind)>,
    switchpoints: &str,
) -> Checked {
    let mut first: Option<ScheduleKind> = None;
    for (day, sp, kind) in kinds {
        match first {
            None => first = Some(kind),
            Some(k) if k != kind => {
                return Err(Violation::new(
                    format!("{field}[{day}].{switchpoints}[{sp}]"),
                    "zone and hot water switchpoints mixed",
                ));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

impl Schema for GetSchedule {
    const NAME: &'static str = "schedule (GET)";

    fn check(&self) -> Checked {
        check_week(&self.daily_schedules, "dailySchedules", |d| Some(d.day_of_week))?;
        check_uniform(
            "dailySchedules",
            self.daily_schedules.iter().enumerate().flat_map(|(i, d)| {
                d.switchpoints
                    .iter()
                    .enumerate()
                    .map(move |(j, sp)| (i, j, sp.kind()))
            }),
            "switchpoints",
        )
    }
}

// -- PUT grammar --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct PutZoneSwitchpoint {
    pub heat_setpoint: Setpoint,
    pub time_of_day: TimeOfDay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct PutDhwSwitchpoint {
    pub dhw_state: DhwState,
    pub time_of_day: TimeOfDay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PutSwitchpoint {
    Zone(PutZoneSwitchpoint),
    HotWater(PutDhwSwitchpoint),
}

impl PutSwitchpoint {
    fn kind(&self) -> ScheduleKind {
        match self {
            PutSwitchpoint::Zone(_) => ScheduleKind::Zone,
            PutSwitchpoint::HotWater(_) => ScheduleKind::HotWater,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct PutDaySchedule {
    /// Monday is 0.
    pub day_of_week: u8,
    pub switchpoints: Vec<PutSwitchpoint>,
}

/// A schedule as sent with `PUT {temperatureZone|domesticHotWater}/{id}/schedule`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct PutSchedule {
    pub daily_schedules: Vec<PutDaySchedule>,
}

impl PutSchedule {
    pub fn kind(&self) -> Option<ScheduleKind> {
        self.daily_schedules
            .iter()
            .flat_map(|d| d.switchpoints.first())
            .map(PutSwitchpoint::kind)
            .next()
    }

    /// Returns the first day whose switchpoint count falls outside `min..=max`.
    pub(crate) fn day_outside(&self, min: u8, max: u8) -> Option<(u8, usize)> {
        self.daily_schedules
            .iter()
            .map(|d| (d.day_of_week, d.switchpoints.len()))
            .find(|(_, n)| *n < min as usize || *n > max as usize)
    }
}

impl Schema for PutSchedule {
    const NAME: &'static str = "schedule (PUT)";

    fn check(&self) -> Checked {
        check_week(&self.daily_schedules, "DailySchedules", |d| {
            DayOfWeek::from_ordinal(d.day_of_week)
        })?;
        check_uniform(
            "DailySchedules",
            self.daily_schedules.iter().enumerate().flat_map(|(i, d)| {
                d.switchpoints
                    .iter()
                    .enumerate()
                    .map(move |(j, sp)| (i, j, sp.kind()))
            }),
            "Switchpoints",
        )
    }
}

// -- Mapping --

impl From<&GetSwitchpoint> for PutSwitchpoint {
    fn from(sp: &GetSwitchpoint) -> Self {
        match sp {
            GetSwitchpoint::Zone(z) => PutSwitchpoint::Zone(PutZoneSwitchpoint {
                heat_setpoint: z.heat_setpoint,
                time_of_day: z.time_of_day,
            }),
            GetSwitchpoint::HotWater(d) => PutSwitchpoint::HotWater(PutDhwSwitchpoint {
                dhw_state: d.dhw_state,
                time_of_day: d.time_of_day,
            }),
        }
    }
}

impl From<&PutSwitchpoint> for GetSwitchpoint {
    fn from(sp: &PutSwitchpoint) -> Self {
        match sp {
            PutSwitchpoint::Zone(z) => GetSwitchpoint::Zone(GetZoneSwitchpoint {
                heat_setpoint: z.heat_setpoint,
                time_of_day: z.time_of_day,
            }),
            PutSwitchpoint::HotWater(d) => GetSwitchpoint::HotWater(GetDhwSwitchpoint {
                dhw_state: d.dhw_state,
                time_of_day: d.time_of_day,
            }),
        }
    }
}

impl From<&GetSchedule> for PutSchedule {
    fn from(get: &GetSchedule) -> Self {
        PutSchedule {
            daily_schedules: get
                .daily_schedules
                .iter()
                .map(|day| PutDaySchedule {
                    day_of_week: day.day_of_week.ordinal(),
                    switchpoints: day.switchpoints.iter().map(PutSwitchpoint::from).collect(),
                })
                .collect(),
        }
    }
}

impl TryFrom<&PutSchedule> for GetSchedule {
    type Error = Error;

    fn try_from(put: &PutSchedule) -> Result<Self> {
        let daily_schedules = put
            .daily_schedules
            .iter()
            .enumerate()
            .map(|(i, day)| {
                let day_of_week = DayOfWeek::from_ordinal(day.day_of_week).ok_or_else(|| {
                    Error::validation(
                        PutSchedule::NAME,
                        format!("DailySchedules[{i}].DayOfWeek"),
                        format!("{} is not 0..=6", day.day_of_week),
                    )
                })?;
                Ok(GetDaySchedule {
                    day_of_week,
                    switchpoints: day.switchpoints.iter().map(GetSwitchpoint::from).collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(GetSchedule { daily_schedules })
    }
}

// -- Backup document --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupEntry {
    pub name: String,
    pub schedule: GetSchedule,
}

/// Schedules of one control system keyed by zone or hot water identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleBackup(pub BTreeMap<String, BackupEntry>);

impl Schema for ScheduleBackup {
    const NAME: &'static str = "schedule backup";

    fn check(&self) -> Checked {
        for (id, entry) in &self.0 {
            entry
                .schedule
                .check()
                .map_err(|v| Violation::new(format!("{id}.schedule.{}", v.path), v.reason))?;
        }
        Ok(())
    }
}

impl ScheduleBackup {
    pub fn insert(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        schedule: GetSchedule,
    ) {
        self.0.insert(
            id.into(),
            BackupEntry {
                name: name.into(),
                schedule,
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<&BackupEntry> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BackupEntry)> {
        self.0.iter()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(text)?;
        schema::validate(&raw)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}
