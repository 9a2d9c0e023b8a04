use std::fmt;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize, Serializer};

/// Vendor identifiers are short strings of decimal digits.
fn is_vendor_id(s: &str) -> bool {
    !s.is_empty() && s.len() <= 12 && s.bytes().all(|b| b.is_ascii_digit())
}

macro_rules! vendor_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(s: String) -> std::result::Result<Self, String> {
                if is_vendor_id(&s) {
                    Ok(Self(s))
                } else {
                    Err(format!("invalid {}: {s:?}", $what))
                }
            }
        }

        impl TryFrom<&str> for $name {
            type Error = String;

            fn try_from(s: &str) -> std::result::Result<Self, String> {
                Self::try_from(s.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

vendor_id!(LocationId, "location id");
vendor_id!(GatewayId, "gateway id");
vendor_id!(
    /// Identifier of a temperature control system (the controller).
    SystemId,
    "system id"
);
vendor_id!(ZoneId, "zone id");
vendor_id!(DhwId, "dhw id");

/// Target heat setpoint in Celsius, bounded to what the vendor accepts.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Setpoint(f64);

impl Setpoint {
    pub const MIN: f64 = 5.0;
    pub const MAX: f64 = 35.0;

    pub fn celsius(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Setpoint {
    type Error = String;

    fn try_from(value: f64) -> std::result::Result<Self, String> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!(
                "setpoint {value} outside {}..={}",
                Self::MIN,
                Self::MAX
            ))
        }
    }
}

impl From<Setpoint> for f64 {
    fn from(s: Setpoint) -> f64 {
        s.0
    }
}

impl fmt::Display for Setpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}\u{00b0}C", self.0)
    }
}

fn parse_wall_clock(s: &str) -> Option<NaiveTime> {
    if s.len() != 8 {
        return None;
    }
    let t = NaiveTime::parse_from_str(s, "%H:%M:%S").ok()?;
    (t.second() == 0).then_some(t)
}

/// Switchpoint time, always `HH:MM:00` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, String> {
        parse_wall_clock(&s)
            .map(Self)
            .ok_or_else(|| format!("time of day {s:?} is not HH:MM:00"))
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> String {
        t.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M:%S"))
    }
}

/// Minute-granular timing resolution, `00:MM:00` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimingResolution(u32);

impl TimingResolution {
    pub fn minutes(&self) -> u32 {
        self.0
    }
}

impl TryFrom<String> for TimingResolution {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, String> {
        match parse_wall_clock(&s) {
            Some(t) if t.hour() == 0 => Ok(Self(t.minute())),
            _ => Err(format!("timing resolution {s:?} is not 00:MM:00")),
        }
    }
}

impl From<TimingResolution> for String {
    fn from(r: TimingResolution) -> String {
        format!("00:{:02}:00", r.0)
    }
}

pub const MASKED_TEXT: &str = "********";
pub const MASKED_EMAIL: &str = "nobody@nowhere.com";

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

/// One-way masking of personal data. The original value is not kept.
pub fn obfuscate(value: &str) -> &'static str {
    if looks_like_email(value) {
        MASKED_EMAIL
    } else {
        MASKED_TEXT
    }
}

/// Personal free text (address lines, surname). Only the mask survives
/// deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct Masked(String);

impl Masked {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Masked {
    fn from(s: String) -> Self {
        Self(obfuscate(&s).to_string())
    }
}

/// An email-shaped username; rejected when not email-shaped, masked otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct MaskedEmail(String);

impl MaskedEmail {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MaskedEmail {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, String> {
        if looks_like_email(&s) {
            Ok(Self(MASKED_EMAIL.to_string()))
        } else {
            Err("not an email address".to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemMode {
    Auto,
    AutoWithReset,
    AutoWithEco,
    Away,
    Custom,
    DayOff,
    HeatingOff,
}

impl SystemMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemMode::Auto => "Auto",
            SystemMode::AutoWithReset => "AutoWithReset",
            SystemMode::AutoWithEco => "AutoWithEco",
            SystemMode::Away => "Away",
            SystemMode::Custom => "Custom",
            SystemMode::DayOff => "DayOff",
            SystemMode::HeatingOff => "HeatingOff",
        }
    }

    /// Modes whose capability entry never carries duration fields.
    pub(crate) fn is_permanent_only(&self) -> bool {
        matches!(
            self,
            SystemMode::Auto | SystemMode::AutoWithReset | SystemMode::HeatingOff
        )
    }
}

impl fmt::Display for SystemMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneMode {
    FollowSchedule,
    PermanentOverride,
    TemporaryOverride,
    OpenWindow,
    LocalOverride,
    RemoteOverride,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DhwState {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimingMode {
    Duration,
    Period,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemModelType {
    EvoTouch,
    FocusProWifiRetail,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneModelType {
    HeatingZone,
    RoundModulation,
    RoundWireless,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneType {
    RadiatorZone,
    ZoneValves,
    ZoneTemperatureControl,
    Thermostat,
    UnderfloorHeating,
    ElectricHeat,
    MixingValve,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    /// Monday is 0.
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    pub fn from_ordinal(n: u8) -> Option<Self> {
        Self::ALL.get(n as usize).copied()
    }
}

/// How a caller names a zone: by display name or by vendor identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneRef {
    ByName(String),
    ById(String),
}

impl ZoneRef {
    pub fn name(name: impl Into<String>) -> Self {
        ZoneRef::ByName(name.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        ZoneRef::ById(id.into())
    }
}

impl fmt::Display for ZoneRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneRef::ByName(name) => write!(f, "zone named {name:?}"),
            ZoneRef::ById(id) => write!(f, "zone {id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThermostatKind {
    DomesticHotWater,
    EmeaZone,
}

fn setpoint_or_empty<S: Serializer>(
    value: &Option<f64>,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(v) => s.serialize_f64(*v),
        None => s.serialize_str(""),
    }
}

/// One row of the aggregated temperature report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureReport {
    pub thermostat: ThermostatKind,
    pub id: String,
    pub name: String,
    pub temp: Option<f64>,
    /// `None` for hot water, serialized as an empty string.
    #[serde(serialize_with = "setpoint_or_empty")]
    pub setpoint: Option<f64>,
}
