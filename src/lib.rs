mod client;
mod diff;
mod error;
pub mod installation;
mod legacy;
mod logger;
pub mod protocol;
pub mod schedule;
pub mod schema;
mod task;
mod transport;
mod types;

pub use client::{EvohomeClient, EvohomeClientBuilder};
pub use error::{Error, ErrorKind, Result};
pub use installation::{ControlSystem, Gateway, HotWater, Location, Zone};
pub use legacy::{LegacyClient, LegacyClientBuilder, LegacyDevice};
pub use logger::MessageLogMode;
pub use schedule::{GetSchedule, PutSchedule, ScheduleBackup, ScheduleKind};
pub use schema::{validate_document, SchemaKind};
pub use task::RetryPolicy;
pub use transport::{AuthScheme, HttpTransport, HttpTransportBuilder, Transport};
pub use types::*;
