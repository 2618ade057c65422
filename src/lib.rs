mod client;
mod entity;
mod error;
mod logger;
mod normalize;
mod poller;
mod protocol;
mod types;

pub use client::{RainmakerClient, RainmakerClientBuilder};
pub use entity::{
    BinarySensorView, ClimateView, NumberView, ParamHint, Presentable, SensorView, SwitchView,
    classify, name_hint, present, presentables,
};
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use normalize::{classify_by_metadata, merge_metadata, unwrap_parameters};
pub use poller::{DEFAULT_POLL_INTERVAL, Poller, SnapshotHandle};
pub use protocol::{DeviceConfig, NodeConfig, ParamDef, RawBounds};
pub use types::*;
