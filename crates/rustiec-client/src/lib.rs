#![allow(async_fn_in_trait)]

pub mod adapter;
pub mod block;
pub mod cache;
pub mod error;
pub mod reader;
pub mod resolver;
pub mod settings;
pub mod simulator;
pub mod value;

pub use adapter::{backoff_delay, build_command, ClientAdapter, Reading};
pub use block::BlockReader;
pub use cache::{LearnedTypes, PointCache};
pub use error::{ClientError, SettingsError};
pub use reader::{DeviceReader, ReachabilityProbe, TcpProbe, HEALTH_CACHE_TTL};
pub use resolver::{infer_kind, parse_inferred, parse_value, resolve, PointAddress};
pub use settings::{parse_block_ranges, BlockRange, DeviceSettings, MissingTagPolicy, Tuning};
pub use simulator::SimulatedStation;
pub use value::{PointKind, PointValue, Sample};
