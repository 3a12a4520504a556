pub mod cli;
pub mod codec;
pub mod config;
pub mod datetime;
pub mod entity;
pub mod error;
pub mod logging;
pub mod service;
pub mod storage;
pub mod transfer;

pub use codec::{CodecError, Identity, IdentityCodec, ImageArtifact};
pub use entity::{BatteryRecord, ChargeState};
pub use error::{Result, SkyfuelError};
pub use service::{BatteryService, BatteryStatistics};
pub use storage::BatteryStore;
pub use transfer::{ExportDocument, ImportSummary};
