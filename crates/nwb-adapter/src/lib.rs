//! NWB attribute adapters for a columnar database.
//!
//! Large objects (session containers, patch-clamp series) are written to
//! container files under a configured stage directory and stored in the
//! database as path strings. Small metadata objects (devices, electrodes)
//! are stored inline as mappings.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use nwb_adapter::{AdapterConfig, AttributeAdapter, NwbAdapters, SessionSeries};
//!
//! let config = AdapterConfig::load().unwrap();
//! let adapters = NwbAdapters::from_config(&config).unwrap();
//!
//! // Read a staged session back and add a series to it.
//! let handle = adapters
//!     .nwbfile
//!     .get(&"/data/nwb/session/sess01.nwb".to_string())
//!     .unwrap();
//! let series = handle.file.patch_clamp_series().next().unwrap().clone();
//! let path = adapters
//!     .patch_clamp_series
//!     .put(&SessionSeries::new(handle, series))
//!     .unwrap();
//! println!("series staged at {path}");
//! ```
//!
//! # Layout
//!
//! ```text
//! {stage}/session/{identifier}.nwb
//! {stage}/membrane_potential/{identifier}_{series}.nwb
//! ```
//!
//! Writes go through [`writer::write_nwb`]: a failed write never leaves a
//! partial file at the target path.

pub mod adapter;
pub mod adapters;
pub mod config;
pub mod error;
pub mod layout;
pub mod writer;

pub use adapter::{AttributeAdapter, AttributeType, InlineValue};
pub use adapters::{
    DeviceAdapter, IcElectrodeAdapter, NwbAdapters, NwbFileAdapter, NwbHandle, OpenSeries,
    PatchClampSeriesAdapter, SessionSeries,
};
pub use config::AdapterConfig;
pub use error::{AdapterError, ConfigError, Result};
pub use layout::StageLayout;
