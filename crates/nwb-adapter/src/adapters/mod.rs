//! The four NWB adapters and the registry that wires them to one stage.

mod device;
mod electrode;
mod nwbfile;
mod patch_clamp;

pub use device::DeviceAdapter;
pub use electrode::IcElectrodeAdapter;
pub use nwbfile::{NwbFileAdapter, NwbHandle};
pub use patch_clamp::{OpenSeries, PatchClampSeriesAdapter, SessionSeries};

use crate::config::AdapterConfig;
use crate::error::Result;
use crate::layout::StageLayout;

/// One instance of every adapter, sharing a stage layout.
#[derive(Debug, Clone)]
pub struct NwbAdapters {
    pub nwbfile: NwbFileAdapter,
    pub device: DeviceAdapter,
    pub ic_electrode: IcElectrodeAdapter,
    pub patch_clamp_series: PatchClampSeriesAdapter,
    layout: StageLayout,
}

impl NwbAdapters {
    /// Load configuration from the standard locations and build the adapters.
    pub fn load() -> Result<Self> {
        Self::from_config(&AdapterConfig::load()?)
    }

    /// Build the adapters, creating the stage directories if needed.
    pub fn from_config(config: &AdapterConfig) -> Result<Self> {
        let layout = StageLayout::from_config(config);
        layout.ensure()?;

        Ok(Self {
            nwbfile: NwbFileAdapter::new(config.store_name.clone(), layout.clone()),
            device: DeviceAdapter,
            ic_electrode: IcElectrodeAdapter::default(),
            patch_clamp_series: PatchClampSeriesAdapter::new(
                config.store_name.clone(),
                layout.clone(),
            ),
            layout,
        })
    }

    pub fn layout(&self) -> &StageLayout {
        &self.layout
    }
}
