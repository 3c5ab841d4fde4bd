//! In-memory session container model.
//!
//! An [`NwbFile`] owns its devices, intracellular electrodes, and acquisition
//! objects by value. Collections keep insertion order, which is the order the
//! container is serialized in and the order [`NwbFile::objects`] reports.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::ContainerError;

/// Type tag carried by every object stored in a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NeurodataType {
    Device,
    IntracellularElectrode,
    PatchClampSeries,
    TimeSeries,
}

impl NeurodataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NeurodataType::Device => "Device",
            NeurodataType::IntracellularElectrode => "IntracellularElectrode",
            NeurodataType::PatchClampSeries => "PatchClampSeries",
            NeurodataType::TimeSeries => "TimeSeries",
        }
    }
}

impl fmt::Display for NeurodataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recording hardware, identified by name only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: String,
}

impl Device {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Metadata for an intracellular (patch-clamp) electrode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntracellularElectrode {
    pub name: String,
    pub device: Device,
    pub description: String,
    pub filtering: String,
    pub location: String,
}

impl IntracellularElectrode {
    pub fn new(name: impl Into<String>, device: Device) -> Self {
        Self {
            name: name.into(),
            device,
            description: String::new(),
            filtering: String::new(),
            location: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_filtering(mut self, filtering: impl Into<String>) -> Self {
        self.filtering = filtering.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}

/// A timestamped patch-clamp recording made through one electrode.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchClampSeries {
    pub name: String,
    pub electrode: IntracellularElectrode,
    pub data: Vec<f64>,
    /// Sample times in seconds, one per entry in `data`.
    pub timestamps: Vec<f64>,
    pub unit: String,
    pub gain: Option<f64>,
    pub stimulus_description: Option<String>,
    pub sweep_number: Option<u32>,
}

impl PatchClampSeries {
    pub fn new(
        name: impl Into<String>,
        electrode: IntracellularElectrode,
        data: Vec<f64>,
        timestamps: Vec<f64>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            electrode,
            data,
            timestamps,
            unit: unit.into(),
            gain: None,
            stimulus_description: None,
            sweep_number: None,
        }
    }

    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = Some(gain);
        self
    }

    pub fn with_sweep_number(mut self, sweep_number: u32) -> Self {
        self.sweep_number = Some(sweep_number);
        self
    }

    pub fn with_stimulus_description(mut self, description: impl Into<String>) -> Self {
        self.stimulus_description = Some(description.into());
        self
    }
}

/// A generic acquisition series with no electrode attached.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub name: String,
    pub data: Vec<f64>,
    pub timestamps: Vec<f64>,
    pub unit: String,
}

impl TimeSeries {
    pub fn new(
        name: impl Into<String>,
        data: Vec<f64>,
        timestamps: Vec<f64>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data,
            timestamps,
            unit: unit.into(),
        }
    }
}

/// Anything that can sit in a container's acquisition group.
#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition {
    PatchClamp(PatchClampSeries),
    TimeSeries(TimeSeries),
}

impl Acquisition {
    pub fn name(&self) -> &str {
        match self {
            Acquisition::PatchClamp(series) => &series.name,
            Acquisition::TimeSeries(series) => &series.name,
        }
    }

    pub fn neurodata_type(&self) -> NeurodataType {
        match self {
            Acquisition::PatchClamp(_) => NeurodataType::PatchClampSeries,
            Acquisition::TimeSeries(_) => NeurodataType::TimeSeries,
        }
    }

    pub fn as_patch_clamp(&self) -> Option<&PatchClampSeries> {
        match self {
            Acquisition::PatchClamp(series) => Some(series),
            Acquisition::TimeSeries(_) => None,
        }
    }
}

impl From<PatchClampSeries> for Acquisition {
    fn from(series: PatchClampSeries) -> Self {
        Acquisition::PatchClamp(series)
    }
}

impl From<TimeSeries> for Acquisition {
    fn from(series: TimeSeries) -> Self {
        Acquisition::TimeSeries(series)
    }
}

/// Borrowed view of one object in a container, tagged with its type.
#[derive(Debug, Clone, Copy)]
pub enum ObjectRef<'a> {
    Device(&'a Device),
    IntracellularElectrode(&'a IntracellularElectrode),
    Acquisition(&'a Acquisition),
}

impl ObjectRef<'_> {
    pub fn name(&self) -> &str {
        match self {
            ObjectRef::Device(d) => &d.name,
            ObjectRef::IntracellularElectrode(e) => &e.name,
            ObjectRef::Acquisition(a) => a.name(),
        }
    }

    pub fn neurodata_type(&self) -> NeurodataType {
        match self {
            ObjectRef::Device(_) => NeurodataType::Device,
            ObjectRef::IntracellularElectrode(_) => NeurodataType::IntracellularElectrode,
            ObjectRef::Acquisition(a) => a.neurodata_type(),
        }
    }
}

/// The top-level recording unit.
#[derive(Debug, Clone, PartialEq)]
pub struct NwbFile {
    pub identifier: String,
    pub session_description: String,
    pub session_start_time: DateTime<Utc>,
    devices: Vec<Device>,
    ic_electrodes: Vec<IntracellularElectrode>,
    acquisition: Vec<Acquisition>,
}

impl NwbFile {
    pub fn new(
        identifier: impl Into<String>,
        session_description: impl Into<String>,
        session_start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            session_description: session_description.into(),
            session_start_time,
            devices: Vec::new(),
            ic_electrodes: Vec::new(),
            acquisition: Vec::new(),
        }
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn ic_electrodes(&self) -> &[IntracellularElectrode] {
        &self.ic_electrodes
    }

    pub fn acquisition(&self) -> &[Acquisition] {
        &self.acquisition
    }

    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name == name)
    }

    pub fn ic_electrode(&self, name: &str) -> Option<&IntracellularElectrode> {
        self.ic_electrodes.iter().find(|e| e.name == name)
    }

    pub fn get_acquisition(&self, name: &str) -> Option<&Acquisition> {
        self.acquisition.iter().find(|a| a.name() == name)
    }

    /// Attach a device. Re-adding an identical device is a no-op.
    pub fn add_device(&mut self, device: Device) -> Result<(), ContainerError> {
        attach(&mut self.devices, device, NeurodataType::Device, |d| d.name.as_str())
    }

    /// Attach an electrode. Its device must be attached separately.
    pub fn add_ic_electrode(
        &mut self,
        electrode: IntracellularElectrode,
    ) -> Result<(), ContainerError> {
        attach(
            &mut self.ic_electrodes,
            electrode,
            NeurodataType::IntracellularElectrode,
            |e| e.name.as_str(),
        )
    }

    pub fn add_acquisition(
        &mut self,
        acquisition: impl Into<Acquisition>,
    ) -> Result<(), ContainerError> {
        let acquisition = acquisition.into();
        let kind = acquisition.neurodata_type();
        attach(&mut self.acquisition, acquisition, kind, Acquisition::name)
    }

    /// Every object in the container, in definitional order: devices,
    /// electrodes, then acquisition.
    pub fn objects(&self) -> impl Iterator<Item = ObjectRef<'_>> {
        self.devices
            .iter()
            .map(ObjectRef::Device)
            .chain(self.ic_electrodes.iter().map(ObjectRef::IntracellularElectrode))
            .chain(self.acquisition.iter().map(ObjectRef::Acquisition))
    }

    /// Patch-clamp series in acquisition order.
    pub fn patch_clamp_series(&self) -> impl Iterator<Item = &PatchClampSeries> {
        self.acquisition.iter().filter_map(Acquisition::as_patch_clamp)
    }
}

/// Names are unique per collection; an equal object under a taken name is
/// accepted without being pushed again.
fn attach<T: PartialEq>(
    items: &mut Vec<T>,
    item: T,
    kind: NeurodataType,
    name: impl Fn(&T) -> &str,
) -> Result<(), ContainerError> {
    match items.iter().find(|existing| name(*existing) == name(&item)) {
        Some(existing) if *existing == item => Ok(()),
        Some(_) => Err(ContainerError::DuplicateName {
            kind,
            name: name(&item).to_string(),
        }),
        None => {
            items.push(item);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> NwbFile {
        NwbFile::new("sess01", "patch session", Utc::now())
    }

    fn electrode() -> IntracellularElectrode {
        IntracellularElectrode::new("elec0", Device::new("amp1"))
            .with_description("test")
            .with_filtering("lowpass")
            .with_location("CA1")
    }

    #[test]
    fn test_add_same_device_twice_is_noop() {
        let mut nwb = session();
        nwb.add_device(Device::new("amp1")).unwrap();
        nwb.add_device(Device::new("amp1")).unwrap();
        assert_eq!(nwb.devices().len(), 1);
    }

    #[test]
    fn test_conflicting_electrode_is_rejected() {
        let mut nwb = session();
        nwb.add_ic_electrode(electrode()).unwrap();

        let err = nwb
            .add_ic_electrode(electrode().with_location("CA3"))
            .unwrap_err();
        assert!(matches!(
            err,
            ContainerError::DuplicateName { kind: NeurodataType::IntracellularElectrode, ref name } if name == "elec0"
        ));
        assert_eq!(nwb.ic_electrode("elec0").unwrap().location, "CA1");
    }

    #[test]
    fn test_objects_in_definitional_order() {
        let mut nwb = session();
        nwb.add_acquisition(TimeSeries::new("temp", vec![1.0], vec![0.0], "C"))
            .unwrap();
        nwb.add_ic_electrode(electrode()).unwrap();
        nwb.add_device(Device::new("amp1")).unwrap();

        let tags: Vec<_> = nwb.objects().map(|o| o.neurodata_type()).collect();
        assert_eq!(
            tags,
            vec![
                NeurodataType::Device,
                NeurodataType::IntracellularElectrode,
                NeurodataType::TimeSeries,
            ]
        );
    }

    #[test]
    fn test_patch_clamp_filter_skips_other_acquisition() {
        let mut nwb = session();
        nwb.add_acquisition(TimeSeries::new("temp", vec![], vec![], "C"))
            .unwrap();
        nwb.add_acquisition(PatchClampSeries::new(
            "sweep1",
            electrode(),
            vec![0.1],
            vec![0.0],
            "volts",
        ))
        .unwrap();

        let names: Vec<_> = nwb.patch_clamp_series().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["sweep1"]);
    }

    #[test]
    fn test_neurodata_type_display() {
        assert_eq!(NeurodataType::PatchClampSeries.to_string(), "PatchClampSeries");
    }
}
