//! Reading and writing whole containers.
//!
//! The body is an object registry in definitional order plus per-collection
//! id lists. Cross-references (electrode to device, series to electrode) are
//! stored as object ids and resolved on read.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::ContainerError;
use crate::format::{self, BodyChecksum};
use crate::manager::{ReadSession, WriteManager};
use crate::model::{
    Acquisition, Device, IntracellularElectrode, NeurodataType, NwbFile, PatchClampSeries,
    TimeSeries,
};

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    identifier: String,
    session_description: String,
    session_start_time: DateTime<Utc>,
    objects: Vec<StoredObject>,
    devices: Vec<Uuid>,
    ic_electrodes: Vec<Uuid>,
    acquisition: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "neurodata_type")]
enum StoredObject {
    Device {
        object_id: Uuid,
        name: String,
    },
    IntracellularElectrode {
        object_id: Uuid,
        name: String,
        device: Uuid,
        description: String,
        filtering: String,
        location: String,
    },
    PatchClampSeries {
        object_id: Uuid,
        name: String,
        electrode: Uuid,
        #[serde(with = "samples")]
        data: Vec<f64>,
        #[serde(with = "samples")]
        timestamps: Vec<f64>,
        unit: String,
        #[serde(default, with = "optional_sample")]
        gain: Option<f64>,
        #[serde(default)]
        stimulus_description: Option<String>,
        #[serde(default)]
        sweep_number: Option<u32>,
    },
    TimeSeries {
        object_id: Uuid,
        name: String,
        #[serde(with = "samples")]
        data: Vec<f64>,
        #[serde(with = "samples")]
        timestamps: Vec<f64>,
        unit: String,
    },
}

impl StoredObject {
    fn object_id(&self) -> Uuid {
        match self {
            StoredObject::Device { object_id, .. }
            | StoredObject::IntracellularElectrode { object_id, .. }
            | StoredObject::PatchClampSeries { object_id, .. }
            | StoredObject::TimeSeries { object_id, .. } => *object_id,
        }
    }

    fn name(&self) -> &str {
        match self {
            StoredObject::Device { name, .. }
            | StoredObject::IntracellularElectrode { name, .. }
            | StoredObject::PatchClampSeries { name, .. }
            | StoredObject::TimeSeries { name, .. } => name,
        }
    }

    fn neurodata_type(&self) -> NeurodataType {
        match self {
            StoredObject::Device { .. } => NeurodataType::Device,
            StoredObject::IntracellularElectrode { .. } => NeurodataType::IntracellularElectrode,
            StoredObject::PatchClampSeries { .. } => NeurodataType::PatchClampSeries,
            StoredObject::TimeSeries { .. } => NeurodataType::TimeSeries,
        }
    }
}

/// Serializes containers to a sink, assigning object ids through a
/// [`WriteManager`].
#[derive(Debug)]
pub struct NwbWriter<W: Write> {
    sink: W,
    manager: WriteManager,
}

impl<W: Write> NwbWriter<W> {
    /// Start a write session. Passing the manager of a previous read keeps
    /// the ids of objects that came from that file.
    pub fn new(sink: W, manager: Option<&WriteManager>) -> Self {
        Self {
            sink,
            manager: manager.cloned().unwrap_or_default(),
        }
    }

    /// Build and write the whole container graph.
    ///
    /// Nothing reaches the sink unless the graph builds, but a failing sink
    /// may be left holding part of the frame.
    pub fn write(&mut self, nwb: &NwbFile) -> Result<BodyChecksum, ContainerError> {
        let document = build(nwb, &mut self.manager)?;
        let body = serde_json::to_vec(&document).map_err(ContainerError::Encode)?;
        let checksum = format::write_frame(&mut self.sink, &body).map_err(ContainerError::Sink)?;
        self.sink.flush().map_err(ContainerError::Sink)?;
        Ok(checksum)
    }

    pub fn manager(&self) -> &WriteManager {
        &self.manager
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

/// Opens container files read-only.
pub struct NwbReader;

impl NwbReader {
    /// Read and fully deserialize the container at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<(NwbFile, ReadSession), ContainerError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| ContainerError::io(path, e))?;
        let (checksum, body) = format::read_frame(&bytes)?;
        let document: Document = serde_json::from_slice(body).map_err(ContainerError::Decode)?;

        let mut manager = WriteManager::new();
        let nwb = resolve(document, &mut manager)?;
        debug!(
            path = %path.display(),
            identifier = %nwb.identifier,
            objects = manager.len(),
            "Read NWB container"
        );

        Ok((nwb, ReadSession::new(path.to_path_buf(), checksum, manager)))
    }
}

fn check_lengths(
    kind: NeurodataType,
    name: &str,
    data: &[f64],
    timestamps: &[f64],
) -> Result<(), ContainerError> {
    if data.len() != timestamps.len() {
        return Err(ContainerError::LengthMismatch {
            kind,
            name: name.to_string(),
            data: data.len(),
            timestamps: timestamps.len(),
        });
    }
    Ok(())
}

fn build(nwb: &NwbFile, manager: &mut WriteManager) -> Result<Document, ContainerError> {
    let mut objects = Vec::new();
    let mut devices = Vec::new();
    let mut ic_electrodes = Vec::new();
    let mut acquisition = Vec::new();

    for device in nwb.devices() {
        let object_id = manager.object_id(NeurodataType::Device, &device.name);
        devices.push(object_id);
        objects.push(StoredObject::Device {
            object_id,
            name: device.name.clone(),
        });
    }

    for electrode in nwb.ic_electrodes() {
        if nwb.device(&electrode.device.name) != Some(&electrode.device) {
            return Err(ContainerError::Unattached {
                kind: NeurodataType::IntracellularElectrode,
                name: electrode.name.clone(),
                target: format!("Device {:?}", electrode.device.name),
            });
        }
        let device = manager.object_id(NeurodataType::Device, &electrode.device.name);
        let object_id = manager.object_id(NeurodataType::IntracellularElectrode, &electrode.name);
        ic_electrodes.push(object_id);
        objects.push(StoredObject::IntracellularElectrode {
            object_id,
            name: electrode.name.clone(),
            device,
            description: electrode.description.clone(),
            filtering: electrode.filtering.clone(),
            location: electrode.location.clone(),
        });
    }

    for item in nwb.acquisition() {
        let kind = item.neurodata_type();
        let stored = match item {
            Acquisition::PatchClamp(series) => {
                check_lengths(kind, &series.name, &series.data, &series.timestamps)?;
                if nwb.ic_electrode(&series.electrode.name) != Some(&series.electrode) {
                    return Err(ContainerError::Unattached {
                        kind,
                        name: series.name.clone(),
                        target: format!("IntracellularElectrode {:?}", series.electrode.name),
                    });
                }
                StoredObject::PatchClampSeries {
                    object_id: manager.object_id(kind, &series.name),
                    name: series.name.clone(),
                    electrode: manager.object_id(
                        NeurodataType::IntracellularElectrode,
                        &series.electrode.name,
                    ),
                    data: series.data.clone(),
                    timestamps: series.timestamps.clone(),
                    unit: series.unit.clone(),
                    gain: series.gain,
                    stimulus_description: series.stimulus_description.clone(),
                    sweep_number: series.sweep_number,
                }
            }
            Acquisition::TimeSeries(series) => {
                check_lengths(kind, &series.name, &series.data, &series.timestamps)?;
                StoredObject::TimeSeries {
                    object_id: manager.object_id(kind, &series.name),
                    name: series.name.clone(),
                    data: series.data.clone(),
                    timestamps: series.timestamps.clone(),
                    unit: series.unit.clone(),
                }
            }
        };
        acquisition.push(stored.object_id());
        objects.push(stored);
    }

    Ok(Document {
        identifier: nwb.identifier.clone(),
        session_description: nwb.session_description.clone(),
        session_start_time: nwb.session_start_time,
        objects,
        devices,
        ic_electrodes,
        acquisition,
    })
}

fn resolve(document: Document, manager: &mut WriteManager) -> Result<NwbFile, ContainerError> {
    for object in &document.objects {
        manager.register(object.neurodata_type(), object.name(), object.object_id());
    }
    let resolver = Resolver {
        registry: document
            .objects
            .iter()
            .map(|object| (object.object_id(), object))
            .collect(),
    };

    let mut nwb = NwbFile::new(
        document.identifier.clone(),
        document.session_description.clone(),
        document.session_start_time,
    );
    let root = format!("container {:?}", document.identifier);

    for id in &document.devices {
        nwb.add_device(resolver.device(&root, *id)?)?;
    }
    for id in &document.ic_electrodes {
        nwb.add_ic_electrode(resolver.electrode(&root, *id)?)?;
    }
    for id in &document.acquisition {
        nwb.add_acquisition(resolver.acquisition(&root, *id)?)?;
    }

    Ok(nwb)
}

struct Resolver<'a> {
    registry: HashMap<Uuid, &'a StoredObject>,
}

impl<'a> Resolver<'a> {
    fn lookup(&self, referrer: &str, target: Uuid) -> Result<&'a StoredObject, ContainerError> {
        self.registry
            .get(&target)
            .copied()
            .ok_or_else(|| ContainerError::DanglingReference {
                referrer: referrer.to_string(),
                target,
            })
    }

    fn mistyped(
        referrer: &str,
        target: Uuid,
        expected: NeurodataType,
        found: &StoredObject,
    ) -> ContainerError {
        ContainerError::MistypedReference {
            referrer: referrer.to_string(),
            target,
            expected,
            found: found.neurodata_type(),
        }
    }

    fn device(&self, referrer: &str, target: Uuid) -> Result<Device, ContainerError> {
        match self.lookup(referrer, target)? {
            StoredObject::Device { name, .. } => Ok(Device::new(name.clone())),
            other => Err(Self::mistyped(referrer, target, NeurodataType::Device, other)),
        }
    }

    fn electrode(
        &self,
        referrer: &str,
        target: Uuid,
    ) -> Result<IntracellularElectrode, ContainerError> {
        match self.lookup(referrer, target)? {
            StoredObject::IntracellularElectrode {
                name,
                device,
                description,
                filtering,
                location,
                ..
            } => Ok(IntracellularElectrode {
                name: name.clone(),
                device: self.device(&format!("IntracellularElectrode {name:?}"), *device)?,
                description: description.clone(),
                filtering: filtering.clone(),
                location: location.clone(),
            }),
            other => Err(Self::mistyped(
                referrer,
                target,
                NeurodataType::IntracellularElectrode,
                other,
            )),
        }
    }

    fn acquisition(&self, referrer: &str, target: Uuid) -> Result<Acquisition, ContainerError> {
        match self.lookup(referrer, target)? {
            StoredObject::PatchClampSeries {
                name,
                electrode,
                data,
                timestamps,
                unit,
                gain,
                stimulus_description,
                sweep_number,
                ..
            } => Ok(PatchClampSeries {
                name: name.clone(),
                electrode: self.electrode(&format!("PatchClampSeries {name:?}"), *electrode)?,
                data: data.clone(),
                timestamps: timestamps.clone(),
                unit: unit.clone(),
                gain: *gain,
                stimulus_description: stimulus_description.clone(),
                sweep_number: *sweep_number,
            }
            .into()),
            StoredObject::TimeSeries {
                name,
                data,
                timestamps,
                unit,
                ..
            } => Ok(TimeSeries::new(
                name.clone(),
                data.clone(),
                timestamps.clone(),
                unit.clone(),
            )
            .into()),
            other => Err(Self::mistyped(
                referrer,
                target,
                NeurodataType::PatchClampSeries,
                other,
            )),
        }
    }
}

/// A float that survives JSON when non-finite: NaN and the infinities are
/// written as the strings `"NaN"`, `"inf"` and `"-inf"`.
#[derive(Debug, Clone, Copy)]
struct Sample(f64);

impl Serialize for Sample {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let value = self.0;
        if value.is_finite() {
            serializer.serialize_f64(value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }
}

impl<'de> Deserialize<'de> for Sample {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct SampleVisitor;

        impl<'de> serde::de::Visitor<'de> for SampleVisitor {
            type Value = Sample;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a number or one of \"NaN\", \"inf\", \"-inf\"")
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Sample, E> {
                Ok(Sample(v))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Sample, E> {
                Ok(Sample(v as f64))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Sample, E> {
                Ok(Sample(v as f64))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Sample, E> {
                match v {
                    "NaN" => Ok(Sample(f64::NAN)),
                    "inf" => Ok(Sample(f64::INFINITY)),
                    "-inf" => Ok(Sample(f64::NEG_INFINITY)),
                    other => Err(E::invalid_value(serde::de::Unexpected::Str(other), &self)),
                }
            }
        }

        deserializer.deserialize_any(SampleVisitor)
    }
}

mod samples {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Sample;

    pub fn serialize<S>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(values.iter().map(|v| Sample(*v)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = Vec::<Sample>::deserialize(deserializer)?;
        Ok(values.into_iter().map(|s| s.0).collect())
    }
}

mod optional_sample {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Sample;

    pub fn serialize<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.map(Sample).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Sample>::deserialize(deserializer)?.map(|s| s.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    fn electrode() -> IntracellularElectrode {
        IntracellularElectrode::new("elec0", Device::new("amp1"))
            .with_description("test")
            .with_filtering("lowpass")
            .with_location("CA1")
    }

    fn populated() -> Result<NwbFile> {
        let mut nwb = NwbFile::new("sess01", "patch session", Utc::now());
        let electrode = electrode();
        nwb.add_device(electrode.device.clone())?;
        nwb.add_ic_electrode(electrode.clone())?;
        nwb.add_acquisition(
            PatchClampSeries::new("sweep1", electrode, vec![0.1, 0.2], vec![0.0, 0.1], "volts")
                .with_gain(0.02)
                .with_sweep_number(1),
        )?;
        nwb.add_acquisition(TimeSeries::new("temp", vec![36.5], vec![0.0], "C"))?;
        Ok(nwb)
    }

    fn write_to(path: &Path, nwb: &NwbFile, manager: Option<&WriteManager>) -> Result<()> {
        let file = fs::File::create(path)?;
        NwbWriter::new(file, manager).write(nwb)?;
        Ok(())
    }

    #[test]
    fn test_write_and_read_back() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("sess01.nwb");
        let nwb = populated()?;

        write_to(&path, &nwb, None)?;
        let (restored, session) = NwbReader::open(&path)?;

        assert_eq!(restored, nwb);
        assert_eq!(session.path(), path.as_path());
        assert_eq!(session.manager().len(), 4);
        Ok(())
    }

    #[test]
    fn test_shared_manager_preserves_object_ids() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let first = temp_dir.path().join("first.nwb");
        let second = temp_dir.path().join("second.nwb");

        write_to(&first, &populated()?, None)?;
        let (nwb, session) = NwbReader::open(&first)?;
        write_to(&second, &nwb, Some(session.manager()))?;
        let (_, reread) = NwbReader::open(&second)?;

        for kind in [NeurodataType::Device, NeurodataType::PatchClampSeries] {
            let name = if kind == NeurodataType::Device { "amp1" } else { "sweep1" };
            assert_eq!(
                session.manager().get(kind, name),
                reread.manager().get(kind, name)
            );
        }
        Ok(())
    }

    #[test]
    fn test_fresh_manager_mints_new_ids() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let first = temp_dir.path().join("first.nwb");
        let second = temp_dir.path().join("second.nwb");

        write_to(&first, &populated()?, None)?;
        let (nwb, session) = NwbReader::open(&first)?;
        write_to(&second, &nwb, None)?;
        let (_, reread) = NwbReader::open(&second)?;

        assert_ne!(
            session.manager().get(NeurodataType::Device, "amp1"),
            reread.manager().get(NeurodataType::Device, "amp1")
        );
        Ok(())
    }

    #[test]
    fn test_unattached_electrode_fails_build() {
        let mut nwb = NwbFile::new("sess01", "", Utc::now());
        nwb.add_ic_electrode(electrode()).unwrap();

        let mut sink = Vec::new();
        let err = NwbWriter::new(&mut sink, None).write(&nwb).unwrap_err();
        assert!(matches!(err, ContainerError::Unattached { .. }));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_length_mismatch_fails_build() -> Result<()> {
        let mut nwb = NwbFile::new("sess01", "", Utc::now());
        nwb.add_acquisition(TimeSeries::new("temp", vec![1.0, 2.0], vec![0.0], "C"))?;

        let mut sink = Vec::new();
        let err = NwbWriter::new(&mut sink, None).write(&nwb).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::LengthMismatch { data: 2, timestamps: 1, .. }
        ));
        Ok(())
    }

    #[test]
    fn test_dangling_reference_detected() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("dangling.nwb");

        let electrode_id = Uuid::new_v4();
        let document = Document {
            identifier: "sess01".to_string(),
            session_description: String::new(),
            session_start_time: Utc::now(),
            objects: vec![StoredObject::IntracellularElectrode {
                object_id: electrode_id,
                name: "elec0".to_string(),
                device: Uuid::new_v4(),
                description: String::new(),
                filtering: String::new(),
                location: String::new(),
            }],
            devices: vec![],
            ic_electrodes: vec![electrode_id],
            acquisition: vec![],
        };

        let body = serde_json::to_vec(&document)?;
        let mut file = fs::File::create(&path)?;
        format::write_frame(&mut file, &body)?;
        drop(file);

        let err = NwbReader::open(&path).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::DanglingReference { ref referrer, .. } if referrer.contains("elec0")
        ));
        Ok(())
    }

    #[test]
    fn test_non_finite_samples_round_trip() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("padded.nwb");
        let electrode = electrode();
        let mut nwb = NwbFile::new("sess01", "", Utc::now());
        nwb.add_device(electrode.device.clone())?;
        nwb.add_ic_electrode(electrode.clone())?;
        nwb.add_acquisition(
            PatchClampSeries::new(
                "sweep1",
                electrode,
                vec![f64::NAN, 0.1, f64::NEG_INFINITY],
                vec![0.0, 0.1, 0.2],
                "volts",
            )
            .with_gain(f64::INFINITY),
        )?;

        write_to(&path, &nwb, None)?;
        let (restored, _) = NwbReader::open(&path)?;

        let series = restored
            .patch_clamp_series()
            .next()
            .ok_or_else(|| anyhow::anyhow!("series missing"))?;
        assert!(series.data[0].is_nan());
        assert_eq!(series.data[1], 0.1);
        assert_eq!(series.data[2], f64::NEG_INFINITY);
        assert_eq!(series.gain, Some(f64::INFINITY));
        Ok(())
    }

    #[test]
    fn test_unknown_sample_string_is_decode_error() {
        let err = serde_json::from_str::<Sample>("\"nan\"").unwrap_err();
        assert!(err.to_string().contains("NaN"));
    }

    #[test]
    fn test_open_missing_file() {
        let err = NwbReader::open("/nonexistent/sess.nwb").unwrap_err();
        assert!(matches!(err, ContainerError::Io { .. }));
    }
}
