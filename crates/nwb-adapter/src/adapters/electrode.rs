use nwb_container::IntracellularElectrode;
use serde_json::Value;

use crate::adapter::{map_field, str_field, AttributeAdapter, AttributeType, InlineValue};
use crate::adapters::DeviceAdapter;
use crate::error::Result;

/// Stores an [`IntracellularElectrode`] inline, nesting its device through
/// [`DeviceAdapter`]:
///
/// ```text
/// {name, device: {name}, description, filtering, location}
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct IcElectrodeAdapter {
    device: DeviceAdapter,
}

impl AttributeAdapter for IcElectrodeAdapter {
    type Value = IntracellularElectrode;
    type Output = IntracellularElectrode;
    type Token = InlineValue;

    fn attribute_type(&self) -> AttributeType {
        AttributeType::Longblob
    }

    fn put(&self, electrode: &IntracellularElectrode) -> Result<InlineValue> {
        let mut value = InlineValue::new();
        value.insert("name".to_string(), Value::String(electrode.name.clone()));
        value.insert(
            "device".to_string(),
            Value::Object(self.device.put(&electrode.device)?),
        );
        value.insert(
            "description".to_string(),
            Value::String(electrode.description.clone()),
        );
        value.insert(
            "filtering".to_string(),
            Value::String(electrode.filtering.clone()),
        );
        value.insert(
            "location".to_string(),
            Value::String(electrode.location.clone()),
        );
        Ok(value)
    }

    fn get(&self, value: &InlineValue) -> Result<IntracellularElectrode> {
        Ok(IntracellularElectrode {
            name: str_field(value, "name")?.to_string(),
            device: self.device.get(map_field(value, "device")?)?,
            description: str_field(value, "description")?.to_string(),
            filtering: str_field(value, "filtering")?.to_string(),
            location: str_field(value, "location")?.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;
    use nwb_container::Device;
    use serde_json::json;

    fn electrode() -> IntracellularElectrode {
        IntracellularElectrode::new("elec0", Device::new("amp1"))
            .with_description("test")
            .with_filtering("lowpass")
            .with_location("CA1")
    }

    #[test]
    fn test_put_nests_device() {
        let stored = IcElectrodeAdapter::default().put(&electrode()).unwrap();
        assert_eq!(
            Value::Object(stored),
            json!({
                "name": "elec0",
                "device": {"name": "amp1"},
                "description": "test",
                "filtering": "lowpass",
                "location": "CA1",
            })
        );
    }

    #[test]
    fn test_round_trip() {
        let adapter = IcElectrodeAdapter::default();
        let original = electrode();
        let restored = adapter.get(&adapter.put(&original).unwrap()).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_missing_nested_device_name() {
        let value = json!({
            "name": "elec0",
            "device": {},
            "description": "",
            "filtering": "",
            "location": "",
        });
        let err = IcElectrodeAdapter::default()
            .get(value.as_object().unwrap())
            .unwrap_err();
        assert!(matches!(err, AdapterError::MissingField { ref field } if field == "name"));
    }

    #[test]
    fn test_missing_location() {
        let mut stored = IcElectrodeAdapter::default().put(&electrode()).unwrap();
        stored.remove("location");
        let err = IcElectrodeAdapter::default().get(&stored).unwrap_err();
        assert!(matches!(err, AdapterError::MissingField { ref field } if field == "location"));
    }
}
