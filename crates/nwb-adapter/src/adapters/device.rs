use nwb_container::Device;
use serde_json::Value;

use crate::adapter::{str_field, AttributeAdapter, AttributeType, InlineValue};
use crate::error::Result;

/// Stores a [`Device`] inline as `{name}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceAdapter;

impl AttributeAdapter for DeviceAdapter {
    type Value = Device;
    type Output = Device;
    type Token = InlineValue;

    fn attribute_type(&self) -> AttributeType {
        AttributeType::Longblob
    }

    fn put(&self, device: &Device) -> Result<InlineValue> {
        let mut value = InlineValue::new();
        value.insert("name".to_string(), Value::String(device.name.clone()));
        Ok(value)
    }

    fn get(&self, value: &InlineValue) -> Result<Device> {
        Ok(Device::new(str_field(value, "name")?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;
    use serde_json::json;

    #[test]
    fn test_round_trip() {
        let adapter = DeviceAdapter;
        let stored = adapter.put(&Device::new("amp1")).unwrap();
        assert_eq!(Value::Object(stored.clone()), json!({"name": "amp1"}));
        assert_eq!(adapter.get(&stored).unwrap(), Device::new("amp1"));
    }

    #[test]
    fn test_missing_name() {
        let err = DeviceAdapter.get(&InlineValue::new()).unwrap_err();
        assert!(matches!(err, AdapterError::MissingField { ref field } if field == "name"));
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let value = json!({"name": "amp1", "serial": "X-1"});
        let device = DeviceAdapter.get(value.as_object().unwrap()).unwrap();
        assert_eq!(device.name, "amp1");
    }
}
