use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use super::timestamp::format_iso;

pub const OBSERVATION_TYPE: &str = "tracking-device";
pub const SUBJECT_TYPE: &str = "security_vehicle";
pub const SUBJECT_GROUP: &str = "Vehicles";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

/// Normalized position report for one tracked vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub source: String,
    pub source_name: String,
    pub subject_type: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(with = "iso_offset")]
    pub recorded_at: OffsetDateTime,
    pub location: Location,
    pub additional: Map<String, Value>,
}

impl Observation {
    /// Device status as reported by the vendor, empty when absent.
    pub fn status(&self) -> &str {
        self.additional
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn recorded_at_iso(&self) -> String {
        format_iso(self.recorded_at)
    }
}

mod iso_offset {
    use serde::de::Error as DeError;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::format_description::well_known::Rfc3339;
    use time::OffsetDateTime;

    use crate::domain::timestamp::format_iso;

    pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_iso(*value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&value, &Rfc3339).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn sample() -> Observation {
        let mut additional = Map::new();
        additional.insert(String::from("status"), json!("Moving"));
        Observation {
            source: String::from("sensor1"),
            source_name: String::from("Vehicle1"),
            subject_type: String::from(SUBJECT_TYPE),
            kind: String::from(OBSERVATION_TYPE),
            recorded_at: datetime!(2023-01-01 10:00:00 -05:00),
            location: Location {
                lat: 40.7128,
                lon: -74.006,
            },
            additional,
        }
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let value = serde_json::to_value(sample()).expect("serializable");
        assert_eq!(value["type"], "tracking-device");
        assert_eq!(value["recorded_at"], "2023-01-01T10:00:00-05:00");
        assert_eq!(value["location"]["lat"], 40.7128);
        assert_eq!(value["additional"]["status"], "Moving");
    }

    #[test]
    fn deserializes_what_it_serializes() {
        let expected = sample();
        let text = serde_json::to_string(&expected).expect("serializable");
        let parsed: Observation = serde_json::from_str(&text).expect("parseable");
        assert_eq!(parsed, expected);
        assert_eq!(parsed.status(), "Moving");
    }
}
