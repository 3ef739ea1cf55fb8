//! Raw vendor rows to normalized observations.

use serde_json::{json, Map, Value};
use time::UtcOffset;
use tracing::{debug, warn};

use crate::domain::timestamp::localize;
use crate::domain::{
    as_coordinate, as_text, is_truthy, Location, Observation, RawRecord, OBSERVATION_TYPE,
    SUBJECT_GROUP, SUBJECT_TYPE,
};
use crate::vendor::{Field, FieldSchema};
use crate::DecodeError;

const MOVING_STATUS: &str = "Moving";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConvertOptions {
    /// Drop every record whose status is not exactly `Moving`.
    pub moving_only: bool,
}

/// Converts one row.
///
/// `Ok(None)` means the row was bad data or filtered out and has been
/// logged. An arity mismatch is returned as an error and must not be skipped.
pub fn convert(
    record: &RawRecord,
    schema: FieldSchema,
    offset: UtcOffset,
    options: ConvertOptions,
) -> Result<Option<Observation>, DecodeError> {
    if record.len() != schema.arity() {
        return Err(DecodeError::Arity {
            schema: schema.name(),
            expected: schema.arity(),
            actual: record.len(),
        });
    }

    let field = |wanted: Field| value_of(record, schema, wanted);

    let sensor_id = field(Field::UnitId);
    let gps_time = field(Field::GpsTime);
    let latitude = field(Field::Latitude);
    let longitude = field(Field::Longitude);

    if ![sensor_id, gps_time, latitude, longitude]
        .into_iter()
        .all(is_truthy)
    {
        warn!(
            sensor_id = %sensor_id,
            gps_time = %gps_time,
            latitude = %latitude,
            longitude = %longitude,
            "bad data from vendor, skipping record"
        );
        return Ok(None);
    }

    let (Some(lat), Some(lon)) = (as_coordinate(latitude), as_coordinate(longitude)) else {
        warn!(
            sensor_id = %sensor_id,
            latitude = %latitude,
            longitude = %longitude,
            "non-numeric coordinates from vendor, skipping record"
        );
        return Ok(None);
    };
    // String coordinates such as "0" pass the presence test.
    if lat == 0.0 || lon == 0.0 {
        warn!(
            sensor_id = %sensor_id,
            gps_time = %gps_time,
            latitude = %latitude,
            longitude = %longitude,
            "bad data from vendor, skipping record"
        );
        return Ok(None);
    }

    let Some(recorded_at) = localize(&as_text(gps_time), offset) else {
        warn!(sensor_id = %sensor_id, gps_time = %gps_time, "unparseable gps_time, skipping record");
        return Ok(None);
    };

    let status = as_text(field(Field::Status));
    if options.moving_only && status != MOVING_STATUS {
        debug!(sensor_id = %sensor_id, status = %status, "ignoring record that is not moving");
        return Ok(None);
    }

    let mut additional = Map::new();
    for (candidate, value) in schema.fields().iter().zip(record.values()) {
        if let Some(key) = candidate.additional_key() {
            additional.insert(String::from(key), value.clone());
        }
    }
    additional.insert(String::from("status"), Value::String(status));
    additional.insert(String::from("subject_groups"), json!([SUBJECT_GROUP]));

    Ok(Some(Observation {
        source: as_text(sensor_id),
        source_name: as_text(field(Field::UnitName)),
        subject_type: String::from(SUBJECT_TYPE),
        kind: String::from(OBSERVATION_TYPE),
        recorded_at,
        location: Location { lat, lon },
        additional,
    }))
}

fn value_of(record: &RawRecord, schema: FieldSchema, field: Field) -> &Value {
    schema
        .position(field)
        .and_then(|index| record.get(index))
        .unwrap_or(&Value::Null)
}

/// Converts a whole data set, keeping input order and dropping bad rows.
pub fn convert_all(
    records: &[RawRecord],
    schema: FieldSchema,
    offset: UtcOffset,
    options: ConvertOptions,
) -> Result<Vec<Observation>, DecodeError> {
    let mut observations = Vec::with_capacity(records.len());
    for record in records {
        if let Some(observation) = convert(record, schema, offset, options)? {
            observations.push(observation);
        }
    }
    Ok(observations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timestamp::hours_offset;

    fn basic_record(latitude: Value, status: &str) -> RawRecord {
        RawRecord::new(vec![
            json!("sensor1"),
            json!("Vehicle1"),
            json!("Org1"),
            json!("2023-01-01 10:00:00"),
            json!(status),
            latitude,
            json!(-74.006),
            json!(1000),
            json!(60),
        ])
    }

    #[test]
    fn valid_record_becomes_observation() {
        let offset = hours_offset(-5).expect("valid");
        let observation = convert(
            &basic_record(json!(40.7128), "Moving"),
            FieldSchema::Basic,
            offset,
            ConvertOptions::default(),
        )
        .expect("arity matches")
        .expect("record is valid");

        assert_eq!(observation.source, "sensor1");
        assert_eq!(observation.source_name, "Vehicle1");
        assert_eq!(observation.kind, "tracking-device");
        assert_eq!(observation.subject_type, "security_vehicle");
        assert_eq!(observation.recorded_at_iso(), "2023-01-01T10:00:00-05:00");
        assert_eq!(observation.location, Location { lat: 40.7128, lon: -74.006 });
        assert_eq!(observation.additional["sensor_id"], "sensor1");
        assert_eq!(observation.additional["org_name"], "Org1");
        assert_eq!(observation.additional["distance"], 1000);
        assert_eq!(observation.additional["speed"], 60);
        assert_eq!(observation.additional["subject_groups"], json!(["Vehicles"]));
        assert!(observation.additional.get("hdop").is_none());
    }

    #[test]
    fn falsy_required_fields_are_skipped() {
        for latitude in [json!(null), json!(""), json!(0), json!("0"), json!("0.0")] {
            let result = convert(
                &basic_record(latitude.clone(), "Moving"),
                FieldSchema::Basic,
                UtcOffset::UTC,
                ConvertOptions::default(),
            )
            .expect("arity matches");
            assert!(result.is_none(), "latitude {latitude} must be rejected");
        }
    }

    #[test]
    fn zero_string_longitude_is_skipped() {
        let mut values = basic_record(json!("40.7128"), "Moving").values().to_vec();
        values[6] = json!("0");
        let result = convert(
            &RawRecord::new(values),
            FieldSchema::Basic,
            UtcOffset::UTC,
            ConvertOptions::default(),
        )
        .expect("arity matches");
        assert!(result.is_none());
    }

    #[test]
    fn numeric_status_is_stored_as_text() {
        let mut values = basic_record(json!(40.7128), "Moving").values().to_vec();
        values[4] = json!(3);
        let observation = convert(
            &RawRecord::new(values),
            FieldSchema::Basic,
            UtcOffset::UTC,
            ConvertOptions::default(),
        )
        .expect("arity matches")
        .expect("valid record");
        assert_eq!(observation.additional["status"], json!("3"));
        assert_eq!(observation.status(), "3");
    }

    #[test]
    fn non_numeric_coordinates_are_skipped() {
        let result = convert(
            &basic_record(json!("north"), "Moving"),
            FieldSchema::Basic,
            UtcOffset::UTC,
            ConvertOptions::default(),
        )
        .expect("arity matches");
        assert!(result.is_none());
    }

    #[test]
    fn arity_mismatch_is_an_error() {
        let record = RawRecord::new(vec![json!("sensor1"), json!("Vehicle1")]);
        let error = convert(
            &record,
            FieldSchema::Basic,
            UtcOffset::UTC,
            ConvertOptions::default(),
        )
        .expect_err("must fail");
        assert_eq!(
            error,
            DecodeError::Arity {
                schema: "basic",
                expected: 9,
                actual: 2
            }
        );
    }

    #[test]
    fn stationary_records_are_kept_unless_moving_only() {
        let record = basic_record(json!(40.7128), "Off");
        let kept = convert(&record, FieldSchema::Basic, UtcOffset::UTC, ConvertOptions::default())
            .expect("arity matches");
        assert_eq!(kept.map(|o| o.status().to_owned()), Some(String::from("Off")));

        let dropped = convert(
            &record,
            FieldSchema::Basic,
            UtcOffset::UTC,
            ConvertOptions { moving_only: true },
        )
        .expect("arity matches");
        assert!(dropped.is_none());
    }

    #[test]
    fn extended_schema_carries_detail_fields() {
        let record = RawRecord::new(vec![
            json!("sensor2"),
            json!("Vehicle2"),
            json!("Hilux"),
            json!("Org2"),
            json!("2023-01-01T10:00:00"),
            json!("Moving"),
            json!("-1.2921"),
            json!("36.8219"),
            json!(5000),
            json!(45),
            json!(0.9),
            json!(1600),
            json!(270),
            json!("Patrol unit"),
        ]);

        let observation = convert(
            &record,
            FieldSchema::Extended,
            UtcOffset::UTC,
            ConvertOptions::default(),
        )
        .expect("arity matches")
        .expect("record is valid");

        assert_eq!(observation.location, Location { lat: -1.2921, lon: 36.8219 });
        assert_eq!(observation.additional["asset_model"], "Hilux");
        assert_eq!(observation.additional["heading"], 270);
        assert_eq!(observation.additional["description"], "Patrol unit");
        assert_eq!(observation.recorded_at_iso(), "2023-01-01T10:00:00+00:00");
    }

    #[test]
    fn convert_all_propagates_decode_errors() {
        let records = vec![
            basic_record(json!(40.7128), "Moving"),
            RawRecord::new(vec![json!("short")]),
        ];
        assert!(convert_all(
            &records,
            FieldSchema::Basic,
            UtcOffset::UTC,
            ConvertOptions::default()
        )
        .is_err());
    }
}
