//! Conversion between domain records and Firestore's typed value JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::domain::{GeoPoint, Session, SessionId, Staff, StaffId, StaffLocation, StaffRole};
use crate::store::StoreError;

pub(crate) type Fields = Map<String, Value>;

pub(crate) fn string(value: &str) -> Value {
    json!({ "stringValue": value })
}

pub(crate) fn double(value: f64) -> Value {
    json!({ "doubleValue": value })
}

pub(crate) fn boolean(value: bool) -> Value {
    json!({ "booleanValue": value })
}

pub(crate) fn timestamp(value: DateTime<Utc>) -> Value {
    json!({ "timestampValue": value.to_rfc3339_opts(SecondsFormat::Micros, true) })
}

pub(crate) fn optional_timestamp(value: Option<DateTime<Utc>>) -> Value {
    value.map_or_else(null, timestamp)
}

pub(crate) fn null() -> Value {
    json!({ "nullValue": null })
}

pub(crate) fn point(value: GeoPoint) -> Value {
    json!({
        "mapValue": {
            "fields": {
                "latitude": double(value.latitude),
                "longitude": double(value.longitude),
            }
        }
    })
}

fn optional_point(value: Option<GeoPoint>) -> Value {
    value.map_or_else(null, point)
}

fn read_string(fields: &Fields, key: &str) -> Option<String> {
    fields
        .get(key)?
        .get("stringValue")?
        .as_str()
        .map(str::to_string)
}

fn read_f64(fields: &Fields, key: &str) -> Option<f64> {
    let value = fields.get(key)?;
    if let Some(number) = value.get("doubleValue").and_then(Value::as_f64) {
        return Some(number);
    }
    // integerValue arrives as a decimal string
    value
        .get("integerValue")
        .and_then(|raw| match raw {
            Value::String(text) => text.parse::<i64>().ok(),
            other => other.as_i64(),
        })
        .map(|number| number as f64)
}

fn read_bool(fields: &Fields, key: &str) -> Option<bool> {
    fields.get(key)?.get("booleanValue")?.as_bool()
}

fn read_timestamp(fields: &Fields, key: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
    let Some(raw) = fields
        .get(key)
        .and_then(|value| value.get("timestampValue"))
        .and_then(Value::as_str)
    else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| Some(parsed.with_timezone(&Utc)))
        .map_err(|err| StoreError::Decode(format!("{key}: {err}")))
}

fn require_timestamp(fields: &Fields, key: &str) -> Result<DateTime<Utc>, StoreError> {
    read_timestamp(fields, key)?.ok_or_else(|| StoreError::Decode(format!("{key} is missing")))
}

fn read_point(fields: &Fields, key: &str) -> Option<GeoPoint> {
    let inner = fields
        .get(key)?
        .get("mapValue")?
        .get("fields")?
        .as_object()?;
    Some(GeoPoint::new(
        read_f64(inner, "latitude")?,
        read_f64(inner, "longitude")?,
    ))
}

/// Document id from a full resource name (`projects/.../documents/<collection>/<id>`).
pub(crate) fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// A record that lives in one Firestore collection.
pub(crate) trait FirestoreRecord: Sized {
    const COLLECTION: &'static str;

    fn document_key(&self) -> &str;
    fn to_fields(&self) -> Fields;
    fn from_fields(id: &str, fields: &Fields) -> Result<Self, StoreError>;
}

impl FirestoreRecord for Staff {
    const COLLECTION: &'static str = "staff";

    fn document_key(&self) -> &str {
        self.id.as_str()
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("id".into(), string(self.id.as_str()));
        fields.insert("name".into(), string(&self.name));
        fields.insert("email".into(), string(&self.email));
        fields.insert("photoUrl".into(), string(&self.photo_url));
        fields.insert("contactNumber".into(), string(&self.contact_number));
        fields.insert("bloodGroup".into(), string(&self.blood_group));
        fields.insert("address".into(), string(&self.address));
        fields.insert("isActive".into(), boolean(self.is_active));
        fields.insert(
            "lastCheckInTime".into(),
            optional_timestamp(self.last_check_in_time),
        );
        fields.insert(
            "lastCheckOutTime".into(),
            optional_timestamp(self.last_check_out_time),
        );
        fields.insert("role".into(), string(self.role.as_str()));
        fields
    }

    fn from_fields(id: &str, fields: &Fields) -> Result<Self, StoreError> {
        let text = |key: &str| read_string(fields, key).unwrap_or_default();
        Ok(Self {
            id: StaffId(id.to_string()),
            name: text("name"),
            email: text("email"),
            photo_url: text("photoUrl"),
            contact_number: text("contactNumber"),
            blood_group: text("bloodGroup"),
            address: text("address"),
            is_active: read_bool(fields, "isActive").unwrap_or(false),
            last_check_in_time: read_timestamp(fields, "lastCheckInTime")?,
            last_check_out_time: read_timestamp(fields, "lastCheckOutTime")?,
            role: read_string(fields, "role")
                .and_then(|role| StaffRole::parse(&role))
                .unwrap_or_default(),
        })
    }
}

impl FirestoreRecord for Session {
    const COLLECTION: &'static str = "sessions";

    fn document_key(&self) -> &str {
        self.id.as_str()
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("id".into(), string(self.id.as_str()));
        fields.insert("staffId".into(), string(self.staff_id.as_str()));
        fields.insert("checkInTime".into(), timestamp(self.check_in_time));
        fields.insert(
            "checkOutTime".into(),
            optional_timestamp(self.check_out_time),
        );
        fields.insert("isActive".into(), boolean(self.is_active));
        fields.insert(
            "checkInLocation".into(),
            optional_point(self.check_in_location),
        );
        fields.insert(
            "checkOutLocation".into(),
            optional_point(self.check_out_location),
        );
        fields
    }

    fn from_fields(id: &str, fields: &Fields) -> Result<Self, StoreError> {
        Ok(Self {
            id: SessionId(id.to_string()),
            staff_id: StaffId(read_string(fields, "staffId").unwrap_or_default()),
            check_in_time: require_timestamp(fields, "checkInTime")?,
            check_out_time: read_timestamp(fields, "checkOutTime")?,
            is_active: read_bool(fields, "isActive").unwrap_or(false),
            check_in_location: read_point(fields, "checkInLocation"),
            check_out_location: read_point(fields, "checkOutLocation"),
        })
    }
}

impl FirestoreRecord for StaffLocation {
    const COLLECTION: &'static str = "locations";

    fn document_key(&self) -> &str {
        &self.id
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("id".into(), string(&self.id));
        fields.insert("staffId".into(), string(self.staff_id.as_str()));
        fields.insert("timestamp".into(), timestamp(self.timestamp));
        fields.insert("latitude".into(), double(self.latitude));
        fields.insert("longitude".into(), double(self.longitude));
        fields.insert("accuracy".into(), double(f64::from(self.accuracy)));
        fields.insert("provider".into(), string(&self.provider));
        fields.insert(
            "sessionId".into(),
            string(self.session_id.as_ref().map_or("", SessionId::as_str)),
        );
        fields
    }

    fn from_fields(id: &str, fields: &Fields) -> Result<Self, StoreError> {
        let latitude = read_f64(fields, "latitude")
            .ok_or_else(|| StoreError::Decode("latitude is missing".to_string()))?;
        let longitude = read_f64(fields, "longitude")
            .ok_or_else(|| StoreError::Decode("longitude is missing".to_string()))?;
        Ok(Self {
            id: id.to_string(),
            staff_id: StaffId(read_string(fields, "staffId").unwrap_or_default()),
            timestamp: require_timestamp(fields, "timestamp")?,
            latitude,
            longitude,
            accuracy: read_f64(fields, "accuracy").unwrap_or(0.0) as f32,
            provider: read_string(fields, "provider").unwrap_or_default(),
            session_id: read_string(fields, "sessionId")
                .filter(|value| !value.is_empty())
                .map(SessionId),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 5, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn open_session_encodes_nulls_and_reads_back() {
        let session = Session {
            id: SessionId::from("session1"),
            staff_id: StaffId::from("staff1"),
            check_in_time: instant(),
            check_out_time: None,
            is_active: true,
            check_in_location: Some(GeoPoint::new(40.7128, -74.006)),
            check_out_location: None,
        };
        let fields = session.to_fields();
        assert_eq!(fields["checkOutTime"], null());
        assert_eq!(
            fields["checkInTime"]["timestampValue"],
            "2023-05-01T09:00:00.000000Z"
        );

        let decoded = Session::from_fields("session1", &fields).expect("decodes");
        assert_eq!(decoded, session);
    }

    #[test]
    fn location_accepts_integer_coordinates_from_other_writers() {
        let raw = json!({
            "staffId": { "stringValue": "staff1" },
            "timestamp": { "timestampValue": "2023-05-01T10:00:00Z" },
            "latitude": { "integerValue": "40" },
            "longitude": { "doubleValue": -74.5 },
            "provider": { "stringValue": "fused" },
            "sessionId": { "stringValue": "" }
        });
        let fields = raw.as_object().expect("object").clone();
        let location = StaffLocation::from_fields("loc9", &fields).expect("decodes");
        assert_eq!(location.latitude, 40.0);
        assert_eq!(location.accuracy, 0.0);
        assert_eq!(location.session_id, None);
    }

    #[test]
    fn staff_role_defaults_when_unknown() {
        let raw = json!({
            "name": { "stringValue": "Jane Smith" },
            "role": { "stringValue": "contractor" },
            "isActive": { "booleanValue": true }
        });
        let fields = raw.as_object().expect("object").clone();
        let staff = Staff::from_fields("staff2", &fields).expect("decodes");
        assert_eq!(staff.role, StaffRole::Staff);
        assert!(staff.is_active);
        assert_eq!(staff.id, StaffId::from("staff2"));
    }

    #[test]
    fn missing_check_in_time_is_a_decode_error() {
        let fields = Fields::new();
        let err = Session::from_fields("broken", &fields).expect_err("missing timestamp");
        assert!(err.to_string().contains("checkInTime"));
    }

    #[test]
    fn document_id_takes_last_path_segment() {
        assert_eq!(
            document_id("projects/p/databases/(default)/documents/staff/staff1"),
            "staff1"
        );
    }
}
