//! Firestore REST client backing the production data source.

mod codec;
mod credentials;

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use self::codec::{Fields, FirestoreRecord};
use self::credentials::AccessTokenSource;
use super::{StoreError, TrackerStore};
use crate::domain::{
    GeoPoint, Session, SessionId, Staff, StaffId, StaffLocation, StaffRole, TimeWindow,
};

pub use credentials::ServiceAccountKey;

const API_ROOT: &str = "https://firestore.googleapis.com/v1";
const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);

#[derive(Debug, Clone, Copy)]
enum FilterOp {
    Equal,
    AtLeast,
    AtMost,
}

impl FilterOp {
    const fn wire_name(self) -> &'static str {
        match self {
            Self::Equal => "EQUAL",
            Self::AtLeast => "GREATER_THAN_OR_EQUAL",
            Self::AtMost => "LESS_THAN_OR_EQUAL",
        }
    }
}

/// A single `where` clause of a structured query.
#[derive(Debug, Clone)]
struct FieldFilter {
    field: &'static str,
    op: FilterOp,
    value: Value,
}

impl FieldFilter {
    fn eq(field: &'static str, value: Value) -> Self {
        Self {
            field,
            op: FilterOp::Equal,
            value,
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "fieldFilter": {
                "field": { "fieldPath": self.field },
                "op": self.op.wire_name(),
                "value": self.value,
            }
        })
    }
}

fn window_filters(field: &'static str, window: Option<&TimeWindow>) -> Vec<FieldFilter> {
    match window {
        Some(window) => vec![
            FieldFilter {
                field,
                op: FilterOp::AtLeast,
                value: codec::timestamp(window.start),
            },
            FieldFilter {
                field,
                op: FilterOp::AtMost,
                value: codec::timestamp(window.end),
            },
        ],
        None => Vec::new(),
    }
}

/// Body for `documents:runQuery`.
fn structured_query(collection: &str, filters: &[FieldFilter], order_by: Option<&str>) -> Value {
    let mut query = json!({ "from": [{ "collectionId": collection }] });

    match filters {
        [] => {}
        [single] => {
            query["where"] = single.to_json();
        }
        many => {
            query["where"] = json!({
                "compositeFilter": {
                    "op": "AND",
                    "filters": many.iter().map(FieldFilter::to_json).collect::<Vec<_>>(),
                }
            });
        }
    }

    if let Some(field) = order_by {
        query["orderBy"] = json!([{ "field": { "fieldPath": field }, "direction": "ASCENDING" }]);
    }

    json!({ "structuredQuery": query })
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Fields,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    document: Option<Document>,
}

/// Staff, session, and location collections in a Firestore database.
pub struct FirestoreStore {
    client: reqwest::Client,
    tokens: AccessTokenSource,
    documents_url: String,
}

impl FirestoreStore {
    pub fn new(key: ServiceAccountKey) -> Result<Self, StoreError> {
        let documents_url = format!(
            "{API_ROOT}/projects/{}/databases/(default)/documents",
            key.project_id
        );
        let tokens = AccessTokenSource::new(key)?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| StoreError::Unavailable(format!("http client: {err}")))?;
        Ok(Self {
            client,
            tokens,
            documents_url,
        })
    }

    pub fn project_id(&self) -> &str {
        self.tokens.project_id()
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{collection}/{id}", self.documents_url)
    }

    async fn get<T: FirestoreRecord>(&self, id: &str) -> Result<Option<T>, StoreError> {
        let token = self.tokens.token(&self.client).await?;
        let response = self
            .client
            .get(self.document_url(T::COLLECTION, id))
            .bearer_auth(token)
            .send()
            .await
            .map_err(unavailable)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let document: Document = checked(response).await?.json().await.map_err(decode)?;
        T::from_fields(codec::document_id(&document.name), &document.fields).map(Some)
    }

    async fn set<T: FirestoreRecord>(&self, record: &T) -> Result<(), StoreError> {
        let token = self.tokens.token(&self.client).await?;
        let response = self
            .client
            .patch(self.document_url(T::COLLECTION, record.document_key()))
            .bearer_auth(token)
            .json(&json!({ "fields": record.to_fields() }))
            .send()
            .await
            .map_err(unavailable)?;
        checked(response).await?;
        debug!(collection = T::COLLECTION, id = record.document_key(), "document written");
        Ok(())
    }

    /// Patch only `fields` of an existing document; a missing document is `NotFound`.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let token = self.tokens.token(&self.client).await?;
        let mut query: Vec<(&str, &str)> = fields
            .keys()
            .map(|key| ("updateMask.fieldPaths", key.as_str()))
            .collect();
        query.push(("currentDocument.exists", "true"));

        let response = self
            .client
            .patch(self.document_url(collection, id))
            .bearer_auth(token)
            .query(&query)
            .json(&json!({ "fields": fields }))
            .send()
            .await
            .map_err(unavailable)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound);
        }
        checked(response).await?;
        Ok(())
    }

    async fn query<T: FirestoreRecord>(
        &self,
        filters: &[FieldFilter],
        order_by: Option<&str>,
    ) -> Result<Vec<T>, StoreError> {
        let token = self.tokens.token(&self.client).await?;
        let body = structured_query(T::COLLECTION, filters, order_by);
        let response = self
            .client
            .post(format!("{}:runQuery", self.documents_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;

        let results: Vec<QueryResult> = checked(response).await?.json().await.map_err(decode)?;
        results
            .into_iter()
            .filter_map(|result| result.document)
            .map(|document| T::from_fields(codec::document_id(&document.name), &document.fields))
            .collect()
    }
}

fn unavailable(err: reqwest::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn decode(err: reqwest::Error) -> StoreError {
    StoreError::Decode(err.to_string())
}

async fn checked(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Unavailable(format!(
        "document store returned {status}: {body}"
    )))
}

#[async_trait]
impl TrackerStore for FirestoreStore {
    async fn staff(&self, id: &StaffId) -> Result<Option<Staff>, StoreError> {
        self.get::<Staff>(id.as_str()).await
    }

    async fn staff_by_role(&self, role: StaffRole) -> Result<Vec<Staff>, StoreError> {
        self.query(&[FieldFilter::eq("role", codec::string(role.as_str()))], None)
            .await
    }

    async fn active_staff(&self) -> Result<Vec<Staff>, StoreError> {
        let filters = [
            FieldFilter::eq("role", codec::string(StaffRole::Staff.as_str())),
            FieldFilter::eq("isActive", codec::boolean(true)),
        ];
        self.query(&filters, None).await
    }

    async fn put_staff(&self, staff: &Staff) -> Result<(), StoreError> {
        self.set(staff).await
    }

    async fn set_staff_activity(
        &self,
        id: &StaffId,
        active: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut fields = Fields::new();
        fields.insert("isActive".into(), codec::boolean(active));
        let stamp_field = if active {
            "lastCheckInTime"
        } else {
            "lastCheckOutTime"
        };
        fields.insert(stamp_field.into(), codec::timestamp(at));
        self.update(Staff::COLLECTION, id.as_str(), fields).await
    }

    async fn save_location(&self, location: &StaffLocation) -> Result<(), StoreError> {
        self.set(location).await
    }

    async fn locations_for_staff(
        &self,
        id: &StaffId,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<StaffLocation>, StoreError> {
        let mut filters = vec![FieldFilter::eq("staffId", codec::string(id.as_str()))];
        filters.extend(window_filters("timestamp", window));
        self.query(&filters, Some("timestamp")).await
    }

    async fn put_session(&self, session: &Session) -> Result<(), StoreError> {
        self.set(session).await
    }

    async fn close_session(
        &self,
        id: &SessionId,
        at: DateTime<Utc>,
        point: GeoPoint,
    ) -> Result<(), StoreError> {
        let mut fields = Fields::new();
        fields.insert("checkOutTime".into(), codec::timestamp(at));
        fields.insert("isActive".into(), codec::boolean(false));
        fields.insert("checkOutLocation".into(), codec::point(point));
        self.update(Session::COLLECTION, id.as_str(), fields).await
    }

    async fn active_sessions(&self) -> Result<Vec<Session>, StoreError> {
        self.query(&[FieldFilter::eq("isActive", codec::boolean(true))], None)
            .await
    }

    async fn open_session_for(&self, staff: &StaffId) -> Result<Option<Session>, StoreError> {
        let filters = [
            FieldFilter::eq("staffId", codec::string(staff.as_str())),
            FieldFilter::eq("isActive", codec::boolean(true)),
        ];
        let sessions: Vec<Session> = self.query(&filters, None).await?;
        Ok(sessions
            .into_iter()
            .max_by_key(|session| session.check_in_time))
    }

    async fn sessions_for_staff(
        &self,
        id: &StaffId,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<Session>, StoreError> {
        let mut filters = vec![FieldFilter::eq("staffId", codec::string(id.as_str()))];
        filters.extend(window_filters("checkInTime", window));
        self.query(&filters, Some("checkInTime")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn single_filter_query_skips_composite_wrapper() {
        let body = structured_query(
            "staff",
            &[FieldFilter::eq("role", codec::string("staff"))],
            None,
        );
        let query = &body["structuredQuery"];
        assert_eq!(query["from"][0]["collectionId"], "staff");
        assert_eq!(query["where"]["fieldFilter"]["op"], "EQUAL");
        assert!(query.get("orderBy").is_none());
    }

    #[test]
    fn windowed_query_combines_range_and_ordering() {
        let window = TimeWindow {
            start: Utc
                .with_ymd_and_hms(2023, 5, 1, 0, 0, 0)
                .single()
                .expect("valid"),
            end: Utc
                .with_ymd_and_hms(2023, 5, 31, 23, 59, 59)
                .single()
                .expect("valid"),
        };
        let mut filters = vec![FieldFilter::eq("staffId", codec::string("staff1"))];
        filters.extend(window_filters("timestamp", Some(&window)));

        let body = structured_query("locations", &filters, Some("timestamp"));
        let query = &body["structuredQuery"];
        let clauses = query["where"]["compositeFilter"]["filters"]
            .as_array()
            .expect("composite filters");
        assert_eq!(clauses.len(), 3);
        assert_eq!(
            clauses[1]["fieldFilter"]["op"],
            "GREATER_THAN_OR_EQUAL"
        );
        assert_eq!(clauses[2]["fieldFilter"]["op"], "LESS_THAN_OR_EQUAL");
        assert_eq!(query["orderBy"][0]["field"]["fieldPath"], "timestamp");
        assert_eq!(query["orderBy"][0]["direction"], "ASCENDING");
    }
}
