//! Reviewable records and their approval state

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::payload::Payload;
use super::timestamp::{format_timestamp, parse_timestamp};
use crate::error::SyncError;

/// Untyped field mapping of a stored document
pub type Fields = serde_json::Map<String, Value>;

pub const STATUS_FIELD: &str = "estado";
pub const RESPONDED_AT_FIELD: &str = "fecha_respuesta";
pub const REJECTION_REASON_FIELD: &str = "razon_rechazo";
pub const LEGACY_REJECTION_REASON_FIELD: &str = "razonRechazo";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const LEGACY_CREATED_AT_FIELD: &str = "fecha";
pub const STORE_FIELD: &str = "tienda";
pub const ZONE_FIELD: &str = "zona";

/// The reviewable collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    RepairProcess,
    RepairCost,
    Expense,
    ErrorReport,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::RepairProcess,
        Collection::RepairCost,
        Collection::Expense,
        Collection::ErrorReport,
    ];

    /// Collection name in the document store
    pub fn store_name(&self) -> &'static str {
        match self {
            Collection::RepairProcess => "proceso_reparacion",
            Collection::RepairCost => "costo_reparaciones",
            Collection::Expense => "viaticos",
            Collection::ErrorReport => "reporte_de_errores",
        }
    }

    pub fn from_store_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.store_name() == name)
    }

    /// Field the rejection reason is written to. Expense documents have always
    /// used the camel-case spelling.
    pub fn rejection_reason_field(&self) -> &'static str {
        match self {
            Collection::Expense => LEGACY_REJECTION_REASON_FIELD,
            _ => REJECTION_REASON_FIELD,
        }
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.store_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ReviewStatus {
    /// Value stored in the `estado` field
    pub fn as_stored(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pendiente",
            ReviewStatus::Accepted => "aceptado",
            ReviewStatus::Rejected => "rechazado",
        }
    }

    /// Status held by a stored document. An absent `estado` reads as pending;
    /// `None` if the value is unreadable.
    pub fn read_from(fields: &Fields) -> Option<ReviewStatus> {
        match fields.get(STATUS_FIELD) {
            None | Some(Value::Null) => Some(ReviewStatus::Pending),
            Some(Value::String(s)) => s.parse().ok(),
            Some(_) => None,
        }
    }
}

impl Display for ReviewStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_stored())
    }
}

impl FromStr for ReviewStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pendiente" | "pending" => Ok(ReviewStatus::Pending),
            "aceptado" | "accepted" => Ok(ReviewStatus::Accepted),
            "rechazado" | "rejected" => Ok(ReviewStatus::Rejected),
            _ => Err(anyhow::anyhow!("Invalid review status: {}", s)),
        }
    }
}

/// Free-text reason attached to a rejection; never empty or whitespace-only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RejectionReason(String);

impl RejectionReason {
    pub fn new(reason: impl Into<String>) -> Result<Self, SyncError> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(SyncError::Validation(
                "Debes escribir un motivo del rechazo".to_string(),
            ));
        }
        Ok(Self(reason))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RejectionReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// Approval state of a record.
///
/// `responded_at` exists exactly for the decided states and a reason exists
/// exactly for `Rejected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Review {
    Pending,
    Accepted {
        responded_at: DateTime<Utc>,
    },
    Rejected {
        responded_at: DateTime<Utc>,
        reason: RejectionReason,
    },
}

impl Review {
    pub fn status(&self) -> ReviewStatus {
        match self {
            Review::Pending => ReviewStatus::Pending,
            Review::Accepted { .. } => ReviewStatus::Accepted,
            Review::Rejected { .. } => ReviewStatus::Rejected,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Review::Pending)
    }

    pub fn responded_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Review::Pending => None,
            Review::Accepted { responded_at } | Review::Rejected { responded_at, .. } => {
                Some(*responded_at)
            }
        }
    }

    pub fn rejection_reason(&self) -> Option<&RejectionReason> {
        match self {
            Review::Rejected { reason, .. } => Some(reason),
            _ => None,
        }
    }

    fn from_fields(collection: Collection, id: &str, fields: &Fields) -> Result<Self, SyncError> {
        let malformed = |reason: &str| SyncError::malformed(collection.store_name(), id, reason);

        let status = match fields.get(STATUS_FIELD) {
            None | Some(Value::Null) => ReviewStatus::Pending,
            Some(Value::String(s)) => s
                .parse::<ReviewStatus>()
                .map_err(|e| malformed(&e.to_string()))?,
            Some(_) => return Err(malformed("estado is not a string")),
        };

        let responded_at = match fields.get(RESPONDED_AT_FIELD) {
            None | Some(Value::Null) => None,
            Some(v) => Some(
                parse_timestamp(v).ok_or_else(|| malformed("fecha_respuesta is not a timestamp"))?,
            ),
        };

        let reason = [collection.rejection_reason_field(), REJECTION_REASON_FIELD, LEGACY_REJECTION_REASON_FIELD]
            .iter()
            .find_map(|field| match fields.get(*field) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
                _ => None,
            });

        match (status, responded_at, reason) {
            (ReviewStatus::Pending, None, None) => Ok(Review::Pending),
            (ReviewStatus::Pending, Some(_), _) => {
                Err(malformed("pending record carries fecha_respuesta"))
            }
            (ReviewStatus::Pending, None, Some(_)) => {
                Err(malformed("pending record carries a rejection reason"))
            }
            (ReviewStatus::Accepted, Some(responded_at), None) => {
                Ok(Review::Accepted { responded_at })
            }
            (ReviewStatus::Accepted, _, Some(_)) => {
                Err(malformed("accepted record carries a rejection reason"))
            }
            (ReviewStatus::Rejected, Some(responded_at), Some(reason)) => Ok(Review::Rejected {
                responded_at,
                reason: RejectionReason(reason),
            }),
            (ReviewStatus::Rejected, _, None) => {
                Err(malformed("rejected record has no rejection reason"))
            }
            (_, None, _) => Err(malformed("decided record has no fecha_respuesta")),
        }
    }

    /// Write the review envelope into `fields`, removing stale envelope values.
    pub(crate) fn write_fields(&self, collection: Collection, fields: &mut Fields) {
        fields.remove(REJECTION_REASON_FIELD);
        fields.remove(LEGACY_REJECTION_REASON_FIELD);
        fields.insert(
            STATUS_FIELD.to_string(),
            Value::String(self.status().as_stored().to_string()),
        );
        match self.responded_at() {
            Some(at) => {
                fields.insert(RESPONDED_AT_FIELD.to_string(), format_timestamp(at));
            }
            None => {
                fields.remove(RESPONDED_AT_FIELD);
            }
        }
        if let Some(reason) = self.rejection_reason() {
            fields.insert(
                collection.rejection_reason_field().to_string(),
                Value::String(reason.as_str().to_string()),
            );
        }
    }
}

/// Store/zone tags used for row-level visibility
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordScope {
    pub store: Option<String>,
    pub zone: Option<String>,
}

impl RecordScope {
    fn from_fields(fields: &Fields) -> Self {
        let text = |field: &str| {
            fields
                .get(field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        Self {
            store: text(STORE_FIELD),
            zone: text(ZONE_FIELD),
        }
    }

    fn write_fields(&self, fields: &mut Fields) {
        if let Some(store) = &self.store {
            fields.insert(STORE_FIELD.to_string(), Value::String(store.clone()));
        }
        if let Some(zone) = &self.zone {
            fields.insert(ZONE_FIELD.to_string(), Value::String(zone.clone()));
        }
    }
}

/// A reviewable document normalised from the store
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: String,
    payload: Payload,
    scope: RecordScope,
    review: Review,
    created_at: DateTime<Utc>,
}

impl Record {
    /// A freshly submitted record; always starts as `Pending`.
    pub fn new(
        id: impl Into<String>,
        payload: Payload,
        scope: RecordScope,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            payload,
            scope,
            review: Review::Pending,
            created_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn collection(&self) -> Collection {
        self.payload.collection()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn scope(&self) -> &RecordScope {
        &self.scope
    }

    pub fn review(&self) -> &Review {
        &self.review
    }

    pub fn status(&self) -> ReviewStatus {
        self.review.status()
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.review.rejection_reason().map(RejectionReason::as_str)
    }

    pub fn responded_at(&self) -> Option<DateTime<Utc>> {
        self.review.responded_at()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The same record with a different review state.
    pub fn with_review(mut self, review: Review) -> Self {
        self.review = review;
        self
    }

    /// Normalise a stored document of `collection`.
    pub fn from_fields(collection: Collection, id: &str, fields: &Fields) -> Result<Self, SyncError> {
        let created_at = [CREATED_AT_FIELD, LEGACY_CREATED_AT_FIELD]
            .iter()
            .find_map(|field| fields.get(*field).and_then(parse_timestamp))
            .ok_or_else(|| {
                SyncError::malformed(collection.store_name(), id, "no creation timestamp")
            })?;

        let review = Review::from_fields(collection, id, fields)?;
        let payload = Payload::from_fields(collection, fields)
            .map_err(|e| SyncError::malformed(collection.store_name(), id, e.to_string()))?;

        Ok(Self {
            id: id.to_string(),
            payload,
            scope: RecordScope::from_fields(fields),
            review,
            created_at,
        })
    }

    /// Field mapping of this record as written to the store (without the id).
    pub fn to_fields(&self) -> Result<Fields, SyncError> {
        let mut fields = Fields::new();
        self.payload.write_fields(&mut fields)?;
        self.scope.write_fields(&mut fields);
        // createdAt always wins over a payload date stored under the legacy name
        fields.insert(CREATED_AT_FIELD.to_string(), format_timestamp(self.created_at));
        self.review.write_fields(self.collection(), &mut fields);
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payload::{Expense, RepairCost};
    use chrono::TimeZone;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_collection_store_names_round_trip() {
        for collection in Collection::ALL {
            assert_eq!(
                Collection::from_store_name(collection.store_name()),
                Some(collection)
            );
        }
        assert_eq!(Collection::from_store_name("users"), None);
    }

    #[test]
    fn test_missing_status_defaults_to_pending() {
        let raw = fields(json!({"createdAt": "2025-01-01T00:00:00Z", "totalReparacion": 10}));
        let record = Record::from_fields(Collection::RepairCost, "r1", &raw).unwrap();
        assert_eq!(record.status(), ReviewStatus::Pending);
        assert!(record.responded_at().is_none());
        assert!(record.rejection_reason().is_none());
    }

    #[test]
    fn test_read_status_from_stored_fields() {
        assert_eq!(ReviewStatus::read_from(&Fields::new()), Some(ReviewStatus::Pending));
        assert_eq!(
            ReviewStatus::read_from(&fields(json!({"estado": " Aceptado"}))),
            Some(ReviewStatus::Accepted)
        );
        assert_eq!(ReviewStatus::read_from(&fields(json!({"estado": "archivado"}))), None);
        assert_eq!(ReviewStatus::read_from(&fields(json!({"estado": 3}))), None);
    }

    #[test]
    fn test_rejected_reads_either_reason_spelling() {
        let raw = fields(json!({
            "fecha": "2025-01-01T00:00:00Z",
            "estado": "RECHAZADO",
            "fecha_respuesta": "2025-01-02T00:00:00Z",
            "razonRechazo": "Sin factura"
        }));
        let record = Record::from_fields(Collection::RepairProcess, "p1", &raw).unwrap();
        assert_eq!(record.status(), ReviewStatus::Rejected);
        assert_eq!(record.rejection_reason(), Some("Sin factura"));
    }

    #[test]
    fn test_rejected_without_reason_is_malformed() {
        let raw = fields(json!({
            "createdAt": "2025-01-01T00:00:00Z",
            "estado": "rechazado",
            "fecha_respuesta": "2025-01-02T00:00:00Z"
        }));
        let err = Record::from_fields(Collection::RepairProcess, "p1", &raw).unwrap_err();
        assert!(matches!(err, SyncError::Malformed { .. }));
    }

    #[test]
    fn test_accepted_without_response_time_is_malformed() {
        let raw = fields(json!({"createdAt": "2025-01-01T00:00:00Z", "estado": "aceptado"}));
        assert!(Record::from_fields(Collection::Expense, "v1", &raw).is_err());
    }

    #[test]
    fn test_accepted_with_null_reason_is_fine() {
        let raw = fields(json!({
            "createdAt": "2025-01-01T00:00:00Z",
            "estado": "aceptado",
            "fecha_respuesta": "2025-01-02T00:00:00Z",
            "razonRechazo": null
        }));
        let record = Record::from_fields(Collection::Expense, "v1", &raw).unwrap();
        assert_eq!(record.status(), ReviewStatus::Accepted);
    }

    #[test]
    fn test_missing_creation_time_is_malformed() {
        let raw = fields(json!({"titulo": "x"}));
        assert!(Record::from_fields(Collection::ErrorReport, "e1", &raw).is_err());
    }

    #[test]
    fn test_rejection_reason_rejects_blank() {
        assert!(RejectionReason::new("").is_err());
        assert!(RejectionReason::new("   \n").is_err());
        assert_eq!(
            RejectionReason::new(" Presupuesto excede límite").unwrap().as_str(),
            " Presupuesto excede límite"
        );
    }

    #[test]
    fn test_to_fields_round_trips_decided_record() {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        let responded = Utc.with_ymd_and_hms(2025, 1, 3, 9, 30, 0).unwrap();
        let record = Record::new(
            "v9",
            Payload::Expense(Expense {
                description: Some("Casetas".to_string()),
                ..Default::default()
            }),
            RecordScope {
                store: Some("OXXO Centro".to_string()),
                zone: None,
            },
            created,
        )
        .with_review(Review::Rejected {
            responded_at: responded,
            reason: RejectionReason::new("Falta comprobante").unwrap(),
        });

        let stored = record.to_fields().unwrap();
        assert_eq!(stored.get("razonRechazo"), Some(&json!("Falta comprobante")));
        assert!(!stored.contains_key("razon_rechazo"));
        assert_eq!(stored.get("estado"), Some(&json!("rechazado")));

        let back = Record::from_fields(Collection::Expense, "v9", &stored).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_new_record_is_pending() {
        let record = Record::new(
            "c1",
            Payload::RepairCost(RepairCost::default()),
            RecordScope::default(),
            Utc::now(),
        );
        assert!(record.review().is_pending());
        assert_eq!(record.collection(), Collection::RepairCost);
    }
}
