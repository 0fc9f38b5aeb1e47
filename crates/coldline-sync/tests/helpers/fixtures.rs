use chrono::{DateTime, TimeZone, Utc};
use coldline_storage::Document;
use serde_json::{json, Value};

pub fn document(id: &str, value: Value) -> Document {
    match value {
        Value::Object(fields) => Document::new(id, fields),
        other => panic!("fixture must be an object, got {}", other),
    }
}

/// Noon UTC on the given day of March 2025
pub fn day(n: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, n, 12, 0, 0).unwrap()
}

pub fn created(n: u32) -> String {
    day(n).to_rfc3339()
}

pub fn pending_repair_cost(id: &str, total: f64, created_day: u32) -> Document {
    document(
        id,
        json!({
            "createdAt": created(created_day),
            "estado": "pendiente",
            "totalReparacion": total,
            "elementos": [{
                "id": 1,
                "nombre": "Compresor",
                "fecha": "2025-03-01",
                "subElementos": [{"id": 1, "nombre": "Capacitor", "precio": total}]
            }]
        }),
    )
}

pub fn zoned_expense(id: &str, zone: &str, created_day: u32) -> Document {
    document(
        id,
        json!({
            "createdAt": created(created_day),
            "tipoGasto": "Gasolina",
            "monto": 500,
            "zona": zone
        }),
    )
}

pub fn stored_repair_process(id: &str, store: &str, created_day: u32) -> Document {
    document(
        id,
        json!({
            "fecha": created(created_day),
            "tienda": store,
            "falla_reportada": "No enfría"
        }),
    )
}
