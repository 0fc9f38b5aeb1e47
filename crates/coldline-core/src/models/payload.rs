//! Collection-specific record payloads
//!
//! Each reviewable collection has one concrete payload shape. Field names on
//! the wire follow the documents already stored by the field application, so
//! the serde renames below are the single place where that naming lives.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::record::{Collection, Fields};

/// Repair process report ("proceso_reparacion")
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairProcess {
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub plaza: Option<String>,
    #[serde(
        rename = "directienda",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub store_address: Option<String>,
    #[serde(
        rename = "reporte",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub report_number: Option<String>,
    #[serde(
        rename = "ruta",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub route: Option<String>,
    #[serde(
        rename = "cuadrilla",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub crew: Option<String>,
    #[serde(
        rename = "urgencia",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub urgency: Option<String>,
    #[serde(
        rename = "falla_reportada",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub reported_fault: Option<String>,
    #[serde(
        rename = "reportada_por",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub reported_by: Option<String>,
    /// Media URI of the customer signature, stored verbatim
    #[serde(
        rename = "firma",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub signature_uri: Option<String>,
    #[serde(
        rename = "descripcion_diagnostico",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub diagnosis: Option<String>,
    #[serde(
        rename = "marca",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub equipment_brand: Option<String>,
    #[serde(
        rename = "modelo",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub equipment_model: Option<String>,
    #[serde(
        rename = "no_serie",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub serial_number: Option<String>,
    #[serde(
        rename = "trabajos_efectuados",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub work_performed: Option<String>,
    #[serde(
        rename = "gas_refrigerante",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub refrigerant_gas: Option<String>,
    /// Grams of refrigerant charged; stored as number or text
    #[serde(
        rename = "carga_gas",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub gas_charge: Option<String>,
    #[serde(
        rename = "motivo_carga",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub charge_reasons: Vec<String>,
    #[serde(rename = "materiales", default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<Material>,
    #[serde(
        rename = "trabajo_pendiente",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub pending_work: Option<String>,
    #[serde(
        rename = "fecha_terminacion",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_on: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Material {
    #[serde(
        rename = "concepto",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub concept: Option<String>,
    #[serde(
        rename = "cantidad",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub quantity: Option<String>,
    #[serde(
        rename = "unidad",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub unit: Option<String>,
}

/// Repair cost report ("costo_reparaciones")
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairCost {
    #[serde(
        rename = "totalReparacion",
        default,
        deserialize_with = "loose_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub total: Option<Decimal>,
    #[serde(rename = "elementos", default)]
    pub line_items: Vec<LineItem>,
}

impl RepairCost {
    /// Sum of every sub-item price across all line items.
    pub fn computed_total(&self) -> Decimal {
        self.line_items
            .iter()
            .flat_map(|item| item.sub_items.iter())
            .filter_map(|sub| sub.price)
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        rename = "nombre",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(
        rename = "fecha",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<String>,
    #[serde(rename = "subElementos", default)]
    pub sub_items: Vec<SubItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubItem {
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        rename = "nombre",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(
        rename = "precio",
        default,
        deserialize_with = "loose_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<Decimal>,
}

/// Travel expense report ("viaticos")
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    #[serde(
        rename = "tipoGasto",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub expense_type: Option<String>,
    #[serde(
        rename = "descripcion",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(
        rename = "monto",
        default,
        deserialize_with = "loose_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<Decimal>,
    #[serde(
        rename = "proveedor",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub vendor: Option<String>,
    #[serde(
        rename = "fecha",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<String>,
    /// Opaque media URIs of the receipt photos
    #[serde(rename = "comprobantes", default)]
    pub receipt_uris: Vec<String>,
}

/// In-app error report ("reporte_de_errores")
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    #[serde(
        rename = "titulo",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
    #[serde(
        rename = "descripcion",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(
        rename = "usuario",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub reported_by: Option<String>,
    #[serde(
        rename = "pantalla",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub screen: Option<String>,
}

/// Payload of a record, tagged by its collection
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    RepairProcess(RepairProcess),
    RepairCost(RepairCost),
    Expense(Expense),
    ErrorReport(ErrorReport),
}

impl Payload {
    pub fn collection(&self) -> Collection {
        match self {
            Payload::RepairProcess(_) => Collection::RepairProcess,
            Payload::RepairCost(_) => Collection::RepairCost,
            Payload::Expense(_) => Collection::Expense,
            Payload::ErrorReport(_) => Collection::ErrorReport,
        }
    }

    /// Decode the payload of `collection` from a stored field map.
    ///
    /// Fields that belong to the review envelope or to other collections are
    /// ignored.
    pub fn from_fields(collection: Collection, fields: &Fields) -> Result<Self, serde_json::Error> {
        let value = Value::Object(fields.clone());
        Ok(match collection {
            Collection::RepairProcess => Payload::RepairProcess(serde_json::from_value(value)?),
            Collection::RepairCost => Payload::RepairCost(serde_json::from_value(value)?),
            Collection::Expense => Payload::Expense(serde_json::from_value(value)?),
            Collection::ErrorReport => Payload::ErrorReport(serde_json::from_value(value)?),
        })
    }

    /// Merge the payload's fields into `fields`.
    pub fn write_fields(&self, fields: &mut Fields) -> Result<(), serde_json::Error> {
        let value = match self {
            Payload::RepairProcess(p) => serde_json::to_value(p)?,
            Payload::RepairCost(p) => serde_json::to_value(p)?,
            Payload::Expense(p) => serde_json::to_value(p)?,
            Payload::ErrorReport(p) => serde_json::to_value(p)?,
        };
        if let Value::Object(map) = value {
            fields.extend(map);
        }
        Ok(())
    }
}

fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| scalar_to_string(&v)))
}

fn loose_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Some(Value::String(s)) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    })
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_to_string).collect(),
        Some(other) => scalar_to_string(&other).into_iter().collect(),
        None => Vec::new(),
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_repair_cost_decodes_nested_items() {
        let raw = fields(json!({
            "totalReparacion": 150.0,
            "estado": "pendiente",
            "elementos": [{
                "id": 1712345678901_i64,
                "nombre": "Compresor",
                "fecha": "2025-03-01",
                "subElementos": [
                    {"id": 1, "nombre": "Capacitor", "precio": 100},
                    {"id": 2, "nombre": "Relevador", "precio": "50.00"}
                ]
            }]
        }));

        let payload = Payload::from_fields(Collection::RepairCost, &raw).unwrap();
        let Payload::RepairCost(cost) = payload else {
            panic!("expected repair cost payload");
        };
        assert_eq!(cost.total, Some(Decimal::new(15000, 2)));
        assert_eq!(cost.line_items.len(), 1);
        assert_eq!(cost.line_items[0].id.as_deref(), Some("1712345678901"));
        assert_eq!(cost.line_items[0].sub_items[1].price, Some(Decimal::new(5000, 2)));
        assert_eq!(cost.computed_total(), Decimal::new(150, 0));
    }

    #[test]
    fn test_expense_keeps_receipt_uris_verbatim() {
        let raw = fields(json!({
            "tipoGasto": "Gasolina",
            "descripcion": "Viaje a Monterrey",
            "monto": "820.50",
            "comprobantes": ["file:///data/recibo-1.jpg", "content://media/42"]
        }));

        let Payload::Expense(expense) = Payload::from_fields(Collection::Expense, &raw).unwrap()
        else {
            panic!("expected expense payload");
        };
        assert_eq!(expense.amount, Some(Decimal::new(82050, 2)));
        assert_eq!(
            expense.receipt_uris,
            vec!["file:///data/recibo-1.jpg", "content://media/42"]
        );
        assert!(expense.vendor.is_none());
    }

    #[test]
    fn test_repair_process_accepts_loose_scalars() {
        let raw = fields(json!({
            "carga_gas": 350,
            "motivo_carga": "Fuga",
            "materiales": [{"concepto": "Tubo", "cantidad": 2, "unidad": "m"}],
            "reporte": ""
        }));

        let Payload::RepairProcess(process) =
            Payload::from_fields(Collection::RepairProcess, &raw).unwrap()
        else {
            panic!("expected repair process payload");
        };
        assert_eq!(process.gas_charge.as_deref(), Some("350"));
        assert_eq!(process.charge_reasons, vec!["Fuga"]);
        assert_eq!(process.materials[0].quantity.as_deref(), Some("2"));
        assert!(process.report_number.is_none());
    }

    #[test]
    fn test_write_fields_uses_stored_names() {
        let payload = Payload::ErrorReport(ErrorReport {
            title: Some("No carga".to_string()),
            screen: Some("ViaticosScreen".to_string()),
            ..Default::default()
        });
        let mut out = Fields::new();
        payload.write_fields(&mut out).unwrap();
        assert_eq!(out.get("titulo"), Some(&json!("No carga")));
        assert_eq!(out.get("pantalla"), Some(&json!("ViaticosScreen")));
        assert!(!out.contains_key("descripcion"));
    }
}
