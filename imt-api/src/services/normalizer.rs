//! Schema normalizer
//!
//! Reshapes whatever table the prediction service returns into the
//! canonical anomaly field set: a fixed rename table (exact, case-sensitive
//! matches), sentinel fill for the three fields that must never be blank,
//! and a defensive drop of every column that is not a canonical field.
//! Already-canonical column names pass through unchanged, which makes the
//! transform idempotent.

use chrono::NaiveDate;
use serde_json::Value;

use crate::db::anomalies::AnomalyDraft;
use crate::services::spreadsheet::SheetTable;

/// Rename table: exact source header -> canonical field name
const COLUMN_RENAMES: &[(&str, &str)] = &[
    ("unit", "unit"),
    ("Num_equipement", "equipment_id"),
    ("Systeme", "system_name"),
    ("Description", "description"),
    ("Description de l'équipement", "equipment_description"),
    ("Section propriétaire", "owning_section"),
    ("Fiabilité Intégrité", "integrity_score"),
    ("Disponibilté", "availability_score"),
    ("Process Safety", "process_safety_score"),
    ("Criticité", "criticality_score"),
    ("niveau_de_priorite", "priority_level"),
    ("Date de détéction de l'anomalie", "detection_date"),
    ("last_update_date", "last_update_date"),
    ("maintenanceDate", "maintenance_date"),
    ("attachments", "attachment_key"),
];

/// Every canonical anomaly field accepted from external input. `id` is
/// deliberately absent: it is always system-assigned.
const CANONICAL_FIELDS: &[&str] = &[
    "unit",
    "equipment_id",
    "system_name",
    "description",
    "equipment_description",
    "owning_section",
    "integrity_score",
    "availability_score",
    "process_safety_score",
    "criticality_score",
    "priority_level",
    "status",
    "action_plan_description",
    "action_plan_steps",
    "action_plan_duration",
    "action_plan_resources",
    "action_plan_status",
    "notes",
    "detection_date",
    "last_update_date",
    "maintenance_date",
    "maintenance_flag",
    "maintenance_duration",
    "maintenance_window_id",
    "attachment_key",
];

/// Fields that must never be blank, with their sentinel values.
/// The equipment sentinel keeps the upstream spelling.
const SENTINELS: &[(&str, &str)] = &[
    ("unit", "UNDEFINED"),
    ("description", "NO DESCRIPTION"),
    ("equipment_description", "NO EQUIPEMENT DESCRIPTION"),
];

/// Rename, filter, and sentinel-fill a parsed table
pub fn normalize_table(table: &SheetTable) -> SheetTable {
    let mut columns: Vec<String> = Vec::new();
    let mut kept: Vec<usize> = Vec::new();

    for (index, name) in table.columns.iter().enumerate() {
        let canonical = rename(name);
        if let Some(canonical) = canonical {
            if !columns.iter().any(|c| c == canonical) {
                columns.push(canonical.to_string());
                kept.push(index);
            }
        }
    }

    let mut rows: Vec<Vec<Value>> = table
        .rows
        .iter()
        .map(|row| {
            kept.iter()
                .map(|&i| row.get(i).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    for (field, sentinel) in SENTINELS {
        match columns.iter().position(|c| c == field) {
            Some(index) => {
                for row in &mut rows {
                    if is_blank(&row[index]) {
                        row[index] = Value::String(sentinel.to_string());
                    }
                }
            }
            None => {
                columns.push(field.to_string());
                for row in &mut rows {
                    row.push(Value::String(sentinel.to_string()));
                }
            }
        }
    }

    SheetTable { columns, rows }
}

/// Build one construction payload per row of a normalized table
pub fn to_drafts(table: &SheetTable) -> Vec<AnomalyDraft> {
    table
        .rows
        .iter()
        .map(|row| {
            let mut draft = AnomalyDraft::default();
            for (column, cell) in table.columns.iter().zip(row) {
                assign(&mut draft, column, cell);
            }
            draft
        })
        .collect()
}

fn rename(name: &str) -> Option<&'static str> {
    for (source, canonical) in COLUMN_RENAMES {
        if *source == name {
            return Some(*canonical);
        }
    }
    CANONICAL_FIELDS.iter().copied().find(|f| *f == name)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn assign(draft: &mut AnomalyDraft, field: &str, cell: &Value) {
    match field {
        "unit" => draft.unit = as_text(cell),
        "equipment_id" => draft.equipment_id = as_text(cell),
        "system_name" => draft.system_name = as_text(cell),
        "description" => draft.description = as_text(cell),
        "equipment_description" => draft.equipment_description = as_text(cell),
        "owning_section" => draft.owning_section = as_text(cell),
        "integrity_score" => draft.integrity_score = as_int(cell),
        "availability_score" => draft.availability_score = as_int(cell),
        "process_safety_score" => draft.process_safety_score = as_int(cell),
        "criticality_score" => draft.criticality_score = as_int(cell),
        "priority_level" => draft.priority_level = as_text(cell),
        "status" => draft.status = as_text(cell),
        "action_plan_description" => draft.action_plan_description = as_text(cell),
        "action_plan_steps" => draft.action_plan_steps = as_json(cell),
        "action_plan_duration" => draft.action_plan_duration = as_int(cell),
        "action_plan_resources" => draft.action_plan_resources = as_json(cell),
        "action_plan_status" => draft.action_plan_status = as_text(cell),
        "notes" => draft.notes = as_text(cell),
        "detection_date" => draft.detection_date = as_date(cell),
        "last_update_date" => draft.last_update_date = as_date(cell),
        "maintenance_date" => draft.maintenance_date = as_date(cell),
        "maintenance_flag" => draft.maintenance_flag = as_bool(cell),
        "maintenance_duration" => draft.maintenance_duration = as_int(cell),
        "maintenance_window_id" => draft.maintenance_window_id = as_int(cell),
        "attachment_key" => draft.attachment_key = as_text(cell),
        _ => {}
    }
}

fn as_text(cell: &Value) -> Option<String> {
    match cell {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn as_int(cell: &Value) -> Option<i64> {
    match cell {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_bool(cell: &Value) -> Option<bool> {
    match cell {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_date(cell: &Value) -> Option<NaiveDate> {
    match cell {
        Value::String(s) => {
            let trimmed = s.trim();
            // Accept bare dates and datetime strings with a date prefix
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .or_else(|| NaiveDate::parse_from_str(trimmed.get(..10)?, "%Y-%m-%d").ok())
        }
        _ => None,
    }
}

fn as_json(cell: &Value) -> Option<Value> {
    match cell {
        Value::Null => None,
        // A string cell may hold serialized JSON from the predictor
        Value::String(s) => serde_json::from_str(s).ok().or_else(|| Some(cell.clone())),
        other => Some(other.clone()),
    }
}
