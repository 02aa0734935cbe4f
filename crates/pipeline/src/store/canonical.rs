//! Conversion between transformed records and canonical entity rows.

use chrono::NaiveDate;
use ledgerlift_core::duplicate_detection::{ExistingRecord, RecordKey};
use ledgerlift_core::entity::TargetEntity;
use ledgerlift_core::field_value::{FieldValue, RawRecord};
use ledgerlift_core::transform::{parse_currency, parse_date};
use ledgerlift_core::types::DbId;
use ledgerlift_db::models::business::{Business, CreateBusiness};
use ledgerlift_db::models::client::{Client, CreateClient};
use ledgerlift_db::models::transaction::{CreateTransaction, Transaction};

use crate::error::StoreError;

const CLIENT_FIELDS: &[&str] = &["name", "email", "phone", "type", "tax_id", "address"];
const BUSINESS_FIELDS: &[&str] = &["name", "email", "type", "tax_id", "industry"];
const TRANSACTION_FIELDS: &[&str] = &[
    "date",
    "amount",
    "description",
    "reference",
    "category",
    "counterparty",
];

fn text(data: &RawRecord, field: &str) -> Option<String> {
    data.get(field).and_then(FieldValue::as_text).map(|s| s.trim().to_string())
}

fn required_text(data: &RawRecord, field: &str) -> Result<String, StoreError> {
    text(data, field)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StoreError::InvalidRecord(format!("{field} is required")))
}

/// Fields without a dedicated column, kept as JSON.
fn extra(data: &RawRecord, known: &[&str]) -> Option<serde_json::Value> {
    let map: serde_json::Map<String, serde_json::Value> = data
        .iter()
        .filter(|(k, v)| !known.contains(&k.as_str()) && !v.is_empty())
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    (!map.is_empty()).then_some(serde_json::Value::Object(map))
}

pub fn to_create_client(data: &RawRecord, job_id: DbId) -> Result<CreateClient, StoreError> {
    Ok(CreateClient {
        name: required_text(data, "name")?,
        email: text(data, "email"),
        phone: text(data, "phone"),
        client_type: text(data, "type"),
        tax_id: text(data, "tax_id"),
        address: text(data, "address"),
        extra: extra(data, CLIENT_FIELDS),
        source_job_id: Some(job_id),
    })
}

pub fn to_create_business(data: &RawRecord, job_id: DbId) -> Result<CreateBusiness, StoreError> {
    Ok(CreateBusiness {
        name: required_text(data, "name")?,
        email: text(data, "email"),
        business_type: text(data, "type"),
        tax_id: text(data, "tax_id"),
        industry: text(data, "industry"),
        extra: extra(data, BUSINESS_FIELDS),
        source_job_id: Some(job_id),
    })
}

pub fn to_create_transaction(data: &RawRecord, job_id: DbId) -> Result<CreateTransaction, StoreError> {
    let transaction_date: NaiveDate = match data.get("date") {
        Some(FieldValue::Date(d)) => *d,
        Some(v) if !v.is_empty() => v
            .as_text()
            .and_then(|s| parse_date(&s, None).ok())
            .ok_or_else(|| StoreError::InvalidRecord("date is not a valid date".into()))?,
        _ => return Err(StoreError::InvalidRecord("date is required".into())),
    };
    let amount = match data.get("amount") {
        Some(FieldValue::Number(n)) => *n,
        Some(v) if !v.is_empty() => v
            .as_text()
            .and_then(|s| parse_currency(&s).ok())
            .ok_or_else(|| StoreError::InvalidRecord("amount is not a number".into()))?,
        _ => return Err(StoreError::InvalidRecord("amount is required".into())),
    };
    if !amount.is_finite() {
        return Err(StoreError::InvalidRecord("amount is not finite".into()));
    }
    Ok(CreateTransaction {
        transaction_date,
        amount_cents: (amount * 100.0).round() as i64,
        description: text(data, "description"),
        reference: text(data, "reference"),
        category: text(data, "category"),
        counterparty: text(data, "counterparty"),
        extra: extra(data, TRANSACTION_FIELDS),
        source_job_id: Some(job_id),
    })
}

fn put(record: &mut RawRecord, field: &str, value: Option<&str>) {
    if let Some(v) = value {
        record.insert(field.to_string(), FieldValue::String(v.to_string()));
    }
}

fn existing(id: DbId, entity: TargetEntity, record: &RawRecord) -> ExistingRecord {
    ExistingRecord {
        id,
        entity,
        key: RecordKey::from_record(record, entity),
    }
}

pub fn client_key(c: &Client) -> ExistingRecord {
    let mut r = RawRecord::new();
    put(&mut r, "name", Some(&c.name));
    put(&mut r, "email", c.email.as_deref());
    put(&mut r, "phone", c.phone.as_deref());
    put(&mut r, "tax_id", c.tax_id.as_deref());
    existing(c.id, TargetEntity::Client, &r)
}

pub fn business_key(b: &Business) -> ExistingRecord {
    let mut r = RawRecord::new();
    put(&mut r, "name", Some(&b.name));
    put(&mut r, "email", b.email.as_deref());
    put(&mut r, "tax_id", b.tax_id.as_deref());
    existing(b.id, TargetEntity::Business, &r)
}

pub fn transaction_key(t: &Transaction) -> ExistingRecord {
    let mut r = RawRecord::new();
    r.insert("date".into(), FieldValue::Date(t.transaction_date));
    r.insert("amount".into(), FieldValue::Number(t.amount_cents as f64 / 100.0));
    put(&mut r, "description", t.description.as_deref());
    put(&mut r, "reference", t.reference.as_deref());
    existing(t.id, TargetEntity::Transaction, &r)
}
