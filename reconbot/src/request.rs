//! Inbound request records.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::document::JsonDocument;
use crate::errors::TaskError;

pub const KEY_REQUEST_TYPE: &str = "formType.title";
pub const KEY_BUSINESS_UNIT: &str = "orgfilial.title";
pub const KEY_ID: &str = "title";
pub const KEY_ORGANIZATION: &str = "organiz.title";
pub const KEY_START: &str = "startPeriod";
pub const KEY_END: &str = "endPeriod";
pub const KEY_INN: &str = "innString";
pub const KEY_KPP: &str = "kppString";
pub const KEY_SERVICE: &str = "service.title";
pub const KEY_AGREEMENTS: &str = "regNumbDoc";
pub const KEY_COUNTERPARTIES: &str = "contragent";
pub const KEY_STATUS: &str = "status";
pub const KEY_MESSAGE: &str = "message";

pub const STATUS_OK: &str = "OK";
pub const STATUS_ERROR: &str = "ERROR";

/// Request types the sequencer branches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestType {
    /// One counterparty, every agreement
    AllAgreements,
    /// Selected agreements only
    SingleAgreement,
    Other(String),
}

impl RequestType {
    pub const ALL_AGREEMENTS_TITLE: &'static str = "По одному контрагенту по всем договорам";
    pub const SINGLE_AGREEMENT_TITLE: &'static str = "По одному договору";

    pub fn from_title(title: &str) -> Self {
        match title.trim() {
            Self::ALL_AGREEMENTS_TITLE => RequestType::AllAgreements,
            Self::SINGLE_AGREEMENT_TITLE => RequestType::SingleAgreement,
            other => RequestType::Other(other.to_string()),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            RequestType::AllAgreements => Self::ALL_AGREEMENTS_TITLE,
            RequestType::SingleAgreement => Self::SINGLE_AGREEMENT_TITLE,
            RequestType::Other(title) => title,
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    pub id: String,
    pub request_type: RequestType,
    pub business_unit: String,
    pub organization: Option<String>,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub inn: String,
    pub kpp: String,
    pub service: Option<String>,
    /// Raw agreement reference field, comma separated
    pub agreement_numbers: Option<String>,
    pub counterparties: Vec<String>,
    pub status: Option<String>,
    pub message: Option<String>,
}

impl RequestRecord {
    /// Extracts the record and normalizes empty `status`/`message` into
    /// explicit `null` keys on the document.
    pub fn parse(doc: &mut JsonDocument) -> Result<Self, TaskError> {
        let record = RequestRecord {
            id: required_string(doc, KEY_ID)?,
            request_type: RequestType::from_title(&required_string(doc, KEY_REQUEST_TYPE)?),
            business_unit: required_string(doc, KEY_BUSINESS_UNIT)?,
            organization: optional_string(doc, KEY_ORGANIZATION)?,
            date_start: required_date(doc, KEY_START)?,
            date_end: required_date(doc, KEY_END)?,
            inn: required_string(doc, KEY_INN)?,
            kpp: required_string(doc, KEY_KPP)?,
            service: optional_string(doc, KEY_SERVICE)?,
            agreement_numbers: optional_string(doc, KEY_AGREEMENTS)?,
            counterparties: string_list(doc, KEY_COUNTERPARTIES)?,
            status: optional_string(doc, KEY_STATUS)?,
            message: optional_string(doc, KEY_MESSAGE)?,
        };

        // the id names the request's output folder
        if let Err(e) = Uuid::parse_str(&record.id) {
            return Err(TaskError::Validation(format!(
                "'{KEY_ID}' is not a UUID ({e}): {}",
                record.id
            )));
        }

        if record.status.is_none() {
            doc.set(KEY_STATUS, Value::Null);
        }
        if record.message.is_none() {
            doc.set(KEY_MESSAGE, Value::Null);
        }

        debug!(request = %record.id, "request record parsed");
        Ok(record)
    }

    /// Agreement numbers split on `,`, trimmed, empties dropped.
    pub fn agreement_list(&self) -> Vec<String> {
        self.agreement_numbers
            .as_deref()
            .map(split_list)
            .unwrap_or_default()
    }
}

/// Writes the run outcome onto the document; nothing else is touched.
pub fn record_outcome(doc: &mut JsonDocument, status: &str, message: &str) {
    doc.set(KEY_STATUS, Value::String(status.to_string()));
    let message = if message.trim().is_empty() {
        Value::Null
    } else {
        Value::String(message.to_string())
    };
    doc.set(KEY_MESSAGE, message);
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn optional_string(doc: &JsonDocument, key: &str) -> Result<Option<String>, TaskError> {
    let value = match doc.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(TaskError::Parse(format!(
                "'{key}' must be a string, found {other}"
            )))
        }
    };
    Ok(if text.is_empty() { None } else { Some(text) })
}

fn required_string(doc: &JsonDocument, key: &str) -> Result<String, TaskError> {
    optional_string(doc, key)?
        .ok_or_else(|| TaskError::Parse(format!("required field '{key}' is missing or empty")))
}

fn string_list(doc: &JsonDocument, key: &str) -> Result<Vec<String>, TaskError> {
    match doc.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| match item {
                Value::String(s) => Ok(s.trim().to_string()),
                Value::Number(n) => Ok(n.to_string()),
                Value::Object(obj) => obj
                    .get("title")
                    .and_then(Value::as_str)
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| TaskError::Parse(format!("'{key}' entry has no title"))),
                other => Err(TaskError::Parse(format!(
                    "'{key}' entries must be strings, found {other}"
                ))),
            })
            .filter(|item| !matches!(item, Ok(s) if s.is_empty()))
            .collect(),
        Some(_) => Ok(optional_string(doc, key)?
            .map(|raw| split_list(&raw))
            .unwrap_or_default()),
    }
}

fn required_date(doc: &JsonDocument, key: &str) -> Result<NaiveDate, TaskError> {
    let raw = required_string(doc, key)?;
    parse_date(&raw)
        .ok_or_else(|| TaskError::Parse(format!("'{key}' is not a calendar date: {raw}")))
}

/// Accepts the date shapes request producers emit.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%d.%m.%Y") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%d.%m.%Y %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.date())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> &'static str {
        r#"{
            "formType": {"title": "По одному договору"},
            "orgfilial": {"title": "Волжская ГЭС"},
            "title": "5f0c1d2e-8a1b-4c3d-9e8f-001122334455",
            "organiz": {"title": "ООО Ромашка"},
            "startPeriod": "2024-01-01T00:00:00",
            "endPeriod": "31.03.2024",
            "innString": "7701234567",
            "kppString": 770101001,
            "service": {"title": "Акт сверки"},
            "regNumbDoc": "123/45-6.7, 98-76 ,",
            "contragent": ["100200", {"title": "100300"}],
            "status": "",
            "message": null
        }"#
    }

    #[test]
    fn parses_all_fields() {
        let mut doc = JsonDocument::parse(sample()).unwrap();
        let record = RequestRecord::parse(&mut doc).unwrap();

        assert_eq!(record.request_type, RequestType::SingleAgreement);
        assert_eq!(record.business_unit, "Волжская ГЭС");
        assert_eq!(record.date_start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(record.date_end, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
        assert_eq!(record.kpp, "770101001");
        assert_eq!(record.agreement_list(), vec!["123/45-6.7", "98-76"]);
        assert_eq!(record.counterparties, vec!["100200", "100300"]);
        assert_eq!(record.status, None);
    }

    #[test]
    fn missing_required_field_is_parse_error() {
        let mut doc = JsonDocument::parse(r#"{"title": "x", "formType": {"title": "t"}}"#).unwrap();
        let err = RequestRecord::parse(&mut doc).unwrap_err();
        assert_eq!(err.kind(), "ParseError");
        assert!(err.to_string().contains(KEY_BUSINESS_UNIT));
    }

    #[test]
    fn invalid_date_is_parse_error() {
        let raw = sample().replace("31.03.2024", "31.02.2024");
        let mut doc = JsonDocument::parse(&raw).unwrap();
        let err = RequestRecord::parse(&mut doc).unwrap_err();
        assert!(err.to_string().contains(KEY_END));
    }

    #[test]
    fn normalization_is_idempotent() {
        let mut doc = JsonDocument::parse(sample()).unwrap();
        RequestRecord::parse(&mut doc).unwrap();
        let first = doc.to_json_string();
        RequestRecord::parse(&mut doc).unwrap();
        assert_eq!(doc.to_json_string(), first);
        assert_eq!(doc.get(KEY_STATUS), Some(&Value::Null));
    }

    #[test]
    fn id_must_be_a_uuid() {
        let raw = sample().replace("5f0c1d2e-8a1b-4c3d-9e8f-001122334455", "SD-17");
        let mut doc = JsonDocument::parse(&raw).unwrap();
        let err = RequestRecord::parse(&mut doc).unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        assert!(err.to_string().contains("SD-17"));
    }

    #[test]
    fn absent_status_and_message_are_added_and_survive_write_back() {
        let raw = r#"{
            "title": "0b6f1c52-3a4e-4d0f-8f7e-6a5b4c3d2e1f",
            "formType": {"title": "По одному контрагенту по всем договорам"},
            "orgfilial": {"title": "Волжская ГЭС"},
            "startPeriod": "2024-01-01",
            "endPeriod": "2024-03-31",
            "innString": "7701234567",
            "kppString": "770101001",
            "contragent": ["100200"]
        }"#;
        let mut doc = JsonDocument::parse(raw).unwrap();
        let original = doc.clone();
        let record = RequestRecord::parse(&mut doc).unwrap();
        assert_eq!(record.status, None);
        assert_eq!(record.message, None);
        assert_eq!(doc.get(KEY_STATUS), Some(&Value::Null));
        assert_eq!(doc.get(KEY_MESSAGE), Some(&Value::Null));

        record_outcome(&mut doc, STATUS_OK, "Сформировано актов: 1");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SD+1.txt");
        doc.save_to(&path).unwrap();

        let saved = JsonDocument::from_file(&path).unwrap();
        let mut expected_keys: Vec<&str> = original.keys().collect();
        expected_keys.extend([KEY_STATUS, KEY_MESSAGE]);
        assert_eq!(saved.keys().collect::<Vec<_>>(), expected_keys);
        for key in original.keys() {
            assert_eq!(saved.get(key), original.get(key), "key {key} changed");
        }
        assert_eq!(saved.get(KEY_STATUS), Some(&Value::from(STATUS_OK)));
        assert_eq!(saved.get(KEY_MESSAGE), Some(&Value::from("Сформировано актов: 1")));
    }

    #[test]
    fn outcome_only_touches_status_and_message() {
        let mut doc = JsonDocument::parse(sample()).unwrap();
        RequestRecord::parse(&mut doc).unwrap();
        let before = doc.clone();

        record_outcome(&mut doc, STATUS_ERROR, "NotFoundError: nothing");
        for key in before.keys().filter(|k| *k != KEY_STATUS && *k != KEY_MESSAGE) {
            assert_eq!(doc.get(key), before.get(key), "key {key} changed");
        }
        assert_eq!(doc.get(KEY_STATUS), Some(&Value::from(STATUS_ERROR)));
    }
}
