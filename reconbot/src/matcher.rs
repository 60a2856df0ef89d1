//! Cross-references requests against the lookup table.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::errors::TaskError;
use crate::lookup::LookupRow;
use crate::request::{RequestRecord, RequestType};

/// Returns the single lookup row whose business unit, INN and KPP equal the
/// request's.
#[instrument(level = "debug", skip(rows), fields(request = %request.id))]
pub fn match_company(request: &RequestRecord, rows: &[LookupRow]) -> Result<LookupRow, TaskError> {
    let business_unit = request.business_unit.trim();
    let inn = request.inn.trim();
    let kpp = request.kpp.trim();

    let mut matches: Vec<LookupRow> = rows
        .iter()
        .filter(|row| row.is_complete())
        .filter(|row| {
            row.business_unit() == business_unit && row.inn() == inn && row.kpp() == kpp
        })
        .cloned()
        .collect();

    let keys = format!("БЕ '{business_unit}', ИНН '{inn}', КПП '{kpp}'");
    match matches.len() {
        0 => Err(TaskError::NotFound(format!(
            "no counterparty in the lookup table for {keys}"
        ))),
        1 => {
            let row = matches.remove(0);
            debug!(company = row.company_number(), "matched lookup row");
            Ok(row)
        }
        n => {
            warn!("{n} lookup rows match {keys}");
            Err(TaskError::AmbiguousMatch {
                keys,
                rows: matches,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signatories {
    pub first: String,
    pub second: String,
}

impl Signatories {
    /// Splits a `;`-separated personnel number field. A single value signs
    /// both slots.
    pub fn derive(personnel_number: &str) -> Result<Self, TaskError> {
        let mut parts = personnel_number
            .split(';')
            .map(str::trim)
            .filter(|part| !part.is_empty());

        match (parts.next(), parts.next()) {
            (Some(first), Some(second)) => Ok(Self {
                first: first.to_string(),
                second: second.to_string(),
            }),
            (Some(only), None) => Ok(Self {
                first: only.to_string(),
                second: only.to_string(),
            }),
            _ => Err(TaskError::Validation(
                "personnel number is empty; no signatories".to_string(),
            )),
        }
    }
}

fn agreement_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[\d/\-.]+$").expect("static pattern"))
}

pub fn validate_agreement_number(number: &str) -> Result<(), TaskError> {
    if agreement_pattern().is_match(number) {
        Ok(())
    } else {
        Err(TaskError::Validation(format!(
            "agreement number '{number}' may only contain digits, '/', '-' and '.'"
        )))
    }
}

/// A request paired with its lookup row, ready for the sequencer.
#[derive(Debug, Clone)]
pub struct Task {
    pub request: RequestRecord,
    pub row: LookupRow,
    pub be_code: String,
    pub company_number: String,
    pub signatories: Signatories,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub request_type: RequestType,
    pub agreement_numbers: Vec<String>,
}

impl Task {
    pub fn build(
        request: RequestRecord,
        row: LookupRow,
        be_codes: &HashMap<String, String>,
    ) -> Result<Self, TaskError> {
        let company_number = row.company_number().to_string();
        if company_number.is_empty() {
            return Err(TaskError::Validation(format!(
                "lookup row {} has no company system number",
                row.sequence()
            )));
        }

        let signatories = Signatories::derive(row.personnel_number())?;

        let be_code = be_codes
            .get(request.business_unit.trim())
            .map(|code| code.trim())
            .filter(|code| !code.is_empty())
            .ok_or_else(|| {
                TaskError::Validation(format!(
                    "business unit '{}' has no configured company code",
                    request.business_unit
                ))
            })?
            .to_string();

        Ok(Task {
            be_code,
            company_number,
            signatories,
            date_start: request.date_start,
            date_end: request.date_end,
            request_type: request.request_type.clone(),
            agreement_numbers: request.agreement_list(),
            request,
            row,
        })
    }

    pub fn id(&self) -> &str {
        &self.request.id
    }
}
