//! Flat lookup table of counterparties and their signatories.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::InitError;

/// Number of positional columns a usable row carries.
pub const LOOKUP_COLUMNS: usize = 11;

const COL_SEQUENCE: usize = 0;
const COL_BUSINESS_UNIT: usize = 1;
const COL_COMPANY_NAME: usize = 2;
const COL_COMPANY_NUMBER: usize = 3;
const COL_INN: usize = 4;
const COL_KPP: usize = 5;
const COL_STATUS: usize = 6;
const COL_SIGNER_1: usize = 7;
const COL_PERSONNEL_NUMBER: usize = 8;
const COL_SIGNER_2: usize = 9;
const COL_FLAG: usize = 10;

/// One positional row. Short rows are kept so they can be reported, but
/// they never match a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRow {
    fields: Vec<String>,
}

impl LookupRow {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn is_complete(&self) -> bool {
        self.fields.len() >= LOOKUP_COLUMNS
    }

    fn field(&self, index: usize) -> &str {
        self.fields.get(index).map(|s| s.trim()).unwrap_or("")
    }

    pub fn sequence(&self) -> &str {
        self.field(COL_SEQUENCE)
    }
    pub fn business_unit(&self) -> &str {
        self.field(COL_BUSINESS_UNIT)
    }
    pub fn company_name(&self) -> &str {
        self.field(COL_COMPANY_NAME)
    }
    pub fn company_number(&self) -> &str {
        self.field(COL_COMPANY_NUMBER)
    }
    pub fn inn(&self) -> &str {
        self.field(COL_INN)
    }
    pub fn kpp(&self) -> &str {
        self.field(COL_KPP)
    }
    pub fn status(&self) -> &str {
        self.field(COL_STATUS)
    }
    pub fn signer_1(&self) -> &str {
        self.field(COL_SIGNER_1)
    }
    pub fn personnel_number(&self) -> &str {
        self.field(COL_PERSONNEL_NUMBER)
    }
    pub fn signer_2(&self) -> &str {
        self.field(COL_SIGNER_2)
    }
    pub fn flag(&self) -> &str {
        self.field(COL_FLAG)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    rows: Vec<LookupRow>,
}

impl LookupTable {
    pub fn from_rows(rows: Vec<LookupRow>) -> Self {
        Self { rows }
    }

    /// Reads a delimited file with a header row. Fields may be quoted and
    /// rows may have differing lengths.
    pub fn load(path: &Path) -> Result<Self, InitError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| lookup_error(path, e))?;
        let table = Self::from_reader(reader).map_err(|e| lookup_error(path, e))?;

        info!(
            "Loaded {} lookup rows from {}",
            table.rows.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn from_csv_str(raw: &str) -> Result<Self, csv::Error> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(raw.as_bytes());
        Self::from_reader(reader)
    }

    fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self, csv::Error> {
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|field| field.is_empty()) {
                continue;
            }
            rows.push(LookupRow::new(record.iter()));
        }
        let short = rows.iter().filter(|row| !row.is_complete()).count();
        if short > 0 {
            debug!("{short} lookup rows have fewer than {LOOKUP_COLUMNS} columns");
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[LookupRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn lookup_error(path: &Path, e: csv::Error) -> InitError {
    InitError::Lookup {
        path: PathBuf::from(path),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
№,БЕ,Контрагент,Номер,ИНН,КПП,Статус,Подписант 1,Табельный,Подписант 2,Флаг
1,Волжская ГЭС,\"ООО \"\"Ромашка\"\"\",100200, 7701234567 ,770101001,active,Иванов,00123;00456,Петров,Y
2,Камская ГЭС,short row
,,,,,,,,,,
";

    #[test]
    fn loads_quoted_and_short_rows() {
        let table = LookupTable::from_csv_str(TABLE).unwrap();
        assert_eq!(table.len(), 2);

        let row = &table.rows()[0];
        assert!(row.is_complete());
        assert_eq!(row.company_name(), "ООО \"Ромашка\"");
        assert_eq!(row.inn(), "7701234567");
        assert_eq!(row.personnel_number(), "00123;00456");

        assert!(!table.rows()[1].is_complete());
        assert_eq!(table.rows()[1].kpp(), "");
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = LookupTable::load(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, InitError::Lookup { .. }));
    }
}
