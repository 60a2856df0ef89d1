//! `config.json` loading and the tunable wait budgets.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::duration::serde_duration;
use crate::errors::InitError;

pub const DEFAULT_LAUNCHER_WINDOW: &str = "SAP Logon 750";

/// Runtime configuration read from `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    /// Path to the SAP Logon executable
    pub sap_logon_path: PathBuf,
    /// Lookup workbook; the flat table is read from the sibling `.csv`
    pub excel_path: PathBuf,
    /// SAP system entry used for the run
    pub sap_stage: String,
    /// SAP test system entry; logging in with credentials is only done there
    pub sap_test_stage: String,
    #[serde(default)]
    pub sap_user: String,
    #[serde(default)]
    pub sap_password: String,
    /// Business-unit display name -> company code
    #[serde(default)]
    pub be_codes: HashMap<String, String>,
    #[serde(default = "default_launcher_window")]
    pub launcher_window_title: String,
    /// Destination folder for generated acts; defaults to the request folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents_folder: Option<PathBuf>,
    #[serde(default)]
    pub timings: Timings,
}

fn default_launcher_window() -> String {
    DEFAULT_LAUNCHER_WINDOW.to_string()
}

impl Config {
    /// Loads the configuration, writing the template first when the file is
    /// missing or empty.
    pub fn load_or_init(path: &Path) -> Result<Self, InitError> {
        let needs_template = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        if needs_template {
            fs::write(path, Self::template()).map_err(|e| InitError::Config {
                path: path.to_path_buf(),
                reason: format!("cannot write template: {e}"),
            })?;
            warn!(
                "Configuration file {} was missing; a template was written",
                path.display()
            );
        }
        Self::load(path)
    }

    pub fn load(path: &Path) -> Result<Self, InitError> {
        let raw = fs::read_to_string(path).map_err(|e| InitError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| InitError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate().map_err(|reason| InitError::Config {
            path: path.to_path_buf(),
            reason,
        })?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.sap_stage.trim().is_empty() {
            return Err("SapStage must not be empty".to_string());
        }
        if self.timings.window_attempts == 0 {
            return Err("Timings.WindowAttempts must be at least 1".to_string());
        }
        if self.is_test_stage() && self.sap_user.trim().is_empty() {
            return Err("SapUser is required when running against the test system".to_string());
        }
        Ok(())
    }

    pub fn is_test_stage(&self) -> bool {
        self.sap_stage == self.sap_test_stage
    }

    /// Company code configured for a business-unit display name.
    pub fn be_code(&self, business_unit: &str) -> Option<&str> {
        self.be_codes.get(business_unit.trim()).map(String::as_str)
    }

    /// Flat lookup table produced next to the workbook.
    pub fn lookup_table_path(&self) -> PathBuf {
        let is_csv = self
            .excel_path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv {
            self.excel_path.clone()
        } else {
            self.excel_path.with_extension("csv")
        }
    }

    pub fn template() -> String {
        let be_codes: HashMap<String, String> = [
            ("Исполнительный аппарат", "1010"),
            ("Бурейская ГЭС", "1030"),
            ("Волжская ГЭС", "1050"),
            ("Воткинская ГЭС", "1060"),
            ("Дагестанский филиал", "1080"),
            ("Жигулевская ГЭС", "1090"),
            ("Загорская ГАЭС", "1100"),
            ("Зейская ГЭС", "1140"),
            ("Кабардино-Балкарский филиал", "1170"),
            ("Камская ГЭС", "1180"),
            ("Карачаево-Черкесский филиал", "1190"),
            ("Каскад Верхневолжских ГЭС", "1200"),
            ("Каскад Кубанских ГЭС", "1210"),
            ("Нижегородская ГЭС", "1240"),
            ("Новосибирская ГЭС", "1260"),
            ("Саратовская ГЭС", "1300"),
            ("Саяно-Шушенская ГЭС (СШГЭС им. П.С. Непорожнего)", "1310"),
            ("Северо-Осетинский филиал", "1320"),
            ("Чебоксарская ГЭС", "1350"),
            ("КорУнГ", "1410"),
            ("Хабаровский филиал", "1510"),
            ("Приморский филиал", "1520"),
            ("Якутский филиал", "1530"),
        ]
        .into_iter()
        .map(|(name, code)| (name.to_string(), code.to_string()))
        .collect();

        let template = Config {
            sap_logon_path: PathBuf::from(
                r"C:\Program Files (x86)\SAP\FrontEnd\SapGui\saplogon.exe",
            ),
            excel_path: PathBuf::from(r"KA\Реестр по всем БЕ.xlsx"),
            sap_stage: "1. Продуктивная среда САПФИР".to_string(),
            sap_test_stage: "ER2 - среда тестирования САПФИР".to_string(),
            sap_user: String::new(),
            sap_password: String::new(),
            be_codes,
            launcher_window_title: default_launcher_window(),
            documents_folder: None,
            timings: Timings::default(),
        };
        serde_json::to_string_pretty(&template).unwrap_or_default()
    }
}

/// Wait budgets for every named wait used by the sequencer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Timings {
    /// How long a required element may take to appear
    #[serde(with = "serde_duration")]
    pub element_timeout: Duration,
    #[serde(with = "serde_duration")]
    pub element_poll: Duration,
    /// How long to look for optional confirmation dialogs
    #[serde(with = "serde_duration")]
    pub dialog_timeout: Duration,
    /// Status bar must stay unchanged this long to count as settled
    #[serde(with = "serde_duration")]
    pub status_quiet: Duration,
    #[serde(with = "serde_duration")]
    pub status_timeout: Duration,
    #[serde(with = "serde_duration")]
    pub launcher_timeout: Duration,
    /// Per-attempt budget of the bounded window wait
    #[serde(with = "serde_duration")]
    pub window_timeout: Duration,
    pub window_attempts: u32,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            element_timeout: Duration::from_secs(10),
            element_poll: Duration::from_millis(250),
            dialog_timeout: Duration::from_secs(5),
            status_quiet: Duration::from_millis(500),
            status_timeout: Duration::from_secs(15),
            launcher_timeout: Duration::from_secs(20),
            window_timeout: Duration::from_secs(30),
            window_attempts: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_round_trips_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config::load_or_init(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.be_code("Волжская ГЭС"), Some("1050"));
        assert_eq!(config.timings.window_attempts, 3);
        assert_eq!(config.launcher_window_title, DEFAULT_LAUNCHER_WINDOW);
    }

    #[test]
    fn timings_accept_human_readable_durations() {
        let raw = r#"{
            "SapLogonPath": "saplogon.exe",
            "ExcelPath": "registry.xlsx",
            "SapStage": "PRD",
            "SapTestStage": "ER2",
            "Timings": { "ElementTimeout": "3s", "WindowAttempts": 5 }
        }"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.timings.element_timeout, Duration::from_secs(3));
        assert_eq!(config.timings.window_attempts, 5);
        // untouched fields keep their defaults
        assert_eq!(config.timings.window_timeout, Duration::from_secs(30));
        assert_eq!(config.lookup_table_path(), PathBuf::from("registry.csv"));
    }

    #[test]
    fn test_stage_requires_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"SapLogonPath":"a","ExcelPath":"b.csv","SapStage":"ER2","SapTestStage":"ER2"}"#,
        )
        .unwrap();

        match Config::load(&path) {
            Err(InitError::Config { reason, .. }) => assert!(reason.contains("SapUser")),
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
