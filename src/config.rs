use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::aggregate::GroupBy;
use crate::billing::{PriceTable, Service};
use crate::error::ConfigError;
use crate::window::{deserialize_bound, TimeWindow};

pub const DEFAULT_OUTPUT_DIR: &str = "results";

#[derive(Deserialize, Debug, PartialEq, Clone)]
pub struct Config {
    pub invoice: InvoiceMeta,
    pub contract: Contract,
    pub company: Party,
    pub client: Party,
    #[serde(default)]
    pub service: Vec<Service>,
    #[serde(default)]
    pub group_by: Option<GroupBy>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub reference_doc: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct InvoiceMeta {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_bound")]
    pub start: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "deserialize_bound")]
    pub end: Option<NaiveDateTime>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Contract {
    pub reference: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Company or client identity block.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Party {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Party {
    pub fn address_lines(&self) -> Vec<&str> {
        self.address
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect()
    }
}

// Invoice ids are often written as bare numbers in YAML.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Format {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.invoice.start, self.invoice.end)
    }

    pub fn price_table(&self) -> PriceTable {
        self.service.iter().collect()
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .as_deref()
            .unwrap_or(Path::new(DEFAULT_OUTPUT_DIR))
            .join(format!("invoice_{}.docx", self.invoice.id))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::io::Write;

    pub const CONFIG: &str = r#"
invoice:
  id: 42
  start: 2024-01-01
  end: 2024-01-31T18:00:00
contract:
  reference: CTR-2024-007
  signed: 2023-12-01
company:
  name: Acme Consulting
  address: |
    1 Main Street
    75001 Paris
  email: billing@acme.test
client:
  name: Initech
  address: 42 Corporate Way
service:
  - name: Consulting
    price: 80
  - name: Training
    price: 62.5
"#;

    #[test]
    fn decode() {
        let config: Config = serde_yaml::from_str(CONFIG).unwrap();

        assert_eq!(config.invoice.id, "42");
        assert_eq!(
            config.invoice.start,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(
            config.invoice.end,
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap().and_hms_opt(18, 0, 0)
        );
        assert_eq!(config.invoice.date, None);
        assert_eq!(config.contract.reference, "CTR-2024-007");
        assert!(config.contract.extra.contains_key("signed"));
        assert_eq!(
            config.company.extra.get("email"),
            Some(&serde_yaml::Value::from("billing@acme.test"))
        );
        assert_eq!(config.group_by, None);
        assert_eq!(config.service[1].price, dec!(62.5));
    }

    #[test]
    fn invoice_keeps_extra_fields() {
        let raw = CONFIG.replace("  id: 42\n", "  id: 42\n  due: 2024-03-01\n");
        let config: Config = serde_yaml::from_str(&raw).unwrap();
        assert_eq!(config.invoice.id, "42");
        assert_eq!(
            config.invoice.extra.get("due"),
            Some(&serde_yaml::Value::from("2024-03-01"))
        );
        assert!(config.invoice.start.is_some());
    }

    #[test]
    fn prices_from_services() {
        let config: Config = serde_yaml::from_str(CONFIG).unwrap();
        assert_eq!(config.price_table().lookup("Training").0, dec!(62.5));
        assert!(config.price_table().lookup("Gardening").1.is_some());
    }

    #[test]
    fn address_lines() {
        let config: Config = serde_yaml::from_str(CONFIG).unwrap();
        assert_eq!(
            config.company.address_lines(),
            vec!["1 Main Street", "75001 Paris"]
        );
    }

    #[test]
    fn output_path_from_id() {
        let mut config: Config = serde_yaml::from_str(CONFIG).unwrap();
        assert_eq!(config.output_path(), PathBuf::from("results/invoice_42.docx"));

        config.output_dir = Some(PathBuf::from("out"));
        assert_eq!(config.output_path(), PathBuf::from("out/invoice_42.docx"));
    }

    #[test]
    fn open_window_without_dates() {
        let raw = CONFIG
            .replace("  start: 2024-01-01\n", "")
            .replace("  end: 2024-01-31T18:00:00\n", "");
        let config: Config = serde_yaml::from_str(&raw).unwrap();
        assert_eq!(config.window(), TimeWindow::default());
    }

    #[test]
    fn bad_window_date() {
        let raw = CONFIG.replace("2024-01-01", "01/01/2024");
        let error = serde_yaml::from_str::<Config>(&raw).unwrap_err();
        assert!(error.to_string().contains("01/01/2024"));
    }

    #[test]
    fn group_by_alias() {
        let raw = format!("{}group_by: title\n", CONFIG);
        let config: Config = serde_yaml::from_str(&raw).unwrap();
        assert_eq!(config.group_by, Some(GroupBy::Summary));
    }

    #[test]
    fn load_missing_file() {
        let error = Config::load(Path::new("does/not/exist.yaml")).unwrap_err();
        assert!(matches!(error, ConfigError::Io { .. }));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.client.name, "Initech");
    }
}
