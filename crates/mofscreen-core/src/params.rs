use crate::errors::{ConfigError, DomainError};
use crate::model::UnitId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// `[parameters]` section of the campaign config.
#[derive(Debug, Clone, Deserialize)]
pub struct MatrixConfig {
    #[serde(default)]
    pub combinations: ComboMode,

    /// Per-parameter value lists for the cartesian product.
    #[serde(default)]
    pub values: BTreeMap<String, Vec<toml::Value>>,

    /// Hand-picked combinations, used when `combinations = "custom"`.
    #[serde(default)]
    pub custom: Vec<CustomCombo>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComboMode {
    #[default]
    All,
    Custom,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomCombo {
    #[serde(default)]
    pub name: Option<String>,
    pub values: BTreeMap<String, toml::Value>,
}

/// One resolved parameter combination.
#[derive(Debug, Clone, Serialize)]
pub struct ParamCombo {
    pub id: u32,
    pub name: String,
    pub values: BTreeMap<String, String>,
}

/// All parameter combinations of a sweep campaign. Empty when no matrix is
/// configured, in which case each batch maps to a single unit.
#[derive(Debug, Clone, Default)]
pub struct ParameterMatrix {
    combos: Vec<ParamCombo>,
}

impl ParameterMatrix {
    pub fn from_config(config: Option<&MatrixConfig>) -> Self {
        let Some(config) = config else {
            return Self::default();
        };

        let combos = match config.combinations {
            ComboMode::All => cartesian_combos(&config.values),
            ComboMode::Custom => config
                .custom
                .iter()
                .enumerate()
                .map(|(i, combo)| {
                    let values = stringify(&combo.values);
                    ParamCombo {
                        id: i as u32,
                        name: combo
                            .name
                            .clone()
                            .unwrap_or_else(|| combo_name(&values)),
                        values,
                    }
                })
                .collect(),
        };

        Self { combos }
    }

    pub fn is_enabled(&self) -> bool {
        !self.combos.is_empty()
    }

    pub fn combos(&self) -> &[ParamCombo] {
        &self.combos
    }

    pub fn combo(&self, param_id: u32) -> Result<&ParamCombo, DomainError> {
        self.combos
            .iter()
            .find(|c| c.id == param_id)
            .ok_or(DomainError::UnknownParamCombo(param_id))
    }

    /// The units a single batch expands into.
    pub fn units_for_batch(&self, batch_id: u32) -> Vec<UnitId> {
        if self.combos.is_empty() {
            vec![UnitId::batch(batch_id)]
        } else {
            self.combos
                .iter()
                .map(|c| UnitId::with_param(batch_id, c.id))
                .collect()
        }
    }

    /// Persist the resolved matrix next to the tracking store for reference.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(&self.combos)?;
        fs_err::write(path, json)?;
        Ok(())
    }
}

fn cartesian_combos(values: &BTreeMap<String, Vec<toml::Value>>) -> Vec<ParamCombo> {
    if values.is_empty() {
        return Vec::new();
    }

    let keys: Vec<&String> = values.keys().collect();
    let mut combos: Vec<BTreeMap<String, String>> = vec![BTreeMap::new()];

    for key in &keys {
        let mut next = Vec::new();
        for partial in &combos {
            for value in &values[*key] {
                let mut combo = partial.clone();
                combo.insert((*key).clone(), value_string(value));
                next.push(combo);
            }
        }
        combos = next;
    }

    combos
        .into_iter()
        .enumerate()
        .map(|(i, values)| ParamCombo {
            id: i as u32,
            name: combo_name(&values),
            values,
        })
        .collect()
}

fn stringify(values: &BTreeMap<String, toml::Value>) -> BTreeMap<String, String> {
    values
        .iter()
        .map(|(k, v)| (k.clone(), value_string(v)))
        .collect()
}

fn value_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Short descriptive name like `T298_P100000`.
fn combo_name(values: &BTreeMap<String, String>) -> String {
    let parts: Vec<String> = values
        .iter()
        .map(|(key, value)| format!("{}{}", key_abbrev(key), value))
        .collect();

    if parts.is_empty() {
        "default".to_string()
    } else {
        parts.join("_")
    }
}

fn key_abbrev(key: &str) -> String {
    let lower = key.to_lowercase();
    if lower == "temperature" {
        "T".to_string()
    } else if lower == "pressure" {
        "P".to_string()
    } else if lower.contains("co2") {
        "CO2".to_string()
    } else if lower.contains("n2") {
        "N2".to_string()
    } else {
        key.chars().take(3).collect::<String>().to_uppercase()
    }
}
