// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Stored procedure catalogue
//!
//! One YAML document per procedure:
//!
//! ```yaml
//! name: friends_of
//! description: direct friends of a person
//! params:
//!   - name: personId
//!     type: LONG
//! returns:
//!   - name: friendId
//!     type: LONG
//! ```

use super::error::{MetaError, MetaResult};
use super::schema::DataType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
}

#[derive(Debug, Deserialize)]
struct RawProcedure {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    params: Vec<RawField>,
    #[serde(default)]
    returns: Vec<RawField>,
}

/// Named, typed parameter or return column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureField {
    pub name: String,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProcedureMeta {
    pub name: String,
    pub description: String,
    pub params: Vec<ProcedureField>,
    pub returns: Vec<ProcedureField>,
}

impl StoredProcedureMeta {
    pub fn from_yaml_str(yaml: &str) -> MetaResult<Self> {
        let raw: RawProcedure =
            serde_yaml::from_str(yaml).map_err(|e| MetaError::parse("procedure yaml", e))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawProcedure) -> MetaResult<Self> {
        let convert = |fields: Vec<RawField>, role: &str| -> MetaResult<Vec<ProcedureField>> {
            fields
                .into_iter()
                .map(|field| {
                    let data_type = field.type_name.parse::<DataType>().map_err(|type_name| {
                        MetaError::UnsupportedType {
                            procedure: raw.name.clone(),
                            field: format!("{} '{}'", role, field.name),
                            type_name,
                        }
                    })?;
                    Ok(ProcedureField {
                        name: field.name,
                        data_type,
                    })
                })
                .collect()
        };
        let params = convert(raw.params, "parameter")?;
        let returns = convert(raw.returns, "return column")?;
        Ok(Self {
            name: raw.name,
            description: raw.description,
            params,
            returns,
        })
    }
}

/// All stored procedures known to one graph snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredProcedures {
    procedures: BTreeMap<String, StoredProcedureMeta>,
}

impl StoredProcedures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.yaml` / `*.yml` file in `dir`, in file name order
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> MetaResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(MetaError::MissingProcedureDirectory(
                dir.display().to_string(),
            ));
        }
        let mut paths: Vec<_> = fs::read_dir(dir)
            .map_err(|e| MetaError::read(dir.display(), e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect();
        paths.sort();

        let mut procedures = Self::new();
        for path in paths {
            let meta = Self::load_file(&path)?;
            log::debug!("loaded procedure '{}' from {}", meta.name, path.display());
            procedures.insert(meta)?;
        }
        log::info!(
            "loaded {} stored procedures from {}",
            procedures.len(),
            dir.display()
        );
        Ok(procedures)
    }

    pub fn load_file(path: &Path) -> MetaResult<StoredProcedureMeta> {
        let contents = fs::read_to_string(path).map_err(|e| MetaError::read(path.display(), e))?;
        let raw: RawProcedure =
            serde_yaml::from_str(&contents).map_err(|e| MetaError::parse(path.display(), e))?;
        StoredProcedureMeta::from_raw(raw)
    }

    pub fn insert(&mut self, procedure: StoredProcedureMeta) -> MetaResult<()> {
        if self.procedures.contains_key(&procedure.name) {
            return Err(MetaError::Duplicate {
                kind: "procedure",
                name: procedure.name,
            });
        }
        self.procedures.insert(procedure.name.clone(), procedure);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&StoredProcedureMeta> {
        self.procedures.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredProcedureMeta> {
        self.procedures.values()
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}
