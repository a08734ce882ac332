// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for schema and procedure metadata

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetaError {
    #[error("Unsupported type '{type_name}' for {field} in procedure '{procedure}'")]
    UnsupportedType {
        procedure: String,
        field: String,
        type_name: String,
    },

    #[error("Foreign key file path is empty")]
    EmptyForeignKeyPath,

    #[error("Procedure directory does not exist: {0}")]
    MissingProcedureDirectory(String),

    #[error("Failed to read {path}: {message}")]
    FileRead { path: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Duplicate {kind} '{name}'")]
    Duplicate { kind: &'static str, name: String },

    #[error("Unknown label '{0}'")]
    UnknownLabel(String),

    #[error("IrMeta is missing its {0}")]
    MissingComponent(&'static str),
}

impl MetaError {
    pub(crate) fn read(path: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        MetaError::FileRead {
            path: path.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn parse(path: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        MetaError::Parse {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}

pub type MetaResult<T> = Result<T, MetaError>;
