// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Filter expressions attached to pattern elements and filter nodes

use crate::alias::AliasId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn is_equality(&self) -> bool {
        matches!(self, CompareOp::Eq)
    }

    pub fn is_range(&self) -> bool {
        matches!(self, CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        write!(f, "{}", symbol)
    }
}

/// Constant operand of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "NULL"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::String(s) => write!(f, "'{}'", s),
        }
    }
}

/// Boolean filter over alias properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Compare {
        alias: AliasId,
        property: String,
        op: CompareOp,
        value: Literal,
    },
    IsNotNull {
        alias: AliasId,
        property: String,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// Expression the planner does not interpret; passed through verbatim
    Opaque(String),
}

impl Predicate {
    pub fn equals(alias: AliasId, property: impl Into<String>, value: Literal) -> Self {
        Predicate::Compare {
            alias,
            property: property.into(),
            op: CompareOp::Eq,
            value,
        }
    }

    /// Top-level conjuncts of the predicate
    pub fn conjuncts(&self) -> Vec<&Predicate> {
        match self {
            Predicate::And(parts) => parts.iter().flat_map(|p| p.conjuncts()).collect(),
            other => vec![other],
        }
    }

    /// Aliases referenced anywhere in the predicate, sorted and deduplicated
    pub fn aliases(&self) -> Vec<AliasId> {
        let mut out = Vec::new();
        self.collect_aliases(&mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Same predicate with every reference to `from` pointing at `to`
    pub fn rebind(&self, from: AliasId, to: AliasId) -> Predicate {
        match self {
            Predicate::Compare {
                alias,
                property,
                op,
                value,
            } => Predicate::Compare {
                alias: if *alias == from { to } else { *alias },
                property: property.clone(),
                op: *op,
                value: value.clone(),
            },
            Predicate::IsNotNull { alias, property } => Predicate::IsNotNull {
                alias: if *alias == from { to } else { *alias },
                property: property.clone(),
            },
            Predicate::And(parts) => {
                Predicate::And(parts.iter().map(|p| p.rebind(from, to)).collect())
            }
            Predicate::Or(parts) => Predicate::Or(parts.iter().map(|p| p.rebind(from, to)).collect()),
            Predicate::Not(inner) => Predicate::Not(Box::new(inner.rebind(from, to))),
            Predicate::Opaque(text) => Predicate::Opaque(text.clone()),
        }
    }

    fn collect_aliases(&self, out: &mut Vec<AliasId>) {
        match self {
            Predicate::Compare { alias, .. } | Predicate::IsNotNull { alias, .. } => {
                out.push(*alias)
            }
            Predicate::And(parts) | Predicate::Or(parts) => {
                for part in parts {
                    part.collect_aliases(out);
                }
            }
            Predicate::Not(inner) => inner.collect_aliases(out),
            Predicate::Opaque(_) => {}
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |parts: &[Predicate], sep: &str| {
            parts
                .iter()
                .map(|p| format!("({})", p))
                .collect::<Vec<_>>()
                .join(sep)
        };
        match self {
            Predicate::Compare {
                alias,
                property,
                op,
                value,
            } => write!(f, "{}.{} {} {}", alias, property, op, value),
            Predicate::IsNotNull { alias, property } => {
                write!(f, "{}.{} IS NOT NULL", alias, property)
            }
            Predicate::And(parts) => write!(f, "{}", join(parts, " AND ")),
            Predicate::Or(parts) => write!(f, "{}", join(parts, " OR ")),
            Predicate::Not(inner) => write!(f, "NOT ({})", inner),
            Predicate::Opaque(text) => write!(f, "{}", text),
        }
    }
}
