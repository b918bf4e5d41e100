//! Header normalization and column type inference.

use crate::utils::{parse_bool_literal, parse_float_cell, parse_int_cell};
use polars::prelude::DataType;
use std::collections::{HashMap, HashSet};

/// Inferred type of a column, widened as more values are observed.
///
/// The lattice is `Empty -> Boolean | Integer -> Float -> Text`; booleans
/// mixed with anything else become text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Only missing values seen so far.
    Empty,
    Boolean,
    Integer,
    Float,
    Text,
}

impl ColumnKind {
    /// Widen this kind so that it also admits `raw` (a non-missing value).
    pub fn observe(self, raw: &str) -> Self {
        match self {
            Self::Text => Self::Text,
            Self::Empty => Self::classify(raw),
            Self::Boolean => {
                if parse_bool_literal(raw).is_some() {
                    Self::Boolean
                } else {
                    Self::Text
                }
            }
            Self::Integer => {
                if parse_int_cell(raw).is_some() {
                    Self::Integer
                } else if parse_float_cell(raw).is_some() {
                    Self::Float
                } else {
                    Self::Text
                }
            }
            Self::Float => {
                if parse_float_cell(raw).is_some() {
                    Self::Float
                } else {
                    Self::Text
                }
            }
        }
    }

    fn classify(raw: &str) -> Self {
        if parse_bool_literal(raw).is_some() {
            Self::Boolean
        } else if parse_int_cell(raw).is_some() {
            Self::Integer
        } else if parse_float_cell(raw).is_some() {
            Self::Float
        } else {
            Self::Text
        }
    }

    /// The polars dtype used to store this kind. All-missing columns are text.
    pub fn dtype(self) -> DataType {
        match self {
            Self::Empty | Self::Text => DataType::String,
            Self::Boolean => DataType::Boolean,
            Self::Integer => DataType::Int64,
            Self::Float => DataType::Float64,
        }
    }
}

/// Running type inference over every record of a source.
#[derive(Debug, Clone)]
pub struct SchemaInference {
    kinds: Vec<ColumnKind>,
}

impl SchemaInference {
    pub fn new(width: usize) -> Self {
        Self {
            kinds: vec![ColumnKind::Empty; width],
        }
    }

    /// Observe one record; `is_missing` decides which cells are nulls.
    pub fn observe<'r>(
        &mut self,
        fields: impl IntoIterator<Item = &'r str>,
        is_missing: impl Fn(&str) -> bool,
    ) {
        for (kind, raw) in self.kinds.iter_mut().zip(fields) {
            if !is_missing(raw) {
                *kind = kind.observe(raw);
            }
        }
    }

    pub fn finish(self) -> Vec<ColumnKind> {
        self.kinds
    }
}

/// Turn a raw header record into unique column names.
///
/// Empty names become `Unnamed: <index>`; repeats are suffixed `.1`, `.2`, ...
pub fn normalize_headers<'r>(raw: impl IntoIterator<Item = &'r str>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut suffixes: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::new();

    for (idx, name) in raw.into_iter().enumerate() {
        let base = if name.is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            name.to_string()
        };

        let mut candidate = base.clone();
        while seen.contains(&candidate) {
            let n = suffixes.entry(base.clone()).or_insert(0);
            *n += 1;
            candidate = format!("{}.{}", base, n);
        }

        seen.insert(candidate.clone());
        names.push(candidate);
    }

    names
}
