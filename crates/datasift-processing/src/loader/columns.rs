//! Typed column accumulation.

use super::schema::ColumnKind;
use crate::utils::{parse_bool_literal, parse_float_cell, parse_int_cell};
use polars::prelude::*;

/// Accumulates the cells of one column with a fixed, already inferred type.
#[derive(Debug)]
pub(crate) enum ColumnBuilder {
    Boolean(Vec<Option<bool>>),
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnBuilder {
    pub fn new(kind: ColumnKind, capacity: usize) -> Self {
        match kind {
            ColumnKind::Boolean => Self::Boolean(Vec::with_capacity(capacity)),
            ColumnKind::Integer => Self::Integer(Vec::with_capacity(capacity)),
            ColumnKind::Float => Self::Float(Vec::with_capacity(capacity)),
            ColumnKind::Empty | ColumnKind::Text => Self::Text(Vec::with_capacity(capacity)),
        }
    }

    /// Append one cell. Returns `false` if `raw` does not fit the column type.
    pub fn push(&mut self, raw: &str, missing: bool) -> bool {
        if missing {
            self.push_null();
            return true;
        }

        match self {
            Self::Boolean(values) => parse_bool_literal(raw).map(|v| values.push(Some(v))),
            Self::Integer(values) => parse_int_cell(raw).map(|v| values.push(Some(v))),
            Self::Float(values) => parse_float_cell(raw).map(|v| values.push(Some(v))),
            Self::Text(values) => {
                values.push(Some(raw.to_string()));
                Some(())
            }
        }
        .is_some()
    }

    fn push_null(&mut self) {
        match self {
            Self::Boolean(values) => values.push(None),
            Self::Integer(values) => values.push(None),
            Self::Float(values) => values.push(None),
            Self::Text(values) => values.push(None),
        }
    }

    pub fn finish(self, name: &str) -> Column {
        let series = match self {
            Self::Boolean(values) => Series::new(name.into(), values),
            Self::Integer(values) => Series::new(name.into(), values),
            Self::Float(values) => Series::new(name.into(), values),
            Self::Text(values) => Series::new(name.into(), values),
        };
        Column::from(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_builder() {
        let mut builder = ColumnBuilder::new(ColumnKind::Integer, 3);
        assert!(builder.push("1", false));
        assert!(builder.push("", true));
        assert!(builder.push(" 3 ", false));
        assert!(!builder.push("x", false));

        let column = builder.finish("n");
        assert_eq!(column.dtype(), &DataType::Int64);
        assert_eq!(column.len(), 3);
        assert_eq!(column.null_count(), 1);
    }

    #[test]
    fn test_empty_kind_builds_string_column() {
        let mut builder = ColumnBuilder::new(ColumnKind::Empty, 2);
        builder.push("NA", true);
        builder.push("", true);

        let column = builder.finish("blank");
        assert_eq!(column.dtype(), &DataType::String);
        assert_eq!(column.null_count(), 2);
    }
}
