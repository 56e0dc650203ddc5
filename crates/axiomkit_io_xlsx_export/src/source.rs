//! Record-source adapters for JSON values and Polars data frames.

use std::io::Cursor;

use polars::prelude::{AnyValue, Column, DataFrame, DataType, IpcReader, SerReader};
use serde_json::Value;

use crate::spec::{EnumCellValue, EnumColumnDataType, SpecColumnDefinition, SpecRecord};

////////////////////////////////////////////////////////////////////////////////
// #region JsonRecords

/// Convert one JSON object into a record, keeping key order.
pub fn derive_record_from_json_value(value: &Value) -> Result<SpecRecord, String> {
    let Value::Object(dict_fields) = value else {
        return Err(format!("expected a JSON object, got: {value}"));
    };
    Ok(dict_fields
        .iter()
        .map(|(field_name, field_value)| {
            (field_name.as_str(), derive_cell_value_from_json(field_value))
        })
        .collect())
}

fn derive_cell_value_from_json(value: &Value) -> EnumCellValue {
    match value {
        Value::Null => EnumCellValue::None,
        Value::Bool(val) => EnumCellValue::Boolean(*val),
        Value::Number(val) => match val.as_i64() {
            Some(n) => EnumCellValue::Integer(n),
            None => val
                .as_f64()
                .map_or(EnumCellValue::None, EnumCellValue::Number),
        },
        Value::String(val) => EnumCellValue::String(val.clone()),
        Value::Array(_) | Value::Object(_) => EnumCellValue::String(value.to_string()),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DataFrameRecords

/// Read a Polars IPC payload.
pub fn derive_dataframe_from_ipc_bytes(v_ipc_df: &[u8]) -> Result<DataFrame, String> {
    IpcReader::new(Cursor::new(v_ipc_df))
        .finish()
        .map_err(|err| format!("Failed to read IPC DataFrame bytes: {err}"))
}

/// Infer one column per frame column: numeric → Number, boolean → Boolean, else String.
pub fn derive_column_definitions_from_dataframe(df: &DataFrame) -> Vec<SpecColumnDefinition> {
    df.get_columns()
        .iter()
        .map(|col| {
            let c_name = col.name().to_string();
            let data_type = match col.dtype() {
                DataType::Boolean => EnumColumnDataType::Boolean,
                dtype if dtype.is_numeric() => EnumColumnDataType::Number,
                _ => EnumColumnDataType::String,
            };
            SpecColumnDefinition::new(c_name.clone(), c_name, data_type)
        })
        .collect()
}

/// Row-by-row record iterator over a data frame.
pub struct DataFrameRecords<'a> {
    l_cols: &'a [Column],
    l_names: Vec<String>,
    n_height: usize,
    n_idx_row: usize,
}

impl<'a> DataFrameRecords<'a> {
    pub fn new(df: &'a DataFrame) -> Self {
        Self {
            l_cols: df.get_columns(),
            l_names: df
                .get_column_names_str()
                .into_iter()
                .map(ToString::to_string)
                .collect(),
            n_height: df.height(),
            n_idx_row: 0,
        }
    }
}

impl Iterator for DataFrameRecords<'_> {
    type Item = Result<SpecRecord, String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.n_idx_row >= self.n_height {
            return None;
        }
        let n_idx_row = self.n_idx_row;
        self.n_idx_row += 1;

        let mut record = SpecRecord::new();
        for (col, c_name) in self.l_cols.iter().zip(&self.l_names) {
            match col.get(n_idx_row) {
                Ok(value) => {
                    record.insert(c_name.as_str(), derive_cell_value_from_any_value(value))
                }
                Err(err) => {
                    return Some(Err(format!(
                        "Failed to access cell value at row {n_idx_row}, column {c_name}: {err}"
                    )));
                }
            }
        }
        Some(Ok(record))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n_remaining = self.n_height.saturating_sub(self.n_idx_row);
        (n_remaining, Some(n_remaining))
    }
}

fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::Boolean(val) => EnumCellValue::Boolean(val),
        AnyValue::UInt8(val) => EnumCellValue::Integer(i64::from(val)),
        AnyValue::UInt16(val) => EnumCellValue::Integer(i64::from(val)),
        AnyValue::UInt32(val) => EnumCellValue::Integer(i64::from(val)),
        AnyValue::UInt64(val) => match i64::try_from(val) {
            Ok(n) => EnumCellValue::Integer(n),
            Err(_) => EnumCellValue::Number(val as f64),
        },
        AnyValue::Int8(val) => EnumCellValue::Integer(i64::from(val)),
        AnyValue::Int16(val) => EnumCellValue::Integer(i64::from(val)),
        AnyValue::Int32(val) => EnumCellValue::Integer(i64::from(val)),
        AnyValue::Int64(val) => EnumCellValue::Integer(val),
        AnyValue::Int128(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(f64::from(val)),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        _ => EnumCellValue::String(value.to_string()),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
