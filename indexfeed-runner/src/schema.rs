use indexfeed_core::domain::CANONICAL_COLUMNS;
use polars::prelude::*;

/// Expected schema for the canonical index table
pub struct CanonicalSchema;

impl CanonicalSchema {
    /// Get the canonical table schema, in output column order
    pub fn schema() -> Schema {
        Schema::from_iter(vec![
            Field::new("market".into(), DataType::String),
            Field::new("date".into(), DataType::String),
            Field::new("open".into(), DataType::Float64),
            Field::new("high".into(), DataType::Float64),
            Field::new("low".into(), DataType::Float64),
            Field::new("close".into(), DataType::Float64),
            Field::new("volume".into(), DataType::Float64),
            Field::new("turnover".into(), DataType::Float64),
            Field::new("is_cached".into(), DataType::Boolean),
            Field::new("source_date".into(), DataType::Date),
        ])
    }

    /// Validate DataFrame against schema, including column order
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let expected = Self::schema();
        let actual = df.schema();

        for field in expected.iter_fields() {
            let actual_dtype = actual
                .get(field.name())
                .ok_or_else(|| SchemaError::MissingColumn(field.name().to_string()))?;
            if actual_dtype != field.dtype() {
                return Err(SchemaError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: actual_dtype.clone(),
                });
            }
        }

        let order: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        if order != CANONICAL_COLUMNS {
            return Err(SchemaError::ColumnOrder(order));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("Unexpected column order: {0:?}")]
    ColumnOrder(Vec<String>),
}
