use std::ops::Range;

use crate::config::BulkConfig;
use crate::error::MapError;
use crate::params::{Parameter, ToParams};

/// One multi-row insert statement's worth of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertBatch {
    /// Positions of the rows in the input slice.
    pub rows: Range<usize>,
    /// Parameters of every row, flattened in row order.
    pub parameters: Vec<Parameter>,
}

impl InsertBatch {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Splits rows into batches that respect the statement limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkInsert {
    config: BulkConfig,
}

impl Default for BulkInsert {
    fn default() -> Self {
        Self::new(BulkConfig::default())
    }
}

impl BulkInsert {
    pub fn new(config: BulkConfig) -> Self {
        Self { config }
    }

    /// Rows that fit in one statement when each binds `params_per_row`.
    pub fn rows_per_batch(&self, params_per_row: usize) -> Result<usize, MapError> {
        let BulkConfig {
            max_rows,
            max_parameters,
        } = self.config;
        if params_per_row > max_parameters {
            return Err(MapError::configuration(
                "bulk insert",
                format!("a row binds {params_per_row} parameters, the limit is {max_parameters}"),
            ));
        }
        let by_params = max_parameters.checked_div(params_per_row).unwrap_or(max_rows);
        Ok(max_rows.min(by_params).max(1))
    }

    pub fn plan<T: ToParams>(&self, rows: &[T]) -> Result<Vec<InsertBatch>, MapError> {
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let width = first.param_count();
        let per_batch = self.rows_per_batch(width)?;

        let mut batches = Vec::with_capacity(rows.len().div_ceil(per_batch));
        for (n, chunk) in rows.chunks(per_batch).enumerate() {
            let start = n * per_batch;
            let mut parameters = Vec::with_capacity(chunk.len() * width);
            for (offset, row) in chunk.iter().enumerate() {
                let params = row.to_params();
                if params.len() != width {
                    return Err(MapError::configuration(
                        std::any::type_name::<T>(),
                        format!(
                            "row {} binds {} parameters, the first row binds {width}",
                            start + offset,
                            params.len()
                        ),
                    ));
                }
                parameters.extend(params);
            }
            batches.push(InsertBatch {
                rows: start..start + chunk.len(),
                parameters,
            });
        }

        tracing::debug!(
            rows = rows.len(),
            batches = batches.len(),
            rows_per_batch = per_batch,
            "bulk insert planned"
        );
        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{RowMap, Value};

    fn rows(n: usize, width: usize) -> Vec<RowMap> {
        (0..n)
            .map(|i| {
                (0..width)
                    .map(|c| (format!("c{c}"), Value::Int64((i * width + c) as i64)))
                    .collect()
            })
            .collect()
    }

    fn bulk(max_rows: usize, max_parameters: usize) -> BulkInsert {
        BulkInsert::new(BulkConfig {
            max_rows,
            max_parameters,
        })
    }

    #[test]
    fn rows_per_batch_takes_the_tighter_limit() {
        assert_eq!(bulk(1000, 2100).rows_per_batch(3).unwrap(), 700);
        assert_eq!(bulk(1000, 2100).rows_per_batch(1).unwrap(), 1000);
        assert_eq!(bulk(10, 2100).rows_per_batch(0).unwrap(), 10);
        assert_eq!(bulk(1000, 2100).rows_per_batch(2100).unwrap(), 1);
    }

    #[test]
    fn oversized_row_is_rejected() {
        assert!(matches!(
            bulk(1000, 4).rows_per_batch(5),
            Err(MapError::Configuration { .. })
        ));
    }

    #[test]
    fn empty_input_plans_nothing() {
        assert!(bulk(10, 10).plan::<RowMap>(&[]).unwrap().is_empty());
    }

    #[test]
    fn batches_cover_every_row_in_order() {
        let input = rows(7, 2);
        let batches = bulk(100, 6).plan(&input).unwrap();
        assert_eq!(
            batches.iter().map(|b| b.rows.clone()).collect::<Vec<_>>(),
            vec![0..3, 3..6, 6..7]
        );
        assert_eq!(batches[2].row_count(), 1);
        assert_eq!(batches[0].parameters.len(), 6);
        assert_eq!(batches[1].parameters[0], Parameter::new("c0", Value::Int64(6)));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let mut input = rows(2, 2);
        input[1].insert("extra", Value::Null);
        assert!(matches!(
            bulk(100, 100).plan(&input),
            Err(MapError::Configuration { .. })
        ));
    }
}
