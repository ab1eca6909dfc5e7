//! Arrow schemas and record batch conversion for each row kind.

use crate::{BlockExtension, BlockRecord, OfflineOperatorEvent};
use alloy_primitives::{B256, hex};
use arrow::{
    array::{
        ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray, UInt32Array,
        UInt64Array,
    },
    datatypes::{DataType, Field, Schema, SchemaRef},
    error::ArrowError,
};
use cadence_chain::ChainKind;
use std::sync::Arc;

/// The column every dataset is resumed from.
pub(crate) const BLOCK_NUMBER: &str = "block_number";

fn hash_hex(hash: &B256) -> String {
    hex::encode_prefixed(hash)
}

fn block_time_fields() -> Vec<Field> {
    vec![
        Field::new("chain", DataType::Utf8, false),
        Field::new(BLOCK_NUMBER, DataType::UInt64, false),
        Field::new("hash", DataType::Utf8, false),
        Field::new("parent_hash", DataType::Utf8, false),
        Field::new("timestamp_ms", DataType::UInt64, false),
        Field::new("timestamp_utc", DataType::Utf8, false),
        Field::new("delta_since_parent_ms", DataType::Int64, false),
        Field::new("ingestion_ts_ms", DataType::UInt64, false),
    ]
}

/// The block time schema of `chain`. Extension columns follow the shared columns.
pub(crate) fn block_times_schema(chain: ChainKind) -> SchemaRef {
    let mut fields = block_time_fields();
    match chain {
        ChainKind::Consensus => {
            fields.push(Field::new("contains_segment_header", DataType::Boolean, false));
            fields.push(Field::new("bundle_count", DataType::UInt32, false));
        }
        ChainKind::AutoEvm => {
            fields.push(Field::new("consensus_block_hash", DataType::Utf8, true));
        }
    }
    Arc::new(Schema::new(fields))
}

/// The offline operator schema.
pub(crate) fn offline_operators_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(BLOCK_NUMBER, DataType::UInt64, false),
        Field::new("block_hash", DataType::Utf8, false),
        Field::new("timestamp_ms", DataType::UInt64, false),
        Field::new("timestamp_utc", DataType::Utf8, false),
        Field::new("domain_id", DataType::UInt32, false),
        Field::new("epoch_index", DataType::UInt32, false),
        Field::new("operator_id", DataType::UInt64, false),
        Field::new("submitted_bundles", DataType::UInt32, false),
        Field::new("expected_bundles", DataType::UInt32, false),
        Field::new("min_required_bundles", DataType::UInt32, false),
        Field::new("shortfall", DataType::Int64, false),
        Field::new("shortfall_pct", DataType::Float64, false),
        Field::new("ingestion_ts_ms", DataType::UInt64, false),
    ]))
}

/// Converts a homogeneous block time batch of `chain` into a record batch.
///
/// Callers validate homogeneity first; a foreign row contributes default extension values.
pub(crate) fn block_times_batch(
    chain: ChainKind,
    rows: &[BlockRecord],
) -> Result<RecordBatch, ArrowError> {
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.chain().to_string()))),
        Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.block_number))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| hash_hex(&r.hash)))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| hash_hex(&r.parent_hash)))),
        Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.timestamp_ms))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.timestamp_utc.as_str()))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.delta_since_parent_ms))),
        Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.ingestion_ts_ms))),
    ];

    match chain {
        ChainKind::Consensus => {
            let (segments, bundles): (Vec<bool>, Vec<u32>) = rows
                .iter()
                .map(|r| match r.extension {
                    BlockExtension::Consensus { contains_segment_header, bundle_count } => {
                        (contains_segment_header, bundle_count)
                    }
                    BlockExtension::AutoEvm { .. } => (false, 0),
                })
                .unzip();
            columns.push(Arc::new(BooleanArray::from(segments)));
            columns.push(Arc::new(UInt32Array::from(bundles)));
        }
        ChainKind::AutoEvm => {
            let hashes: StringArray = rows
                .iter()
                .map(|r| match &r.extension {
                    BlockExtension::AutoEvm { consensus_block_hash } => {
                        consensus_block_hash.as_ref().map(hash_hex)
                    }
                    BlockExtension::Consensus { .. } => None,
                })
                .collect();
            columns.push(Arc::new(hashes));
        }
    }

    RecordBatch::try_new(block_times_schema(chain), columns)
}

/// Converts offline operator rows into a record batch.
pub(crate) fn offline_operators_batch(
    rows: &[OfflineOperatorEvent],
) -> Result<RecordBatch, ArrowError> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.block_number))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| hash_hex(&r.block_hash)))),
        Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.timestamp_ms))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.timestamp_utc.as_str()))),
        Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.domain_id))),
        Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.epoch_index))),
        Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.operator_id))),
        Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.submitted_bundles))),
        Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.expected_bundles))),
        Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.min_required_bundles))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.shortfall))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.shortfall_pct))),
        Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.ingestion_ts_ms))),
    ];
    RecordBatch::try_new(offline_operators_schema(), columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OperatorBundles;
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::UInt64Type;

    fn auto_evm_row(number: u64, consensus: Option<B256>) -> BlockRecord {
        BlockRecord::new(
            number,
            B256::repeat_byte(number as u8),
            B256::repeat_byte(number as u8 - 1),
            number * 1_000,
            1_000,
            0,
            BlockExtension::AutoEvm { consensus_block_hash: consensus },
        )
    }

    #[test]
    fn test_auto_evm_batch_has_nullable_consensus_hash() {
        let rows = [auto_evm_row(2, Some(B256::repeat_byte(0xaa))), auto_evm_row(3, None)];
        let batch = block_times_batch(ChainKind::AutoEvm, &rows).unwrap();

        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 9);
        let hashes = batch.column_by_name("consensus_block_hash").unwrap().as_string::<i32>();
        assert_eq!(hashes.value(0), format!("0x{}", "aa".repeat(32)));
        assert!(hashes.is_null(1));
        let chain = batch.column_by_name("chain").unwrap().as_string::<i32>();
        assert_eq!(chain.value(0), "auto-evm");
    }

    #[test]
    fn test_consensus_schema_columns() {
        let schema = block_times_schema(ChainKind::Consensus);
        let names: Vec<_> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(
            names,
            [
                "chain",
                "block_number",
                "hash",
                "parent_hash",
                "timestamp_ms",
                "timestamp_utc",
                "delta_since_parent_ms",
                "ingestion_ts_ms",
                "contains_segment_header",
                "bundle_count",
            ]
        );
    }

    #[test]
    fn test_offline_batch() {
        let bundles = OperatorBundles {
            operator_id: 3,
            domain_id: 0,
            submitted_bundles: 1,
            expected_bundles: 4,
            min_required_bundles: 2,
        };
        let row = OfflineOperatorEvent::new(77, B256::ZERO, 5_000, 9, bundles, 1);
        let batch = offline_operators_batch(&[row]).unwrap();

        assert_eq!(batch.num_columns(), 13);
        let numbers = batch.column_by_name(BLOCK_NUMBER).unwrap().as_primitive::<UInt64Type>();
        assert_eq!(numbers.value(0), 77);
    }
}
