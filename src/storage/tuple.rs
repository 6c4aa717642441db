use bytes::Bytes;

use crate::catalog::schema::Schema;
use crate::common::Rid;
use crate::db_types::value::{TypeId, Value};

/// A serialized record: a null bitmap of `ceil(column_count / 8)` bytes
/// followed by the column payloads at their schema offsets.
///
/// The buffer is immutable once built; cloning a tuple shares it. A tuple
/// with an empty buffer is the "read failed / no such record" sentinel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tuple {
    rid: Rid,
    data: Bytes,
}

fn bitmap_size(column_count: u32) -> usize {
    (column_count as usize + 7) / 8
}

impl Tuple {
    /// Serialize `values` under `schema`. The value count must match the
    /// schema's column count; anything else is a caller bug.
    pub fn new(values: &[Value], schema: &Schema) -> Tuple {
        assert_eq!(values.len() as u32, schema.column_count());

        let bitmap = bitmap_size(schema.column_count());
        let mut buf = vec![0u8; bitmap + schema.storage_size() as usize];

        for (idx, val) in values.iter().enumerate() {
            let col = schema.column(idx);
            debug_assert_eq!(val.type_id(), col.type_id());

            if val.is_null() {
                buf[idx >> 3] |= 1 << (idx & 7);
                continue;
            }

            if col.type_id() == TypeId::Varchar {
                debug_assert!(val.storage_size() <= col.storage_size());
            }

            let start = bitmap + col.offset() as usize;
            val.serialize_to(&mut buf[start..start + col.storage_size() as usize]);
        }

        Tuple {
            rid: Rid::default(),
            data: Bytes::from(buf),
        }
    }

    /// Copy a tuple's bytes out of a page.
    pub fn from_slice(rid: Rid, data: &[u8]) -> Tuple {
        Tuple {
            rid,
            data: Bytes::copy_from_slice(data),
        }
    }

    /// The read-failure sentinel: zero storage size, no buffer.
    pub fn empty() -> Tuple {
        Tuple::default()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn rid(&self) -> Rid {
        self.rid
    }

    pub fn set_rid(&mut self, rid: Rid) {
        self.rid = rid;
    }

    pub fn storage_size(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_null(&self, col_idx: usize) -> bool {
        self.data[col_idx >> 3] & (1 << (col_idx & 7)) != 0
    }

    /// Deserialize one column back out of the buffer.
    pub fn value(&self, schema: &Schema, col_idx: usize) -> Value {
        let col = schema.column(col_idx);

        if self.is_null(col_idx) {
            return Value::null(col.type_id());
        }

        let start = bitmap_size(schema.column_count()) + col.offset() as usize;
        Value::deserialize_from(&self.data[start..], col.type_id())
    }
}
