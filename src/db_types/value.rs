use byteorder::{ByteOrder, LittleEndian};

/// Identifier of a storage type. Dispatch happens by matching on this tag,
/// there is no registry of type singletons behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeId {
    Integer,
    Varchar,
}

/// A single typed value, possibly null.
///
/// INTEGER occupies 4 bytes on a page. VARCHAR occupies a u32 length prefix
/// followed by the payload bytes, so its storage size is `logical_length + 4`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(Option<i32>),
    Varchar(Option<String>),
}

impl Value {
    pub fn integer(val: i32) -> Value {
        Value::Integer(Some(val))
    }

    pub fn varchar<S: Into<String>>(val: S) -> Value {
        Value::Varchar(Some(val.into()))
    }

    pub fn null(type_id: TypeId) -> Value {
        match type_id {
            TypeId::Integer => Value::Integer(None),
            TypeId::Varchar => Value::Varchar(None),
        }
    }

    pub fn type_id(&self) -> TypeId {
        match self {
            Value::Integer(_) => TypeId::Integer,
            Value::Varchar(_) => TypeId::Varchar,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Value::Integer(val) => val.is_none(),
            Value::Varchar(val) => val.is_none(),
        }
    }

    /// Number of payload bytes, not counting the varchar length prefix.
    pub fn logical_length(&self) -> u32 {
        match self {
            Value::Integer(_) => 4,
            Value::Varchar(val) => val.as_ref().map_or(0, |s| s.len() as u32),
        }
    }

    /// Number of bytes the value takes inside a tuple's column region.
    pub fn storage_size(&self) -> u32 {
        match self {
            Value::Integer(_) => 4,
            Value::Varchar(_) => self.logical_length() + 4,
        }
    }

    /// Write the value at the start of `storage`. Callers handle nulls via
    /// the tuple bitmap and never serialize a null value.
    pub fn serialize_to(&self, storage: &mut [u8]) {
        match self {
            Value::Integer(Some(val)) => {
                LittleEndian::write_i32(&mut storage[0..4], *val);
            }
            Value::Varchar(Some(val)) => {
                let bytes = val.as_bytes();
                LittleEndian::write_u32(&mut storage[0..4], bytes.len() as u32);
                storage[4..4 + bytes.len()].copy_from_slice(bytes);
            }
            Value::Integer(None) | Value::Varchar(None) => {
                debug_assert!(false, "null values are recorded in the bitmap, not serialized");
            }
        }
    }

    /// Read a value of the given type back from the start of `storage`.
    pub fn deserialize_from(storage: &[u8], type_id: TypeId) -> Value {
        match type_id {
            TypeId::Integer => Value::Integer(Some(LittleEndian::read_i32(&storage[0..4]))),
            TypeId::Varchar => {
                let len = LittleEndian::read_u32(&storage[0..4]) as usize;
                let raw = &storage[4..4 + len];
                Value::Varchar(Some(String::from_utf8_lossy(raw).into_owned()))
            }
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(val) => *val,
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Varchar(val) => val.as_deref(),
            _ => None,
        }
    }

    // Comparisons are only defined within a type; a type mismatch compares
    // as neither equal nor less.

    pub fn compare_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(lhs), Value::Integer(rhs)) => lhs == rhs,
            (Value::Varchar(lhs), Value::Varchar(rhs)) => lhs == rhs,
            _ => false,
        }
    }

    pub fn compare_less_than(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(Some(lhs)), Value::Integer(Some(rhs))) => lhs < rhs,
            (Value::Varchar(Some(lhs)), Value::Varchar(Some(rhs))) => lhs < rhs,
            _ => false,
        }
    }
}
