use serde::{Deserialize, Serialize};

/// Element type of a tensor handed to the partition.
///
/// The partition only moves rows around, so the element type matters for its byte size and,
/// for partition ids, for decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElemType {
    F16,
    BF16,
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Bool,
}

impl ElemType {
    /// Size of one element in bytes.
    pub const fn size(&self) -> usize {
        match self {
            ElemType::I8 | ElemType::U8 | ElemType::Bool => 1,
            ElemType::F16 | ElemType::BF16 | ElemType::I16 | ElemType::U16 => 2,
            ElemType::F32 | ElemType::I32 | ElemType::U32 => 4,
            ElemType::F64 | ElemType::I64 | ElemType::U64 => 8,
        }
    }

    /// Whether the type can hold partition ids.
    pub const fn is_partition_id(&self) -> bool {
        matches!(self, ElemType::I32 | ElemType::I64)
    }
}
