use serde::{Deserialize, Serialize};

/// Axis along which rows are split between cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SplitAxis {
    /// Each core owns a slice of rows, copied over their whole width.
    Rows,
    /// Each core owns a slice of columns of every row.
    Cols,
}

/// Execution strategy selected by the planner, used as the dispatch key of the kernel.
///
/// `CanHold` strategies copy a tile of whole (column slice wide) rows at once, `CannotHold`
/// strategies copy a single row at a time and tile its width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u64)]
pub enum TilingKey {
    /// Rows split between cores, a tile holds several full rows.
    HCanHoldSplitW = 50000,
    /// Rows split between cores, a single row doesn't fit a tile.
    HCannotHoldSplitW = 50001,
    /// Columns split between cores, a tile holds several rows of the column slice.
    WCanHoldSplitW = 50002,
    /// Columns split between cores, a single row of the column slice doesn't fit a tile.
    WCannotHoldSplitW = 50003,
    /// The input has no element but the partition ids do.
    XEmpty = 50004,
    /// Both the input and the partition ids are degenerate.
    XpEmpty = 50005,
    /// The input is a scalar routed to a single partition.
    XpScalar = 50006,
}

impl TilingKey {
    /// Every key, in code order.
    pub const ALL: [TilingKey; 7] = [
        TilingKey::HCanHoldSplitW,
        TilingKey::HCannotHoldSplitW,
        TilingKey::WCanHoldSplitW,
        TilingKey::WCannotHoldSplitW,
        TilingKey::XEmpty,
        TilingKey::XpEmpty,
        TilingKey::XpScalar,
    ];

    /// Numeric code of the key.
    pub const fn code(self) -> u64 {
        self as u64
    }

    /// The key of a numeric code.
    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.code() == code)
    }

    /// Builds a multi-core key.
    pub const fn multi_core(axis: SplitAxis, can_hold: bool) -> Self {
        match (axis, can_hold) {
            (SplitAxis::Rows, true) => TilingKey::HCanHoldSplitW,
            (SplitAxis::Rows, false) => TilingKey::HCannotHoldSplitW,
            (SplitAxis::Cols, true) => TilingKey::WCanHoldSplitW,
            (SplitAxis::Cols, false) => TilingKey::WCannotHoldSplitW,
        }
    }

    /// Split axis of multi-core keys, `None` for degenerate keys.
    pub const fn split_axis(self) -> Option<SplitAxis> {
        match self {
            TilingKey::HCanHoldSplitW | TilingKey::HCannotHoldSplitW => Some(SplitAxis::Rows),
            TilingKey::WCanHoldSplitW | TilingKey::WCannotHoldSplitW => Some(SplitAxis::Cols),
            TilingKey::XEmpty | TilingKey::XpEmpty | TilingKey::XpScalar => None,
        }
    }

    /// Whether a tile holds full rows of the column slice.
    pub const fn can_hold(self) -> bool {
        matches!(self, TilingKey::HCanHoldSplitW | TilingKey::WCanHoldSplitW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_contiguous() {
        for (offset, key) in TilingKey::ALL.into_iter().enumerate() {
            assert_eq!(key.code(), 50000 + offset as u64);
            assert_eq!(TilingKey::from_code(key.code()), Some(key));
        }
        assert_eq!(TilingKey::from_code(49999), None);
        assert_eq!(TilingKey::from_code(50007), None);
    }

    #[test]
    fn multi_core_keys_round_trip_their_axis() {
        for axis in [SplitAxis::Rows, SplitAxis::Cols] {
            for can_hold in [true, false] {
                let key = TilingKey::multi_core(axis, can_hold);
                assert_eq!(key.split_axis(), Some(axis));
                assert_eq!(key.can_hold(), can_hold);
            }
        }
        assert_eq!(TilingKey::XpScalar.split_axis(), None);
    }
}
