use serde::{Deserialize, Serialize};
use std::fmt;

use crate::coords::TileCoord;

/// Scheduling temperature of a tile. 999 is the burning sentinel (never
/// successfully fetched), 1..=K are the temperature buckets hot to cold,
/// 0 means no tracked project references the tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Heat(pub u16);

impl Heat {
    pub const INACTIVE: Heat = Heat(0);
    pub const HOTTEST: Heat = Heat(1);
    pub const BURNING: Heat = Heat(999);

    #[must_use]
    pub fn bucket(index: u16) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn as_i64(self) -> i64 {
        i64::from(self.0)
    }

    #[must_use]
    pub fn is_burning(self) -> bool {
        self == Self::BURNING
    }

    #[must_use]
    pub fn is_inactive(self) -> bool {
        self == Self::INACTIVE
    }
}

impl fmt::Display for Heat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::BURNING => write!(f, "burning"),
            Self::INACTIVE => write!(f, "inactive"),
            Self(bucket) => write!(f, "bucket {bucket}"),
        }
    }
}

/// Scheduling and conditional-fetch state for one canvas tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRecord {
    pub coord: TileCoord,
    pub heat: Heat,
    /// Epoch seconds of the last poll; 0 means never checked.
    pub last_checked: i64,
    /// Epoch seconds of the upstream `Last-Modified`.
    pub last_update: i64,
    pub etag: String,
}

impl TileRecord {
    /// A tile entering the queue for the first time: burning, never checked.
    #[must_use]
    pub fn new_burning(coord: TileCoord) -> Self {
        Self {
            coord,
            heat: Heat::BURNING,
            last_checked: 0,
            last_update: 0,
            etag: String::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> i64 {
        self.coord.tile_id()
    }

    #[must_use]
    pub fn never_checked(&self) -> bool {
        self.last_checked == 0
    }
}
