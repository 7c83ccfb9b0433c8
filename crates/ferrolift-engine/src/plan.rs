//! How each kind of unit moves a file

use ferrolift_config::{SyncDirection, UnitConfig, UnitKind};

/// Where bytes are written while a transfer is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferShape {
    /// Into a temp file in the staging folder, renamed into place afterwards
    Staged,
    /// Straight into the destination path
    Direct,
}

/// Per-kind behavior of a unit's workers and scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPlan {
    /// How the destination is written
    pub shape: TransferShape,
    /// Skip files whose destination is already current
    pub use_differ: bool,
    /// Remove the source after a successful transfer
    pub remove_source: bool,
    /// Hold back local files until their modification time settles
    pub watch_source: bool,
}

impl TransferPlan {
    /// The plan for a unit kind
    pub fn for_kind(kind: UnitKind) -> Self {
        match kind {
            UnitKind::Download => Self {
                shape: TransferShape::Staged,
                use_differ: false,
                remove_source: true,
                watch_source: false,
            },
            UnitKind::Upload | UnitKind::Stream => Self {
                shape: TransferShape::Direct,
                use_differ: false,
                remove_source: true,
                watch_source: false,
            },
            UnitKind::Sync(SyncDirection::ServerToLocal) => Self {
                shape: TransferShape::Staged,
                use_differ: true,
                remove_source: false,
                watch_source: false,
            },
            UnitKind::Sync(SyncDirection::LocalToServer) => Self {
                shape: TransferShape::Direct,
                use_differ: true,
                remove_source: false,
                watch_source: true,
            },
        }
    }

    /// The plan for a unit
    pub fn for_unit(unit: &UnitConfig) -> Self {
        Self::for_kind(unit.kind)
    }
}
