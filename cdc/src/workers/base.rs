use crate::types::SourcePosition;

/// Index of a worker within its pool, equal to the index of its partition.
pub type WorkerId = usize;

/// Counters reported by a capture worker when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub records_read: u64,
    pub changes_written: u64,
    /// Records that built no change, e.g. transaction markers.
    pub records_skipped: u64,
    pub last_committed: Option<SourcePosition>,
}
