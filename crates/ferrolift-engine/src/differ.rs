//! Change detection for sync units

use ferrolift_types::FileStat;

/// Reason a file needs to be transferred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// Destination does not exist
    Added,
    /// Sizes differ
    SizeChanged,
    /// Sizes match but whole-second modification times differ
    TimeChanged,
}

/// Compare a destination against its source.
///
/// Returns `None` when the destination is current. Size is compared first,
/// then the modification time truncated to whole seconds, so sub-second
/// precision lost by either side never forces a transfer.
pub fn detect_change(destination: Option<&FileStat>, source: &FileStat) -> Option<ChangeType> {
    match destination {
        None => Some(ChangeType::Added),
        Some(dest) if dest.size != source.size => Some(ChangeType::SizeChanged),
        Some(dest) if dest.mtime_secs() != source.mtime_secs() => Some(ChangeType::TimeChanged),
        Some(_) => None,
    }
}

/// Whether `source` must be copied over `destination`
pub fn needs_transfer(destination: Option<&FileStat>, source: &FileStat) -> bool {
    detect_change(destination, source).is_some()
}
