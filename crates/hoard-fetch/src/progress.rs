use std::fmt;

/// Phases of one fetch attempt.
///
/// Connecting → Downloading → Verifying → Completed. A failed attempt goes
/// back to Connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPhase {
    #[default]
    Connecting,
    Downloading,
    Verifying,
    Completed,
}

impl fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchPhase::Connecting => write!(f, "Connecting"),
            FetchPhase::Downloading => write!(f, "Downloading"),
            FetchPhase::Verifying => write!(f, "Verifying"),
            FetchPhase::Completed => write!(f, "Completed"),
        }
    }
}

/// Snapshot passed to the progress callback.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    pub asset:         &'a str,
    pub phase:         FetchPhase,
    /// Bytes of the archive present on disk.
    pub bytes_on_disk: u64,
    /// Bytes written by the event that produced this snapshot.
    pub chunk:         u64,
    pub total_bytes:   Option<u64>,
    /// 1-based attempt number.
    pub attempt:       u32,
}
