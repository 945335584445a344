use statehold_core::EntityId;

use crate::PersistError;

/// What one drain of one entity-state type did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub collection: &'static str,
    /// Entries present in the cache when the drain started
    pub considered: usize,
    /// Entries whose actor was missing, read-only or stopped
    pub skipped: usize,
    /// Entries with nothing to write
    pub clean: usize,
    /// Updates in acknowledged pages
    pub written: usize,
    pub failed_pages: Vec<FailedPage>,
    /// Dirty entries whose state could not be encoded; they stay dirty
    pub unencodable: Vec<EntityId>,
}

/// A page of updates the store never acknowledged.
///
/// None of its updates can be assumed durable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedPage {
    /// Zero-based position of the page within the drain
    pub index: usize,
    pub len: usize,
    pub attempts: u32,
}

impl DrainReport {
    pub fn new(collection: &'static str) -> Self {
        DrainReport {
            collection,
            considered: 0,
            skipped: 0,
            clean: 0,
            written: 0,
            failed_pages: Vec::new(),
            unencodable: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ShutdownSummary {
    pub reports: Vec<DrainReport>,
    /// Types whose drain returned an error
    pub failed_types: usize,
}

impl ShutdownSummary {
    pub fn failed_pages(&self) -> usize {
        self.reports.iter().map(|r| r.failed_pages.len()).sum()
    }
}

#[derive(Debug, Default)]
pub struct TickSummary {
    /// Reports of the types drained this tick, in registration order
    pub reports: Vec<DrainReport>,
    /// The tick stopped early because work is no longer being accepted
    pub interrupted: bool,
    /// The error that ended this tick early, if any
    pub error: Option<PersistError>,
}
