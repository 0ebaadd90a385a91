//! Cooperative progress reporting and cancellation.

/// Returned by a [`Progress`] sink to abort the running operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A geographic coordinate grid of `cells` points is about to be
    /// projected. Sent before the work starts.
    LargeGeographicGrid { cells: usize },

    /// `done` of `total` mosaic windows read. Sent once with `done`
    /// zero before the first read.
    Load { done: usize, total: usize },

    /// `done` of `total` flowline seeds traced.
    Seed { done: usize, total: usize },

    /// `done` of `total` displacement (point, time) pairs advected.
    Point { done: usize, total: usize },
}

/// Receives progress events from long running operations.
///
/// Returning `Err(Cancelled)` stops the operation at the next
/// checkpoint with [`crate::ItsLiveError::Cancelled`]. Events may be
/// sent from worker threads.
pub trait Progress: Sync {
    fn update(&self, event: ProgressEvent) -> Result<(), Cancelled>;
}

impl<F> Progress for F
where
    F: Fn(ProgressEvent) -> Result<(), Cancelled> + Sync,
{
    fn update(&self, event: ProgressEvent) -> Result<(), Cancelled> {
        self(event)
    }
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Progress for Silent {
    fn update(&self, _: ProgressEvent) -> Result<(), Cancelled> {
        Ok(())
    }
}
