//! Single in-flight export guard

use crate::error::QuickSignError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Admits at most one export at a time. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct ExportGate {
    in_flight: Arc<AtomicBool>,
}

impl ExportGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate. The returned ticket releases it when dropped, whether
    /// the export succeeded or failed.
    pub fn try_begin(&self) -> Result<ExportTicket, QuickSignError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| QuickSignError::ExportInProgress)?;
        Ok(ExportTicket {
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_exporting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
#[must_use = "dropping the ticket immediately reopens the gate"]
pub struct ExportTicket {
    in_flight: Arc<AtomicBool>,
}

impl Drop for ExportTicket {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}
