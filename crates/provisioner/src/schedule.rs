//! Phase window computation.
//!
//! Every order gets its own base date, `stagger` months after the previous
//! order's. Phases then follow each other back to back from that base.

use chrono::{Months, NaiveDate};
use serde::Serialize;

use crate::config::PhaseConfig;
use crate::error::{ProvisionError, ProvisionResult};

/// Start and target date of one phase-project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// A phase together with its computed window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseWindow {
    pub phase: String,
    pub window: ScheduleWindow,
}

/// Schedule calculator for one job.
#[derive(Debug, Clone)]
pub struct Schedule {
    base: NaiveDate,
    stagger_months: u32,
    /// (phase name, cumulative offset, duration)
    phases: Vec<(String, u64, u64)>,
}

impl Schedule {
    pub fn new(base: NaiveDate, stagger_months: u32, phases: &[PhaseConfig]) -> Self {
        let mut offset = 0u64;
        let phases = phases
            .iter()
            .map(|p| {
                let entry = (p.name.clone(), offset, u64::from(p.months));
                offset += u64::from(p.months);
                entry
            })
            .collect();

        Self {
            base,
            stagger_months,
            phases,
        }
    }

    /// Base date of the order at zero-based position `index`.
    pub fn order_base(&self, index: usize) -> ProvisionResult<NaiveDate> {
        let months = u64::from(self.stagger_months).saturating_mul(index as u64);
        add_months(self.base, months)
    }

    /// Windows of every phase for the order at `index`, in phase order.
    ///
    /// Ends are measured from the order base rather than from each start, so
    /// a day clamped at a short month never opens a gap between phases.
    pub fn windows(&self, index: usize) -> ProvisionResult<Vec<PhaseWindow>> {
        let order_base = self.order_base(index)?;

        self.phases
            .iter()
            .map(|(phase, offset, duration)| {
                Ok(PhaseWindow {
                    phase: phase.clone(),
                    window: ScheduleWindow {
                        start: add_months(order_base, *offset)?,
                        end: add_months(order_base, offset + duration)?,
                    },
                })
            })
            .collect()
    }
}

fn add_months(base: NaiveDate, months: u64) -> ProvisionResult<NaiveDate> {
    u32::try_from(months)
        .ok()
        .and_then(|m| base.checked_add_months(Months::new(m)))
        .ok_or(ProvisionError::DateOutOfRange { base, months })
}
