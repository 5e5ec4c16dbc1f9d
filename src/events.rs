use ndarray::ArrayViewMut1;

use crate::pulses::extract_pulses;
use crate::types::{CanonicalEvent, EventKind, OriginalEvent};

/// Builds the canonical event list and its original-event ledger from a corrected
/// trigger row.
///
/// Boundary pulses become [`EventKind::Boundary`] events without a ledger entry, and
/// their sentinel run is cleared from the row. Every other pulse is appended to the
/// ledger and referenced by its 1-based ledger position. Both lists are empty when the
/// row carries no pulse.
pub fn build_event_stream(
    mut trigger: ArrayViewMut1<'_, f64>,
    boundary_code: f64,
) -> (Vec<CanonicalEvent>, Vec<OriginalEvent>) {
    let pulses = extract_pulses(trigger.view());
    let mut canonical = Vec::with_capacity(pulses.len());
    let mut ledger = Vec::new();

    for pulse in pulses {
        if pulse.code == boundary_code {
            canonical.push(CanonicalEvent {
                latency: pulse.sample,
                kind: EventKind::Boundary,
                urevent: None,
            });
            clear_run(trigger.view_mut(), pulse.sample - 1, boundary_code);
        } else {
            ledger.push(OriginalEvent {
                code: pulse.code,
                latency: pulse.sample,
            });
            canonical.push(CanonicalEvent {
                latency: pulse.sample,
                kind: EventKind::Stimulus(pulse.code),
                urevent: Some(ledger.len()),
            });
        }
    }

    log::debug!(
        "Built {} canonical events ({} in ledger)",
        canonical.len(),
        ledger.len()
    );
    (canonical, ledger)
}

// Zeroes the contiguous run of `code` starting at `start`.
fn clear_run(mut trigger: ArrayViewMut1<'_, f64>, start: usize, code: f64) {
    for value in trigger.iter_mut().skip(start) {
        if *value != code {
            break;
        }
        *value = 0.0;
    }
}
