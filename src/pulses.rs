use ndarray::ArrayView1;

use crate::types::Pulse;

/// Collapses the nonzero runs of a trigger row into pulses.
///
/// Scans left to right. A nonzero sample that directly follows a sample with the same
/// value belongs to the previous pulse; only the first sample of each run is reported.
/// Sample indices are 1-based. The row is not modified, so repeated calls agree.
pub fn extract_pulses(trigger: ArrayView1<'_, f64>) -> Vec<Pulse> {
    let mut pulses = Vec::new();
    let mut previous = 0.0;

    for (i, &value) in trigger.iter().enumerate() {
        if value != 0.0 && value != previous {
            pulses.push(Pulse::new(i + 1, value));
        }
        previous = value;
    }

    pulses
}

/// Whether the row carries at least one nonzero sample.
pub fn has_trigger_data(trigger: ArrayView1<'_, f64>) -> bool {
    trigger.iter().any(|&value| value != 0.0)
}
