pub mod align;
pub mod config;
pub mod events;
mod pipeline;
pub mod pulses;
pub mod trigger;
pub mod types;

// Re-export types
pub use config::SyncConfig;
pub use types::*;

/// Reconciles a recording's trigger channel with its logged event table.
///
/// Locates or synthesizes the trigger row, stamps trial markers for segmented
/// recordings, corrects the trigger row by the estimated offset to the event table and
/// builds the canonical event list.
///
/// # Examples
///
/// ```
/// use ndarray::Array2;
/// use trigger_sync::{synchronize, EventTableEntry, RawRecording, SyncConfig};
///
/// let mut samples = Array2::<f64>::zeros((2, 300));
/// samples[[1, 104]] = 5.0; // trigger pulse at sample 105
///
/// let recording = RawRecording::new(samples, vec!["Cz".into(), "TRIGGER".into()], 500.0)
///     .with_event_table(vec![EventTableEntry::new(100, 5.0)]);
///
/// let result = synchronize(recording, &SyncConfig::default()).unwrap();
/// assert_eq!(result.report.applied_offset, 5);
/// assert_eq!(result.canonical_events[0].latency, 100);
/// ```
pub fn synchronize(recording: RawRecording, config: &SyncConfig) -> Result<SyncResult> {
    pipeline::run(recording, config)
}
