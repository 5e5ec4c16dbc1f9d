use std::time::Instant;

use crate::align::align_trigger_channel;
use crate::config::SyncConfig;
use crate::events::build_event_stream;
use crate::trigger::prepare_trigger_channel;
use crate::types::*;

/// Runs the full synchronization of one recording.
///
/// Stages run strictly in order: trigger synthesis, alignment against the event table,
/// canonical event building. Only the trigger row of the sample matrix is modified.
///
/// # Arguments
///
/// * `recording` - Reader output; consumed, its sample matrix becomes the result's
/// * `config` - Synchronizer settings
///
/// # Returns
///
/// The corrected samples and event lists, or an error if the recording or config is
/// structurally invalid. Alignment failures are not errors; see [`SyncReport`].
pub fn run(mut recording: RawRecording, config: &SyncConfig) -> Result<SyncResult> {
    let tic = Instant::now();

    config.validate()?;
    recording.validate()?;

    log::info!(
        "Synchronizing {} channels x {} samples ({} trial(s), {} logged events)",
        recording.num_channels(),
        recording.num_samples(),
        recording.trial_count,
        recording.event_table.len()
    );

    let setup = prepare_trigger_channel(&mut recording, config)?;
    let mut report = SyncReport {
        trigger_channel: setup.channel,
        trigger_synthesized: setup.synthesized,
        baseline_removed: setup.baseline_removed,
        trial_markers: setup.trial_markers,
        ..SyncReport::default()
    };

    let RawRecording {
        mut samples,
        channel_labels,
        event_table,
        ..
    } = recording;

    align_trigger_channel(
        samples.row_mut(setup.channel),
        &event_table,
        config,
        &mut report,
    );

    let (canonical_events, original_events) =
        build_event_stream(samples.row_mut(setup.channel), config.boundary_code);
    report.pulses_after = canonical_events.len();

    let result = SyncResult {
        corrected_samples: samples,
        channel_labels,
        canonical_events,
        original_events,
        report,
    };

    log::info!(
        "Done! {} events ({} boundaries), offset {} samples, elapsed {:.1} ms",
        result.canonical_events.len(),
        result.boundary_count(),
        result.report.applied_offset,
        tic.elapsed().as_secs_f64() * 1000.0
    );

    Ok(result)
}
