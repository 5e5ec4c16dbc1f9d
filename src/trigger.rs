use ndarray::Array1;

use crate::align::median;
use crate::config::SyncConfig;
use crate::types::{RawRecording, Result};

/// Where the trigger row ended up and what the synthesizer did to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerSetup {
    /// Row index of the trigger channel
    pub channel: usize,
    /// Whether the row was appended
    pub synthesized: bool,
    /// Median subtracted from a pre-existing row (0 when nothing was removed)
    pub baseline_removed: f64,
    /// Number of trial markers written
    pub trial_markers: usize,
}

/// Returns the first channel whose label names a trigger row.
pub fn find_trigger_channel(labels: &[String], config: &SyncConfig) -> Option<usize> {
    let mut matches = labels
        .iter()
        .enumerate()
        .filter(|(_, label)| config.is_trigger_label(label))
        .map(|(i, _)| i);

    let first = matches.next()?;
    let extra: Vec<usize> = matches.collect();
    if !extra.is_empty() {
        log::warn!(
            "{} channels are labelled as trigger; using channel {} ('{}')",
            extra.len() + 1,
            first,
            labels[first]
        );
    }
    Some(first)
}

/// Ensures exactly one trigger row exists and stamps trial markers onto it.
///
/// A missing trigger row is appended as zeros under `config.trigger_label`. An existing
/// row has its median removed. For segmented recordings every trial gets its stimulus
/// code at its time-zero sample and `config.boundary_code` at its last sample; markers
/// overwrite whatever the row held there.
pub fn prepare_trigger_channel(
    recording: &mut RawRecording,
    config: &SyncConfig,
) -> Result<TriggerSetup> {
    let mut setup = match find_trigger_channel(&recording.channel_labels, config) {
        Some(channel) => {
            let baseline_removed = if config.remove_trigger_baseline {
                remove_baseline(recording, channel)
            } else {
                0.0
            };
            TriggerSetup {
                channel,
                synthesized: false,
                baseline_removed,
                trial_markers: 0,
            }
        }
        None => {
            let num_samples = recording.num_samples();
            recording
                .samples
                .push_row(Array1::<f64>::zeros(num_samples).view())?;
            recording.channel_labels.push(config.trigger_label.clone());
            let channel = recording.num_channels() - 1;
            log::debug!(
                "No trigger channel found, appended '{}' as channel {}",
                config.trigger_label,
                channel
            );
            TriggerSetup {
                channel,
                synthesized: true,
                baseline_removed: 0.0,
                trial_markers: 0,
            }
        }
    };

    if recording.trial_count > 1 {
        setup.trial_markers = stamp_trial_markers(recording, setup.channel, config);
    }

    Ok(setup)
}

fn remove_baseline(recording: &mut RawRecording, channel: usize) -> f64 {
    let values = recording.samples.row(channel).to_vec();
    let baseline = median(&values).unwrap_or(0.0);
    if baseline != 0.0 {
        log::debug!("Removing trigger baseline of {}", baseline);
        recording
            .samples
            .row_mut(channel)
            .mapv_inplace(|v| v - baseline);
    }
    baseline
}

/// Returns the 0-based in-trial index of the sample closest to time zero.
///
/// Sample `k` of a trial sits at `trial_offset_usec + k * 1e6 / sampling_rate_hz`
/// microseconds; ties go to the earlier sample.
pub fn time_zero_index(samples_per_trial: usize, sampling_rate_hz: f64, trial_offset_usec: f64) -> usize {
    let step_usec = 1e6 / sampling_rate_hz;
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for k in 0..samples_per_trial {
        let distance = (trial_offset_usec + k as f64 * step_usec).abs();
        if distance < best_distance {
            best = k;
            best_distance = distance;
        }
    }
    best
}

fn stamp_trial_markers(recording: &mut RawRecording, channel: usize, config: &SyncConfig) -> usize {
    let samples_per_trial = recording.samples_per_trial();
    if samples_per_trial == 0 {
        return 0;
    }
    let zero = time_zero_index(
        samples_per_trial,
        recording.sampling_rate_hz,
        recording.trial_offset_usec,
    );
    let epoch_info = recording.epoch_info.as_deref().unwrap_or(&[]);
    let trial_count = recording.trial_count;
    let mut row = recording.samples.row_mut(channel);

    let mut markers = 0;
    for trial in 0..trial_count {
        let start = trial * samples_per_trial;
        let code = epoch_info
            .iter()
            .find(|info| info.trial == trial + 1)
            .map(|info| info.code)
            .unwrap_or(config.default_trial_code);

        row[start + zero] = code;
        row[start + samples_per_trial - 1] = config.boundary_code;
        markers += 2;
    }

    log::debug!(
        "Stamped {} trials of {} samples (time zero at sample {})",
        trial_count,
        samples_per_trial,
        zero + 1
    );
    markers
}
