use ndarray::{Array2, ArrayView1};
use serde::{Serialize, Serializer};
use std::io;
use std::path::Path;
use thiserror::Error;

/// One entry of the independently logged event table.
///
/// The sample index is 1-based against the untrialed, concatenated stream and is
/// taken as ground truth for event timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EventTableEntry {
    /// 1-based sample index
    pub sample: usize,
    /// Event code
    pub code: f64,
}

impl EventTableEntry {
    pub fn new(sample: usize, code: f64) -> Self {
        Self { sample, code }
    }
}

/// Stimulus code recorded for one trial of a segmented recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochInfo {
    /// 1-based trial number
    pub trial: usize,
    /// Stimulus code stamped at the trial's time-zero sample
    pub code: f64,
}

impl EpochInfo {
    pub fn new(trial: usize, code: f64) -> Self {
        Self { trial, code }
    }
}

/// Structured output of the upstream file reader.
///
/// Holds the sample matrix and the side tables the synchronizer needs. The sample
/// matrix is laid out as `[num_channels, num_samples]`; for segmented recordings the
/// time axis is the concatenation of `trial_count` equally long trials.
#[derive(Debug, Clone)]
pub struct RawRecording {
    /// Channel data
    /// - Shape: [num_channels, num_samples]
    pub samples: Array2<f64>,
    /// One label per row of `samples`
    pub channel_labels: Vec<String>,
    /// Sampling rate (Hz)
    pub sampling_rate_hz: f64,
    /// Number of concatenated trials (1 for continuous recordings)
    pub trial_count: usize,
    /// Time of the first sample of each trial relative to its time-zero (μs)
    pub trial_offset_usec: f64,
    /// Independently logged events, may be empty
    pub event_table: Vec<EventTableEntry>,
    /// Per-trial stimulus codes, only meaningful when `trial_count > 1`
    pub epoch_info: Option<Vec<EpochInfo>>,
}

impl RawRecording {
    /// Creates a continuous (single trial) recording with an empty event table.
    pub fn new(samples: Array2<f64>, channel_labels: Vec<String>, sampling_rate_hz: f64) -> Self {
        Self {
            samples,
            channel_labels,
            sampling_rate_hz,
            trial_count: 1,
            trial_offset_usec: 0.0,
            event_table: Vec::new(),
            epoch_info: None,
        }
    }

    pub fn with_event_table(mut self, event_table: Vec<EventTableEntry>) -> Self {
        self.event_table = event_table;
        self
    }

    /// Marks the recording as `trial_count` concatenated trials.
    pub fn with_trials(
        mut self,
        trial_count: usize,
        trial_offset_usec: f64,
        epoch_info: Option<Vec<EpochInfo>>,
    ) -> Self {
        self.trial_count = trial_count;
        self.trial_offset_usec = trial_offset_usec;
        self.epoch_info = epoch_info;
        self
    }

    pub fn num_channels(&self) -> usize {
        self.samples.nrows()
    }

    pub fn num_samples(&self) -> usize {
        self.samples.ncols()
    }

    /// Returns the length of one trial in samples.
    ///
    /// If `trial_count` is zero, returns the full length.
    pub fn samples_per_trial(&self) -> usize {
        if self.trial_count == 0 {
            self.num_samples()
        } else {
            self.num_samples() / self.trial_count
        }
    }

    /// Returns the duration of the recording in seconds.
    pub fn duration(&self) -> f64 {
        if self.sampling_rate_hz > 0.0 {
            self.num_samples() as f64 / self.sampling_rate_hz
        } else {
            0.0
        }
    }

    /// Checks the structural invariants the synchronizer relies on.
    ///
    /// Nothing is mutated; a recording that fails here is rejected before any stage runs.
    pub fn validate(&self) -> Result<()> {
        if self.channel_labels.len() != self.num_channels() {
            return Err(SyncError::InvalidRecording(format!(
                "{} channel labels for {} sample rows",
                self.channel_labels.len(),
                self.num_channels()
            )));
        }
        if self.num_samples() == 0 {
            return Err(SyncError::InvalidRecording(
                "recording has no samples".to_string(),
            ));
        }
        if !self.sampling_rate_hz.is_finite() || self.sampling_rate_hz <= 0.0 {
            return Err(SyncError::InvalidRecording(format!(
                "sampling rate must be positive, got {} Hz",
                self.sampling_rate_hz
            )));
        }
        if self.trial_count == 0 {
            return Err(SyncError::InvalidRecording(
                "trial count must be at least 1".to_string(),
            ));
        }
        if self.num_samples() % self.trial_count != 0 {
            return Err(SyncError::InvalidRecording(format!(
                "{} samples cannot be split into {} equal trials",
                self.num_samples(),
                self.trial_count
            )));
        }
        if !self.trial_offset_usec.is_finite() {
            return Err(SyncError::InvalidRecording(
                "trial offset must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// A run-collapsed nonzero value on the trigger channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    /// 1-based sample index of the first sample of the run
    pub sample: usize,
    /// Code carried by the run
    pub code: f64,
}

impl Pulse {
    pub fn new(sample: usize, code: f64) -> Self {
        Self { sample, code }
    }
}

/// Type of a canonical event: a synthetic trial boundary or a stimulus code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind {
    Boundary,
    Stimulus(f64),
}

impl EventKind {
    pub fn is_boundary(&self) -> bool {
        matches!(self, EventKind::Boundary)
    }

    pub fn code(&self) -> Option<f64> {
        match self {
            EventKind::Boundary => None,
            EventKind::Stimulus(code) => Some(*code),
        }
    }
}

// Boundaries serialize as the string "boundary", stimuli as their numeric code.
impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            EventKind::Boundary => serializer.serialize_str("boundary"),
            EventKind::Stimulus(code) => serializer.serialize_f64(*code),
        }
    }
}

/// Final, corrected event exposed to downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CanonicalEvent {
    /// 1-based sample index
    pub latency: usize,
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// 1-based index into the original event ledger, `None` for boundaries
    pub urevent: Option<usize>,
}

impl CanonicalEvent {
    /// Returns the event onset in seconds from the first sample.
    pub fn latency_seconds(&self, sampling_rate_hz: f64) -> f64 {
        (self.latency.saturating_sub(1)) as f64 / sampling_rate_hz
    }
}

/// Ledger record backing a stimulus event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OriginalEvent {
    #[serde(rename = "type")]
    pub code: f64,
    /// 1-based sample index
    pub latency: usize,
}

/// Which step of the alignment fallback chain produced the offset estimate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub enum AlignmentStrategy {
    /// Order-preserving alignment over all codes common to both sources
    Lcs,
    /// Alignment restricted to the most frequent common code
    MostFrequentCode(f64),
    /// Index-by-index pairing of equally long sequences
    Positional,
    /// No usable correspondence; offset defaulted to zero
    #[default]
    None,
}

/// Why the aligner did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// The independent event table is empty
    EmptyEventTable,
    /// The trigger channel carries no nonzero sample
    NoTriggerData,
}

/// Per-call diagnostics collected while synchronizing one recording.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    /// Row of the sample matrix used as trigger channel
    pub trigger_channel: usize,
    /// Whether the trigger row was appended because no channel was labelled as trigger
    pub trigger_synthesized: bool,
    /// Median removed from a pre-existing trigger row
    pub baseline_removed: f64,
    /// Trial markers written onto the trigger row (codes and boundaries)
    pub trial_markers: usize,
    /// Pulses found before alignment
    pub pulses_before: usize,
    /// Codes present in both the event table and the trigger pulses
    pub common_codes: Vec<f64>,
    /// Fallback step that produced the offset estimate
    pub strategy: AlignmentStrategy,
    /// Pairs contributing to the offset estimate
    pub matched_pairs: usize,
    /// Median delta before the bound check
    pub estimated_offset: i64,
    /// Shift actually applied to the trigger row
    pub applied_offset: i64,
    /// Whether the estimate was discarded for exceeding the bound
    pub offset_rejected: bool,
    /// Event table entries written onto the trigger row after correction
    pub events_stamped: usize,
    /// Pulses found after alignment
    pub pulses_after: usize,
    /// Set when offset estimation did not run
    pub skipped: Option<SkipReason>,
}

/// Output of the synchronizer.
///
/// The trigger row of `corrected_samples` carries the shifted and stamped codes with
/// boundary sentinels cleared; all other rows are the input rows untouched.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    /// Sample matrix with the trigger row corrected
    /// - Shape: [num_channels, num_samples]
    pub corrected_samples: Array2<f64>,
    /// Channel labels, including a synthesized trigger label if one was added
    pub channel_labels: Vec<String>,
    /// Ordered by ascending latency
    pub canonical_events: Vec<CanonicalEvent>,
    /// Ledger of stimulus events, indexed by `CanonicalEvent::urevent - 1`
    pub original_events: Vec<OriginalEvent>,
    /// Diagnostics of this run
    pub report: SyncReport,
}

impl SyncResult {
    /// Returns a view of the corrected trigger row.
    pub fn trigger_row(&self) -> ArrayView1<'_, f64> {
        self.corrected_samples.row(self.report.trigger_channel)
    }

    pub fn boundary_count(&self) -> usize {
        self.canonical_events
            .iter()
            .filter(|event| event.kind.is_boundary())
            .count()
    }

    pub fn stimulus_count(&self) -> usize {
        self.canonical_events.len() - self.boundary_count()
    }

    /// Whether any event survived synchronization.
    pub fn has_events(&self) -> bool {
        !self.canonical_events.is_empty()
    }

    /// Serializes the whole result, sample matrix included, to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Fatal errors of the synchronizer.
///
/// Alignment problems are never surfaced here; they degrade to an uncorrected trigger
/// channel and are visible through [`SyncReport`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// The recording violates a structural invariant
    #[error("Invalid recording: {0}")]
    InvalidRecording(String),
    /// The configuration is unusable
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// The trigger row could not be appended to the sample matrix
    #[error("Could not append trigger row: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Reasons a correspondence between event table and pulses could not be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignError {
    #[error("nothing to align")]
    Empty,
    #[error("alignment table of {cells} cells exceeds the limit of {limit}")]
    TooLarge { cells: usize, limit: usize },
    #[error("no matching codes")]
    NoMatches,
    #[error("{events} events cannot be paired with {pulses} pulses")]
    LengthMismatch { events: usize, pulses: usize },
}
