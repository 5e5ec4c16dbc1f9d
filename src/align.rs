//! Event-to-trigger alignment
//!
//! Matches the independently logged event table against the pulses found on the
//! trigger row, estimates one systematic sample offset between the two and corrects
//! the trigger row with it. Every failure along the way degrades to a smaller
//! correction, never to an error:
//!
//! 1. order-preserving alignment over all codes both sources share
//! 2. the same alignment restricted to the most frequent shared code
//! 3. index-by-index pairing when event table and pulses are equally long
//! 4. no correction

use std::cmp::{Ordering, Reverse};
use std::collections::{HashMap, HashSet};

use ndarray::ArrayViewMut1;

use crate::config::SyncConfig;
use crate::pulses::{extract_pulses, has_trigger_data};
use crate::types::{AlignError, AlignmentStrategy, EventTableEntry, Pulse, SkipReason, SyncReport};

/// Something that sits at a sample position and carries a code.
pub trait Labeled {
    fn position(&self) -> usize;
    fn label(&self) -> f64;
}

impl Labeled for EventTableEntry {
    fn position(&self) -> usize {
        self.sample
    }

    fn label(&self) -> f64 {
        self.code
    }
}

impl Labeled for Pulse {
    fn position(&self) -> usize {
        self.sample
    }

    fn label(&self) -> f64 {
        self.code
    }
}

/// Hash key for a code; -0.0 and 0.0 share one key.
fn code_key(code: f64) -> u64 {
    (code + 0.0).to_bits()
}

// Lexicographic: more matches first, then smaller summed distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
struct Score(u32, Reverse<u64>);

impl Score {
    fn extend(self, distance: u64) -> Self {
        Score(self.0 + 1, Reverse(self.1 .0.saturating_add(distance)))
    }
}

// Backtrack step stored per alignment cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Diagonal,
    Up,
    Left,
}

/// Aligns two labeled sequences, preserving order on both sides.
///
/// Returns index pairs `(left, right)` of matched elements. Elements match when their
/// labels are equal; the alignment maximises the number of matches and, among
/// alignments with as many matches, minimises the summed position distance.
/// Fails with [`AlignError::TooLarge`] when the table would exceed `max_cells`.
pub fn lcs_align<A: Labeled, B: Labeled>(
    left: &[A],
    right: &[B],
    max_cells: usize,
) -> Result<Vec<(usize, usize)>, AlignError> {
    let (n, m) = (left.len(), right.len());
    if n == 0 || m == 0 {
        return Err(AlignError::Empty);
    }
    let cells = (n + 1)
        .checked_mul(m + 1)
        .ok_or(AlignError::TooLarge {
            cells: usize::MAX,
            limit: max_cells,
        })?;
    if cells > max_cells {
        return Err(AlignError::TooLarge {
            cells,
            limit: max_cells,
        });
    }

    // Scores live in two rolling rows; only the chosen move is kept per cell.
    let width = m + 1;
    let mut moves = vec![Move::Left; cells];
    let mut previous = vec![Score::default(); width];
    let mut current = vec![Score::default(); width];
    for i in 1..=n {
        let a = &left[i - 1];
        current[0] = Score::default();
        for j in 1..=m {
            let b = &right[j - 1];
            let up = previous[j];
            let back = current[j - 1];
            let diagonal = (a.label() == b.label())
                .then(|| previous[j - 1].extend(a.position().abs_diff(b.position()) as u64));

            let (score, step) = match diagonal {
                Some(diag) if diag >= up && diag >= back => (diag, Move::Diagonal),
                _ if up >= back => (up, Move::Up),
                _ => (back, Move::Left),
            };
            current[j] = score;
            moves[i * width + j] = step;
        }
        std::mem::swap(&mut previous, &mut current);
    }

    let mut pairs = Vec::with_capacity(previous[m].0 as usize);
    let (mut i, mut j) = (n, m);
    while i > 0 && j > 0 {
        match moves[i * width + j] {
            Move::Diagonal => {
                pairs.push((i - 1, j - 1));
                i -= 1;
                j -= 1;
            }
            Move::Up => i -= 1,
            Move::Left => j -= 1,
        }
    }
    pairs.reverse();

    if pairs.is_empty() {
        return Err(AlignError::NoMatches);
    }
    Ok(pairs)
}

/// Codes present in both sequences, in order of first appearance in `events`.
pub fn common_codes<A: Labeled, B: Labeled>(events: &[A], pulses: &[B]) -> Vec<f64> {
    let pulse_codes: HashSet<u64> = pulses.iter().map(|p| code_key(p.label())).collect();
    let mut seen = HashSet::new();
    events
        .iter()
        .map(|e| e.label())
        .filter(|code| pulse_codes.contains(&code_key(*code)) && seen.insert(code_key(*code)))
        .collect()
}

fn restrict<T: Labeled + Copy>(items: &[T], codes: &[f64]) -> Vec<T> {
    let keys: HashSet<u64> = codes.iter().map(|c| code_key(*c)).collect();
    items
        .iter()
        .filter(|item| keys.contains(&code_key(item.label())))
        .copied()
        .collect()
}

/// The code with the highest combined occurrence count.
///
/// Ties go to the code that appears first in `events`.
pub fn most_frequent_code<A: Labeled, B: Labeled>(events: &[A], pulses: &[B]) -> Option<f64> {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for code in events
        .iter()
        .map(|e| e.label())
        .chain(pulses.iter().map(|p| p.label()))
    {
        *counts.entry(code_key(code)).or_insert(0) += 1;
    }

    let mut best: Option<(f64, usize)> = None;
    for code in events.iter().map(|e| e.label()).chain(pulses.iter().map(|p| p.label())) {
        let count = counts[&code_key(code)];
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((code, count));
        }
    }
    best.map(|(code, _)| code)
}

/// Sample deltas (pulse minus event) of pairs whose codes agree.
///
/// Pairs whose delta does not fit an `i64` are dropped.
fn matched_deltas(
    events: &[EventTableEntry],
    pulses: &[Pulse],
    pairs: &[(usize, usize)],
) -> Vec<i64> {
    pairs
        .iter()
        .map(|&(e, p)| (events[e], pulses[p]))
        .filter(|(event, pulse)| event.code == pulse.code)
        .filter_map(|(event, pulse)| {
            let pulse_sample = i64::try_from(pulse.sample).ok()?;
            let event_sample = i64::try_from(event.sample).ok()?;
            pulse_sample.checked_sub(event_sample)
        })
        .collect()
}

fn aligned_deltas(
    events: &[EventTableEntry],
    pulses: &[Pulse],
    max_cells: usize,
) -> Result<Vec<i64>, AlignError> {
    let pairs = lcs_align(events, pulses, max_cells)?;
    let deltas = matched_deltas(events, pulses, &pairs);
    if deltas.is_empty() {
        return Err(AlignError::NoMatches);
    }
    Ok(deltas)
}

fn positional_deltas(events: &[EventTableEntry], pulses: &[Pulse]) -> Result<Vec<i64>, AlignError> {
    if events.len() != pulses.len() {
        return Err(AlignError::LengthMismatch {
            events: events.len(),
            pulses: pulses.len(),
        });
    }
    let pairs: Vec<(usize, usize)> = (0..events.len()).map(|i| (i, i)).collect();
    let deltas = matched_deltas(events, pulses, &pairs);
    if deltas.is_empty() {
        return Err(AlignError::NoMatches);
    }
    Ok(deltas)
}

/// Median of the finite values; the mean of the two middle values for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = finite.len() / 2;
    if finite.len() % 2 == 1 {
        Some(finite[mid])
    } else {
        Some((finite[mid - 1] + finite[mid]) * 0.5)
    }
}

/// Median delta rounded half away from zero.
fn median_offset(deltas: &[i64]) -> i64 {
    let values: Vec<f64> = deltas.iter().map(|d| *d as f64).collect();
    median(&values).map_or(0, |m| m.round() as i64)
}

/// Result of offset estimation before the bound check.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetEstimate {
    pub strategy: AlignmentStrategy,
    pub common_codes: Vec<f64>,
    pub matched_pairs: usize,
    /// Median of (pulse sample - event sample) over matched pairs
    pub offset: i64,
}

/// Estimates the systematic shift of the trigger pulses relative to the event table.
///
/// Runs the fallback chain described in the module docs; the offset is 0 when no step
/// yields a correspondence.
pub fn estimate_offset(events: &[EventTableEntry], pulses: &[Pulse], max_cells: usize) -> OffsetEstimate {
    let common = common_codes(events, pulses);
    let shared_events = restrict(events, &common);
    let shared_pulses = restrict(pulses, &common);
    log::debug!(
        "{} codes shared by {} events and {} pulses",
        common.len(),
        shared_events.len(),
        shared_pulses.len()
    );

    let attempt = aligned_deltas(&shared_events, &shared_pulses, max_cells)
        .map(|deltas| (AlignmentStrategy::Lcs, deltas))
        .or_else(|err| {
            log::warn!("Event alignment failed ({}), retrying with the most frequent code", err);
            let code = most_frequent_code(&shared_events, &shared_pulses).ok_or(AlignError::Empty)?;
            let events = restrict(&shared_events, &[code]);
            let pulses = restrict(&shared_pulses, &[code]);
            aligned_deltas(&events, &pulses, max_cells)
                .map(|deltas| (AlignmentStrategy::MostFrequentCode(code), deltas))
        })
        .or_else(|err| {
            log::warn!("Single-code alignment failed ({}), trying positional pairing", err);
            positional_deltas(events, &shared_pulses)
                .map(|deltas| (AlignmentStrategy::Positional, deltas))
        });

    match attempt {
        Ok((strategy, deltas)) => OffsetEstimate {
            strategy,
            common_codes: common,
            matched_pairs: deltas.len(),
            offset: median_offset(&deltas),
        },
        Err(err) => {
            log::warn!("No usable event correspondence ({}), offset defaults to 0", err);
            OffsetEstimate {
                strategy: AlignmentStrategy::None,
                common_codes: common,
                matched_pairs: 0,
                offset: 0,
            }
        }
    }
}

/// Returns the offset if `|offset| < max_offset`.
pub fn bounded_offset(offset: i64, max_offset: i64) -> Option<i64> {
    if offset.abs() < max_offset {
        Some(offset)
    } else {
        None
    }
}

/// Shifts the row by `offset` samples, zero-filling the vacated end.
///
/// A positive offset moves content toward earlier samples. Content pushed past either
/// end of the row is dropped.
pub fn shift_trigger(mut trigger: ArrayViewMut1<'_, f64>, offset: i64) {
    if offset == 0 {
        return;
    }
    let original = trigger.to_vec();
    let len = original.len() as i64;
    for (i, value) in trigger.iter_mut().enumerate() {
        let source = i as i64 + offset;
        *value = if (0..len).contains(&source) {
            original[source as usize]
        } else {
            0.0
        };
    }
}

/// Writes each in-range event code onto the row where the row disagrees.
///
/// Returns the number of samples written.
pub fn stamp_events(mut trigger: ArrayViewMut1<'_, f64>, events: &[EventTableEntry]) -> usize {
    let len = trigger.len();
    let mut stamped = 0;
    for event in events {
        if event.sample == 0 || event.sample > len {
            continue;
        }
        let slot = &mut trigger[event.sample - 1];
        if *slot != event.code {
            *slot = event.code;
            stamped += 1;
        }
    }
    stamped
}

/// Aligns the trigger row with the event table and applies the bounded correction.
///
/// Does nothing when the event table is empty. A row with no nonzero sample has
/// nothing to correct; the event table is stamped onto it unshifted.
/// Progress is recorded in `report`; the applied offset is returned.
pub fn align_trigger_channel(
    mut trigger: ArrayViewMut1<'_, f64>,
    events: &[EventTableEntry],
    config: &SyncConfig,
    report: &mut SyncReport,
) -> i64 {
    if events.is_empty() {
        log::debug!("Event table is empty, skipping alignment");
        report.skipped = Some(SkipReason::EmptyEventTable);
        return 0;
    }
    if !has_trigger_data(trigger.view()) {
        log::debug!("Trigger channel is silent, stamping the event table without alignment");
        report.skipped = Some(SkipReason::NoTriggerData);
        report.events_stamped = stamp_events(trigger.view_mut(), events);
        return 0;
    }

    let pulses = extract_pulses(trigger.view());
    report.pulses_before = pulses.len();

    let estimate = estimate_offset(events, &pulses, config.max_alignment_cells);
    report.strategy = estimate.strategy;
    report.common_codes = estimate.common_codes;
    report.matched_pairs = estimate.matched_pairs;
    report.estimated_offset = estimate.offset;

    let offset = match bounded_offset(estimate.offset, config.max_offset_samples) {
        Some(offset) => offset,
        None => {
            log::warn!(
                "Estimated offset of {} samples exceeds the bound of {}, not applied",
                estimate.offset,
                config.max_offset_samples
            );
            report.offset_rejected = true;
            0
        }
    };

    if offset != 0 {
        log::info!(
            "Shifting trigger channel by {} samples ({} matched events)",
            offset,
            estimate.matched_pairs
        );
        shift_trigger(trigger.view_mut(), offset);
    }
    report.applied_offset = offset;
    report.events_stamped = stamp_events(trigger.view_mut(), events);
    offset
}
