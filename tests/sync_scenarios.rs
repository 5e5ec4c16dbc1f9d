use ndarray::{Array1, Array2};
use trigger_sync::pulses::extract_pulses;
use trigger_sync::{
    synchronize, AlignmentStrategy, CanonicalEvent, EpochInfo, EventKind, EventTableEntry,
    OriginalEvent, RawRecording, SkipReason, SyncConfig,
};

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// One EEG channel plus a trigger row holding `trigger`.
fn with_trigger(trigger: &[f64]) -> RawRecording {
    let mut samples = Array2::<f64>::zeros((2, trigger.len()));
    samples.row_mut(0).fill(12.5);
    samples.row_mut(1).assign(&Array1::from(trigger.to_vec()));
    RawRecording::new(samples, labels(&["Cz", "TRIGGER"]), 250.0)
}

#[test]
fn trigger_only_recording() {
    let rec = with_trigger(&[0.0, 0.0, 5.0, 0.0, 0.0, 5.0, 0.0, -99.0, 0.0]);
    let result = synchronize(rec, &SyncConfig::default()).unwrap();

    assert_eq!(
        result.canonical_events,
        vec![
            CanonicalEvent { latency: 3, kind: EventKind::Stimulus(5.0), urevent: Some(1) },
            CanonicalEvent { latency: 6, kind: EventKind::Stimulus(5.0), urevent: Some(2) },
            CanonicalEvent { latency: 8, kind: EventKind::Boundary, urevent: None },
        ]
    );
    assert_eq!(
        result.original_events,
        vec![
            OriginalEvent { code: 5.0, latency: 3 },
            OriginalEvent { code: 5.0, latency: 6 },
        ]
    );
    assert_eq!(result.report.skipped, Some(SkipReason::EmptyEventTable));
    assert_eq!(result.trigger_row()[7], 0.0);
}

#[test]
fn three_trials_get_codes_and_boundaries() {
    let rec = RawRecording::new(Array2::zeros((1, 30)), labels(&["Cz"]), 100.0).with_trials(
        3,
        0.0,
        Some(vec![
            EpochInfo::new(1, 7.0),
            EpochInfo::new(2, 8.0),
            EpochInfo::new(3, 9.0),
        ]),
    );
    let result = synchronize(rec, &SyncConfig::default()).unwrap();

    let summary: Vec<(usize, EventKind)> = result
        .canonical_events
        .iter()
        .map(|e| (e.latency, e.kind))
        .collect();
    assert_eq!(
        summary,
        vec![
            (1, EventKind::Stimulus(7.0)),
            (10, EventKind::Boundary),
            (11, EventKind::Stimulus(8.0)),
            (20, EventKind::Boundary),
            (21, EventKind::Stimulus(9.0)),
            (30, EventKind::Boundary),
        ]
    );
    // Boundaries are presentation only
    let trigger = result.trigger_row();
    assert_eq!(trigger[0], 7.0);
    assert_eq!(trigger[9], 0.0);
    assert_eq!(trigger[29], 0.0);
}

#[test]
fn single_event_offset_is_corrected() {
    let mut trigger = vec![0.0; 300];
    trigger[104] = 5.0;
    let rec = with_trigger(&trigger).with_event_table(vec![EventTableEntry::new(100, 5.0)]);
    let result = synchronize(rec, &SyncConfig::default()).unwrap();

    assert_eq!(result.report.strategy, AlignmentStrategy::Lcs);
    assert_eq!(result.report.estimated_offset, 5);
    assert_eq!(result.report.applied_offset, 5);
    assert_eq!(result.trigger_row()[99], 5.0);
    assert_eq!(result.trigger_row()[104], 0.0);
    assert_eq!(result.canonical_events.len(), 1);
    assert_eq!(result.canonical_events[0].latency, 100);
}

#[test]
fn outlier_does_not_move_the_offset() {
    let mut trigger = vec![0.0; 1000];
    let mut table = Vec::new();
    for (i, code) in [1.0, 2.0, 1.0, 2.0, 1.0, 2.0].iter().enumerate() {
        let sample = 100 + i * 120;
        table.push(EventTableEntry::new(sample, *code));
        trigger[sample - 1 + 7] = *code;
    }
    // One event whose pulse is far off
    table.push(EventTableEntry::new(900, 3.0));
    trigger[900 - 1 + 60] = 3.0;

    let rec = with_trigger(&trigger).with_event_table(table.clone());
    let result = synchronize(rec, &SyncConfig::default()).unwrap();

    assert_eq!(result.report.matched_pairs, 7);
    assert_eq!(result.report.applied_offset, 7);
    for entry in &table {
        assert_eq!(result.trigger_row()[entry.sample - 1], entry.code);
    }
}

#[test]
fn out_of_bound_offset_is_discarded() {
    let mut trigger = vec![0.0; 600];
    trigger[349] = 4.0;
    let rec = with_trigger(&trigger).with_event_table(vec![EventTableEntry::new(100, 4.0)]);
    let result = synchronize(rec, &SyncConfig::default()).unwrap();

    assert_eq!(result.report.estimated_offset, 250);
    assert_eq!(result.report.applied_offset, 0);
    assert!(result.report.offset_rejected);
    // Uncorrected pulse stays, the logged event is stamped in addition
    let latencies: Vec<usize> = result.canonical_events.iter().map(|e| e.latency).collect();
    assert_eq!(latencies, vec![100, 350]);
}

#[test]
fn applied_offset_always_within_bound() {
    let config = SyncConfig::default().with_max_offset(10);
    for shift in [-40i64, -10, -9, 0, 9, 10, 40] {
        let mut trigger = vec![0.0; 200];
        trigger[(100 + shift - 1) as usize] = 2.0;
        let rec = with_trigger(&trigger).with_event_table(vec![EventTableEntry::new(100, 2.0)]);
        let result = synchronize(rec, &config).unwrap();

        assert!(result.report.applied_offset.abs() < 10);
        if shift.abs() >= 10 {
            assert_eq!(result.report.applied_offset, 0);
        } else {
            assert_eq!(result.report.applied_offset, shift);
        }
    }
}

#[test]
fn logged_codes_override_trigger_codes() {
    let mut trigger = vec![0.0; 50];
    trigger[9] = 1.0;
    trigger[29] = 2.0;
    let rec = with_trigger(&trigger).with_event_table(vec![
        EventTableEntry::new(10, 1.0),
        EventTableEntry::new(30, 2.0),
        EventTableEntry::new(40, 6.0),
        EventTableEntry::new(75, 6.0),
    ]);
    let result = synchronize(rec, &SyncConfig::default()).unwrap();

    assert_eq!(result.report.applied_offset, 0);
    assert_eq!(result.report.events_stamped, 1);
    assert_eq!(result.stimulus_count(), 3);
    assert_eq!(result.original_events[2], OriginalEvent { code: 6.0, latency: 40 });
}

#[test]
fn silent_trigger_skips_offset_estimate() {
    let rec = with_trigger(&[0.0; 20]).with_event_table(vec![EventTableEntry::new(5, 3.0)]);
    let result = synchronize(rec, &SyncConfig::default()).unwrap();

    assert_eq!(result.report.skipped, Some(SkipReason::NoTriggerData));
    assert_eq!(result.report.applied_offset, 0);
    assert_eq!(result.report.events_stamped, 1);
    assert_eq!(result.original_events, vec![OriginalEvent { code: 3.0, latency: 5 }]);
}

#[test]
fn event_table_fills_synthesized_trigger() {
    let mut samples = Array2::<f64>::zeros((1, 100));
    samples.row_mut(0).fill(-3.0);
    let rec = RawRecording::new(samples, labels(&["Cz"]), 250.0).with_event_table(vec![
        EventTableEntry::new(10, 3.0),
        EventTableEntry::new(50, 4.0),
    ]);
    let result = synchronize(rec, &SyncConfig::default()).unwrap();

    assert!(result.report.trigger_synthesized);
    assert_eq!(result.report.skipped, Some(SkipReason::NoTriggerData));
    assert!(result.has_events());
    assert_eq!(
        result.canonical_events,
        vec![
            CanonicalEvent { latency: 10, kind: EventKind::Stimulus(3.0), urevent: Some(1) },
            CanonicalEvent { latency: 50, kind: EventKind::Stimulus(4.0), urevent: Some(2) },
        ]
    );
    assert!(result.corrected_samples.row(0).iter().all(|v| *v == -3.0));
}

#[test]
fn long_recording_uses_full_alignment() {
    let events = 2500;
    let mut trigger = vec![0.0; 100 + events * 40];
    let mut table = Vec::with_capacity(events);
    for i in 0..events {
        let sample = 100 + i * 40;
        let code = (i % 3 + 1) as f64;
        table.push(EventTableEntry::new(sample, code));
        trigger[sample - 1 + 4] = code;
    }
    let rec = with_trigger(&trigger).with_event_table(table);
    let result = synchronize(rec, &SyncConfig::default()).unwrap();

    assert_eq!(result.report.strategy, AlignmentStrategy::Lcs);
    assert_eq!(result.report.matched_pairs, events);
    assert_eq!(result.report.applied_offset, 4);
    assert_eq!(result.report.events_stamped, 0);
}

#[test]
fn ledger_links_match_visible_events() {
    let mut trigger = vec![0.0; 400];
    for (i, code) in [3.0, 3.0, -99.0, 4.0, 8.0, -99.0, 3.0].iter().enumerate() {
        trigger[20 + i * 50] = *code;
        trigger[21 + i * 50] = *code;
    }
    let rec = with_trigger(&trigger).with_trials(1, 0.0, None);
    let result = synchronize(rec, &SyncConfig::default()).unwrap();

    assert_eq!(result.boundary_count(), 2);
    for event in &result.canonical_events {
        match (event.kind, event.urevent) {
            (EventKind::Boundary, None) => {}
            (EventKind::Stimulus(code), Some(id)) => {
                let original = result.original_events[id - 1];
                assert_eq!(original.code, code);
                assert_eq!(original.latency, event.latency);
            }
            other => panic!("inconsistent event {:?}", other),
        }
    }
}

#[test]
fn extraction_is_stable_on_corrected_trigger() {
    let mut trigger = vec![0.0; 100];
    trigger[10] = 1.0;
    trigger[11] = 1.0;
    trigger[50] = 2.0;
    let rec = with_trigger(&trigger).with_event_table(vec![EventTableEntry::new(9, 1.0)]);
    let result = synchronize(rec, &SyncConfig::default()).unwrap();

    let first = extract_pulses(result.trigger_row());
    let second = extract_pulses(result.trigger_row());
    assert_eq!(first, second);
    assert_eq!(first.len(), result.canonical_events.len());
}

#[test]
fn result_serializes_to_json() {
    let rec = with_trigger(&[0.0, 5.0, 0.0, -99.0]);
    let result = synchronize(rec, &SyncConfig::default()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();

    assert_eq!(json["canonical_events"][0]["type"], 5.0);
    assert_eq!(json["canonical_events"][0]["urevent"], 1);
    assert_eq!(json["canonical_events"][1]["type"], "boundary");
    assert_eq!(json["original_events"][0]["latency"], 2);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.json");
    result.write_json(&path).unwrap();
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

#[test]
fn small_alignment_budget_uses_single_code_fallback() {
    let mut trigger = vec![0.0; 500];
    let codes = [1.0, 1.0, 2.0, 1.0];
    let mut table = Vec::new();
    for (i, code) in codes.iter().enumerate() {
        let sample = 50 + i * 100;
        table.push(EventTableEntry::new(sample, *code));
        trigger[sample - 1 - 3] = *code;
    }
    // 5 x 5 cells for all codes, 4 x 4 for code 1 only
    let config = SyncConfig::default().with_max_alignment_cells(20);
    let rec = with_trigger(&trigger).with_event_table(table);
    let result = synchronize(rec, &config).unwrap();

    assert_eq!(result.report.strategy, AlignmentStrategy::MostFrequentCode(1.0));
    assert_eq!(result.report.matched_pairs, 3);
    assert_eq!(result.report.applied_offset, -3);
    assert_eq!(result.trigger_row()[49], 1.0);
}

#[test]
fn custom_trigger_labels() {
    let mut samples = Array2::<f64>::zeros((2, 10));
    samples[[0, 4]] = 2.0;
    let rec = RawRecording::new(samples, labels(&["DIN", "Cz"]), 100.0);
    let config = SyncConfig::default()
        .with_trigger_labels(vec!["din".to_string()])
        .with_boundary_code(-1.0);
    let result = synchronize(rec, &config).unwrap();

    assert!(!result.report.trigger_synthesized);
    assert_eq!(result.report.trigger_channel, 0);
    assert_eq!(result.canonical_events[0].latency, 5);
    assert_eq!(result.corrected_samples.nrows(), 2);
}
