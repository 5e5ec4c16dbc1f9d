use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use trigger_sync::align::lcs_align;
use trigger_sync::{synchronize, EventTableEntry, Pulse, RawRecording, SyncConfig};

const CHANNELS: usize = 32;
const SAMPLES: usize = 250_000;
const EVENTS: usize = 400;
const LATENCY: usize = 8;

/// A continuous recording whose trigger pulses lag the logged events by `LATENCY` samples.
fn synthetic_recording() -> RawRecording {
    let mut samples = Array2::<f64>::zeros((CHANNELS + 1, SAMPLES));
    let mut table = Vec::with_capacity(EVENTS);
    for i in 0..EVENTS {
        let sample = 500 + i * 600;
        let code = (i % 4 + 1) as f64;
        table.push(EventTableEntry::new(sample, code));
        for width in 0..5 {
            samples[[CHANNELS, sample - 1 + LATENCY + width]] = code;
        }
    }
    let mut labels: Vec<String> = (0..CHANNELS).map(|i| format!("E{}", i + 1)).collect();
    labels.push("TRIGGER".to_string());
    RawRecording::new(samples, labels, 1000.0).with_event_table(table)
}

pub fn bench_synchronize(c: &mut Criterion) {
    let recording = synthetic_recording();
    let config = SyncConfig::default();

    c.bench_function("synchronize_continuous", |b| {
        b.iter(|| {
            let result = synchronize(black_box(recording.clone()), &config);
            black_box(result.is_ok())
        });
    });
}

pub fn bench_sequence_alignment(c: &mut Criterion) {
    let events: Vec<EventTableEntry> = (0..EVENTS)
        .map(|i| EventTableEntry::new(i * 100 + 1, (i % 4) as f64))
        .collect();
    let pulses: Vec<Pulse> = (0..EVENTS)
        .filter(|i| i % 17 != 0)
        .map(|i| Pulse::new(i * 100 + 4, (i % 4) as f64))
        .collect();

    let max_cells = SyncConfig::default().max_alignment_cells;

    c.bench_function("lcs_align_400", |b| {
        b.iter(|| black_box(lcs_align(black_box(&events), black_box(&pulses), max_cells)));
    });
}

criterion_group!(benches, bench_synchronize, bench_sequence_alignment);
criterion_main!(benches);
