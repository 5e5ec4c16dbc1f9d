use ndarray::{s, Array2};
use std::error::Error;
use trigger_sync::{synchronize, EventKind, EventTableEntry, RawRecording, SyncConfig};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Optional JSON config as first argument
    let config = match std::env::args().nth(1) {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::default(),
    };

    // Four EEG channels and a trigger row whose pulses lag the logged events by 6 samples
    let sampling_rate_hz = 500.0;
    let num_samples = 5_000;
    let mut samples = Array2::<f64>::zeros((5, num_samples));
    for ch in 0..4 {
        samples
            .slice_mut(s![ch, ..])
            .iter_mut()
            .enumerate()
            .for_each(|(t, v)| *v = ((t + ch * 7) as f64 / 25.0).sin() * 20.0);
    }

    let mut event_table = Vec::new();
    for (i, code) in [11.0, 12.0, 11.0, 13.0, 12.0, 11.0].iter().enumerate() {
        let sample = 400 + i * 700;
        event_table.push(EventTableEntry::new(sample, *code));
        // 10-sample wide pulse on the trigger row
        samples
            .slice_mut(s![4, sample + 5..sample + 15])
            .fill(*code);
    }
    // A code the event log never saw
    samples[[4, 4_600]] = 99.0;

    let labels = vec![
        "Fz".to_string(),
        "Cz".to_string(),
        "Pz".to_string(),
        "Oz".to_string(),
        "TRIGGER".to_string(),
    ];
    let recording =
        RawRecording::new(samples, labels, sampling_rate_hz).with_event_table(event_table);

    println!(
        "Recording: {} channels x {} samples ({:.1} seconds)",
        recording.num_channels(),
        recording.num_samples(),
        recording.duration()
    );

    let result = synchronize(recording, &config)?;

    println!("\nAlignment:");
    println!("  Strategy: {:?}", result.report.strategy);
    println!("  Matched pairs: {}", result.report.matched_pairs);
    println!("  Estimated offset: {} samples", result.report.estimated_offset);
    println!("  Applied offset: {} samples", result.report.applied_offset);
    println!("  Events stamped from log: {}", result.report.events_stamped);

    println!("\nEvents ({} total):", result.canonical_events.len());
    for event in &result.canonical_events {
        let label = match event.kind {
            EventKind::Boundary => "boundary".to_string(),
            EventKind::Stimulus(code) => format!("{}", code),
        };
        println!(
            "  {:>6} ({:.3} s): {}",
            event.latency,
            event.latency_seconds(sampling_rate_hz),
            label
        );
    }

    let output = std::env::temp_dir().join("trigger_sync_demo.json");
    result.write_json(&output)?;
    println!("\nWrote result to {}", output.display());

    Ok(())
}
