//! drift - run the ambient engine against the recording backend
//!
//! Run with: cargo run
//!
//! Generates a short sine loop in memory, plays it through the `drift`
//! profile at an accelerated modulation cadence for a couple of seconds,
//! and prints the automation timeline the engine issued.

use std::io::Cursor;
use std::thread;
use std::time::Duration;

use driftscape::backend::{AutomationEvent, OfflineBackend};
use driftscape::engine::{AudioEngine, TrackController, TrackId};
use driftscape::io::WavDecoder;
use driftscape::profile::{Bounds, EffectsProfile};

/// A two-second 110 Hz sine, encoded as 16-bit WAV.
fn sine_loop() -> color_eyre::Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 44_100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut bytes = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)?;
        for i in 0..spec.sample_rate * 2 {
            let t = i as f32 / spec.sample_rate as f32;
            let sample = (t * 110.0 * std::f32::consts::TAU).sin() * 0.4;
            writer.write_sample((sample * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(bytes)
}

/// The drift preset, sped up so the demo sees a handful of ticks.
fn demo_profile() -> EffectsProfile {
    let mut profile = EffectsProfile::drift();
    profile.tick_secs = Bounds::new(0.2, 0.4);
    for t in &mut profile.targets {
        t.ramp_secs = Bounds::new(0.1, 0.2);
    }
    profile
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    env_logger::init();

    let engine = AudioEngine::new(OfflineBackend::realtime(), demo_profile())?.with_seed(0xD21F7);
    let backend = engine.backend();
    let mut controller = TrackController::new(engine, WavDecoder);

    controller.register(TrackId(0), sine_loop()?);
    controller.select(TrackId(0))?;

    // Nudge the controls mid-session the way a surface would.
    controller.controls().set_glitch_intensity(0.8);
    thread::sleep(Duration::from_secs(1));
    controller.controls().set_volume(0.6);
    controller.sync_controls()?;
    thread::sleep(Duration::from_secs(1));

    controller.stop();

    let backend = match backend.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    println!("automation timeline ({} events):", backend.events().len());
    for event in backend.events() {
        match event {
            AutomationEvent::Installed { nodes, edges } => {
                println!("  installed graph: {nodes} stages, {edges} wires");
            }
            AutomationEvent::Started => println!("  source started"),
            AutomationEvent::Stopped => println!("  source stopped"),
            AutomationEvent::Ramp {
                node,
                param,
                target,
                at,
                duration,
            } => {
                println!(
                    "  {at:7.2}s  ramp node#{} {param} -> {target:.3} over {duration:.2}s",
                    node.index()
                );
            }
            AutomationEvent::CurveReplaced { node, amount, len } => {
                println!(
                    "  curve swap node#{}: amount {amount:.2}, {len} samples",
                    node.index()
                );
            }
            AutomationEvent::RateRamp {
                target,
                at,
                duration,
            } => {
                println!("  {at:7.2}s  rate -> {target:.2} over {duration:.3}s");
            }
            AutomationEvent::Teardown => println!("  graph torn down"),
        }
    }
    Ok(())
}
