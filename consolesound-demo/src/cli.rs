use crate::Args;
use anyhow::{Context, Result};
use consolesound::{
    AppContext, AppRunner, Application, AudioConfig, ConsoleSoundEngine, ConsoleSoundEvent,
    EngineLifecycle, SoundHooks,
};
use std::f64::consts::TAU;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Sine oscillator driven by the engine's global clock
struct SineTone {
    frequency: f64,
    amplitude: f32,
}

impl SoundHooks for SineTone {
    fn sample(&self, _channel: usize, global_time: f64, _time_step: f64) -> f32 {
        self.amplitude * (TAU * self.frequency * global_time).sin() as f32
    }
}

struct DemoApp {
    clip: Option<PathBuf>,
    looping: bool,
    run_for: f32,
    volume: f32,
    config: AudioConfig,
    elapsed: f32,
    next_report: f32,
}

impl Application for DemoApp {
    fn on_start(&mut self, ctx: &mut AppContext) -> bool {
        if let Some(path) = &self.clip {
            match ctx.engine.load_clip(path) {
                Ok(handle) => {
                    ctx.engine.play(handle, self.looping);
                }
                Err(e) => {
                    log::error!("Failed to load {}: {}", path.display(), e);
                    return false;
                }
            }
        }

        if let Err(e) = ctx.engine.start_audio(self.config.clone()) {
            log::error!("Failed to start audio: {}", e);
            return false;
        }
        ctx.engine.set_volume(self.volume);

        if self.run_for > 0.0 {
            log::info!("Playing for {:.1}s (Ctrl+C to stop early)", self.run_for);
        } else {
            log::info!("Playing until Ctrl+C");
        }
        true
    }

    fn on_update(&mut self, ctx: &mut AppContext, elapsed: f32) -> bool {
        self.elapsed += elapsed;

        for event in ctx.engine.poll_events() {
            match event {
                ConsoleSoundEvent::InstanceFinished { instance, clip } => {
                    log::info!("{} of {} finished", instance, clip);
                }
                ConsoleSoundEvent::InstanceLooped { instance, .. } => {
                    log::debug!("{} looped", instance);
                }
                other => log::debug!("Event: {:?}", other),
            }
        }

        if self.elapsed >= self.next_report {
            self.next_report += 1.0;
            let stats = ctx.engine.stats();
            log::info!(
                "t={:.2}s blocks={} frames={} waits={} instances={}",
                ctx.engine.global_time(),
                stats.blocks_submitted,
                stats.frames_mixed,
                stats.producer_waits,
                ctx.engine.active_instances()
            );
        }

        self.run_for <= 0.0 || self.elapsed < self.run_for
    }

    fn on_destroy(&mut self, ctx: &mut AppContext) -> bool {
        log::info!(
            "Shutting down after {:.2}s of audio",
            ctx.engine.global_time()
        );
        true
    }
}

pub fn run(args: Args) -> Result<()> {
    let config = AudioConfig::new()
        .channels(args.channels)
        .block_count(args.blocks)
        .samples_per_block(args.block_samples);
    config.validate().context("Invalid audio parameters")?;

    let mut engine = ConsoleSoundEngine::with_default_device();
    if let Some(frequency) = args.tone {
        engine.set_hooks(SineTone {
            frequency: frequency as f64,
            amplitude: 0.25,
        });
    }

    let lifecycle = Arc::new(EngineLifecycle::new());
    let mut runner =
        AppRunner::new(engine, lifecycle).with_frame_interval(Duration::from_millis(16));

    let close = runner.close_hook();
    ctrlc::set_handler(move || {
        log::info!("Interrupted, waiting for audio teardown");
        close();
    })
    .context("Error setting Ctrl-C handler")?;

    let mut app = DemoApp {
        clip: args.clip,
        looping: args.looping,
        run_for: args.seconds,
        volume: args.volume,
        config,
        elapsed: 0.0,
        next_report: 1.0,
    };

    runner.run(&mut app).context("Audio teardown failed")?;
    log::info!("Done");
    Ok(())
}
