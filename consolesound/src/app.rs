//! Fixed-cadence main loop hosting an [`Application`].

use crate::engine::ConsoleSoundEngine;
use crate::error::{ConsoleSoundError, Result};
use crate::lifecycle::{EngineLifecycle, LifecyclePhase};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// What the application sees on every callback
pub struct AppContext {
    pub engine: ConsoleSoundEngine,
    pub lifecycle: Arc<EngineLifecycle>,
}

/// Callbacks driven by [`AppRunner::run`].
pub trait Application {
    /// Called once before the first update. Returning false shuts down
    /// without running any updates.
    fn on_start(&mut self, ctx: &mut AppContext) -> bool {
        let _ = ctx;
        true
    }

    /// Called once per frame with the seconds elapsed since the previous frame.
    /// Returning false requests shutdown.
    fn on_update(&mut self, ctx: &mut AppContext, elapsed: f32) -> bool;

    /// Called when shutdown is requested. Returning false vetoes it and the
    /// loop keeps running.
    fn on_destroy(&mut self, ctx: &mut AppContext) -> bool {
        let _ = ctx;
        true
    }
}

pub struct AppRunner {
    ctx: AppContext,
    frame_interval: Duration,
}

impl AppRunner {
    pub fn new(engine: ConsoleSoundEngine, lifecycle: Arc<EngineLifecycle>) -> Self {
        Self {
            ctx: AppContext { engine, lifecycle },
            frame_interval: Duration::from_millis(16),
        }
    }

    /// Minimum time between two updates
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn engine(&self) -> &ConsoleSoundEngine {
        &self.ctx.engine
    }

    pub fn engine_mut(&mut self) -> &mut ConsoleSoundEngine {
        &mut self.ctx.engine
    }

    /// Handler to install for the host's termination signal.
    ///
    /// It asks the loop to stop and blocks until teardown is complete.
    pub fn close_hook(&self) -> impl Fn() + Send + Sync + 'static {
        let lifecycle = self.ctx.lifecycle.clone();
        move || lifecycle.request_close_and_wait()
    }

    /// Run until the application or the host ends the loop and teardown completes.
    ///
    /// Audio is stopped before the terminator is released, and the teardown
    /// result is returned.
    ///
    /// # Errors
    ///
    /// `Engine` without calling the application if the lifecycle is already
    /// running another loop.
    pub fn run<A: Application>(&mut self, app: &mut A) -> Result<()> {
        let lifecycle = self.ctx.lifecycle.clone();
        if !lifecycle.begin() {
            return Err(ConsoleSoundError::Engine(format!(
                "main loop already active (lifecycle {:?})",
                lifecycle.phase()
            )));
        }

        if !app.on_start(&mut self.ctx) {
            log::info!("Application declined to start");
            lifecycle.request_stop();
        }

        let mut last = Instant::now();
        loop {
            match lifecycle.phase() {
                LifecyclePhase::Running => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last).as_secs_f32();
                    last = now;

                    if !app.on_update(&mut self.ctx, elapsed) {
                        lifecycle.request_stop();
                        continue;
                    }

                    let spent = now.elapsed();
                    if spent < self.frame_interval {
                        thread::sleep(self.frame_interval - spent);
                    }
                }
                LifecyclePhase::Stopping => {
                    if app.on_destroy(&mut self.ctx) {
                        break;
                    }
                    lifecycle.cancel_stop();
                    last = Instant::now();
                }
                LifecyclePhase::Stopped => {
                    log::warn!("Lifecycle stopped outside of the main loop");
                    break;
                }
            }
        }

        let result = self.ctx.engine.stop_audio();
        if let Err(e) = &result {
            log::error!("Audio teardown reported an error: {}", e);
        }
        lifecycle.complete_teardown();
        result
    }
}
