mod common;

use common::{init_logging, test_device, wav_bytes};
use consolesound::{
    AppContext, AppRunner, Application, AudioConfig, ConsoleSoundEngine, EngineLifecycle,
    LifecyclePhase,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct Looper {
    updates: usize,
    destroy_calls: usize,
    veto_first_destroy: bool,
    /// Updates left before asking to stop again after a veto
    resume_for: Option<usize>,
}

impl Application for Looper {
    fn on_start(&mut self, ctx: &mut AppContext) -> bool {
        let clip = match ctx.engine.load_clip_bytes(&wav_bytes(1, &[500; 256])) {
            Ok(clip) => clip,
            Err(_) => return false,
        };
        ctx.engine.play(clip, true);
        ctx.engine
            .start_audio(AudioConfig::new().block_count(4).samples_per_block(64))
            .is_ok()
    }

    fn on_update(&mut self, _ctx: &mut AppContext, elapsed: f32) -> bool {
        assert!(elapsed >= 0.0);
        self.updates += 1;
        match self.resume_for.as_mut() {
            Some(0) => false,
            Some(left) => {
                *left -= 1;
                true
            }
            None => true,
        }
    }

    fn on_destroy(&mut self, ctx: &mut AppContext) -> bool {
        self.destroy_calls += 1;
        if self.veto_first_destroy && self.destroy_calls == 1 {
            self.resume_for = Some(3);
            return false;
        }
        assert!(ctx.engine.is_running());
        true
    }
}

/// Calls the close hook once the loop is running; yields the phase seen on release
fn spawn_terminator(runner: &AppRunner, lifecycle: Arc<EngineLifecycle>) -> thread::JoinHandle<LifecyclePhase> {
    let hook = runner.close_hook();
    thread::spawn(move || {
        while !lifecycle.is_running() {
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(10));
        hook();
        lifecycle.phase()
    })
}

#[test]
fn close_signal_blocks_until_audio_is_released() {
    init_logging();
    let (device, probe) = test_device();
    let lifecycle = Arc::new(EngineLifecycle::new());
    let mut runner = AppRunner::new(ConsoleSoundEngine::new(device), lifecycle.clone())
        .with_frame_interval(Duration::from_millis(2));

    let terminator = spawn_terminator(&runner, lifecycle.clone());

    let mut app = Looper::default();
    runner.run(&mut app).unwrap();

    assert_eq!(terminator.join().unwrap(), LifecyclePhase::Stopped);
    assert!(app.updates > 0);
    assert_eq!(app.destroy_calls, 1);
    assert!(!runner.engine().is_running());
    assert_eq!(probe.calls().last().map(String::as_str), Some("close"));
}

#[test]
fn vetoed_close_keeps_terminator_waiting_for_later_teardown() {
    init_logging();
    let (device, probe) = test_device();
    let lifecycle = Arc::new(EngineLifecycle::new());
    let mut runner = AppRunner::new(ConsoleSoundEngine::new(device), lifecycle.clone())
        .with_frame_interval(Duration::from_millis(1));

    let terminator = spawn_terminator(&runner, lifecycle.clone());

    let mut app = Looper {
        veto_first_destroy: true,
        ..Default::default()
    };
    runner.run(&mut app).unwrap();

    assert_eq!(terminator.join().unwrap(), LifecyclePhase::Stopped);
    assert_eq!(app.destroy_calls, 2);
    assert_eq!(app.resume_for, Some(0));
    assert_eq!(
        probe.calls().iter().filter(|c| c.as_str() == "close").count(),
        1
    );
}

#[test]
fn close_with_nothing_running_returns_at_once() {
    init_logging();
    let lifecycle = EngineLifecycle::new();
    lifecycle.request_close_and_wait();
    assert_eq!(lifecycle.phase(), LifecyclePhase::Stopped);
}
