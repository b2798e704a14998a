// Mixer module - sums active playback instances and the user synthesis hook
// into one output frame per tick

use crate::audio_data::AudioClip;
use crate::clip_store::{ClipHandle, ClipStore};
use crate::error::lock_or_recover;
use crate::events::ConsoleSoundEvent;
use crate::playback::{InstanceId, PlaybackTable};
use crossbeam_channel::Sender;
use std::sync::{Arc, Mutex};

/// User synthesis and filtering hooks called by the mixer for every output sample.
///
/// Both methods run on the audio worker thread and must not block.
pub trait SoundHooks: Send + Sync {
    /// Synthesised contribution for `channel` at `global_time` seconds.
    /// `time_step` is the duration of one frame.
    fn sample(&self, channel: usize, global_time: f64, time_step: f64) -> f32 {
        let _ = (channel, global_time, time_step);
        0.0
    }

    /// Final transform applied to the mixed sample before it is clamped and quantised.
    fn filter(&self, channel: usize, global_time: f64, mixed: f32) -> f32 {
        let _ = (channel, global_time);
        mixed
    }
}

/// Hooks that add nothing and pass the mix through unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentHooks;

impl SoundHooks for SilentHooks {}

/// Instances whose state changed during one sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MixReport {
    pub completed: Vec<(InstanceId, ClipHandle)>,
    pub looped: Vec<(InstanceId, ClipHandle)>,
}

impl MixReport {
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.looped.is_empty()
    }

    pub fn clear(&mut self) {
        self.completed.clear();
        self.looped.clear();
    }
}

/// Mix one frame of every active instance into `frame`.
///
/// `frame` holds one sample per output channel and is overwritten. Each
/// non-paused instance contributes the clip frame at its cursor, then steps
/// forward by `clip_rate / output_rate` frames. An instance that reaches the end
/// of its clip either restarts (looping) or is marked finished, in this same
/// sweep. Finished instances, including ones stopped by the control path, are
/// compacted out once the sweep is complete.
///
/// No clamping happens here.
pub fn mix_playback_instances(
    table: &mut PlaybackTable,
    clips: &[AudioClip],
    output_rate: u32,
    frame: &mut [f32],
    report: &mut MixReport,
) {
    frame.fill(0.0);
    let output_rate = u64::from(output_rate.max(1));
    let instances = table.instances_mut();

    for instance in instances.iter_mut() {
        if instance.paused || instance.finished {
            continue;
        }

        let Some(clip) = clips.get(instance.clip.index()) else {
            log::warn!(
                "Mixer: {} refers to unknown {}, dropping it",
                instance.id,
                instance.clip
            );
            instance.finished = true;
            continue;
        };

        let total_frames = clip.total_frames();
        if instance.cursor < total_frames {
            for (channel, out) in frame.iter_mut().enumerate() {
                *out += clip.frame_sample(instance.cursor, channel);
            }

            instance.frac += u64::from(clip.sample_rate());
            instance.cursor += (instance.frac / output_rate) as usize;
            instance.frac %= output_rate;
        }

        if instance.cursor >= total_frames {
            if instance.looping && total_frames > 0 {
                instance.restart();
                report.looped.push((instance.id, instance.clip));
            } else {
                instance.finished = true;
                report.completed.push((instance.id, instance.clip));
            }
        }
    }

    instances.retain(|instance| !instance.finished);
}

/// Per-stream mixer owned by the audio worker.
pub struct Mixer {
    clips: Arc<ClipStore>,
    table: Arc<Mutex<PlaybackTable>>,
    hooks: Arc<dyn SoundHooks>,
    output_rate: u32,
    events: Sender<ConsoleSoundEvent>,
    report: MixReport,
}

impl Mixer {
    pub fn new(
        clips: Arc<ClipStore>,
        table: Arc<Mutex<PlaybackTable>>,
        hooks: Arc<dyn SoundHooks>,
        output_rate: u32,
        events: Sender<ConsoleSoundEvent>,
    ) -> Self {
        Self {
            clips,
            table,
            hooks,
            output_rate,
            events,
            report: MixReport::default(),
        }
    }

    /// Produce one output frame for the tick starting at `global_time`.
    ///
    /// The clip store and the playback table are locked for the duration of the
    /// sweep only; the user hooks run after both are released.
    pub fn mix_frame(&mut self, global_time: f64, time_step: f64, frame: &mut [f32]) {
        {
            let clips = self.clips.read();
            let mut table = lock_or_recover(&self.table, "Playback table");
            mix_playback_instances(&mut table, &clips, self.output_rate, frame, &mut self.report);
        }

        for (channel, out) in frame.iter_mut().enumerate() {
            let mixed = *out + self.hooks.sample(channel, global_time, time_step);
            *out = self.hooks.filter(channel, global_time, mixed);
        }

        if !self.report.is_empty() {
            self.publish_report();
        }
    }

    fn publish_report(&mut self) {
        for &(instance, clip) in &self.report.completed {
            log::debug!("Mixer: {} of {} finished", instance, clip);
            let _ = self
                .events
                .try_send(ConsoleSoundEvent::InstanceFinished { instance, clip });
        }
        for &(instance, clip) in &self.report.looped {
            log::trace!("Mixer: {} of {} looped", instance, clip);
            let _ = self
                .events
                .try_send(ConsoleSoundEvent::InstanceLooped { instance, clip });
        }
        self.report.clear();
    }
}
