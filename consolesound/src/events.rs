//! Event types for ConsoleSound

use crate::clip_store::ClipHandle;
use crate::playback::InstanceId;

/// Notifications produced by the engine, drained with
/// [`ConsoleSoundEngine::poll_events`](crate::ConsoleSoundEngine::poll_events).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleSoundEvent {
    /// A non-looping instance played its last frame and left the active set
    InstanceFinished {
        instance: InstanceId,
        clip: ClipHandle,
    },
    /// A looping instance wrapped back to its first frame
    InstanceLooped {
        instance: InstanceId,
        clip: ClipHandle,
    },
    AudioStarted {
        sample_rate: u32,
        channels: u16,
        block_count: usize,
        samples_per_block: usize,
    },
    AudioStopped,
}

impl ConsoleSoundEvent {
    pub fn instance(&self) -> Option<InstanceId> {
        match self {
            Self::InstanceFinished { instance, .. } | Self::InstanceLooped { instance, .. } => {
                Some(*instance)
            }
            _ => None,
        }
    }

    pub fn is_instance_event(&self) -> bool {
        matches!(
            self,
            Self::InstanceFinished { .. } | Self::InstanceLooped { .. }
        )
    }
}
