use crate::clip_store::ClipHandle;

/// Identifier of one playing occurrence of a clip.
///
/// Ids are allocated from a counter owned by the [`PlaybackTable`] and never reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub(crate) u64);

impl InstanceId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Instance({})", self.0)
    }
}

/// Playback state for one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    Paused,
    Finished,
}

/// Mutable state of one sounding clip.
///
/// `cursor` is the next frame to read and stays below the clip length while the
/// instance is not finished. `frac` carries the remainder of the rate step, in
/// units of the output sample rate.
#[derive(Debug, Clone)]
pub struct PlaybackInstance {
    pub(crate) id: InstanceId,
    pub(crate) clip: ClipHandle,
    pub(crate) cursor: usize,
    pub(crate) frac: u64,
    pub(crate) looping: bool,
    pub(crate) paused: bool,
    pub(crate) finished: bool,
}

impl PlaybackInstance {
    fn new(id: InstanceId, clip: ClipHandle, looping: bool) -> Self {
        Self {
            id,
            clip,
            cursor: 0,
            frac: 0,
            looping,
            paused: false,
            finished: false,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn clip(&self) -> ClipHandle {
        self.clip
    }

    /// Next frame to be read
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn state(&self) -> PlayState {
        if self.finished {
            PlayState::Finished
        } else if self.paused {
            PlayState::Paused
        } else {
            PlayState::Playing
        }
    }

    /// Rewind to the first frame and clear the paused and finished flags
    pub fn restart(&mut self) {
        self.cursor = 0;
        self.frac = 0;
        self.paused = false;
        self.finished = false;
    }

    fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }
}

/// Active set of playback instances.
///
/// The table itself holds no lock; the engine shares it as
/// `Arc<Mutex<PlaybackTable>>` and the mixer sweeps it under that same mutex, so
/// a control call and a sweep never interleave.
#[derive(Debug, Default)]
pub struct PlaybackTable {
    instances: Vec<PlaybackInstance>,
    next_id: u64,
}

impl PlaybackTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new instance of `clip`. The clip handle is assumed to be valid.
    pub fn play(&mut self, clip: ClipHandle, looping: bool) -> InstanceId {
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        self.instances.push(PlaybackInstance::new(id, clip, looping));
        id
    }

    /// Toggle the paused flag of one instance. Returns false if the id is unknown.
    pub fn pause(&mut self, id: InstanceId) -> bool {
        self.with_instance(id, PlaybackInstance::toggle_pause)
    }

    /// Toggle the paused flag of every instance of `clip`.
    pub fn pause_clip(&mut self, clip: ClipHandle) -> usize {
        self.for_clip(clip, PlaybackInstance::toggle_pause)
    }

    pub fn pause_all(&mut self) {
        self.instances.iter_mut().for_each(PlaybackInstance::toggle_pause);
    }

    pub fn restart(&mut self, id: InstanceId) -> bool {
        self.with_instance(id, PlaybackInstance::restart)
    }

    pub fn restart_clip(&mut self, clip: ClipHandle) -> usize {
        self.for_clip(clip, PlaybackInstance::restart)
    }

    pub fn restart_all(&mut self) {
        self.instances.iter_mut().for_each(PlaybackInstance::restart);
    }

    /// Mark one instance finished; it is dropped by the next mixer sweep.
    pub fn stop(&mut self, id: InstanceId) -> bool {
        self.with_instance(id, |instance| instance.finished = true)
    }

    pub fn stop_clip(&mut self, clip: ClipHandle) -> usize {
        self.for_clip(clip, |instance| instance.finished = true)
    }

    /// Drop every instance immediately
    pub fn clear(&mut self) {
        self.instances.clear();
    }

    pub fn get(&self, id: InstanceId) -> Option<&PlaybackInstance> {
        self.instances.iter().find(|instance| instance.id == id)
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlaybackInstance> {
        self.instances.iter()
    }

    pub(crate) fn instances_mut(&mut self) -> &mut Vec<PlaybackInstance> {
        &mut self.instances
    }

    fn with_instance(&mut self, id: InstanceId, f: impl FnOnce(&mut PlaybackInstance)) -> bool {
        match self.instances.iter_mut().find(|instance| instance.id == id) {
            Some(instance) => {
                f(instance);
                true
            }
            None => false,
        }
    }

    fn for_clip(&mut self, clip: ClipHandle, mut f: impl FnMut(&mut PlaybackInstance)) -> usize {
        let mut count = 0;
        for instance in self.instances.iter_mut().filter(|i| i.clip == clip) {
            f(instance);
            count += 1;
        }
        count
    }
}
