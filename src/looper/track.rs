use crate::looper::buffer::SampleBuffer;

/// Channel selector for per-channel copy primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

/// Track lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Empty and available for recording.
    Off,
    /// Holds material and participates in the mixdown.
    Playback,
    /// Currently capturing input (recording or overdubbing).
    Recording,
    /// Holds material but is skipped by the mixer.
    Mute,
}

/// A recordable, playable loop of audio.
///
/// One sample buffer per channel, allocated once at engine init. The
/// position fields are plain values because only the realtime thread
/// touches a track after construction.
#[derive(Debug)]
pub struct Track {
    left: SampleBuffer,
    right: Option<SampleBuffer>,

    /// Lifecycle state.
    pub state: TrackState,

    /// Wrap back to `start_idx` when the position reaches `end_idx`.
    pub repeat: bool,

    /// First sample of the loop body.
    pub start_idx: usize,

    /// One past the last recorded sample.
    pub end_idx: usize,

    /// Current read/write position.
    pub curr_idx: usize,
}

impl Track {
    /// Create an empty track with `capacity` samples per channel.
    pub fn new(capacity: usize, stereo: bool) -> Self {
        Self {
            left: SampleBuffer::new(capacity),
            right: stereo.then(|| SampleBuffer::new(capacity)),
            state: TrackState::Off,
            repeat: false,
            start_idx: 0,
            end_idx: 0,
            curr_idx: 0,
        }
    }

    /// Per-channel capacity in samples.
    pub fn capacity(&self) -> usize {
        self.left.capacity()
    }

    pub fn is_stereo(&self) -> bool {
        self.right.is_some()
    }

    fn channel(&self, channel: Channel) -> &SampleBuffer {
        match channel {
            Channel::Left => &self.left,
            Channel::Right => self.right.as_ref().expect("mono track has no right channel"),
        }
    }

    fn channel_mut(&mut self, channel: Channel) -> &mut SampleBuffer {
        match channel {
            Channel::Left => &mut self.left,
            Channel::Right => self.right.as_mut().expect("mono track has no right channel"),
        }
    }

    /// Copy `src` into the selected channel at absolute index `offset`.
    /// The copy must fit the capacity; a violation is a programmer error.
    pub fn write(&mut self, channel: Channel, offset: usize, src: &[f32]) {
        self.channel_mut(channel).write(offset, src);
    }

    /// Read samples starting at `offset` from the selected channel.
    #[allow(dead_code)]
    pub fn read(&self, channel: Channel, offset: usize, dst: &mut [f32]) {
        self.channel(channel).read(offset, dst);
    }

    /// Sum `src` into the selected channel at `offset`, limiting each
    /// resulting sample once.
    pub fn overdub(&mut self, channel: Channel, src: &[f32], offset: usize) {
        self.channel_mut(channel).add_limited(offset, src);
    }

    /// Left/right sample pair at absolute index `idx`. Mono tracks return
    /// the left sample on both sides.
    #[inline]
    pub fn frame(&self, idx: usize) -> (f32, f32) {
        let l = self.left.get(idx);
        let r = match &self.right {
            Some(buf) => buf.get(idx),
            None => l,
        };
        (l, r)
    }

    /// Recorded loop length in samples.
    pub fn loop_len(&self) -> usize {
        self.end_idx.saturating_sub(self.start_idx)
    }

    /// Whether the mixer should read this track at all this cycle.
    pub fn is_audible(&self) -> bool {
        !matches!(self.state, TrackState::Off | TrackState::Mute)
            && self.start_idx <= self.curr_idx
            && self.curr_idx < self.end_idx
    }

    /// Map a frame offset within the current cycle to an absolute sample
    /// index, honoring the repeat wrap. `None` once a non-repeating track
    /// has run past its end.
    #[inline]
    pub fn play_index(&self, frame: usize) -> Option<usize> {
        let idx = self.curr_idx + frame;
        if idx < self.end_idx {
            Some(idx)
        } else if self.repeat && self.loop_len() > 0 {
            Some(self.start_idx + (idx - self.start_idx) % self.loop_len())
        } else {
            None
        }
    }

    /// Return the track to the empty state. Buffer contents are left in
    /// place; they are unreachable until the next recording grows past
    /// them.
    pub fn reset(&mut self) {
        self.state = TrackState::Off;
        self.repeat = false;
        self.start_idx = 0;
        self.end_idx = 0;
        self.curr_idx = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LIMIT_SCALE;

    #[test]
    fn test_new_track_is_off() {
        let track = Track::new(256, false);
        assert_eq!(track.state, TrackState::Off);
        assert_eq!(track.end_idx, 0);
        assert_eq!(track.capacity(), 256);
        assert!(!track.is_stereo());
        assert!(!track.is_audible());
    }

    #[test]
    fn test_write_and_frame_mono_duplicates() {
        let mut track = Track::new(64, false);
        track.write(Channel::Left, 4, &[0.5, 0.6]);
        assert_eq!(track.frame(4), (0.5, 0.5));
        assert_eq!(track.frame(5), (0.6, 0.6));
    }

    #[test]
    fn test_write_stereo_channels_independent() {
        let mut track = Track::new(64, true);
        track.write(Channel::Left, 0, &[0.1; 4]);
        track.write(Channel::Right, 0, &[-0.2; 4]);
        assert_eq!(track.frame(2), (0.1, -0.2));
    }

    #[test]
    fn test_overdub_limits_once() {
        let mut track = Track::new(16, false);
        let half = 0.5 * f32::MAX;
        track.write(Channel::Left, 0, &[half; 8]);
        track.overdub(Channel::Left, &[half; 8], 0);
        // half + half == MAX, past the guard rail, scaled back once
        assert_eq!(track.frame(0).0, f32::MAX * LIMIT_SCALE);
    }

    #[test]
    fn test_play_index_wraps_with_repeat() {
        let mut track = Track::new(512, false);
        track.state = TrackState::Playback;
        track.start_idx = 0;
        track.end_idx = 256;
        track.curr_idx = 200;
        track.repeat = true;

        assert_eq!(track.play_index(0), Some(200));
        assert_eq!(track.play_index(55), Some(255));
        assert_eq!(track.play_index(56), Some(0));
        assert_eq!(track.play_index(127), Some(71));
    }

    #[test]
    fn test_play_index_wraps_from_nonzero_start() {
        let mut track = Track::new(512, false);
        track.start_idx = 100;
        track.end_idx = 200;
        track.curr_idx = 150;
        track.repeat = true;

        assert_eq!(track.play_index(49), Some(199));
        assert_eq!(track.play_index(50), Some(100));
        assert_eq!(track.play_index(60), Some(110));
    }

    #[test]
    fn test_play_index_ends_without_repeat() {
        let mut track = Track::new(512, false);
        track.start_idx = 0;
        track.end_idx = 256;
        track.curr_idx = 200;
        track.repeat = false;

        assert_eq!(track.play_index(55), Some(255));
        assert_eq!(track.play_index(56), None);
    }

    #[test]
    fn test_reset_returns_to_off() {
        let mut track = Track::new(64, false);
        track.state = TrackState::Playback;
        track.repeat = true;
        track.start_idx = 8;
        track.end_idx = 32;
        track.curr_idx = 16;

        track.reset();
        assert_eq!(track.state, TrackState::Off);
        assert!(!track.repeat);
        assert_eq!((track.start_idx, track.end_idx, track.curr_idx), (0, 0, 0));
    }
}
