use crate::looper::group::GroupSet;
use crate::looper::inbox::{self, EventInbox, EventSender};
use crate::looper::mixer;
use crate::looper::state::SystemState;
use crate::looper::track::{Channel, Track};
use crate::types::{MAX_BLOCK_FRAMES, NUM_GROUPS, NUM_TRACKS};

/// Port buffers for one process cycle. The right-hand side pointers may be
/// absent on a mono device; the frame count is `out_l.len()`.
pub struct Ports<'a> {
    pub in_l: &'a [f32],
    pub in_r: Option<&'a [f32]>,
    pub out_l: &'a mut [f32],
    pub out_r: Option<&'a mut [f32]>,
}

/// The root aggregate: all tracks, group membership, master position, and
/// the command inbox.
///
/// Owned by the realtime thread after construction; the control thread
/// never touches it directly and instead publishes events through the
/// returned `EventSender`.
pub struct MasterLooper {
    pub(crate) tracks: Vec<Track>,
    pub(crate) groups: GroupSet,

    /// Longest track end per group.
    pub(crate) master_len: [usize; NUM_GROUPS],

    /// Shared playback position of the active group.
    pub(crate) master_curr: usize,

    pub(crate) selected_group: usize,

    /// Destination of recording and overdubbing.
    pub(crate) selected_track: usize,

    pub(crate) state: SystemState,

    /// Per-track capacity in samples.
    pub(crate) max_idx: usize,

    /// Frames of the current cycle that precede a mid-cycle record start.
    pub(crate) rec_frame_delay: usize,

    /// Frames of the current cycle that still belong to a loop whose stop
    /// command landed mid-cycle.
    pub(crate) play_frame_delay: usize,

    /// One-shot: frames of input the finalizing cycle still captures.
    pub(crate) tail_capture: usize,

    inbox: EventInbox,

    // Internal mixdown buffers, sized once
    mix_l: Vec<f32>,
    mix_r: Vec<f32>,
}

impl MasterLooper {
    /// Allocate the engine. Every track buffer is sized up front so the
    /// process path never allocates.
    pub fn new(stereo: bool, max_idx: usize) -> (Self, EventSender) {
        let (sender, inbox) = inbox::channel();
        let tracks = (0..NUM_TRACKS).map(|_| Track::new(max_idx, stereo)).collect();
        let looper = Self {
            tracks,
            groups: GroupSet::new(),
            master_len: [0; NUM_GROUPS],
            master_curr: 0,
            selected_group: 0,
            selected_track: 0,
            state: SystemState::Passthrough,
            max_idx,
            rec_frame_delay: 0,
            play_frame_delay: 0,
            tail_capture: 0,
            inbox,
            mix_l: vec![0.0; MAX_BLOCK_FRAMES],
            mix_r: vec![0.0; MAX_BLOCK_FRAMES],
        };
        (looper, sender)
    }

    /// One audio cycle.
    ///
    /// Runs on the realtime thread: no allocation, no locks, bounded work.
    /// The input slices must cover at least `out_l.len()` frames; cycles
    /// larger than `MAX_BLOCK_FRAMES` or empty cycles produce silence and
    /// return immediately.
    pub fn process(&mut self, ports: Ports<'_>) {
        let Ports {
            in_l,
            in_r,
            out_l,
            out_r,
        } = ports;
        let n = out_l.len();
        if n == 0 || n > self.mix_l.len() || in_l.len() < n {
            out_l.fill(0.0);
            if let Some(out_r) = out_r {
                out_r.fill(0.0);
            }
            return;
        }

        self.inbox.set_locked(true);

        // Drain at most one pending command before any audio work
        if let Some(event) = self.inbox.pop() {
            self.rec_frame_delay = (self.inbox.rec_frame_delay() as usize).min(n);
            self.play_frame_delay = (self.inbox.play_frame_delay() as usize).min(n);
            self.apply_event(event);
        }

        match self.state {
            SystemState::Passthrough => {
                out_l[..n].copy_from_slice(&in_l[..n]);
                if let Some(out_r) = out_r {
                    match in_r {
                        Some(in_r) => out_r[..n].copy_from_slice(&in_r[..n]),
                        // Simulated mono
                        None => out_r[..n].copy_from_slice(&in_l[..n]),
                    }
                }
            }
            SystemState::Recording | SystemState::Calibration => {
                self.capture(in_l, in_r, n, false);
                self.mixdown(in_l, in_r, out_l, out_r, n);
            }
            SystemState::Overdubbing => {
                self.capture(in_l, in_r, n, true);
                self.mixdown(in_l, in_r, out_l, out_r, n);
            }
            SystemState::Playback => {
                if self.tail_capture > 0 {
                    self.capture_tail(in_l, in_r, n);
                }
                self.mixdown(in_l, in_r, out_l, out_r, n);
            }
        }

        if self.state != SystemState::Passthrough {
            self.advance_positions(n);
        }

        // Frame delays are single-use
        self.rec_frame_delay = 0;
        self.play_frame_delay = 0;
        self.tail_capture = 0;
        self.inbox.clear_frame_delays();
        self.inbox.set_locked(false);
    }

    /// Copy (or, for overdub, sum) live input into the selected track at
    /// its current position. A record command that landed mid-cycle skips
    /// the frames that preceded it so the loop start stays aligned.
    fn capture(&mut self, in_l: &[f32], in_r: Option<&[f32]>, n: usize, overdub: bool) {
        let skip = self.rec_frame_delay.min(n);
        let track = &mut self.tracks[self.selected_track];
        let dst = track.curr_idx + skip;
        if dst >= track.capacity() {
            return;
        }
        let count = (n - skip).min(track.capacity() - dst);
        if count == 0 {
            return;
        }

        let src = &in_l[skip..skip + count];
        if overdub {
            track.overdub(Channel::Left, src, dst);
        } else {
            track.write(Channel::Left, dst, src);
        }
        if track.is_stereo() {
            let src_r = match in_r {
                Some(r) => &r[skip..skip + count],
                None => src,
            };
            if overdub {
                track.overdub(Channel::Right, src_r, dst);
            } else {
                track.write(Channel::Right, dst, src_r);
            }
        }
    }

    /// A stop command that landed mid-cycle finalizes recording here: the
    /// first `tail_capture` frames of this cycle's input still belong to
    /// the loop.
    fn capture_tail(&mut self, in_l: &[f32], in_r: Option<&[f32]>, n: usize) {
        let frames = self.tail_capture.min(n);
        let track = &mut self.tracks[self.selected_track];
        let dst = track.curr_idx;
        if dst >= track.capacity() {
            return;
        }
        let count = frames.min(track.capacity() - dst);
        if count == 0 {
            return;
        }

        track.write(Channel::Left, dst, &in_l[..count]);
        if track.is_stereo() {
            match in_r {
                Some(r) => track.write(Channel::Right, dst, &r[..count]),
                None => {
                    let src = &in_l[..count];
                    track.write(Channel::Right, dst, src);
                }
            }
        }
    }

    /// Mix the active group plus live input into the internal buffers,
    /// then copy them to the output ports.
    fn mixdown(
        &mut self,
        in_l: &[f32],
        in_r: Option<&[f32]>,
        out_l: &mut [f32],
        out_r: Option<&mut [f32]>,
        n: usize,
    ) {
        mixer::mix(
            &self.tracks,
            &self.groups,
            self.selected_group,
            in_l,
            in_r,
            &mut self.mix_l,
            &mut self.mix_r,
            n,
        );
        out_l[..n].copy_from_slice(&self.mix_l[..n]);
        if let Some(out_r) = out_r {
            out_r[..n].copy_from_slice(&self.mix_r[..n]);
        }
    }

    // --- introspection -------------------------------------------------

    #[allow(dead_code)]
    pub fn state(&self) -> SystemState {
        self.state
    }

    #[allow(dead_code)]
    pub fn track(&self, index: usize) -> &Track {
        &self.tracks[index]
    }

    #[allow(dead_code)]
    pub fn master_position(&self) -> usize {
        self.master_curr
    }

    #[allow(dead_code)]
    pub fn master_length(&self, group: usize) -> usize {
        self.master_len[group]
    }

    #[allow(dead_code)]
    pub fn selected_track(&self) -> usize {
        self.selected_track
    }

    #[allow(dead_code)]
    pub fn selected_group(&self) -> usize {
        self.selected_group
    }

    #[allow(dead_code)]
    pub fn in_group(&self, group: usize, track: usize) -> bool {
        self.groups.contains(group, track)
    }

    /// Per-track capacity in samples.
    #[allow(dead_code)]
    pub fn capacity(&self) -> usize {
        self.max_idx
    }
}
