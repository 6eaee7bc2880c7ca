use log::warn;

use crate::looper::engine::MasterLooper;
use crate::looper::state::SystemState;
use crate::looper::track::TrackState;

impl MasterLooper {
    /// Advance the master index and every active-group track by `n`
    /// frames. Runs after the cycle's data has been copied.
    ///
    /// The recording track grows its end (and the group's master length)
    /// as it goes and is stopped when it hits the capacity limit. Playing
    /// tracks wrap their own loop bodies sample-accurately; when the
    /// master index completes a lap of the group, every member is
    /// realigned so the group restarts coherently.
    pub(crate) fn advance_positions(&mut self, n: usize) {
        let entered_in_playback = self.state == SystemState::Playback;
        self.master_curr = (self.master_curr + n).min(self.max_idx);

        let group = self.selected_group;
        let capturing = self.state.is_capture();
        let selected = self.selected_track;
        let max_idx = self.max_idx;
        let mut overflowed = false;

        for t in 0..self.tracks.len() {
            if !self.groups.contains(group, t) {
                continue;
            }
            let track = &mut self.tracks[t];
            if track.state == TrackState::Off {
                continue;
            }

            track.curr_idx = (track.curr_idx + n).min(max_idx);

            if capturing && t == selected {
                if track.curr_idx >= max_idx {
                    overflowed = true;
                }
                track.end_idx = track.end_idx.max(track.curr_idx);
                if track.end_idx > self.master_len[group] {
                    self.master_len[group] = track.end_idx;
                }
            } else if track.repeat {
                let len = track.loop_len();
                if len > 0 && track.curr_idx >= track.end_idx {
                    track.curr_idx = track.start_idx + (track.curr_idx - track.start_idx) % len;
                }
            }
        }

        if overflowed {
            // Capacity guard: keep what was captured, fall back to playback
            self.tracks[selected].state = TrackState::Playback;
            self.state = SystemState::Playback;
            warn!("track {selected} reached the sample limit, recording stopped");
        }

        // Master lap: realign the whole group so its members restart
        // together on the next cycle
        let master_len = self.master_len[group];
        if entered_in_playback && master_len > 0 && self.master_curr >= master_len {
            for t in 0..self.tracks.len() {
                if !self.groups.contains(group, t) {
                    continue;
                }
                let track = &mut self.tracks[t];
                if track.state == TrackState::Off {
                    continue;
                }
                track.curr_idx = if track.repeat { track.start_idx } else { 0 };
            }
            self.master_curr = 0;
        }
    }
}
