use log::{debug, info};

use crate::looper::engine::MasterLooper;
use crate::looper::inbox::LooperEvent;
use crate::looper::track::TrackState;
use crate::types::{CALIBRATION_TRACK, NUM_GROUPS};

/// Engine-level mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    /// Bypass: input is forwarded to output, nothing advances.
    Passthrough,
    /// Active tracks are mixed with the live input.
    Playback,
    /// Live input is copied into the selected track.
    Recording,
    /// Live input is summed onto the selected track.
    Overdubbing,
    /// Diagnostic recording into the fixed calibration track.
    Calibration,
}

impl SystemState {
    /// States that capture live input into the selected track.
    pub fn is_capture(self) -> bool {
        matches!(
            self,
            SystemState::Recording | SystemState::Overdubbing | SystemState::Calibration
        )
    }
}

impl MasterLooper {
    /// Apply one drained event. Events that are not legal in the current
    /// state are silently ignored.
    pub(crate) fn apply_event(&mut self, event: LooperEvent) {
        use LooperEvent::*;
        use SystemState::*;

        match (self.state, event) {
            (_, Reset) => self.reset_system(),
            (Passthrough | Playback, Record { track, group }) => self.start_recording(track, group),
            (Playback, Overdub { track }) => self.start_overdub(track),
            (Passthrough, Calibrate) => self.start_calibration(),
            (Recording | Overdubbing | Calibration, Play { repeat, .. }) => {
                self.stop_recording(repeat)
            }
            (Playback, Play { track, repeat }) => self.update_repeat(track, repeat),
            (Playback, Mute { track }) => self.mute_track(track),
            (Playback, Unmute { track }) => self.unmute_track(track),
            (Playback, AddToGroup { track, group }) => self.groups.insert(group, track),
            (Playback, RemoveFromGroup { track, group }) => self.groups.remove(group, track),
            (Playback, SelectGroup { group }) => self.set_active_group(group),
            (state, event) => debug!("ignoring {event:?} in {state:?}"),
        }
    }

    /// Bind `track` into `group` and start capturing at the master
    /// position. Recording into an empty or freshly selected group, or
    /// over the group's only track, restarts the master timeline.
    fn start_recording(&mut self, track: usize, group: usize) {
        if track >= self.tracks.len() || group >= NUM_GROUPS {
            return;
        }

        let active = self
            .groups
            .tracks(group)
            .filter(|&t| self.tracks[t].state != TrackState::Off)
            .count();
        let sole = active == 1
            && self.groups.contains(group, track)
            && self.tracks[track].state != TrackState::Off;
        if active == 0 || group != self.selected_group || sole {
            self.master_curr = 0;
            self.master_len[group] = 0;
        }

        self.groups.insert(group, track);
        self.selected_group = group;
        self.selected_track = track;

        let start = self.master_curr;
        let t = &mut self.tracks[track];
        t.start_idx = start;
        t.curr_idx = start;
        // Grown by the position engine as samples land
        t.end_idx = start;
        t.repeat = false;
        t.state = TrackState::Recording;

        self.state = SystemState::Recording;
        debug!("recording track {track} into group {group} from {start}");
    }

    /// Start summing live input onto an already-recorded track.
    fn start_overdub(&mut self, track: usize) {
        if track >= self.tracks.len() || self.tracks[track].state == TrackState::Off {
            return;
        }
        self.selected_track = track;
        self.tracks[track].state = TrackState::Recording;
        self.state = SystemState::Overdubbing;
        debug!("overdubbing track {track}");
    }

    /// Diagnostic capture into the fixed calibration track.
    fn start_calibration(&mut self) {
        let group = self.selected_group;
        self.start_recording(CALIBRATION_TRACK, group);
        self.state = SystemState::Calibration;
        info!("calibration capture started on track {CALIBRATION_TRACK}");
    }

    /// Finalize the active recording or overdub. A stop command that
    /// landed mid-cycle extends the loop by the frames that preceded it;
    /// the process core captures them this cycle.
    fn stop_recording(&mut self, repeat: Option<bool>) {
        let delay = self.play_frame_delay;
        let group = self.selected_group;
        let track = &mut self.tracks[self.selected_track];

        track.end_idx = (track.curr_idx + delay).min(self.max_idx);
        if let Some(repeat) = repeat {
            track.repeat = repeat;
        }
        track.state = TrackState::Playback;

        if track.end_idx > self.master_len[group] {
            // The finished loop is the longest in the group: grow the
            // master and realign everyone on the next cycle
            self.master_len[group] = track.end_idx;
            self.master_curr = 0;
        }

        self.tail_capture = delay;
        self.state = SystemState::Playback;
        debug!(
            "track {} settled to playback, end {}",
            self.selected_track, self.tracks[self.selected_track].end_idx
        );
    }

    /// `Play` while already playing only updates the repeat flag.
    fn update_repeat(&mut self, track: usize, repeat: Option<bool>) {
        if track >= self.tracks.len() || self.tracks[track].state == TrackState::Off {
            return;
        }
        if let Some(repeat) = repeat {
            self.tracks[track].repeat = repeat;
        }
    }

    fn mute_track(&mut self, track: usize) {
        if track < self.tracks.len() && self.tracks[track].state == TrackState::Playback {
            self.tracks[track].state = TrackState::Mute;
        }
    }

    fn unmute_track(&mut self, track: usize) {
        if track < self.tracks.len() && self.tracks[track].state == TrackState::Mute {
            self.tracks[track].state = TrackState::Playback;
        }
    }

    /// Switch the active group in two passes: first park every live track
    /// in Mute, then wake the new group's members from their loop starts.
    fn set_active_group(&mut self, group: usize) {
        if group >= NUM_GROUPS {
            return;
        }

        for track in &mut self.tracks {
            if track.state != TrackState::Off {
                track.state = TrackState::Mute;
            }
        }
        for t in 0..self.tracks.len() {
            if !self.groups.contains(group, t) {
                continue;
            }
            let track = &mut self.tracks[t];
            if track.state == TrackState::Off {
                continue;
            }
            track.state = TrackState::Playback;
            track.curr_idx = if track.repeat { track.start_idx } else { 0 };
        }

        self.selected_group = group;
        self.master_curr = 0;
        info!("active group {group}");
    }

    /// Drop all material: every track Off, every length zero, system back
    /// to passthrough.
    fn reset_system(&mut self) {
        for track in &mut self.tracks {
            track.reset();
        }
        self.groups.clear();
        self.master_len = [0; NUM_GROUPS];
        self.master_curr = 0;
        self.selected_group = 0;
        self.selected_track = 0;
        self.tail_capture = 0;
        self.state = SystemState::Passthrough;
        info!("system reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> MasterLooper {
        let (looper, _sender) = MasterLooper::new(false, 4096);
        looper
    }

    /// Shorthand: pretend a loop was recorded on `track` in `group`.
    fn seed_loop(looper: &mut MasterLooper, track: usize, group: usize, end: usize) {
        looper.groups.insert(group, track);
        looper.tracks[track].state = TrackState::Playback;
        looper.tracks[track].start_idx = 0;
        looper.tracks[track].end_idx = end;
        looper.master_len[group] = looper.master_len[group].max(end);
        looper.state = SystemState::Playback;
    }

    #[test]
    fn test_record_from_passthrough() {
        let mut looper = engine();
        looper.apply_event(LooperEvent::Record { track: 3, group: 2 });

        assert_eq!(looper.state, SystemState::Recording);
        assert_eq!(looper.selected_track, 3);
        assert_eq!(looper.selected_group, 2);
        assert!(looper.groups.contains(2, 3));
        let track = &looper.tracks[3];
        assert_eq!(track.state, TrackState::Recording);
        assert_eq!((track.start_idx, track.curr_idx, track.end_idx), (0, 0, 0));
        assert!(!track.repeat);
    }

    #[test]
    fn test_record_into_new_group_restarts_master() {
        let mut looper = engine();
        seed_loop(&mut looper, 0, 0, 512);
        looper.master_curr = 300;

        looper.apply_event(LooperEvent::Record { track: 1, group: 1 });
        assert_eq!(looper.master_curr, 0);
        assert_eq!(looper.master_len[1], 0);
        assert_eq!(looper.tracks[1].start_idx, 0);
    }

    #[test]
    fn test_layered_record_starts_at_master_position() {
        let mut looper = engine();
        seed_loop(&mut looper, 0, 0, 512);
        looper.selected_group = 0;
        looper.master_curr = 300;

        looper.apply_event(LooperEvent::Record { track: 1, group: 0 });
        // Same group with another active track: timeline keeps running
        assert_eq!(looper.master_curr, 300);
        assert_eq!(looper.tracks[1].start_idx, 300);
        assert_eq!(looper.tracks[1].end_idx, 300);
    }

    #[test]
    fn test_rerecording_the_only_track_restarts_master() {
        let mut looper = engine();
        seed_loop(&mut looper, 0, 0, 512);
        looper.selected_group = 0;
        looper.master_curr = 300;

        looper.apply_event(LooperEvent::Record { track: 0, group: 0 });
        assert_eq!(looper.master_curr, 0);
        assert_eq!(looper.master_len[0], 0);
    }

    #[test]
    fn test_overdub_ignored_from_passthrough() {
        let mut looper = engine();
        looper.apply_event(LooperEvent::Overdub { track: 0 });
        assert_eq!(looper.state, SystemState::Passthrough);
        assert_eq!(looper.tracks[0].state, TrackState::Off);
    }

    #[test]
    fn test_overdub_ignored_on_empty_track() {
        let mut looper = engine();
        seed_loop(&mut looper, 0, 0, 512);
        looper.apply_event(LooperEvent::Overdub { track: 5 });
        assert_eq!(looper.state, SystemState::Playback);
    }

    #[test]
    fn test_stop_recording_applies_pending_repeat() {
        let mut looper = engine();
        looper.apply_event(LooperEvent::Record { track: 0, group: 0 });
        looper.tracks[0].curr_idx = 256;
        looper.play_frame_delay = 32;

        looper.apply_event(LooperEvent::Play {
            track: 0,
            repeat: Some(true),
        });

        let track = &looper.tracks[0];
        assert_eq!(track.end_idx, 288);
        assert!(track.repeat);
        assert_eq!(track.state, TrackState::Playback);
        assert_eq!(looper.state, SystemState::Playback);
        // The finished loop grew the master, so the timeline restarts
        assert_eq!(looper.master_len[0], 288);
        assert_eq!(looper.master_curr, 0);
        assert_eq!(looper.tail_capture, 32);
    }

    #[test]
    fn test_play_while_playing_updates_repeat_only() {
        let mut looper = engine();
        seed_loop(&mut looper, 0, 0, 512);
        looper.tracks[0].curr_idx = 100;

        looper.apply_event(LooperEvent::Play {
            track: 0,
            repeat: Some(true),
        });
        assert!(looper.tracks[0].repeat);
        assert_eq!(looper.tracks[0].curr_idx, 100);
        assert_eq!(looper.state, SystemState::Playback);

        looper.apply_event(LooperEvent::Play {
            track: 0,
            repeat: Some(false),
        });
        assert!(!looper.tracks[0].repeat);

        // Bare play: no repeat change
        looper.tracks[0].repeat = true;
        looper.apply_event(LooperEvent::Play {
            track: 0,
            repeat: None,
        });
        assert!(looper.tracks[0].repeat);
    }

    #[test]
    fn test_mute_and_unmute() {
        let mut looper = engine();
        seed_loop(&mut looper, 0, 0, 512);

        looper.apply_event(LooperEvent::Mute { track: 0 });
        assert_eq!(looper.tracks[0].state, TrackState::Mute);

        // Muting twice stays muted; unmuting an Off track is ignored
        looper.apply_event(LooperEvent::Mute { track: 0 });
        assert_eq!(looper.tracks[0].state, TrackState::Mute);
        looper.apply_event(LooperEvent::Unmute { track: 1 });
        assert_eq!(looper.tracks[1].state, TrackState::Off);

        looper.apply_event(LooperEvent::Unmute { track: 0 });
        assert_eq!(looper.tracks[0].state, TrackState::Playback);
    }

    #[test]
    fn test_group_membership_edits() {
        let mut looper = engine();
        seed_loop(&mut looper, 0, 0, 512);

        looper.apply_event(LooperEvent::AddToGroup { track: 0, group: 3 });
        assert!(looper.groups.contains(3, 0));
        looper.apply_event(LooperEvent::RemoveFromGroup { track: 0, group: 3 });
        assert!(!looper.groups.contains(3, 0));
    }

    #[test]
    fn test_set_active_group_two_pass() {
        let mut looper = engine();
        seed_loop(&mut looper, 0, 1, 512);
        seed_loop(&mut looper, 1, 2, 256);
        looper.tracks[0].repeat = true;
        looper.tracks[0].start_idx = 64;
        looper.tracks[0].curr_idx = 400;
        looper.tracks[1].curr_idx = 200;
        looper.selected_group = 1;
        looper.master_curr = 333;

        looper.apply_event(LooperEvent::SelectGroup { group: 2 });

        // Old group's track parked in Mute, new group's track woken
        assert_eq!(looper.tracks[0].state, TrackState::Mute);
        assert_eq!(looper.tracks[1].state, TrackState::Playback);
        // Non-repeat members restart from zero, repeat members from start
        assert_eq!(looper.tracks[1].curr_idx, 0);
        assert_eq!(looper.selected_group, 2);
        assert_eq!(looper.master_curr, 0);
    }

    #[test]
    fn test_set_active_group_repeat_member_resumes_from_start() {
        let mut looper = engine();
        seed_loop(&mut looper, 0, 1, 512);
        looper.tracks[0].repeat = true;
        looper.tracks[0].start_idx = 64;
        looper.tracks[0].curr_idx = 400;

        looper.apply_event(LooperEvent::SelectGroup { group: 1 });
        assert_eq!(looper.tracks[0].state, TrackState::Playback);
        assert_eq!(looper.tracks[0].curr_idx, 64);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut looper = engine();
        seed_loop(&mut looper, 0, 0, 512);
        seed_loop(&mut looper, 1, 1, 256);
        looper.master_curr = 100;
        looper.selected_track = 1;

        looper.apply_event(LooperEvent::Reset);
        let snapshot = |l: &MasterLooper| {
            (
                l.state,
                l.master_curr,
                l.master_len,
                l.selected_track,
                l.selected_group,
                l.tracks
                    .iter()
                    .map(|t| (t.state, t.start_idx, t.end_idx, t.curr_idx, t.repeat))
                    .collect::<Vec<_>>(),
            )
        };
        let first = snapshot(&looper);

        looper.apply_event(LooperEvent::Reset);
        assert_eq!(snapshot(&looper), first);

        assert_eq!(looper.state, SystemState::Passthrough);
        assert!(looper.tracks.iter().all(|t| t.state == TrackState::Off));
        assert_eq!(looper.master_len, [0; NUM_GROUPS]);
        assert_eq!(looper.groups.tracks(0).count(), 0);
    }

    #[test]
    fn test_events_ignored_while_recording() {
        let mut looper = engine();
        looper.apply_event(LooperEvent::Record { track: 0, group: 0 });

        looper.apply_event(LooperEvent::Mute { track: 0 });
        assert_eq!(looper.tracks[0].state, TrackState::Recording);
        looper.apply_event(LooperEvent::SelectGroup { group: 2 });
        assert_eq!(looper.selected_group, 0);
        looper.apply_event(LooperEvent::Record { track: 1, group: 0 });
        assert_eq!(looper.selected_track, 0);
        assert_eq!(looper.state, SystemState::Recording);
    }

    #[test]
    fn test_reset_legal_from_any_state() {
        let mut looper = engine();
        looper.apply_event(LooperEvent::Record { track: 0, group: 0 });
        looper.apply_event(LooperEvent::Reset);
        assert_eq!(looper.state, SystemState::Passthrough);
    }
}
