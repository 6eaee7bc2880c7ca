use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};

/// A validated state change for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LooperEvent {
    /// Begin recording `track` into `group`.
    Record { track: usize, group: usize },
    /// Begin layering live input onto `track`.
    Overdub { track: usize },
    /// Stop an active recording, or set the repeat flag while playing.
    Play { track: usize, repeat: Option<bool> },
    Mute { track: usize },
    Unmute { track: usize },
    AddToGroup { track: usize, group: usize },
    RemoveFromGroup { track: usize, group: usize },
    SelectGroup { group: usize },
    /// Begin a diagnostic capture into the calibration track.
    Calibrate,
    /// Drop all material and return to passthrough.
    Reset,
}

/// State shared between the control thread and the realtime thread besides
/// the event slot itself.
///
/// The frame-delay cells are written by the producer before an event is
/// published and read by the consumer after it is drained; they carry how
/// far into an audio cycle the triggering command landed.
#[derive(Debug, Default)]
pub struct ControlShared {
    /// Frames elapsed in the cycle during which a Record/Overdub command
    /// arrived.
    rec_frame_delay: AtomicU32,
    /// Frames elapsed in the cycle during which a stop (Play) command
    /// arrived.
    play_frame_delay: AtomicU32,
    /// Advisory: the realtime thread is inside its cycle.
    control_locked: AtomicBool,
    /// QUIT latch observed by the main loop.
    exit: AtomicBool,
}

impl ControlShared {
    pub fn request_exit(&self) {
        self.exit.store(true, Ordering::Release);
    }

    pub fn exit_requested(&self) -> bool {
        self.exit.load(Ordering::Acquire)
    }

    #[allow(dead_code)]
    pub fn is_control_locked(&self) -> bool {
        self.control_locked.load(Ordering::Acquire)
    }
}

/// Producer half of the single-slot command inbox. Owned by the control
/// thread.
pub struct EventSender {
    slot: Producer<LooperEvent>,
    shared: Arc<ControlShared>,
}

impl EventSender {
    /// Publish one event, recording `frames_elapsed` (frames into the
    /// current audio cycle) in the matching delay cell first.
    ///
    /// Returns `false` when the previous event has not been drained yet;
    /// the new event is dropped. Commands are latched user intent, so a
    /// dropped command is simply re-sent by the operator.
    pub fn send(&mut self, event: LooperEvent, frames_elapsed: u32) -> bool {
        match event {
            LooperEvent::Record { .. } | LooperEvent::Overdub { .. } => {
                self.shared
                    .rec_frame_delay
                    .store(frames_elapsed, Ordering::Release);
            }
            LooperEvent::Play { .. } => {
                self.shared
                    .play_frame_delay
                    .store(frames_elapsed, Ordering::Release);
            }
            _ => {}
        }
        self.slot.push(event).is_ok()
    }

    pub fn shared(&self) -> &Arc<ControlShared> {
        &self.shared
    }
}

/// Consumer half of the inbox. Owned by the engine; every access is
/// wait-free.
pub struct EventInbox {
    slot: Consumer<LooperEvent>,
    shared: Arc<ControlShared>,
}

impl EventInbox {
    /// Drain the pending event, if any.
    pub fn pop(&mut self) -> Option<LooperEvent> {
        self.slot.pop().ok()
    }

    pub fn rec_frame_delay(&self) -> u32 {
        self.shared.rec_frame_delay.load(Ordering::Acquire)
    }

    pub fn play_frame_delay(&self) -> u32 {
        self.shared.play_frame_delay.load(Ordering::Acquire)
    }

    /// Frame delays are single-use; the process core zeroes them at the
    /// end of every cycle.
    pub fn clear_frame_delays(&self) {
        self.shared.rec_frame_delay.store(0, Ordering::Release);
        self.shared.play_frame_delay.store(0, Ordering::Release);
    }

    pub fn set_locked(&self, locked: bool) {
        self.shared.control_locked.store(locked, Ordering::Release);
    }
}

/// Create a connected inbox pair. Capacity is one: at most one command is
/// drained per cycle, and a command arriving before the previous one was
/// drained is dropped by the producer.
pub fn channel() -> (EventSender, EventInbox) {
    let (producer, consumer) = RingBuffer::new(1);
    let shared = Arc::new(ControlShared::default());
    (
        EventSender {
            slot: producer,
            shared: shared.clone(),
        },
        EventInbox {
            slot: consumer,
            shared,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_and_pop() {
        let (mut sender, mut inbox) = channel();
        assert!(sender.send(LooperEvent::Reset, 0));
        assert_eq!(inbox.pop(), Some(LooperEvent::Reset));
        assert_eq!(inbox.pop(), None);
    }

    #[test]
    fn test_full_slot_drops_event() {
        let (mut sender, mut inbox) = channel();
        assert!(sender.send(LooperEvent::Mute { track: 0 }, 0));
        assert!(!sender.send(LooperEvent::Mute { track: 1 }, 0));
        assert_eq!(inbox.pop(), Some(LooperEvent::Mute { track: 0 }));
        assert_eq!(inbox.pop(), None);
    }

    #[test]
    fn test_record_sets_rec_delay_cell() {
        let (mut sender, inbox) = channel();
        sender.send(LooperEvent::Record { track: 0, group: 0 }, 37);
        assert_eq!(inbox.rec_frame_delay(), 37);
        assert_eq!(inbox.play_frame_delay(), 0);
    }

    #[test]
    fn test_play_sets_play_delay_cell() {
        let (mut sender, inbox) = channel();
        sender.send(
            LooperEvent::Play {
                track: 0,
                repeat: None,
            },
            64,
        );
        assert_eq!(inbox.play_frame_delay(), 64);
        assert_eq!(inbox.rec_frame_delay(), 0);
    }

    #[test]
    fn test_clear_frame_delays() {
        let (mut sender, inbox) = channel();
        sender.send(LooperEvent::Record { track: 0, group: 0 }, 12);
        inbox.clear_frame_delays();
        assert_eq!(inbox.rec_frame_delay(), 0);
    }

    #[test]
    fn test_exit_latch() {
        let (sender, _inbox) = channel();
        assert!(!sender.shared().exit_requested());
        sender.shared().request_exit();
        assert!(sender.shared().exit_requested());
    }
}
