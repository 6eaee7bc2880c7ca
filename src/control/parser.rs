use anyhow::{bail, Result};

use crate::looper::LooperEvent;
use crate::types::{NUM_GROUPS, NUM_TRACKS};

/// Length of every wire command in bytes.
pub const COMMAND_LEN: usize = 6;

/// Byte written back for an accepted command.
pub const ACK: u8 = b'p';

/// Byte written back for a rejected command.
pub const NAK: u8 = b'f';

/// A decoded control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Event(LooperEvent),
    Quit,
}

/// Decode one six-byte command.
///
/// Fixed field layout: byte 0 command, bytes 1-2 track digits, byte 3
/// sub-command, byte 4 group digit, byte 5 terminator. Commands that do
/// not use a field leave it as padding. Anything malformed or out of
/// bounds is an error, answered with a NAK at the boundary.
pub fn parse(raw: &[u8; COMMAND_LEN]) -> Result<ControlCommand> {
    let event = match raw[0] {
        b'r' | b'R' => {
            require_sub(raw, b'g')?;
            LooperEvent::Record {
                track: track_field(raw)?,
                group: group_field(raw)?,
            }
        }
        b'o' | b'O' => LooperEvent::Overdub {
            track: track_field(raw)?,
        },
        b'p' | b'P' => {
            let repeat = match raw[5] {
                b'\r' | b'\n' => None,
                b'r' => Some(true),
                b's' => Some(false),
                other => bail!("unknown play terminator {:#04x}", other),
            };
            LooperEvent::Play {
                track: track_field(raw)?,
                repeat,
            }
        }
        b'm' | b'M' => LooperEvent::Mute {
            track: track_field(raw)?,
        },
        b'u' | b'U' => LooperEvent::Unmute {
            track: track_field(raw)?,
        },
        b't' | b'T' => {
            require_sub(raw, b'g')?;
            LooperEvent::AddToGroup {
                track: track_field(raw)?,
                group: group_field(raw)?,
            }
        }
        b'd' | b'D' => {
            require_sub(raw, b'g')?;
            LooperEvent::RemoveFromGroup {
                track: track_field(raw)?,
                group: group_field(raw)?,
            }
        }
        b'g' | b'G' => LooperEvent::SelectGroup {
            group: group_field(raw)?,
        },
        b's' | b'S' => LooperEvent::Reset,
        b'q' | b'Q' => return Ok(ControlCommand::Quit),
        other => bail!("unknown command byte {:#04x}", other),
    };
    Ok(ControlCommand::Event(event))
}

fn digit(byte: u8) -> Result<usize> {
    if byte.is_ascii_digit() {
        Ok((byte - b'0') as usize)
    } else {
        bail!("expected digit, got {:#04x}", byte)
    }
}

fn track_field(raw: &[u8; COMMAND_LEN]) -> Result<usize> {
    let track = digit(raw[1])? * 10 + digit(raw[2])?;
    if track >= NUM_TRACKS {
        bail!("track {} out of range", track);
    }
    Ok(track)
}

fn group_field(raw: &[u8; COMMAND_LEN]) -> Result<usize> {
    let group = digit(raw[4])?;
    if group >= NUM_GROUPS {
        bail!("group {} out of range", group);
    }
    Ok(group)
}

fn require_sub(raw: &[u8; COMMAND_LEN], expected: u8) -> Result<()> {
    if raw[3] == expected {
        Ok(())
    } else {
        bail!("expected sub-command {:#04x}, got {:#04x}", expected, raw[3])
    }
}
