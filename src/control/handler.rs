use std::io::{self, Read, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::audio::CycleTimer;
use crate::control::parser::{self, ControlCommand, ACK, COMMAND_LEN, NAK};
use crate::looper::EventSender;
use crate::types::MAX_BLOCK_FRAMES;

/// The control surface thread.
///
/// Blocks on the command source (stdin for the console case), answers one
/// ACK or NAK byte per six-byte command, and publishes at most one
/// validated event per command into the engine's inbox. Commands are
/// timestamped against the cycle timer before publication so the engine
/// can align loop edges.
pub struct ControlHandler {
    thread: Option<JoinHandle<()>>,
}

impl ControlHandler {
    /// Spawn the control thread over a byte source and reply sink.
    pub fn spawn<R, W>(
        reader: R,
        writer: W,
        sender: EventSender,
        timer: Arc<CycleTimer>,
    ) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let thread = thread::Builder::new()
            .name("control".into())
            .spawn(move || run_loop(reader, writer, sender, timer))
            .context("Failed to spawn control thread")?;

        Ok(Self {
            thread: Some(thread),
        })
    }

    /// Wait for the control thread to finish.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ControlHandler {
    fn drop(&mut self) {
        self.join();
    }
}

fn run_loop<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    mut sender: EventSender,
    timer: Arc<CycleTimer>,
) {
    let mut buf = [0u8; COMMAND_LEN];

    loop {
        match read_command(&mut reader, &mut buf) {
            Ok(true) => {}
            Ok(false) => break, // end of input
            Err(err) => {
                debug!("command read failed: {err}");
                break;
            }
        }

        let reply = match parser::parse(&buf) {
            Ok(ControlCommand::Quit) => {
                sender.shared().request_exit();
                let _ = writer.write_all(&[ACK]);
                let _ = writer.flush();
                info!("quit requested");
                break;
            }
            Ok(ControlCommand::Event(event)) => {
                let frames = timer.frames_since_cycle_start(MAX_BLOCK_FRAMES as u32);
                if !sender.send(event, frames) {
                    debug!("inbox full, dropped {event:?}");
                }
                ACK
            }
            Err(err) => {
                debug!("rejected command: {err}");
                NAK
            }
        };

        let _ = writer.write_all(&[reply]);
        let _ = writer.flush();
    }

    // Losing the command source ends the session too
    sender.shared().request_exit();
}

/// Read one six-byte command, skipping stray terminator bytes between
/// commands. Returns `false` on end of input.
fn read_command<R: Read>(reader: &mut R, buf: &mut [u8; COMMAND_LEN]) -> io::Result<bool> {
    let mut first = [0u8; 1];
    loop {
        if reader.read(&mut first)? == 0 {
            return Ok(false);
        }
        if first[0] != b'\n' && first[0] != b'\r' {
            break;
        }
    }

    buf[0] = first[0];
    let mut filled = 1;
    while filled < COMMAND_LEN {
        let read = reader.read(&mut buf[filled..])?;
        if read == 0 {
            return Ok(false);
        }
        filled += read;
    }
    Ok(true)
}
