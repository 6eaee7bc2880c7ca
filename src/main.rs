mod audio;
mod config;
mod control;
mod looper;
mod types;

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::audio::{AudioTransport, CycleTimer};
use crate::config::Config;
use crate::control::ControlHandler;
use crate::looper::{LooperEvent, MasterLooper};

/// layers - multi-track live audio looper
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Multi-track live audio looper driven by six-byte console commands",
    long_about = "Multi-track live audio looper.\n\n\
                  Records the live input into grouped tracks, plays them back \
                  while mixing the input, and layers new material over existing \
                  loops. Control commands are read from stdin, six ASCII bytes \
                  each (e.g. 'r00g1' + newline records track 0 into group 1); \
                  every command is answered with 'p' (accepted) or 'f' \
                  (rejected).\n\n\
                  Configuration is loaded from layers.yaml by default, or use \
                  --config to specify a different file."
)]
struct Args {
    /// List available audio devices
    #[arg(short, long)]
    list_devices: bool,

    /// Path to configuration file
    #[arg(short, long, value_name = "PATH", default_value = "layers.yaml")]
    config: String,

    /// Start a diagnostic capture into the calibration track
    #[arg(long)]
    calibrate: bool,
}

/// Load configuration from file or use defaults
fn load_config(config_path: &str) -> Result<Config> {
    let path = Path::new(config_path);

    // If explicit config path provided and file doesn't exist, error
    if config_path != "layers.yaml" && !path.exists() {
        anyhow::bail!("Config file not found: {}", config_path);
    }

    // If default path and file doesn't exist, use defaults
    if config_path == "layers.yaml" && !path.exists() {
        return Ok(Config::default());
    }

    Config::from_file(path)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list_devices {
        return list_all_devices();
    }

    let config = load_config(&args.config)?;

    let input_device = audio::device::find_input_device(config.devices.input.as_deref())?;
    let output_device = audio::device::find_output_device(config.devices.output.as_deref())?;

    // The engine and its command channel; the engine itself moves into
    // the realtime callback below
    let (looper, mut sender) = MasterLooper::new(config.engine.stereo, config.max_idx());
    let shared = sender.shared().clone();
    let timer = Arc::new(CycleTimer::new(types::SAMPLE_RATE));

    let mut transport = AudioTransport::start(
        looper,
        &input_device,
        &output_device,
        config.engine.stereo,
        config.engine.buffer_frames,
        timer.clone(),
    )?;

    if args.calibrate {
        sender.send(LooperEvent::Calibrate, 0);
        info!("calibration requested");
    }

    let mut handler = ControlHandler::spawn(io::stdin(), io::stdout(), sender, timer)?;
    info!("running; send q0000 or close stdin to quit");

    // Wait for QUIT or loss of the command source
    while !shared.exit_requested() {
        thread::sleep(Duration::from_millis(50));
    }

    handler.join();
    transport.stop()?;
    info!("clean shutdown");
    Ok(())
}

/// List all available audio devices
fn list_all_devices() -> Result<()> {
    println!("layers - available devices");
    println!("==========================");
    println!();

    println!("Audio Input Devices:");
    print_devices(audio::device::list_input_devices());
    println!();

    println!("Audio Output Devices:");
    print_devices(audio::device::list_output_devices());
    println!();

    println!("Configuration:");
    println!("  Create a layers.yaml file to select devices");
    println!("  Use --config <path> to specify a different file");
    println!();
    println!("Example layers.yaml:");
    println!("  devices:");
    println!("    input: \"USB Audio\"");
    println!("    output: \"0\"");
    println!();
    println!("  engine:");
    println!("    stereo: true");
    println!("    seconds: 60");
    println!("    buffer_frames: 256");

    Ok(())
}

fn print_devices(devices: Result<Vec<audio::device::AudioDeviceInfo>>) {
    match devices {
        Ok(devices) => {
            if devices.is_empty() {
                println!("  No devices found");
            } else {
                for (i, device) in devices.iter().enumerate() {
                    let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
                    println!(
                        "  [{}] {} - {}ch @ {}Hz{}",
                        i, device.name, device.channels, device.sample_rate, default_marker
                    );
                }
            }
        }
        Err(e) => {
            println!("  Error: {}", e);
        }
    }
}
