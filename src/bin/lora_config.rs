// SPDX-License-Identifier: MIT OR Apache-2.0
//! `lora-config`: dump the radio module's `AT+HELP` configuration text.

use clap::Parser;
use lora_file_transfer::config;
use lora_file_transfer::mode::ModeController;
use lora_file_transfer::port;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "lora-config", about = "Show the LoRa module's current configuration")]
struct Cli {
    /// Serial device path.
    #[arg(long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Serial baud rate.
    #[arg(long, default_value_t = config::BAUD_RATE)]
    baud: u32,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    println!("LoRa Config - reading from {}\n", cli.port);

    let mut port = match port::open(&cli.port, cli.baud, Duration::from_secs(2)) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("[!] cannot open {}: {e}", cli.port);
            return ExitCode::FAILURE;
        }
    };
    std::thread::sleep(Duration::from_secs(1));

    let mut controller = ModeController::new();
    controller.ensure_data_mode(&mut port);

    match controller.read_config(&mut port) {
        Some(help_text) => {
            println!("=== Module Configuration ===\n");
            println!("{help_text}");
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("[!] failed to enter AT mode");
            ExitCode::FAILURE
        }
    }
}
