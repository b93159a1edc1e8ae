// SPDX-License-Identifier: MIT OR Apache-2.0
//! `lora-chat`: full-duplex chat over the radio link, with optional
//! AES-256-GCM encryption of chat lines.

use clap::Parser;
use lora_file_transfer::ack::new_registry;
use lora_file_transfer::config;
use lora_file_transfer::crypto::{self, SharedKey};
use lora_file_transfer::dispatcher::{run_reader_loop, DispatchEvent, ReceiveDispatcher};
use lora_file_transfer::mode::ModeController;
use lora_file_transfer::port;
use lora_file_transfer::record::Record;
use lora_file_transfer::wire::write_record;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "lora-chat", about = "Full-duplex chat over a LoRa serial link")]
struct Cli {
    /// Serial device path.
    #[arg(long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Serial baud rate.
    #[arg(long, default_value_t = config::BAUD_RATE)]
    baud: u32,

    /// Display name. Defaults to the local hostname.
    #[arg(long)]
    name: Option<String>,

    /// Encrypt outgoing chat lines and decrypt incoming ones with a
    /// shared key stored at `--key-file`.
    #[arg(long)]
    encrypt: bool,

    /// Path to the shared key file, created on first use if missing.
    #[arg(long, default_value = ".lora_chat.key")]
    key_file: PathBuf,
}

fn default_name() -> String {
    hostname()
        .map(|h| h.chars().take(10).collect())
        .unwrap_or_else(|| "anon".to_string())
}

fn hostname() -> Option<String> {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())
}

fn main() -> std::process::ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let name = cli.name.unwrap_or_else(default_name);

    let key: Option<SharedKey> = if cli.encrypt {
        match crypto::get_or_create_key(&cli.key_file) {
            Ok(k) => Some(k),
            Err(e) => {
                eprintln!("[!] cannot load or create key file {}: {e}", cli.key_file.display());
                return std::process::ExitCode::FAILURE;
            }
        }
    } else {
        None
    };

    let opened = match port::open(&cli.port, cli.baud, config::READER_POLL_INTERVAL) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("[!] cannot open {}: {e}", cli.port);
            return std::process::ExitCode::FAILURE;
        }
    };
    std::thread::sleep(Duration::from_secs(1));
    let (mut reader, writer) = match port::split(opened) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("[!] cannot duplicate port handle: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };
    ModeController::new().ensure_data_mode(&mut *writer.lock().unwrap_or_else(|e| e.into_inner()));

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        let _ = ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst));
    }

    let registry = new_registry();
    let mut dispatcher = ReceiveDispatcher::new(writer.clone(), registry, config::RECEIVE_DIR);
    let rx_key = key;
    let reader_stop = stop.clone();
    let reader_thread = std::thread::spawn(move || {
        run_reader_loop(
            &mut reader,
            &mut dispatcher,
            move || reader_stop.load(Ordering::SeqCst),
            |event| match event {
                DispatchEvent::Chat(line) => {
                    let shown = if crypto::is_encrypted(&line) {
                        rx_key
                            .as_ref()
                            .and_then(|k| crypto::decrypt(&line, k))
                            .unwrap_or(line)
                    } else {
                        line
                    };
                    println!("\r{shown}");
                }
                DispatchEvent::FileReceived(path) => {
                    println!("\r[*] unexpected file transfer completed: {}", path.display());
                }
                DispatchEvent::FileFailed(reason) => {
                    println!("\r[*] unexpected file transfer failed: {reason}");
                }
            },
        );
    });

    let join_line = format!("* {name} joined the chat");
    let _ = write_record(&writer, &Record::Chat(join_line));

    println!("[*] joined as {name}. Type a message and press Enter; Ctrl+C to exit.");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if stop.load(Ordering::SeqCst) {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let full = format!("{name}: {trimmed}");
        let outgoing = match &key {
            Some(k) => crypto::encrypt(&full, k),
            None => full,
        };
        if write_record(&writer, &Record::Chat(outgoing)).is_err() {
            eprintln!("[!] failed to send, is the port still open?");
            break;
        }
    }

    stop.store(true, Ordering::SeqCst);
    let _ = reader_thread.join();
    std::process::ExitCode::SUCCESS
}
