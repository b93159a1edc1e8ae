// SPDX-License-Identifier: MIT OR Apache-2.0
//! `lora-file`: send or receive a single file over the radio link.

use clap::{Parser, Subcommand};
use lora_file_transfer::ack::new_registry;
use lora_file_transfer::config::{self, TransferConfig};
use lora_file_transfer::dispatcher::{run_reader_loop, DispatchEvent, ReceiveDispatcher};
use lora_file_transfer::mode::ModeController;
use lora_file_transfer::port;
use lora_file_transfer::sender::SenderSession;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "lora-file", about = "Send or receive a file over a LoRa serial link")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Serial device path.
    #[arg(long, global = true, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Serial baud rate.
    #[arg(long, global = true, default_value_t = config::BAUD_RATE)]
    baud: u32,
}

#[derive(Subcommand)]
enum Command {
    /// Send a file to a listening receiver.
    Send {
        /// Path to the file to send.
        path: PathBuf,

        /// Raw bytes per chunk.
        #[arg(long, default_value_t = config::CHUNK_SIZE)]
        chunk_size: usize,

        /// Seconds to wait for an ACK/NACK before retrying.
        #[arg(long, default_value_t = config::ACK_TIMEOUT.as_secs())]
        ack_timeout_secs: u64,

        /// Retries per record before giving up.
        #[arg(long, default_value_t = config::MAX_RETRIES)]
        max_retries: u32,
    },
    /// Wait for an incoming file transfer.
    Receive {
        /// Directory received files are written to.
        #[arg(long, default_value = config::RECEIVE_DIR)]
        out_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let opened = match port::open(&cli.port, cli.baud, config::READER_POLL_INTERVAL) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("[!] cannot open {}: {e}", cli.port);
            return ExitCode::FAILURE;
        }
    };
    std::thread::sleep(Duration::from_secs(1));

    let (mut reader, writer) = match port::split(opened) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("[!] cannot duplicate port handle: {e}");
            return ExitCode::FAILURE;
        }
    };

    ModeController::new().ensure_data_mode(&mut *writer.lock().unwrap_or_else(|e| e.into_inner()));

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        let _ = ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst));
    }

    match cli.command {
        Command::Send {
            path,
            chunk_size,
            ack_timeout_secs,
            max_retries,
        } => {
            let data = match std::fs::read(&path) {
                Ok(d) => d,
                Err(e) => {
                    eprintln!("[!] cannot read {}: {e}", path.display());
                    return ExitCode::FAILURE;
                }
            };
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unnamed".to_string());

            let registry = new_registry();
            let mut dispatcher = ReceiveDispatcher::new(writer.clone(), registry.clone(), config::RECEIVE_DIR);
            let reader_stop = stop.clone();
            let reader_handle = std::thread::spawn(move || {
                run_reader_loop(&mut reader, &mut dispatcher, move || reader_stop.load(Ordering::SeqCst), |event| {
                    if let DispatchEvent::Chat(line) = event {
                        println!("[chat] {line}");
                    }
                });
            });

            let transfer_config = TransferConfig {
                chunk_size,
                max_retries,
                ack_timeout: Duration::from_secs(ack_timeout_secs),
            };
            let mut session = SenderSession::new(writer, registry, transfer_config);
            println!("[*] sending {} ({} bytes)", name, data.len());
            let result = session.send(&name, &data);
            stop.store(true, Ordering::SeqCst);
            let _ = reader_handle.join();

            match result {
                Ok(()) => {
                    println!("[*] transfer complete");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("[!] transfer failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Command::Receive { out_dir } => {
            println!("[*] waiting for incoming transfer, saving to {}", out_dir.display());
            let registry = new_registry();
            let mut dispatcher = ReceiveDispatcher::new(writer, registry, out_dir);
            let done = Arc::new(AtomicBool::new(false));
            let mut outcome = ExitCode::FAILURE;
            let should_stop = {
                let stop = stop.clone();
                let done = done.clone();
                move || stop.load(Ordering::SeqCst) || done.load(Ordering::SeqCst)
            };
            run_reader_loop(&mut reader, &mut dispatcher, should_stop, |event| match event {
                DispatchEvent::Chat(line) => println!("[chat] {line}"),
                DispatchEvent::FileReceived(path) => {
                    println!("[*] file saved: {}", path.display());
                    outcome = ExitCode::SUCCESS;
                    done.store(true, Ordering::SeqCst);
                }
                DispatchEvent::FileFailed(reason) => {
                    eprintln!("[!] transfer failed: {reason}");
                    outcome = ExitCode::FAILURE;
                    done.store(true, Ordering::SeqCst);
                }
            });
            outcome
        }
    }
}
