// serialterm-core/src/bin/serial_probe.rs

use anyhow::{Context, Result};
use serialterm_core::console::{ConsoleCommand, ConsoleParser};
use serialterm_core::logging::{init_tracing, install_panic_hook};
use serialterm_core::{SessionControl, SessionEngine, SessionEvent, Settings};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    install_panic_hook();
    eprintln!("[serial_probe] starting… (Ctrl+C to exit, :quit to leave)");

    let settings = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => Settings::load(&path).context("loading settings")?,
        None => match Settings::default_path() {
            Some(path) => Settings::load_or_default(&path).context("loading settings")?,
            None => Settings::default(),
        },
    };

    let (mut engine, mut events) =
        SessionEngine::with_system_backend(&settings).context("invalid settings")?;
    let mut output = engine
        .output_queue()
        .context("output queue already taken")?;
    engine.start().context("spawning session worker")?;
    let control = engine.control();

    // Task: dump decoded text to stdout exactly as the device sent it.
    tokio::spawn(async move {
        let mut out = tokio::io::stdout();
        while let Some(result) = output.next().await {
            for row in &result.rows {
                tracing::debug!(hex = %row, "rx");
            }
            if out.write_all(result.plain.as_bytes()).await.is_err() {
                break;
            }
            let _ = out.flush().await;
        }
    });

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Error { code, message } => {
                    eprintln!("[serial_probe] {code} error: {message}")
                }
                SessionEvent::PortConfigChanged(settings) => {
                    eprintln!("[serial_probe] port settings: {settings}")
                }
                SessionEvent::DeviceListChanged(list) => {
                    eprintln!("[serial_probe] devices: {}", list.names().join(", "))
                }
                SessionEvent::StateChanged(state) => eprintln!("[serial_probe] {state}"),
            }
        }
    });

    // A missing device is reported on the event stream; keep going so the
    // user can pick another port.
    let opener = control.clone();
    let _ = tokio::task::spawn_blocking(move || opener.resume())
        .await
        .context("resume task failed")?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n[serial_probe] Ctrl+C received, exiting…");
                break;
            }

            line = lines.next_line() => {
                let Some(line) = line.context("stdin read failed")? else {
                    eprintln!("\n[serial_probe] stdin closed, exiting…");
                    break;
                };
                // Control calls take the engine lock and may touch the device.
                let command = ConsoleParser::parse(&line);
                let control = control.clone();
                let keep_going = tokio::task::spawn_blocking(move || dispatch(&control, command))
                    .await
                    .context("console command failed")?;
                if !keep_going {
                    break;
                }
            }
        }
    }

    // Joins the worker thread.
    tokio::task::spawn_blocking(move || engine.stop())
        .await
        .context("shutdown failed")?;
    Ok(())
}

/// Run one console command. Returns false to quit.
fn dispatch(control: &SessionControl, command: ConsoleCommand) -> bool {
    // Failures are already mirrored on the event stream.
    match command {
        ConsoleCommand::Send(text) => {
            let _ = control.write(&text);
        }
        ConsoleCommand::Port(port) => {
            let _ = control.set_port(&port);
        }
        ConsoleCommand::Baud(rate) => {
            let _ = control.set_baud_rate(rate);
        }
        ConsoleCommand::Eol(index) => {
            if let Err(e) = control.set_eol(index) {
                eprintln!("[serial_probe] {e}");
            }
        }
        ConsoleCommand::Pause => control.pause(),
        ConsoleCommand::Resume => {
            let _ = control.resume();
        }
        ConsoleCommand::Ports => {
            for device in control.devices().devices() {
                match &device.description {
                    Some(desc) => eprintln!("  {} ({desc})", device.name),
                    None => eprintln!("  {}", device.name),
                }
            }
        }
        ConsoleCommand::Status => {
            let config = control.config();
            eprintln!(
                "[serial_probe] {} on {} ({}), eol {:?}",
                control.state(),
                config.port,
                config.line_settings(),
                control.eol()
            );
        }
        ConsoleCommand::Quit => return false,
        ConsoleCommand::Invalid(reason) => eprintln!("[serial_probe] {reason}"),
    }
    true
}
