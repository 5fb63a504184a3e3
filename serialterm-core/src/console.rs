/// A line typed at the probe console.
#[derive(Debug, PartialEq)]
pub enum ConsoleCommand {
    /// Plain text for the device.
    Send(String),
    Port(String),
    Baud(u32),
    Eol(usize),
    Pause,
    Resume,
    Ports,
    Status,
    Quit,
    /// A `:` command that didn't parse, with the reason.
    Invalid(String),
}

pub struct ConsoleParser;

impl ConsoleParser {
    /// Lines starting with `:` are commands; `::` escapes a literal colon.
    pub fn parse(input: &str) -> ConsoleCommand {
        let line = input.trim_end_matches(['\r', '\n']);

        if let Some(escaped) = line.strip_prefix("::") {
            return ConsoleCommand::Send(format!(":{escaped}"));
        }

        let Some(rest) = line.strip_prefix(':') else {
            return ConsoleCommand::Send(line.to_string());
        };

        let parts: Vec<&str> = rest.split_whitespace().collect();
        let Some(cmd) = parts.first() else {
            return ConsoleCommand::Invalid("empty command".to_string());
        };

        match *cmd {
            "port" => match parts.get(1) {
                Some(port) => ConsoleCommand::Port(port.to_string()),
                None => ConsoleCommand::Invalid("usage: :port <device>".to_string()),
            },
            "baud" => match parts.get(1).map(|s| s.parse::<u32>()) {
                Some(Ok(rate)) => ConsoleCommand::Baud(rate),
                _ => ConsoleCommand::Invalid("usage: :baud <rate>".to_string()),
            },
            "eol" => match parts.get(1).map(|s| s.parse::<usize>()) {
                Some(Ok(index)) => ConsoleCommand::Eol(index),
                _ => ConsoleCommand::Invalid("usage: :eol <0-3>".to_string()),
            },
            "pause" => ConsoleCommand::Pause,
            "resume" | "start" => ConsoleCommand::Resume,
            "ports" | "list" => ConsoleCommand::Ports,
            "status" => ConsoleCommand::Status,
            "quit" | "exit" | "q" => ConsoleCommand::Quit,
            other => ConsoleCommand::Invalid(format!("unknown command: {other}")),
        }
    }
}
