// ===============================
// src/console.rs (stdin / CLI input parsing)
// ===============================
//
// Baris interaktif:
//   spotify 1000 | spotify=1000   -> streams
//   share 50                      -> royalty share (kosong = 100%)
//   currency EUR                  -> ganti currency
//   refresh | accept-cookies | quit
//
use crate::domain::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Command(Command),
    AcceptCookies,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_line(raw: &str) -> Line {
    let line = raw.trim();
    if line.is_empty() {
        return Line::Empty;
    }
    let (head, rest) = match line.split_once(|c: char| c == '=' || c.is_whitespace()) {
        Some((h, r)) => (h.trim(), r.trim()),
        None => (line, ""),
    };

    match head.to_ascii_lowercase().as_str() {
        "quit" | "exit" => Line::Quit,
        "refresh" => Line::Command(Command::RefreshRates),
        "accept-cookies" => Line::AcceptCookies,
        "share" => Line::Command(Command::SetRoyaltyShare { raw: rest.to_string() }),
        "currency" if !rest.is_empty() => Line::Command(Command::SetCurrency { code: rest.to_string() }),
        "currency" => Line::Unknown(line.to_string()),
        platform if platform.chars().all(|c| c.is_ascii_alphanumeric()) => {
            Line::Command(Command::SetStreams {
                platform: platform.to_string(),
                raw: rest.to_string(),
            })
        }
        _ => Line::Unknown(line.to_string()),
    }
}

/// `--streams spotify=1000`
pub fn parse_stream_arg(arg: &str) -> Option<Command> {
    let (platform, raw) = arg.split_once('=')?;
    Some(Command::SetStreams {
        platform: platform.trim().to_ascii_lowercase(),
        raw: raw.trim().to_string(),
    })
}
