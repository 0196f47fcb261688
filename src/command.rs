//! # UDP Text Command Protocol
//!
//! The appliance answers line-oriented text commands over UDP: `help`,
//! `count`, `length`, `dips`, `history`, `stop`, with an empty datagram
//! repeating the last command. This module holds the pure half of the
//! protocol — parsing and reply formatting — so it can be unit tested
//! without a socket; the socket loop lives in [`crate::server`].

use crate::code_to_volts;

/// Largest reply datagram we will send. History replies are split across
/// datagrams of at most this size without splitting a value.
pub const MAX_DATAGRAM: usize = 1500;

/// Voltage values per line in a history reply.
const VALUES_PER_LINE: usize = 10;

/// A parsed client command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Count,
    Length,
    Dips,
    History,
    Stop,
    /// Empty datagram: repeat the previous command
    Repeat,
    Unknown,
}

/// Parse one datagram's text into a command.
///
/// Trailing newline/carriage return is stripped; an empty payload means
/// "repeat the last command".
pub fn parse(text: &str) -> Command {
    match text.trim_end_matches(['\r', '\n']) {
        "" => Command::Repeat,
        "help" | "?" => Command::Help,
        "count" => Command::Count,
        "length" => Command::Length,
        "dips" => Command::Dips,
        "history" => Command::History,
        "stop" => Command::Stop,
        _ => Command::Unknown,
    }
}

pub const HELP_TEXT: &str = "\nAvailable commands:\n\
help: list of commands and summary\n\
count: Return the total number of light samples taken so far\n\
length: Return how many samples were captured during the previous second\n\
dips: Return how many dips were detected during the previous second's samples\n\
history: Return all the data samples from the previous second\n\
stop: Exit the program\n\
<enter>: repeat last command\n";

pub const UNKNOWN_TEXT: &str = "Unknown command. Type 'help' for a list of commands.\n";

pub const STOPPING_TEXT: &str = "Program terminating.\n";

pub const NO_HISTORY_TEXT: &str = "No history available\n";

pub fn count_reply(total: u64) -> String {
    format!("# samples taken total: {total}\n")
}

pub fn length_reply(length: usize) -> String {
    format!("# samples taken last second: {length}\n")
}

pub fn dips_reply(dips: u32) -> String {
    format!("# Dips: {dips}\n")
}

/// Format the previous second's samples as voltages, ten per line, packed
/// into datagrams of at most [`MAX_DATAGRAM`] bytes.
///
/// Values are comma separated with a newline closing every tenth value and
/// the final one; a value is never split across two datagrams. An empty
/// history yields the "no history" reply.
pub fn history_reply(samples: &[f64]) -> Vec<String> {
    if samples.is_empty() {
        return vec![NO_HISTORY_TEXT.to_string()];
    }

    let mut datagrams = Vec::new();
    let mut packet = String::new();
    for (i, &code) in samples.iter().enumerate() {
        let last = i + 1 == samples.len();
        let end_of_line = (i + 1) % VALUES_PER_LINE == 0;
        let separator = if last || end_of_line { "\n" } else { ", " };
        let token = format!("{:.3}{}", code_to_volts(code), separator);

        if packet.len() + token.len() > MAX_DATAGRAM {
            datagrams.push(std::mem::take(&mut packet));
        }
        packet.push_str(&token);
    }
    if !packet.is_empty() {
        datagrams.push(packet);
    }
    datagrams
}
