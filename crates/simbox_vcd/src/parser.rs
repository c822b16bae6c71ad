//! Streaming VCD reader.
//!
//! The header is tokenised so that keyword records may span lines or share a
//! line. The value-change section is read line by line.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use simbox_common::{Signal, SignalMap, ValueChange};

/// A header record whose `$end` has not been seen yet.
#[derive(Debug)]
struct PendingKeyword {
    keyword: String,
    body: Vec<String>,
}

/// Incremental parser state. Feed it lines, then call [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct WaveformParser {
    /// Signals in declaration order, with their leaf names.
    signals: Vec<(String, Signal)>,
    name_to_idx: HashMap<String, usize>,
    /// A dump id can be declared under several names (one net seen from
    /// several scopes), so it maps to every signal it feeds.
    id_to_idx: HashMap<String, Vec<usize>>,
    scope_stack: Vec<String>,
    pending: Option<PendingKeyword>,
    in_values: bool,
    in_comment: bool,
    time: u64,
}

impl WaveformParser {
    /// Creates a parser positioned at the start of the header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one line of input. Never fails; unusable records are skipped.
    pub fn feed_line(&mut self, line: &str) {
        if self.in_values {
            self.value_line(line.trim());
        } else {
            self.header_line(line);
        }
    }

    /// Returns the signals that recorded at least one value, or `None` if
    /// there are none.
    pub fn finish(self) -> Option<SignalMap> {
        let map: SignalMap = self
            .signals
            .into_iter()
            .filter(|(_, signal)| !signal.values.is_empty())
            .collect();
        if map.is_empty() {
            None
        } else {
            Some(map)
        }
    }

    fn header_line(&mut self, line: &str) {
        for tok in line.split_whitespace() {
            if tok == "$end" {
                if let Some(done) = self.pending.take() {
                    self.process_keyword(&done.keyword, &done.body);
                }
                continue;
            }
            if let Some(pending) = self.pending.as_mut() {
                pending.body.push(tok.to_string());
                continue;
            }

            if tok == "$enddefinitions" {
                // The trailing `$end` is skipped by the value-change reader.
                self.in_values = true;
                return;
            }
            if let Some(keyword) = tok.strip_prefix('$') {
                if !keyword.is_empty() {
                    self.pending = Some(PendingKeyword {
                        keyword: keyword.to_ascii_lowercase(),
                        body: Vec::new(),
                    });
                }
            }
        }
    }

    fn process_keyword(&mut self, keyword: &str, body: &[String]) {
        match keyword {
            "scope" => {
                // `module <name>`, `begin <name>`, ...
                if let Some(name) = body.get(1).or_else(|| body.first()) {
                    self.scope_stack.push(name.clone());
                }
            }
            "upscope" => {
                self.scope_stack.pop();
            }
            "var" => {
                // `<type> <width> <id> <name> [range]`
                if body.len() < 4 {
                    tracing::trace!(record = %body.join(" "), "skipping short $var");
                    return;
                }
                let Ok(width) = body[1].parse::<u32>() else {
                    tracing::trace!(record = %body.join(" "), "skipping $var with bad width");
                    return;
                };
                self.declare(&body[2], &body[3], width);
            }
            _ => {}
        }
    }

    fn declare(&mut self, id: &str, name: &str, width: u32) {
        let idx = match self.name_to_idx.get(name) {
            Some(&idx) => {
                tracing::trace!(
                    signal = name,
                    scope = %self.scope_stack.join("."),
                    "signal name redeclared; aliasing to first declaration"
                );
                idx
            }
            None => {
                let idx = self.signals.len();
                self.signals.push((name.to_string(), Signal::new(width)));
                self.name_to_idx.insert(name.to_string(), idx);
                idx
            }
        };
        let targets = self.id_to_idx.entry(id.to_string()).or_default();
        if !targets.contains(&idx) {
            targets.push(idx);
        }
    }

    fn value_line(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        if self.in_comment {
            if line.contains("$end") {
                self.in_comment = false;
            }
            return;
        }
        if line.starts_with('$') {
            // `$dumpvars`, `$dumpall`, `$end`, ...
            if line.starts_with("$comment") && !line.contains("$end") {
                self.in_comment = true;
            }
            return;
        }

        if let Some(rest) = line.strip_prefix('#') {
            match rest.trim().parse::<u64>() {
                Ok(t) if t >= self.time => self.time = t,
                Ok(t) => tracing::trace!(time = t, current = self.time, "skipping backwards timestamp"),
                Err(_) => tracing::trace!(record = line, "skipping malformed timestamp"),
            }
            return;
        }

        let Some(first) = line.chars().next() else {
            return;
        };
        match first {
            'b' | 'B' => {
                let mut parts = line[1..].split_whitespace();
                let (Some(bits), Some(id)) = (parts.next(), parts.next()) else {
                    return;
                };
                if bits.chars().all(is_logic_char) {
                    self.append(id, bits.to_ascii_lowercase());
                }
            }
            c if is_logic_char(c) => {
                let id = line[1..].trim();
                if !id.is_empty() && !id.contains(char::is_whitespace) {
                    self.append(id, c.to_ascii_lowercase().to_string());
                }
            }
            // Real-valued (`r`) changes and anything unrecognised.
            _ => {}
        }
    }

    fn append(&mut self, id: &str, val: String) {
        let Some(targets) = self.id_to_idx.get(id) else {
            return;
        };
        for &idx in targets {
            let values = &mut self.signals[idx].1.values;
            if let Some(last) = values.last() {
                if last.time == self.time && last.val == val {
                    continue;
                }
            }
            values.push(ValueChange::new(self.time, val.clone()));
        }
    }
}

fn is_logic_char(c: char) -> bool {
    matches!(c, '0' | '1' | 'x' | 'X' | 'z' | 'Z')
}

/// Parses a VCD stream into signal timelines.
///
/// Invalid UTF-8 is replaced rather than rejected. A read error ends the
/// stream early and whatever was parsed so far is kept.
pub fn parse_waveform<R: BufRead>(mut reader: R) -> Option<SignalMap> {
    let mut parser = WaveformParser::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => parser.feed_line(&String::from_utf8_lossy(&buf)),
            Err(e) => {
                tracing::warn!(error = %e, "waveform read interrupted");
                break;
            }
        }
    }
    parser.finish()
}

/// Parses the VCD file at `path`; `None` if it is missing, unreadable, or
/// contains no signal activity.
pub fn parse_waveform_file(path: &Path) -> Option<SignalMap> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(file = %path.display(), "no waveform written");
            return None;
        }
        Err(e) => {
            tracing::warn!(file = %path.display(), error = %e, "cannot open waveform");
            return None;
        }
    };
    parse_waveform(std::io::BufReader::new(file))
}
