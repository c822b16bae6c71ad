//! Value Change Dump parsing for simbox.
//!
//! Reads the `dump.vcd` written by the simulation harness into a
//! [`SignalMap`](simbox_common::SignalMap): one timeline per declared signal
//! name, in dump time units. The parser is deliberately forgiving. Malformed
//! records are skipped rather than reported, because a partial waveform is
//! still useful to the caller and a trace problem must never turn a
//! successful simulation into a failure.

#![warn(missing_docs)]

mod parser;

pub use parser::{parse_waveform, parse_waveform_file, WaveformParser};
