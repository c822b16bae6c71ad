//! `simbox detect`, `simbox harness`, `simbox wave`: individual pipeline steps.

use std::fmt::Write;

use simbox_harness::{generate, HarnessSpec};
use simbox_source::{detect_methodology, FeatureDetector, PatternDetector};
use simbox_vcd::parse_waveform_file;

use crate::context::load_service_config;
use crate::run::{print_json, read_units};
use crate::{DetectArgs, GlobalArgs, HarnessArgs, WaveArgs};

/// Runs the `simbox detect` command.
pub fn detect(args: &DetectArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_service_config(global)?;
    let top = args.top.as_deref().unwrap_or(config.request.default_top.as_str());
    let units = read_units(&args.files)?;
    let texts: Vec<&str> = units.iter().map(|u| u.content.as_str()).collect();

    let detection = PatternDetector.detect(&texts, top);
    let mut report = String::new();
    writeln!(report, "uses methodology: {}", yes_no(detection.uses_methodology))?;
    writeln!(report, "clock port on {top}: {}", yes_no(detection.has_clock_port))?;
    for unit in &units {
        let markers = detect_methodology(&unit.content);
        if markers.is_empty() {
            continue;
        }
        let list: Vec<String> = markers.iter().map(ToString::to_string).collect();
        writeln!(report, "  {}: {}", unit.name, list.join(", "))?;
    }
    print!("{report}");
    Ok(0)
}

/// Runs the `simbox harness` command.
pub fn harness(args: &HarnessArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_service_config(global)?;
    let top = args.top.clone().unwrap_or(config.request.default_top);
    if !simbox_common::is_identifier(&top) {
        return Err(format!("invalid top module name '{top}'").into());
    }
    let spec = HarnessSpec::new(top, args.clock)
        .with_max_steps(args.max_steps.unwrap_or(config.limits.max_steps));
    print!("{}", generate(&spec));
    Ok(0)
}

/// Runs the `simbox wave` command.
///
/// Returns exit code 1 when the file is missing or has no signal activity.
pub fn wave(args: &WaveArgs) -> Result<i32, Box<dyn std::error::Error>> {
    match parse_waveform_file(&args.file) {
        Some(signals) => {
            print_json(&signals, args.pretty)?;
            Ok(0)
        }
        None => {
            eprintln!("no signal activity in {}", args.file.display());
            Ok(1)
        }
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}
