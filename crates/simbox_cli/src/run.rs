//! `simbox run` and `simbox request`: end-to-end simulation.

use std::io::Read;
use std::path::PathBuf;

use serde::Serialize;
use simbox_common::{SimulationRequest, SourceUnit};
use simbox_pipeline::SimulateError;

use crate::context::{build_simulator, load_service_config};
use crate::{GlobalArgs, RequestArgs, RunArgs};

/// Exit code for a request rejected as invalid input.
const INPUT_ERROR_EXIT: i32 = 2;

/// Runs the `simbox run` command.
///
/// Returns exit code 0 when the simulation succeeded, 1 otherwise.
pub fn run(args: &RunArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_service_config(global)?;
    let units = read_units(&args.files)?;
    let mut request = SimulationRequest::from_files(units);
    request.top = args.top.clone();

    let simulator = build_simulator(&config);
    let mut result = simulator.simulate(&request)?;
    if args.no_raw_trace {
        result.raw_trace = None;
    }

    print_json(&result, args.pretty)?;
    Ok(if result.success { 0 } else { 1 })
}

/// Runs the `simbox request` command.
///
/// An unreadable body or a rejected request prints `{"error": ...}` and
/// returns exit code 2.
pub fn request(args: &RequestArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_service_config(global)?;
    let body = read_input(args.input.as_deref())?;

    let request = match parse_request_body(&body) {
        Ok(r) => r,
        Err(message) => return input_error(&message, args.pretty),
    };

    let simulator = build_simulator(&config);
    match simulator.simulate(&request) {
        Ok(result) => {
            print_json(&result, args.pretty)?;
            Ok(if result.success { 0 } else { 1 })
        }
        Err(SimulateError::Request(e)) => input_error(&e.to_string(), args.pretty),
        Err(e) => Err(e.into()),
    }
}

/// Reads each file into a unit named after its final path component.
pub fn read_units(paths: &[PathBuf]) -> Result<Vec<SourceUnit>, Box<dyn std::error::Error>> {
    paths
        .iter()
        .map(|path| -> Result<SourceUnit, Box<dyn std::error::Error>> {
            let name = path
                .file_name()
                .ok_or_else(|| format!("not a file path: {}", path.display()))?
                .to_string_lossy()
                .into_owned();
            let content = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            Ok(SourceUnit::new(name, content))
        })
        .collect()
}

/// Parses a request body in the service's JSON shape.
pub fn parse_request_body(body: &str) -> Result<SimulationRequest, String> {
    serde_json::from_str(body).map_err(|e| format!("invalid request body: {e}"))
}

fn read_input(input: Option<&str>) -> Result<String, Box<dyn std::error::Error>> {
    match input {
        None | Some("-") => {
            let mut body = String::new();
            std::io::stdin().read_to_string(&mut body)?;
            Ok(body)
        }
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {path}: {e}").into()),
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

fn input_error(message: &str, pretty: bool) -> Result<i32, Box<dyn std::error::Error>> {
    print_json(&ErrorBody { error: message }, pretty)?;
    Ok(INPUT_ERROR_EXIT)
}

/// Writes `value` as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), Box<dyn std::error::Error>> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}
