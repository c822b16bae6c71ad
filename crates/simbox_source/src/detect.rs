//! Heuristic source feature detection.
//!
//! Looks for evidence of the UVM class-based methodology and for a `clk`
//! input on the top-level module. Detection is textual: a marker inside a
//! comment or string still counts, and an unusual declaration style can be
//! missed. [`FeatureDetector`] is the seam for a lexer-based replacement.

use std::fmt;
use std::io;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use simbox_common::DetectionResult;

/// One piece of evidence that a source uses the UVM methodology.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MethodologyMarker {
    /// A reference to a methodology base class (e.g. `uvm_driver`).
    BaseClass(String),
    /// A component/object registration macro (e.g. `` `uvm_component_utils``).
    UtilsMacro(String),
    /// A class declaration extending a methodology class (e.g. `extends uvm_test`).
    ExtendsBase(String),
}

impl fmt::Display for MethodologyMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodologyMarker::BaseClass(name) => write!(f, "base class {name}"),
            MethodologyMarker::UtilsMacro(name) => write!(f, "macro `{name}"),
            MethodologyMarker::ExtendsBase(name) => write!(f, "extends {name}"),
        }
    }
}

fn base_class_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"uvm_(?:test|component|sequence|driver|monitor|scoreboard|env|agent)\b")
            .expect("base class pattern")
    })
}

fn utils_macro_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"`(uvm_(?:component|object)_utils\w*)").expect("utils macro pattern")
    })
}

fn extends_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bextends\s+(uvm_\w+)").expect("extends pattern"))
}

/// Source classification used to shape the harness and compiler flags.
pub trait FeatureDetector {
    /// Returns every distinct methodology marker in `source`, in order of first appearance.
    fn methodology_markers(&self, source: &str) -> Vec<MethodologyMarker>;

    /// Whether `source` uses the methodology at all.
    fn uses_methodology(&self, source: &str) -> bool {
        !self.methodology_markers(source).is_empty()
    }

    /// Whether `source` declares module `top` with a `clk` input port.
    fn has_clock_port(&self, source: &str, top: &str) -> bool;

    /// Classifies a set of source texts; each property holds if any unit shows it.
    fn detect(&self, sources: &[&str], top: &str) -> DetectionResult {
        DetectionResult {
            uses_methodology: sources.iter().any(|s| self.uses_methodology(s)),
            has_clock_port: sources.iter().any(|s| self.has_clock_port(s, top)),
        }
    }
}

/// Regex-based detector.
#[derive(Clone, Copy, Debug, Default)]
pub struct PatternDetector;

impl FeatureDetector for PatternDetector {
    fn methodology_markers(&self, source: &str) -> Vec<MethodologyMarker> {
        let mut found: Vec<(usize, MethodologyMarker)> = Vec::new();
        for m in base_class_regex().find_iter(source) {
            found.push((m.start(), MethodologyMarker::BaseClass(m.as_str().to_string())));
        }
        for caps in utils_macro_regex().captures_iter(source) {
            let m = &caps[1];
            let start = caps.get(0).map(|g| g.start()).unwrap_or(0);
            found.push((start, MethodologyMarker::UtilsMacro(m.to_string())));
        }
        for caps in extends_regex().captures_iter(source) {
            let start = caps.get(0).map(|g| g.start()).unwrap_or(0);
            found.push((start, MethodologyMarker::ExtendsBase(caps[1].to_string())));
        }
        found.sort_by_key(|(pos, _)| *pos);

        let mut markers = Vec::new();
        for (_, marker) in found {
            if !markers.contains(&marker) {
                markers.push(marker);
            }
        }
        markers
    }

    fn uses_methodology(&self, source: &str) -> bool {
        base_class_regex().is_match(source)
            || utils_macro_regex().is_match(source)
            || extends_regex().is_match(source)
    }

    fn has_clock_port(&self, source: &str, top: &str) -> bool {
        let pattern = format!(
            r"\bmodule\s+{}\s*(?:#\s*\([^;]*?\)\s*)?\([^)]*\binput\s+(?:(?:wire|logic|reg|bit)\s+)?clk\b",
            regex::escape(top)
        );
        match Regex::new(&pattern) {
            Ok(re) => re.is_match(source),
            Err(e) => {
                tracing::warn!(top, error = %e, "clock port pattern rejected");
                false
            }
        }
    }
}

/// Methodology markers in `source` found by the default [`PatternDetector`].
pub fn detect_methodology(source: &str) -> Vec<MethodologyMarker> {
    PatternDetector.methodology_markers(source)
}

/// Reads the staged files and classifies them with `detector`.
pub fn detect_files<D, P>(detector: &D, paths: &[P], top: &str) -> io::Result<DetectionResult>
where
    D: FeatureDetector + ?Sized,
    P: AsRef<Path>,
{
    let texts = paths
        .iter()
        .map(std::fs::read_to_string)
        .collect::<io::Result<Vec<String>>>()?;
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    Ok(detector.detect(&refs, top))
}
