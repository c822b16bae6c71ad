//! Idempotent rewriting of staged sources.
//!
//! Tracing is owned by the generated harness, so dump-control system tasks in
//! user code are neutralised. The UVM include/import preamble is normalised
//! to exactly one canonical copy when the methodology is in use and removed
//! otherwise.

use std::io;
use std::path::Path;
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// The canonical methodology preamble.
pub const UVM_PREAMBLE: &str = "`include \"uvm_macros.svh\"\nimport uvm_pkg::*;\n";

fn dump_task_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\$(dumpfile|dumpvars|dumpon|dumpoff|dumpall|dumpflush|dumplimit)\b\s*(?:\([^)]*\))?\s*;",
        )
        .expect("dump task pattern")
    })
}

fn include_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^[ \t]*`include[ \t]+"uvm_macros\.svh"[ \t]*(?:\r?\n|$)"#)
            .expect("include line pattern")
    })
}

fn import_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*import[ \t]+uvm_pkg[ \t]*::[ \t]*\*[ \t]*;[ \t]*(?:\r?\n|$)")
            .expect("import line pattern")
    })
}

/// Rewrites one source text.
///
/// Applying it to its own output returns that output unchanged.
pub fn transform_source(source: &str, uses_methodology: bool) -> String {
    let out = strip_dump_tasks(source);
    let out = strip_preamble(&out);
    if uses_methodology {
        insert_preamble(&out)
    } else {
        out
    }
}

/// Rewrites each staged file in place, skipping files that do not change.
pub fn transform_files<P: AsRef<Path>>(paths: &[P], uses_methodology: bool) -> io::Result<()> {
    for path in paths {
        let path = path.as_ref();
        let original = std::fs::read_to_string(path)?;
        let rewritten = transform_source(&original, uses_methodology);
        if rewritten != original {
            tracing::debug!(file = %path.display(), "source rewritten");
            std::fs::write(path, rewritten)?;
        }
    }
    Ok(())
}

/// Replaces each dump task with a comment and a null statement, so
/// `initial $dumpvars;` remains a complete statement.
fn strip_dump_tasks(source: &str) -> String {
    dump_task_regex()
        .replace_all(source, |caps: &Captures| {
            format!("/* ${} removed by simbox */;", &caps[1])
        })
        .into_owned()
}

fn strip_preamble(source: &str) -> String {
    let out = include_line_regex().replace_all(source, "");
    import_line_regex().replace_all(&out, "").into_owned()
}

/// Inserts the preamble after a leading `` `timescale`` line, or at the start.
///
/// Blank lines before the directive are allowed.
fn insert_preamble(source: &str) -> String {
    let mut offset = 0;
    for line in source.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            offset += line.len();
            continue;
        }
        if trimmed.starts_with("`timescale") {
            let end = offset + line.len();
            let mut out = String::with_capacity(source.len() + UVM_PREAMBLE.len() + 1);
            out.push_str(&source[..end]);
            if !line.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(UVM_PREAMBLE);
            out.push_str(&source[end..]);
            return out;
        }
        break;
    }

    let mut out = String::with_capacity(source.len() + UVM_PREAMBLE.len());
    out.push_str(UVM_PREAMBLE);
    out.push_str(source);
    out
}
