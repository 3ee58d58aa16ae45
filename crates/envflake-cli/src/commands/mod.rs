pub mod check;
pub mod completions;
pub mod id;
pub mod inputs;
pub mod lock;
pub mod man_pages;
pub mod new;
pub mod pin;
pub mod platforms;
pub mod presets;
pub mod shell;

use envflake_schema::{
    load_descriptor_file, DescriptorError, ErrorKind, InputName, LockError, ResolvedDescriptor,
    Revision,
};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MALFORMED_DESCRIPTOR: u8 = 2;
pub const EXIT_UNRESOLVED_INPUT: u8 = 3;
pub const EXIT_UNSUPPORTED_PLATFORM: u8 = 4;

pub const DEFAULT_DESCRIPTOR: &str = "envflake.toml";
pub const DEFAULT_LOCK: &str = "envflake.lock";

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

/// Render a loader error with its kind as prefix, so `main` can map it to an
/// exit code.
pub fn descriptor_error(e: &DescriptorError) -> String {
    format!("{}: {e}", e.kind())
}

pub fn lock_error(e: &LockError) -> String {
    match e {
        LockError::Descriptor(inner) => descriptor_error(inner),
        other => format!("lock error: {other}"),
    }
}

/// Map a rendered error message back to its exit code.
pub fn exit_code_for(msg: &str) -> u8 {
    let kinds = [
        (ErrorKind::MalformedDescriptor, EXIT_MALFORMED_DESCRIPTOR),
        (ErrorKind::UnresolvedInput, EXIT_UNRESOLVED_INPUT),
        (ErrorKind::UnsupportedPlatform, EXIT_UNSUPPORTED_PLATFORM),
    ];
    kinds
        .iter()
        .find(|(kind, _)| msg.starts_with(&format!("{kind}:")))
        .map_or(EXIT_FAILURE, |(_, code)| *code)
}

pub fn load(path: &Path) -> Result<ResolvedDescriptor, String> {
    debug!("descriptor path: {}", path.display());
    load_descriptor_file(path).map_err(|e| descriptor_error(&e))
}

/// Lock file that sits next to `descriptor`.
pub fn sibling_lock_path(descriptor: &Path) -> PathBuf {
    match descriptor.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(DEFAULT_LOCK),
        _ => PathBuf::from(DEFAULT_LOCK),
    }
}

/// Parse an `<input>=<rev>` command-line assignment.
pub fn parse_rev_assignment(raw: &str) -> Result<(InputName, Revision), String> {
    let Some((name, rev)) = raw.split_once('=') else {
        return Err(format!("expected <input>=<rev>, got '{raw}'"));
    };
    let (name, rev) = (name.trim(), rev.trim());
    if !InputName::is_valid(name) {
        return Err(format!("invalid input name '{name}'"));
    }
    if !Revision::looks_like_rev(rev) {
        return Err(format!("'{rev}' is not a 40-character hex revision"));
    }
    Ok((InputName::new(name), Revision::new(rev.to_ascii_lowercase())))
}

pub fn write_atomic(dest: &Path, content: &str) -> Result<(), String> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| format!("write temp file: {e}"))?;
    use std::io::Write;
    tmp.write_all(content.as_bytes())
        .map_err(|e| format!("write temp file: {e}"))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| format!("fsync temp file: {e}"))?;
    tmp.persist(dest)
        .map_err(|e| format!("persist {}: {}", dest.display(), e.error))?;
    Ok(())
}

pub fn colorize_pinned(pinned: bool) -> String {
    use console::Style;
    if pinned {
        Style::new().green().apply_to("pinned").to_string()
    } else {
        Style::new().yellow().apply_to("unpinned").to_string()
    }
}
