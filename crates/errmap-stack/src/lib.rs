// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stack-trace capture and cleaning for errmap errors.
//!
//! A trace is captured with [`std::backtrace::Backtrace`] when an error is
//! constructed and then cleaned: frames belonging to the Rust runtime, the
//! process start-up code and errmap's own capture machinery are dropped, and
//! each remaining frame is rendered on a single `at symbol (location)` line.
//!
//! ```
//! use errmap_stack::{CaptureMode, StackOptions, clean_stack};
//!
//! let raw = "   0: std::rt::lang_start\n   1: app::main\n             at ./src/main.rs:4:5\n";
//! let opts = StackOptions::default().with_capture(CaptureMode::Off);
//! assert_eq!(clean_stack(raw, &opts), "    at app::main (./src/main.rs:4:5)");
//! ```
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// When a backtrace is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Always capture, regardless of `RUST_BACKTRACE`.
    #[default]
    Force,
    /// Capture only when `RUST_BACKTRACE` / `RUST_LIB_BACKTRACE` enable it.
    Env,
    /// Never capture; traces consist of the header line only.
    Off,
}

impl std::str::FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "force" => Ok(Self::Force),
            "env" => Ok(Self::Env),
            "off" => Ok(Self::Off),
            other => Err(format!("unknown capture mode '{other}'")),
        }
    }
}

/// How traces are captured and cleaned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StackOptions {
    /// Capture policy.
    #[serde(default)]
    pub capture: CaptureMode,
    /// Replace the home directory with `~` in frame locations.
    #[serde(default = "default_pretty")]
    pub pretty: bool,
    /// Path prefix stripped from frame locations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<PathBuf>,
    /// Extra symbol prefixes whose frames are dropped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hidden: Vec<String>,
}

fn default_pretty() -> bool {
    true
}

impl Default for StackOptions {
    fn default() -> Self {
        Self {
            capture: CaptureMode::Force,
            pretty: true,
            base_path: None,
            hidden: Vec::new(),
        }
    }
}

impl StackOptions {
    /// Set the capture policy.
    pub fn with_capture(mut self, capture: CaptureMode) -> Self {
        self.capture = capture;
        self
    }

    /// Toggle home-directory shortening.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Strip `base` from the front of every frame location.
    pub fn with_base_path(mut self, base: impl Into<PathBuf>) -> Self {
        self.base_path = Some(base.into());
        self
    }

    /// Drop frames whose symbol starts with `prefix`.
    pub fn hide(mut self, prefix: impl Into<String>) -> Self {
        self.hidden.push(prefix.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// One symbol of a parsed backtrace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Demangled symbol name, without the trailing hash.
    pub symbol: String,
    /// `file:line:col`, when debug info was available.
    pub location: Option<String>,
}

/// Symbol prefixes of runtime, allocator and start-up frames.
const RUNTIME_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "backtrace::",
    "test::",
    "errmap_stack::",
    "__rust_",
    "rust_begin_unwind",
    "__libc_start",
    "__scrt_common_main",
    "BaseThreadInitThunk",
    "RtlUserThreadStart",
];

/// Platform start-up symbols matched exactly.
const STARTUP_SYMBOLS: &[&str] = &["_start", "start_thread", "clone", "clone3", "thread_start"];

/// Parse the text produced by `Display` for a std [`Backtrace`].
///
/// Status lines such as `disabled backtrace` yield no frames.
pub fn parse_frames(raw: &str) -> Vec<Frame> {
    let mut frames: Vec<Frame> = Vec::new();
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(loc) = trimmed.strip_prefix("at ") {
            if let Some(last) = frames.last_mut()
                && last.location.is_none()
            {
                last.location = Some(loc.trim().to_string());
            }
            continue;
        }
        let symbol = match split_frame_index(trimmed) {
            Some(sym) => sym,
            // Inlined symbols share their frame's index and are printed
            // indented without one.
            None if line.starts_with(char::is_whitespace) => trimmed,
            None => continue,
        };
        frames.push(Frame {
            symbol: strip_symbol_hash(symbol).to_string(),
            location: None,
        });
    }
    frames
}

fn split_frame_index(line: &str) -> Option<&str> {
    let (idx, rest) = line.split_once(": ")?;
    if idx.is_empty() || !idx.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(rest.trim())
}

fn strip_symbol_hash(symbol: &str) -> &str {
    match symbol.rsplit_once("::h") {
        Some((head, hash)) if hash.len() == 16 && hash.bytes().all(|b| b.is_ascii_hexdigit()) => {
            head
        }
        _ => symbol,
    }
}

fn is_hidden(symbol: &str, extra: &[String], skip: &[&str]) -> bool {
    if STARTUP_SYMBOLS.contains(&symbol) {
        return true;
    }
    let matches = |s: &str| {
        RUNTIME_PREFIXES.iter().any(|p| s.starts_with(p))
            || skip.iter().any(|p| s.starts_with(p))
            || extra.iter().any(|p| s.starts_with(p.as_str()))
    };
    let Some(inner) = symbol.strip_prefix('<') else {
        return matches(symbol);
    };
    if matches(inner) {
        return true;
    }
    // `<F as core::ops::FnOnce<()>>::call_once`: a generic self type, so the
    // trait path decides.
    match inner.split_once(" as ") {
        Some((self_ty, trait_path)) if !self_ty.contains("::") => matches(trait_path),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Cleaning
// ---------------------------------------------------------------------------

/// Clean a raw backtrace into one `    at symbol (location)` line per frame.
pub fn clean_stack(raw: &str, opts: &StackOptions) -> String {
    clean_with(raw, opts, &[], home_dir().as_deref())
}

fn clean_with(raw: &str, opts: &StackOptions, skip: &[&str], home: Option<&Path>) -> String {
    parse_frames(raw)
        .into_iter()
        .filter(|f| !is_hidden(&f.symbol, &opts.hidden, skip))
        .map(|f| match f.location {
            Some(loc) => format!("    at {} ({})", f.symbol, shorten(&loc, opts, home)),
            None => format!("    at {}", f.symbol),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn shorten(location: &str, opts: &StackOptions, home: Option<&Path>) -> String {
    if let Some(base) = opts.base_path.as_deref().and_then(Path::to_str)
        && let Some(rest) = strip_dir(location, base)
    {
        return rest.trim_start_matches(['/', '\\']).to_string();
    }
    if opts.pretty
        && let Some(home) = home.and_then(Path::to_str)
        && let Some(rest) = strip_dir(location, home)
    {
        return format!("~{rest}");
    }
    location.to_string()
}

/// Strip `dir` from the front of `location` when it matches whole path
/// components: `/srv/app` strips `/srv/app/src` but not `/srv/app2/src`.
fn strip_dir<'l>(location: &'l str, dir: &str) -> Option<&'l str> {
    let dir = dir.trim_end_matches(['/', '\\']);
    if dir.is_empty() {
        return None;
    }
    let rest = location.strip_prefix(dir)?;
    if rest.is_empty() || rest.starts_with(['/', '\\']) {
        Some(rest)
    } else {
        None
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

/// Capture the current backtrace as raw text.
///
/// Returns an empty string when capture is off or unsupported.
pub fn capture_raw(mode: CaptureMode) -> String {
    let bt = match mode {
        CaptureMode::Force => Backtrace::force_capture(),
        CaptureMode::Env => Backtrace::capture(),
        CaptureMode::Off => return String::new(),
    };
    match bt.status() {
        BacktraceStatus::Captured => bt.to_string(),
        _ => String::new(),
    }
}

/// Capture, clean and prefix a trace with `header`.
pub fn render(header: &str, opts: &StackOptions) -> String {
    render_skipping(header, opts, &[])
}

/// Like [`render`], additionally dropping frames whose symbol starts with
/// any of `skip`. Used by callers to hide their own construction frames.
pub fn render_skipping(header: &str, opts: &StackOptions, skip: &[&str]) -> String {
    let raw = capture_raw(opts.capture);
    let frames = clean_with(&raw, opts, skip, home_dir().as_deref());
    if frames.is_empty() {
        header.to_string()
    } else {
        format!("{header}\n{frames}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
