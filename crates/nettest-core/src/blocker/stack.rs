//! Call stack capture and package-based allowlisting.

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// One resolved frame of a call stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackFrame {
    pub symbol: Option<String>,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
}

impl StackFrame {
    pub fn new(symbol: impl Into<String>, file: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            symbol: Some(symbol.into()),
            file: Some(file.into()),
            line: Some(line),
        }
    }

    /// Crate the symbol belongs to, e.g. `redis` for `<redis::Client as ..>::open`.
    pub fn crate_name(&self) -> Option<&str> {
        let symbol = self.symbol.as_deref()?.trim_start_matches('<');
        symbol.split("::").next().filter(|name| !name.is_empty())
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  {}", self.symbol.as_deref().unwrap_or("<unknown>"))?;
        match (&self.file, self.line) {
            (Some(file), Some(line)) => writeln!(f, "        at {}:{}", file.display(), line),
            (Some(file), None) => writeln!(f, "        at {}", file.display()),
            _ => Ok(()),
        }
    }
}

/// Capture the current call stack, innermost frame first.
///
/// Frames of this crate and of the unwinder are left out.
pub fn capture_stack() -> Vec<StackFrame> {
    let backtrace = backtrace::Backtrace::new();
    backtrace
        .frames()
        .iter()
        .flat_map(|frame| frame.symbols())
        .map(|symbol| StackFrame {
            symbol: symbol.name().map(|name| format!("{:#}", name)),
            file: symbol.filename().map(Path::to_path_buf),
            line: symbol.lineno(),
        })
        .filter(|frame| !matches!(frame.crate_name(), Some("nettest_core" | "backtrace")))
        .collect()
}

/// True if `frame` is code of `package`.
///
/// The file path must contain a segment that is the package name itself or the
/// `<name>-<version>` directory cargo unpacks registry crates into. Frames without
/// a file fall back to the crate prefix of the symbol.
pub fn frame_in_package(frame: &StackFrame, package: &str) -> bool {
    let in_path = frame.file.as_deref().is_some_and(|file| {
        file.components().any(|component| match component {
            Component::Normal(segment) => segment
                .to_str()
                .is_some_and(|segment| is_package_dir(segment, package)),
            _ => false,
        })
    });
    if in_path {
        return true;
    }

    let crate_name = package.replace('-', "_");
    frame.crate_name() == Some(crate_name.as_str())
}

fn is_package_dir(segment: &str, package: &str) -> bool {
    match segment.strip_prefix(package) {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix('-')
            .is_some_and(|version| version.starts_with(|c: char| c.is_ascii_digit())),
        None => false,
    }
}

/// Whether a stack may open sockets given the allowed packages.
pub fn stack_allowed<S: AsRef<str>>(stack: &[StackFrame], allowed_packages: &[S]) -> bool {
    stack.iter().any(|frame| {
        allowed_packages
            .iter()
            .any(|package| frame_in_package(frame, package.as_ref()))
    })
}

const LIBRARY_CRATES: &[&str] = &["std", "core", "alloc", "backtrace", "nettest_core"];

/// Toolchain, registry or otherwise unlocatable frame.
pub fn is_library_frame(frame: &StackFrame) -> bool {
    let Some(file) = frame.file.as_deref() else {
        return true;
    };
    let path = file.to_string_lossy();
    if path.starts_with("/rustc/") || path.contains(".cargo/registry") || path.contains(".cargo/git") {
        return true;
    }
    frame
        .crate_name()
        .is_some_and(|name| LIBRARY_CRATES.contains(&name))
}

/// Keep only the frames of application code.
pub fn filter_stack(stack: &[StackFrame]) -> Vec<StackFrame> {
    stack
        .iter()
        .filter(|frame| !is_library_frame(frame))
        .cloned()
        .collect()
}
