//! # converter-locate
//!
//! Find the external programs and libraries that `ofd2docx` delegates its
//! Stage-2 conversions to:
//!
//! * the LibreOffice `soffice` executable, used by the external-tool mode;
//! * the PDFium shared library, used by the in-process modes;
//! * any other executable by name or path ([`locate_program`]), used for the
//!   OFD → PDF tool.
//!
//! Neither is downloaded or installed here. Lookup is a fixed search order so
//! that a missing converter is reported once, before any work starts.
//!
//! ## LibreOffice search order
//!
//! 1. An explicit path passed by the caller (e.g. the `--soffice` flag).
//! 2. `OFD2DOCX_SOFFICE` environment variable.
//! 3. Well-known installation paths for the current platform.
//! 4. `soffice` / `libreoffice` on `PATH`.
//!
//! Steps 1 and 2 are authoritative: if an override is set but the file does
//! not exist the lookup fails rather than silently falling back.
//!
//! ## PDFium search order
//!
//! 1. Explicit path, then `PDFIUM_LIB_PATH`.
//! 2. The platform library in the current working directory.
//! 3. The system library search path.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use converter_locate::{bind_pdfium, locate_soffice};
//!
//! let soffice = locate_soffice(None).expect("LibreOffice not installed");
//! let pdfium = bind_pdfium(None).expect("PDFium unavailable");
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use pdfium_render::prelude::Pdfium;
use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Environment variable overriding the LibreOffice executable.
pub const SOFFICE_ENV: &str = "OFD2DOCX_SOFFICE";

/// Environment variable overriding the PDFium shared library.
pub const PDFIUM_ENV: &str = "PDFIUM_LIB_PATH";

/// Executable names searched for on `PATH`, in order.
#[cfg(windows)]
const SOFFICE_NAMES: &[&str] = &["soffice.exe", "soffice.com"];
#[cfg(not(windows))]
const SOFFICE_NAMES: &[&str] = &["soffice", "libreoffice"];

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by converter-locate operations.
#[derive(Error, Debug)]
pub enum LocateError {
    /// No candidate location held the tool.
    #[error("{tool} not found (searched {} location(s))", searched.len())]
    NotFound { tool: String, searched: Vec<PathBuf> },

    /// An explicit override points at a file that does not exist.
    #[error("{tool} override '{path}' from {origin} does not exist")]
    OverrideMissing {
        tool: String,
        origin: String,
        path: PathBuf,
    },

    /// `pdfium-render` could not load the library.
    #[error("Failed to bind PDFium from '{path}': {reason}")]
    Bind { path: PathBuf, reason: String },
}

// ── Internal: platform metadata ──────────────────────────────────────────────

/// File name of the PDFium shared library on this platform.
pub fn pdfium_library_name() -> &'static str {
    match std::env::consts::OS {
        "macos" | "ios" => "libpdfium.dylib",
        "windows" => "pdfium.dll",
        _ => "libpdfium.so",
    }
}

/// Well-known LibreOffice installation paths for the current platform.
///
/// Order matters: the first existing path wins.
pub fn well_known_soffice_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    match std::env::consts::OS {
        "windows" => {
            paths.push(PathBuf::from(
                r"C:\Program Files\LibreOffice\program\soffice.exe",
            ));
            paths.push(PathBuf::from(
                r"C:\Program Files (x86)\LibreOffice\program\soffice.exe",
            ));
            paths.push(PathBuf::from(r"D:\LibreOffice\program\soffice.exe"));
        }
        "macos" => {
            paths.push(PathBuf::from(
                "/Applications/LibreOffice.app/Contents/MacOS/soffice",
            ));
            if let Some(home) = dirs::home_dir() {
                paths.push(home.join("Applications/LibreOffice.app/Contents/MacOS/soffice"));
            }
        }
        _ => {
            paths.push(PathBuf::from("/usr/lib/libreoffice/program/soffice"));
            paths.push(PathBuf::from("/opt/libreoffice/program/soffice"));
            paths.push(PathBuf::from("/snap/bin/libreoffice"));
            if let Some(bin) = dirs::executable_dir() {
                paths.push(bin.join("soffice"));
            }
        }
    }

    paths
}

// ── Thread-safe singleton path cache ─────────────────────────────────────────

static SOFFICE_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Resolve the LibreOffice executable.
///
/// The first successful automatic lookup is cached for the process lifetime;
/// an explicit path always bypasses the cache.
pub fn locate_soffice(explicit: Option<&Path>) -> Result<PathBuf, LocateError> {
    if explicit.is_none() {
        if let Some(path) = SOFFICE_PATH.get() {
            return Ok(path.clone());
        }
    }

    let env_override = std::env::var_os(SOFFICE_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);

    let path = locate_soffice_in(
        explicit,
        env_override.as_deref(),
        &well_known_soffice_paths(),
        std::env::var_os("PATH"),
    )?;

    if explicit.is_none() {
        let _ = SOFFICE_PATH.set(path.clone());
    }
    Ok(path)
}

/// Lookup with every input passed in, so it can be exercised without touching
/// the process environment.
pub fn locate_soffice_in(
    explicit: Option<&Path>,
    env_override: Option<&Path>,
    candidates: &[PathBuf],
    path_var: Option<OsString>,
) -> Result<PathBuf, LocateError> {
    if let Some(p) = explicit {
        return existing_override("LibreOffice", "command line", p);
    }
    if let Some(p) = env_override {
        return existing_override("LibreOffice", SOFFICE_ENV, p);
    }

    let mut searched: Vec<PathBuf> = Vec::new();

    for candidate in candidates {
        if candidate.is_file() {
            return Ok(candidate.clone());
        }
        searched.push(candidate.clone());
    }

    if let Some(path_var) = path_var {
        for dir in std::env::split_paths(&path_var) {
            for name in SOFFICE_NAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Ok(candidate);
                }
                searched.push(candidate);
            }
        }
    }

    Err(LocateError::NotFound {
        tool: "LibreOffice (soffice)".to_string(),
        searched,
    })
}

/// Resolve an arbitrary executable.
///
/// A `program` containing a path separator is taken as a path and must
/// exist; a bare name is looked up on `PATH` (with `.exe` appended on
/// Windows when missing).
pub fn locate_program(program: &str) -> Result<PathBuf, LocateError> {
    locate_program_in(program, std::env::var_os("PATH"))
}

pub fn locate_program_in(program: &str, path_var: Option<OsString>) -> Result<PathBuf, LocateError> {
    let as_path = Path::new(program);
    if as_path.components().count() > 1 || as_path.is_absolute() {
        return existing_override(program, "configuration", as_path);
    }

    let mut names = vec![program.to_string()];
    if cfg!(windows) && as_path.extension().is_none() {
        names.push(format!("{program}.exe"));
    }

    let mut searched = Vec::new();
    if let Some(path_var) = path_var {
        for dir in std::env::split_paths(&path_var) {
            for name in &names {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Ok(candidate);
                }
                searched.push(candidate);
            }
        }
    }

    Err(LocateError::NotFound {
        tool: program.to_string(),
        searched,
    })
}

/// Resolve the on-disk PDFium library, or `None` to fall back to the system
/// search path.
pub fn pdfium_library_path(explicit: Option<&Path>) -> Result<Option<PathBuf>, LocateError> {
    if let Some(p) = explicit {
        return existing_override("PDFium", "command line", p).map(Some);
    }
    if let Some(p) = std::env::var_os(PDFIUM_ENV).filter(|v| !v.is_empty()) {
        return existing_override("PDFium", PDFIUM_ENV, Path::new(&p)).map(Some);
    }

    let local = PathBuf::from(".").join(pdfium_library_name());
    if local.is_file() {
        return Ok(Some(local));
    }

    Ok(None)
}

/// Bind to PDFium using the search order above.
pub fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, LocateError> {
    match pdfium_library_path(explicit)? {
        Some(path) => bind_pdfium_from_path(&path),
        None => Pdfium::bind_to_system_library()
            .map(Pdfium::new)
            .map_err(|e| LocateError::Bind {
                path: PathBuf::from(pdfium_library_name()),
                reason: format!("{e:?}"),
            }),
    }
}

/// Binds to a PDFium library at an explicit `path`.
pub fn bind_pdfium_from_path(path: &Path) -> Result<Pdfium, LocateError> {
    Pdfium::bind_to_library(path)
        .map(Pdfium::new)
        .map_err(|e| LocateError::Bind {
            path: path.to_path_buf(),
            reason: format!("{e:?}"),
        })
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn existing_override(tool: &str, origin: &str, path: &Path) -> Result<PathBuf, LocateError> {
    if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(LocateError::OverrideMissing {
            tool: tool.to_string(),
            origin: origin.to_string(),
            path: path.to_path_buf(),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
