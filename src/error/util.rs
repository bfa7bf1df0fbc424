//! Utility functions for error handling around file access

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{AbsenceError, Result};

/// Open a file for reading, describing what it was needed for on failure
///
/// # Arguments
/// * `path` - The path to the file to open
/// * `purpose` - Why the file is being opened (for error context)
pub fn safe_open_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if !path.is_file() {
        return Err(AbsenceError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} not found (needed for {purpose})", path.display()),
        )));
    }

    fs::File::open(path).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::PermissionDenied => "permission denied".to_string(),
            _ => format!("failed to open for {purpose}"),
        };
        AbsenceError::Io(io::Error::new(
            e.kind(),
            format!("{}: {context}: {e}", path.display()),
        ))
    })
}

/// Create a file for writing, creating missing parent directories first
pub fn safe_create_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    fs::File::create(path).map_err(|e| {
        AbsenceError::Io(io::Error::new(
            e.kind(),
            format!("{}: failed to create for {purpose}: {e}", path.display()),
        ))
    })
}

/// Read a file to a string with the same error context as `safe_open_file`
pub fn safe_read_to_string(path: &Path, purpose: &str) -> Result<String> {
    let mut file = safe_open_file(path, purpose)?;
    let mut content = String::new();
    io::Read::read_to_string(&mut file, &mut content).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::InvalidData => "file is not valid UTF-8".to_string(),
            _ => format!("failed to read content for {purpose}"),
        };
        AbsenceError::Io(io::Error::new(
            e.kind(),
            format!("{}: {context}", path.display()),
        ))
    })?;
    Ok(content)
}
