//! Write-temp-then-rename file replacement
//!
//! Readers either see the previous file or the complete new one, never a
//! partially written file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Replace `path` with whatever `write` produces
///
/// The temp file is created in the destination directory so the final
/// rename stays on one filesystem. If `write` fails the temp file is removed
/// and `path` is untouched.
pub fn write_atomic<F, E>(path: &Path, write: F) -> Result<(), E>
where
    F: FnOnce(&mut BufWriter<&File>) -> Result<(), E>,
    E: From<std::io::Error>,
{
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        write(&mut writer)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| E::from(e.error))?;

    Ok(())
}
