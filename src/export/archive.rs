// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! ZIP packaging of a staging directory.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::ExportResult;

/// Suffix of an archive that is still being written.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Path of the in-progress file for `archive`.
pub fn partial_path(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Compress every file under `source` into `destination`.
///
/// Entry names are relative to `source` with `/` separators. The archive is
/// written next to `destination` and renamed into place once complete, so the
/// final path never holds a truncated file. Returns the number of entries.
pub fn write_archive(source: &Path, destination: &Path) -> ExportResult<usize> {
    let partial = partial_path(destination);
    let result = write_entries(source, &partial);
    match result {
        Ok(count) => {
            std::fs::rename(&partial, destination)?;
            debug!(path = %destination.display(), entries = count, "Export archive written");
            Ok(count)
        }
        Err(e) => {
            let _ = std::fs::remove_file(&partial);
            Err(e)
        }
    }
}

fn write_entries(source: &Path, partial: &Path) -> ExportResult<usize> {
    let file = File::create(partial)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut count = 0;
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        zip.start_file(name, options)?;
        let mut input = File::open(entry.path())?;
        io::copy(&mut input, &mut zip)?;
        count += 1;
    }

    let mut writer = zip.finish()?;
    io::Write::flush(&mut writer)?;
    writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    Ok(count)
}
