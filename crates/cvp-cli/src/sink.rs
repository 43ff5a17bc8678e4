// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::error::PipelineError;
use cvp_detect::SpikeEvent;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Output paths for `num_shards` shards of `base`.
///
/// Zero shards means a single file at `base`; otherwise each shard is named
/// `<base>-SSSSS-of-NNNNN`.
pub fn shard_paths(base: &Path, num_shards: usize) -> Result<Vec<PathBuf>, PipelineError> {
    if num_shards == 0 {
        return Ok(vec![base.to_path_buf()]);
    }

    let name = base
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            PipelineError::invalid_input(format!(
                "spikes_output_file must end in a UTF-8 file name; got '{}'",
                base.display()
            ))
        })?;

    Ok((0..num_shards)
        .map(|shard| base.with_file_name(format!("{name}-{shard:05}-of-{num_shards:05}")))
        .collect())
}

/// Encodes one event as a JSON line, including the trailing newline.
pub fn encode_line(event: &SpikeEvent) -> Result<Vec<u8>, PipelineError> {
    let mut line = serde_json::to_vec(event)
        .map_err(|source| PipelineError::json("failed to serialize spike event", source))?;
    line.push(b'\n');
    Ok(line)
}

/// Writes events as newline-delimited JSON, dealing them round-robin across
/// shards in iteration order. Every shard file is created, even when empty.
pub fn write_spikes<'a, I>(
    base: &Path,
    num_shards: usize,
    events: I,
) -> Result<Vec<PathBuf>, PipelineError>
where
    I: IntoIterator<Item = &'a SpikeEvent>,
{
    let paths = shard_paths(base, num_shards)?;

    if let Some(parent) = base.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| {
            PipelineError::io(
                format!("failed to create output directory '{}'", parent.display()),
                source,
            )
        })?;
    }

    let mut writers = paths
        .iter()
        .map(|path| {
            File::create(path).map(BufWriter::new).map_err(|source| {
                PipelineError::io(format!("failed to create '{}'", path.display()), source)
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let shard_count = writers.len();
    for (idx, event) in events.into_iter().enumerate() {
        let shard = idx % shard_count;
        let line = encode_line(event)?;
        writers[shard].write_all(&line).map_err(|source| {
            PipelineError::io(format!("failed to write '{}'", paths[shard].display()), source)
        })?;
    }

    for (writer, path) in writers.iter_mut().zip(&paths) {
        writer.flush().map_err(|source| {
            PipelineError::io(format!("failed to write '{}'", path.display()), source)
        })?;
    }

    Ok(paths)
}
