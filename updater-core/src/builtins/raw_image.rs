//! `write_raw_image`: flash an image file or blob to an MTD partition.

use crate::args::read_value_args;
use crate::errors::Abort;
use crate::expr::Expr;
use crate::state::ExecutionState;
use crate::value::Value;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use updater_hal::procfs::mtd::find_by_name;
use updater_hal::{MtdWriter, SystemHal};

enum Contents<'v> {
    File(&'v Path),
    Bytes(&'v [u8]),
}

fn write_chunk(writer: &mut dyn MtdWriter, data: &[u8], partition: &str) -> bool {
    match writer.write_data(data) {
        Ok(written) if written == data.len() => true,
        Ok(written) => {
            log::error!(
                "mtd write to {} failed: wrote {} of {} bytes",
                partition,
                written,
                data.len()
            );
            false
        }
        Err(e) => {
            log::error!("mtd write to {} failed: {}", partition, e);
            false
        }
    }
}

/// Copy `file` to `writer` in `chunk_size` reads. A short write marks failure
/// but the rest of the file is still written.
fn stream(
    writer: &mut dyn MtdWriter,
    mut file: File,
    chunk_size: usize,
    partition: &str,
) -> bool {
    let mut buf = vec![0u8; chunk_size];
    let mut success = true;
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::error!("read of image for {} failed: {}", partition, e);
                success = false;
                break;
            }
        };
        success &= write_chunk(writer, &buf[..n], partition);
    }
    success
}

fn write_partition(
    hal: &dyn SystemHal,
    name: &str,
    partition_name: &str,
    contents: Contents<'_>,
    chunk_size: usize,
) -> bool {
    let partitions = match hal.scan_mtd_partitions() {
        Ok(partitions) => partitions,
        Err(e) => {
            log::error!("{}: failed to scan mtd partitions: {}", name, e);
            return false;
        }
    };
    let Some(partition) = find_by_name(partition_name, &partitions) else {
        log::error!("{}: no mtd partition named \"{}\"", name, partition_name);
        return false;
    };
    let mut writer = match hal.open_mtd_writer(partition) {
        Ok(writer) => writer,
        Err(e) => {
            log::error!("{}: can't write mtd partition \"{}\": {}", name, partition_name, e);
            return false;
        }
    };

    let mut success = match contents {
        Contents::File(path) => match File::open(path) {
            Ok(file) => stream(writer.as_mut(), file, chunk_size, partition_name),
            Err(e) => {
                log::error!("{}: can't open {}: {}", name, path.display(), e);
                if let Err(e) = writer.close() {
                    log::warn!("{}: close of {} failed: {}", name, partition_name, e);
                }
                return false;
            }
        },
        Contents::Bytes(data) => write_chunk(writer.as_mut(), data, partition_name),
    };

    if let Err(e) = writer.erase_remaining() {
        log::error!("{}: error erasing blocks of {}: {}", name, partition_name, e);
        success = false;
    }
    if let Err(e) = writer.close() {
        log::error!("{}: error closing write of {}: {}", name, partition_name, e);
        success = false;
    }
    success
}

/// write_raw_image(file_or_blob, partition)
pub fn write_raw_image_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let [contents, partition] = read_value_args::<2>(name, state, argv)?;

    let Value::String(partition) = partition else {
        return Err(state.error_abort(format!(
            "partition argument to {} must be string",
            name
        )));
    };
    if partition.is_empty() {
        return Err(state.error_abort(format!(
            "partition argument to {} can't be empty",
            name
        )));
    }
    let contents = match &contents {
        Value::String(path) if path.is_empty() => {
            return Err(state.error_abort(format!("file argument to {} can't be empty", name)));
        }
        Value::String(path) => Contents::File(Path::new(path)),
        Value::Blob(data) => Contents::Bytes(data),
        Value::Absent(_) => {
            log::error!("{}: no image data for {}", name, partition);
            return Ok(Value::empty());
        }
    };

    let chunk_size = state.config().write_chunk_size;
    if write_partition(state.hal(), name, &partition, contents, chunk_size) {
        log::info!("{}: wrote {} partition", name, partition);
        Ok(Value::string(partition))
    } else {
        log::error!("{}: failed to write {} partition", name, partition);
        Ok(Value::empty())
    }
}
