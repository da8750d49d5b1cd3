//! word2vec binary format.
//!
//! Layout:
//!
//! - header: ASCII `count dim\n`
//! - entries (repeated `count` times):
//!   - token bytes terminated by a single space (leading `\n` is skipped)
//!   - embedding: `[f32; dim]` little-endian

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::Path;

use super::{parse_header_fields, FormatError, LoadedSpace, SpaceBuilder};

/// Longest token accepted before the file is considered corrupt.
const MAX_TOKEN_BYTES: usize = 4096;

/// Longest header line accepted.
const MAX_HEADER_BYTES: usize = 256;

pub fn read_word2vec_bin(name: String, path: &Path) -> Result<LoadedSpace, FormatError> {
    let file = File::open(path)?;
    read_word2vec_bin_from(name, BufReader::new(file))
}

pub(super) fn read_word2vec_bin_from<R: BufRead>(
    name: String,
    mut reader: R,
) -> Result<LoadedSpace, FormatError> {
    let (count, dimension) = read_header(&mut reader)?;
    let mut builder = SpaceBuilder::new(Some(dimension), count);

    let mut token_buf = Vec::new();
    let value_bytes = dimension
        .checked_mul(std::mem::size_of::<f32>())
        .ok_or_else(|| FormatError::InvalidHeader(format!("dimension too large: {dimension}")))?;
    let mut value_buf = vec![0u8; value_bytes];

    for entry in 1..=count {
        read_token(&mut reader, &mut token_buf, entry - 1)?;

        reader
            .read_exact(&mut value_buf)
            .map_err(|err| truncated_or_io(err, entry - 1))?;

        let values: Vec<f32> = value_buf
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        match String::from_utf8(token_buf.clone()) {
            Ok(token) => builder.push(entry, token, values),
            Err(_) => builder.reject(entry, "invalid utf-8 token"),
        }
    }

    builder.finish(name)
}

fn read_header<R: BufRead>(reader: &mut R) -> Result<(usize, usize), FormatError> {
    let mut line = Vec::new();
    reader
        .take(MAX_HEADER_BYTES as u64)
        .read_until(b'\n', &mut line)?;

    let line = std::str::from_utf8(&line)
        .map_err(|_| FormatError::InvalidHeader("header is not utf-8".to_string()))?;
    let fields: Vec<&str> = line.split_whitespace().collect();

    match fields.as_slice() {
        [count, dimension] => parse_header_fields(count, dimension),
        _ => Err(FormatError::InvalidHeader(format!("{line:?}"))),
    }
}

/// Read one space-terminated token into `buf`, skipping leading newlines.
fn read_token<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    entries_read: usize,
) -> Result<(), FormatError> {
    buf.clear();
    let mut byte = [0u8; 1];
    loop {
        reader
            .read_exact(&mut byte)
            .map_err(|err| truncated_or_io(err, entries_read))?;
        match byte[0] {
            b' ' => return Ok(()),
            b'\n' if buf.is_empty() => continue,
            b => buf.push(b),
        }
        if buf.len() > MAX_TOKEN_BYTES {
            return Err(FormatError::Malformed(format!(
                "token longer than {MAX_TOKEN_BYTES} bytes at entry {}",
                entries_read + 1
            )));
        }
    }
}

fn truncated_or_io(err: std::io::Error, entries_read: usize) -> FormatError {
    if err.kind() == ErrorKind::UnexpectedEof {
        FormatError::Truncated(entries_read)
    } else {
        FormatError::Io(err)
    }
}
