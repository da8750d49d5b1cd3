//! Whitespace-separated text embeddings (word2vec text / GloVe).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{parse_header_fields, FormatError, LoadedSpace, SpaceBuilder};

/// Read a text embedding file.
///
/// A first line made of exactly two unsigned integers is a `count dim`
/// header. Without it the dimension comes from the first valid entry.
pub fn read_text(name: String, path: &Path) -> Result<LoadedSpace, FormatError> {
    let file = File::open(path)?;
    read_text_from(name, BufReader::new(file))
}

pub(super) fn read_text_from<R: BufRead>(
    name: String,
    mut reader: R,
) -> Result<LoadedSpace, FormatError> {
    let mut builder: Option<SpaceBuilder> = None;
    let mut buf = Vec::new();
    let mut line_no = 0usize;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(_) => {
                builder
                    .get_or_insert_with(|| SpaceBuilder::new(None, 0))
                    .reject(line_no, "invalid utf-8");
                continue;
            }
        };

        let mut fields = line.split_whitespace();
        let Some(token) = fields.next() else {
            continue;
        };

        let builder = match builder.as_mut() {
            Some(builder) => builder,
            None => {
                let rest: Vec<&str> = fields.clone().collect();
                let header = parse_header(token, &rest)?;
                match header {
                    Some((count, dimension)) => {
                        log::debug!("{name}: header declares {count} entries of dimension {dimension}");
                        builder = Some(SpaceBuilder::new(Some(dimension), count));
                        continue;
                    }
                    None => builder.insert(SpaceBuilder::new(None, 0)),
                }
            }
        };

        let values: Result<Vec<f32>, _> = fields.map(str::parse::<f32>).collect();
        match values {
            Ok(values) => builder.push(line_no, token.to_string(), values),
            Err(err) => builder.reject(line_no, format!("bad value for {token:?}: {err}")),
        }
    }

    builder.ok_or(FormatError::NoEntries)?.finish(name)
}

/// `Some((count, dim))` when the first line is a word2vec header.
fn parse_header(first: &str, rest: &[&str]) -> Result<Option<(usize, usize)>, FormatError> {
    if rest.len() != 1 {
        return Ok(None);
    }
    // two integers, an entry has a float or a word in one of these spots
    let is_integer = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !is_integer(first) || !is_integer(rest[0]) {
        return Ok(None);
    }
    parse_header_fields(first, rest[0]).map(Some)
}
