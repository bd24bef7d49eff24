//! Streaming access to an input data file.
//!
//! [`open_raw_event_data`] reads and resolves the header line, then hands
//! back a [`RowLines`] iterator that owns the open file. Rows are read on
//! demand and the file is closed when the iterator is dropped, whether it
//! was exhausted or abandoned after the first bad row.

use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;

use crate::error::EngineError;
use crate::fs_ops::{FileStore, Folder};
use crate::header::resolve_header;
use crate::model::{FileHandle, HeaderIndexes, BYTE_ORDER_MARK};
use crate::validation::Validation;

/// Resolved header plus the not-yet-read body.
pub struct RawEventData {
    pub header: HeaderIndexes,
    pub rows: RowLines,
}

impl std::fmt::Debug for RawEventData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawEventData")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

/// Single-pass iterator over body lines.
///
/// Yields `(row_number, line)` where `row_number` is the zero-based index
/// of the line within the body (the header is not counted).
pub struct RowLines {
    reader: BufReader<Box<dyn Read + Send>>,
    path: PathBuf,
    to_skip: usize,
    next_row: usize,
    finished: bool,
}

impl RowLines {
    pub fn new(reader: BufReader<Box<dyn Read + Send>>, path: PathBuf, starting_at_row: usize) -> Self {
        RowLines {
            reader,
            path,
            to_skip: starting_at_row,
            next_row: 0,
            finished: false,
        }
    }

    fn read_next(&mut self) -> io::Result<Option<String>> {
        read_line_lossy(&mut self.reader)
    }
}

impl Iterator for RowLines {
    type Item = Result<(usize, String), EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let line = match self.read_next() {
                Ok(Some(line)) => line,
                Ok(None) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(EngineError::ReadError {
                        path: self.path.clone(),
                        source: e,
                    }));
                }
            };

            let row_number = self.next_row;
            self.next_row += 1;

            if self.to_skip > 0 {
                self.to_skip -= 1;
                continue;
            }
            return Some(Ok((row_number, line)));
        }
    }
}

/// Read one `\n` terminated line, dropping the terminator and a trailing
/// `\r`. Invalid UTF-8 is replaced rather than treated as an I/O error.
fn read_line_lossy<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Open `Input/<id>.dat`, resolve its header and prepare the row stream.
///
/// Header problems come back as `Ok(Err(..))` and the file is closed
/// straight away; I/O failures are `Err`.
pub fn open_raw_event_data(
    store: &dyn FileStore,
    file: &FileHandle,
) -> Result<Validation<RawEventData>, EngineError> {
    let name = file.data_file_name();
    let path = store.root().join(Folder::Input.dir_name()).join(&name);
    let mut reader = BufReader::new(store.open_read(Folder::Input, &name)?);

    let header_line = read_line_lossy(&mut reader).map_err(|e| EngineError::ReadError {
        path: path.clone(),
        source: e,
    })?;

    let header_line = header_line
        .as_deref()
        .map(|line| line.strip_prefix(BYTE_ORDER_MARK).unwrap_or(line));

    Ok(resolve_header(header_line).map(|header| RawEventData {
        header,
        rows: RowLines::new(reader, path, file.starting_at_row),
    }))
}
