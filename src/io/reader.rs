use std::{
    fs::File,
    io::{self, prelude::*},
    path::Path,
};

/// Line iterator over a buffered source that remembers the current line
/// number and strips line terminators (`\n` or `\r\n`).
pub struct TextReader<R> {
    reader: R,
    line_number: u64,
}

impl TextReader<io::BufReader<File>> {
    /// `capacity` sizes the underlying `BufReader`.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(io::BufReader::with_capacity(capacity, file)))
    }
}

impl<R: BufRead> TextReader<R> {
    pub fn new(reader: R) -> Self {
        TextReader {
            reader,
            line_number: 0,
        }
    }

    /// Number of the line returned by the last call to `next` (1-based).
    pub fn line_number(&self) -> u64 {
        self.line_number
    }
}

impl<R: BufRead> Iterator for TextReader<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = String::new();
        match self.reader.read_line(&mut buf) {
            Ok(0) => None,
            Ok(_) => {
                self.line_number += 1;
                if buf.ends_with('\n') {
                    buf.pop();
                    if buf.ends_with('\r') {
                        buf.pop();
                    }
                }
                Some(Ok(buf))
            }
            Err(err) => Some(Err(err)),
        }
    }
}
