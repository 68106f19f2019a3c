use std::io::{self, Read};

/// Result of trying to cut one line out of the buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineSlice {
    /// A complete line, terminator and trailing `\r` removed
    Line(String),
    /// More than the allowed number of bytes arrived without a terminator.
    /// The bytes are dropped from the buffer and handed back lossily decoded;
    /// whatever follows of the same line is dropped as it arrives.
    Overflow(String),
    /// No terminator yet
    Incomplete,
}

/// A growable read buffer that hands out `\n`-terminated lines
pub struct LineBuffer {
    data: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
    /// Set while the tail of an over-long line is still being thrown away
    discarding: bool,
}

impl LineBuffer {
    /// Create a new buffer with the specified capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity.max(1)],
            read_pos: 0,
            write_pos: 0,
            discarding: false,
        }
    }

    /// Read data from a reader into the buffer
    pub fn read_from<R: Read>(&mut self, reader: &mut R) -> io::Result<usize> {
        // Ensure we have space
        self.ensure_capacity(1024);

        let bytes_read = reader.read(&mut self.data[self.write_pos..])?;
        self.write_pos += bytes_read;

        Ok(bytes_read)
    }

    /// Append bytes directly
    pub fn extend(&mut self, bytes: &[u8]) {
        self.ensure_capacity(bytes.len());
        self.data[self.write_pos..self.write_pos + bytes.len()].copy_from_slice(bytes);
        self.write_pos += bytes.len();
    }

    /// Take the next line out of the buffer, if one is complete
    pub fn take_line(&mut self, max_len: usize) -> LineSlice {
        if self.discarding && !self.skip_overflow_tail() {
            return LineSlice::Incomplete;
        }

        let pending = &self.data[self.read_pos..self.write_pos];

        match pending.iter().position(|&b| b == b'\n') {
            Some(idx) if idx <= max_len => {
                let mut line = &pending[..idx];
                if line.last() == Some(&b'\r') {
                    line = &line[..line.len() - 1];
                }
                let line = String::from_utf8_lossy(line).into_owned();
                self.advance(idx + 1);
                LineSlice::Line(line)
            }
            Some(idx) => {
                let dropped = String::from_utf8_lossy(&pending[..idx]).into_owned();
                self.advance(idx + 1);
                LineSlice::Overflow(dropped)
            }
            None if pending.len() > max_len => {
                let dropped = String::from_utf8_lossy(pending).into_owned();
                self.rewind();
                self.discarding = true;
                LineSlice::Overflow(dropped)
            }
            None => LineSlice::Incomplete,
        }
    }

    /// Ensure the buffer has at least the specified additional capacity
    pub fn ensure_capacity(&mut self, additional: usize) {
        if self.remaining_capacity() >= additional {
            return;
        }

        // Compact the buffer if possible
        if self.read_pos > 0 {
            self.data.copy_within(self.read_pos..self.write_pos, 0);
            self.write_pos -= self.read_pos;
            self.read_pos = 0;
        }

        if self.remaining_capacity() < additional {
            let new_capacity = (self.data.len() + additional).max(self.data.len() * 2);
            self.data.resize(new_capacity, 0);
        }
    }

    /// Reset the buffer, clearing all data
    pub fn reset(&mut self) {
        self.rewind();
        self.discarding = false;
    }

    /// Whether bytes are being dropped up to the next line terminator
    pub fn is_discarding(&self) -> bool {
        self.discarding
    }

    /// Get the amount of data available to read
    pub fn available_data(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Get the remaining capacity in the buffer
    pub fn remaining_capacity(&self) -> usize {
        self.data.len() - self.write_pos
    }

    /// Get a slice of the buffered, not yet consumed data
    pub fn slice(&self) -> &[u8] {
        &self.data[self.read_pos..self.write_pos]
    }

    /// Drop the rest of an over-long line. Returns `true` once its terminator was seen.
    fn skip_overflow_tail(&mut self) -> bool {
        let pending = &self.data[self.read_pos..self.write_pos];
        match pending.iter().position(|&b| b == b'\n') {
            Some(idx) => {
                self.advance(idx + 1);
                self.discarding = false;
                true
            }
            None => {
                self.rewind();
                false
            }
        }
    }

    fn advance(&mut self, amount: usize) {
        self.read_pos += amount;
        if self.read_pos == self.write_pos {
            self.rewind();
        }
    }

    fn rewind(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }
}
