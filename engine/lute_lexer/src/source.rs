//! Source input modes.
//!
//! The lexer reads from either an in-memory buffer or a streamed reader
//! through the same small interface: `read_byte`, up to two bytes of
//! lookahead, and a fast skip-to-newline used for comments. Buffer mode
//! uses `memchr` for the skip; reader mode degrades to a scalar loop.

use std::collections::VecDeque;
use std::io::BufRead;

/// A source of raw bytes for the lexer.
pub enum SourceInput {
    /// In-memory source text.
    Buffer { bytes: Vec<u8>, pos: usize },
    /// Streamed source (file, stdin), with a small pushback queue to
    /// support lookahead.
    Reader {
        reader: Box<dyn BufRead>,
        pending: VecDeque<u8>,
    },
}

impl SourceInput {
    pub fn buffer(bytes: Vec<u8>) -> Self {
        SourceInput::Buffer { bytes, pos: 0 }
    }

    pub fn reader(reader: Box<dyn BufRead>) -> Self {
        SourceInput::Reader {
            reader,
            pending: VecDeque::new(),
        }
    }

    /// Consume and return the next byte, or `None` at end of input.
    ///
    /// Read failures on a streamed source are treated as end of input;
    /// the parser reports the resulting truncation as a syntax error.
    pub fn read_byte(&mut self) -> Option<u8> {
        match self {
            SourceInput::Buffer { bytes, pos } => {
                let b = bytes.get(*pos).copied();
                if b.is_some() {
                    *pos += 1;
                }
                b
            }
            SourceInput::Reader { reader, pending } => {
                if let Some(b) = pending.pop_front() {
                    return Some(b);
                }
                read_one(reader.as_mut())
            }
        }
    }

    /// Look at the next byte without consuming it.
    pub fn peek_byte(&mut self) -> Option<u8> {
        self.peek_at(0)
    }

    /// Look two bytes ahead without consuming (exponent sign lookahead).
    pub fn peek2_byte(&mut self) -> Option<u8> {
        self.peek_at(1)
    }

    fn peek_at(&mut self, offset: usize) -> Option<u8> {
        match self {
            SourceInput::Buffer { bytes, pos } => bytes.get(*pos + offset).copied(),
            SourceInput::Reader { reader, pending } => {
                while pending.len() <= offset {
                    let b = read_one(reader.as_mut())?;
                    pending.push_back(b);
                }
                pending.get(offset).copied()
            }
        }
    }

    /// Skip forward so the next `read_byte` returns the next `\n`, or
    /// `None` if the input ends first.
    pub fn skip_to_newline(&mut self) {
        match self {
            SourceInput::Buffer { bytes, pos } => {
                *pos = match memchr::memchr(b'\n', &bytes[*pos..]) {
                    Some(found) => *pos + found,
                    None => bytes.len(),
                };
            }
            SourceInput::Reader { reader, pending } => {
                while let Some(&b) = pending.front() {
                    if b == b'\n' {
                        return;
                    }
                    pending.pop_front();
                }
                loop {
                    match read_one(reader.as_mut()) {
                        Some(b'\n') => {
                            pending.push_back(b'\n');
                            return;
                        }
                        Some(_) => {}
                        None => return,
                    }
                }
            }
        }
    }
}

fn read_one(reader: &mut dyn BufRead) -> Option<u8> {
    let mut byte = [0u8];
    match reader.read(&mut byte) {
        Ok(1) => Some(byte[0]),
        _ => None,
    }
}
