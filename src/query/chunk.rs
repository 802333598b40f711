//! Chunked response framing.
//!
//! A chunked query response is a single byte stream carrying several
//! top-level JSON objects back to back, with no delimiter and no enclosing
//! array. The splitter tracks brace depth and string state across pushes
//! and emits each object's exact bytes as soon as its closing brace
//! arrives, so a chunk can be decoded before the next one is received.

use bytes::{Bytes, BytesMut};

use crate::{error::CodecError, CodecResult};

use super::{decode_slice, QueryResult};

/// Incremental boundary detector for concatenated JSON objects.
///
/// Single-owner and stateful; a framing error is fatal for the stream and
/// every later call fails with the same kind of error.
#[derive(Debug, Default)]
pub struct ChunkSplitter {
    buf: BytesMut,
    scan: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
    poisoned: bool,
}

impl ChunkSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes buffered for an object whose closing brace has not arrived yet.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    fn fail<T>(&mut self, message: String) -> CodecResult<T> {
        self.poisoned = true;
        Err(CodecError::Framing(message))
    }

    /// Feed more stream bytes; returns every object completed by them, in
    /// arrival order.
    pub fn push(&mut self, data: &[u8]) -> CodecResult<Vec<Bytes>> {
        if self.poisoned {
            return Err(CodecError::Framing("stream already failed".to_string()));
        }

        self.buf.extend_from_slice(data);

        let mut out = Vec::new();
        let mut i = self.scan;

        while i < self.buf.len() {
            let b = self.buf[i];

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
            } else {
                match b {
                    b'"' => {
                        if self.depth == 0 {
                            return self.fail("string literal outside any object".to_string());
                        }
                        self.in_string = true;
                    }

                    b'{' => {
                        if self.depth == 0 {
                            // drop inter-object padding preceding this object
                            let _ = self.buf.split_to(i);
                            i = 0;
                        }
                        self.depth += 1;
                    }

                    b'}' => {
                        if self.depth == 0 {
                            return self.fail("unbalanced closing brace".to_string());
                        }
                        self.depth -= 1;
                        if self.depth == 0 {
                            let object = self.buf.split_to(i + 1).freeze();
                            log::trace!("chunk boundary after {} bytes", object.len());
                            out.push(object);
                            i = 0;
                            continue;
                        }
                    }

                    b' ' | b'\t' | b'\r' | b'\n' => {}

                    _ => {
                        if self.depth == 0 {
                            return self.fail(format!("unexpected byte {:?} between objects", b as char));
                        }
                    }
                }
            }

            i += 1;
        }

        if self.depth == 0 {
            // nothing open: any tail is padding only
            self.buf.clear();
            self.scan = 0;
        } else {
            self.scan = self.buf.len();
        }

        Ok(out)
    }

    /// Declare end of stream. Fails if bytes of an unfinished object (or an
    /// unterminated string) are still buffered.
    pub fn finish(&mut self) -> CodecResult<()> {
        if self.poisoned {
            return Err(CodecError::Framing("stream already failed".to_string()));
        }

        if self.in_string {
            return self.fail("stream ended inside a string literal".to_string());
        }

        if self.depth > 0 || !self.buf.is_empty() {
            return self.fail(format!("stream ended inside an object, {} bytes buffered", self.buf.len()));
        }

        Ok(())
    }
}

/// Splits and decodes in one step: each completed object becomes one
/// [`QueryResult`] fragment.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    splitter: ChunkSplitter,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed stream bytes; returns the fully decoded response fragments they
    /// completed, in arrival order.
    pub fn feed(&mut self, data: &[u8]) -> CodecResult<Vec<QueryResult>> {
        self.splitter.push(data)?.iter().map(|object| decode_slice(object)).collect()
    }

    /// Declare end of stream.
    pub fn finish(&mut self) -> CodecResult<()> {
        self.splitter.finish()
    }
}
