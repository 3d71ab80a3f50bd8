//! Reader adapters layered over archive members
//!
//! [`CountingReader`] tracks how many uncompressed bytes of a part have been
//! read; [`DecodingReader`] transcodes a caller-selected text encoding to UTF-8
//! before the XML tokenizer sees it.

use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};
use std::cell::Cell;
use std::io::{self, Read};
use std::rc::Rc;

const INPUT_CHUNK: usize = 16 * 1024;

/// Counts bytes passing through; the counter is shared with the owner
pub struct CountingReader<R> {
    inner: R,
    count: Rc<Cell<u64>>,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R, count: Rc<Cell<u64>>) -> Self {
        CountingReader { inner, count }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.set(self.count.get() + n as u64);
        Ok(n)
    }
}

/// Transcodes bytes in a legacy encoding to UTF-8 while reading
pub struct DecodingReader<R> {
    inner: R,
    decoder: Decoder,
    input: Vec<u8>,
    in_start: usize,
    in_end: usize,
    output: Vec<u8>,
    out_start: usize,
    out_end: usize,
    eof: bool,
    finished: bool,
}

impl<R: Read> DecodingReader<R> {
    pub fn new(inner: R, encoding: &'static Encoding) -> Self {
        let decoder = encoding.new_decoder();
        let out_cap = decoder
            .max_utf8_buffer_length(INPUT_CHUNK)
            .unwrap_or(INPUT_CHUNK * 3);
        DecodingReader {
            inner,
            decoder,
            input: vec![0; INPUT_CHUNK],
            in_start: 0,
            in_end: 0,
            output: vec![0; out_cap],
            out_start: 0,
            out_end: 0,
            eof: false,
            finished: false,
        }
    }

    fn fill_output(&mut self) -> io::Result<()> {
        while self.out_start == self.out_end && !self.finished {
            if self.in_start == self.in_end && !self.eof {
                let n = self.inner.read(&mut self.input)?;
                self.in_start = 0;
                self.in_end = n;
                self.eof = n == 0;
            }

            let (result, read, written, _) = self.decoder.decode_to_utf8(
                &self.input[self.in_start..self.in_end],
                &mut self.output,
                self.eof,
            );
            self.in_start += read;
            self.out_start = 0;
            self.out_end = written;

            if self.eof && matches!(result, CoderResult::InputEmpty) {
                self.finished = true;
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.fill_output()?;
        let available = &self.output[self.out_start..self.out_end];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.out_start += n;
        Ok(n)
    }
}

/// Wrap a reader so it yields UTF-8, transcoding unless the encoding is UTF-8
pub fn utf8_reader<R: Read + 'static>(
    inner: R,
    encoding: Option<&'static Encoding>,
) -> Box<dyn Read> {
    match encoding {
        Some(enc) if enc != UTF_8 => Box::new(DecodingReader::new(inner, enc)),
        _ => Box::new(inner),
    }
}
