//! Recorded traffic played back chunk by chunk.
//!
//! Captures are plain text: hex byte pairs separated by whitespace, commas
//! or colons, optionally prefixed with `0x`. `#` starts a comment that runs
//! to the end of the line. Each non-empty line becomes one read, so a
//! capture can reproduce the exact fragmentation seen on the wire.
use std::collections::VecDeque;
use std::io;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use super::ByteSource;

#[derive(Debug, Default, Clone)]
pub struct ReplaySource {
    chunks: VecDeque<Vec<u8>>,
    closed: bool,
}

impl ReplaySource {
    pub fn new<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        Self {
            chunks: chunks.into_iter().filter(|c| !c.is_empty()).collect(),
            closed: false,
        }
    }

    /// Split one contiguous stream into reads of at most `chunk` bytes.
    pub fn from_stream(bytes: &[u8], chunk: usize) -> Self {
        Self::new(bytes.chunks(chunk.max(1)).map(<[u8]>::to_vec))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut chunks = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let content = line.split('#').next().unwrap_or("");
            let bytes = parse_hex(content).with_context(|| format!("line {}", lineno + 1))?;
            if !bytes.is_empty() {
                chunks.push(bytes);
            }
        }
        Ok(Self::new(chunks))
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read capture {}: {}", path.display(), e))?;
        Self::parse(&text).with_context(|| format!("Failed to parse capture {}", path.display()))
    }

    /// Re-chunk everything still queued into reads of at most `chunk` bytes.
    pub fn rechunk(self, chunk: usize) -> Self {
        let stream: Vec<u8> = self.chunks.into_iter().flatten().collect();
        Self::from_stream(&stream, chunk)
    }

    pub fn remaining(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }
}

/// Parse hex byte pairs such as `55 00 09`, `0x55,0x00` or `55:00:09`.
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for token in text.split(|c: char| c.is_whitespace() || c == ',' || c == ':') {
        if token.is_empty() {
            continue;
        }
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        if digits.len() % 2 != 0 {
            return Err(anyhow!("odd number of hex digits in {:?}", token));
        }
        for pair in digits.as_bytes().chunks(2) {
            let s = std::str::from_utf8(pair).map_err(|_| anyhow!("invalid hex {:?}", token))?;
            let byte = u8::from_str_radix(s, 16).map_err(|_| anyhow!("invalid hex {:?}", token))?;
            out.push(byte);
        }
    }
    Ok(out)
}

impl ByteSource for ReplaySource {
    fn available(&mut self) -> io::Result<usize> {
        if self.closed {
            return Ok(0);
        }
        Ok(self.chunks.front().map_or(0, Vec::len))
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Ok(0);
        }
        let Some(front) = self.chunks.front_mut() else {
            return Ok(0);
        };
        let n = front.len().min(buf.len());
        buf[..n].copy_from_slice(&front[..n]);
        if n == front.len() {
            self.chunks.pop_front();
        } else {
            front.drain(..n);
        }
        Ok(n)
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_exhausted(&self) -> bool {
        self.closed || self.chunks.is_empty()
    }
}
