//! Reassembles an assistant reply from a `text/event-stream` body.
//!
//! The body is a sequence of `data: <json>` lines terminated by
//! `data: [DONE]`. Each JSON payload carries a text fragment at
//! `choices[0].delta.content`; the transcript is the concatenation of every
//! non-empty fragment in arrival order. Lines that fail to parse are dropped
//! without error.

use std::fmt;
use std::str::FromStr;

use futures_util::{Stream, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace, warn};

pub const EMPTY_RESPONSE_FALLBACK: &str = "Sorry, I could not generate a response.";

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";
const CONTENT_POINTER: &str = "/choices/0/delta/content";

/// Largest partial line kept between chunks in buffered framing.
pub const MAX_PENDING_LINE_BYTES: usize = 1024 * 1024;

/// How incoming chunks are cut into lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineFraming {
    /// Carry a partial trailing line over to the next chunk.
    #[default]
    Buffered,
    /// Split every chunk on its own. A line straddling two chunks is lost.
    PerChunk,
}

impl LineFraming {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buffered => "buffered",
            Self::PerChunk => "per-chunk",
        }
    }
}

impl fmt::Display for LineFraming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown line framing '{0}'")]
pub struct ParseLineFramingError(String);

impl FromStr for LineFraming {
    type Err = ParseLineFramingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "buffered" => Ok(Self::Buffered),
            "per-chunk" | "per_chunk" | "perchunk" => Ok(Self::PerChunk),
            _ => Err(ParseLineFramingError(value.to_string())),
        }
    }
}

/// Classification of a single stream line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Non-empty text fragment to append.
    Fragment(String),
    /// End-of-stream sentinel.
    Done,
    /// Valid JSON without a usable fragment.
    NoContent,
    /// Malformed or partial payload; dropped.
    ParseSkip,
    /// Blank line, comment, or any other non-`data:` line.
    NotData,
}

pub fn parse_event_line(line: &str) -> LineEvent {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return LineEvent::NotData;
    };

    if payload == DONE_SENTINEL {
        return LineEvent::Done;
    }

    let Ok(parsed) = serde_json::from_str::<Value>(payload) else {
        return LineEvent::ParseSkip;
    };

    match parsed.pointer(CONTENT_POINTER).and_then(Value::as_str) {
        Some(fragment) if !fragment.is_empty() => LineEvent::Fragment(fragment.to_string()),
        _ => LineEvent::NoContent,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledResponse {
    pub content: String,
    pub fallback_used: bool,
    pub fragments: usize,
}

/// Accumulator for one in-flight response.
#[derive(Debug)]
pub struct StreamAssembler {
    framing: LineFraming,
    pending: Vec<u8>,
    transcript: String,
    fragments: usize,
    skipped: usize,
}

impl StreamAssembler {
    pub fn new(framing: LineFraming) -> Self {
        Self {
            framing,
            pending: Vec::new(),
            transcript: String::new(),
            fragments: 0,
            skipped: 0,
        }
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Feeds one chunk and calls `on_update` with the running transcript after
    /// every appended fragment. Returns how many fragments the chunk produced.
    pub fn push_chunk<F>(&mut self, chunk: &[u8], on_update: &mut F) -> usize
    where
        F: FnMut(&str),
    {
        let before = self.fragments;
        match self.framing {
            LineFraming::PerChunk => {
                let text = String::from_utf8_lossy(chunk);
                for line in text.split('\n') {
                    self.process_line(line, on_update);
                }
            }
            LineFraming::Buffered => {
                let mut buffered = std::mem::take(&mut self.pending);
                buffered.extend_from_slice(chunk);

                let mut start = 0;
                while let Some(offset) = buffered[start..].iter().position(|byte| *byte == b'\n') {
                    let end = start + offset;
                    let line = String::from_utf8_lossy(&buffered[start..end]);
                    self.process_line(&line, on_update);
                    start = end + 1;
                }

                buffered.drain(..start);
                if buffered.len() > MAX_PENDING_LINE_BYTES {
                    warn!(
                        pending_bytes = buffered.len(),
                        "dropping oversized partial stream line"
                    );
                    buffered.clear();
                    self.skipped += 1;
                }
                self.pending = buffered;
            }
        }
        self.fragments - before
    }

    /// Flushes any buffered partial line and produces the final turn content.
    pub fn finish<F>(mut self, on_update: &mut F) -> AssembledResponse
    where
        F: FnMut(&str),
    {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&rest);
            self.process_line(&line, on_update);
        }

        if self.skipped > 0 {
            debug!(skipped = self.skipped, "dropped unparseable stream lines");
        }

        if self.transcript.is_empty() {
            AssembledResponse {
                content: EMPTY_RESPONSE_FALLBACK.to_string(),
                fallback_used: true,
                fragments: 0,
            }
        } else {
            AssembledResponse {
                content: self.transcript,
                fallback_used: false,
                fragments: self.fragments,
            }
        }
    }

    fn process_line<F>(&mut self, line: &str, on_update: &mut F)
    where
        F: FnMut(&str),
    {
        let line = line.strip_suffix('\r').unwrap_or(line);
        match parse_event_line(line) {
            LineEvent::Fragment(fragment) => {
                self.transcript.push_str(&fragment);
                self.fragments += 1;
                on_update(&self.transcript);
            }
            LineEvent::ParseSkip => {
                trace!(line, "skipping unparseable stream line");
                self.skipped += 1;
            }
            LineEvent::Done | LineEvent::NoContent | LineEvent::NotData => {}
        }
    }
}

/// Drives a byte stream to completion. A chunk error aborts assembly and is
/// returned as-is; the partial transcript is discarded.
pub async fn assemble<S, B, E, F>(
    stream: S,
    framing: LineFraming,
    mut on_update: F,
) -> Result<AssembledResponse, E>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    F: FnMut(&str),
{
    let mut stream = std::pin::pin!(stream);
    let mut assembler = StreamAssembler::new(framing);

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        assembler.push_chunk(chunk.as_ref(), &mut on_update);
    }

    Ok(assembler.finish(&mut on_update))
}
