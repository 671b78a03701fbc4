// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental server-sent-events framing.
//!
//! Network chunks do not align with event boundaries, so the parser buffers
//! until it sees the blank-line separator and hands back complete `data:`
//! payloads.

/// Sentinel the OpenAI-style stream sends as its final data payload.
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk; returns the data payloads of every event
    /// completed by it.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        let mut payloads = Vec::new();
        while let Some(boundary) = find_boundary(&self.buffer) {
            let event: String = self.buffer.drain(..boundary.end).collect();
            let data = extract_data(&event[..boundary.start]);
            if !data.is_empty() {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Whatever is left after the stream closed mid-event.
    pub fn finish(self) -> Option<String> {
        let data = extract_data(&self.buffer);
        if data.is_empty() {
            None
        } else {
            Some(data)
        }
    }
}

struct Boundary {
    /// Where the event's content ends.
    start: usize,
    /// Where the separator ends.
    end: usize,
}

fn find_boundary(buffer: &str) -> Option<Boundary> {
    let lf = buffer.find("\n\n").map(|i| Boundary { start: i, end: i + 2 });
    let crlf = buffer.find("\r\n\r\n").map(|i| Boundary { start: i, end: i + 4 });
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.start < b.start { a } else { b }),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// Join the `data:` lines of one event block.
fn extract_data(event: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for line in event.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            parts.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    parts.join("\n")
}

#[cfg(test)]
#[path = "sse_tests.rs"]
mod tests;
