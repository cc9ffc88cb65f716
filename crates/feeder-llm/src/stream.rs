//! Newline-delimited JSON fragments of a generation response.
//!
//! A non-streamed reply is the one-line case. The sequence ends when the body
//! closes or a fragment with `"done": true` arrives, whichever comes first.

use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tracing::warn;

use crate::error::{LlmError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Fragment {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

/// Blank lines yield `None`; anything that is not a JSON object yields `Malformed`.
pub fn parse_line(line: &str) -> Option<Result<Fragment>> {
    let line = line.trim();
    if line.is_empty() { return None; }
    Some(serde_json::from_str::<Fragment>(line).map_err(|_| LlmError::Malformed(line.to_string())))
}

/// Split a byte stream into complete lines. Bytes are buffered until a newline
/// so multi-byte characters split across reads survive intact.
pub fn lines<S, B, E>(body: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    stream::unfold((body, Vec::<u8>::new(), false), |(mut body, mut buffer, mut closed)| async move {
        loop {
            if let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                return Some((Ok(String::from_utf8_lossy(&line[..pos]).into_owned()), (body, buffer, closed)));
            }
            if closed {
                if buffer.is_empty() { return None; }
                let rest = std::mem::take(&mut buffer);
                return Some((Ok(String::from_utf8_lossy(&rest).into_owned()), (body, buffer, closed)));
            }
            match body.next().await {
                Some(Ok(bytes)) => buffer.extend_from_slice(bytes.as_ref()),
                Some(Err(e)) => { closed = true; buffer.clear(); return Some((Err(LlmError::Stream(e.to_string())), (body, buffer, closed))); }
                None => closed = true,
            }
        }
    })
}

/// Fragments parsed from `body`, blank lines dropped.
pub fn fragments<S, B, E>(body: S) -> impl Stream<Item = Result<Fragment>>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    lines(body).filter_map(|line| async move {
        match line {
            Ok(line) => parse_line(&line),
            Err(e) => Some(Err(e)),
        }
    })
}

/// Concatenate `response` fields in arrival order. Malformed lines are logged
/// and skipped; a transport failure ends accumulation with an error.
pub async fn accumulate<S>(fragments: S) -> Result<String>
where
    S: Stream<Item = Result<Fragment>>,
{
    let mut fragments = std::pin::pin!(fragments);
    let mut text = String::new();
    while let Some(fragment) = fragments.next().await {
        match fragment {
            Ok(f) => { text.push_str(&f.response); if f.done { break; } }
            Err(LlmError::Malformed(line)) => warn!("Error decoding streamed line: {}", line),
            Err(e) => return Err(e),
        }
    }
    Ok(text)
}
