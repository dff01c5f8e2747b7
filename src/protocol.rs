//! N3FJP API protocol decoder.
//!
//! The N3FJP TCP API emits a stream of `<CMD>...</CMD>` records with no
//! length prefix or delimiter framing beyond the markers themselves; records
//! may be split or coalesced arbitrarily across reads. The decoder
//! accumulates chunks, extracts complete records, and decodes the one record
//! type this relay consumes: `<CALLTABEVENT>`, carrying a station's call
//! sign and DX coordinates.

use bytes::{Buf, BytesMut};
use tracing::{error, info};

/// Record start marker
pub const CMD_OPEN: &str = "<CMD>";

/// Record end marker
pub const CMD_CLOSE: &str = "</CMD>";

/// Marker identifying the one record type the relay consumes
pub const CALLTAB_MARKER: &str = "<CALLTABEVENT>";

/// Accumulation ceiling. A stream that never closes a record would grow the
/// buffer without bound; past this point the buffer is discarded.
pub const MAX_BUFFER: usize = 32 * 1024;

/// One decoded call tab event.
///
/// Fields are extracted independently; a missing tag pair yields an empty
/// string, not an error. Coordinates are kept as the raw strings from the
/// record so source formatting and precision survive to the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTabEvent {
    pub call: String,
    pub lat: String,
    pub lon: String,
}

impl CallTabEvent {
    /// An event is only dispatchable with both coordinates present.
    pub fn has_coordinates(&self) -> bool {
        !self.lat.is_empty() && !self.lon.is_empty()
    }
}

/// Incremental `<CMD>` record decoder.
///
/// Owns the accumulation buffer that bridges chunk boundaries. One instance
/// per connection; [`Decoder::reset`] drops any partial record on disconnect.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    /// Create a decoder with an empty accumulation buffer.
    pub fn new() -> Self {
        Decoder {
            buffer: BytesMut::new(),
        }
    }

    /// Append a chunk and drain every record it completes.
    ///
    /// Returns the dispatchable call tab events in arrival order. After the
    /// call the buffer holds either nothing or one trailing partial record;
    /// if the remainder still exceeds [`MAX_BUFFER`] it is discarded
    /// entirely rather than allowed to grow unbounded.
    pub fn ingest(&mut self, chunk: &[u8]) -> Vec<CallTabEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut consumed = 0;

        loop {
            let start = match find(&self.buffer[consumed..], CMD_OPEN.as_bytes()) {
                Some(pos) => consumed + pos,
                None => break,
            };
            let body = start + CMD_OPEN.len();
            let end = match find(&self.buffer[body..], CMD_CLOSE.as_bytes()) {
                Some(pos) => body + pos + CMD_CLOSE.len(),
                // Record not yet complete; leave it for future chunks
                None => break,
            };

            let record = String::from_utf8_lossy(&self.buffer[start..end]).into_owned();
            if let Some(event) = decode_record(&record) {
                if event.has_coordinates() {
                    events.push(event);
                }
            }

            consumed = end;
        }

        self.buffer.advance(consumed);

        if self.buffer.len() > MAX_BUFFER {
            error!(
                len = self.buffer.len(),
                "accumulation buffer exceeded ceiling without a record end, discarding"
            );
            self.buffer.clear();
        }

        events
    }

    /// Drop any partial record. Called on disconnect so a reconnect never
    /// resumes mid-record.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Get the unconsumed buffer contents for testing
    #[cfg(test)]
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode one complete record.
///
/// Records without the call tab marker are some other N3FJP event type and
/// are skipped; that is normal traffic, not an error.
fn decode_record(record: &str) -> Option<CallTabEvent> {
    if !record.contains(CALLTAB_MARKER) {
        return None;
    }

    let call = extract_between(record, "<CALL>", "</CALL>")
        .unwrap_or("")
        .to_string();
    let lat = extract_between(record, "<LAT>", "</LAT>")
        .unwrap_or("")
        .to_string();
    let lon = extract_between(record, "<LON>", "</LON>")
        .unwrap_or("")
        .to_string();

    info!(call = %call, lat = %lat, lon = %lon, "call tab event");

    Some(CallTabEvent { call, lat, lon })
}

/// Literal tag-pair search: the text between `open` and the nearest
/// following `close`. Independent per field, so a record with a partial tag
/// set degrades to empty fields instead of failing the whole record.
pub fn extract_between<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let end = text[start..].find(close)? + start;
    Some(&text[start..end])
}

/// Find the first occurrence of `needle` in `haystack`
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
