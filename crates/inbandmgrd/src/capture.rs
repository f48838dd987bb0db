//! Packet capture replay.
//!
//! A capture is a JSON-lines file, one [`InboundPacket`] per line. Blank
//! lines and lines starting with `#` are skipped.

use crate::dispatch::PacketDispatcher;
use crate::error::Result;
use crate::packet::InboundPacket;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// Counts from one replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub dispatched: usize,
    pub malformed: usize,
}

/// Parses one capture line. Returns `None` for blank and comment lines.
pub fn parse_packet_line(line: &str) -> Result<Option<InboundPacket>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}

/// Feeds every packet in `reader` to `dispatcher`. Malformed lines are
/// logged and skipped.
pub async fn replay<R>(reader: R, dispatcher: &PacketDispatcher) -> Result<ReplaySummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = ReplaySummary::default();
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        match parse_packet_line(&line) {
            Ok(Some(packet)) => {
                debug!(line = line_no, point = %packet.received_from, "Replaying packet");
                dispatcher.dispatch(&packet);
                summary.dispatched += 1;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping malformed capture line");
                summary.malformed += 1;
            }
        }
    }

    Ok(summary)
}
