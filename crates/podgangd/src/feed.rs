//! JSON-lines event feed.
//!
//! One `ClusterEvent` per line. Blank lines and `#` comments are ignored;
//! lines that fail to decode are logged and skipped.

use std::path::Path;

use tracing::{debug, info, warn};

use podgang_core::ClusterEvent;
use podgang_scheduler::SchedulingGroupEngine;

use crate::standalone::SlotLedger;

/// Counts from one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub applied: usize,
    pub skipped: usize,
}

/// Decode one feed line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<ClusterEvent>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// Decode a whole feed, dropping malformed lines.
pub fn parse_feed(content: &str) -> (Vec<ClusterEvent>, usize) {
    let mut events = Vec::new();
    let mut skipped = 0;

    for (idx, line) in content.lines().enumerate() {
        match parse_line(line) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => {}
            Err(e) => {
                warn!(line = idx + 1, error = %e, "skipping malformed event");
                skipped += 1;
            }
        }
    }
    (events, skipped)
}

/// Read `path` and apply every event to `engine` in file order.
///
/// `ledger` sees each event first so slots held by pods the feed reports
/// as running are accounted for.
pub async fn replay(
    path: &Path,
    engine: &SchedulingGroupEngine,
    ledger: &SlotLedger,
) -> anyhow::Result<FeedStats> {
    let content = tokio::fs::read_to_string(path).await?;
    let (events, skipped) = parse_feed(&content);

    let applied = events.len();
    for event in events {
        match &event {
            ClusterEvent::Pod(watch) => {
                debug!(verb = watch.verb(), pod = %watch.latest().key(), "feed event")
            }
            ClusterEvent::Node(watch) => {
                debug!(verb = watch.verb(), node = %watch.latest().name, "feed event")
            }
        }
        ledger.observe(&event).await;
        engine.handle_event(event).await;
    }

    info!(path = ?path, applied, skipped, "event feed replayed");
    Ok(FeedStats { applied, skipped })
}
