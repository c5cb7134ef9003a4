use std::io::Write;

use impact_common::config::ReportConfig;
use impact_detector::{DetectionEvent, ImpactReport};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// Turn every detection event into a JSON report line on `out`.
///
/// Runs until the detector is dropped, then hands the writer back.
pub async fn run_report_sink<W: Write>(
    mut events: broadcast::Receiver<DetectionEvent>,
    config: ReportConfig,
    mut out: W,
) -> W {
    loop {
        match events.recv().await {
            Ok(event) => {
                let seq = event.point.sequence_number();
                let line = match ImpactReport::build(&event, &config).and_then(|r| r.to_json()) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(error = %e, seq, "failed to build impact report");
                        continue;
                    }
                };
                if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
                    warn!(error = %e, seq, "failed to write impact report");
                    continue;
                }
                debug!(seq, bytes = line.len(), "impact report written");
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "report sink fell behind, detections dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
    out
}
