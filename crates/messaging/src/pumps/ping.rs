//! Ping pump: keeps an idle transport alive.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Queues a ping frame every `period`, first one after a full period.
///
/// Returns when cancelled or once the write pump has gone away.
pub(crate) async fn ping_pump(
    write_tx: mpsc::Sender<tungstenite::Message>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while cancel
        .run_until_cancelled(ticks.tick())
        .await
        .is_some()
    {
        trace!("sending keepalive ping");
        if write_tx
            .send(tungstenite::Message::Ping(Default::default()))
            .await
            .is_err()
        {
            return;
        }
    }
}
