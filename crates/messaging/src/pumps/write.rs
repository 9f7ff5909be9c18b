//! Write pump: the only task that touches the transport sink.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use hotdesk_protocol::constants::WS_WRITE_WAIT;

/// Writes frames to the transport until cancelled, then sends a close frame.
///
/// A failed write trips `fault` so the read pump reports the loss.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    cancel: CancellationToken,
    fault: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = write_rx.recv() => {
                match msg {
                    Some(m) => {
                        if let Err(e) = write.send(m).await {
                            error!("transport write error: {e}");
                            fault.cancel();
                            return;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    match tokio::time::timeout(WS_WRITE_WAIT, write.send(tungstenite::Message::Close(None))).await {
        Ok(Ok(())) => debug!("close frame sent"),
        Ok(Err(e)) => debug!("close frame not sent: {e}"),
        Err(_) => debug!("close frame timed out"),
    }
}
