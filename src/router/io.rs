//! Reader and writer tasks for the physical channel.
//!
//! Neither task touches router state directly: every event is posted to the
//! executor, tagged with the channel epoch so events from a previous channel
//! are ignored.

use std::io;
use std::sync::Weak;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::RouterShared;
use crate::link::FrameReader;

pub(super) async fn read_loop<R>(
    mut reader: R,
    router: Weak<RouterShared>,
    epoch: u64,
    buffer_size: usize,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; buffer_size];
    let mut frames = FrameReader::new();

    let result = loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) => break Err(e),
        };
        let Some(shared) = router.upgrade() else {
            return;
        };

        frames.push(&buf[..n]);
        while let Some(result) = frames.next_frame() {
            match result {
                Ok(frame) => {
                    tracing::trace!(
                        function = ?frame.header.function,
                        src = frame.header.source,
                        dest = frame.header.destination,
                        len = frame.payload.len(),
                        "rx frame"
                    );
                    let router = router.clone();
                    shared.executor.post(move || {
                        if let Some(shared) = router.upgrade() {
                            shared.on_frame(epoch, frame);
                        }
                    });
                }
                Err(e) => tracing::debug!(error = %e, "discarding invalid frame"),
            }
        }
    };

    if let Some(shared) = router.upgrade() {
        let reason = match result {
            Ok(()) => "end of stream".to_string(),
            Err(e) => e.to_string(),
        };
        let router = router.clone();
        shared.executor.post(move || {
            if let Some(shared) = router.upgrade() {
                shared.on_channel_closed(epoch, &reason);
            }
        });
    }
}

pub(super) async fn write_loop<W>(
    mut writer: W,
    mut frames: mpsc::UnboundedReceiver<Vec<u8>>,
    router: Weak<RouterShared>,
    epoch: u64,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(bytes) = frames.recv().await {
        let result = write_frame(&mut writer, &bytes).await;
        let failed = result.is_err();

        let Some(shared) = router.upgrade() else {
            return;
        };
        let router = router.clone();
        shared.executor.post(move || {
            if let Some(shared) = router.upgrade() {
                shared.on_write_complete(epoch, result);
            }
        });
        if failed {
            return;
        }
    }
}

async fn write_frame<W>(writer: &mut W, bytes: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await
}
