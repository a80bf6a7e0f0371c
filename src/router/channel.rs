//! Physical channel helpers.

use tokio::io::DuplexStream;

#[cfg(feature = "tcp")]
use crate::core::StackResult;

/// An in-memory channel that reads back everything written to it.
///
/// Lets several links share one channel in a single process: a frame sent by
/// the master context arrives at the outstation context registered for the
/// reverse route. Must be called from within a tokio runtime.
pub fn loopback_channel(capacity: usize) -> DuplexStream {
    let (near, far) = tokio::io::duplex(capacity);
    let (mut rx, mut tx) = tokio::io::split(far);
    tokio::spawn(async move {
        if let Err(e) = tokio::io::copy(&mut rx, &mut tx).await {
            tracing::debug!(error = %e, "loopback channel closed");
        }
    });
    near
}

/// Open a TCP connection to use as the physical channel.
///
/// Connection failures are returned as [`StackError::Io`](crate::core::StackError::Io).
#[cfg(feature = "tcp")]
pub async fn connect_tcp<A>(addr: A) -> StackResult<tokio::net::TcpStream>
where
    A: tokio::net::ToSocketAddrs,
{
    let stream = tokio::net::TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    if let Ok(peer) = stream.peer_addr() {
        tracing::info!(%peer, "tcp channel connected");
    }
    Ok(stream)
}
