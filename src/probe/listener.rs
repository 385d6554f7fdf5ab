use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use super::{ACK_TOKEN, MAX_MESSAGE, ProbeError};

/// How long an accepted connection may take to send its request.
const READ_WINDOW: Duration = Duration::from_secs(2);

/// A bound probe listener.
///
/// Binding and serving are separate steps so the caller can report readiness
/// between them: once `bind` returns, connections are already queued by the
/// kernel even before `serve` starts accepting them.
///
/// 已绑定的探针监听器。绑定和服务是分开的步骤，以便调用者可以在两者之间报告就绪状态。
#[derive(Debug)]
pub struct ProbeListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl ProbeListener {
    /// Binds to `addr` with address and port reuse enabled, so that a second
    /// listener for the same port can start while an earlier one is still
    /// draining its deadline.
    pub async fn bind(addr: SocketAddr) -> Result<Self, ProbeError> {
        let bind_err = |source| ProbeError::Bind { addr, source };

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
        socket.set_reuseport(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;

        let listener = socket.listen(128).map_err(bind_err)?;
        let addr = listener.local_addr().map_err(bind_err)?;
        debug!("probe listener bound to {addr}");
        Ok(Self { listener, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Answers connections until `lifetime` has elapsed, then returns the
    /// number of connections accepted. The deadline is hard: connections still
    /// being answered when it passes are abandoned.
    ///
    /// 应答连接直到 `lifetime` 到期，然后返回接受的连接数。截止时间是硬性的：
    /// 到期时仍在应答的连接将被放弃。
    pub async fn serve(self, lifetime: Duration) -> usize {
        let deadline = Instant::now() + lifetime;
        let mut in_flight = JoinSet::new();
        let mut accepted = 0;

        loop {
            tokio::select! {
                _ = time::sleep_until(deadline) => break,
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                result = self.listener.accept() => match result {
                    Ok((stream, peer)) => {
                        accepted += 1;
                        debug!("accepted probe connection from {peer}");
                        in_flight.spawn(answer(stream, peer));
                    }
                    Err(e) => warn!("error accepting probe connection: {e}"),
                },
            }
        }

        info!(
            "quitting after {}s, {accepted} connection(s) answered on {}",
            lifetime.as_secs(),
            self.addr
        );
        accepted
    }
}

/// Reads whatever the peer sends (up to one buffer), then acknowledges.
async fn answer(mut stream: TcpStream, peer: SocketAddr) {
    let mut buf = [0u8; MAX_MESSAGE];
    match time::timeout(READ_WINDOW, stream.read(&mut buf)).await {
        Ok(Ok(n)) => debug!("read {n} byte(s) from {peer}"),
        Ok(Err(e)) => debug!("error reading from {peer}: {e}"),
        Err(_) => debug!("no request from {peer} within {READ_WINDOW:?}"),
    }

    if let Err(e) = stream.write_all(ACK_TOKEN).await {
        debug!("error acknowledging {peer}: {e}");
        return;
    }
    let _ = stream.shutdown().await;
}
