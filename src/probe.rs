//! # Probe Module / 探针模块
//!
//! The liveness protocol run on every node. A listener accepts connections and
//! answers a fixed acknowledgement until its hard deadline expires; a dialer
//! connects, sends a fixed request and succeeds only if the reply is exactly the
//! acknowledgement. Nothing else travels over the wire.
//!
//! 在每个节点上运行的存活协议。监听器接受连接并回复固定的确认令牌，直到其硬截止时间到期；
//! 拨号器连接、发送固定请求，且仅当回复恰好是确认令牌时才算成功。线路上不传输其他内容。

pub mod cli;
pub mod dialer;
pub mod interface;
pub mod listener;

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use dialer::dial;
pub use listener::ProbeListener;

/// Token the dialer sends after connecting.
pub const REQUEST_TOKEN: &[u8] = b"PING";
/// Token the listener answers with.
pub const ACK_TOKEN: &[u8] = b"OK";
/// Largest request or reply either side reads.
pub const MAX_MESSAGE: usize = 1024;

/// Lowest port a probe may use; everything below is privileged or reserved.
pub const MIN_PORT: u16 = 1025;

/// Errors raised by either side of the probe protocol.
/// 探针协议任何一方引发的错误。
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("port {0} is outside the allowed range {MIN_PORT}-65535")]
    InvalidPort(u16),
    #[error("error listening on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("error connecting to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: io::Error,
    },
    #[error("timed out {stage} {target} after {}s", timeout.as_secs_f64())]
    Timeout {
        target: String,
        stage: &'static str,
        timeout: Duration,
    },
    #[error("error talking to {target}: {source}")]
    Io {
        target: String,
        #[source]
        source: io::Error,
    },
    #[error("unexpected response from {target}: {response:?}")]
    UnexpectedResponse { target: String, response: String },
}

/// Checks that `port` is usable by the probe binaries.
pub fn validate_port(port: u16) -> Result<u16, ProbeError> {
    if port < MIN_PORT {
        Err(ProbeError::InvalidPort(port))
    } else {
        Ok(port)
    }
}
