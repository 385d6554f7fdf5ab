use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;
use tracing::debug;

use super::{ACK_TOKEN, MAX_MESSAGE, ProbeError, REQUEST_TOKEN};

/// Connects to `host:port`, sends the request token and waits for the
/// acknowledgement. Both the connect and the reply are bounded by `timeout`.
///
/// Any connection error, timeout or reply other than the exact acknowledgement
/// is returned as an error carrying the underlying cause.
///
/// 连接到 `host:port`，发送请求令牌并等待确认。连接和回复都受 `timeout` 限制。
pub async fn dial(host: &str, port: u16, timeout: Duration) -> Result<(), ProbeError> {
    let target = display_target(host, port);

    let mut stream = match time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => return Err(ProbeError::Connect { target, source }),
        Err(_) => {
            return Err(ProbeError::Timeout {
                target,
                stage: "connecting to",
                timeout,
            });
        }
    };
    debug!("connected to {target}");

    let exchange = async {
        stream.write_all(REQUEST_TOKEN).await?;

        let mut response = Vec::with_capacity(ACK_TOKEN.len());
        let mut buf = [0u8; MAX_MESSAGE];
        while response.len() < ACK_TOKEN.len() {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            response.extend_from_slice(&buf[..n]);
        }
        Ok::<_, std::io::Error>(response)
    };

    let response = match time::timeout(timeout, exchange).await {
        Ok(Ok(response)) => response,
        Ok(Err(source)) => return Err(ProbeError::Io { target, source }),
        Err(_) => {
            return Err(ProbeError::Timeout {
                target,
                stage: "waiting for a reply from",
                timeout,
            });
        }
    };

    if response == ACK_TOKEN {
        Ok(())
    } else {
        Err(ProbeError::UnexpectedResponse {
            target,
            response: String::from_utf8_lossy(&response).into_owned(),
        })
    }
}

fn display_target(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
