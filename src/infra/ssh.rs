//! # SSH Gateway / SSH 网关
//!
//! The production `Connector`: password or key authentication, host-key
//! verification against an OpenSSH `known_hosts` file, command execution over
//! exec channels and uploads over SFTP.
//!
//! 生产环境的 `Connector`：密码或密钥认证、针对 OpenSSH `known_hosts` 文件的主机密钥验证、
//! 通过 exec 通道执行命令以及通过 SFTP 上传文件。
//!
//! `ssh2` is blocking, so every call runs on tokio's blocking pool. A libssh2
//! session blocks all of its channels while one of them waits for output, so
//! each node keeps a pool of sessions and every command runs on a session of
//! its own. Concurrent commands on one node run side by side.

use async_trait::async_trait;
use ssh2::{CheckResult, KnownHostFileKind, Session};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

use crate::core::models::Node;
use crate::infra::gateway::{CommandOutput, Connector, GatewayError, RemoteSession, combine};
use crate::infra::pool::{Lease, Pool};
use crate::infra::trust::{self, HostKeyStatus, TrustDecision};

/// How the operator authenticates.
#[derive(Clone)]
pub enum Credential {
    Password(String),
    Key {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(..)"),
            Credential::Key { path, passphrase } => f
                .debug_struct("Key")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| ".."))
                .finish(),
        }
    }
}

/// Everything needed to open sessions to the inventory's nodes.
/// 打开到清单节点的会话所需的一切。
#[derive(Debug, Clone)]
pub struct SshConnector {
    /// Login used for nodes that do not name their own user.
    pub user: String,
    pub credential: Credential,
    pub known_hosts: PathBuf,
    /// Persist keys of unknown hosts instead of refusing them.
    pub auto_trust: bool,
    pub connect_timeout: Duration,
    /// Bound on any single blocking call once the session is up.
    pub command_timeout: Duration,
    /// Sessions a node may have open at once. With one per concurrent job, no
    /// command ever waits for another to finish.
    pub max_sessions: usize,
    known_hosts_lock: Arc<Mutex<()>>,
}

impl SshConnector {
    pub fn new(
        user: String,
        credential: Credential,
        known_hosts: PathBuf,
        auto_trust: bool,
        connect_timeout: Duration,
        command_timeout: Duration,
        max_sessions: usize,
    ) -> Self {
        Self {
            user,
            credential,
            known_hosts,
            auto_trust,
            connect_timeout,
            command_timeout,
            max_sessions,
            known_hosts_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl Connector for SshConnector {
    type Session = SshSession;

    async fn connect(&self, node: &Node) -> Result<SshSession, GatewayError> {
        let connector = self.clone();
        let node = node.clone();
        tokio::task::spawn_blocking(move || connector.connect_blocking(&node))
            .await
            .map_err(|e| GatewayError::Session(format!("connect task failed: {e}")))?
    }
}

impl SshConnector {
    fn connect_blocking(&self, node: &Node) -> Result<SshSession, GatewayError> {
        let session = self.open_session(node)?;
        Ok(SshSession {
            node: node.clone(),
            connector: self.clone(),
            pool: Arc::new(Pool::with_item(self.max_sessions, session)),
        })
    }

    /// Opens, verifies and authenticates one SSH session to `node`.
    fn open_session(&self, node: &Node) -> Result<Session, GatewayError> {
        let user = node.user.clone().unwrap_or_else(|| self.user.clone());
        let tcp = open_tcp(&node.address, node.ssh_port, self.connect_timeout)?;

        let mut session = Session::new().map_err(|e| GatewayError::Session(e.to_string()))?;
        session.set_timeout(millis(self.connect_timeout));
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| {
            GatewayError::Network(format!("SSH handshake with {} failed: {e}", node.address))
        })?;

        self.verify_host_key(&session, &node.address, node.ssh_port)?;
        authenticate(&session, &user, &self.credential)?;

        session.set_timeout(millis(self.command_timeout));
        debug!("SSH session to {} ({}) established as {user}", node.name, node.address);
        Ok(session)
    }

    fn verify_host_key(&self, session: &Session, host: &str, port: u16) -> Result<(), GatewayError> {
        let (key, key_type) = session
            .host_key()
            .ok_or_else(|| GatewayError::HostTrust(format!("{host} presented no host key")))?;

        // Several node tasks may append to the same file at once.
        let _guard = self
            .known_hosts_lock
            .lock()
            .map_err(|_| GatewayError::Session("known_hosts lock poisoned".to_string()))?;

        let mut known = session
            .known_hosts()
            .map_err(|e| GatewayError::HostTrust(format!("cannot open known_hosts store: {e}")))?;
        if self.known_hosts.exists() {
            known
                .read_file(&self.known_hosts, KnownHostFileKind::OpenSSH)
                .map_err(|e| {
                    GatewayError::HostTrust(format!(
                        "cannot read {}: {e}",
                        self.known_hosts.display()
                    ))
                })?;
        }

        let status = match known.check_port(host, port, key) {
            CheckResult::Match => HostKeyStatus::Match,
            CheckResult::Mismatch => HostKeyStatus::Mismatch,
            CheckResult::NotFound => HostKeyStatus::NotFound,
            CheckResult::Failure => HostKeyStatus::Failure,
        };

        if trust::evaluate(host, status, self.auto_trust)? == TrustDecision::AcceptAndPersist {
            let entry = trust::known_hosts_entry(host, port);
            known
                .add(&entry, key, "added by porttest", key_type.into())
                .map_err(|e| GatewayError::HostTrust(format!("cannot record key for {host}: {e}")))?;
            if let Some(parent) = self.known_hosts.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    GatewayError::HostTrust(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
            known
                .write_file(&self.known_hosts, KnownHostFileKind::OpenSSH)
                .map_err(|e| {
                    GatewayError::HostTrust(format!(
                        "cannot write {}: {e}",
                        self.known_hosts.display()
                    ))
                })?;
            info!("added host key for {entry} to {}", self.known_hosts.display());
        }
        Ok(())
    }
}

fn open_tcp(address: &str, port: u16, timeout: Duration) -> Result<TcpStream, GatewayError> {
    let addrs = (address, port)
        .to_socket_addrs()
        .map_err(|e| GatewayError::Network(format!("cannot resolve {address}: {e}")))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(GatewayError::Network(match last_error {
        Some(e) => format!("cannot connect to {address}:{port}: {e}"),
        None => format!("{address} resolved to no addresses"),
    }))
}

fn authenticate(session: &Session, user: &str, credential: &Credential) -> Result<(), GatewayError> {
    let auth_err = |detail: String| GatewayError::Authentication {
        user: user.to_string(),
        detail,
    };

    match credential {
        Credential::Password(password) => session.userauth_password(user, password),
        Credential::Key { path, passphrase } => {
            session.userauth_pubkey_file(user, None, path, passphrase.as_deref())
        }
    }
    .map_err(|e| auth_err(e.to_string()))?;

    if session.authenticated() {
        Ok(())
    } else {
        Err(auth_err("server did not accept the credentials".to_string()))
    }
}

fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

/// Authenticated SSH access to one node, backed by a pool of sessions.
#[derive(Clone)]
pub struct SshSession {
    node: Node,
    connector: SshConnector,
    pool: Arc<Pool<Session>>,
}

impl fmt::Debug for SshSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshSession")
            .field("node", &self.node.name)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl SshSession {
    /// A session of this node's pool, opening a new one when all are busy.
    async fn checkout(&self) -> Result<Lease<Session>, GatewayError> {
        let connector = self.connector.clone();
        let node = self.node.clone();
        self.pool
            .checkout(|| async move {
                debug!("opening an extra session to {}", node.name);
                tokio::task::spawn_blocking(move || connector.open_session(&node))
                    .await
                    .map_err(|e| GatewayError::Session(format!("connect task failed: {e}")))?
            })
            .await
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn run(&self, command: &str) -> Result<CommandOutput, GatewayError> {
        let mut session = self.checkout().await?;
        let command = command.to_string();
        debug!("[{}] $ {command}", self.node.name);
        // The lease lives as long as the blocking call, even if the caller
        // stops waiting for it.
        tokio::task::spawn_blocking(move || {
            let result = run_blocking(&session, &command);
            if matches!(result, Err(GatewayError::Session(_))) {
                session.discard();
            }
            result
        })
        .await
        .map_err(|e| GatewayError::Session(format!("command task failed: {e}")))?
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), GatewayError> {
        let session = self.checkout().await?;
        let local_path = local_path.to_path_buf();
        let remote_path = remote_path.to_string();
        debug!("[{}] upload {} -> {remote_path}", self.node.name, local_path.display());
        tokio::task::spawn_blocking(move || upload_blocking(&session, &local_path, &remote_path))
            .await
            .map_err(|e| GatewayError::Session(format!("upload task failed: {e}")))?
    }
}

fn run_blocking(session: &Session, command: &str) -> Result<CommandOutput, GatewayError> {
    let channel_err = |e: ssh2::Error| GatewayError::Session(format!("`{command}`: {e}"));
    let read_err = |e: io::Error| GatewayError::Session(format!("`{command}`: {e}"));

    let mut channel = session.channel_session().map_err(channel_err)?;
    channel.exec(command).map_err(channel_err)?;

    let mut stdout = Vec::new();
    channel.read_to_end(&mut stdout).map_err(read_err)?;
    let mut stderr = Vec::new();
    channel.stderr().read_to_end(&mut stderr).map_err(read_err)?;
    channel.wait_close().map_err(channel_err)?;
    let status = channel.exit_status().map_err(channel_err)?;

    let stdout = String::from_utf8_lossy(&stdout).into_owned();
    let stderr = String::from_utf8_lossy(&stderr).into_owned();

    if status == 0 {
        Ok(CommandOutput { stdout, stderr })
    } else {
        Err(GatewayError::CommandFailed {
            command: command.to_string(),
            status,
            output: combine(&stdout, &stderr),
        })
    }
}

fn upload_blocking(session: &Session, local: &Path, remote: &str) -> Result<(), GatewayError> {
    let transfer_err = |detail: String| GatewayError::Transfer {
        local: local.display().to_string(),
        remote: remote.to_string(),
        detail,
    };

    let sftp = session.sftp().map_err(|e| transfer_err(e.to_string()))?;
    let mut source = File::open(local).map_err(|e| transfer_err(e.to_string()))?;
    let mut target = sftp
        .create(Path::new(remote))
        .map_err(|e| transfer_err(e.to_string()))?;
    io::copy(&mut source, &mut target).map_err(|e| transfer_err(e.to_string()))?;
    Ok(())
}
