// Shared test helpers for integration tests
//
// `FakeConnector` stands in for SSH. Listener commands bind a real probe
// listener on loopback and register it under the destination's inventory
// address; dialer commands look that registration up and dial it for real.
// Addresses with no live listener resolve to a closed loopback port. Like the
// SSH gateway, every command holds a connection from a per-node pool while it
// runs.
#![allow(dead_code)]

use async_trait::async_trait;
use porttest::config::Settings;
use porttest::core::deployment::{NodeState, SessionTable};
use porttest::infra::fs::ProbeArtifacts;
use porttest::infra::pool::Pool;
use porttest::infra::{CommandOutput, Connector, GatewayError, RemoteSession};
use porttest::models::{Node, Role};
use porttest::probe::{self, ProbeListener};
use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// How a fake node behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Behaviour {
    #[default]
    Healthy,
    /// The listener command fails as if the port were already taken.
    BindFailure,
    /// The connector rejects the credentials.
    RejectAuth,
    /// The connector reports a conflicting host key.
    UntrustedHost,
    /// The connector cannot reach the node.
    Unreachable,
    /// Uploads fail.
    FailUpload,
    /// The connector never answers.
    Hang,
    /// Listeners accept connections but never reply.
    Silent,
    /// The n-th dialer command run from this node panics (1-based).
    PanicOnDial(usize),
}

/// Loopback addresses of live fake listeners, keyed by (inventory address, port).
#[derive(Debug, Default)]
pub struct FakeNetwork {
    listeners: Mutex<HashMap<(String, u16), SocketAddr>>,
}

impl FakeNetwork {
    fn register(&self, address: &str, port: u16, addr: SocketAddr) {
        self.listeners
            .lock()
            .unwrap()
            .insert((address.to_string(), port), addr);
    }

    fn resolve(&self, address: &str, port: u16) -> Option<SocketAddr> {
        self.listeners
            .lock()
            .unwrap()
            .get(&(address.to_string(), port))
            .copied()
    }
}

/// Every command and upload the fakes received, as (node, action).
pub type ActionLog = Arc<Mutex<Vec<(String, String)>>>;

/// Cancels a token when the n-th dialer command of the run starts, then keeps
/// that dialer from ever finishing.
#[derive(Debug, Clone)]
struct Tripwire {
    stop: CancellationToken,
    on_dial: usize,
    dials: Arc<AtomicUsize>,
}

#[derive(Default)]
pub struct FakeConnector {
    behaviours: HashMap<String, Behaviour>,
    network: Arc<FakeNetwork>,
    tripwire: Option<Tripwire>,
    pub log: ActionLog,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, node: &str, behaviour: Behaviour) -> Self {
        self.behaviours.insert(node.to_string(), behaviour);
        self
    }

    /// Cancels `stop` in the middle of the `on_dial`-th dialer command.
    pub fn interrupt_on_dial(mut self, stop: CancellationToken, on_dial: usize) -> Self {
        self.tripwire = Some(Tripwire {
            stop,
            on_dial,
            dials: Arc::new(AtomicUsize::new(0)),
        });
        self
    }

    fn behaviour(&self, node: &str) -> Behaviour {
        self.behaviours.get(node).copied().unwrap_or_default()
    }

    /// An already-connected session, for building session tables directly.
    pub fn session(&self, node: &Node) -> FakeSession {
        FakeSession {
            node: node.clone(),
            behaviour: self.behaviour(&node.name),
            network: Arc::clone(&self.network),
            log: Arc::clone(&self.log),
            channels: Arc::new(Pool::new(Settings::default().jobs)),
            tripwire: self.tripwire.clone(),
            dials: AtomicUsize::new(0),
        }
    }

    /// A session table with every node ready.
    pub fn ready_table(&self, nodes: &[Node]) -> SessionTable<FakeSession> {
        let mut table = SessionTable::new();
        for node in nodes {
            table.insert(node.name.clone(), NodeState::Ready(Arc::new(self.session(node))));
        }
        table
    }

    pub fn actions_for(&self, node: &str) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == node)
            .map(|(_, action)| action.clone())
            .collect()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self, node: &Node) -> Result<FakeSession, GatewayError> {
        match self.behaviour(&node.name) {
            Behaviour::RejectAuth => Err(GatewayError::Authentication {
                user: "tester".to_string(),
                detail: "permission denied".to_string(),
            }),
            Behaviour::UntrustedHost => Err(GatewayError::HostTrust(format!(
                "host key for {} does not match the key in known_hosts",
                node.address
            ))),
            Behaviour::Unreachable => Err(GatewayError::Network(format!(
                "cannot connect to {}:22: connection timed out",
                node.address
            ))),
            Behaviour::Hang => std::future::pending().await,
            _ => Ok(self.session(node)),
        }
    }
}

#[derive(Debug)]
pub struct FakeSession {
    node: Node,
    behaviour: Behaviour,
    network: Arc<FakeNetwork>,
    log: ActionLog,
    channels: Arc<Pool<usize>>,
    tripwire: Option<Tripwire>,
    dials: AtomicUsize,
}

impl FakeSession {
    fn record(&self, action: String) {
        self.log.lock().unwrap().push((self.node.name.clone(), action));
    }

    async fn start_listener(&self, command: &str, port: u16, timeout: u64) -> Result<CommandOutput, GatewayError> {
        if self.behaviour == Behaviour::BindFailure {
            return Err(GatewayError::CommandFailed {
                command: command.to_string(),
                status: 1,
                output: format!(
                    "Error: error listening on {}:{port}: Address already in use (os error 98)",
                    self.node.address
                ),
            });
        }

        if self.behaviour == Behaviour::Silent {
            return self.start_silent_listener(port, timeout).await;
        }

        let listener = ProbeListener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .map_err(|e| GatewayError::Session(e.to_string()))?;
        let addr = listener.local_addr();
        self.network.register(&self.node.address, port, addr);
        tokio::spawn(listener.serve(Duration::from_secs(timeout)));

        Ok(CommandOutput {
            stdout: format!("Listening on {addr}\n"),
            stderr: String::new(),
        })
    }

    async fn start_silent_listener(&self, port: u16, timeout: u64) -> Result<CommandOutput, GatewayError> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        self.network.register(&self.node.address, port, addr);
        tokio::spawn(async move {
            let mut held = Vec::new();
            let _ = tokio::time::timeout(Duration::from_secs(timeout), async {
                while let Ok((stream, _)) = listener.accept().await {
                    held.push(stream);
                }
            })
            .await;
        });

        Ok(CommandOutput {
            stdout: format!("Listening on {addr}\n"),
            stderr: String::new(),
        })
    }

    async fn run_dialer(&self, command: &str, host: &str, port: u16, timeout: u64) -> Result<CommandOutput, GatewayError> {
        let dial = self.dials.fetch_add(1, Ordering::SeqCst) + 1;
        if let Behaviour::PanicOnDial(n) = self.behaviour {
            if dial == n {
                panic!("dialer {dial} on {} crashed", self.node.name);
            }
        }
        if let Some(tripwire) = &self.tripwire {
            if tripwire.dials.fetch_add(1, Ordering::SeqCst) + 1 == tripwire.on_dial {
                tripwire.stop.cancel();
                return std::future::pending().await;
            }
        }

        let target = self
            .network
            .resolve(host, port)
            .unwrap_or_else(closed_loopback_port);

        match probe::dial("127.0.0.1", target.port(), Duration::from_secs(timeout)).await {
            Ok(()) => Ok(CommandOutput {
                stdout: "Success.\n".to_string(),
                stderr: String::new(),
            }),
            Err(e) => Err(GatewayError::CommandFailed {
                command: command.to_string(),
                status: 1,
                output: format!("Error: {e}"),
            }),
        }
    }
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn run(&self, command: &str) -> Result<CommandOutput, GatewayError> {
        self.record(command.to_string());
        let _channel = self
            .channels
            .checkout(|| async { Ok::<_, GatewayError>(0) })
            .await?;

        let argv = shlex::split(command).unwrap_or_default();
        let program = argv.first().map(String::as_str).unwrap_or_default();
        let flag = |name: &str| {
            argv.iter()
                .position(|arg| arg == name)
                .and_then(|i| argv.get(i + 1))
                .cloned()
        };
        let number = |name: &str| flag(name).and_then(|v| v.parse::<u64>().ok()).unwrap_or(1);

        if program.ends_with("probe-listener") {
            let port = number("--port") as u16;
            self.start_listener(command, port, number("--timeout")).await
        } else if program.ends_with("probe-dialer") {
            let host = flag("--host").unwrap_or_default();
            let port = number("--port") as u16;
            self.run_dialer(command, &host, port, number("--timeout")).await
        } else {
            Ok(CommandOutput::default())
        }
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), GatewayError> {
        self.record(format!("upload {} {remote_path}", local_path.display()));
        if self.behaviour == Behaviour::FailUpload {
            return Err(GatewayError::Transfer {
                local: local_path.display().to_string(),
                remote: remote_path.to_string(),
                detail: "no space left on device".to_string(),
            });
        }
        Ok(())
    }
}

/// A loopback address nothing listens on.
fn closed_loopback_port() -> SocketAddr {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Probe binaries the fakes pretend to upload.
pub fn fake_artifacts() -> ProbeArtifacts {
    ProbeArtifacts {
        listener: PathBuf::from("target/probe-listener"),
        dialer: PathBuf::from("target/probe-dialer"),
    }
}

/// Settings tuned for loopback tests.
pub fn fast_settings() -> Settings {
    Settings {
        settle_delay_ms: 0,
        listener_timeout_secs: 5,
        dial_timeout_secs: 2,
        step_timeout_secs: 10,
        ..Settings::default()
    }
}

pub fn node(name: &str, address: &str, roles: &[Role]) -> Node {
    roles
        .iter()
        .fold(Node::new(name, address), |node, role| node.with_role(*role))
}
