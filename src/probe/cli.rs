//! # Probe Command-Line Entry Points / 探针命令行入口
//!
//! Argument parsing and top-level flow for the `probe-listener` and
//! `probe-dialer` binaries that get copied onto every node.
//!
//! 复制到每个节点上的 `probe-listener` 和 `probe-dialer` 二进制文件的参数解析和顶层流程。
//!
//! The listener runs detached by default: the launched process re-executes
//! itself in `--foreground` mode with stdout piped back, waits for the child's
//! readiness line, echoes it and exits. The remote command therefore returns
//! only once the bind has succeeded or failed, while the child keeps serving
//! until its deadline.

use anyhow::{Context, Result, anyhow, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::net::{IpAddr, SocketAddr};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time;

use super::{MIN_PORT, ProbeListener, validate_port};

/// Prefix of the line the listener prints once it is bound.
pub const READY_PREFIX: &str = "Listening on ";

/// How long the detached launcher waits for its child to report readiness.
const READY_WAIT: Duration = Duration::from_secs(10);

/// clap value parser enforcing the probe port range.
pub fn parse_probe_port(value: &str) -> Result<u16, String> {
    let port: u16 = value
        .trim()
        .parse()
        .map_err(|_| format!("`{value}` is not a port number between {MIN_PORT} and 65535"))?;
    validate_port(port).map_err(|e| e.to_string())
}

fn port_arg() -> Arg {
    Arg::new("port")
        .short('p')
        .long("port")
        .help(format!("Port to use ({MIN_PORT}-65535)"))
        .value_name("PORT")
        .required(true)
        .value_parser(parse_probe_port)
        .action(ArgAction::Set)
}

fn timeout_arg(default: &'static str, help: &'static str) -> Arg {
    Arg::new("timeout")
        .short('t')
        .long("timeout")
        .help(help)
        .value_name("SECONDS")
        .default_value(default)
        .value_parser(clap::value_parser!(u64).range(1..))
        .action(ArgAction::Set)
}

pub fn build_listener_cli() -> Command {
    Command::new("probe-listener")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Answers port probes on one port until a fixed deadline passes.")
        .arg(port_arg())
        .arg(timeout_arg(
            "10",
            "Seconds before the listener quits, regardless of open connections",
        ))
        .arg(
            Arg::new("bind")
                .long("bind")
                .help("Address to bind instead of the first non-loopback IPv4 address")
                .value_name("ADDR")
                .value_parser(clap::value_parser!(IpAddr))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("foreground")
                .long("foreground")
                .help("Serve in this process instead of detaching a background listener")
                .action(ArgAction::SetTrue),
        )
}

pub fn build_dialer_cli() -> Command {
    Command::new("probe-dialer")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Connects to a probe listener and checks its acknowledgement.")
        .disable_help_flag(true)
        .arg(
            Arg::new("help")
                .long("help")
                .help("Print help")
                .action(ArgAction::Help),
        )
        .arg(
            Arg::new("host")
                .short('h')
                .long("host")
                .help("Remote host running the listener")
                .value_name("HOST")
                .required(true)
                .action(ArgAction::Set),
        )
        .arg(port_arg())
        .arg(timeout_arg(
            "5",
            "Seconds allowed for connecting and for the reply",
        ))
}

/// Runs `probe-listener` with already-parsed arguments.
pub async fn run_listener(matches: &ArgMatches) -> Result<()> {
    let port = *matches.get_one::<u16>("port").context("missing --port")?;
    let timeout = *matches.get_one::<u64>("timeout").context("missing --timeout")?;
    let bind = matches.get_one::<IpAddr>("bind").copied();

    if matches.get_flag("foreground") {
        serve_foreground(port, Duration::from_secs(timeout), bind).await
    } else {
        launch_detached(port, timeout, bind).await
    }
}

async fn serve_foreground(port: u16, lifetime: Duration, bind: Option<IpAddr>) -> Result<()> {
    let ip = bind.unwrap_or_else(|| IpAddr::V4(super::interface::primary_ipv4()));
    let listener = ProbeListener::bind(SocketAddr::new(ip, port)).await?;

    // This line is the readiness signal a detached launcher waits for; nothing
    // else may be written to stdout afterwards because the pipe closes.
    println!("{READY_PREFIX}{}", listener.local_addr());

    listener.serve(lifetime).await;
    Ok(())
}

async fn launch_detached(port: u16, timeout: u64, bind: Option<IpAddr>) -> Result<()> {
    let exe = std::env::current_exe().context("Failed to locate the listener executable")?;

    let mut cmd = tokio::process::Command::new(exe);
    cmd.arg("--port")
        .arg(port.to_string())
        .arg("--timeout")
        .arg(timeout.to_string())
        .arg("--foreground");
    if let Some(ip) = bind {
        cmd.arg("--bind").arg(ip.to_string());
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().context("Failed to start background listener")?;
    let pid = child.id().unwrap_or_default();
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("Failed to capture background listener output"))?;

    let mut lines = BufReader::new(stdout).lines();
    let first_line = time::timeout(READY_WAIT, lines.next_line())
        .await
        .map_err(|_| anyhow!("background listener did not report readiness within {READY_WAIT:?}"))?
        .context("Failed to read background listener output")?;

    match first_line {
        Some(line) if line.starts_with(READY_PREFIX) => {
            println!("{line} (pid {pid})");
            Ok(())
        }
        Some(line) => bail!("{line}"),
        None => {
            let status = child.wait().await.context("Failed to reap background listener")?;
            bail!("background listener exited before becoming ready ({status})")
        }
    }
}

/// Runs `probe-dialer` with already-parsed arguments.
pub async fn run_dialer(matches: &ArgMatches) -> Result<()> {
    let host = matches.get_one::<String>("host").context("missing --host")?;
    let port = *matches.get_one::<u16>("port").context("missing --port")?;
    let timeout = *matches.get_one::<u64>("timeout").context("missing --timeout")?;

    super::dial(host, port, Duration::from_secs(timeout)).await?;
    println!("Success.");
    Ok(())
}
