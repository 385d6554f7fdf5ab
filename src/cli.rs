//! # Command-Line Interface / 命令行接口
//!
//! Builds the `porttest` command tree and dispatches to the command modules.
//!
//! 构建 `porttest` 命令树并分派到各命令模块。

pub mod commands;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

use crate::infra::logging;
use commands::run::RunArgs;

/// Default inventory path for both `run` and `init`.
pub const DEFAULT_INVENTORY: &str = "porttest.toml";

pub fn build_cli() -> Command {
    Command::new("porttest")
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .about("Verifies that the ports a multi-role cluster depends on are open between its nodes.")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase diagnostic logging on stderr (repeatable)")
                .global(true)
                .action(ArgAction::Count),
        )
        .subcommand(
            Command::new("run")
                .about("Deploy the probes and test every required port")
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help("Inventory file")
                        .value_name("CONFIG")
                        .default_value(DEFAULT_INVENTORY)
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("user")
                        .short('u')
                        .long("user")
                        .help("SSH login for nodes that do not set their own (default: current user)")
                        .value_name("USER")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("ask-pass")
                        .long("ask-pass")
                        .help("Authenticate with a password prompted on the terminal")
                        .conflicts_with("key")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("key")
                        .short('k')
                        .long("key")
                        .help("Private key to authenticate with (default: ~/.ssh/id_rsa if present)")
                        .value_name("PATH")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("passphrase")
                        .long("passphrase")
                        .help("Prompt for the private key's passphrase")
                        .conflicts_with("ask-pass")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("accept-host-keys")
                        .long("accept-host-keys")
                        .help("Trust and record host keys missing from known_hosts")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("known-hosts")
                        .long("known-hosts")
                        .help("known_hosts file to verify against (default: ~/.ssh/known_hosts)")
                        .value_name("PATH")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("probe-dir")
                        .long("probe-dir")
                        .help("Directory holding the probe-listener and probe-dialer binaries built for the nodes")
                        .value_name("DIR")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .help("Maximum node or pair tasks in flight")
                        .value_name("JOBS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("settle-ms")
                        .long("settle-ms")
                        .help("Pause between starting a listener and dialing it, in milliseconds")
                        .value_name("MILLIS")
                        .value_parser(clap::value_parser!(u64))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("fail-fast")
                        .long("fail-fast")
                        .help("Abort when any node cannot be provisioned instead of skipping it")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("html")
                        .long("html")
                        .help("Also write an HTML report to this path")
                        .value_name("HTML")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Also write a JSON report to this path")
                        .value_name("JSON")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                ),
        )
        .subcommand(
            Command::new("init")
                .about("Write a sample inventory file")
                .arg(
                    Arg::new("path")
                        .help("Where to write the inventory")
                        .value_name("PATH")
                        .default_value(DEFAULT_INVENTORY)
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help("Overwrite an existing file")
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn run_args(matches: &ArgMatches) -> RunArgs {
    RunArgs {
        config: matches
            .get_one::<PathBuf>("config")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INVENTORY)),
        user: matches.get_one::<String>("user").cloned(),
        ask_pass: matches.get_flag("ask-pass"),
        key: matches.get_one::<PathBuf>("key").cloned(),
        passphrase: matches.get_flag("passphrase"),
        accept_host_keys: matches.get_flag("accept-host-keys"),
        known_hosts: matches.get_one::<PathBuf>("known-hosts").cloned(),
        probe_dir: matches.get_one::<PathBuf>("probe-dir").cloned(),
        jobs: matches.get_one::<usize>("jobs").copied(),
        settle_ms: matches.get_one::<u64>("settle-ms").copied(),
        fail_fast: matches.get_flag("fail-fast"),
        html: matches.get_one::<PathBuf>("html").cloned(),
        json: matches.get_one::<PathBuf>("json").cloned(),
    }
}

pub async fn run() -> Result<()> {
    let matches = build_cli().get_matches();
    logging::init(matches.get_count("verbose"));

    match matches.subcommand() {
        Some(("run", run_matches)) => commands::run::execute(run_args(run_matches)).await?,
        Some(("init", init_matches)) => {
            let path = init_matches
                .get_one::<PathBuf>("path")
                .cloned()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INVENTORY));
            commands::init::execute(&path, init_matches.get_flag("force"))?;
        }
        _ => {
            // subcommand_required: clap has already printed help.
        }
    }
    Ok(())
}
