//! # Run Command Module / 运行命令模块
//!
//! This module implements the `run` command: load the inventory, provision the
//! probes on every node, run the port matrix and report.
//!
//! 此模块实现了 `run` 命令：加载清单、在每个节点上部署探针、运行端口矩阵并生成报告。

use anyhow::{Context, Result, bail};
use colored::*;
use dialoguer::Password;
use std::{env, path::PathBuf, process, sync::Arc};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    core::{
        config::{self, Settings},
        deployment,
        execution::execute_matrix,
        layout::RemoteLayout,
        planner,
    },
    infra::{
        fs::{self as local_fs, ProbeArtifacts},
        ssh::{Credential, SshConnector},
    },
    reporting::{generate_html_report, generate_json_report, print_report},
};

/// Conventional status for a process ended by SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Options of `porttest run` after CLI parsing.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub config: PathBuf,
    pub user: Option<String>,
    pub ask_pass: bool,
    pub key: Option<PathBuf>,
    pub passphrase: bool,
    pub accept_host_keys: bool,
    pub known_hosts: Option<PathBuf>,
    pub probe_dir: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub settle_ms: Option<u64>,
    pub fail_fast: bool,
    pub html: Option<PathBuf>,
    pub json: Option<PathBuf>,
}

/// Executes the run command with the provided arguments.
///
/// # Returns
/// `Ok` once a report was produced, whatever the individual outcomes; an error
/// for configuration problems and fatal deployment failures.
pub async fn execute(args: RunArgs) -> Result<()> {
    let mut inventory = config::load_inventory(&args.config)?;
    apply_overrides(&mut inventory.settings, &args);
    inventory.settings.validate()?;
    let settings = inventory.settings.clone();

    println!(
        "{} {} ({} node(s))",
        "Loaded inventory".cyan(),
        args.config.display(),
        inventory.nodes.len()
    );

    let plan = planner::plan_matrix(&inventory.nodes);
    println!(
        "{}",
        format!(
            "{} ordered pair(s) considered, {} with ports to test, {} port test(s) planned",
            plan.pairs_considered,
            plan.pairs.len(),
            plan.total_tests()
        )
        .cyan()
    );

    let artifacts = ProbeArtifacts::locate(args.probe_dir.as_deref())?;
    let user = resolve_user(args.user.as_deref())?;
    let credential = resolve_credential(&args)?;
    let known_hosts = match &args.known_hosts {
        Some(path) => local_fs::expand_path(path)?,
        None => local_fs::default_known_hosts(),
    };

    let connector = Arc::new(SshConnector::new(
        user,
        credential,
        known_hosts,
        args.accept_host_keys,
        settings.connect_timeout(),
        settings.step_timeout(),
        settings.jobs,
    ));

    let stop_token = setup_signal_handler();
    let layout = RemoteLayout::new(settings.remote_dir.as_str());

    let sessions =
        deployment::deploy_all(connector, &inventory.nodes, &artifacts, &layout, &settings, &stop_token)
            .await?;

    let unavailable = sessions.unavailable().count();
    if unavailable > 0 {
        println!(
            "{}",
            format!("{unavailable} node(s) unavailable, their pairs will be skipped").yellow()
        );
    }

    let report = execute_matrix(&plan, Arc::new(sessions), &layout, &settings, stop_token).await;
    print_report(&report);

    if let Some(path) = &args.html {
        println!("\nGenerating HTML report at: {}", path.display());
        if let Err(e) = generate_html_report(&report, path) {
            eprintln!("{} {:#}", "Failed to generate HTML report:".red(), e);
        }
    }
    if let Some(path) = &args.json {
        println!("Generating JSON report at: {}", path.display());
        if let Err(e) = generate_json_report(&report, path) {
            eprintln!("{} {:#}", "Failed to generate JSON report:".red(), e);
        }
    }

    Ok(())
}

/// Command-line values win over the inventory's `[settings]` table.
pub fn apply_overrides(settings: &mut Settings, args: &RunArgs) {
    if let Some(jobs) = args.jobs {
        settings.jobs = jobs;
    }
    if let Some(settle_ms) = args.settle_ms {
        settings.settle_delay_ms = settle_ms;
    }
    if args.fail_fast {
        settings.fail_fast = true;
    }
}

fn resolve_user(explicit: Option<&str>) -> Result<String> {
    if let Some(user) = explicit {
        return Ok(user.to_string());
    }
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .context("Cannot determine the SSH user, pass --user")
}

fn resolve_credential(args: &RunArgs) -> Result<Credential> {
    match key_path(args, local_fs::default_private_key())? {
        Some(path) => {
            let passphrase = if args.passphrase {
                Some(prompt_secret(&format!("Passphrase for {}", path.display()))?)
            } else {
                None
            };
            Ok(Credential::Key { path, passphrase })
        }
        None => Ok(Credential::Password(prompt_secret("SSH password")?)),
    }
}

/// The private key to authenticate with, or `None` for password authentication.
/// `default_key` is used when no key is named and no password was asked for.
fn key_path(args: &RunArgs, default_key: PathBuf) -> Result<Option<PathBuf>> {
    let key = match (&args.key, args.ask_pass) {
        (Some(path), _) => Some(local_fs::expand_path(path)?),
        (None, true) => None,
        (None, false) => Some(default_key).filter(|path| path.is_file()),
    };

    match &key {
        Some(path) if !path.is_file() => bail!("private key {} not found", path.display()),
        None if args.passphrase => bail!(
            "--passphrase needs a private key, pass --key or create {}",
            local_fs::default_private_key().display()
        ),
        _ => Ok(key),
    }
}

fn prompt_secret(prompt: &str) -> Result<String> {
    Password::new()
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()
        .context("Failed to read from the terminal")
}

/// Sets up a signal handler for graceful shutdown.
/// The first Ctrl-C cancels the returned token; a second one exits at once.
fn setup_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            warn!("cannot listen for Ctrl-C: {e}");
            return;
        }
        println!(
            "\n{}",
            "Interrupt received, stopping (press Ctrl-C again to exit immediately)...".yellow()
        );
        token_clone.cancel();

        if signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted again, exiting.".red());
            process::exit(INTERRUPTED_EXIT_CODE);
        }
    });

    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_overrides_inventory_settings() {
        let mut settings = Settings::default();
        let args = RunArgs {
            jobs: Some(4),
            settle_ms: Some(250),
            fail_fast: true,
            ..RunArgs::default()
        };
        apply_overrides(&mut settings, &args);

        assert_eq!(settings.jobs, 4);
        assert_eq!(settings.settle_delay_ms, 250);
        assert!(settings.fail_fast);
        assert_eq!(settings.listener_timeout_secs, 10);
    }

    #[test]
    fn passphrase_without_a_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let args = RunArgs {
            passphrase: true,
            ..RunArgs::default()
        };

        let error = key_path(&args, dir.path().join("id_rsa")).unwrap_err();
        assert!(error.to_string().contains("--passphrase needs a private key"), "{error}");

        let args = RunArgs {
            ask_pass: true,
            passphrase: true,
            ..RunArgs::default()
        };
        assert!(key_path(&args, dir.path().join("id_rsa")).is_err());
    }

    #[test]
    fn default_key_is_used_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("id_rsa");
        std::fs::write(&key, "key").unwrap();
        let args = RunArgs {
            passphrase: true,
            ..RunArgs::default()
        };

        assert_eq!(key_path(&args, key.clone()).unwrap(), Some(key.clone()));
        assert_eq!(
            key_path(&RunArgs { ask_pass: true, ..RunArgs::default() }, key).unwrap(),
            None
        );
    }

    #[test]
    fn absent_flags_keep_inventory_settings() {
        let mut settings = Settings {
            jobs: 8,
            fail_fast: true,
            ..Settings::default()
        };
        apply_overrides(&mut settings, &RunArgs::default());

        assert_eq!(settings.jobs, 8);
        assert!(settings.fail_fast);
    }
}
