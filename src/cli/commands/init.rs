//! # Init Command Module / 初始化命令模块
//!
//! This module implements the `init` command, which writes a commented sample
//! inventory the operator can edit.
//!
//! 此模块实现了 `init` 命令，用于写入一个带注释的示例清单供操作员编辑。

use anyhow::{Context, Result, bail};
use colored::*;
use std::{fs, path::Path};

pub const SAMPLE_INVENTORY: &str = r#"# Port test inventory / 端口测试清单
#
# Every ordered pair of nodes is checked against the role rules:
#   both replication_primary  -> 4444, 4567, 4568
#   both message_broker       -> 4369, 25672
#   both search               -> 9300
#   application -> database        3306
#   application -> message_broker  5672, 5671, 61613, 61614
#   application -> search          9200

# Optional settings, shown with their defaults / 可选设置，显示其默认值
[settings]
remote_dir = ".porttest"        # relative to the login directory
jobs = 32                       # node or pair tasks in flight
settle_delay_ms = 1000          # pause between listener start and dialer
listener_timeout_secs = 10
dial_timeout_secs = 5
step_timeout_secs = 60          # upper bound on any remote command
connect_timeout_secs = 15
fail_fast = false               # abort when a node cannot be provisioned

[[nodes]]
name = "server1"
address = "192.168.1.100"
application = true
message_broker = true
search = true
replication_primary = true
# user = "deploy"               # overrides --user for this node
# ssh_port = 22

[[nodes]]
name = "server2"
address = "192.168.1.101"
database = true
"#;

/// Executes the init command.
///
/// # Arguments
/// * `output` - Path for the new inventory file
/// * `force` - Whether to overwrite an existing file
pub fn execute(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!(
            "{} already exists, use --force to overwrite it",
            output.display()
        );
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }

    fs::write(output, SAMPLE_INVENTORY)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} {}",
        "Sample inventory written to".green(),
        output.display().to_string().bold()
    );
    println!("Edit the node list, then run: porttest run -c {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{parse_inventory, sample_inventory};

    #[test]
    fn template_matches_sample_inventory() {
        let parsed = parse_inventory(SAMPLE_INVENTORY, Path::new("porttest.toml")).unwrap();
        assert_eq!(parsed, sample_inventory());
    }
}
