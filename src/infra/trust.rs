//! # Host Key Trust / 主机密钥信任
//!
//! Trust-on-first-use decisions for presented host keys. The lookup against the
//! known-hosts file is done by the SSH layer; this module only decides what a
//! lookup result means, so the policy can be tested on its own.
//!
//! 对所呈现主机密钥的首次使用信任决策。对 known-hosts 文件的查找由 SSH 层完成；
//! 此模块只决定查找结果的含义，因此可以单独测试该策略。

use crate::infra::gateway::GatewayError;

/// Result of looking a host key up in the known-hosts store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKeyStatus {
    /// Host known, presented key matches.
    Match,
    /// Host known, presented key differs.
    Mismatch,
    /// Host not in the store.
    NotFound,
    /// The store could not be consulted.
    Failure,
}

/// What to do with a presented key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDecision {
    /// Already trusted, continue silently.
    Accept,
    /// Unknown but the operator opted in: continue and persist the key.
    AcceptAndPersist,
}

/// Applies the trust-on-first-use policy.
///
/// A key that conflicts with a previously trusted one is always rejected,
/// whatever `auto_trust` says.
///
/// 应用首次使用信任策略。与先前受信任密钥冲突的密钥总是被拒绝，无论 `auto_trust` 如何。
pub fn evaluate(host: &str, status: HostKeyStatus, auto_trust: bool) -> Result<TrustDecision, GatewayError> {
    match status {
        HostKeyStatus::Match => Ok(TrustDecision::Accept),
        HostKeyStatus::Mismatch => Err(GatewayError::HostTrust(format!(
            "host key for {host} does not match the key in known_hosts; \
             the connection may be intercepted, refusing to continue"
        ))),
        HostKeyStatus::NotFound if auto_trust => Ok(TrustDecision::AcceptAndPersist),
        HostKeyStatus::NotFound => Err(GatewayError::HostTrust(format!(
            "host key for {host} is missing from known_hosts, \
             use --accept-host-keys to accept unknown host keys"
        ))),
        HostKeyStatus::Failure => Err(GatewayError::HostTrust(format!(
            "could not check the host key for {host} against known_hosts"
        ))),
    }
}

/// The host pattern known_hosts uses: bare for port 22, bracketed otherwise.
pub fn known_hosts_entry(host: &str, port: u16) -> String {
    if port == 22 {
        host.to_string()
    } else {
        format!("[{host}]:{port}")
    }
}
