//! Host binding state machine.
//!
//! # States
//! - Unbound: no domain declared, every Host is accepted
//! - BoundSingleDomain: bound to its domain set, plaintext only
//! - BoundWithTls: certificate attached, plaintext redirected
//!
//! # State Transitions
//! ```text
//! (none)             → any              : Initial
//! Unbound            → Bound*           : Bind
//! BoundSingleDomain  → BoundWithTls     : AttachTls (same domains)
//! BoundWithTls       → BoundWithTls     : RenewCertificate (same domains)
//! Bound*(A)          → Bound*(B)        : DomainMigration
//! BoundSingleDomain  → Unbound          : Unbind
//! BoundWithTls       → !BoundWithTls    : rejected (TLS is terminal)
//! ```
//!
//! Transitions are planned on configurations alone, before anything is
//! loaded, so a rejected plan never touches the running binding.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::binding::BindingError;
use crate::config::schema::HostBindingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingState {
    Unbound,
    BoundSingleDomain,
    BoundWithTls,
}

impl BindingState {
    pub fn of(config: &HostBindingConfig) -> Self {
        match (config.domains.is_empty(), config.tls.is_some()) {
            (true, _) => BindingState::Unbound,
            (false, false) => BindingState::BoundSingleDomain,
            (false, true) => BindingState::BoundWithTls,
        }
    }
}

impl std::fmt::Display for BindingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BindingState::Unbound => "unbound",
            BindingState::BoundSingleDomain => "bound-single-domain",
            BindingState::BoundWithTls => "bound-with-tls",
        };
        f.write_str(name)
    }
}

/// How the active binding changes when a configuration is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Initial(BindingState),
    Unchanged,
    Bind,
    AttachTls,
    RenewCertificate,
    DomainMigration { from: Vec<String>, to: Vec<String> },
    Unbind,
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transition::Initial(state) => write!(f, "initial ({state})"),
            Transition::Unchanged => f.write_str("unchanged"),
            Transition::Bind => f.write_str("bind"),
            Transition::AttachTls => f.write_str("attach-tls"),
            Transition::RenewCertificate => f.write_str("renew-certificate"),
            Transition::DomainMigration { from, to } => {
                write!(f, "domain-migration ({} -> {})", from.join(","), to.join(","))
            }
            Transition::Unbind => f.write_str("unbind"),
        }
    }
}

fn domain_set(config: &HostBindingConfig) -> BTreeSet<String> {
    config
        .domains
        .iter()
        .map(|d| d.trim_end_matches('.').to_ascii_lowercase())
        .collect()
}

/// Decide how `current` becomes `next`, or refuse.
pub fn plan_transition(
    current: Option<&HostBindingConfig>,
    next: &HostBindingConfig,
) -> Result<Transition, BindingError> {
    let next_state = BindingState::of(next);
    let Some(current) = current else {
        return Ok(Transition::Initial(next_state));
    };
    let current_state = BindingState::of(current);

    let (from, to) = (domain_set(current), domain_set(next));
    if from == to && current.tls == next.tls {
        return Ok(Transition::Unchanged);
    }

    match (current_state, next_state) {
        (BindingState::BoundWithTls, BindingState::BoundWithTls) if from == to => {
            Ok(Transition::RenewCertificate)
        }
        (BindingState::BoundWithTls, state) if state != BindingState::BoundWithTls => {
            Err(BindingError::TlsDowngrade)
        }
        (BindingState::Unbound, _) => Ok(Transition::Bind),
        (_, BindingState::Unbound) => Ok(Transition::Unbind),
        _ if from != to => Ok(Transition::DomainMigration {
            from: from.into_iter().collect(),
            to: to.into_iter().collect(),
        }),
        (BindingState::BoundSingleDomain, BindingState::BoundWithTls) => Ok(Transition::AttachTls),
        _ => Ok(Transition::Unchanged),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TlsConfig;

    fn plain(domains: &[&str]) -> HostBindingConfig {
        HostBindingConfig {
            domains: domains.iter().map(|d| d.to_string()).collect(),
            tls: None,
            redirect_http: true,
        }
    }

    fn tls(domains: &[&str], cert: &str) -> HostBindingConfig {
        HostBindingConfig {
            tls: Some(TlsConfig {
                cert_path: cert.into(),
                key_path: "key.pem".into(),
            }),
            ..plain(domains)
        }
    }

    #[test]
    fn classifies_states() {
        assert_eq!(BindingState::of(&plain(&[])), BindingState::Unbound);
        assert_eq!(BindingState::of(&plain(&["a.test"])), BindingState::BoundSingleDomain);
        assert_eq!(BindingState::of(&tls(&["a.test"], "a.pem")), BindingState::BoundWithTls);
    }

    #[test]
    fn lifecycle_transitions() {
        let unbound = plain(&[]);
        let single = plain(&["a.test"]);
        let secured = tls(&["a.test"], "a.pem");

        assert_eq!(
            plan_transition(None, &secured).unwrap(),
            Transition::Initial(BindingState::BoundWithTls)
        );
        assert_eq!(plan_transition(Some(&unbound), &single).unwrap(), Transition::Bind);
        assert_eq!(plan_transition(Some(&single), &secured).unwrap(), Transition::AttachTls);
        assert_eq!(
            plan_transition(Some(&secured), &tls(&["A.test"], "a.pem")).unwrap(),
            Transition::Unchanged
        );
        assert_eq!(
            plan_transition(Some(&secured), &tls(&["a.test"], "renewed.pem")).unwrap(),
            Transition::RenewCertificate
        );
        assert_eq!(plan_transition(Some(&single), &unbound).unwrap(), Transition::Unbind);
    }

    #[test]
    fn domain_migration() {
        let a = tls(&["a.test"], "a.pem");
        let b = tls(&["b.test"], "b.pem");
        assert_eq!(
            plan_transition(Some(&a), &b).unwrap(),
            Transition::DomainMigration {
                from: vec!["a.test".into()],
                to: vec!["b.test".into()],
            }
        );
        assert_eq!(
            plan_transition(Some(&plain(&["a.test"])), &plain(&["b.test"])).unwrap(),
            Transition::DomainMigration {
                from: vec!["a.test".into()],
                to: vec!["b.test".into()],
            }
        );
    }

    #[test]
    fn tls_is_terminal() {
        let secured = tls(&["a.test"], "a.pem");
        assert!(matches!(
            plan_transition(Some(&secured), &plain(&["a.test"])),
            Err(BindingError::TlsDowngrade)
        ));
        assert!(matches!(
            plan_transition(Some(&secured), &plain(&[])),
            Err(BindingError::TlsDowngrade)
        ));
        assert!(matches!(
            plan_transition(Some(&secured), &plain(&["b.test"])),
            Err(BindingError::TlsDowngrade)
        ));
    }
}
