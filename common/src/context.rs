use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use k8s_openapi::{
    api::coordination::v1::{Lease, LeaseSpec},
    apimachinery::pkg::apis::meta::v1::MicroTime,
};
use kube::{
    Client,
    api::{Api, ObjectMeta, Patch, PatchParams, PostParams},
};
use serde_json::json;

pub const GROUP: &str = "charms.catalogue.dev";
/// Seconds a leader keeps the lease without renewing it
pub const LEASE_DURATION_SECONDS: i32 = 15;

fn get_prog_name() -> Option<String> {
    std::env::current_exe()
        .ok()?
        .file_name()?
        .to_str()?
        .to_owned()
        .into()
}

pub fn get_client_name() -> String {
    match get_prog_name().as_deref() {
        Some("operator") => format!("controller.{GROUP}"),
        _ => GROUP.to_string(),
    }
}

/// What a replica does with the lease on its next election round
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub enum LeaseAction {
    Create,
    Renew,
    TakeOver,
    Follow,
}

fn expired(spec: &LeaseSpec, now: DateTime<Utc>) -> bool {
    let duration = Duration::seconds(spec.lease_duration_seconds.unwrap_or(LEASE_DURATION_SECONDS).into());
    spec.renew_time
        .as_ref()
        .or(spec.acquire_time.as_ref())
        .is_none_or(|t| t.0 + duration < now)
}

pub fn lease_action(lease: Option<&Lease>, identity: &str, now: DateTime<Utc>) -> LeaseAction {
    let Some(lease) = lease else {
        return LeaseAction::Create;
    };
    match lease.spec.as_ref() {
        Some(spec) => match spec.holder_identity.as_deref() {
            Some(holder) if holder == identity => LeaseAction::Renew,
            Some(_) if !expired(spec, now) => LeaseAction::Follow,
            _ => LeaseAction::TakeOver,
        },
        None => LeaseAction::TakeOver,
    }
}

/// Only the current, unexpired holder is the leader
pub fn holds_lease(lease: &Lease, identity: &str, now: DateTime<Utc>) -> bool {
    lease.spec.as_ref().is_some_and(|s| {
        s.holder_identity.as_deref() == Some(identity) && !expired(s, now)
    })
}

/// Whether `identity` currently leads; a missing or unreadable lease means it does not
pub async fn is_leader(client: Client, namespace: &str, lease: &str, identity: &str) -> bool {
    let api: Api<Lease> = Api::namespaced(client, namespace);
    match api.get_opt(lease).await {
        Ok(Some(l)) => holds_lease(&l, identity, Utc::now()),
        Ok(None) => false,
        Err(e) => {
            tracing::warn!("Cannot read lease {namespace}/{lease}: {e}");
            false
        }
    }
}

fn held_by(identity: &str, now: DateTime<Utc>, transitions: i32) -> LeaseSpec {
    LeaseSpec {
        holder_identity: Some(identity.to_string()),
        lease_duration_seconds: Some(LEASE_DURATION_SECONDS),
        acquire_time: Some(MicroTime(now)),
        renew_time: Some(MicroTime(now)),
        lease_transitions: Some(transitions),
        ..Default::default()
    }
}

/// One election round: create, renew or take over the lease when possible.
///
/// Returns whether `identity` holds the lease afterwards. Losing a write race
/// to another replica is not an error.
pub async fn acquire_lease(client: Client, namespace: &str, name: &str, identity: &str) -> Result<bool> {
    let api: Api<Lease> = Api::namespaced(client, namespace);
    let now = Utc::now();
    let current = api.get_opt(name).await?;
    let res = match lease_action(current.as_ref(), identity, now) {
        LeaseAction::Follow => return Ok(false),
        LeaseAction::Create => {
            let lease = Lease {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    ..Default::default()
                },
                spec: Some(held_by(identity, now, 0)),
            };
            api.create(&PostParams::default(), &lease).await.map(|_| ())
        }
        LeaseAction::Renew => {
            let patch = Patch::Merge(json!({ "spec": { "renewTime": MicroTime(now) } }));
            api.patch(name, &PatchParams::default(), &patch).await.map(|_| ())
        }
        LeaseAction::TakeOver => {
            let Some(mut lease) = current else {
                return Ok(false);
            };
            let transitions = lease.spec.as_ref().and_then(|s| s.lease_transitions).unwrap_or(0);
            lease.spec = Some(held_by(identity, now, transitions + 1));
            // resourceVersion from the read makes a concurrent take over fail
            api.replace(name, &PostParams::default(), &lease).await.map(|_| ())
        }
    };
    match res {
        Ok(()) => Ok(true),
        Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(false),
        Err(e) => Err(Error::KubeError(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lease(holder: Option<&str>, renewed: DateTime<Utc>) -> Lease {
        Lease {
            spec: Some(LeaseSpec {
                holder_identity: holder.map(str::to_string),
                lease_duration_seconds: Some(LEASE_DURATION_SECONDS),
                renew_time: Some(MicroTime(renewed)),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_only_the_holder_leads() {
        let now = Utc::now();
        let held = lease(Some("operator-0"), now);
        assert!(holds_lease(&held, "operator-0", now));
        assert!(!holds_lease(&held, "operator-1", now));
        assert!(!holds_lease(&lease(None, now), "operator-0", now));
    }

    #[test]
    fn test_empty_lease_elects_nobody() {
        let now = Utc::now();
        let empty = Lease::default();
        assert!(!holds_lease(&empty, "operator-0", now) && !holds_lease(&empty, "operator-1", now));
    }

    #[test]
    fn test_expired_holder_no_longer_leads() {
        let now = Utc::now();
        let stale = lease(Some("operator-0"), now - Duration::seconds(60));
        assert!(!holds_lease(&stale, "operator-0", now));
    }

    #[test]
    fn test_two_replicas_election() {
        let now = Utc::now();
        assert_eq!(lease_action(None, "operator-0", now), LeaseAction::Create);

        let held = lease(Some("operator-0"), now);
        assert_eq!(lease_action(Some(&held), "operator-0", now), LeaseAction::Renew);
        assert_eq!(lease_action(Some(&held), "operator-1", now), LeaseAction::Follow);

        let stale = lease(Some("operator-0"), now - Duration::seconds(60));
        assert_eq!(lease_action(Some(&stale), "operator-1", now), LeaseAction::TakeOver);
        assert_eq!(lease_action(Some(&lease(None, now)), "operator-1", now), LeaseAction::TakeOver);
        assert_eq!(lease_action(Some(&Lease::default()), "operator-1", now), LeaseAction::TakeOver);
    }
}
