//! Lifecycle handlers of `genesyscloud_routing_skill_group`.
//!
//! Create and update calls are sent exactly once. What is retried is the
//! read that follows them, which polls until the platform serves the state
//! that was written.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::consistency::{ConsistencyCheck, FieldKind, DEFAULT_CONSISTENCY_CHECKS};
use crate::error::{ProviderError, Result};
use crate::retry::{with_retries, with_retries_for_read, RetryError, RetryPolicy};

use super::divisions::plan_member_divisions;
use super::model::{not_found, to_state, MemberDivisions, MemberDivisionsUpdate, SkillGroupConfig};
use super::proxy::SkillGroupProxy;
use super::RESOURCE_NAME;

/// Fields compared by the post-write consistency check.
pub const TRACKED_FIELDS: &[(&str, FieldKind)] = &[
    ("name", FieldKind::Plain),
    ("description", FieldKind::Plain),
    ("division_id", FieldKind::Plain),
    ("skill_conditions", FieldKind::JsonString),
];

/// Retry budgets of the lifecycle handlers.
#[derive(Debug, Clone)]
pub struct SkillGroupTimeouts {
    /// Budget for reads, including the post-write consistency window.
    pub read: RetryPolicy,
    /// Budget for a deleted group to stop being readable.
    pub delete: RetryPolicy,
    /// Mismatching reads tolerated before giving up.
    pub max_consistency_checks: u32,
}

impl Default for SkillGroupTimeouts {
    fn default() -> Self {
        Self {
            read: RetryPolicy::new(Duration::from_secs(5 * 60)),
            delete: RetryPolicy::new(Duration::from_secs(30)),
            max_consistency_checks: DEFAULT_CONSISTENCY_CHECKS,
        }
    }
}

pub(super) fn group_id(state: &Value) -> Result<&str> {
    state
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ProviderError::Validation(format!("{} state has no id", RESOURCE_NAME)))
}

/// Read errors worth another attempt: missing (only meaningful inside the
/// consistency window) or transient.
fn classify_read_error(err: ProviderError) -> RetryError {
    if err.is_not_found() || err.is_transient() {
        RetryError::retryable(err)
    } else {
        RetryError::non_retryable(err)
    }
}

/// Create a skill group, reconcile its member divisions and read it back.
#[instrument(skip_all, fields(name = tracing::field::Empty))]
pub async fn create(
    proxy: &dyn SkillGroupProxy,
    timeouts: &SkillGroupTimeouts,
    planned: &Value,
) -> Result<Value> {
    let config = SkillGroupConfig::from_state(planned)?;
    tracing::Span::current().record("name", config.name.as_str());

    let group = proxy.create_skill_group(&config.to_request()).await?;
    let id = group
        .id
        .clone()
        .ok_or_else(|| ProviderError::Sdk("created skill group has no id".to_string()))?;
    info!(id = %id, "created skill group {}", config.name);

    let home = config
        .division_id
        .clone()
        .or_else(|| group.division.as_ref().map(|d| d.id.clone()));

    let mut created = planned.clone();
    created["id"] = json!(id);
    if let Some(home) = &home {
        created["division_id"] = json!(home);
    }

    let result = async {
        reconcile_member_divisions(proxy, &id, &config, true, home.as_deref()).await?;
        read_after_write(proxy, timeouts, &id, planned).await
    }
    .await;
    result.map_err(|err| {
        warn!(id = %id, error = %err, "skill group created but not confirmed");
        ProviderError::partially_created(created, err)
    })
}

/// Update a skill group, reconcile its member divisions and read it back.
#[instrument(skip_all, fields(id = tracing::field::Empty))]
pub async fn update(
    proxy: &dyn SkillGroupProxy,
    timeouts: &SkillGroupTimeouts,
    prior: &Value,
    planned: &Value,
) -> Result<Value> {
    let id = group_id(prior)?.to_string();
    tracing::Span::current().record("id", id.as_str());
    let config = SkillGroupConfig::from_state(planned)?;

    let group = proxy.update_skill_group(&id, &config.to_request()).await?;
    info!(id = %id, "updated skill group {}", group.name);

    let home = config
        .division_id
        .clone()
        .or_else(|| group.division.as_ref().map(|d| d.id.clone()));
    reconcile_member_divisions(proxy, &id, &config, false, home.as_deref()).await?;

    let mut desired = planned.clone();
    desired["id"] = json!(id);
    read_after_write(proxy, timeouts, &id, &desired).await
}

async fn reconcile_member_divisions(
    proxy: &dyn SkillGroupProxy,
    id: &str,
    config: &SkillGroupConfig,
    is_create: bool,
    home_division: Option<&str>,
) -> Result<()> {
    if config.member_divisions == MemberDivisions::Unmanaged {
        return Ok(());
    }

    let current = proxy.get_member_divisions(id).await?;
    debug!(id, current = ?current, "read skill group member divisions");

    let changes =
        plan_member_divisions(proxy, &config.member_divisions, &current, is_create, home_division)
            .await?;
    if changes.is_empty() {
        debug!(id, "member divisions already up to date");
        return Ok(());
    }

    info!(
        id,
        add = changes.add.len(),
        remove = changes.remove.len(),
        "updating skill group member divisions"
    );
    proxy
        .update_member_divisions(
            id,
            &MemberDivisionsUpdate {
                add_division_ids: changes.add,
                remove_division_ids: changes.remove,
            },
        )
        .await
}

async fn read_after_write(
    proxy: &dyn SkillGroupProxy,
    timeouts: &SkillGroupTimeouts,
    id: &str,
    desired: &Value,
) -> Result<Value> {
    let check = ConsistencyCheck::new(RESOURCE_NAME, desired, TRACKED_FIELDS)
        .with_max_checks(timeouts.max_consistency_checks);
    read(proxy, timeouts, id, desired, &check, true)
        .await?
        .ok_or_else(|| not_found(id))
}

/// Read a skill group into resource state.
///
/// Returns `Ok(None)` when the group is gone, which is only concluded
/// outside the consistency window.
#[instrument(skip(proxy, timeouts, desired, check))]
pub async fn read(
    proxy: &dyn SkillGroupProxy,
    timeouts: &SkillGroupTimeouts,
    id: &str,
    desired: &Value,
    check: &ConsistencyCheck,
    in_window: bool,
) -> Result<Option<Value>> {
    debug!("reading skill group");
    let state = with_retries_for_read(&timeouts.read, in_window, || async move {
        let group = proxy
            .get_skill_group(id)
            .await
            .map_err(classify_read_error)?;
        let state = to_state(&group, id, desired);
        check.check(&state)?;
        Ok(state)
    })
    .await?;

    if state.is_none() {
        info!("skill group no longer exists");
    }
    Ok(state)
}

/// Delete a skill group and wait until reads stop returning it.
#[instrument(skip(proxy, timeouts))]
pub async fn delete(
    proxy: &dyn SkillGroupProxy,
    timeouts: &SkillGroupTimeouts,
    id: &str,
) -> Result<()> {
    match proxy.delete_skill_group(id).await {
        Ok(()) => {},
        Err(err) if err.is_not_found() => {
            info!("skill group already deleted");
            return Ok(());
        },
        Err(err) => return Err(err),
    }

    with_retries(&timeouts.delete, || async move {
        match proxy.get_skill_group(id).await {
            Err(err) if err.is_not_found() => {
                info!("deleted skill group");
                Ok(())
            },
            Err(err) => Err(RetryError::non_retryable(err)),
            Ok(_) => Err(RetryError::retryable(ProviderError::api(
                RESOURCE_NAME,
                200,
                format!("Skill group {} still exists", id),
            ))),
        }
    })
    .await
}

/// Import an existing skill group by id.
pub async fn import(
    proxy: &dyn SkillGroupProxy,
    timeouts: &SkillGroupTimeouts,
    id: &str,
) -> Result<Value> {
    let desired = json!({ "id": id });
    read(proxy, timeouts, id, &desired, &ConsistencyCheck::disabled(), false)
        .await?
        .ok_or_else(|| not_found(id))
}

/// Every skill group in the org as id to name.
pub async fn export(proxy: &dyn SkillGroupProxy) -> Result<BTreeMap<String, String>> {
    let groups = proxy.get_all_skill_groups(None).await?;
    Ok(groups
        .into_iter()
        .filter_map(|g| g.id.map(|id| (id, g.name)))
        .collect())
}
