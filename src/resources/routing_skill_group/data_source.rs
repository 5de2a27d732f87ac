//! `genesyscloud_routing_skill_group` data source: skill group id by name.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::error::{ProviderError, Result};
use crate::retry::{with_retries, RetryError, RetryPolicy};

use super::proxy::SkillGroupProxy;

/// How long a freshly created group may take to show up in searches.
pub fn lookup_policy() -> RetryPolicy {
    RetryPolicy::new(Duration::from_secs(15))
        .with_interval(Duration::from_secs(1))
        .with_restarts(0)
}

/// Look up the id of the skill group named exactly `name`.
#[instrument(skip(proxy, policy))]
pub async fn read(proxy: &dyn SkillGroupProxy, policy: &RetryPolicy, name: &str) -> Result<Value> {
    let id = with_retries(policy, || async move {
        let groups = proxy
            .get_all_skill_groups(Some(name))
            .await
            .map_err(|e| RetryError::non_retryable(e))?;
        match groups.into_iter().find(|g| g.name == name).and_then(|g| g.id) {
            Some(id) => Ok(id),
            None => Err(RetryError::retryable(ProviderError::NotFound(format!(
                "No skill group found with name {}",
                name
            )))),
        }
    })
    .await?;

    debug!(id = %id, "resolved skill group");
    Ok(json!({ "id": id, "name": name }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::routing_skill_group::model::SkillGroup;
    use crate::resources::routing_skill_group::testing::{FakeSkillGroupApi, HOME_DIVISION};

    fn policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(30))
            .with_interval(Duration::from_millis(2))
            .with_restarts(0)
    }

    #[tokio::test]
    async fn test_lookup_by_exact_name() {
        let api = FakeSkillGroupApi::new();
        for (id, name) in [("sg-1", "Support"), ("sg-2", "Support Tier 2")] {
            api.insert(
                SkillGroup {
                    id: Some(id.to_string()),
                    name: name.to_string(),
                    ..Default::default()
                },
                &[HOME_DIVISION],
            );
        }

        let found = read(&api, &policy(), "Support").await.unwrap();
        assert_eq!(found, json!({"id": "sg-1", "name": "Support"}));
    }

    #[tokio::test]
    async fn test_missing_name_times_out() {
        let api = FakeSkillGroupApi::new();
        let err = read(&api, &policy(), "Nobody").await.unwrap_err();
        assert!(matches!(err, ProviderError::DeadlineExceeded(_)));
        assert!(err.to_string().contains("No skill group found with name Nobody"));
    }
}
