//! REST calls behind the skill group resource.
//!
//! Handlers only talk to the platform through [`SkillGroupProxy`], so tests
//! can swap the HTTP client for an in-memory fake.

use async_trait::async_trait;
use tracing::debug;

use crate::client::api;
use crate::client::models::Division;
use crate::client::GenesysClient;
use crate::error::Result;

use super::model::{MemberDivisionListing, MemberDivisionsUpdate, SkillGroup, SkillGroupListing};
use super::RESOURCE_NAME;

/// Skill group operations on the platform.
#[async_trait]
pub trait SkillGroupProxy: Send + Sync {
    /// `POST routing/skillgroups`.
    async fn create_skill_group(&self, group: &SkillGroup) -> Result<SkillGroup>;

    /// `PATCH routing/skillgroups/{id}`.
    async fn update_skill_group(&self, id: &str, group: &SkillGroup) -> Result<SkillGroup>;

    /// `GET routing/skillgroups/{id}`. 404 surfaces as an error with status 404.
    async fn get_skill_group(&self, id: &str) -> Result<SkillGroup>;

    /// `DELETE routing/skillgroups/{id}`.
    async fn delete_skill_group(&self, id: &str) -> Result<()>;

    /// `GET routing/skillgroups/{id}/members/divisions`.
    async fn get_member_divisions(&self, id: &str) -> Result<Vec<String>>;

    /// `POST routing/skillgroups/{id}/members/divisions`.
    async fn update_member_divisions(&self, id: &str, update: &MemberDivisionsUpdate)
        -> Result<()>;

    /// One page of `GET authorization/divisions` (1-based).
    async fn list_divisions(&self, page_number: u32, page_size: u32) -> Result<Vec<Division>>;

    /// One page of `GET routing/skillgroups`, optionally filtered by name.
    async fn list_skill_groups(
        &self,
        after: Option<&str>,
        name: Option<&str>,
    ) -> Result<SkillGroupListing>;

    /// Every skill group, following the cursor to the end.
    async fn get_all_skill_groups(&self, name: Option<&str>) -> Result<Vec<SkillGroup>> {
        let mut all = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let page = self.list_skill_groups(after.as_deref(), name).await?;
            let next = page.next_cursor();
            if page.entities.is_empty() {
                break;
            }
            all.extend(page.entities);
            match next {
                Some(cursor) if after.as_deref() != Some(cursor.as_str()) => after = Some(cursor),
                _ => break,
            }
        }
        debug!(count = all.len(), "fetched all skill groups");
        Ok(all)
    }
}

fn skill_group_path(id: &str) -> String {
    format!("routing/skillgroups/{}", urlencoding::encode(id))
}

#[async_trait]
impl SkillGroupProxy for GenesysClient {
    async fn create_skill_group(&self, group: &SkillGroup) -> Result<SkillGroup> {
        self.post_json("routing/skillgroups", group, RESOURCE_NAME).await
    }

    async fn update_skill_group(&self, id: &str, group: &SkillGroup) -> Result<SkillGroup> {
        self.patch_json(&skill_group_path(id), group, RESOURCE_NAME).await
    }

    async fn get_skill_group(&self, id: &str) -> Result<SkillGroup> {
        self.get_json(&skill_group_path(id), RESOURCE_NAME).await
    }

    async fn delete_skill_group(&self, id: &str) -> Result<()> {
        self.delete(&skill_group_path(id), RESOURCE_NAME).await
    }

    async fn get_member_divisions(&self, id: &str) -> Result<Vec<String>> {
        let path = format!("{}/members/divisions", skill_group_path(id));
        let listing: MemberDivisionListing = self.get_json(&path, RESOURCE_NAME).await?;
        Ok(listing.entities.into_iter().map(|d| d.id).collect())
    }

    async fn update_member_divisions(
        &self,
        id: &str,
        update: &MemberDivisionsUpdate,
    ) -> Result<()> {
        let path = format!("{}/members/divisions", skill_group_path(id));
        self.post_no_content(&path, update, RESOURCE_NAME).await
    }

    async fn list_divisions(&self, page_number: u32, page_size: u32) -> Result<Vec<Division>> {
        GenesysClient::list_divisions(self, page_number, page_size).await
    }

    async fn list_skill_groups(
        &self,
        after: Option<&str>,
        name: Option<&str>,
    ) -> Result<SkillGroupListing> {
        let mut path = format!("routing/skillgroups?pageSize={}", api::DEFAULT_PAGE_SIZE);
        if let Some(after) = after {
            path.push_str(&format!("&after={}", urlencoding::encode(after)));
        }
        if let Some(name) = name {
            path.push_str(&format!("&name={}", urlencoding::encode(name)));
        }
        self.get_json(&path, RESOURCE_NAME).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_create_skill_group() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/routing/skillgroups"))
            .and(body_json(json!({
                "name": "Support",
                "description": "",
                "skillConditions": []
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "sg-1",
                "name": "Support",
                "division": {"id": "home"},
                "skillConditions": []
            })))
            .mount(&server)
            .await;

        let client = GenesysClient::test_client(&server.uri());
        let created = client
            .create_skill_group(&SkillGroup {
                name: "Support".to_string(),
                description: Some(String::new()),
                skill_conditions: Some(vec![]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created.id.as_deref(), Some("sg-1"));
        assert_eq!(created.division.unwrap().id, "home");
    }

    #[tokio::test]
    async fn test_get_missing_skill_group_is_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/routing/skillgroups/sg-404"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "not found"})),
            )
            .mount(&server)
            .await;

        let client = GenesysClient::test_client(&server.uri());
        let err = client.get_skill_group("sg-404").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_member_divisions_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/routing/skillgroups/sg-1/members/divisions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entities": [{"id": "home"}, {"id": "d1"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v2/routing/skillgroups/sg-1/members/divisions"))
            .and(body_json(json!({"addDivisionIds": ["d2"], "removeDivisionIds": ["d1"]})))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let client = GenesysClient::test_client(&server.uri());
        assert_eq!(
            client.get_member_divisions("sg-1").await.unwrap(),
            vec!["home".to_string(), "d1".to_string()]
        );
        client
            .update_member_divisions(
                "sg-1",
                &MemberDivisionsUpdate {
                    add_division_ids: vec!["d2".to_string()],
                    remove_division_ids: vec!["d1".to_string()],
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_all_skill_groups_follows_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/routing/skillgroups"))
            .and(query_param("after", "c2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entities": [{"id": "sg-3", "name": "Three"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/routing/skillgroups"))
            .and(query_param("pageSize", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entities": [{"id": "sg-1", "name": "One"}, {"id": "sg-2", "name": "Two"}],
                "nextUri": "/api/v2/routing/skillgroups?pageSize=100&after=c2"
            })))
            .mount(&server)
            .await;

        let client = GenesysClient::test_client(&server.uri());
        let all = client.get_all_skill_groups(None).await.unwrap();
        let ids: Vec<_> = all.iter().filter_map(|g| g.id.as_deref()).collect();
        assert_eq!(ids, vec!["sg-1", "sg-2", "sg-3"]);
    }

    #[tokio::test]
    async fn test_list_skill_groups_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/routing/skillgroups"))
            .and(query_param("name", "Tier 1 Support"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entities": [{"id": "sg-9", "name": "Tier 1 Support"}]
            })))
            .mount(&server)
            .await;

        let client = GenesysClient::test_client(&server.uri());
        let page = client
            .list_skill_groups(None, Some("Tier 1 Support"))
            .await
            .unwrap();
        assert_eq!(page.entities[0].id.as_deref(), Some("sg-9"));
    }

    #[tokio::test]
    async fn test_delete_skill_group() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v2/routing/skillgroups/sg-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = GenesysClient::test_client(&server.uri());
        client.delete_skill_group("sg-1").await.unwrap();
    }
}
