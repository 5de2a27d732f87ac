//! In-memory skill group API with configurable propagation lag.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::models::{Division, EntityRef};
use crate::error::{ProviderError, Result};

use super::model::{MemberDivisionsUpdate, SkillGroup, SkillGroupListing};
use super::proxy::SkillGroupProxy;
use super::RESOURCE_NAME;

pub const HOME_DIVISION: &str = "home";

struct Entry {
    current: SkillGroup,
    /// What reads return while the write is still propagating.
    previous: Option<SkillGroup>,
    lag_left: u32,
}

#[derive(Default)]
struct State {
    groups: HashMap<String, Entry>,
    /// Deleted groups that stay readable for a few more reads.
    lingering: HashMap<String, (SkillGroup, u32)>,
    members: HashMap<String, Vec<String>>,
    member_updates: Vec<(String, MemberDivisionsUpdate)>,
    division_page_requests: u32,
    get_calls: u32,
    next_id: u32,
}

pub struct FakeSkillGroupApi {
    state: Mutex<State>,
    divisions: Vec<Division>,
    lag: u32,
    delete_linger: u32,
    poll_error: Option<u16>,
}

fn not_found(id: &str) -> ProviderError {
    ProviderError::api(RESOURCE_NAME, 404, format!("skill group {} not found", id))
}

impl FakeSkillGroupApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            divisions: Vec::new(),
            lag: 0,
            delete_linger: 0,
            poll_error: None,
        }
    }

    pub fn with_divisions(mut self, ids: &[&str]) -> Self {
        self.divisions = ids
            .iter()
            .map(|id| Division {
                id: id.to_string(),
                name: Some(format!("Division {}", id)),
                home_division: Some(*id == HOME_DIVISION),
            })
            .collect();
        self
    }

    /// Reads after a write return the old state this many times.
    pub fn with_lag(mut self, reads: u32) -> Self {
        self.lag = reads;
        self
    }

    /// Deleted groups stay readable this many times. `u32::MAX` never goes away.
    pub fn with_delete_linger(mut self, reads: u32) -> Self {
        self.delete_linger = reads;
        self
    }

    /// Reads of a deleted group fail with this status instead of 404.
    pub fn with_poll_error(mut self, status: u16) -> Self {
        self.poll_error = Some(status);
        self
    }

    /// Seed an existing group with its members.
    pub fn insert(&self, group: SkillGroup, members: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let id = group.id.clone().unwrap();
        state
            .members
            .insert(id.clone(), members.iter().map(|m| m.to_string()).collect());
        state.groups.insert(
            id,
            Entry {
                current: group,
                previous: None,
                lag_left: 0,
            },
        );
    }

    pub fn group(&self, id: &str) -> Option<SkillGroup> {
        let state = self.state.lock().unwrap();
        state.groups.get(id).map(|e| e.current.clone())
    }

    pub fn members_of(&self, id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.members.get(id).cloned().unwrap_or_default()
    }

    pub fn member_updates(&self) -> Vec<(String, MemberDivisionsUpdate)> {
        self.state.lock().unwrap().member_updates.clone()
    }

    pub fn division_page_requests(&self) -> u32 {
        self.state.lock().unwrap().division_page_requests
    }

    pub fn get_calls(&self) -> u32 {
        self.state.lock().unwrap().get_calls
    }
}

#[async_trait]
impl SkillGroupProxy for FakeSkillGroupApi {
    async fn create_skill_group(&self, group: &SkillGroup) -> Result<SkillGroup> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("sg-{}", state.next_id);

        let mut created = group.clone();
        created.id = Some(id.clone());
        if created.division.is_none() {
            created.division = Some(EntityRef {
                id: HOME_DIVISION.to_string(),
                name: None,
            });
        }
        let home = created.division.as_ref().map(|d| d.id.clone()).unwrap_or_default();

        state.members.insert(id.clone(), vec![home]);
        state.groups.insert(
            id,
            Entry {
                current: created.clone(),
                previous: None,
                lag_left: self.lag,
            },
        );
        Ok(created)
    }

    async fn update_skill_group(&self, id: &str, group: &SkillGroup) -> Result<SkillGroup> {
        let mut state = self.state.lock().unwrap();
        let entry = state.groups.get_mut(id).ok_or_else(|| not_found(id))?;

        let mut updated = group.clone();
        updated.id = Some(id.to_string());
        if updated.division.is_none() {
            updated.division = entry.current.division.clone();
        }
        entry.previous = Some(std::mem::replace(&mut entry.current, updated.clone()));
        entry.lag_left = self.lag;
        Ok(updated)
    }

    async fn get_skill_group(&self, id: &str) -> Result<SkillGroup> {
        let mut state = self.state.lock().unwrap();
        state.get_calls += 1;

        if let Some(entry) = state.groups.get_mut(id) {
            if entry.lag_left > 0 {
                entry.lag_left -= 1;
                return entry.previous.clone().ok_or_else(|| not_found(id));
            }
            return Ok(entry.current.clone());
        }

        if let Some((group, reads_left)) = state.lingering.get_mut(id) {
            if *reads_left > 0 {
                if *reads_left != u32::MAX {
                    *reads_left -= 1;
                }
                return Ok(group.clone());
            }
            if let Some(status) = self.poll_error {
                return Err(ProviderError::api(RESOURCE_NAME, status, "internal error"));
            }
        }
        Err(not_found(id))
    }

    async fn delete_skill_group(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let entry = state.groups.remove(id).ok_or_else(|| not_found(id))?;
        state.members.remove(id);
        state
            .lingering
            .insert(id.to_string(), (entry.current, self.delete_linger));
        Ok(())
    }

    async fn get_member_divisions(&self, id: &str) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        state.members.get(id).cloned().ok_or_else(|| not_found(id))
    }

    async fn update_member_divisions(
        &self,
        id: &str,
        update: &MemberDivisionsUpdate,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.member_updates.push((id.to_string(), update.clone()));
        let members = state.members.get_mut(id).ok_or_else(|| not_found(id))?;
        members.retain(|m| !update.remove_division_ids.contains(m));
        for add in &update.add_division_ids {
            if !members.contains(add) {
                members.push(add.clone());
            }
        }
        Ok(())
    }

    async fn list_divisions(&self, page_number: u32, page_size: u32) -> Result<Vec<Division>> {
        self.state.lock().unwrap().division_page_requests += 1;
        let start = ((page_number.max(1) - 1) * page_size) as usize;
        Ok(self
            .divisions
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect())
    }

    async fn list_skill_groups(
        &self,
        _after: Option<&str>,
        name: Option<&str>,
    ) -> Result<SkillGroupListing> {
        let state = self.state.lock().unwrap();
        let mut entities: Vec<SkillGroup> = state
            .groups
            .values()
            .map(|e| e.current.clone())
            .filter(|g| name.map_or(true, |n| g.name == n))
            .collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(SkillGroupListing {
            entities,
            next_uri: None,
        })
    }
}
