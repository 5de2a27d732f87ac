//! Member division reconciliation.
//!
//! Computes which divisions to add to and remove from a skill group so that
//! its membership matches the configuration, in a single
//! `members/divisions` call.

use tracing::debug;

use crate::client::api::DEFAULT_PAGE_SIZE;
use crate::error::Result;

use super::model::MemberDivisions;
use super::proxy::SkillGroupProxy;

/// Divisions to add and remove. The two lists never overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DivisionChanges {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl DivisionChanges {
    /// Whether there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Enumerate every division id in the org, page by page until an empty page.
pub async fn all_division_ids<P>(proxy: &P) -> Result<Vec<String>>
where
    P: SkillGroupProxy + ?Sized,
{
    let mut ids = Vec::new();
    for page_number in 1.. {
        let page = proxy.list_divisions(page_number, DEFAULT_PAGE_SIZE).await?;
        if page.is_empty() {
            break;
        }
        for division in page {
            if !ids.contains(&division.id) {
                ids.push(division.id);
            }
        }
    }
    debug!(count = ids.len(), "enumerated divisions");
    Ok(ids)
}

/// Diff an explicit desired list against the current members.
///
/// On create every desired id is added. On update only the difference in
/// each direction is sent. An empty desired list removes everything.
pub fn diff_ids(desired: &[String], current: &[String], is_create: bool) -> DivisionChanges {
    if desired.is_empty() {
        return DivisionChanges {
            add: Vec::new(),
            remove: dedup(current.iter()),
        };
    }
    if is_create {
        return DivisionChanges {
            add: dedup(desired.iter()),
            remove: Vec::new(),
        };
    }
    DivisionChanges {
        add: dedup(desired.iter().filter(|id| !current.contains(id))),
        remove: dedup(current.iter().filter(|id| !desired.contains(id))),
    }
}

fn dedup<'a>(ids: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for id in ids {
        if !out.contains(id) {
            out.push(id.clone());
        }
    }
    out
}

/// Work out the member division changes for a skill group.
///
/// `home_division` is never removed since the platform rejects that.
pub async fn plan_member_divisions<P>(
    proxy: &P,
    desired: &MemberDivisions,
    current: &[String],
    is_create: bool,
    home_division: Option<&str>,
) -> Result<DivisionChanges>
where
    P: SkillGroupProxy + ?Sized,
{
    let mut changes = match desired {
        MemberDivisions::Unmanaged => return Ok(DivisionChanges::default()),
        MemberDivisions::All => DivisionChanges {
            add: all_division_ids(proxy).await?,
            remove: Vec::new(),
        },
        MemberDivisions::Specific(ids) => diff_ids(ids, current, is_create),
    };

    if let Some(home) = home_division {
        changes.remove.retain(|id| id != home);
    }
    Ok(changes)
}
