use super::KeyedLock;
use crate::application_port::{GroupService, RelationError};
use crate::domain_model::*;
use crate::domain_port::{GroupMemberRepo, GroupRepo, StorageTx, TxManager, UserRepo};
use crate::logger::*;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub struct RealGroupService {
    user_repo: Arc<dyn UserRepo>,
    group_repo: Arc<dyn GroupRepo>,
    group_member_repo: Arc<dyn GroupMemberRepo>,
    tx_manager: Arc<dyn TxManager>,
    locks: KeyedLock,
}

impl RealGroupService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        group_repo: Arc<dyn GroupRepo>,
        group_member_repo: Arc<dyn GroupMemberRepo>,
        tx_manager: Arc<dyn TxManager>,
    ) -> Self {
        Self {
            user_repo,
            group_repo,
            group_member_repo,
            tx_manager,
            locks: KeyedLock::new(),
        }
    }

    async fn begin(&self) -> Result<Box<dyn StorageTx<'_> + '_>, RelationError> {
        self.tx_manager
            .begin()
            .await
            .map_err(|e| RelationError::Store(e.to_string()))
    }

    async fn commit(tx: Box<dyn StorageTx<'_> + '_>) -> Result<(), RelationError> {
        tx.commit()
            .await
            .map_err(|e| RelationError::Store(e.to_string()))
    }

    /// Runs before any transaction opens.
    async fn ensure_users(&self, user_ids: &[UserId]) -> Result<(), RelationError> {
        let known: HashSet<UserId> = self
            .user_repo
            .list_by_ids(user_ids)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        let unknown: Vec<&str> = user_ids
            .iter()
            .filter(|id| !known.contains(*id))
            .map(UserId::as_str)
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(RelationError::BadRequest(format!(
                "unknown users: {}",
                unknown.join(", ")
            )))
        }
    }

    async fn load_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group_id: &GroupId,
    ) -> Result<GroupRecord, RelationError> {
        self.group_repo
            .get_in_tx(tx, group_id)
            .await?
            .ok_or(RelationError::GroupNotFound)
    }

    /// Existence first, then ownership.
    async fn load_owned_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group_id: &GroupId,
        caller: &UserId,
    ) -> Result<GroupRecord, RelationError> {
        let record = self.load_in_tx(tx, group_id).await?;
        if &record.owner != caller {
            return Err(RelationError::NotOwner);
        }
        Ok(record)
    }

    async fn enrich(&self, records: Vec<GroupRecord>) -> Result<Vec<Group>, RelationError> {
        let group_ids: Vec<GroupId> = records.iter().map(|r| r.id.clone()).collect();
        let mut by_group: HashMap<GroupId, Vec<UserId>> = HashMap::new();
        for member in self.group_member_repo.list_by_groups(&group_ids).await? {
            by_group
                .entry(member.group_id)
                .or_default()
                .push(member.user_id);
        }

        Ok(records
            .into_iter()
            .map(|record| {
                let members = by_group.remove(&record.id).unwrap_or_default();
                record.with_members(members)
            })
            .collect())
    }

    /// Removes the listed rows, and the group itself once nobody is left.
    async fn remove_rows_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group_id: &GroupId,
        rows: &[GroupMember],
        remaining: usize,
    ) -> Result<(), RelationError> {
        for row in rows {
            self.group_member_repo.delete_in_tx(tx, &row.id).await?;
        }
        if remaining == 0 {
            info!(%group_id, "last member left, removing group");
            self.group_repo.delete_in_tx(tx, group_id).await?;
        }
        Ok(())
    }
}

fn require_id(group: &GroupPayload) -> Result<GroupId, RelationError> {
    group
        .id
        .clone()
        .ok_or_else(|| RelationError::BadRequest("group id is required".to_owned()))
}

fn dedup(ids: impl IntoIterator<Item = UserId>) -> Vec<UserId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

#[async_trait::async_trait]
impl GroupService for RealGroupService {
    async fn query(&self, user_id: &UserId) -> Result<Vec<Group>, RelationError> {
        let records = self.group_repo.list_by_member(user_id).await?;
        self.enrich(records).await
    }

    async fn get(&self, group_id: &GroupId) -> Result<Group, RelationError> {
        let record = self
            .group_repo
            .get(group_id)
            .await?
            .ok_or(RelationError::GroupNotFound)?;
        let mut groups = self.enrich(vec![record]).await?;
        groups.pop().ok_or(RelationError::GroupNotFound)
    }

    async fn create(&self, caller: &UserId, group: GroupPayload) -> Result<Group, RelationError> {
        if group.name.trim().is_empty() {
            return Err(RelationError::BadRequest("group name is required".to_owned()));
        }

        let owner = group.owner.unwrap_or_else(|| caller.clone());
        let record = GroupRecord {
            id: GroupId::generate(),
            name: group.name,
            brief: group.brief,
            avatar: group.avatar,
            creator: group.creator.unwrap_or_else(|| caller.clone()),
            owner: owner.clone(),
            created_at: Utc::now(),
        };
        let members = dedup(
            [caller.clone(), owner]
                .into_iter()
                .chain(group.member_ids.unwrap_or_default()),
        );
        self.ensure_users(&members).await?;

        let mut tx = self.begin().await?;
        for user_id in &members {
            let row = GroupMember::new(record.id.clone(), user_id.clone());
            self.group_member_repo.insert_in_tx(&mut *tx, &row).await?;
        }
        self.group_repo.insert_in_tx(&mut *tx, &record).await?;
        Self::commit(tx).await?;

        info!(group_id = %record.id, members = members.len(), "group created");
        Ok(record.with_members(members))
    }

    async fn update(
        &self,
        caller: &UserId,
        group: GroupPayload,
    ) -> Result<GroupUpdateOutcome, RelationError> {
        let group_id = require_id(&group)?;
        let requested = group.member_ids.map(dedup);
        let mut referenced = requested.clone().unwrap_or_default();
        referenced.extend(group.owner.clone());
        self.ensure_users(&referenced).await?;

        let _guard = self.locks.lock(&group_id.0).await;

        let mut tx = self.begin().await?;
        let current = self.load_owned_in_tx(&mut *tx, &group_id, caller).await?;
        let existing = self.group_member_repo.list_in_tx(&mut *tx, &group_id).await?;

        // no roster in the body leaves membership alone
        let desired = requested.unwrap_or_else(|| member_ids(&existing));
        let diff = MemberDiff::compute(&existing, &desired);

        for user_id in &diff.to_add {
            let row = GroupMember::new(group_id.clone(), user_id.clone());
            self.group_member_repo.insert_in_tx(&mut *tx, &row).await?;
        }

        let updated = GroupRecord {
            name: group.name,
            brief: group.brief,
            avatar: group.avatar,
            owner: group.owner.unwrap_or(current.owner),
            ..current
        };
        self.group_repo.update_in_tx(&mut *tx, &updated).await?;
        self.remove_rows_in_tx(&mut *tx, &group_id, &diff.to_remove, desired.len())
            .await?;
        Self::commit(tx).await?;

        debug!(
            %group_id,
            added = diff.to_add.len(),
            removed = diff.to_remove.len(),
            "group updated"
        );
        Ok(GroupUpdateOutcome {
            group: updated.with_members(desired),
            removed: member_ids(&diff.to_remove),
        })
    }

    async fn delete(&self, caller: &UserId, group_id: &GroupId) -> Result<Group, RelationError> {
        let _guard = self.locks.lock(&group_id.0).await;

        let mut tx = self.begin().await?;
        let record = self.load_owned_in_tx(&mut *tx, group_id, caller).await?;
        let existing = self.group_member_repo.list_in_tx(&mut *tx, group_id).await?;
        self.group_member_repo
            .delete_by_group_in_tx(&mut *tx, group_id)
            .await?;
        self.group_repo.delete_in_tx(&mut *tx, group_id).await?;
        Self::commit(tx).await?;

        info!(%group_id, "group deleted");
        Ok(record.with_members(member_ids(&existing)))
    }

    async fn add_members(
        &self,
        caller: &UserId,
        change: &MemberChangeParams,
    ) -> Result<MemberChangeOutcome, RelationError> {
        if change.list.is_empty() {
            return Err(RelationError::BadRequest("empty member list".to_owned()));
        }
        let invited = dedup(change.list.iter().map(|e| e.id.clone()));
        self.ensure_users(&invited).await?;
        let _guard = self.locks.lock(&change.group_id.0).await;

        let mut tx = self.begin().await?;
        self.load_in_tx(&mut *tx, &change.group_id).await?;
        let existing = member_ids(
            &self
                .group_member_repo
                .list_in_tx(&mut *tx, &change.group_id)
                .await?,
        );
        if !existing.contains(caller) {
            return Err(RelationError::Forbidden("only members can invite"));
        }

        let mut seen: HashSet<UserId> = existing.iter().cloned().collect();
        let added: Vec<MemberChangeEntry> = change
            .list
            .iter()
            .filter(|entry| seen.insert(entry.id.clone()))
            .cloned()
            .collect();
        for entry in &added {
            let row = GroupMember::new(change.group_id.clone(), entry.id.clone());
            self.group_member_repo.insert_in_tx(&mut *tx, &row).await?;
        }
        Self::commit(tx).await?;

        let members = union_ids(
            &existing,
            &added.iter().map(|e| e.id.clone()).collect::<Vec<_>>(),
        );
        Ok(MemberChangeOutcome {
            changed: added,
            recipients: members.clone(),
            member_ids: members,
        })
    }

    async fn del_members(
        &self,
        caller: &UserId,
        change: &MemberChangeParams,
    ) -> Result<MemberChangeOutcome, RelationError> {
        if change.list.is_empty() {
            return Err(RelationError::BadRequest("empty member list".to_owned()));
        }
        let _guard = self.locks.lock(&change.group_id.0).await;

        let mut tx = self.begin().await?;
        self.load_owned_in_tx(&mut *tx, &change.group_id, caller)
            .await?;
        let existing = self
            .group_member_repo
            .list_in_tx(&mut *tx, &change.group_id)
            .await?;

        let mut removed_rows = Vec::new();
        let mut removed = Vec::new();
        for entry in &change.list {
            let Some(row) = existing.iter().find(|m| m.user_id == entry.id) else {
                continue;
            };
            if removed_rows.iter().any(|r: &GroupMember| r.id == row.id) {
                continue;
            }
            removed_rows.push(row.clone());
            removed.push(entry.clone());
        }

        let before = member_ids(&existing);
        let after: Vec<UserId> = before
            .iter()
            .filter(|id| !removed.iter().any(|e| &e.id == *id))
            .cloned()
            .collect();
        self.remove_rows_in_tx(&mut *tx, &change.group_id, &removed_rows, after.len())
            .await?;
        Self::commit(tx).await?;

        Ok(MemberChangeOutcome {
            changed: removed,
            recipients: union_ids(&before, &after),
            member_ids: after,
        })
    }

    async fn exit_group(
        &self,
        caller: &UserId,
        change: &MemberChangeParams,
    ) -> Result<MemberChangeOutcome, RelationError> {
        let [entry] = change.list.as_slice() else {
            return Err(RelationError::BadRequest(
                "exit takes exactly one member".to_owned(),
            ));
        };
        let _guard = self.locks.lock(&change.group_id.0).await;

        let mut tx = self.begin().await?;
        self.load_in_tx(&mut *tx, &change.group_id).await?;
        let existing = self
            .group_member_repo
            .list_in_tx(&mut *tx, &change.group_id)
            .await?;

        let row = existing
            .iter()
            .find(|m| m.user_id == entry.id)
            .cloned()
            .ok_or(RelationError::MemberNotFound)?;
        if &row.user_id != caller {
            return Err(RelationError::Forbidden("members can only exit themselves"));
        }

        let before = member_ids(&existing);
        let after: Vec<UserId> = before.iter().filter(|id| **id != row.user_id).cloned().collect();
        self.remove_rows_in_tx(&mut *tx, &change.group_id, &[row], after.len())
            .await?;
        Self::commit(tx).await?;

        Ok(MemberChangeOutcome {
            changed: vec![entry.clone()],
            recipients: before,
            member_ids: after,
        })
    }
}
