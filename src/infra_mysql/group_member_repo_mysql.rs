use super::util::{downcast, is_dup_key};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};

pub struct MySqlGroupMemberRepo {
    pool: MySqlPool,
}

impl MySqlGroupMemberRepo {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn row_to_item(r: &MySqlRow) -> Result<GroupMember, RelationError> {
        let decode = |e: sqlx::Error| RelationError::store("decode group_member row", e);
        Ok(GroupMember {
            id: r.try_get::<String, _>("id").map_err(decode)?,
            group_id: r.try_get::<GroupId, _>("group_id").map_err(decode)?,
            user_id: r.try_get::<UserId, _>("user_id").map_err(decode)?,
        })
    }
}

#[async_trait::async_trait]
impl GroupMemberRepo for MySqlGroupMemberRepo {
    async fn list_by_groups(
        &self,
        group_ids: &[GroupId],
    ) -> Result<Vec<GroupMember>, RelationError> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<MySql> =
            QueryBuilder::new("SELECT id, group_id, user_id FROM group_member WHERE group_id IN (");
        let mut separated = query.separated(", ");
        for group_id in group_ids {
            separated.push_bind(group_id);
        }
        separated.push_unseparated(") ORDER BY id");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RelationError::store("list group members", e))?;

        rows.iter().map(Self::row_to_item).collect()
    }

    async fn list_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group_id: &GroupId,
    ) -> Result<Vec<GroupMember>, RelationError> {
        let tx = downcast(tx)?;

        let rows = sqlx::query(
            r#"
SELECT id, group_id, user_id
FROM group_member
WHERE group_id = ?
ORDER BY id
FOR UPDATE
"#,
        )
        .bind(group_id)
        .fetch_all(tx.conn())
        .await
        .map_err(|e| RelationError::store(&format!("list members of {group_id}"), e))?;

        rows.iter().map(Self::row_to_item).collect()
    }

    async fn insert_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        member: &GroupMember,
    ) -> Result<(), RelationError> {
        let tx = downcast(tx)?;

        let res = sqlx::query("INSERT INTO group_member (id, group_id, user_id) VALUES (?, ?, ?)")
            .bind(&member.id)
            .bind(&member.group_id)
            .bind(&member.user_id)
            .execute(tx.conn())
            .await;

        match res {
            Ok(_) => Ok(()),
            Err(e) if is_dup_key(&e) => Err(RelationError::AlreadyMember),
            Err(e) => Err(RelationError::store(
                &format!("insert member {} into {}", member.user_id, member.group_id),
                e,
            )),
        }
    }

    async fn delete_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        member_id: &str,
    ) -> Result<(), RelationError> {
        let tx = downcast(tx)?;

        sqlx::query("DELETE FROM group_member WHERE id = ?")
            .bind(member_id)
            .execute(tx.conn())
            .await
            .map_err(|e| RelationError::store(&format!("delete member row {member_id}"), e))?;

        Ok(())
    }

    async fn delete_by_group_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group_id: &GroupId,
    ) -> Result<(), RelationError> {
        let tx = downcast(tx)?;

        sqlx::query("DELETE FROM group_member WHERE group_id = ?")
            .bind(group_id)
            .execute(tx.conn())
            .await
            .map_err(|e| RelationError::store(&format!("delete members of {group_id}"), e))?;

        Ok(())
    }
}
