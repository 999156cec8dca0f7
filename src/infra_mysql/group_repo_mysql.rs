use super::util::downcast;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlGroupRepo {
    pool: MySqlPool,
}

impl MySqlGroupRepo {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn row_to_item(r: &MySqlRow) -> Result<GroupRecord, RelationError> {
        let decode = |e: sqlx::Error| RelationError::store("decode chat_group row", e);
        Ok(GroupRecord {
            id: r.try_get::<GroupId, _>("id").map_err(decode)?,
            name: r.try_get::<String, _>("group_name").map_err(decode)?,
            brief: r.try_get::<String, _>("brief").map_err(decode)?,
            avatar: r.try_get::<String, _>("avatar").map_err(decode)?,
            owner: r.try_get::<UserId, _>("owner").map_err(decode)?,
            creator: r.try_get::<UserId, _>("creator").map_err(decode)?,
            created_at: r.try_get::<DateTime<Utc>, _>("created_at").map_err(decode)?,
        })
    }
}

#[async_trait::async_trait]
impl GroupRepo for MySqlGroupRepo {
    async fn get(&self, group_id: &GroupId) -> Result<Option<GroupRecord>, RelationError> {
        let row = sqlx::query(
            r#"
SELECT id, group_name, brief, avatar, owner, creator, created_at
FROM chat_group
WHERE id = ?
"#,
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RelationError::store(&format!("query group {group_id}"), e))?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn get_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group_id: &GroupId,
    ) -> Result<Option<GroupRecord>, RelationError> {
        let tx = downcast(tx)?;

        let row = sqlx::query(
            r#"
SELECT id, group_name, brief, avatar, owner, creator, created_at
FROM chat_group
WHERE id = ?
FOR UPDATE
"#,
        )
        .bind(group_id)
        .fetch_optional(tx.conn())
        .await
        .map_err(|e| RelationError::store(&format!("query group {group_id}"), e))?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn insert_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group: &GroupRecord,
    ) -> Result<(), RelationError> {
        let tx = downcast(tx)?;

        sqlx::query(
            r#"
INSERT INTO chat_group (id, group_name, brief, avatar, owner, creator, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#,
        )
        .bind(&group.id)
        .bind(&group.name)
        .bind(&group.brief)
        .bind(&group.avatar)
        .bind(&group.owner)
        .bind(&group.creator)
        .bind(group.created_at)
        .bind(group.created_at)
        .execute(tx.conn())
        .await
        .map_err(|e| RelationError::store(&format!("insert group {}", group.id), e))?;

        Ok(())
    }

    async fn update_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group: &GroupRecord,
    ) -> Result<(), RelationError> {
        let tx = downcast(tx)?;

        let result = sqlx::query(
            r#"
UPDATE chat_group
SET group_name = ?, brief = ?, avatar = ?, owner = ?, updated_at = ?
WHERE id = ?
"#,
        )
        .bind(&group.name)
        .bind(&group.brief)
        .bind(&group.avatar)
        .bind(&group.owner)
        .bind(Utc::now())
        .bind(&group.id)
        .execute(tx.conn())
        .await
        .map_err(|e| RelationError::store(&format!("update group {}", group.id), e))?;

        if result.rows_affected() == 0 {
            // MySQL reports 0 for unchanged rows too, so confirm existence
            let exists: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM chat_group WHERE id = ?")
                .bind(&group.id)
                .fetch_one(tx.conn())
                .await
                .map_err(|e| RelationError::store(&format!("update group {}", group.id), e))?;
            if exists == 0 {
                return Err(RelationError::GroupNotFound);
            }
        }

        Ok(())
    }

    async fn delete_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group_id: &GroupId,
    ) -> Result<(), RelationError> {
        let tx = downcast(tx)?;

        sqlx::query("DELETE FROM chat_group WHERE id = ?")
            .bind(group_id)
            .execute(tx.conn())
            .await
            .map_err(|e| RelationError::store(&format!("delete group {group_id}"), e))?;

        Ok(())
    }

    async fn list_by_member(&self, user_id: &UserId) -> Result<Vec<GroupRecord>, RelationError> {
        let rows = sqlx::query(
            r#"
SELECT g.id, g.group_name, g.brief, g.avatar, g.owner, g.creator, g.created_at
FROM chat_group g
JOIN group_member m ON m.group_id = g.id
WHERE m.user_id = ?
ORDER BY g.created_at DESC
"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RelationError::store(&format!("list groups of {user_id}"), e))?;

        rows.iter().map(Self::row_to_item).collect()
    }
}
