use super::util::{decode_status, downcast, encode_status};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlFriendshipRepo {
    pool: MySqlPool,
}

impl MySqlFriendshipRepo {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn row_to_item(r: &MySqlRow) -> Result<FriendRelationship, RelationError> {
        let decode = |e: sqlx::Error| RelationError::store("decode user_friend row", e);
        Ok(FriendRelationship {
            id: r.try_get::<RelationshipId, _>("id").map_err(decode)?,
            user_a: r.try_get::<UserId, _>("user_id1").map_err(decode)?,
            user_b: r.try_get::<UserId, _>("user_id2").map_err(decode)?,
            status_a: decode_status(r.try_get::<i8, _>("status1").map_err(decode)?)?,
            status_b: decode_status(r.try_get::<i8, _>("status2").map_err(decode)?)?,
            updated_at: r.try_get::<DateTime<Utc>, _>("updated_at").map_err(decode)?,
        })
    }
}

#[async_trait::async_trait]
impl FriendshipRepo for MySqlFriendshipRepo {
    async fn get_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        id: &RelationshipId,
    ) -> Result<Option<FriendRelationship>, RelationError> {
        let tx = downcast(tx)?;

        let row = sqlx::query(
            r#"
SELECT id, user_id1, user_id2, status1, status2, updated_at
FROM user_friend
WHERE id = ?
FOR UPDATE
"#,
        )
        .bind(id)
        .fetch_optional(tx.conn())
        .await
        .map_err(|e| RelationError::store(&format!("query relationship {id}"), e))?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn save_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        relationship: &FriendRelationship,
    ) -> Result<(), RelationError> {
        let tx = downcast(tx)?;

        sqlx::query(
            r#"
INSERT INTO user_friend (id, user_id1, user_id2, status1, status2, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?, ?)
ON DUPLICATE KEY UPDATE
    status1 = VALUES(status1),
    status2 = VALUES(status2),
    updated_at = VALUES(updated_at)
"#,
        )
        .bind(&relationship.id)
        .bind(&relationship.user_a)
        .bind(&relationship.user_b)
        .bind(encode_status(relationship.status_a))
        .bind(encode_status(relationship.status_b))
        .bind(relationship.updated_at)
        .bind(relationship.updated_at)
        .execute(tx.conn())
        .await
        .map_err(|e| RelationError::store(&format!("save relationship {}", relationship.id), e))?;

        Ok(())
    }

    async fn delete_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        id: &RelationshipId,
    ) -> Result<(), RelationError> {
        let tx = downcast(tx)?;

        sqlx::query("DELETE FROM user_friend WHERE id = ?")
            .bind(id)
            .execute(tx.conn())
            .await
            .map_err(|e| RelationError::store(&format!("delete relationship {id}"), e))?;

        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<FriendRelationship>, RelationError> {
        let rows = sqlx::query(
            r#"
SELECT id, user_id1, user_id2, status1, status2, updated_at
FROM user_friend
WHERE user_id1 = ? OR user_id2 = ?
ORDER BY updated_at DESC
"#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RelationError::store(&format!("list relationships of {user_id}"), e))?;

        rows.iter().map(Self::row_to_item).collect()
    }
}
