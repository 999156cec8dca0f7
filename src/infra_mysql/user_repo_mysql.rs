use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};

const ENABLED: i8 = 1;

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    fn row_to_item(r: &MySqlRow) -> Result<UserProfile, RelationError> {
        let decode = |e: sqlx::Error| RelationError::store("decode user row", e);
        let status = r.try_get::<i8, _>("status").map_err(decode)?;
        Ok(UserProfile {
            id: r.try_get::<UserId, _>("id").map_err(decode)?,
            user_name: r.try_get::<String, _>("user_name").map_err(decode)?,
            real_name: r.try_get::<String, _>("real_name").map_err(decode)?,
            avatar: r.try_get::<String, _>("avatar").map_err(decode)?,
            phone: r.try_get::<String, _>("phone").map_err(decode)?,
            email: r.try_get::<String, _>("email").map_err(decode)?,
            status: if status == ENABLED {
                UserStatus::Enabled
            } else {
                UserStatus::Disabled
            },
        })
    }
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn get(&self, user_id: &UserId) -> Result<Option<UserProfile>, RelationError> {
        let row = sqlx::query(
            r#"
SELECT id, user_name, real_name, avatar, phone, email, status
FROM user
WHERE id = ? AND deleted_at IS NULL
"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RelationError::store(&format!("query user {user_id}"), e))?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn list_by_ids(&self, user_ids: &[UserId]) -> Result<Vec<UserProfile>, RelationError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<MySql> = QueryBuilder::new(
            "SELECT id, user_name, real_name, avatar, phone, email, status FROM user \
             WHERE deleted_at IS NULL AND id IN (",
        );
        let mut separated = query.separated(", ");
        for user_id in user_ids {
            separated.push_bind(user_id);
        }
        separated.push_unseparated(")");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RelationError::store("list users by id", e))?;

        rows.iter().map(Self::row_to_item).collect()
    }

    async fn precise_search(&self, keywords: &str) -> Result<Vec<UserProfile>, RelationError> {
        let rows = sqlx::query(
            r#"
SELECT id, user_name, real_name, avatar, phone, email, status
FROM user
WHERE (user_name = ? OR phone = ?) AND status = ? AND deleted_at IS NULL
ORDER BY created_at DESC
"#,
        )
        .bind(keywords)
        .bind(keywords)
        .bind(ENABLED)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RelationError::store("precise user search", e))?;

        rows.iter().map(Self::row_to_item).collect()
    }
}
