//! # User Schema Store — database half of the C10 dual-store pair.

use crate::domain::UserSchema;
use crate::repository::dual_store::DbStore;
use async_trait::async_trait;
use shared::errors::ApiError;
use sqlx::{FromRow, PgPool};

#[derive(FromRow)]
struct UserSchemaRow {
    id: String,
    name: String,
    organization_unit_id: String,
    allow_self_registration: bool,
    schema: serde_json::Value,
}

#[derive(Clone)]
pub struct UserSchemaRepository {
    pool: PgPool,
}

impl UserSchemaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DbStore<UserSchema> for UserSchemaRepository {
    async fn get(&self, id: &str) -> Result<Option<UserSchema>, ApiError> {
        let row: Option<UserSchemaRow> = sqlx::query_as(
            "SELECT id, name, organization_unit_id, allow_self_registration, schema \
             FROM user_schema WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;
        Ok(row.map(to_domain))
    }

    async fn list(&self) -> Result<Vec<UserSchema>, ApiError> {
        let rows: Vec<UserSchemaRow> = sqlx::query_as(
            "SELECT id, name, organization_unit_id, allow_self_registration, schema FROM user_schema",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;
        Ok(rows.into_iter().map(to_domain).collect())
    }

    async fn create(&self, item: &UserSchema) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT INTO user_schema (id, name, organization_unit_id, allow_self_registration, schema) \
             VALUES ($1,$2,$3,$4,$5)",
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(&item.organization_unit_id)
        .bind(item.allow_self_registration)
        .bind(&item.schema)
        .execute(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;
        Ok(())
    }

    async fn update(&self, item: &UserSchema) -> Result<(), ApiError> {
        sqlx::query(
            "UPDATE user_schema SET name = $2, organization_unit_id = $3, \
             allow_self_registration = $4, schema = $5 WHERE id = $1",
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(&item.organization_unit_id)
        .bind(item.allow_self_registration)
        .bind(&item.schema)
        .execute(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM user_schema WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;
        Ok(())
    }
}

fn to_domain(row: UserSchemaRow) -> UserSchema {
    UserSchema {
        id: row.id,
        name: row.name,
        organization_unit_id: row.organization_unit_id,
        allow_self_registration: row.allow_self_registration,
        schema: row.schema,
    }
}
