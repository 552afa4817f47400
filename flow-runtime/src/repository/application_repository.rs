//! # Application Store
//!
//! Database half of the application dual-store pair. The immutable file
//! catalog carries no application definitions in this deployment — see the
//! Open Question decision in the grounding ledger — so `FileStore<Application>`
//! for [`crate::repository::ResourceCatalog`] always misses and every
//! application lookup resolves purely from the database.

use crate::domain::Application;
use crate::repository::dual_store::{DbStore, FileStore, HasId};
use crate::repository::ResourceCatalog;
use async_trait::async_trait;
use shared::errors::ApiError;
use sqlx::{FromRow, PgPool};

impl HasId for Application {
    fn id(&self) -> &str {
        &self.id
    }
}

impl FileStore<Application> for ResourceCatalog {
    fn get(&self, _id: &str) -> Option<Application> {
        None
    }
    fn list(&self) -> Vec<Application> {
        Vec::new()
    }
}

#[derive(FromRow)]
struct ApplicationRow {
    id: String,
    name: String,
    is_registration_flow_enabled: bool,
    authentication_graph_id: String,
    registration_graph_id: Option<String>,
}

#[derive(Clone)]
pub struct ApplicationRepository {
    pool: PgPool,
}

impl ApplicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DbStore<Application> for ApplicationRepository {
    async fn get(&self, id: &str) -> Result<Option<Application>, ApiError> {
        let row: Option<ApplicationRow> = sqlx::query_as(
            "SELECT id, name, is_registration_flow_enabled, authentication_graph_id, registration_graph_id \
             FROM application WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;
        Ok(row.map(to_domain))
    }

    async fn list(&self) -> Result<Vec<Application>, ApiError> {
        let rows: Vec<ApplicationRow> = sqlx::query_as(
            "SELECT id, name, is_registration_flow_enabled, authentication_graph_id, registration_graph_id \
             FROM application",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;
        Ok(rows.into_iter().map(to_domain).collect())
    }

    async fn create(&self, item: &Application) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT INTO application \
             (id, name, is_registration_flow_enabled, authentication_graph_id, registration_graph_id) \
             VALUES ($1,$2,$3,$4,$5)",
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(item.is_registration_flow_enabled)
        .bind(&item.authentication_graph_id)
        .bind(&item.registration_graph_id)
        .execute(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;
        Ok(())
    }

    async fn update(&self, item: &Application) -> Result<(), ApiError> {
        sqlx::query(
            "UPDATE application SET name = $2, is_registration_flow_enabled = $3, \
             authentication_graph_id = $4, registration_graph_id = $5 WHERE id = $1",
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(item.is_registration_flow_enabled)
        .bind(&item.authentication_graph_id)
        .bind(&item.registration_graph_id)
        .execute(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM application WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;
        Ok(())
    }
}

fn to_domain(row: ApplicationRow) -> Application {
    Application {
        id: row.id,
        name: row.name,
        is_registration_flow_enabled: row.is_registration_flow_enabled,
        authentication_graph_id: row.authentication_graph_id,
        registration_graph_id: row.registration_graph_id,
    }
}
