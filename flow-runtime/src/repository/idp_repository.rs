//! # Identity Provider Store — database half of the C10 dual-store pair.

use crate::domain::{IdentityProvider, IdentityProviderType, IdpProperty};
use crate::repository::dual_store::DbStore;
use async_trait::async_trait;
use shared::errors::ApiError;
use sqlx::{FromRow, PgPool};

#[derive(FromRow)]
struct IdentityProviderRow {
    id: String,
    name: String,
    description: String,
    idp_type: String,
    properties: serde_json::Value,
}

#[derive(Clone)]
pub struct IdentityProviderRepository {
    pool: PgPool,
}

impl IdentityProviderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DbStore<IdentityProvider> for IdentityProviderRepository {
    async fn get(&self, id: &str) -> Result<Option<IdentityProvider>, ApiError> {
        let row: Option<IdentityProviderRow> = sqlx::query_as(
            "SELECT id, name, description, idp_type, properties FROM identity_provider WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;
        row.map(to_domain).transpose()
    }

    async fn list(&self) -> Result<Vec<IdentityProvider>, ApiError> {
        let rows: Vec<IdentityProviderRow> =
            sqlx::query_as("SELECT id, name, description, idp_type, properties FROM identity_provider")
                .fetch_all(&self.pool)
                .await
                .map_err(ApiError::DatabaseError)?;
        rows.into_iter().map(to_domain).collect()
    }

    async fn create(&self, item: &IdentityProvider) -> Result<(), ApiError> {
        let validated = IdentityProvider::validate_properties(item.idp_type, &item.properties)?;
        let properties =
            serde_json::to_value(&validated).map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;
        sqlx::query(
            "INSERT INTO identity_provider (id, name, description, idp_type, properties) \
             VALUES ($1,$2,$3,$4,$5)",
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(idp_type_to_str(item.idp_type))
        .bind(properties)
        .execute(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;
        Ok(())
    }

    async fn update(&self, item: &IdentityProvider) -> Result<(), ApiError> {
        let validated = IdentityProvider::validate_properties(item.idp_type, &item.properties)?;
        let properties =
            serde_json::to_value(&validated).map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;
        sqlx::query(
            "UPDATE identity_provider SET name = $2, description = $3, idp_type = $4, properties = $5 \
             WHERE id = $1",
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(idp_type_to_str(item.idp_type))
        .bind(properties)
        .execute(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM identity_provider WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;
        Ok(())
    }
}

fn to_domain(row: IdentityProviderRow) -> Result<IdentityProvider, ApiError> {
    let properties: Vec<IdpProperty> = serde_json::from_value(row.properties)
        .map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;
    Ok(IdentityProvider {
        id: row.id,
        name: row.name,
        description: row.description,
        idp_type: idp_type_from_str(&row.idp_type)?,
        properties,
    })
}

fn idp_type_to_str(idp_type: IdentityProviderType) -> &'static str {
    match idp_type {
        IdentityProviderType::Oauth => "OAUTH",
        IdentityProviderType::Oidc => "OIDC",
        IdentityProviderType::Google => "GOOGLE",
        IdentityProviderType::Github => "GITHUB",
    }
}

fn idp_type_from_str(value: &str) -> Result<IdentityProviderType, ApiError> {
    match value {
        "OAUTH" => Ok(IdentityProviderType::Oauth),
        "OIDC" => Ok(IdentityProviderType::Oidc),
        "GOOGLE" => Ok(IdentityProviderType::Google),
        "GITHUB" => Ok(IdentityProviderType::Github),
        other => Err(ApiError::StorageFault { detail: format!("unknown idp_type '{other}'") }),
    }
}
