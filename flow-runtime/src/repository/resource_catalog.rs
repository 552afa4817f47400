//! # Immutable Resource Catalog
//!
//! Loads `IdentityProvider` and `UserSchema` definitions from YAML files
//! under `immutable_resources.resource_dir`, substituting `${VAR_NAME}` and
//! `${VAR_NAME:-default}` references against the process environment before
//! parsing. Loaded once at boot; the result is immutable for the life of
//! the process — see the dual-store write-rejection policy in
//! `repository::dual_store`.
//!
//! Expected layout:
//!
//! ```text
//! <resource_dir>/
//!   identity_providers/*.yaml
//!   user_schemas/*.yaml
//! ```

use crate::domain::{IdentityProvider, UserSchema};
use crate::repository::dual_store::{FileStore, HasId};
use regex::Regex;
use shared::errors::ApiError;
use std::collections::HashMap;
use std::path::Path;

impl HasId for IdentityProvider {
    fn id(&self) -> &str {
        &self.id
    }
}

impl HasId for UserSchema {
    fn id(&self) -> &str {
        &self.id
    }
}

pub struct ResourceCatalog {
    identity_providers: HashMap<String, IdentityProvider>,
    user_schemas: HashMap<String, UserSchema>,
}

impl ResourceCatalog {
    /// An empty catalog, used when `immutable_resources.enabled` is false.
    pub fn empty() -> Self {
        Self { identity_providers: HashMap::new(), user_schemas: HashMap::new() }
    }

    pub fn load_from_dir(dir: &Path) -> Result<Self, ApiError> {
        let identity_providers = load_yaml_dir::<IdentityProvider>(&dir.join("identity_providers"))?
            .into_iter()
            .map(|idp| {
                let properties = IdentityProvider::validate_properties(idp.idp_type, &idp.properties)?;
                Ok((idp.id.clone(), IdentityProvider { properties, ..idp }))
            })
            .collect::<Result<HashMap<_, _>, ApiError>>()?;
        let user_schemas = load_yaml_dir::<UserSchema>(&dir.join("user_schemas"))?
            .into_iter()
            .map(|schema| (schema.id.clone(), schema))
            .collect();
        Ok(Self { identity_providers, user_schemas })
    }
}

impl FileStore<IdentityProvider> for ResourceCatalog {
    fn get(&self, id: &str) -> Option<IdentityProvider> {
        self.identity_providers.get(id).cloned()
    }
    fn list(&self) -> Vec<IdentityProvider> {
        self.identity_providers.values().cloned().collect()
    }
}

impl FileStore<UserSchema> for ResourceCatalog {
    fn get(&self, id: &str) -> Option<UserSchema> {
        self.user_schemas.get(id).cloned()
    }
    fn list(&self) -> Vec<UserSchema> {
        self.user_schemas.values().cloned().collect()
    }
}

pub(crate) fn load_yaml_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>, ApiError> {
    let mut items = Vec::new();
    if !dir.is_dir() {
        return Ok(items);
    }

    let entries = std::fs::read_dir(dir).map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;
    for entry in entries {
        let entry = entry.map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;
        let path = entry.path();
        let is_yaml = path.extension().is_some_and(|ext| ext == "yaml" || ext == "yml");
        if !is_yaml {
            continue;
        }

        let raw = std::fs::read_to_string(&path).map_err(|e| ApiError::StorageFault { detail: e.to_string() })?;
        let substituted = substitute_env_vars(&raw);
        let item: T = serde_yml::from_str(&substituted)
            .map_err(|e| ApiError::StorageFault { detail: format!("{}: {e}", path.display()) })?;
        items.push(item);
    }
    Ok(items)
}

/// Replaces `${NAME}` and `${NAME:-default}` references with the matching
/// environment variable, or the inline default when the variable is unset.
/// Unresolvable references with no default are left as literal text.
fn substitute_env_vars(raw: &str) -> String {
    let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}").expect("static regex is valid");
    pattern
        .replace_all(raw, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_else(|| caps[0].to_string()),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_present_variable() {
        std::env::set_var("FLOW_RUNTIME_TEST_VAR", "replaced");
        assert_eq!(substitute_env_vars("value: ${FLOW_RUNTIME_TEST_VAR}"), "value: replaced");
        std::env::remove_var("FLOW_RUNTIME_TEST_VAR");
    }

    #[test]
    fn falls_back_to_inline_default_when_unset() {
        assert_eq!(substitute_env_vars("value: ${FLOW_RUNTIME_MISSING:-fallback}"), "value: fallback");
    }

    #[test]
    fn leaves_unresolvable_reference_with_no_default_untouched() {
        assert_eq!(substitute_env_vars("value: ${FLOW_RUNTIME_MISSING}"), "value: ${FLOW_RUNTIME_MISSING}");
    }

    #[test]
    fn missing_directory_yields_empty_catalog() {
        let items: Vec<IdentityProvider> = load_yaml_dir(Path::new("/nonexistent/path")).unwrap();
        assert!(items.is_empty());
    }
}
