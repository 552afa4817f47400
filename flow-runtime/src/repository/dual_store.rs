//! # Dual-Store Composite Helpers (C10)
//!
//! Identity providers and user schemas can live in the database (mutable,
//! tenant-managed) or in the immutable file catalog (deployment-managed,
//! read-only at runtime). These generic helpers compose a `DbStore<T>` with
//! a `FileStore<T>` behind one get/list/create/update/delete/count surface,
//! so `service`/`api` code never branches on where a resource came from.
//!
//! Write operations against a resource id that exists in the file catalog
//! are rejected with `ApiError::Conflict` — the file catalog is loaded once
//! at boot and is not a target for runtime mutation (see the design note on
//! file-store write rejection).

use async_trait::async_trait;
use shared::errors::ApiError;
use std::collections::HashSet;

/// A resource participating in the dual-store pattern must be identifiable
/// by a stable string id, independent of which store produced it.
pub trait HasId {
    fn id(&self) -> &str;
}

#[async_trait]
pub trait DbStore<T>: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<T>, ApiError>;
    async fn list(&self) -> Result<Vec<T>, ApiError>;
    async fn create(&self, item: &T) -> Result<(), ApiError>;
    async fn update(&self, item: &T) -> Result<(), ApiError>;
    async fn delete(&self, id: &str) -> Result<(), ApiError>;
}

/// The immutable side. Synchronous — the catalog is parsed once at boot and
/// held in memory for the life of the process.
pub trait FileStore<T>: Send + Sync {
    fn get(&self, id: &str) -> Option<T>;
    fn list(&self) -> Vec<T>;
}

/// Database copy wins on id collision — a resource can be "promoted" into
/// the database by re-creating it there, shadowing the file entry.
pub async fn get_resource<T>(db: &dyn DbStore<T>, file: &dyn FileStore<T>, id: &str) -> Result<Option<T>, ApiError> {
    if let Some(item) = db.get(id).await? {
        return Ok(Some(item));
    }
    Ok(file.get(id))
}

pub async fn list_resources<T: HasId>(db: &dyn DbStore<T>, file: &dyn FileStore<T>) -> Result<Vec<T>, ApiError> {
    let mut items = db.list().await?;
    let db_ids: HashSet<String> = items.iter().map(|i| i.id().to_string()).collect();
    items.extend(file.list().into_iter().filter(|item| !db_ids.contains(item.id())));
    Ok(items)
}

pub async fn count_resources<T: HasId>(db: &dyn DbStore<T>, file: &dyn FileStore<T>) -> Result<usize, ApiError> {
    Ok(list_resources(db, file).await?.len())
}

/// Short-circuits to an empty page once `offset` reaches or exceeds the
/// merged total, otherwise merges both stores and slices `[offset, offset+limit)`.
pub async fn list_resources_paginated<T: HasId>(
    db: &dyn DbStore<T>,
    file: &dyn FileStore<T>,
    offset: usize,
    limit: usize,
) -> Result<Vec<T>, ApiError> {
    let merged = list_resources(db, file).await?;
    if offset >= merged.len() {
        return Ok(Vec::new());
    }
    Ok(merged.into_iter().skip(offset).take(limit).collect())
}

/// True iff `id` is defined in the immutable file catalog — a resource in
/// this state rejects writes regardless of whether a database copy also
/// exists under the same id.
pub fn is_immutable<T>(file: &dyn FileStore<T>, id: &str) -> bool {
    file.get(id).is_some()
}

pub async fn create_resource<T: HasId>(db: &dyn DbStore<T>, file: &dyn FileStore<T>, item: &T) -> Result<(), ApiError> {
    reject_if_file_owned(file, item.id())?;
    db.create(item).await
}

pub async fn update_resource<T: HasId>(db: &dyn DbStore<T>, file: &dyn FileStore<T>, item: &T) -> Result<(), ApiError> {
    reject_if_file_owned(file, item.id())?;
    db.update(item).await
}

pub async fn delete_resource<T: HasId>(db: &dyn DbStore<T>, file: &dyn FileStore<T>, id: &str) -> Result<(), ApiError> {
    reject_if_file_owned(file, id)?;
    db.delete(id).await
}

fn reject_if_file_owned<T>(file: &dyn FileStore<T>, id: &str) -> Result<(), ApiError> {
    if file.get(id).is_some() {
        return Err(ApiError::Conflict {
            resource: format!("'{id}' is defined in the immutable resource catalog and cannot be modified"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Clone)]
    struct Item {
        id: String,
    }
    impl HasId for Item {
        fn id(&self) -> &str {
            &self.id
        }
    }

    struct InMemoryDb {
        items: Mutex<HashMap<String, Item>>,
    }

    #[async_trait]
    impl DbStore<Item> for InMemoryDb {
        async fn get(&self, id: &str) -> Result<Option<Item>, ApiError> {
            Ok(self.items.lock().unwrap().get(id).cloned())
        }
        async fn list(&self) -> Result<Vec<Item>, ApiError> {
            Ok(self.items.lock().unwrap().values().cloned().collect())
        }
        async fn create(&self, item: &Item) -> Result<(), ApiError> {
            self.items.lock().unwrap().insert(item.id.clone(), item.clone());
            Ok(())
        }
        async fn update(&self, item: &Item) -> Result<(), ApiError> {
            self.items.lock().unwrap().insert(item.id.clone(), item.clone());
            Ok(())
        }
        async fn delete(&self, id: &str) -> Result<(), ApiError> {
            self.items.lock().unwrap().remove(id);
            Ok(())
        }
    }

    struct StaticFile {
        items: Vec<Item>,
    }
    impl FileStore<Item> for StaticFile {
        fn get(&self, id: &str) -> Option<Item> {
            self.items.iter().find(|i| i.id == id).cloned()
        }
        fn list(&self) -> Vec<Item> {
            self.items.clone()
        }
    }

    #[tokio::test]
    async fn write_against_file_owned_id_is_rejected() {
        let db = InMemoryDb { items: Mutex::new(HashMap::new()) };
        let file = StaticFile { items: vec![Item { id: "builtin".into() }] };

        let result = create_resource(&db, &file, &Item { id: "builtin".into() }).await;
        assert!(matches!(result, Err(ApiError::Conflict { .. })));
    }

    #[tokio::test]
    async fn list_merges_db_and_file_without_duplicating_shadowed_ids() {
        let db = InMemoryDb { items: Mutex::new(HashMap::new()) };
        db.create(&Item { id: "builtin".into() }).await.unwrap();
        db.create(&Item { id: "tenant-1".into() }).await.unwrap();
        let file = StaticFile { items: vec![Item { id: "builtin".into() }, Item { id: "file-only".into() }] };

        let items = list_resources(&db, &file).await.unwrap();
        let ids: HashSet<_> = items.iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains("file-only"));
    }

    #[tokio::test]
    async fn pagination_short_circuits_once_offset_reaches_total() {
        let db = InMemoryDb { items: Mutex::new(HashMap::new()) };
        db.create(&Item { id: "a".into() }).await.unwrap();
        let file = StaticFile { items: vec![Item { id: "b".into() }] };

        let page = list_resources_paginated(&db, &file, 5, 10).await.unwrap();
        assert!(page.is_empty());

        let page = list_resources_paginated(&db, &file, 0, 1).await.unwrap();
        assert_eq!(page.len(), 1);
    }

    #[test]
    fn is_immutable_reflects_file_store_membership() {
        let file = StaticFile { items: vec![Item { id: "builtin".into() }] };
        assert!(is_immutable(&file, "builtin"));
        assert!(!is_immutable(&file, "tenant-1"));
    }
}
