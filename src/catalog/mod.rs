//! Items and regions, kept live from Firestore.
//!
//! `Catalog` owns the in-memory lists that the management views read, the last
//! user-facing database error, and the two live subscriptions feeding them.
//! Writes go straight to Firestore; the subscriptions bring the result back.

pub mod models;
pub mod search;

#[cfg(test)]
mod tests;

use self::models::{Item, ItemFields, NewItem, NewRegion, Region, RegionFields};
use crate::firestore::snapshot::QuerySnapshot;
use crate::firestore::watch::Subscription;
use crate::firestore::{Firestore, FirestoreError};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use thiserror::Error;

pub const ITEMS: &str = "items";
pub const REGIONS: &str = "regions";

/// The database operations that can fail in front of the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbOperation {
    LoadItems,
    LoadRegions,
    AddItem,
    UpdateItem,
    DeleteItem,
    AddRegion,
    UpdateRegion,
    DeleteRegion,
}

impl DbOperation {
    /// The message shown to the user.
    pub fn message(self) -> &'static str {
        match self {
            DbOperation::LoadItems => "Fehler beim Laden der Artikel aus der Datenbank.",
            DbOperation::LoadRegions => "Fehler beim Laden der Gebiete aus der Datenbank.",
            DbOperation::AddItem => "Fehler beim Hinzufügen des Artikels zur Datenbank.",
            DbOperation::UpdateItem => "Fehler beim Aktualisieren des Artikels in der Datenbank.",
            DbOperation::DeleteItem => "Fehler beim Löschen des Artikels aus der Datenbank.",
            DbOperation::AddRegion => "Fehler beim Hinzufügen des Gebiets zur Datenbank.",
            DbOperation::UpdateRegion => "Fehler beim Aktualisieren des Gebiets in der Datenbank.",
            DbOperation::DeleteRegion => "Fehler beim Löschen des Gebiets aus der Datenbank.",
        }
    }

    fn log_context(self) -> &'static str {
        match self {
            DbOperation::LoadItems => "Error fetching items",
            DbOperation::LoadRegions => "Error fetching regions",
            DbOperation::AddItem => "Error adding item",
            DbOperation::UpdateItem => "Error updating item",
            DbOperation::DeleteItem => "Error deleting item",
            DbOperation::AddRegion => "Error adding region",
            DbOperation::UpdateRegion => "Error updating region",
            DbOperation::DeleteRegion => "Error deleting region",
        }
    }
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{}", .operation.message())]
    Database {
        operation: DbOperation,
        #[source]
        source: FirestoreError,
    },
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Default)]
struct CatalogState {
    items: Vec<Item>,
    regions: Vec<Region>,
    db_error: Option<String>,
    items_synced: bool,
    regions_synced: bool,
}

type SharedState = Arc<RwLock<CatalogState>>;

fn read(state: &SharedState) -> RwLockReadGuard<'_, CatalogState> {
    state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write(state: &SharedState) -> RwLockWriteGuard<'_, CatalogState> {
    state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Subscriptions {
    _items: Subscription,
    _regions: Subscription,
}

#[derive(Clone)]
pub struct Catalog {
    firestore: Firestore,
    retry_delay: Duration,
    state: SharedState,
    subscriptions: Arc<Mutex<Option<Subscriptions>>>,
}

impl Catalog {
    pub fn new(firestore: Firestore, retry_delay: Duration) -> Self {
        Self {
            firestore,
            retry_delay,
            state: SharedState::default(),
            subscriptions: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts the `items` and `regions` subscriptions unless they already run.
    pub fn subscribe(&self) {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if subscriptions.is_some() {
            return;
        }

        tracing::info!("subscribing to items and regions");

        let items = {
            let on_next = self.state.clone();
            let on_error = self.state.clone();
            self.firestore.collection(ITEMS).on_snapshot(
                self.retry_delay,
                move |snapshot| {
                    let items = decode_all(&snapshot, |id, mut fields: ItemFields| {
                        fields.extra.remove("id");
                        Item { id, fields }
                    });
                    let mut state = write(&on_next);
                    state.items = items;
                    state.items_synced = true;
                    state.db_error = None;
                },
                move |error| record_failure(&on_error, DbOperation::LoadItems, error),
            )
        };

        let regions = {
            let on_next = self.state.clone();
            let on_error = self.state.clone();
            self.firestore.collection(REGIONS).on_snapshot(
                self.retry_delay,
                move |snapshot| {
                    let regions = decode_all(&snapshot, |id, mut fields: RegionFields| {
                        fields.extra.remove("id");
                        Region { id, fields }
                    });
                    let mut state = write(&on_next);
                    state.regions = regions;
                    state.regions_synced = true;
                    state.db_error = None;
                },
                move |error| record_failure(&on_error, DbOperation::LoadRegions, error),
            )
        };

        *subscriptions = Some(Subscriptions {
            _items: items,
            _regions: regions,
        });
    }

    /// Stops both subscriptions. The last known lists stay readable.
    pub fn unsubscribe(&self) {
        let stopped = self
            .subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if stopped.is_some() {
            tracing::info!("unsubscribed from items and regions");
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    /// True once both collections delivered their first snapshot.
    pub fn is_synced(&self) -> bool {
        let state = read(&self.state);
        state.items_synced && state.regions_synced
    }

    pub fn items(&self) -> Vec<Item> {
        read(&self.state).items.clone()
    }

    pub fn regions(&self) -> Vec<Region> {
        read(&self.state).regions.clone()
    }

    pub fn db_error(&self) -> Option<String> {
        read(&self.state).db_error.clone()
    }

    /// Items whose `region` references `region_id`.
    pub fn items_in_region(&self, region_id: &str) -> Vec<Item> {
        read(&self.state)
            .items
            .iter()
            .filter(|item| item.region() == region_id)
            .cloned()
            .collect()
    }

    pub async fn add_item(&self, item: NewItem) -> Result<Item, CatalogError> {
        validate_name(&item.name)?;
        let fields = ItemFields::from(item);
        let document = self
            .track(
                DbOperation::AddItem,
                self.firestore.collection(ITEMS).add(&fields),
            )
            .await?;
        tracing::info!(id = document.id(), "item added");
        Ok(Item {
            id: document.id().to_string(),
            fields,
        })
    }

    pub async fn update_item(&self, item: Item) -> Result<Item, CatalogError> {
        validate_id(&item.id)?;
        validate_name(&item.fields.name)?;
        self.track(
            DbOperation::UpdateItem,
            self.firestore.collection(ITEMS).doc(&item.id).set(&item.fields),
        )
        .await?;
        tracing::info!(id = %item.id, "item updated");
        Ok(item)
    }

    pub async fn delete_item(&self, id: &str) -> Result<(), CatalogError> {
        validate_id(id)?;
        self.track(
            DbOperation::DeleteItem,
            self.firestore.collection(ITEMS).doc(id).delete(),
        )
        .await?;
        tracing::info!(id, "item deleted");
        Ok(())
    }

    pub async fn add_region(&self, region: NewRegion) -> Result<Region, CatalogError> {
        validate_name(&region.name)?;
        let fields = RegionFields::from(region);
        let document = self
            .track(
                DbOperation::AddRegion,
                self.firestore.collection(REGIONS).add(&fields),
            )
            .await?;
        tracing::info!(id = document.id(), "region added");
        Ok(Region {
            id: document.id().to_string(),
            fields,
        })
    }

    pub async fn update_region(&self, region: Region) -> Result<Region, CatalogError> {
        validate_id(&region.id)?;
        validate_name(&region.fields.name)?;
        self.track(
            DbOperation::UpdateRegion,
            self.firestore
                .collection(REGIONS)
                .doc(&region.id)
                .set(&region.fields),
        )
        .await?;
        tracing::info!(id = %region.id, "region updated");
        Ok(region)
    }

    pub async fn delete_region(&self, id: &str) -> Result<(), CatalogError> {
        validate_id(id)?;
        self.track(
            DbOperation::DeleteRegion,
            self.firestore.collection(REGIONS).doc(id).delete(),
        )
        .await?;
        tracing::info!(id, "region deleted");
        Ok(())
    }

    /// Runs a write, clearing the shown error on success and recording it on failure.
    async fn track<T>(
        &self,
        operation: DbOperation,
        call: impl std::future::Future<Output = Result<T, FirestoreError>>,
    ) -> Result<T, CatalogError> {
        match call.await {
            Ok(value) => {
                write(&self.state).db_error = None;
                Ok(value)
            }
            Err(source) => {
                record_failure(&self.state, operation, &source);
                Err(CatalogError::Database { operation, source })
            }
        }
    }
}

fn record_failure(state: &SharedState, operation: DbOperation, error: &FirestoreError) {
    tracing::error!(error = %error, "{}", operation.log_context());
    write(state).db_error = Some(operation.message().to_string());
}

fn decode_all<F, T, R>(snapshot: &QuerySnapshot, build: F) -> Vec<R>
where
    F: Fn(String, T) -> R,
    T: DeserializeOwned,
{
    snapshot
        .iter()
        .filter_map(|doc| match doc.data::<T>() {
            Ok(Some(fields)) => Some(build(doc.id().to_string(), fields)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(id = doc.id(), error = %e, "skipping undecodable document");
                None
            }
        })
        .collect()
}

fn validate_id(id: &str) -> Result<(), CatalogError> {
    if id.trim().is_empty() || id.contains('/') {
        return Err(CatalogError::Invalid(format!("Ungültige ID: {:?}", id)));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), CatalogError> {
    if name.trim().is_empty() {
        return Err(CatalogError::Invalid("Der Name darf nicht leer sein.".to_string()));
    }
    Ok(())
}
