//! In-process entity store
//!
//! Holds every collection in memory behind a tokio `RwLock` and runs typed
//! pipelines through [`engine`]. Deletes issued inside a transaction are
//! buffered on the session and applied on commit; abort discards them.
//!
//! Tests use [`MemoryStore::fail_on`] to inject failures at a given
//! collection/operation and [`MemoryStore::open_sessions`] to check that
//! sessions are released.
mod engine;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use tokio::sync::RwLock;

use crate::pipeline::{FieldPath, Filter, Pipeline};
use crate::store::{Collection, EntityStore, StoreError, StoreResult, StoreSession};

use engine::Tables;

/// Store operation, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Aggregate,
    FindOne,
    InsertOne,
    PushEmbedded,
    PullEmbedded,
    SetFields,
    DeleteOne,
    DeleteMany,
}

/// Point at which an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    On(Collection, Operation),
    /// Panic instead of returning an error.
    Panic(Collection, Operation),
    StartSession,
    StartTransaction,
    Commit,
}

struct Inner {
    tables: RwLock<Tables>,
    faults: Mutex<HashSet<Fault>>,
    open_sessions: AtomicUsize,
}

impl Inner {
    fn faults(&self) -> MutexGuard<'_, HashSet<Fault>> {
        self.faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, fault: Fault) -> StoreResult<()> {
        let (fails, panics) = {
            let faults = self.faults();
            let panics = match fault {
                Fault::On(collection, operation) => {
                    faults.contains(&Fault::Panic(collection, operation))
                }
                _ => false,
            };
            (faults.contains(&fault), panics)
        };

        if panics {
            panic!("injected panic at {:?}", fault);
        }
        if fails {
            Err(StoreError::Unavailable(format!("injected failure at {:?}", fault)))
        } else {
            Ok(())
        }
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let tables = Collection::ALL
            .iter()
            .map(|collection| (*collection, Vec::new()))
            .collect();

        Self {
            inner: Arc::new(Inner {
                tables: RwLock::new(tables),
                faults: Mutex::new(HashSet::new()),
                open_sessions: AtomicUsize::new(0),
            }),
        }
    }

    pub fn fail_on(&self, fault: Fault) {
        self.inner.faults().insert(fault);
    }

    pub fn clear_failures(&self) {
        self.inner.faults().clear();
    }

    /// Snapshot of a collection in insertion order.
    pub async fn documents(&self, collection: Collection) -> Vec<Document> {
        let tables = self.inner.tables.read().await;
        tables.get(&collection).cloned().unwrap_or_default()
    }

    pub async fn count(&self, collection: Collection) -> usize {
        let tables = self.inner.tables.read().await;
        tables.get(&collection).map(Vec::len).unwrap_or(0)
    }

    /// Sessions handed out and not yet dropped.
    pub fn open_sessions(&self) -> usize {
        self.inner.open_sessions.load(Ordering::SeqCst)
    }

    async fn delete_matching(
        &self,
        collection: Collection,
        filter: &Filter,
        session: Option<&MemorySession>,
        limit: Option<usize>,
    ) -> StoreResult<u64> {
        let transaction = session.filter(|s| s.in_transaction());

        if let Some(session) = transaction {
            let tables = self.inner.tables.read().await;
            let mut state = session.lock();
            let ids: Vec<ObjectId> = tables
                .get(&collection)
                .into_iter()
                .flatten()
                .filter(|doc| engine::matches(filter, doc))
                .filter_map(|doc| doc.get_object_id("_id").ok())
                .filter(|id| !state.pending.contains(&(collection, *id)))
                .take(limit.unwrap_or(usize::MAX))
                .collect();
            let removed = ids.len() as u64;
            state.pending.extend(ids.into_iter().map(|id| (collection, id)));
            return Ok(removed);
        }

        let mut tables = self.inner.tables.write().await;
        let rows = tables.entry(collection).or_default();
        let mut budget = limit.unwrap_or(usize::MAX);
        let before = rows.len();
        rows.retain(|doc| {
            if budget > 0 && engine::matches(filter, doc) {
                budget -= 1;
                false
            } else {
                true
            }
        });
        Ok((before - rows.len()) as u64)
    }
}

#[derive(Default)]
struct SessionState {
    in_transaction: bool,
    pending: HashSet<(Collection, ObjectId)>,
}

/// Session over [`MemoryStore`]. Dropping it releases the session and
/// discards any uncommitted deletes.
pub struct MemorySession {
    store: MemoryStore,
    state: Mutex<SessionState>,
}

impl MemorySession {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn in_transaction(&self) -> bool {
        self.lock().in_transaction
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.store.inner.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn start_transaction(&self) -> StoreResult<()> {
        self.store.inner.check(Fault::StartTransaction)?;
        let mut state = self.lock();
        if state.in_transaction {
            return Err(StoreError::Transaction("transaction already in progress".into()));
        }
        state.in_transaction = true;
        Ok(())
    }

    async fn commit_transaction(&self) -> StoreResult<()> {
        self.store.inner.check(Fault::Commit)?;
        let pending = {
            let mut state = self.lock();
            if !state.in_transaction {
                return Err(StoreError::Transaction("no transaction in progress".into()));
            }
            state.in_transaction = false;
            std::mem::take(&mut state.pending)
        };

        let mut tables = self.store.inner.tables.write().await;
        for (collection, rows) in tables.iter_mut() {
            rows.retain(|doc| match doc.get_object_id("_id") {
                Ok(id) => !pending.contains(&(*collection, id)),
                Err(_) => true,
            });
        }
        Ok(())
    }

    async fn abort_transaction(&self) -> StoreResult<()> {
        let mut state = self.lock();
        state.in_transaction = false;
        state.pending.clear();
        Ok(())
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    type Session = MemorySession;

    async fn start_session(&self) -> StoreResult<MemorySession> {
        self.inner.check(Fault::StartSession)?;
        self.inner.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession {
            store: self.clone(),
            state: Mutex::new(SessionState::default()),
        })
    }

    async fn aggregate(
        &self,
        collection: Collection,
        pipeline: &Pipeline,
    ) -> StoreResult<Vec<Document>> {
        self.inner.check(Fault::On(collection, Operation::Aggregate))?;
        let tables = self.inner.tables.read().await;
        let source = tables.get(&collection).cloned().unwrap_or_default();
        engine::execute(pipeline.stages(), source, &tables)
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Option<Document>> {
        self.inner.check(Fault::On(collection, Operation::FindOne))?;
        let tables = self.inner.tables.read().await;
        Ok(tables
            .get(&collection)
            .and_then(|rows| rows.iter().find(|doc| engine::matches(filter, doc)))
            .cloned())
    }

    async fn insert_one(&self, collection: Collection, mut document: Document) -> StoreResult<ObjectId> {
        self.inner.check(Fault::On(collection, Operation::InsertOne))?;
        let id = match document.get("_id") {
            Some(Bson::ObjectId(id)) => *id,
            Some(other) => {
                return Err(StoreError::Evaluation(format!(
                    "_id must be an ObjectId, found {}",
                    other
                )))
            }
            None => {
                let id = ObjectId::new();
                document.insert("_id", id);
                id
            }
        };

        let mut tables = self.inner.tables.write().await;
        let rows = tables.entry(collection).or_default();
        if rows
            .iter()
            .any(|doc| matches!(doc.get("_id"), Some(Bson::ObjectId(existing)) if *existing == id))
        {
            return Err(StoreError::Evaluation(format!("duplicate _id {}", id)));
        }
        rows.push(document);
        Ok(id)
    }

    async fn push_embedded(
        &self,
        collection: Collection,
        id: ObjectId,
        field: &FieldPath,
        value: Document,
    ) -> StoreResult<bool> {
        self.inner.check(Fault::On(collection, Operation::PushEmbedded))?;
        let mut tables = self.inner.tables.write().await;
        let Some(doc) = find_by_id(&mut tables, collection, id) else {
            return Ok(false);
        };

        match doc.get_mut(field.as_str()) {
            Some(Bson::Array(items)) => items.push(Bson::Document(value)),
            Some(_) => {
                return Err(StoreError::Evaluation(format!(
                    "cannot push to non-array field '{}'",
                    field
                )))
            }
            None => {
                doc.insert(field.as_str(), vec![Bson::Document(value)]);
            }
        }
        Ok(true)
    }

    async fn pull_embedded(
        &self,
        collection: Collection,
        id: ObjectId,
        field: &FieldPath,
        element_id: ObjectId,
    ) -> StoreResult<bool> {
        self.inner.check(Fault::On(collection, Operation::PullEmbedded))?;
        let mut tables = self.inner.tables.write().await;
        let Some(doc) = find_by_id(&mut tables, collection, id) else {
            return Ok(false);
        };

        let Some(Bson::Array(items)) = doc.get_mut(field.as_str()) else {
            return Ok(false);
        };
        let before = items.len();
        items.retain(|item| match item {
            Bson::Document(inner) => inner.get_object_id("_id").ok() != Some(element_id),
            _ => true,
        });
        Ok(items.len() != before)
    }

    async fn set_fields(
        &self,
        collection: Collection,
        id: ObjectId,
        values: Document,
    ) -> StoreResult<bool> {
        self.inner.check(Fault::On(collection, Operation::SetFields))?;
        let mut tables = self.inner.tables.write().await;
        let Some(doc) = find_by_id(&mut tables, collection, id) else {
            return Ok(false);
        };
        for (key, value) in values {
            doc.insert(key, value);
        }
        Ok(true)
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
        session: Option<&MemorySession>,
    ) -> StoreResult<u64> {
        self.inner.check(Fault::On(collection, Operation::DeleteOne))?;
        self.delete_matching(collection, filter, session, Some(1)).await
    }

    async fn delete_many(
        &self,
        collection: Collection,
        filter: &Filter,
        session: Option<&MemorySession>,
    ) -> StoreResult<u64> {
        self.inner.check(Fault::On(collection, Operation::DeleteMany))?;
        self.delete_matching(collection, filter, session, None).await
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

fn find_by_id(tables: &mut Tables, collection: Collection, id: ObjectId) -> Option<&mut Document> {
    tables
        .get_mut(&collection)?
        .iter_mut()
        .find(|doc| doc.get_object_id("_id").ok() == Some(id))
}
