//! MongoDB-backed entity store
use std::time::Duration;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::options::ClientOptions;
use mongodb::{Client, ClientSession, Database};
use tokio::sync::Mutex;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::pipeline::{FieldPath, Filter, Pipeline};
use crate::store::{Collection, EntityStore, StoreError, StoreResult, StoreSession};

/// Connection handle created once at startup and shared through `AppState`.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    database: Database,
}

impl MongoStore {
    /// Connect and verify the deployment answers a ping.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let mut options = ClientOptions::parse(&config.url).await?;
        options.app_name = Some("post-service".to_string());
        options.max_pool_size = Some(config.max_connections);
        options.min_pool_size = Some(config.min_connections);
        options.connect_timeout = Some(Duration::from_secs(config.connect_timeout_secs));
        options.server_selection_timeout = Some(Duration::from_secs(config.connect_timeout_secs));

        let client = Client::with_options(options)?;
        let database = client.database(&config.name);
        let store = Self { client, database };
        store.ping().await?;

        info!(database = %config.name, "Connected to MongoDB");
        Ok(store)
    }

    fn collection(&self, collection: Collection) -> mongodb::Collection<Document> {
        self.database.collection::<Document>(collection.name())
    }
}

/// Client session guarded for use from concurrently running branches.
pub struct MongoSession {
    inner: Mutex<ClientSession>,
}

#[async_trait]
impl StoreSession for MongoSession {
    async fn start_transaction(&self) -> StoreResult<()> {
        let mut session = self.inner.lock().await;
        session
            .start_transaction()
            .await
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }

    async fn commit_transaction(&self) -> StoreResult<()> {
        let mut session = self.inner.lock().await;
        session
            .commit_transaction()
            .await
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }

    async fn abort_transaction(&self) -> StoreResult<()> {
        let mut session = self.inner.lock().await;
        session
            .abort_transaction()
            .await
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }
}

#[async_trait]
impl EntityStore for MongoStore {
    type Session = MongoSession;

    async fn start_session(&self) -> StoreResult<MongoSession> {
        let session = self
            .client
            .start_session()
            .await
            .map_err(|e| StoreError::Session(e.to_string()))?;
        Ok(MongoSession {
            inner: Mutex::new(session),
        })
    }

    async fn aggregate(
        &self,
        collection: Collection,
        pipeline: &Pipeline,
    ) -> StoreResult<Vec<Document>> {
        let cursor = self
            .collection(collection)
            .aggregate(pipeline.to_documents())
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Option<Document>> {
        Ok(self
            .collection(collection)
            .find_one(filter.to_document())
            .await?)
    }

    async fn insert_one(&self, collection: Collection, mut document: Document) -> StoreResult<ObjectId> {
        if !document.contains_key("_id") {
            document.insert("_id", ObjectId::new());
        }
        let result = self.collection(collection).insert_one(document).await?;
        match result.inserted_id {
            Bson::ObjectId(id) => Ok(id),
            other => Err(StoreError::Evaluation(format!(
                "inserted _id is not an ObjectId: {}",
                other
            ))),
        }
    }

    async fn push_embedded(
        &self,
        collection: Collection,
        id: ObjectId,
        field: &FieldPath,
        value: Document,
    ) -> StoreResult<bool> {
        let mut push = Document::new();
        push.insert(field.as_str(), value);
        let result = self
            .collection(collection)
            .update_one(doc! { "_id": id }, doc! { "$push": push })
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn pull_embedded(
        &self,
        collection: Collection,
        id: ObjectId,
        field: &FieldPath,
        element_id: ObjectId,
    ) -> StoreResult<bool> {
        let mut pull = Document::new();
        pull.insert(field.as_str(), doc! { "_id": element_id });
        let result = self
            .collection(collection)
            .update_one(doc! { "_id": id }, doc! { "$pull": pull })
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn set_fields(
        &self,
        collection: Collection,
        id: ObjectId,
        values: Document,
    ) -> StoreResult<bool> {
        let result = self
            .collection(collection)
            .update_one(doc! { "_id": id }, doc! { "$set": values })
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
        session: Option<&MongoSession>,
    ) -> StoreResult<u64> {
        let target = self.collection(collection);
        let action = target.delete_one(filter.to_document());
        let result = match session {
            Some(session) => {
                let mut guard = session.inner.lock().await;
                action.session(&mut *guard).await?
            }
            None => action.await?,
        };
        Ok(result.deleted_count)
    }

    async fn delete_many(
        &self,
        collection: Collection,
        filter: &Filter,
        session: Option<&MongoSession>,
    ) -> StoreResult<u64> {
        let target = self.collection(collection);
        let action = target.delete_many(filter.to_document());
        let result = match session {
            Some(session) => {
                let mut guard = session.inner.lock().await;
                action.session(&mut *guard).await?
            }
            None => action.await?,
        };
        Ok(result.deleted_count)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
