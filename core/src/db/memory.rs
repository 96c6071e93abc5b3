// III-IV
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! In-process document store that mimics the subset of MongoDB used by the services.
//!
//! Collections are kept in insertion order and documents are matched by plain field equality, so
//! this is only suitable for small datasets such as the ones created by unit tests.

use crate::db::{DEFAULT_TIMEOUT, Db, DbError, DbResult, Executor, with_timeout};
use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use futures::lock::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Name of the field that holds the primary key of every document.
const ID_FIELD: &str = "_id";

/// Contents of the store shared by all executors created from the same `MemoryDb`.
#[derive(Default)]
struct State {
    /// Documents in each collection, keyed by collection name.
    collections: HashMap<String, Vec<Document>>,

    /// Artificial delay applied to every operation before it runs.
    latency: Duration,

    /// Whether operations should fail as if the server could not be reached.
    unavailable: bool,
}

/// Returns true if `doc` has the same values as `filter` for all of the fields in `filter`.
fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, value)| doc.get(key) == Some(value))
}

/// A database instance backed by an in-memory document store.
#[derive(Clone)]
pub struct MemoryDb {
    /// Shared store.  All clones of this database see the same documents.
    state: Arc<Mutex<State>>,

    /// Deadline applied to every operation.
    timeout: Duration,
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDb {
    /// Creates a new empty store with the default operation timeout.
    pub fn new() -> Self {
        Self { state: Arc::from(Mutex::new(State::default())), timeout: DEFAULT_TIMEOUT }
    }

    /// Overrides the deadline applied to every operation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Makes every subsequent operation wait for `latency` before running.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = latency;
    }

    /// Makes every subsequent operation fail with `DbError::Unavailable` if `unavailable` is true.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    /// Returns an executor of the specific type used by this database.
    pub fn typed_ex(&self) -> MemoryExecutor {
        MemoryExecutor { state: self.state.clone(), timeout: self.timeout }
    }
}

#[async_trait]
impl Db for MemoryDb {
    async fn ex(&self) -> DbResult<Executor> {
        Ok(Executor::Memory(self.typed_ex()))
    }

    async fn close(&self) {}
}

/// Executor for the in-memory store.
pub struct MemoryExecutor {
    /// Shared store.
    state: Arc<Mutex<State>>,

    /// Deadline applied to every operation.
    timeout: Duration,
}

impl MemoryExecutor {
    /// Runs `op` against the store, honoring the configured latency, availability and timeout.
    async fn run<T, F>(&self, op: F) -> DbResult<T>
    where
        F: FnOnce(&mut State) -> DbResult<T>,
    {
        with_timeout(self.timeout, async {
            let (latency, unavailable) = {
                let state = self.state.lock().await;
                (state.latency, state.unavailable)
            };
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            if unavailable {
                return Err(DbError::Unavailable);
            }

            let mut state = self.state.lock().await;
            op(&mut *state)
        })
        .await
    }

    /// Returns all documents in `collection`, in insertion order.
    pub async fn find(&mut self, collection: &str) -> DbResult<Vec<Document>> {
        self.run(|state| Ok(state.collections.get(collection).cloned().unwrap_or_default())).await
    }

    /// Returns the first document in `collection` that matches `filter`, if any.
    pub async fn find_one(
        &mut self,
        collection: &str,
        filter: &Document,
    ) -> DbResult<Option<Document>> {
        self.run(|state| {
            Ok(state
                .collections
                .get(collection)
                .and_then(|docs| docs.iter().find(|doc| matches(doc, filter)))
                .cloned())
        })
        .await
    }

    /// Stores `doc` in `collection` and returns its primary key.  A new `ObjectId` is assigned
    /// if the document does not carry an `_id` field.
    pub async fn insert_one(&mut self, collection: &str, mut doc: Document) -> DbResult<Bson> {
        self.run(move |state| {
            let id = match doc.get(ID_FIELD) {
                Some(id) => id.clone(),
                None => {
                    let id = Bson::ObjectId(ObjectId::new());
                    doc.insert(ID_FIELD, id.clone());
                    id
                }
            };

            let docs = state.collections.entry(collection.to_owned()).or_default();
            if docs.iter().any(|other| other.get(ID_FIELD) == Some(&id)) {
                return Err(DbError::BackendError(format!("Duplicate key {}", id)));
            }
            docs.push(doc);
            Ok(id)
        })
        .await
    }

    /// Applies `update` to the first document in `collection` that matches `filter` and returns
    /// the number of matched documents.
    ///
    /// Only the `$set` operator is supported, which replaces the given fields and leaves the rest
    /// untouched.  The primary key cannot be modified.
    pub async fn update_one(
        &mut self,
        collection: &str,
        filter: &Document,
        update: &Document,
    ) -> DbResult<u64> {
        let mut fields = Document::new();
        for (op, value) in update {
            match (op.as_str(), value) {
                ("$set", Bson::Document(set)) => fields.extend(set.clone()),
                (op, _) => {
                    return Err(DbError::BackendError(format!("Unsupported update operator {}", op)));
                }
            }
        }
        if fields.contains_key(ID_FIELD) {
            return Err(DbError::BackendError(format!("Cannot modify immutable field {}", ID_FIELD)));
        }

        self.run(move |state| {
            let doc = state
                .collections
                .get_mut(collection)
                .and_then(|docs| docs.iter_mut().find(|doc| matches(doc, filter)));
            match doc {
                Some(doc) => {
                    doc.extend(fields);
                    Ok(1)
                }
                None => Ok(0),
            }
        })
        .await
    }

    /// Removes the first document in `collection` that matches `filter` and returns the number of
    /// deleted documents.
    pub async fn delete_one(&mut self, collection: &str, filter: &Document) -> DbResult<u64> {
        self.run(|state| {
            let Some(docs) = state.collections.get_mut(collection) else {
                return Ok(0);
            };
            match docs.iter().position(|doc| matches(doc, filter)) {
                Some(pos) => {
                    docs.remove(pos);
                    Ok(1)
                }
                None => Ok(0),
            }
        })
        .await
    }
}

/// Test utilities for the in-memory store.
#[cfg(any(feature = "testutils", test))]
pub mod testutils {
    use super::*;

    /// Initializes the test database.
    pub async fn setup() -> MemoryDb {
        let _can_fail = env_logger::builder().is_test(true).try_init();
        MemoryDb::new()
    }
}

#[cfg(test)]
mod tests {
    use super::testutils::*;
    use super::*;
    use bson::doc;

    /// Extracts the in-memory executor out of a generic one.
    async fn memory_ex(db: &MemoryDb) -> MemoryExecutor {
        match db.ex().await.unwrap() {
            Executor::Memory(ex) => ex,
            #[allow(unreachable_patterns)]
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_find_empty() {
        let db = setup().await;
        let mut ex = memory_ex(&db).await;
        assert!(ex.find("things").await.unwrap().is_empty());
        assert_eq!(None, ex.find_one("things", &doc! { "a": 1 }).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let db = setup().await;
        let mut ex = db.typed_ex();

        let id1 = ex.insert_one("things", doc! { "a": 1 }).await.unwrap();
        let id2 = ex.insert_one("things", doc! { "a": 2 }).await.unwrap();
        assert!(matches!(id1, Bson::ObjectId(_)));
        assert!(matches!(id2, Bson::ObjectId(_)));
        assert_ne!(id1, id2);

        let docs = ex.find("things").await.unwrap();
        assert_eq!(vec![doc! { "a": 1, "_id": id1.clone() }, doc! { "a": 2, "_id": id2 }], docs);

        let doc = ex.find_one("things", &doc! { "_id": id1.clone() }).await.unwrap();
        assert_eq!(Some(doc! { "a": 1, "_id": id1 }), doc);
    }

    #[tokio::test]
    async fn test_insert_keeps_explicit_id() {
        let db = setup().await;
        let mut ex = db.typed_ex();

        let id = ObjectId::new();
        assert_eq!(
            Bson::ObjectId(id),
            ex.insert_one("things", doc! { "_id": id, "a": 1 }).await.unwrap()
        );
        match ex.insert_one("things", doc! { "_id": id, "a": 2 }).await {
            Err(DbError::BackendError(e)) => assert!(e.contains("Duplicate key")),
            e => panic!("Must have failed with a BackendError but got: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_collections_are_independent() {
        let db = setup().await;
        let mut ex = db.typed_ex();

        ex.insert_one("first", doc! { "a": 1 }).await.unwrap();
        assert_eq!(1, ex.find("first").await.unwrap().len());
        assert!(ex.find("second").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_one_set() {
        let db = setup().await;
        let mut ex = db.typed_ex();

        let id = ex.insert_one("things", doc! { "a": 1, "b": "x" }).await.unwrap();
        let filter = doc! { "_id": id.clone() };

        let matched =
            ex.update_one("things", &filter, &doc! { "$set": { "a": 5, "c": true } }).await.unwrap();
        assert_eq!(1, matched);
        assert_eq!(
            Some(doc! { "a": 5, "b": "x", "_id": id, "c": true }),
            ex.find_one("things", &filter).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_update_one_no_match() {
        let db = setup().await;
        let mut ex = db.typed_ex();

        ex.insert_one("things", doc! { "a": 1 }).await.unwrap();
        let filter = doc! { "_id": ObjectId::new() };
        assert_eq!(0, ex.update_one("things", &filter, &doc! { "$set": { "a": 2 } }).await.unwrap());
        assert_eq!(0, ex.update_one("other", &filter, &doc! { "$set": { "a": 2 } }).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_one_unsupported() {
        let db = setup().await;
        let mut ex = db.typed_ex();

        let filter = doc! { "a": 1 };
        match ex.update_one("things", &filter, &doc! { "$inc": { "a": 1 } }).await {
            Err(DbError::BackendError(e)) => assert!(e.contains("$inc")),
            e => panic!("Must have failed with a BackendError but got: {:?}", e),
        }
        match ex.update_one("things", &filter, &doc! { "$set": { "_id": 3 } }).await {
            Err(DbError::BackendError(e)) => assert!(e.contains("immutable")),
            e => panic!("Must have failed with a BackendError but got: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_delete_one() {
        let db = setup().await;
        let mut ex = db.typed_ex();

        let id1 = ex.insert_one("things", doc! { "a": 1 }).await.unwrap();
        let id2 = ex.insert_one("things", doc! { "a": 2 }).await.unwrap();

        assert_eq!(1, ex.delete_one("things", &doc! { "_id": id1.clone() }).await.unwrap());
        assert_eq!(0, ex.delete_one("things", &doc! { "_id": id1 }).await.unwrap());
        assert_eq!(0, ex.delete_one("other", &doc! { "_id": id2.clone() }).await.unwrap());
        assert_eq!(vec![doc! { "a": 2, "_id": id2 }], ex.find("things").await.unwrap());
    }

    #[tokio::test]
    async fn test_clones_share_contents() {
        let db = setup().await;
        let other = db.clone();

        db.typed_ex().insert_one("things", doc! { "a": 1 }).await.unwrap();
        assert_eq!(1, other.typed_ex().find("things").await.unwrap().len());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let db = setup().await;
        let mut ex = db.typed_ex();

        db.set_unavailable(true).await;
        assert_eq!(DbError::Unavailable, ex.find("things").await.unwrap_err());

        db.set_unavailable(false).await;
        assert!(ex.find("things").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_within_timeout() {
        let db = MemoryDb::new().with_timeout(Duration::from_secs(10));
        db.set_latency(Duration::from_secs(5)).await;
        assert!(db.typed_ex().find("things").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_exceeds_timeout() {
        let db = MemoryDb::new().with_timeout(Duration::from_secs(10));
        db.set_latency(Duration::from_secs(20)).await;
        assert_eq!(
            DbError::Timeout(Duration::from_secs(10)),
            db.typed_ex().insert_one("things", doc! { "a": 1 }).await.unwrap_err()
        );

        db.set_latency(Duration::ZERO).await;
        assert!(db.typed_ex().find("things").await.unwrap().is_empty());
    }
}
