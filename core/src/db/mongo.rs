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

//! Common utilities to interact with a MongoDB database.

use crate::db::{DEFAULT_TIMEOUT, Db, DbError, DbResult, Executor, with_timeout};
use crate::env::get_optional_var;
use async_trait::async_trait;
use bson::{Document, doc};
use derivative::Derivative;
use log::info;
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use std::future::Future;
use std::time::Duration;

/// Default value for the `uri` configuration property.
pub const DEFAULT_URI: &str = "mongodb://localhost:27017";

/// Takes a raw MongoDB error `e` and converts it to our generic error type.
pub fn map_mongo_error(e: mongodb::error::Error) -> DbError {
    match e.kind.as_ref() {
        ErrorKind::ServerSelection { .. } => DbError::Unavailable,
        _ => DbError::BackendError(e.to_string()),
    }
}

/// Options to establish a connection to a MongoDB database.
#[derive(Derivative)]
#[derivative(Debug)]
#[cfg_attr(test, derivative(PartialEq))]
pub struct MongoOptions {
    /// Connection string of the deployment.  May contain credentials.
    #[derivative(Debug = "ignore")]
    pub uri: String,

    /// Name of the database to operate on.
    pub database: String,

    /// Deadline to establish the connection and to complete every individual operation.
    pub timeout: Duration,
}

impl MongoOptions {
    /// Initializes a set of options from environment variables whose name is prefixed with the
    /// given `prefix`.
    ///
    /// This will use variables such as `<prefix>_URI`, `<prefix>_DATABASE` and
    /// `<prefix>_TIMEOUT_SECS`, all of which are optional.  The database name falls back to
    /// `default_database` when not given.
    pub fn from_env(prefix: &str, default_database: &str) -> Result<MongoOptions, String> {
        Ok(MongoOptions {
            uri: get_optional_var::<String>(prefix, "URI")?
                .unwrap_or_else(|| DEFAULT_URI.to_owned()),
            database: get_optional_var::<String>(prefix, "DATABASE")?
                .unwrap_or_else(|| default_database.to_owned()),
            timeout: get_optional_var::<u64>(prefix, "TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
        })
    }
}

/// Executor for a MongoDB database.
pub struct MongoExecutor {
    /// Handle to the database the executor operates on.  Cheap to clone and backed by the
    /// client's connection pool.
    database: Database,

    /// Deadline applied to every operation.
    timeout: Duration,
}

impl MongoExecutor {
    /// Returns a handle to the collection `name`, which need not exist yet.
    pub fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }

    /// Runs the driver operation `op`, mapping its errors and bounding it by the timeout.
    pub async fn run<T, F>(&self, op: F) -> DbResult<T>
    where
        F: Future<Output = mongodb::error::Result<T>>,
    {
        with_timeout(self.timeout, async { op.await.map_err(map_mongo_error) }).await
    }
}

/// Shareable connection to a MongoDB deployment.
#[derive(Clone)]
pub struct MongoDb {
    /// Client that owns the connection pool.
    client: Client,

    /// Name of the database to operate on.
    database: String,

    /// Deadline applied to every operation.
    timeout: Duration,
}

impl MongoDb {
    /// Creates a new connection based on a set of options and verifies that the server is
    /// reachable within the configured timeout.
    pub async fn connect(opts: MongoOptions) -> DbResult<Self> {
        let mut client_options = with_timeout(opts.timeout, async {
            ClientOptions::parse(&opts.uri).await.map_err(map_mongo_error)
        })
        .await?;
        client_options.connect_timeout = Some(opts.timeout);
        client_options.server_selection_timeout = Some(opts.timeout);

        let client = Client::with_options(client_options).map_err(map_mongo_error)?;
        let db = Self { client, database: opts.database, timeout: opts.timeout };

        let ex = db.typed_ex();
        ex.run(async { ex.database.run_command(doc! { "ping": 1 }).await }).await?;
        info!("Connected to MongoDB database {}", db.database);
        Ok(db)
    }

    /// Returns an executor of the specific type used by this database.
    pub fn typed_ex(&self) -> MongoExecutor {
        MongoExecutor { database: self.client.database(&self.database), timeout: self.timeout }
    }
}

#[async_trait]
impl Db for MongoDb {
    async fn ex(&self) -> DbResult<Executor> {
        Ok(Executor::Mongo(self.typed_ex()))
    }

    async fn close(&self) {
        info!("Shutting down MongoDB client");
        self.client.clone().shutdown().await;
    }
}

/// Test utilities for the MongoDB connection.
#[cfg(any(feature = "testutils", test))]
pub mod testutils {
    use super::*;
    use bson::oid::ObjectId;

    /// Creates a new connection to the test deployment configured via the `MONGO_TEST_*`
    /// variables.
    ///
    /// Every call operates on a fresh database with a unique name so that tests do not interfere
    /// with each other.  Given that this is for testing purposes only, any errors will panic.
    pub async fn setup() -> MongoDb {
        let _can_fail = env_logger::builder().is_test(true).try_init();

        let database = format!("test_{}", ObjectId::new().to_hex());
        let opts = MongoOptions::from_env("MONGO_TEST", &database).unwrap();
        MongoDb::connect(MongoOptions { database, ..opts }).await.unwrap()
    }
}
