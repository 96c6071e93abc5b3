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

//! Generic abstraction to access different document database systems.
//!
//! The facilities in this module provide an abstraction over different database systems such as
//! MongoDB and an in-process document store.  The MongoDB backend is for production use and the
//! in-memory backend is primarily intended to support unit tests.
//!
//! Every operation issued through an `Executor` is bounded by a timeout.  Operations that exceed
//! it fail with `DbError::Timeout` instead of blocking the caller.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

#[cfg(any(feature = "memory", test))]
pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongo;

/// Default timeout for any single database operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Database errors.  Any unexpected errors that come from the database are classified as
/// `BackendError`, but errors we know about have more specific types.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DbError {
    /// Catch-all error type for unexpected database errors.
    #[error("Database error: {0}")]
    BackendError(String),

    /// Indicates a failure processing the data that already exists in the database.
    #[error("Data integrity error: {0}")]
    DataIntegrityError(String),

    /// Indicates that a requested entry does not exist.
    #[error("Entity not found")]
    NotFound,

    /// Indicates that an operation did not complete within the configured deadline.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Indicates that the database is not available (maybe because the server cannot be reached).
    #[error("Unavailable")]
    Unavailable,
}

/// Result type for this module.
pub type DbResult<T> = Result<T, DbError>;

/// Runs the database operation `op` and fails it with `DbError::Timeout` if it does not complete
/// within `timeout`.  The operation is dropped (and thus cancelled) once the deadline passes.
pub async fn with_timeout<T, F>(timeout: Duration, op: F) -> DbResult<T>
where
    F: Future<Output = DbResult<T>>,
{
    match tokio::time::timeout(timeout, op).await {
        Ok(result) => result,
        Err(_) => Err(DbError::Timeout(timeout)),
    }
}

/// A database executor that can talk to multiple database implementations.
///
/// Users of this type are forced to destructure it and issue different calls for each database,
/// which keeps the translation between model types and each backend's documents explicit.
pub enum Executor {
    /// A MongoDB executor bound to a specific database.
    #[cfg(feature = "mongodb")]
    Mongo(mongo::MongoExecutor),

    /// An executor for the in-process document store.
    #[cfg(any(feature = "memory", test))]
    Memory(memory::MemoryExecutor),
}

/// Abstraction over the database connection.
///
/// Implementations must be safe to share across concurrent requests: every request obtains its
/// own `Executor` via `ex` and all of them talk to the same underlying connection pool.
#[async_trait]
pub trait Db {
    /// Obtains an executor for direct access to the database.
    ///
    /// This would be better called `executor` but this method is used so frequently that it makes
    /// call sites too verbose.
    async fn ex(&self) -> DbResult<Executor>;

    /// Releases the resources held by the connection.  No further operations should be issued
    /// afterwards.
    async fn close(&self);
}

/// Macros to help instantiate tests for multiple database systems.
#[cfg(any(test, feature = "testutils"))]
pub mod testutils {
    pub use paste::paste;

    /// Instantiates the `module::name` test for the database configured by `setup`.
    ///
    /// The `extra` metadata parameter can be used to tag the generated tests.
    #[macro_export]
    macro_rules! generate_one_test [
        ( $name:ident, $setup:expr, $module:path $(, #[$extra:meta] )? ) => {
            #[tokio::test]
            $(#[$extra])?
            async fn $name() {
                $crate::db::testutils::paste! {
                    $module :: [< $name >]($setup).await;
                }
            }
        }
    ];

    pub use generate_one_test;

    /// Instantiates a collection of tests for a specific database system.
    ///
    /// The database implementation to run the tests against is determined by the `setup`
    /// expression, which needs to return a database object.
    ///
    /// The `extra` metadata parameter can be used to tag the generated tests.
    #[macro_export]
    macro_rules! generate_tests [
        ( #[$extra:meta], $setup:expr, $module:path $(, $name:ident)+ ) => {
            $(
                $crate::db::testutils::generate_one_test!($name, $setup, $module, #[$extra]);
            )+
        };

        ( $setup:expr, $module:path $(, $name:ident)+ ) => {
            $(
                $crate::db::testutils::generate_one_test!($name, $setup, $module);
            )+
        };
    ];

    pub use generate_tests;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_completes() {
        let result = with_timeout(Duration::from_secs(1), async { Ok(5) }).await;
        assert_eq!(Ok(5), result);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_propagates_errors() {
        let result: DbResult<()> =
            with_timeout(Duration::from_secs(1), async { Err(DbError::Unavailable) }).await;
        assert_eq!(Err(DbError::Unavailable), result);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires() {
        let result = with_timeout(Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok(())
        })
        .await;
        assert_eq!(Err(DbError::Timeout(Duration::from_secs(1))), result);
    }
}
