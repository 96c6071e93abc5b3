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

//! Test utilities for the business layer.

use crate::driver::Driver;
use bookshelf_core::db::memory::{self, MemoryDb};
use bookshelf_core::db::{Db, Executor};
use std::sync::Arc;
use std::time::Duration;

/// State of a running test.
pub(crate) struct TestContext {
    db: MemoryDb,
    driver: Driver,
}

impl TestContext {
    /// Initializes a driver backed by an empty in-memory database.
    pub(crate) async fn setup() -> Self {
        Self::from_db(memory::testutils::setup().await)
    }

    /// Initializes a driver whose database operations give up after `timeout`.
    pub(crate) async fn setup_with_timeout(timeout: Duration) -> Self {
        Self::from_db(memory::testutils::setup().await.with_timeout(timeout))
    }

    fn from_db(db: MemoryDb) -> Self {
        let driver = Driver::new(Arc::new(db.clone()));
        Self { db, driver }
    }

    /// Returns the database used by the driver for direct manipulation.
    pub(crate) fn db(&self) -> &MemoryDb {
        &self.db
    }

    /// Returns an executor against the database used by the driver.
    pub(crate) async fn ex(&self) -> Executor {
        self.db.ex().await.unwrap()
    }

    /// Returns a copy of the driver under test.
    pub(crate) fn driver(&self) -> Driver {
        self.driver.clone()
    }
}
