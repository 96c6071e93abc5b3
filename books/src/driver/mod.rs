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

//! Business logic for the service.

use bookshelf_core::db::{Db, DbError};
use bookshelf_core::driver::DriverError;
use log::warn;
use std::sync::Arc;

mod book;
mod books;
#[cfg(test)]
pub(crate) mod testutils;

/// Business logic.
///
/// The public operations exposed by the driver are all "one shot": they issue a single request
/// against the database and report its outcome.  For this reason, these operations consume the
/// driver in an attempt to minimize the possibility of executing two operations.
#[derive(Clone)]
pub(crate) struct Driver {
    /// The database that the driver uses for persistence.
    db: Arc<dyn Db + Send + Sync>,
}

impl Driver {
    /// Creates a new driver backed by the given injected components.
    pub(crate) fn new(db: Arc<dyn Db + Send + Sync>) -> Self {
        Self { db }
    }
}

/// Logs the database error `e` and hides it behind the user-facing `message`.
fn store_error(message: &str, e: DbError) -> DriverError {
    warn!("{}: {}", message, e);
    DriverError::BackendError(message.to_owned())
}
