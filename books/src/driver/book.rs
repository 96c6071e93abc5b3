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

//! Operations on one book.

use crate::db;
use crate::driver::{store_error, Driver};
use crate::model::*;
use bookshelf_core::driver::{DriverError, DriverResult};

/// Error message for operations that target a book that does not exist.
const NOT_FOUND: &str = "Book not found";

impl Driver {
    /// Gets the book `id`.
    pub(crate) async fn get_book(self, id: &BookId) -> DriverResult<Book> {
        const MESSAGE: &str = "Error retrieving book";
        let mut ex = self.db.ex().await.map_err(|e| store_error(MESSAGE, e))?;
        match db::get_book(&mut ex, id).await {
            Ok(Some(book)) => Ok(book),
            Ok(None) => Err(DriverError::NotFound(NOT_FOUND.to_owned())),
            Err(e) => Err(store_error(MESSAGE, e)),
        }
    }

    /// Overwrites the settable fields of book `id` with `fields`.
    pub(crate) async fn update_book(self, id: &BookId, fields: BookFields) -> DriverResult<()> {
        const MESSAGE: &str = "Error updating book";
        let mut ex = self.db.ex().await.map_err(|e| store_error(MESSAGE, e))?;
        match db::update_book(&mut ex, id, &fields).await {
            Ok(0) => Err(DriverError::NotFound(NOT_FOUND.to_owned())),
            Ok(_) => Ok(()),
            Err(e) => Err(store_error(MESSAGE, e)),
        }
    }

    /// Deletes book `id`.
    pub(crate) async fn delete_book(self, id: &BookId) -> DriverResult<()> {
        const MESSAGE: &str = "Error deleting book";
        let mut ex = self.db.ex().await.map_err(|e| store_error(MESSAGE, e))?;
        match db::delete_book(&mut ex, id).await {
            Ok(0) => Err(DriverError::NotFound(NOT_FOUND.to_owned())),
            Ok(_) => Ok(()),
            Err(e) => Err(store_error(MESSAGE, e)),
        }
    }
}
