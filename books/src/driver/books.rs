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

//! Operations on the collection of books.

use crate::db;
use crate::driver::{store_error, Driver};
use crate::model::*;
use bookshelf_core::driver::DriverResult;

impl Driver {
    /// Gets all existing books.
    pub(crate) async fn list_books(self) -> DriverResult<Vec<Book>> {
        const MESSAGE: &str = "Error retrieving books";
        let mut ex = self.db.ex().await.map_err(|e| store_error(MESSAGE, e))?;
        db::get_books(&mut ex).await.map_err(|e| store_error(MESSAGE, e))
    }

    /// Creates a new book with `fields` and returns its assigned identifier.
    pub(crate) async fn create_book(self, fields: BookFields) -> DriverResult<BookId> {
        const MESSAGE: &str = "Error inserting book";
        let mut ex = self.db.ex().await.map_err(|e| store_error(MESSAGE, e))?;
        db::put_new_book(&mut ex, &fields).await.map_err(|e| store_error(MESSAGE, e))
    }
}
