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

//! API to update an existing book.

use crate::driver::Driver;
use crate::model::{Ack, BookFields};
use crate::rest::BookIdPath;
use axum::extract::State;
use axum::Json;
use bookshelf_core::rest::{JsonBody, RestResult};

/// API handler.
///
/// The identifier is extracted before the body so that invalid identifiers are reported even if
/// the body is malformed too.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    BookIdPath(id): BookIdPath,
    JsonBody(fields): JsonBody<BookFields>,
) -> RestResult<Json<Ack>> {
    driver.update_book(&id, fields).await?;
    Ok(Json(Ack::new("Book updated")))
}
