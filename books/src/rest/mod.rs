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

//! Entry point to the REST server.

use crate::driver::Driver;
use crate::model::BookId;
use async_trait::async_trait;
use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use axum::Router;
use bookshelf_core::rest::{log_request, panic_response, RestError, RestResult};
use tower_http::catch_panic::CatchPanicLayer;

mod book_delete;
mod book_get;
mod book_put;
mod books_get;
mod books_post;
mod ping_get;
#[cfg(test)]
mod testutils;

/// Extractor for the identifier of a book given in the request path.
///
/// Identifiers that are not valid are rejected with a 400 error before the request body, if any,
/// is looked at.
pub(crate) struct BookIdPath(pub(crate) BookId);

#[async_trait]
impl<S> FromRequestParts<S> for BookIdPath
where
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| RestError::InvalidRequest(e.body_text()))?;
        Ok(BookIdPath(BookId::new(&raw)?))
    }
}

/// Handler for the APIs on one book when the identifier in the path is empty.
async fn empty_id_handler() -> RestResult<()> {
    Err(RestError::InvalidRequest("Invalid ID".to_owned()))
}

/// Creates the router for the application.
pub(crate) fn app(driver: Driver) -> Router {
    use axum::routing::get;
    Router::new()
        .route("/books", get(books_get::handler).post(books_post::handler))
        .route(
            "/books/:id",
            get(book_get::handler).put(book_put::handler).delete(book_delete::handler),
        )
        .route(
            "/books/",
            get(empty_id_handler).put(empty_id_handler).delete(empty_id_handler),
        )
        .route("/ping", get(ping_get::handler))
        .layer(axum::middleware::from_fn(log_request))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(driver)
}
