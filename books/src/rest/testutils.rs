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

//! Test utilities for the REST API.

use crate::db;
use crate::driver::Driver;
use crate::model::*;
use crate::rest::app;
use axum::Router;
use bookshelf_core::db::memory::{self, MemoryDb};
use bookshelf_core::db::Db;
use bson::Document;
use std::sync::Arc;
use std::time::Duration;

pub(crate) struct TestContext {
    db: MemoryDb,
    app: Router,
}

impl TestContext {
    pub(crate) async fn setup() -> Self {
        Self::from_db(memory::testutils::setup().await)
    }

    pub(crate) async fn setup_with_timeout(timeout: Duration) -> Self {
        Self::from_db(memory::testutils::setup().await.with_timeout(timeout))
    }

    fn from_db(db: MemoryDb) -> Self {
        let driver = Driver::new(Arc::new(db.clone()));
        let app = app(driver);
        Self { db, app }
    }

    pub(crate) fn db(&self) -> &MemoryDb {
        &self.db
    }

    pub(crate) fn app(&self) -> Router {
        self.app.clone()
    }

    pub(crate) fn into_app(self) -> Router {
        self.app
    }

    pub(crate) async fn put_book<T: Into<String>, A: Into<String>>(
        &self,
        title: T,
        author: A,
        price: f64,
    ) -> BookId {
        let fields = BookFields::new(title.into(), author.into(), price);
        db::put_new_book(&mut self.db.ex().await.unwrap(), &fields).await.unwrap()
    }

    /// Stores `doc` in the books collection without going through the model types.
    pub(crate) async fn put_raw(&self, doc: Document) {
        self.db.typed_ex().insert_one(db::COLLECTION, doc).await.unwrap();
    }

    pub(crate) async fn get_book(&self, id: BookId) -> Option<Book> {
        db::get_book(&mut self.db.ex().await.unwrap(), &id).await.unwrap()
    }

    pub(crate) async fn book_count(&self) -> usize {
        db::get_books(&mut self.db.ex().await.unwrap()).await.unwrap().len()
    }
}
