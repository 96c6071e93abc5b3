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

//! Database tests shared by all implementations.

use crate::db::*;
use bookshelf_core::db::Db;

/// Stores `doc` in the books collection as is, bypassing the model types.
async fn insert_raw<D: Db>(db: &D, doc: Document) {
    match db.ex().await.unwrap() {
        #[cfg(feature = "mongodb")]
        Executor::Mongo(ex) => {
            ex.collection(COLLECTION).insert_one(doc).await.unwrap();
        }

        Executor::Memory(mut ex) => {
            ex.insert_one(COLLECTION, doc).await.unwrap();
        }
    }
}

/// Sorts `books` by title so that tests do not depend on the order in which they are returned.
fn sorted(mut books: Vec<Book>) -> Vec<Book> {
    books.sort_by(|a, b| a.title().cmp(b.title()));
    books
}

pub(crate) async fn test_book_lifecycle<D: Db>(db: D) {
    let mut ex = db.ex().await.unwrap();

    let fields = BookFields::new("Dune".to_owned(), "Herbert".to_owned(), 9.99);
    let id = put_new_book(&mut ex, &fields).await.unwrap();
    let book = Book::new(id, "Dune".to_owned(), "Herbert".to_owned(), 9.99);
    assert_eq!(Some(book), get_book(&mut ex, &id).await.unwrap());

    let fields = BookFields::new(String::new(), String::new(), 12.5);
    assert_eq!(1, update_book(&mut ex, &id, &fields).await.unwrap());
    let book = Book::new(id, String::new(), String::new(), 12.5);
    assert_eq!(Some(book), get_book(&mut ex, &id).await.unwrap());

    assert_eq!(1, delete_book(&mut ex, &id).await.unwrap());
    assert_eq!(None, get_book(&mut ex, &id).await.unwrap());
}

pub(crate) async fn test_get_books<D: Db>(db: D) {
    let mut ex = db.ex().await.unwrap();

    assert!(get_books(&mut ex).await.unwrap().is_empty());

    let mut exp_books = vec![];
    for (title, author, price) in [("B", "Second", 2.0), ("A", "First", 1.5), ("C", "Third", 0.0)]
    {
        let fields = BookFields::new(title.to_owned(), author.to_owned(), price);
        let id = put_new_book(&mut ex, &fields).await.unwrap();
        exp_books.push(Book::new(id, title.to_owned(), author.to_owned(), price));
    }

    assert_eq!(sorted(exp_books), sorted(get_books(&mut ex).await.unwrap()));
}

pub(crate) async fn test_put_new_book_assigns_unique_ids<D: Db>(db: D) {
    let mut ex = db.ex().await.unwrap();

    let fields = BookFields::new("Same".to_owned(), "Same".to_owned(), 1.0);
    let id1 = put_new_book(&mut ex, &fields).await.unwrap();
    let id2 = put_new_book(&mut ex, &fields).await.unwrap();
    assert_ne!(id1, id2);
    assert_eq!(2, get_books(&mut ex).await.unwrap().len());
}

pub(crate) async fn test_missing_book<D: Db>(db: D) {
    let mut ex = db.ex().await.unwrap();

    let other = BookFields::new("Other".to_owned(), "Someone".to_owned(), 3.0);
    let other_id = put_new_book(&mut ex, &other).await.unwrap();

    let id = BookId::new("65a1b2c3d4e5f60718293a4b").unwrap();
    assert_eq!(None, get_book(&mut ex, &id).await.unwrap());
    assert_eq!(0, update_book(&mut ex, &id, &BookFields::default()).await.unwrap());
    assert_eq!(0, delete_book(&mut ex, &id).await.unwrap());

    let other = Book::new(other_id, "Other".to_owned(), "Someone".to_owned(), 3.0);
    assert_eq!(Some(other), get_book(&mut ex, &other_id).await.unwrap());
}

pub(crate) async fn test_update_book_keeps_other_books<D: Db>(db: D) {
    let mut ex = db.ex().await.unwrap();

    let first = BookFields::new("First".to_owned(), "One".to_owned(), 1.0);
    let id1 = put_new_book(&mut ex, &first).await.unwrap();
    let second = BookFields::new("Second".to_owned(), "Two".to_owned(), 2.0);
    let id2 = put_new_book(&mut ex, &second).await.unwrap();

    let update = BookFields::new("Changed".to_owned(), "Three".to_owned(), 3.0);
    assert_eq!(1, update_book(&mut ex, &id1, &update).await.unwrap());

    let exp_books = vec![
        Book::new(id1, "Changed".to_owned(), "Three".to_owned(), 3.0),
        Book::new(id2, "Second".to_owned(), "Two".to_owned(), 2.0),
    ];
    assert_eq!(sorted(exp_books), sorted(get_books(&mut ex).await.unwrap()));
}

pub(crate) async fn test_lax_documents<D: Db>(db: D) {
    let oid1 = bson::oid::ObjectId::new();
    insert_raw(&db, doc! { "_id": oid1, "price": 7 }).await;
    let oid2 = bson::oid::ObjectId::new();
    insert_raw(&db, doc! { "_id": oid2, "title": "T", "author": Bson::Null, "price": 8i64 })
        .await;

    let mut ex = db.ex().await.unwrap();
    assert_eq!(
        Some(Book::new(BookId::from(oid1), String::new(), String::new(), 7.0)),
        get_book(&mut ex, &BookId::from(oid1)).await.unwrap()
    );
    assert_eq!(
        Some(Book::new(BookId::from(oid2), "T".to_owned(), String::new(), 8.0)),
        get_book(&mut ex, &BookId::from(oid2)).await.unwrap()
    );
}

pub(crate) async fn test_malformed_documents<D: Db>(db: D) {
    let fields = BookFields::new("Good".to_owned(), "Author".to_owned(), 1.0);
    put_new_book(&mut db.ex().await.unwrap(), &fields).await.unwrap();

    let oid = bson::oid::ObjectId::new();
    insert_raw(&db, doc! { "_id": oid, "title": 5, "author": "A", "price": 1.0 }).await;
    insert_raw(&db, doc! { "_id": "not-an-oid", "title": "T", "author": "A", "price": 1.0 }).await;

    let mut ex = db.ex().await.unwrap();
    match get_books(&mut ex).await {
        Err(DbError::DataIntegrityError(_)) => (),
        e => panic!("Must have failed with a DataIntegrityError but got: {:?}", e),
    }
    match get_book(&mut ex, &BookId::from(oid)).await {
        Err(DbError::DataIntegrityError(e)) => assert!(e.contains("title")),
        e => panic!("Must have failed with a DataIntegrityError but got: {:?}", e),
    }
}

/// Instantiates all database tests for the database returned by `setup`.
macro_rules! generate_db_tests [
    ( $setup:expr $(, #[$extra:meta])? ) => {
        bookshelf_core::db::testutils::generate_tests!(
            $( #[$extra], )?
            $setup,
            $crate::db::tests,
            test_book_lifecycle,
            test_get_books,
            test_put_new_book_assigns_unique_ids,
            test_missing_book,
            test_update_book_keeps_other_books,
            test_lax_documents,
            test_malformed_documents
        );
    }
];

mod memory {
    generate_db_tests!(bookshelf_core::db::memory::testutils::setup().await);
}

#[cfg(feature = "mongodb")]
mod mongo {
    generate_db_tests!(
        bookshelf_core::db::mongo::testutils::setup().await,
        #[ignore = "Requires environment configuration and is expensive"]
    );
}
