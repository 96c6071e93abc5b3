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

//! Database abstraction in terms of the operations needed by the server.
//!
//! Books are stored in the `books` collection as documents with the fields `_id` (an `ObjectId`
//! assigned on insertion), `title`, `author` and `price`.

use crate::model::*;
use bookshelf_core::db::{DbError, DbResult, Executor};
use bson::{doc, Bson, Document};
#[cfg(feature = "mongodb")]
use futures::TryStreamExt;

#[cfg(test)]
pub(crate) mod tests;

/// Name of the collection that holds the books.
pub(crate) const COLLECTION: &str = "books";

/// Extracts the text `field` from `doc`.  Missing and null fields are read as empty strings.
fn get_text(doc: &Document, field: &str) -> DbResult<String> {
    match doc.get(field) {
        None | Some(Bson::Null) => Ok(String::new()),
        Some(Bson::String(s)) => Ok(s.clone()),
        Some(other) => Err(DbError::DataIntegrityError(format!(
            "Field {} should be a string but is {:?}",
            field,
            other.element_type()
        ))),
    }
}

/// Extracts the numeric `field` from `doc`.  Missing and null fields are read as zero.
fn get_number(doc: &Document, field: &str) -> DbResult<f64> {
    match doc.get(field) {
        None | Some(Bson::Null) => Ok(0.0),
        Some(Bson::Double(n)) => Ok(*n),
        Some(Bson::Int32(n)) => Ok(f64::from(*n)),
        Some(Bson::Int64(n)) => Ok(*n as f64),
        Some(other) => Err(DbError::DataIntegrityError(format!(
            "Field {} should be a number but is {:?}",
            field,
            other.element_type()
        ))),
    }
}

/// Converts a stored document into a `Book`.
fn book_from_document(doc: &Document) -> DbResult<Book> {
    let id = match doc.get("_id") {
        Some(Bson::ObjectId(oid)) => BookId::from(*oid),
        other => {
            return Err(DbError::DataIntegrityError(format!("Invalid book _id {:?}", other)));
        }
    };
    Ok(Book::new(id, get_text(doc, "title")?, get_text(doc, "author")?, get_number(doc, "price")?))
}

/// Converts the settable `fields` of a book into their stored representation.
fn fields_to_document(fields: &BookFields) -> Document {
    doc! {
        "title": fields.title().to_owned(),
        "author": fields.author().to_owned(),
        "price": fields.price().to_owned(),
    }
}

/// Returns the filter that selects the book `id`.
fn id_filter(id: &BookId) -> Document {
    doc! { "_id": id.as_object_id() }
}

/// Gets all existing books.
///
/// Fails with `DataIntegrityError` if any of the stored documents cannot be decoded.
pub(crate) async fn get_books(ex: &mut Executor) -> DbResult<Vec<Book>> {
    let docs: Vec<Document> = match ex {
        #[cfg(feature = "mongodb")]
        Executor::Mongo(ex) => {
            let books = ex.collection(COLLECTION);
            ex.run(async move { books.find(doc! {}).await?.try_collect::<Vec<Document>>().await })
                .await?
        }

        #[cfg(any(feature = "memory", test))]
        Executor::Memory(ex) => ex.find(COLLECTION).await?,

        #[allow(unused)]
        _ => unreachable!(),
    };
    docs.iter().map(book_from_document).collect()
}

/// Gets the book `id`, or `None` if it does not exist.
pub(crate) async fn get_book(ex: &mut Executor, id: &BookId) -> DbResult<Option<Book>> {
    let filter = id_filter(id);
    let doc: Option<Document> = match ex {
        #[cfg(feature = "mongodb")]
        Executor::Mongo(ex) => {
            let books = ex.collection(COLLECTION);
            ex.run(async move { books.find_one(filter).await }).await?
        }

        #[cfg(any(feature = "memory", test))]
        Executor::Memory(ex) => ex.find_one(COLLECTION, &filter).await?,

        #[allow(unused)]
        _ => unreachable!(),
    };
    doc.as_ref().map(book_from_document).transpose()
}

/// Stores a new book with `fields` and returns the identifier assigned to it.
pub(crate) async fn put_new_book(ex: &mut Executor, fields: &BookFields) -> DbResult<BookId> {
    let doc = fields_to_document(fields);
    let id: Bson = match ex {
        #[cfg(feature = "mongodb")]
        Executor::Mongo(ex) => {
            let books = ex.collection(COLLECTION);
            ex.run(async move { books.insert_one(doc).await }).await?.inserted_id
        }

        #[cfg(any(feature = "memory", test))]
        Executor::Memory(ex) => ex.insert_one(COLLECTION, doc).await?,

        #[allow(unused)]
        _ => unreachable!(),
    };
    match id.as_object_id() {
        Some(oid) => Ok(BookId::from(oid)),
        None => Err(DbError::BackendError(format!("Insertion returned a non-ObjectId key {}", id))),
    }
}

/// Overwrites all settable fields of book `id` with `fields` and returns the number of books that
/// matched `id` (0 or 1).
pub(crate) async fn update_book(
    ex: &mut Executor,
    id: &BookId,
    fields: &BookFields,
) -> DbResult<u64> {
    let filter = id_filter(id);
    let update = doc! { "$set": fields_to_document(fields) };
    let matched = match ex {
        #[cfg(feature = "mongodb")]
        Executor::Mongo(ex) => {
            let books = ex.collection(COLLECTION);
            ex.run(async move { books.update_one(filter, update).await }).await?.matched_count
        }

        #[cfg(any(feature = "memory", test))]
        Executor::Memory(ex) => ex.update_one(COLLECTION, &filter, &update).await?,

        #[allow(unused)]
        _ => unreachable!(),
    };
    Ok(matched)
}

/// Deletes book `id` and returns the number of deleted books (0 or 1).
pub(crate) async fn delete_book(ex: &mut Executor, id: &BookId) -> DbResult<u64> {
    let filter = id_filter(id);
    let deleted = match ex {
        #[cfg(feature = "mongodb")]
        Executor::Mongo(ex) => {
            let books = ex.collection(COLLECTION);
            ex.run(async move { books.delete_one(filter).await }).await?.deleted_count
        }

        #[cfg(any(feature = "memory", test))]
        Executor::Memory(ex) => ex.delete_one(COLLECTION, &filter).await?,

        #[allow(unused)]
        _ => unreachable!(),
    };
    Ok(deleted)
}
