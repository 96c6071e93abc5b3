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

//! High-level data types.

use bookshelf_core::model::{ModelError, ModelResult};
use bson::oid::ObjectId;
use derive_getters::Getters;
use derive_more::Constructor;
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifier of a book as assigned by the database.
///
/// Identifiers are 12-byte values that users see as 24-character hexadecimal strings.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct BookId(ObjectId);

impl BookId {
    /// Creates a new identifier from an untrusted string `s`, making sure it is valid.
    pub(crate) fn new(s: &str) -> ModelResult<Self> {
        match ObjectId::parse_str(s) {
            Ok(oid) => Ok(Self(oid)),
            Err(_) => Err(ModelError("Invalid ID".to_owned())),
        }
    }

    /// Returns the raw database representation of the identifier.
    pub(crate) fn as_object_id(&self) -> ObjectId {
        self.0
    }
}

impl From<ObjectId> for BookId {
    fn from(oid: ObjectId) -> Self {
        Self(oid)
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

impl Serialize for BookId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_hex())
    }
}

/// A deserialization visitor for a `BookId`.
struct BookIdVisitor;

impl Visitor<'_> for BookIdVisitor {
    type Value = BookId;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        BookId::new(v).map_err(|e| E::custom(e.to_string()))
    }
}

impl<'de> Deserialize<'de> for BookId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_str(BookIdVisitor)
    }
}

/// A book as stored in the database.
#[derive(Constructor, Getters, Serialize)]
#[cfg_attr(test, derive(Clone, Debug, Deserialize, PartialEq))]
pub(crate) struct Book {
    /// Identifier assigned by the database.
    id: BookId,

    /// Title of the book.
    title: String,

    /// Author of the book.
    author: String,

    /// Price of the book.  Not validated in any way.
    price: f64,
}

/// Deserializes a `T` that may be given as `null`, in which case it takes its zero value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The settable fields of a book, as provided by the user on creation and update.
///
/// Absent and null fields take their zero value, which means that an update with a partial
/// payload clears the fields it does not mention.  An `id` in the payload is ignored.
#[derive(Default, Deserialize, Getters)]
#[cfg_attr(test, derive(Clone, Constructor, Debug, PartialEq, Serialize))]
#[serde(default)]
pub(crate) struct BookFields {
    /// Title of the book.
    #[serde(deserialize_with = "null_as_default")]
    title: String,

    /// Author of the book.
    #[serde(deserialize_with = "null_as_default")]
    author: String,

    /// Price of the book.
    #[serde(deserialize_with = "null_as_default")]
    price: f64,
}

/// Result of a successful insertion.
#[derive(Serialize)]
#[cfg_attr(test, derive(Debug, Deserialize))]
pub(crate) struct Inserted {
    /// Identifier assigned to the new book.
    #[serde(rename = "insertedID")]
    pub(crate) inserted_id: BookId,
}

/// Acknowledgement of an operation that does not return any data.
#[derive(Serialize)]
#[cfg_attr(test, derive(Debug, Deserialize, PartialEq))]
pub(crate) struct Ack {
    /// Human-readable description of what happened.
    pub(crate) message: String,
}

impl Ack {
    /// Creates a new acknowledgement with `message`.
    pub(crate) fn new<S: Into<String>>(message: S) -> Self {
        Self { message: message.into() }
    }
}
