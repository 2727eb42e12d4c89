//! Author and title identifiers.
//!
//! Identifiers are business keys: `DDD-DD-DDDD` for authors and `LLDDDD`
//! (two uppercase letters, four digits) for titles. The generator only
//! guarantees the format; uniqueness is checked by the store at insert time.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};

/// Stable external identifier of an author
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(try_from = "String", into = "String")]
#[sqlx(transparent)]
pub struct AuthorId(String);

/// Stable external identifier of a title
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(try_from = "String", into = "String")]
#[sqlx(transparent)]
pub struct TitleId(String);

fn is_author_id(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 11
        && bytes.iter().enumerate().all(|(i, b)| match i {
            3 | 6 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

fn is_title_id(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 6
        && bytes[..2].iter().all(u8::is_ascii_uppercase)
        && bytes[2..].iter().all(u8::is_ascii_digit)
}

impl AuthorId {
    /// Parse and validate an author id received from a caller.
    pub fn parse(s: &str) -> CatalogResult<Self> {
        let s = s.trim();
        if is_author_id(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(CatalogError::validation(
                "au_id",
                format!("`{}` is not a valid author id (expected DDD-DD-DDDD)", s),
            ))
        }
    }

    /// Draw a random candidate id. The leading group never starts with zero.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(format!(
            "{:03}-{:02}-{:04}",
            rng.gen_range(100..=999),
            rng.gen_range(0..=99),
            rng.gen_range(0..=9999)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TitleId {
    /// Parse and validate a title id received from a caller.
    pub fn parse(s: &str) -> CatalogResult<Self> {
        let s = s.trim();
        if is_title_id(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(CatalogError::validation(
                "title_id",
                format!("`{}` is not a valid title id (expected two letters and four digits)", s),
            ))
        }
    }

    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let letters: String = (0..2)
            .map(|_| char::from(rng.gen_range(b'A'..=b'Z')))
            .collect();
        Self(format!("{}{:04}", letters, rng.gen_range(0..=9999)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Candidate id for a new author.
pub fn new_author_id() -> AuthorId {
    AuthorId::generate(&mut rand::thread_rng())
}

/// Candidate id for a new title.
pub fn new_title_id() -> TitleId {
    TitleId::generate(&mut rand::thread_rng())
}

macro_rules! string_id_impls {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = CatalogError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                $ty::parse(&value)
            }
        }

        impl From<$ty> for String {
            fn from(id: $ty) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id_impls!(AuthorId);
string_id_impls!(TitleId);
