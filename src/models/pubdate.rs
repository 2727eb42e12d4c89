//! Publication date handling.
//!
//! Dates are accepted as ISO `YYYY-MM-DD` or day-first `DD-MM-YYYY`, held
//! internally as a calendar date (persisted in ISO form) and rendered to
//! callers day-first.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CatalogError, CatalogResult};

const ISO_FORMAT: &str = "%Y-%m-%d";
const DISPLAY_FORMAT: &str = "%d-%m-%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, sqlx::Type)]
#[sqlx(transparent)]
pub struct PubDate(NaiveDate);

impl PubDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Parse either accepted input form.
    ///
    /// chrono's `%Y` takes a year of any width, so the shape is checked first:
    /// both forms are ten characters with dashes at fixed positions.
    pub fn parse(input: &str) -> CatalogResult<Self> {
        let input = input.trim();
        let format = match input_shape(input) {
            Some(Shape::Iso) => ISO_FORMAT,
            Some(Shape::DayFirst) => DISPLAY_FORMAT,
            None => return Err(invalid_date(input)),
        };
        NaiveDate::parse_from_str(input, format)
            .map(Self)
            .map_err(|_| invalid_date(input))
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Canonical persisted form.
    pub fn to_iso(&self) -> String {
        self.0.format(ISO_FORMAT).to_string()
    }
}

enum Shape {
    Iso,
    DayFirst,
}

fn input_shape(input: &str) -> Option<Shape> {
    let bytes = input.as_bytes();
    if bytes.len() != 10 {
        return None;
    }
    let digits_except = |dashes: [usize; 2]| {
        bytes.iter().enumerate().all(|(i, b)| {
            if dashes.contains(&i) {
                *b == b'-'
            } else {
                b.is_ascii_digit()
            }
        })
    };
    if digits_except([4, 7]) {
        Some(Shape::Iso)
    } else if digits_except([2, 5]) {
        Some(Shape::DayFirst)
    } else {
        None
    }
}

fn invalid_date(input: &str) -> CatalogError {
    CatalogError::validation(
        "publication_date",
        format!("`{}` is not a date (expected YYYY-MM-DD or DD-MM-YYYY)", input),
    )
}

impl fmt::Display for PubDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DISPLAY_FORMAT))
    }
}

impl Serialize for PubDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PubDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PubDate::parse(&raw).map_err(serde::de::Error::custom)
    }
}
