//! Author model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::patch::{clean_text, FieldPatch};
use crate::{
    error::{CatalogError, CatalogResult},
    ids::AuthorId,
};

/// Full author record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Author {
    #[schema(value_type = String, example = "172-32-1176")]
    pub au_id: AuthorId,
    pub last_name: String,
    pub first_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub has_contract: bool,
}

impl Author {
    /// "First Last", or just the last name when no first name is known
    pub fn display_name(&self) -> String {
        display_name(self.first_name.as_deref(), &self.last_name)
    }
}

pub(crate) fn display_name(first_name: Option<&str>, last_name: &str) -> String {
    match first_name {
        Some(first) => format!("{} {}", first, last_name),
        None => last_name.to_string(),
    }
}

/// Create author request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateAuthor {
    #[validate(length(min = 1, message = "Author last name is required"))]
    #[serde(default)]
    pub last_name: String,
    pub first_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    #[serde(default)]
    pub has_contract: bool,
}

impl CreateAuthor {
    /// Trim text and drop blank optional fields, then validate.
    pub fn normalized(self) -> CatalogResult<Self> {
        let normalized = Self {
            last_name: self.last_name.trim().to_string(),
            first_name: clean_text(self.first_name),
            phone: clean_text(self.phone),
            address: clean_text(self.address),
            city: clean_text(self.city),
            state: clean_text(self.state),
            postal_code: clean_text(self.postal_code),
            has_contract: self.has_contract,
        };
        normalized.validate()?;
        Ok(normalized)
    }

    pub fn into_author(self, au_id: AuthorId) -> Author {
        Author {
            au_id,
            last_name: self.last_name,
            first_name: self.first_name,
            phone: self.phone,
            address: self.address,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            has_contract: self.has_contract,
        }
    }
}

/// Partial author update; only supplied fields change
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct AuthorPatch {
    #[schema(value_type = Option<String>)]
    pub last_name: FieldPatch<String>,
    #[schema(value_type = Option<String>)]
    pub first_name: FieldPatch<String>,
    #[schema(value_type = Option<String>)]
    pub phone: FieldPatch<String>,
    #[schema(value_type = Option<String>)]
    pub address: FieldPatch<String>,
    #[schema(value_type = Option<String>)]
    pub city: FieldPatch<String>,
    #[schema(value_type = Option<String>)]
    pub state: FieldPatch<String>,
    #[schema(value_type = Option<String>)]
    pub postal_code: FieldPatch<String>,
    pub has_contract: Option<bool>,
}

impl AuthorPatch {
    pub fn normalized(self) -> CatalogResult<Self> {
        let last_name = self.last_name.normalized();
        if last_name == FieldPatch::Clear {
            return Err(CatalogError::validation(
                "last_name",
                "Author last name cannot be cleared",
            ));
        }
        Ok(Self {
            last_name,
            first_name: self.first_name.normalized(),
            phone: self.phone.normalized(),
            address: self.address.normalized(),
            city: self.city.normalized(),
            state: self.state.normalized(),
            postal_code: self.postal_code.normalized(),
            has_contract: self.has_contract,
        })
    }

    /// Apply to a stored record. Expects a patch that went through `normalized`.
    pub fn apply_to(self, author: &mut Author) {
        if let FieldPatch::Set(last_name) = self.last_name {
            author.last_name = last_name;
        }
        self.first_name.apply(&mut author.first_name);
        self.phone.apply(&mut author.phone);
        self.address.apply(&mut author.address);
        self.city.apply(&mut author.city);
        self.state.apply(&mut author.state);
        self.postal_code.apply(&mut author.postal_code);
        if let Some(has_contract) = self.has_contract {
            author.has_contract = has_contract;
        }
    }
}
