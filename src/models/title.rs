//! Title model, write payloads and read projections

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::{
    author::display_name,
    patch::{clean_text, FieldPatch},
    pubdate::PubDate,
    relation::RelationInput,
};
use crate::{
    error::{CatalogError, CatalogResult},
    ids::{AuthorId, TitleId},
};

/// Full title record (without its author links)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Title {
    #[schema(value_type = String, example = "BU1032")]
    pub title_id: TitleId,
    pub name: String,
    pub category: Option<String>,
    pub publisher_id: Option<String>,
    #[schema(value_type = Option<String>, example = "19.99")]
    pub price: Option<Decimal>,
    #[schema(value_type = Option<String>, example = "5000.00")]
    pub advance: Option<Decimal>,
    pub royalty_percent: Option<i32>,
    pub year_to_date_sales: Option<i32>,
    pub notes: Option<String>,
    #[schema(value_type = Option<String>, example = "15-03-2024")]
    pub publication_date: Option<PubDate>,
}

/// Bibliographic fields of a new title
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewTitle {
    #[validate(length(min = 1, message = "Title name is required"))]
    #[serde(default)]
    pub name: String,
    pub category: Option<String>,
    pub publisher_id: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub advance: Option<Decimal>,
    #[validate(range(min = 0, message = "Royalty must not be negative"))]
    pub royalty_percent: Option<i32>,
    #[validate(range(min = 0, message = "Year-to-date sales must not be negative"))]
    pub year_to_date_sales: Option<i32>,
    pub notes: Option<String>,
    #[schema(value_type = Option<String>, example = "2024-03-15")]
    pub publication_date: Option<PubDate>,
}

impl NewTitle {
    pub fn normalized(self) -> CatalogResult<Self> {
        let normalized = Self {
            name: self.name.trim().to_string(),
            category: clean_text(self.category),
            publisher_id: clean_text(self.publisher_id),
            notes: clean_text(self.notes),
            ..self
        };
        normalized.validate()?;
        check_amount("price", normalized.price)?;
        check_amount("advance", normalized.advance)?;
        Ok(normalized)
    }

    pub fn into_title(self, title_id: TitleId) -> Title {
        Title {
            title_id,
            name: self.name,
            category: self.category,
            publisher_id: self.publisher_id,
            price: self.price,
            advance: self.advance,
            royalty_percent: self.royalty_percent,
            year_to_date_sales: self.year_to_date_sales,
            notes: self.notes,
            publication_date: self.publication_date,
        }
    }
}

/// Create title request: bibliographic fields plus at least one author link
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateTitle {
    #[serde(flatten)]
    pub title: NewTitle,
    #[serde(default)]
    pub authors: Vec<RelationInput>,
}

/// Partial title update; only supplied fields change
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct TitlePatch {
    #[schema(value_type = Option<String>)]
    pub name: FieldPatch<String>,
    #[schema(value_type = Option<String>)]
    pub category: FieldPatch<String>,
    #[schema(value_type = Option<String>)]
    pub publisher_id: FieldPatch<String>,
    #[schema(value_type = Option<String>)]
    pub price: FieldPatch<Decimal>,
    #[schema(value_type = Option<String>)]
    pub advance: FieldPatch<Decimal>,
    #[schema(value_type = Option<i32>)]
    pub royalty_percent: FieldPatch<i32>,
    #[schema(value_type = Option<i32>)]
    pub year_to_date_sales: FieldPatch<i32>,
    #[schema(value_type = Option<String>)]
    pub notes: FieldPatch<String>,
    #[schema(value_type = Option<String>)]
    pub publication_date: FieldPatch<PubDate>,
}

impl TitlePatch {
    pub fn normalized(self) -> CatalogResult<Self> {
        let name = self.name.normalized();
        if name == FieldPatch::Clear {
            return Err(CatalogError::validation("name", "Title name cannot be cleared"));
        }
        if let FieldPatch::Set(price) = self.price {
            check_amount("price", Some(price))?;
        }
        if let FieldPatch::Set(advance) = self.advance {
            check_amount("advance", Some(advance))?;
        }
        if let FieldPatch::Set(royalty) = self.royalty_percent {
            check_count("royalty_percent", royalty)?;
        }
        if let FieldPatch::Set(sales) = self.year_to_date_sales {
            check_count("year_to_date_sales", sales)?;
        }
        Ok(Self {
            name,
            category: self.category.normalized(),
            publisher_id: self.publisher_id.normalized(),
            notes: self.notes.normalized(),
            ..self
        })
    }

    pub fn apply_to(self, title: &mut Title) {
        if let FieldPatch::Set(name) = self.name {
            title.name = name;
        }
        self.category.apply(&mut title.category);
        self.publisher_id.apply(&mut title.publisher_id);
        self.price.apply(&mut title.price);
        self.advance.apply(&mut title.advance);
        self.royalty_percent.apply(&mut title.royalty_percent);
        self.year_to_date_sales.apply(&mut title.year_to_date_sales);
        self.notes.apply(&mut title.notes);
        self.publication_date.apply(&mut title.publication_date);
    }
}

/// Update title request: partial fields plus an optional full author-list replacement
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateTitle {
    #[serde(flatten)]
    pub fields: TitlePatch,
    #[serde(default)]
    pub authors: Option<Vec<RelationInput>>,
}

fn check_amount(field: &'static str, value: Option<Decimal>) -> CatalogResult<()> {
    match value {
        Some(v) if v.is_sign_negative() && !v.is_zero() => Err(CatalogError::validation(
            field,
            format!("{} must not be negative", field),
        )),
        _ => Ok(()),
    }
}

fn check_count(field: &'static str, value: i32) -> CatalogResult<()> {
    if value < 0 {
        return Err(CatalogError::validation(
            field,
            format!("{} must not be negative", field),
        ));
    }
    Ok(())
}

/// One author of a title, as projected by the read-side join
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TitleAuthor {
    #[schema(value_type = String)]
    pub au_id: AuthorId,
    pub first_name: Option<String>,
    pub last_name: String,
    pub contribution_order: i32,
    pub royalty_share_percent: i32,
}

/// A title enriched with its authors ordered by contribution
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TitleWithAuthors {
    #[serde(flatten)]
    pub title: Title,
    pub authors: Vec<TitleAuthor>,
    /// "First Last, First Last" in contribution order
    pub author_names: String,
}

impl TitleWithAuthors {
    pub fn new(title: Title, mut authors: Vec<TitleAuthor>) -> Self {
        authors.sort_by(|a, b| {
            a.contribution_order
                .cmp(&b.contribution_order)
                .then_with(|| a.au_id.cmp(&b.au_id))
        });
        let author_names = authors
            .iter()
            .map(|a| display_name(a.first_name.as_deref(), &a.last_name))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            title,
            authors,
            author_names,
        }
    }
}

/// A title seen from one of its authors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AuthorTitle {
    #[schema(value_type = String)]
    pub title_id: TitleId,
    pub name: String,
    pub category: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub publication_date: Option<PubDate>,
    pub royalty_share_percent: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title() -> Title {
        Title {
            title_id: TitleId::parse("BU1032").unwrap(),
            name: "The Busy Executive's Database Guide".into(),
            category: Some("business".into()),
            publisher_id: Some("1389".into()),
            price: Some(Decimal::new(1999, 2)),
            advance: None,
            royalty_percent: Some(10),
            year_to_date_sales: Some(4095),
            notes: None,
            publication_date: Some(PubDate::parse("1991-06-12").unwrap()),
        }
    }

    #[test]
    fn test_new_title_requires_name() {
        let req: NewTitle = serde_json::from_str(r#"{"name": "  "}"#).unwrap();
        assert!(matches!(
            req.normalized(),
            Err(CatalogError::Validation { .. })
        ));
    }

    #[test]
    fn test_new_title_rejects_negative_amounts() {
        let req: NewTitle = serde_json::from_str(r#"{"name": "x", "price": "-1.50"}"#).unwrap();
        match req.normalized() {
            Err(CatalogError::Validation { field, .. }) => assert_eq!(field, "price"),
            other => panic!("expected validation error, got {:?}", other),
        }
        let req: NewTitle =
            serde_json::from_str(r#"{"name": "x", "year_to_date_sales": -3}"#).unwrap();
        assert!(req.normalized().is_err());
    }

    #[test]
    fn test_create_title_accepts_both_date_forms() {
        let a: CreateTitle = serde_json::from_str(
            r#"{"name": "x", "publication_date": "15-03-2024", "authors": [{"au_id": "172-32-1176"}]}"#,
        )
        .unwrap();
        let b: CreateTitle =
            serde_json::from_str(r#"{"name": "x", "publication_date": "2024-03-15"}"#).unwrap();
        assert_eq!(a.title.publication_date, b.title.publication_date);
        assert_eq!(a.authors.len(), 1);
        assert!(b.authors.is_empty());
    }

    #[test]
    fn test_patch_applies_partially() {
        let mut t = title();
        let req: UpdateTitle =
            serde_json::from_str(r#"{"notes": "reprint", "price": null, "name": ""}"#).unwrap();
        assert!(req.authors.is_none());
        req.fields.normalized().unwrap().apply_to(&mut t);
        assert_eq!(t.notes.as_deref(), Some("reprint"));
        assert_eq!(t.price, None);
        assert_eq!(t.name, "The Busy Executive's Database Guide");
        assert_eq!(t.category.as_deref(), Some("business"));
    }

    #[test]
    fn test_with_authors_orders_by_contribution_then_id() {
        let author = |id: &str, first: &str, last: &str, order: i32| TitleAuthor {
            au_id: AuthorId::parse(id).unwrap(),
            first_name: Some(first.into()),
            last_name: last.into(),
            contribution_order: order,
            royalty_share_percent: 50,
        };
        let view = TitleWithAuthors::new(
            title(),
            vec![
                author("409-56-7008", "Abraham", "Bennet", 2),
                author("213-46-8915", "Marjorie", "Green", 1),
            ],
        );
        assert_eq!(view.author_names, "Marjorie Green, Abraham Bennet");
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["title_id"], "BU1032");
        assert_eq!(json["publication_date"], "12-06-1991");
    }
}
