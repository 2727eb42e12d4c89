//! Data models for the Bookshelf catalog

pub mod author;
pub mod patch;
pub mod pubdate;
pub mod relation;
pub mod title;

// Re-export commonly used types
pub use author::{Author, AuthorPatch, CreateAuthor};
pub use patch::FieldPatch;
pub use pubdate::PubDate;
pub use relation::{PlannedLink, Relation, RelationInput};
pub use title::{
    AuthorTitle, CreateTitle, NewTitle, Title, TitleAuthor, TitlePatch, TitleWithAuthors,
    UpdateTitle,
};
