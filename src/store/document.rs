//! Embedded backend: MongoDB.
//!
//! Authors live in the `authors` collection. Each title document carries its
//! links as an `authors` array of `{au_id, contribution_order,
//! royalty_share_percent}`; author names are resolved at read time with a
//! `$lookup` stage. Writes run inside a client session transaction, which
//! requires a replica-set deployment.

use std::str::FromStr;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, oid::ObjectId, Document},
    options::IndexOptions,
    Client, ClientSession, Collection, IndexModel,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CatalogStore, StoreScope};
use crate::{
    config::DocumentConfig,
    error::{CatalogError, CatalogResult, Entity},
    ids::{AuthorId, TitleId},
    models::{Author, AuthorTitle, PubDate, Relation, Title, TitleAuthor, TitleWithAuthors},
};

const AUTHORS: &str = "authors";
const TITLES: &str = "titles";

/// Link as embedded in a title document
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmbeddedAuthor {
    au_id: String,
    contribution_order: i32,
    royalty_share_percent: i32,
}

/// Author document; `_id` and bookkeeping fields are ignored on read
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AuthorDocument {
    au_id: String,
    last_name: String,
    first_name: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    postal_code: Option<String>,
    #[serde(default)]
    has_contract: bool,
}

/// Title document. Decimals are stored as strings, dates in ISO form.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TitleDocument {
    title_id: String,
    name: String,
    category: Option<String>,
    publisher_id: Option<String>,
    price: Option<String>,
    advance: Option<String>,
    royalty_percent: Option<i32>,
    year_to_date_sales: Option<i32>,
    notes: Option<String>,
    publication_date: Option<String>,
    #[serde(default)]
    authors: Vec<EmbeddedAuthor>,
}

/// Output of the `$lookup` pipeline: a title plus the author documents it references
#[derive(Debug, Deserialize)]
struct TitleAggregate {
    #[serde(flatten)]
    title: TitleDocument,
    #[serde(default)]
    author_docs: Vec<AuthorDocument>,
}

impl From<&Author> for AuthorDocument {
    fn from(a: &Author) -> Self {
        Self {
            au_id: a.au_id.to_string(),
            last_name: a.last_name.clone(),
            first_name: a.first_name.clone(),
            phone: a.phone.clone(),
            address: a.address.clone(),
            city: a.city.clone(),
            state: a.state.clone(),
            postal_code: a.postal_code.clone(),
            has_contract: a.has_contract,
        }
    }
}

impl TryFrom<AuthorDocument> for Author {
    type Error = CatalogError;

    fn try_from(d: AuthorDocument) -> Result<Self, Self::Error> {
        Ok(Author {
            au_id: stored_author_id(&d.au_id)?,
            last_name: d.last_name,
            first_name: d.first_name,
            phone: d.phone,
            address: d.address,
            city: d.city,
            state: d.state,
            postal_code: d.postal_code,
            has_contract: d.has_contract,
        })
    }
}

impl From<&Relation> for EmbeddedAuthor {
    fn from(r: &Relation) -> Self {
        Self {
            au_id: r.au_id.to_string(),
            contribution_order: r.contribution_order,
            royalty_share_percent: r.royalty_share_percent,
        }
    }
}

impl TitleDocument {
    fn new(t: &Title, relations: &[Relation]) -> Self {
        Self {
            title_id: t.title_id.to_string(),
            name: t.name.clone(),
            category: t.category.clone(),
            publisher_id: t.publisher_id.clone(),
            price: t.price.map(|d| d.to_string()),
            advance: t.advance.map(|d| d.to_string()),
            royalty_percent: t.royalty_percent,
            year_to_date_sales: t.year_to_date_sales,
            notes: t.notes.clone(),
            publication_date: t.publication_date.map(|d| d.to_iso()),
            authors: relations.iter().map(EmbeddedAuthor::from).collect(),
        }
    }

    fn to_title(&self) -> CatalogResult<Title> {
        Ok(Title {
            title_id: stored_title_id(&self.title_id)?,
            name: self.name.clone(),
            category: self.category.clone(),
            publisher_id: self.publisher_id.clone(),
            price: stored_decimal(self.price.as_deref())?,
            advance: stored_decimal(self.advance.as_deref())?,
            royalty_percent: self.royalty_percent,
            year_to_date_sales: self.year_to_date_sales,
            notes: self.notes.clone(),
            publication_date: self
                .publication_date
                .as_deref()
                .map(PubDate::parse)
                .transpose()?,
        })
    }

    /// Embedded links, ordered by contribution order then author id
    fn relations(&self) -> CatalogResult<Vec<Relation>> {
        let title_id = stored_title_id(&self.title_id)?;
        let mut relations = self
            .authors
            .iter()
            .map(|e| {
                Ok(Relation {
                    au_id: stored_author_id(&e.au_id)?,
                    title_id: title_id.clone(),
                    contribution_order: e.contribution_order,
                    royalty_share_percent: e.royalty_share_percent,
                })
            })
            .collect::<CatalogResult<Vec<_>>>()?;
        relations.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(relations)
    }
}

impl TryFrom<TitleAggregate> for TitleWithAuthors {
    type Error = CatalogError;

    fn try_from(agg: TitleAggregate) -> Result<Self, Self::Error> {
        let title = agg.title.to_title()?;
        let mut authors = Vec::with_capacity(agg.title.authors.len());
        for link in &agg.title.authors {
            // a link whose author document is gone is skipped, like an inner join
            let Some(author) = agg.author_docs.iter().find(|a| a.au_id == link.au_id) else {
                continue;
            };
            authors.push(TitleAuthor {
                au_id: stored_author_id(&link.au_id)?,
                first_name: author.first_name.clone(),
                last_name: author.last_name.clone(),
                contribution_order: link.contribution_order,
                royalty_share_percent: link.royalty_share_percent,
            });
        }
        Ok(TitleWithAuthors::new(title, authors))
    }
}

fn stored_author_id(raw: &str) -> CatalogResult<AuthorId> {
    AuthorId::parse(raw).map_err(|_| CatalogError::Storage(format!("corrupt author id `{}`", raw)))
}

fn stored_title_id(raw: &str) -> CatalogResult<TitleId> {
    TitleId::parse(raw).map_err(|_| CatalogError::Storage(format!("corrupt title id `{}`", raw)))
}

fn stored_decimal(raw: Option<&str>) -> CatalogResult<Option<Decimal>> {
    raw.map(|s| {
        Decimal::from_str(s).map_err(|_| CatalogError::Storage(format!("corrupt decimal `{}`", s)))
    })
    .transpose()
}

/// Bibliographic fields of a title as a `$set` body; the embedded links are left out
fn title_fields(title: &Title) -> CatalogResult<Document> {
    let mut fields = bson::to_document(&TitleDocument::new(title, &[]))?;
    fields.remove("authors");
    Ok(fields)
}

/// Pipeline joining title documents with the author documents they embed
fn titles_with_authors_pipeline(filter: Document) -> Vec<Document> {
    vec![
        doc! { "$match": filter },
        doc! { "$sort": { "title_id": 1 } },
        doc! {
            "$lookup": {
                "from": AUTHORS,
                "localField": "authors.au_id",
                "foreignField": "au_id",
                "as": "author_docs",
            }
        },
    ]
}

#[derive(Clone)]
pub struct DocumentStore {
    client: Client,
    authors: Collection<AuthorDocument>,
    titles: Collection<TitleDocument>,
}

impl DocumentStore {
    /// Connect, verify the deployment answers, and make sure the indexes exist.
    pub async fn connect(config: &DocumentConfig) -> CatalogResult<Self> {
        let client = Client::with_uri_str(&config.url).await?;
        let db = client.database(&config.database);
        db.run_command(doc! { "ping": 1 }).await?;

        let store = Self {
            authors: db.collection(AUTHORS),
            titles: db.collection(TITLES),
            client,
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> CatalogResult<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.authors
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "au_id": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.titles
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "title_id": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        // reverse lookup: titles containing a given author
        self.titles
            .create_index(IndexModel::builder().keys(doc! { "authors.au_id": 1 }).build())
            .await?;

        tracing::info!("Document indexes ensured");
        Ok(())
    }

    async fn aggregate_titles(&self, filter: Document) -> CatalogResult<Vec<TitleWithAuthors>> {
        let mut cursor = self
            .titles
            .aggregate(titles_with_authors_pipeline(filter))
            .await?;

        let mut titles = Vec::new();
        while let Some(raw) = cursor.try_next().await? {
            let agg: TitleAggregate = bson::from_document(raw)?;
            titles.push(TitleWithAuthors::try_from(agg)?);
        }
        Ok(titles)
    }
}

#[async_trait]
impl CatalogStore for DocumentStore {
    fn backend_name(&self) -> &'static str {
        "document"
    }

    async fn ping(&self) -> CatalogResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    async fn open(&self) -> CatalogResult<Box<dyn StoreScope>> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;
        Ok(Box::new(DocumentScope {
            session,
            authors: self.authors.clone(),
            titles: self.titles.clone(),
        }))
    }

    async fn list_authors(&self) -> CatalogResult<Vec<Author>> {
        let docs: Vec<AuthorDocument> = self
            .authors
            .find(doc! {})
            .sort(doc! { "au_id": 1 })
            .await?
            .try_collect()
            .await?;
        docs.into_iter().map(Author::try_from).collect()
    }

    async fn find_author(&self, au_id: &AuthorId) -> CatalogResult<Option<Author>> {
        self.authors
            .find_one(doc! { "au_id": au_id.as_str() })
            .await?
            .map(Author::try_from)
            .transpose()
    }

    async fn find_title(&self, title_id: &TitleId) -> CatalogResult<Option<TitleWithAuthors>> {
        Ok(self
            .aggregate_titles(doc! { "title_id": title_id.as_str() })
            .await?
            .into_iter()
            .next())
    }

    async fn list_titles_with_authors(&self) -> CatalogResult<Vec<TitleWithAuthors>> {
        self.aggregate_titles(doc! {}).await
    }

    async fn list_titles_by_author(&self, au_id: &AuthorId) -> CatalogResult<Vec<AuthorTitle>> {
        let docs: Vec<TitleDocument> = self
            .titles
            .find(doc! { "authors.au_id": au_id.as_str() })
            .sort(doc! { "title_id": 1 })
            .await?
            .try_collect()
            .await?;

        let mut titles = Vec::with_capacity(docs.len());
        for d in docs {
            let Some(link) = d.authors.iter().find(|e| e.au_id == au_id.as_str()) else {
                continue;
            };
            let royalty_share_percent = link.royalty_share_percent;
            let title = d.to_title()?;
            titles.push(AuthorTitle {
                title_id: title.title_id,
                name: title.name,
                category: title.category,
                price: title.price,
                publication_date: title.publication_date,
                royalty_share_percent,
            });
        }
        Ok(titles)
    }
}

/// A client session with an open multi-document transaction.
///
/// Reads come from the transaction snapshot; concurrent writers to the same
/// document fail with a transient write conflict, surfaced as `Conflict`.
pub struct DocumentScope {
    session: ClientSession,
    authors: Collection<AuthorDocument>,
    titles: Collection<TitleDocument>,
}

impl DocumentScope {
    async fn title_document(&mut self, title_id: &TitleId) -> CatalogResult<Option<TitleDocument>> {
        let found = self
            .titles
            .find_one(doc! { "title_id": title_id.as_str() })
            .session(&mut self.session)
            .await?;
        Ok(found)
    }

    /// Write to the author document so that a concurrent transaction deleting
    /// it conflicts with this one instead of leaving a dangling link.
    async fn touch_author(&mut self, au_id: &AuthorId) -> CatalogResult<()> {
        let result = self
            .authors
            .update_one(
                doc! { "au_id": au_id.as_str() },
                doc! { "$set": { "_link_guard": ObjectId::new() } },
            )
            .session(&mut self.session)
            .await?;
        if result.matched_count == 0 {
            return Err(CatalogError::not_found(Entity::Author, au_id));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreScope for DocumentScope {
    async fn author(&mut self, au_id: &AuthorId) -> CatalogResult<Option<Author>> {
        self.authors
            .find_one(doc! { "au_id": au_id.as_str() })
            .session(&mut self.session)
            .await?
            .map(Author::try_from)
            .transpose()
    }

    async fn insert_author(&mut self, author: &Author) -> CatalogResult<bool> {
        if self.author(&author.au_id).await?.is_some() {
            return Ok(false);
        }
        self.authors
            .insert_one(AuthorDocument::from(author))
            .session(&mut self.session)
            .await?;
        Ok(true)
    }

    async fn replace_author(&mut self, author: &Author) -> CatalogResult<()> {
        self.authors
            .replace_one(
                doc! { "au_id": author.au_id.as_str() },
                AuthorDocument::from(author),
            )
            .session(&mut self.session)
            .await?;
        Ok(())
    }

    async fn delete_author(&mut self, au_id: &AuthorId) -> CatalogResult<bool> {
        let result = self
            .authors
            .delete_one(doc! { "au_id": au_id.as_str() })
            .session(&mut self.session)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn title(&mut self, title_id: &TitleId) -> CatalogResult<Option<Title>> {
        self.title_document(title_id)
            .await?
            .map(|d| d.to_title())
            .transpose()
    }

    async fn insert_title(&mut self, title: &Title, relations: &[Relation]) -> CatalogResult<bool> {
        if self.title_document(&title.title_id).await?.is_some() {
            return Ok(false);
        }
        for relation in relations {
            self.touch_author(&relation.au_id).await?;
        }
        self.titles
            .insert_one(TitleDocument::new(title, relations))
            .session(&mut self.session)
            .await?;
        Ok(true)
    }

    async fn replace_title(&mut self, title: &Title) -> CatalogResult<()> {
        let fields = title_fields(title)?;
        self.titles
            .update_one(
                doc! { "title_id": title.title_id.as_str() },
                doc! { "$set": fields },
            )
            .session(&mut self.session)
            .await?;
        Ok(())
    }

    async fn delete_title(&mut self, title_id: &TitleId) -> CatalogResult<bool> {
        // the links live inside the document, so one delete removes both
        let result = self
            .titles
            .delete_one(doc! { "title_id": title_id.as_str() })
            .session(&mut self.session)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn relations_of_title(&mut self, title_id: &TitleId) -> CatalogResult<Vec<Relation>> {
        match self.title_document(title_id).await? {
            Some(d) => d.relations(),
            None => Ok(Vec::new()),
        }
    }

    async fn relations_of_author(&mut self, au_id: &AuthorId) -> CatalogResult<Vec<Relation>> {
        let mut cursor = self
            .titles
            .find(doc! { "authors.au_id": au_id.as_str() })
            .sort(doc! { "title_id": 1 })
            .session(&mut self.session)
            .await?;
        let docs: Vec<TitleDocument> = cursor.stream(&mut self.session).try_collect().await?;

        let mut relations = Vec::new();
        for d in docs {
            relations.extend(d.relations()?.into_iter().filter(|r| &r.au_id == au_id));
        }
        Ok(relations)
    }

    async fn link(&mut self, relation: &Relation) -> CatalogResult<()> {
        self.touch_author(&relation.au_id).await?;
        let embedded = bson::to_bson(&EmbeddedAuthor::from(relation))?;
        self.titles
            .update_one(
                doc! { "title_id": relation.title_id.as_str() },
                doc! { "$push": { "authors": embedded } },
            )
            .session(&mut self.session)
            .await?;
        Ok(())
    }

    async fn update_link(&mut self, relation: &Relation) -> CatalogResult<()> {
        self.titles
            .update_one(
                doc! {
                    "title_id": relation.title_id.as_str(),
                    "authors.au_id": relation.au_id.as_str(),
                },
                doc! {
                    "$set": {
                        "authors.$.contribution_order": relation.contribution_order,
                        "authors.$.royalty_share_percent": relation.royalty_share_percent,
                    }
                },
            )
            .session(&mut self.session)
            .await?;
        Ok(())
    }

    async fn unlink(&mut self, au_id: &AuthorId, title_id: &TitleId) -> CatalogResult<bool> {
        let result = self
            .titles
            .update_one(
                doc! { "title_id": title_id.as_str() },
                doc! { "$pull": { "authors": { "au_id": au_id.as_str() } } },
            )
            .session(&mut self.session)
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn commit(self: Box<Self>) -> CatalogResult<()> {
        let mut scope = self;
        scope.session.commit_transaction().await?;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> CatalogResult<()> {
        let mut scope = self;
        scope.session.abort_transaction().await?;
        Ok(())
    }
}
