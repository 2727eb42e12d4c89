//! Normalized backend: PostgreSQL tables `authors`, `titles` and the
//! `title_authors` join table.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, Pool, Postgres, Transaction};

use super::{CatalogStore, StoreScope};
use crate::{
    config::DatabaseConfig,
    error::CatalogResult,
    ids::{AuthorId, TitleId},
    models::{Author, AuthorTitle, Relation, Title, TitleAuthor, TitleWithAuthors},
};

const AUTHOR_COLUMNS: &str =
    "au_id, last_name, first_name, phone, address, city, state, postal_code, has_contract";

const TITLE_COLUMNS: &str = "title_id, name, category, publisher_id, price, advance, \
     royalty_percent, year_to_date_sales, notes, publication_date";

/// Title row with its authors aggregated into a JSON array
#[derive(FromRow)]
struct TitleWithAuthorsRow {
    #[sqlx(flatten)]
    title: Title,
    authors: Json<Vec<TitleAuthor>>,
}

impl From<TitleWithAuthorsRow> for TitleWithAuthors {
    fn from(row: TitleWithAuthorsRow) -> Self {
        TitleWithAuthors::new(row.title, row.authors.0)
    }
}

/// Join + aggregation producing one row per title. `{filter}` is replaced by a WHERE clause.
const TITLES_WITH_AUTHORS_QUERY: &str = r#"
    SELECT t.title_id, t.name, t.category, t.publisher_id, t.price, t.advance,
           t.royalty_percent, t.year_to_date_sales, t.notes, t.publication_date,
           COALESCE(
               json_agg(
                   json_build_object(
                       'au_id', a.au_id,
                       'first_name', a.first_name,
                       'last_name', a.last_name,
                       'contribution_order', ta.contribution_order,
                       'royalty_share_percent', ta.royalty_share_percent
                   )
                   ORDER BY ta.contribution_order, ta.au_id
               ) FILTER (WHERE a.au_id IS NOT NULL),
               '[]'
           ) AS authors
    FROM titles t
    LEFT JOIN title_authors ta ON ta.title_id = t.title_id
    LEFT JOIN authors a ON a.au_id = ta.au_id
    {filter}
    GROUP BY t.title_id
    ORDER BY t.title_id ASC
"#;

#[derive(Clone)]
pub struct RelationalStore {
    pool: Pool<Postgres>,
}

impl RelationalStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Open a pool and bring the schema up to date.
    pub async fn connect(config: &DatabaseConfig) -> CatalogResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations completed");

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl CatalogStore for RelationalStore {
    fn backend_name(&self) -> &'static str {
        "relational"
    }

    async fn ping(&self) -> CatalogResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn open(&self) -> CatalogResult<Box<dyn StoreScope>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(RelationalScope { tx }))
    }

    async fn list_authors(&self) -> CatalogResult<Vec<Author>> {
        let authors = sqlx::query_as::<_, Author>(&format!(
            "SELECT {} FROM authors ORDER BY au_id ASC",
            AUTHOR_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(authors)
    }

    async fn find_author(&self, au_id: &AuthorId) -> CatalogResult<Option<Author>> {
        let author = sqlx::query_as::<_, Author>(&format!(
            "SELECT {} FROM authors WHERE au_id = $1",
            AUTHOR_COLUMNS
        ))
        .bind(au_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(author)
    }

    async fn find_title(&self, title_id: &TitleId) -> CatalogResult<Option<TitleWithAuthors>> {
        let row = sqlx::query_as::<_, TitleWithAuthorsRow>(
            &TITLES_WITH_AUTHORS_QUERY.replace("{filter}", "WHERE t.title_id = $1"),
        )
        .bind(title_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_titles_with_authors(&self) -> CatalogResult<Vec<TitleWithAuthors>> {
        let rows = sqlx::query_as::<_, TitleWithAuthorsRow>(
            &TITLES_WITH_AUTHORS_QUERY.replace("{filter}", ""),
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_titles_by_author(&self, au_id: &AuthorId) -> CatalogResult<Vec<AuthorTitle>> {
        let titles = sqlx::query_as::<_, AuthorTitle>(
            r#"
            SELECT t.title_id, t.name, t.category, t.price, t.publication_date,
                   ta.royalty_share_percent
            FROM titles t
            JOIN title_authors ta ON ta.title_id = t.title_id
            WHERE ta.au_id = $1
            ORDER BY t.title_id ASC
            "#,
        )
        .bind(au_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(titles)
    }
}

/// A PostgreSQL transaction. Entity reads use `FOR UPDATE` so that scopes
/// touching the same author or title serialize on the row lock.
pub struct RelationalScope {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreScope for RelationalScope {
    // =========================================================================
    // AUTHORS
    // =========================================================================

    async fn author(&mut self, au_id: &AuthorId) -> CatalogResult<Option<Author>> {
        let author = sqlx::query_as::<_, Author>(&format!(
            "SELECT {} FROM authors WHERE au_id = $1 FOR UPDATE",
            AUTHOR_COLUMNS
        ))
        .bind(au_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(author)
    }

    async fn insert_author(&mut self, author: &Author) -> CatalogResult<bool> {
        // ON CONFLICT keeps the transaction usable when the id is taken
        let result = sqlx::query(
            r#"
            INSERT INTO authors (au_id, last_name, first_name, phone, address, city, state,
                                 postal_code, has_contract)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (au_id) DO NOTHING
            "#,
        )
        .bind(&author.au_id)
        .bind(&author.last_name)
        .bind(&author.first_name)
        .bind(&author.phone)
        .bind(&author.address)
        .bind(&author.city)
        .bind(&author.state)
        .bind(&author.postal_code)
        .bind(author.has_contract)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn replace_author(&mut self, author: &Author) -> CatalogResult<()> {
        sqlx::query(
            r#"
            UPDATE authors SET
                last_name = $2, first_name = $3, phone = $4, address = $5,
                city = $6, state = $7, postal_code = $8, has_contract = $9
            WHERE au_id = $1
            "#,
        )
        .bind(&author.au_id)
        .bind(&author.last_name)
        .bind(&author.first_name)
        .bind(&author.phone)
        .bind(&author.address)
        .bind(&author.city)
        .bind(&author.state)
        .bind(&author.postal_code)
        .bind(author.has_contract)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_author(&mut self, au_id: &AuthorId) -> CatalogResult<bool> {
        let result = sqlx::query("DELETE FROM authors WHERE au_id = $1")
            .bind(au_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // TITLES
    // =========================================================================

    async fn title(&mut self, title_id: &TitleId) -> CatalogResult<Option<Title>> {
        let title = sqlx::query_as::<_, Title>(&format!(
            "SELECT {} FROM titles WHERE title_id = $1 FOR UPDATE",
            TITLE_COLUMNS
        ))
        .bind(title_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(title)
    }

    async fn insert_title(&mut self, title: &Title, relations: &[Relation]) -> CatalogResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO titles (title_id, name, category, publisher_id, price, advance,
                                royalty_percent, year_to_date_sales, notes, publication_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (title_id) DO NOTHING
            "#,
        )
        .bind(&title.title_id)
        .bind(&title.name)
        .bind(&title.category)
        .bind(&title.publisher_id)
        .bind(title.price)
        .bind(title.advance)
        .bind(title.royalty_percent)
        .bind(title.year_to_date_sales)
        .bind(&title.notes)
        .bind(title.publication_date)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        for relation in relations {
            self.link(relation).await?;
        }
        Ok(true)
    }

    async fn replace_title(&mut self, title: &Title) -> CatalogResult<()> {
        sqlx::query(
            r#"
            UPDATE titles SET
                name = $2, category = $3, publisher_id = $4, price = $5, advance = $6,
                royalty_percent = $7, year_to_date_sales = $8, notes = $9,
                publication_date = $10
            WHERE title_id = $1
            "#,
        )
        .bind(&title.title_id)
        .bind(&title.name)
        .bind(&title.category)
        .bind(&title.publisher_id)
        .bind(title.price)
        .bind(title.advance)
        .bind(title.royalty_percent)
        .bind(title.year_to_date_sales)
        .bind(&title.notes)
        .bind(title.publication_date)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_title(&mut self, title_id: &TitleId) -> CatalogResult<bool> {
        sqlx::query("DELETE FROM title_authors WHERE title_id = $1")
            .bind(title_id)
            .execute(&mut *self.tx)
            .await?;

        let result = sqlx::query("DELETE FROM titles WHERE title_id = $1")
            .bind(title_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // RELATIONS (title_authors junction)
    // =========================================================================

    async fn relations_of_title(&mut self, title_id: &TitleId) -> CatalogResult<Vec<Relation>> {
        let relations = sqlx::query_as::<_, Relation>(
            r#"
            SELECT au_id, title_id, contribution_order, royalty_share_percent
            FROM title_authors
            WHERE title_id = $1
            ORDER BY contribution_order, au_id
            FOR UPDATE
            "#,
        )
        .bind(title_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(relations)
    }

    async fn relations_of_author(&mut self, au_id: &AuthorId) -> CatalogResult<Vec<Relation>> {
        let relations = sqlx::query_as::<_, Relation>(
            r#"
            SELECT au_id, title_id, contribution_order, royalty_share_percent
            FROM title_authors
            WHERE au_id = $1
            ORDER BY title_id
            FOR UPDATE
            "#,
        )
        .bind(au_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(relations)
    }

    async fn link(&mut self, relation: &Relation) -> CatalogResult<()> {
        sqlx::query(
            r#"
            INSERT INTO title_authors (au_id, title_id, contribution_order, royalty_share_percent)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&relation.au_id)
        .bind(&relation.title_id)
        .bind(relation.contribution_order)
        .bind(relation.royalty_share_percent)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_link(&mut self, relation: &Relation) -> CatalogResult<()> {
        sqlx::query(
            r#"
            UPDATE title_authors
            SET contribution_order = $3, royalty_share_percent = $4
            WHERE au_id = $1 AND title_id = $2
            "#,
        )
        .bind(&relation.au_id)
        .bind(&relation.title_id)
        .bind(relation.contribution_order)
        .bind(relation.royalty_share_percent)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn unlink(&mut self, au_id: &AuthorId, title_id: &TitleId) -> CatalogResult<bool> {
        let result = sqlx::query("DELETE FROM title_authors WHERE au_id = $1 AND title_id = $2")
            .bind(au_id)
            .bind(title_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // COMPLETION
    // =========================================================================

    async fn commit(self: Box<Self>) -> CatalogResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> CatalogResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PubDate;

    fn title() -> Title {
        Title {
            title_id: TitleId::parse("PS2091").unwrap(),
            name: "Is Anger the Enemy?".into(),
            category: Some("psychology".into()),
            publisher_id: None,
            price: None,
            advance: None,
            royalty_percent: None,
            year_to_date_sales: None,
            notes: None,
            publication_date: Some(PubDate::parse("1991-06-15").unwrap()),
        }
    }

    #[test]
    fn test_aggregated_row_orders_authors() {
        // json_agg output as decoded from the authors column
        let authors: Vec<TitleAuthor> = serde_json::from_value(serde_json::json!([
            { "au_id": "998-72-3567", "first_name": "Albert", "last_name": "Ringer",
              "contribution_order": 2, "royalty_share_percent": 50 },
            { "au_id": "899-46-2035", "first_name": "Anne", "last_name": "Ringer",
              "contribution_order": 1, "royalty_share_percent": 50 }
        ]))
        .unwrap();
        let row = TitleWithAuthorsRow {
            title: title(),
            authors: Json(authors),
        };

        let view = TitleWithAuthors::from(row);
        assert_eq!(view.author_names, "Anne Ringer, Albert Ringer");
        assert_eq!(view.title.title_id.as_str(), "PS2091");
    }

    #[test]
    fn test_title_query_has_one_filter_slot() {
        assert_eq!(TITLES_WITH_AUTHORS_QUERY.matches("{filter}").count(), 1);
        let filtered = TITLES_WITH_AUTHORS_QUERY.replace("{filter}", "WHERE t.title_id = $1");
        let where_at = filtered.find("WHERE t.title_id").unwrap();
        assert!(where_at < filtered.find("GROUP BY").unwrap());
    }
}
