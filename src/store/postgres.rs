use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use tracing::{debug, info};

use super::{auto_id, Document, DocumentStore, Fields, StoreError};

/// Documents kept as JSONB rows keyed by `(collection, id)`.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: String,
    fields: Json<Fields>,
    create_time: OffsetDateTime,
    update_time: OffsetDateTime,
}

impl From<DocumentRow> for Document {
    fn from(r: DocumentRow) -> Self {
        Self {
            id: r.id,
            fields: r.fields.0,
            create_time: r.create_time,
            update_time: r.update_time,
        }
    }
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;
        info!("postgres document store connected");
        Ok(Self::from_pool(db))
    }

    pub fn from_pool(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn list_documents(&self, collection: &str) -> anyhow::Result<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, fields, create_time, update_time
            FROM documents
            WHERE collection = $1
            ORDER BY id
            "#,
        )
        .bind(collection)
        .fetch_all(&self.db)
        .await
        .context("list documents")?;
        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn create_document(&self, collection: &str, fields: Fields) -> anyhow::Result<Document> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            INSERT INTO documents (collection, id, fields)
            VALUES ($1, $2, $3)
            RETURNING id, fields, create_time, update_time
            "#,
        )
        .bind(collection)
        .bind(auto_id())
        .bind(Json(fields))
        .fetch_one(&self.db)
        .await
        .context("insert document")?;
        debug!(collection, id = %row.id, "document inserted");
        Ok(row.into())
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> anyhow::Result<Document> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            UPDATE documents
            SET fields = fields || $3, update_time = now()
            WHERE collection = $1 AND id = $2
            RETURNING id, fields, create_time, update_time
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(fields))
        .fetch_optional(&self.db)
        .await
        .context("update document")?;
        match row {
            Some(r) => Ok(r.into()),
            None => Err(StoreError::not_found(format!("No document to update: {collection}/{id}")).into()),
        }
    }

    async fn delete_document(&self, collection: &str, id: &str) -> anyhow::Result<()> {
        let res = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete document")?;
        debug!(collection, id, rows = res.rows_affected(), "document delete");
        Ok(())
    }

    async fn close(&self) {
        self.db.close().await;
    }
}
