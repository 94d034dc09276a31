use super::{LeadRecord, LeadSink};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

#[derive(Debug)]
pub struct PostgresLeadSink {
    pool: PgPool,
}

impl PostgresLeadSink {
    pub async fn new(connection_string: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(connection_string)
            .await?;

        // Run Migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl LeadSink for PostgresLeadSink {
    async fn record(&self, lead: &LeadRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO leads (client_id, email, phone, message, page_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&lead.client_id)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&lead.message)
        .bind(&lead.page_url)
        .bind(lead.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
