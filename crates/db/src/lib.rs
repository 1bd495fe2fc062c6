use sqlx::{
    Error, Pool, Postgres,
    postgres::{PgPool, PgPoolOptions},
};

pub mod models;

#[derive(Clone)]
pub struct DbService {
    pub pool: Pool<Postgres>,
}

impl DbService {
    pub async fn new(database_url: &str) -> Result<DbService, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(DbService { pool })
    }

    pub fn from_pool(pool: PgPool) -> DbService {
        DbService { pool }
    }
}
