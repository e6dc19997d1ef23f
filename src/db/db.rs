// db/db.rs
use sqlx::{Pool, Postgres};

use super::{chatdb::ChatExt, notificationdb::NotificationExt};

/// Everything the services need from persistence.
pub trait Database: ChatExt + NotificationExt + std::fmt::Debug {}

impl<T> Database for T where T: ChatExt + NotificationExt + std::fmt::Debug {}

#[derive(Clone)]
pub struct DBClient {
    pub pool: Pool<Postgres>,
}

impl std::fmt::Debug for DBClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DBClient")
            .field("pool", &"Pool<Postgres>")
            .finish()
    }
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}
