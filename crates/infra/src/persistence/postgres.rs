//! Postgres-backed transactioner.
//!
//! Every unit of work gets its own `sqlx` transaction. The repository and
//! the [`PostgresTransaction`] finishing it share the transaction; once it is
//! committed or rolled back the repository answers `TransactionClosed`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row};
use tokio::sync::Mutex;
use tracing::{info, warn};

use mailman_core::{CustomerId, MailingEntryId, MailingId};
use mailman_lifecycle::ShutdownHandle;
use mailman_mailing::{
    Customer, CustomerRepository, MailingEntry, MailingEntryRepository, NewCustomer,
    NewMailingEntry, RepositoryError,
};

use super::{Transaction, Transactioner, exactly_one, exactly_one_affected};
use crate::config::PostgresSettings;

const MAILING_ENTRY_COLUMNS: &str =
    "id, customer_id, mailing_id, title, content, insert_time";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool. `timeout` bounds connection acquisition.
    pub async fn connect(
        settings: &PostgresSettings,
        timeout: Duration,
    ) -> Result<Self, RepositoryError> {
        let options = PgConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(&settings.password)
            .database(&settings.database);

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(timeout)
            .connect_with(options)
            .await
            .map_err(|e| RepositoryError::backend("connect to postgres", e))?;

        info!(
            host = %settings.host,
            port = settings.port,
            database = %settings.database,
            "connected to postgres"
        );
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::backend("run migrations", e))
    }

    /// Close the pool once `handle` is cancelled, then report completion.
    pub async fn close_on_shutdown(self, handle: ShutdownHandle) {
        handle.done().await;
        info!("closing postgres pool");
        if tokio::time::timeout(handle.timeout(), self.pool.close())
            .await
            .is_err()
        {
            warn!("postgres pool did not close in time");
        }
        handle.notify();
    }
}

type SharedTransaction = Arc<Mutex<Option<sqlx::Transaction<'static, Postgres>>>>;

pub struct PostgresRepository {
    tx: SharedTransaction,
}

pub struct PostgresTransaction {
    tx: SharedTransaction,
}

#[async_trait]
impl Transactioner for PostgresStore {
    type Repository = PostgresRepository;
    type Transaction = PostgresTransaction;

    async fn transactional_repository(
        &self,
    ) -> Result<(PostgresRepository, PostgresTransaction), RepositoryError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::backend("begin transaction", e))?;
        let tx: SharedTransaction = Arc::new(Mutex::new(Some(tx)));

        Ok((
            PostgresRepository { tx: tx.clone() },
            PostgresTransaction { tx },
        ))
    }
}

impl PostgresTransaction {
    async fn take(&self) -> Result<sqlx::Transaction<'static, Postgres>, RepositoryError> {
        self.tx
            .lock()
            .await
            .take()
            .ok_or(RepositoryError::TransactionClosed)
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(self) -> Result<(), RepositoryError> {
        self.take()
            .await?
            .commit()
            .await
            .map_err(|e| RepositoryError::backend("commit transaction", e))
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        self.take()
            .await?
            .rollback()
            .await
            .map_err(|e| RepositoryError::backend("rollback transaction", e))
    }
}

fn customer_from_row(row: &PgRow) -> Result<Customer, sqlx::Error> {
    Ok(Customer {
        id: CustomerId::new(row.try_get("id")?),
        email: row.try_get("email")?,
    })
}

fn mailing_entry_from_row(row: &PgRow) -> Result<MailingEntry, sqlx::Error> {
    Ok(MailingEntry {
        id: MailingEntryId::new(row.try_get("id")?),
        customer_id: CustomerId::new(row.try_get("customer_id")?),
        mailing_id: MailingId::new(row.try_get("mailing_id")?),
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        insert_time: row.try_get("insert_time")?,
    })
}

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

impl PostgresRepository {
    async fn fetch<T>(
        &self,
        operation: &'static str,
        query: PgQuery<'_>,
        from_row: fn(&PgRow) -> Result<T, sqlx::Error>,
    ) -> Result<Vec<T>, RepositoryError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(RepositoryError::TransactionClosed)?;
        let rows = query
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| RepositoryError::backend(operation, e))?;
        rows.iter()
            .map(from_row)
            .collect::<Result<_, _>>()
            .map_err(|e| RepositoryError::backend(operation, e))
    }

    async fn execute(
        &self,
        operation: &'static str,
        query: PgQuery<'_>,
    ) -> Result<u64, RepositoryError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(RepositoryError::TransactionClosed)?;
        query
            .execute(&mut **tx)
            .await
            .map(|done| done.rows_affected())
            .map_err(|e| RepositoryError::backend(operation, e))
    }
}

fn entries_sql(filter: &str) -> String {
    format!("SELECT {MAILING_ENTRY_COLUMNS} FROM mailmandb.mailing_entry WHERE {filter}")
}

#[async_trait]
impl CustomerRepository for PostgresRepository {
    async fn find_customer_by_id(&self, id: CustomerId) -> Result<Customer, RepositoryError> {
        const QUERY: &str = "find customer by id";
        let query = sqlx::query("SELECT id, email FROM mailmandb.customer WHERE id = $1")
            .bind(id.get());
        exactly_one(QUERY, self.fetch(QUERY, query, customer_from_row).await?)
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Customer, RepositoryError> {
        const QUERY: &str = "find customer by email";
        let query =
            sqlx::query("SELECT id, email FROM mailmandb.customer WHERE email = $1").bind(email);
        exactly_one(QUERY, self.fetch(QUERY, query, customer_from_row).await?)
    }

    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer, RepositoryError> {
        const QUERY: &str = "insert customer";
        let query =
            sqlx::query("INSERT INTO mailmandb.customer (email) VALUES ($1) RETURNING id, email")
                .bind(customer.email);
        exactly_one(QUERY, self.fetch(QUERY, query, customer_from_row).await?)
    }

    async fn delete_customer_by_id(&self, id: CustomerId) -> Result<(), RepositoryError> {
        const QUERY: &str = "delete customer";
        let query = sqlx::query("DELETE FROM mailmandb.customer WHERE id = $1").bind(id.get());
        exactly_one_affected(QUERY, self.execute(QUERY, query).await?)
    }
}

#[async_trait]
impl MailingEntryRepository for PostgresRepository {
    async fn find_mailing_entries_by_mailing_id(
        &self,
        mailing_id: MailingId,
    ) -> Result<Vec<MailingEntry>, RepositoryError> {
        let sql = entries_sql("mailing_id = $1");
        let query = sqlx::query(&sql).bind(mailing_id.get());
        self.fetch("find mailing entries by mailing id", query, mailing_entry_from_row)
            .await
    }

    async fn find_mailing_entries_older_than(
        &self,
        inserted_before: DateTime<Utc>,
    ) -> Result<Vec<MailingEntry>, RepositoryError> {
        let sql = entries_sql("insert_time < $1");
        let query = sqlx::query(&sql).bind(inserted_before);
        self.fetch("find mailing entries older than", query, mailing_entry_from_row)
            .await
    }

    async fn find_mailing_entries_by_mailing_id_older_than(
        &self,
        mailing_id: MailingId,
        inserted_before: DateTime<Utc>,
    ) -> Result<Vec<MailingEntry>, RepositoryError> {
        let sql = entries_sql("mailing_id = $1 AND insert_time < $2");
        let query = sqlx::query(&sql)
            .bind(mailing_id.get())
            .bind(inserted_before);
        self.fetch(
            "find mailing entries by mailing id older than",
            query,
            mailing_entry_from_row,
        )
        .await
    }

    async fn find_mailing_entries_by_customer_id(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<MailingEntry>, RepositoryError> {
        let sql = entries_sql("customer_id = $1");
        let query = sqlx::query(&sql).bind(customer_id.get());
        self.fetch("find mailing entries by customer id", query, mailing_entry_from_row)
            .await
    }

    async fn find_duplicate_mailing_entries(
        &self,
        entry: &NewMailingEntry,
    ) -> Result<Vec<MailingEntry>, RepositoryError> {
        let sql = entries_sql(
            "customer_id = $1 AND mailing_id = $2 AND title = $3 \
             AND content = $4 AND insert_time = $5",
        );
        let query = sqlx::query(&sql)
            .bind(entry.customer_id.get())
            .bind(entry.mailing_id.get())
            .bind(entry.title.as_str())
            .bind(entry.content.as_str())
            .bind(entry.insert_time);
        self.fetch("find duplicate mailing entries", query, mailing_entry_from_row)
            .await
    }

    async fn insert_mailing_entry(
        &self,
        entry: NewMailingEntry,
    ) -> Result<MailingEntry, RepositoryError> {
        const QUERY: &str = "insert mailing entry";
        let sql = format!(
            "INSERT INTO mailmandb.mailing_entry \
             (customer_id, mailing_id, title, content, insert_time) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {MAILING_ENTRY_COLUMNS}"
        );
        let query = sqlx::query(&sql)
            .bind(entry.customer_id.get())
            .bind(entry.mailing_id.get())
            .bind(entry.title)
            .bind(entry.content)
            .bind(entry.insert_time);
        exactly_one(QUERY, self.fetch(QUERY, query, mailing_entry_from_row).await?)
    }

    async fn delete_mailing_entry_by_id(&self, id: MailingEntryId) -> Result<(), RepositoryError> {
        const QUERY: &str = "delete mailing entry";
        let query =
            sqlx::query("DELETE FROM mailmandb.mailing_entry WHERE id = $1").bind(id.get());
        exactly_one_affected(QUERY, self.execute(QUERY, query).await?)
    }
}
