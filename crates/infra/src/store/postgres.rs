//! Postgres-backed ledger store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation { constraint }` |
//! | Database (serialization failure / deadlock) | `40001` / `40P01` | `Conflict` |
//! | Database (other) | any other | `Backend` |
//! | PoolClosed, IO, decode, ... | N/A | `Backend` |
//!
//! Version-checked updates that touch zero rows are reported as `Conflict`.
//!
//! ## Locking
//!
//! `lock_accounts` and `lock_user_by_username` use `SELECT ... FOR UPDATE`;
//! accounts are always locked `ORDER BY id` so two transfers over the same
//! pair of accounts cannot deadlock.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use ledgerbank_auth::{Role, RoleName, User};
use ledgerbank_banking::{
    Account, AccountNumber, AccountRef, AccountStatus, AccountType, ReferenceId,
    Transaction as LedgerRow, TransactionType,
};
use ledgerbank_core::{AccountId, RoleId, TransactionId, UserId};

use super::{LedgerStore, StoreError, StoreTx, TransactionFilter};

const USER_COLUMNS: &str = r#"
    u.id, u.username, u.email, u.password_hash, u.enabled, u.account_non_locked,
    u.failed_login_attempts, u.lock_time, u.created_at, u.version,
    ARRAY(
        SELECT r.name FROM user_roles ur JOIN roles r ON r.id = ur.role_id
        WHERE ur.user_id = u.id
    ) AS roles
"#;

const ACCOUNT_COLUMNS: &str = r#"
    a.id, a.account_number, a.balance, a.account_type, a.status,
    a.approved_by_staff, a.owner_id, a.created_at, a.version
"#;

const TRANSACTION_SELECT: &str = r#"
    SELECT
        t.id, t.transaction_type, t.amount, t."timestamp", t.reference_id,
        t.source_account_id, s.account_number AS source_account_number,
        t.destination_account_id, d.account_number AS destination_account_number
    FROM transactions t
    LEFT JOIN accounts s ON s.id = t.source_account_id
    LEFT JOIN accounts d ON d.id = t.destination_account_id
"#;

/// Postgres-backed ledger store.
///
/// Every unit of work is one database transaction; dropping it without
/// committing rolls the transaction back.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and apply the schema migrations.
    #[instrument(skip(database_url), err)]
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PgStoreTx { tx }))
    }
}

struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

impl PgStoreTx {
    async fn fetch_user(
        &mut self,
        operation: &str,
        predicate: &str,
        bind: &str,
        for_update: bool,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE {predicate}{}",
            if for_update { " FOR UPDATE OF u" } else { "" }
        );
        let row = sqlx::query(&sql)
            .bind(bind)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn fetch_accounts(
        &mut self,
        operation: &str,
        sql: &str,
        bind: Option<Uuid>,
    ) -> Result<Vec<Account>, StoreError> {
        let mut query = sqlx::query(sql);
        if let Some(id) = bind {
            query = query.bind(id);
        }
        let rows = query
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter().map(account_from_row).collect()
    }
}

#[async_trait]
impl StoreTx for PgStoreTx {
    #[instrument(skip(self), fields(role = %name), err)]
    async fn find_role(&mut self, name: RoleName) -> Result<Option<Role>, StoreError> {
        let row = sqlx::query("SELECT id, name FROM roles WHERE name = $1")
            .bind(name.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_role", e))?;
        row.map(|row| {
            Ok(Role {
                id: RoleId::from_uuid(get(&row, "id")?),
                name: parse_column(&row, "name")?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self), fields(role = %role.name), err)]
    async fn insert_role(&mut self, role: &Role) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO roles (id, name) VALUES ($1, $2)")
            .bind(role.id.as_uuid())
            .bind(role.name.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_role", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn find_user(&mut self, id: UserId) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_user", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_user_by_username(
        &mut self,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        self.fetch_user("find_user_by_username", "u.username = $1", username, false)
            .await
    }

    #[instrument(skip(self, email), err)]
    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        self.fetch_user("find_user_by_email", "u.email = $1", email, false)
            .await
    }

    #[instrument(skip(self), err)]
    async fn lock_user_by_username(
        &mut self,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        self.fetch_user("lock_user_by_username", "u.username = $1", username, true)
            .await
    }

    #[instrument(skip(self, user), fields(username = %user.username), err)]
    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, password_hash, enabled, account_non_locked,
                failed_login_attempts, lock_time, created_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.enabled)
        .bind(user.account_non_locked)
        .bind(user.failed_login_attempts as i32)
        .bind(user.lock_time)
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;

        let role_names: Vec<&str> = user.roles.iter().map(|r| r.as_str()).collect();
        let granted = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            SELECT $1, id FROM roles WHERE name = ANY($2)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&role_names)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user_roles", e))?;

        if granted.rows_affected() != role_names.len() as u64 {
            return Err(StoreError::Backend(format!(
                "user {} references roles that are not seeded: {role_names:?}",
                user.username
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id, version = user.version), err)]
    async fn update_user(&mut self, user: &User) -> Result<User, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                email = $2,
                password_hash = $3,
                enabled = $4,
                account_non_locked = $5,
                failed_login_attempts = $6,
                lock_time = $7,
                version = version + 1
            WHERE id = $1 AND version = $8
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.enabled)
        .bind(user.account_non_locked)
        .bind(user.failed_login_attempts as i32)
        .bind(user.lock_time)
        .bind(user.version as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "user {} changed since version {}",
                user.id, user.version
            )));
        }
        let mut stored = user.clone();
        stored.version += 1;
        Ok(stored)
    }

    #[instrument(skip(self), err)]
    async fn list_users(&mut self) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u ORDER BY u.created_at, u.id");
        let rows = sqlx::query(&sql)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;
        rows.iter().map(user_from_row).collect()
    }

    #[instrument(skip(self), fields(account_id = %id), err)]
    async fn find_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE a.id = $1");
        Ok(self
            .fetch_accounts("find_account", &sql, Some(*id.as_uuid()))
            .await?
            .into_iter()
            .next())
    }

    #[instrument(skip(self), fields(account_number = %number), err)]
    async fn find_account_by_number(
        &mut self,
        number: &AccountNumber,
    ) -> Result<Option<Account>, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE a.account_number = $1");
        let row = sqlx::query(&sql)
            .bind(number.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_account_by_number", e))?;
        row.as_ref().map(account_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_accounts(&mut self) -> Result<Vec<Account>, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts a ORDER BY a.created_at, a.id");
        self.fetch_accounts("list_accounts", &sql, None).await
    }

    #[instrument(skip(self), fields(owner = %owner), err)]
    async fn list_accounts_by_owner(
        &mut self,
        owner: UserId,
    ) -> Result<Vec<Account>, StoreError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE a.owner_id = $1 ORDER BY a.created_at, a.id"
        );
        self.fetch_accounts("list_accounts_by_owner", &sql, Some(*owner.as_uuid()))
            .await
    }

    #[instrument(skip(self), err)]
    async fn list_unapproved_accounts(&mut self) -> Result<Vec<Account>, StoreError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE a.approved_by_staff = FALSE ORDER BY a.created_at, a.id"
        );
        self.fetch_accounts("list_unapproved_accounts", &sql, None)
            .await
    }

    #[instrument(skip(self), fields(count = ids.len()), err)]
    async fn lock_accounts(&mut self, ids: &[AccountId]) -> Result<Vec<Account>, StoreError> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE a.id = ANY($1) ORDER BY a.id FOR UPDATE"
        );
        let rows = sqlx::query(&sql)
            .bind(&ids)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_accounts", e))?;
        rows.iter().map(account_from_row).collect()
    }

    #[instrument(skip(self, account), fields(account_id = %account.id), err)]
    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, account_number, balance, account_type, status,
                approved_by_staff, owner_id, created_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(account.account_number.as_str())
        .bind(account.balance)
        .bind(account.account_type.as_str())
        .bind(account.status.as_str())
        .bind(account.approved_by_staff)
        .bind(account.owner.as_uuid())
        .bind(account.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_account", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, account),
        fields(account_id = %account.id, version = account.version),
        err
    )]
    async fn update_account(&mut self, account: &Account) -> Result<Account, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET
                balance = $2,
                status = $3,
                approved_by_staff = $4,
                version = version + 1
            WHERE id = $1 AND version = $5
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(account.balance)
        .bind(account.status.as_str())
        .bind(account.approved_by_staff)
        .bind(account.version as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_account", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "account {} changed since version {}",
                account.id, account.version
            )));
        }
        let mut stored = account.clone();
        stored.version += 1;
        Ok(stored)
    }

    #[instrument(
        skip(self, transaction),
        fields(reference_id = %transaction.reference_id),
        err
    )]
    async fn insert_transaction(&mut self, transaction: &LedgerRow) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, transaction_type, amount, "timestamp", reference_id,
                source_account_id, destination_account_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.transaction_type.as_str())
        .bind(transaction.amount)
        .bind(transaction.timestamp)
        .bind(transaction.reference_id.as_str())
        .bind(transaction.source.as_ref().map(|r| *r.id.as_uuid()))
        .bind(transaction.destination.as_ref().map(|r| *r.id.as_uuid()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(reference_id = %reference_id), err)]
    async fn find_transactions_by_reference(
        &mut self,
        reference_id: &ReferenceId,
    ) -> Result<Vec<LedgerRow>, StoreError> {
        let sql = format!("{TRANSACTION_SELECT} WHERE t.reference_id = $1 ORDER BY t.amount, t.id");
        let rows = sqlx::query(&sql)
            .bind(reference_id.as_str())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_transactions_by_reference", e))?;
        rows.iter().map(transaction_from_row).collect()
    }

    #[instrument(skip(self), fields(account = ?filter.account), err)]
    async fn query_transactions(
        &mut self,
        filter: &TransactionFilter,
    ) -> Result<Vec<LedgerRow>, StoreError> {
        let sql = format!(
            r#"{TRANSACTION_SELECT}
            WHERE ($1::uuid IS NULL OR t.source_account_id = $1 OR t.destination_account_id = $1)
                AND ($2::timestamptz IS NULL OR t."timestamp" >= $2)
                AND ($3::timestamptz IS NULL OR t."timestamp" < $3)
            ORDER BY t."timestamp" DESC, t.id DESC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(filter.account.map(|id| *id.as_uuid()))
            .bind(filter.range.from)
            .bind(filter.range.to_exclusive)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("query_transactions", e))?;
        rows.iter().map(transaction_from_row).collect()
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::unique(
                    db_err.constraint().unwrap_or("unknown").to_string(),
                ),
                Some("40001") | Some("40P01") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Backend(format!("failed to read column {column}: {e}")))
}

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = get(row, column)?;
    raw.trim()
        .parse()
        .map_err(|e| StoreError::Backend(format!("invalid {column} '{raw}': {e}")))
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let role_names: Vec<String> = get(row, "roles")?;
    let roles = role_names
        .iter()
        .map(|r| r.parse::<RoleName>())
        .collect::<Result<_, _>>()
        .map_err(|e| StoreError::Backend(format!("invalid role: {e}")))?;
    let attempts: i32 = get(row, "failed_login_attempts")?;
    let version: i64 = get(row, "version")?;
    Ok(User {
        id: UserId::from_uuid(get(row, "id")?),
        username: get(row, "username")?,
        email: get(row, "email")?,
        password_hash: get(row, "password_hash")?,
        enabled: get(row, "enabled")?,
        account_non_locked: get(row, "account_non_locked")?,
        failed_login_attempts: attempts.max(0) as u32,
        lock_time: get::<Option<DateTime<Utc>>>(row, "lock_time")?,
        roles,
        created_at: get(row, "created_at")?,
        version: version as u64,
    })
}

fn account_from_row(row: &PgRow) -> Result<Account, StoreError> {
    let version: i64 = get(row, "version")?;
    Ok(Account {
        id: AccountId::from_uuid(get(row, "id")?),
        account_number: parse_column(row, "account_number")?,
        balance: get::<Decimal>(row, "balance")?,
        account_type: parse_column::<AccountType>(row, "account_type")?,
        status: parse_column::<AccountStatus>(row, "status")?,
        approved_by_staff: get(row, "approved_by_staff")?,
        owner: UserId::from_uuid(get(row, "owner_id")?),
        created_at: get(row, "created_at")?,
        version: version as u64,
    })
}

fn account_ref(row: &PgRow, id_column: &str, number_column: &str) -> Result<Option<AccountRef>, StoreError> {
    let id: Option<Uuid> = get(row, id_column)?;
    let number: Option<String> = get(row, number_column)?;
    match (id, number) {
        (Some(id), Some(number)) => Ok(Some(AccountRef {
            id: AccountId::from_uuid(id),
            number: AccountNumber::parse(&number)
                .map_err(|e| StoreError::Backend(format!("invalid {number_column}: {e}")))?,
        })),
        _ => Ok(None),
    }
}

fn transaction_from_row(row: &PgRow) -> Result<LedgerRow, StoreError> {
    let reference: String = get(row, "reference_id")?;
    Ok(LedgerRow {
        id: TransactionId::from_uuid(get(row, "id")?),
        transaction_type: parse_column::<TransactionType>(row, "transaction_type")?,
        amount: get::<Decimal>(row, "amount")?,
        timestamp: get(row, "timestamp")?,
        reference_id: ReferenceId::from(reference),
        source: account_ref(row, "source_account_id", "source_account_number")?,
        destination: account_ref(row, "destination_account_id", "destination_account_number")?,
    })
}
