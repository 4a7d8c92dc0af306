//! PostgreSQL-backed [`UserStore`] for the `users` table.

use async_trait::async_trait;
use futures::StreamExt;
use sqlx::FromRow;

use crate::models::user::User;
use crate::store::{FindOptions, SortOrder, StoreError, UserCursor, UserFilter, UserStore};
use crate::DbPool;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, first_name, last_name, nickname, password_hash, email, country, \
                       created_at, updated_at";

/// Number of bind parameters used by the `SET` list in [`PgUserStore::update_one`].
const UPDATE_SET_PARAMS: usize = 7;

pub struct PgUserStore {
    pool: DbPool,
}

impl PgUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Build a `WHERE` clause for `filter`, numbering placeholders from `first_param`.
///
/// Returns the clause (empty when the filter matches everything) and the
/// values to bind, in placeholder order.
fn where_clause(filter: &UserFilter, first_param: usize) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut binds = Vec::new();

    if let Some(id) = &filter.id {
        conditions.push(format!("id = ${}", first_param + binds.len()));
        binds.push(id.clone());
    }
    if let Some(country) = &filter.country {
        conditions.push(format!("country = ${}", first_param + binds.len()));
        binds.push(country.clone());
    }

    if conditions.is_empty() {
        (String::new(), binds)
    } else {
        (format!("WHERE {}", conditions.join(" AND ")), binds)
    }
}

/// Build the `SELECT` for [`UserStore::find`]. Offset and limit are bound
/// after the filter values.
fn find_query(filter: &UserFilter, options: &FindOptions) -> (String, Vec<String>) {
    let (where_sql, binds) = where_clause(filter, 1);
    let direction = match options.sort {
        SortOrder::CreatedAtDesc => "DESC",
        SortOrder::CreatedAtAsc => "ASC",
    };

    let mut query = format!("SELECT {COLUMNS} FROM users");
    if !where_sql.is_empty() {
        query.push(' ');
        query.push_str(&where_sql);
    }
    query.push_str(&format!(
        " ORDER BY created_at {direction}, id OFFSET ${}",
        binds.len() + 1
    ));
    if options.limit.is_some() {
        query.push_str(&format!(" LIMIT ${}", binds.len() + 2));
    }
    (query, binds)
}

/// Sub-select that pins "one" matching row for update/delete.
fn first_match(filter: &UserFilter, first_param: usize) -> (String, Vec<String>) {
    let (where_sql, binds) = where_clause(filter, first_param);
    (
        format!("id = (SELECT id FROM users {where_sql} ORDER BY id LIMIT 1)"),
        binds,
    )
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert_one(&self, user: &User) -> Result<(), StoreError> {
        let query = format!(
            "INSERT INTO users ({COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        );
        let result = sqlx::query(&query)
            .bind(&user.id)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.nickname)
            .bind(&user.password_hash)
            .bind(&user.email)
            .bind(&user.country)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            // PostgreSQL unique violation: error code 23505
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                Err(StoreError::Duplicate(user.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_one(
        &self,
        filter: &UserFilter,
        replacement: &User,
    ) -> Result<Option<User>, StoreError> {
        let (target, binds) = first_match(filter, UPDATE_SET_PARAMS + 1);
        let query = format!(
            "UPDATE users SET
                first_name = $1,
                last_name = $2,
                nickname = $3,
                password_hash = $4,
                email = $5,
                country = $6,
                updated_at = GREATEST($7, created_at)
             WHERE {target}
             RETURNING {COLUMNS}"
        );

        let mut q = sqlx::query_as::<_, User>(&query)
            .bind(&replacement.first_name)
            .bind(&replacement.last_name)
            .bind(&replacement.nickname)
            .bind(&replacement.password_hash)
            .bind(&replacement.email)
            .bind(&replacement.country)
            .bind(replacement.updated_at);
        for value in &binds {
            q = q.bind(value);
        }
        Ok(q.fetch_optional(&self.pool).await?)
    }

    async fn delete_one(&self, filter: &UserFilter) -> Result<u64, StoreError> {
        let (target, binds) = first_match(filter, 1);
        let query = format!("DELETE FROM users WHERE {target}");

        let mut q = sqlx::query(&query);
        for value in &binds {
            q = q.bind(value);
        }
        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn find(
        &self,
        filter: &UserFilter,
        options: &FindOptions,
    ) -> Result<UserCursor, StoreError> {
        let (query, binds) = find_query(filter, options);

        let mut q = sqlx::query(&query);
        for value in &binds {
            q = q.bind(value);
        }
        q = q.bind(to_i64(options.skip));
        if let Some(limit) = options.limit {
            q = q.bind(to_i64(limit));
        }

        let rows = q.fetch_all(&self.pool).await?;
        let decoded: Vec<Result<User, StoreError>> = rows
            .iter()
            .map(|row| User::from_row(row).map_err(|e| StoreError::Decode(e.to_string())))
            .collect();

        Ok(futures::stream::iter(decoded).boxed())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}
