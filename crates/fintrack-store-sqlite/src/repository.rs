// crates/fintrack-store-sqlite/src/repository.rs
// ============================================================================
// Module: Domain Repositories
// Description: Typed create/read/update/delete over the replicated store.
// Purpose: Route every domain write through the coordinator as a mutation.
// Dependencies: fintrack-core, rusqlite, time
// ============================================================================

//! ## Overview
//! [`Repository`] is generic over a [`TableRecord`]. Writes validate the
//! input, build a [`Mutation`], and go through
//! [`StorageContext::with_replicated_write`]; reads use the primary's reader
//! pool. Ids returned by `create` are the primary's row ids.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::marker::PhantomData;
use std::str::FromStr;

use fintrack_core::Account;
use fintrack_core::Category;
use fintrack_core::Expense;
use fintrack_core::Field;
use fintrack_core::Filter;
use fintrack_core::FixedDeposit;
use fintrack_core::Income;
use fintrack_core::IncomeCategory;
use fintrack_core::Investment;
use fintrack_core::Mutation;
use fintrack_core::NewAccount;
use fintrack_core::NewCategory;
use fintrack_core::NewExpense;
use fintrack_core::NewFixedDeposit;
use fintrack_core::NewIncome;
use fintrack_core::NewIncomeCategory;
use fintrack_core::NewInvestment;
use fintrack_core::NewPfEntry;
use fintrack_core::NewUser;
use fintrack_core::PfEntry;
use fintrack_core::RecordId;
use fintrack_core::RecordInput;
use fintrack_core::Statement;
use fintrack_core::User;
use fintrack_core::UserId;
use fintrack_core::ValidationError;
use fintrack_core::validation::parse_date;
use rusqlite::Row;
use rusqlite::params_from_iter;
use rusqlite::types::Type;
use rusqlite::types::Value;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::context::StorageContext;
use crate::coordinator::ReplicatedWrite;
use crate::error::SqliteStoreError;
use crate::error::WriteError;

// ============================================================================
// SECTION: Record Mapping
// ============================================================================

/// A record stored in one table.
pub trait TableRecord: Sized {
    /// Input type used to create or replace the record.
    type Input: RecordInput;
    /// Selected columns, in [`TableRecord::from_row`] order.
    const COLUMNS: &'static [&'static str];
    /// Column scoping rows to a user, if any.
    const OWNER_COLUMN: Option<&'static str>;
    /// Whether inserts stamp `created_at`.
    const HAS_CREATED_AT: bool;

    /// Builds a record from a row selected with [`TableRecord::COLUMNS`].
    ///
    /// # Errors
    ///
    /// Returns a `rusqlite` error when a column has an unexpected type.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Returns the current UTC time as RFC 3339 text.
pub(crate) fn now_timestamp() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

/// Reads an enumerated text column.
fn parse_text<T: FromStr<Err = ValidationError>>(
    row: &Row<'_>,
    index: usize,
) -> rusqlite::Result<T> {
    let text: String = row.get(index)?;
    text.parse()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err)))
}

/// Reads a nullable id column.
fn optional_id(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<RecordId>> {
    Ok(row.get::<_, Option<i64>>(index)?.map(RecordId::new))
}

impl TableRecord for User {
    type Input = NewUser;
    const COLUMNS: &'static [&'static str] = &["id", "username", "password_hash", "created_at"];
    const OWNER_COLUMN: Option<&'static str> = None;
    const HAS_CREATED_AT: bool = true;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: UserId::new(row.get(0)?),
            username: row.get(1)?,
            password_hash: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

impl TableRecord for Category {
    type Input = NewCategory;
    const COLUMNS: &'static [&'static str] = &["id", "name", "icon", "user_id"];
    const OWNER_COLUMN: Option<&'static str> = Some("user_id");
    const HAS_CREATED_AT: bool = false;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: RecordId::new(row.get(0)?),
            name: row.get(1)?,
            icon: row.get(2)?,
            user_id: row.get::<_, Option<i64>>(3)?.map(UserId::new),
        })
    }
}

impl TableRecord for IncomeCategory {
    type Input = NewIncomeCategory;
    const COLUMNS: &'static [&'static str] = &["id", "name", "icon", "user_id"];
    const OWNER_COLUMN: Option<&'static str> = Some("user_id");
    const HAS_CREATED_AT: bool = false;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: RecordId::new(row.get(0)?),
            name: row.get(1)?,
            icon: row.get(2)?,
            user_id: row.get::<_, Option<i64>>(3)?.map(UserId::new),
        })
    }
}

impl TableRecord for Account {
    type Input = NewAccount;
    const COLUMNS: &'static [&'static str] =
        &["id", "user_id", "name", "account_type", "balance", "is_default", "created_at"];
    const OWNER_COLUMN: Option<&'static str> = Some("user_id");
    const HAS_CREATED_AT: bool = true;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: RecordId::new(row.get(0)?),
            user_id: UserId::new(row.get(1)?),
            name: row.get(2)?,
            account_type: parse_text(row, 3)?,
            balance: row.get(4)?,
            is_default: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl TableRecord for Expense {
    type Input = NewExpense;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "amount",
        "date",
        "category_id",
        "where_spent",
        "note",
        "account_id",
        "created_at",
    ];
    const OWNER_COLUMN: Option<&'static str> = Some("user_id");
    const HAS_CREATED_AT: bool = true;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: RecordId::new(row.get(0)?),
            user_id: UserId::new(row.get(1)?),
            amount: row.get(2)?,
            date: row.get(3)?,
            category_id: RecordId::new(row.get(4)?),
            where_spent: row.get(5)?,
            note: row.get(6)?,
            account_id: optional_id(row, 7)?,
            created_at: row.get(8)?,
        })
    }
}

impl TableRecord for Income {
    type Input = NewIncome;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "amount",
        "date",
        "category_id",
        "source",
        "note",
        "account_id",
        "created_at",
    ];
    const OWNER_COLUMN: Option<&'static str> = Some("user_id");
    const HAS_CREATED_AT: bool = true;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: RecordId::new(row.get(0)?),
            user_id: UserId::new(row.get(1)?),
            amount: row.get(2)?,
            date: row.get(3)?,
            category_id: RecordId::new(row.get(4)?),
            source: row.get(5)?,
            note: row.get(6)?,
            account_id: optional_id(row, 7)?,
            created_at: row.get(8)?,
        })
    }
}

impl TableRecord for Investment {
    type Input = NewInvestment;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "name",
        "investment_type",
        "symbol",
        "units",
        "invested_amount",
        "current_value",
        "purchase_date",
        "note",
    ];
    const OWNER_COLUMN: Option<&'static str> = Some("user_id");
    const HAS_CREATED_AT: bool = false;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: RecordId::new(row.get(0)?),
            user_id: UserId::new(row.get(1)?),
            name: row.get(2)?,
            investment_type: parse_text(row, 3)?,
            symbol: row.get(4)?,
            units: row.get(5)?,
            invested_amount: row.get(6)?,
            current_value: row.get(7)?,
            purchase_date: row.get(8)?,
            note: row.get(9)?,
        })
    }
}

impl TableRecord for FixedDeposit {
    type Input = NewFixedDeposit;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "bank_name",
        "principal",
        "interest_rate",
        "start_date",
        "maturity_date",
        "compounding",
        "note",
    ];
    const OWNER_COLUMN: Option<&'static str> = Some("user_id");
    const HAS_CREATED_AT: bool = false;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: RecordId::new(row.get(0)?),
            user_id: UserId::new(row.get(1)?),
            bank_name: row.get(2)?,
            principal: row.get(3)?,
            interest_rate: row.get(4)?,
            start_date: row.get(5)?,
            maturity_date: row.get(6)?,
            compounding: parse_text(row, 7)?,
            note: row.get(8)?,
        })
    }
}

impl TableRecord for PfEntry {
    type Input = NewPfEntry;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "entry_date",
        "employee_contribution",
        "employer_contribution",
        "interest",
        "note",
    ];
    const OWNER_COLUMN: Option<&'static str> = Some("user_id");
    const HAS_CREATED_AT: bool = false;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: RecordId::new(row.get(0)?),
            user_id: UserId::new(row.get(1)?),
            entry_date: row.get(2)?,
            employee_contribution: row.get(3)?,
            employer_contribution: row.get(4)?,
            interest: row.get(5)?,
            note: row.get(6)?,
        })
    }
}

// ============================================================================
// SECTION: Repository
// ============================================================================

/// Typed access to one table through a [`StorageContext`].
pub struct Repository<'a, R> {
    /// Storage owner.
    ctx: &'a StorageContext,
    /// Record type marker.
    marker: PhantomData<fn() -> R>,
}

impl<'a, R: TableRecord> Repository<'a, R> {
    /// Creates a repository over `ctx`.
    #[must_use]
    pub const fn new(ctx: &'a StorageContext) -> Self {
        Self {
            ctx,
            marker: PhantomData,
        }
    }

    /// Validates and inserts a record; returns the primary's row id.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError`] when validation or the primary write fails.
    pub fn create(&self, input: &R::Input) -> Result<ReplicatedWrite<RecordId>, WriteError> {
        input.validate()?;
        let mut fields = input.fields();
        if R::HAS_CREATED_AT {
            fields.push(Field::new("created_at", now_timestamp()));
        }
        let write = self
            .ctx
            .with_replicated_write(&Mutation::single(Statement::insert(table::<R>(), fields)))?;
        let Some(id) = write.value.last_insert_id else {
            return Err(WriteError::Primary(SqliteStoreError::Db(
                "insert did not report a row id".to_string(),
            )));
        };
        Ok(write.map(|_| RecordId::new(id)))
    }

    /// Replaces a record's fields; the row must belong to the input's owner.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError`] when validation or the primary write fails.
    pub fn update(
        &self,
        id: RecordId,
        input: &R::Input,
    ) -> Result<ReplicatedWrite<bool>, WriteError> {
        input.validate()?;
        let filter = owned_filter::<R>(id, input.owner());
        let statement = Statement::update(table::<R>(), input.fields(), filter);
        let write = self.ctx.with_replicated_write(&Mutation::single(statement))?;
        Ok(write.map(|result| result.rows_affected > 0))
    }

    /// Deletes a record owned by `owner` (ignored for unowned tables).
    ///
    /// # Errors
    ///
    /// Returns [`WriteError`] when the primary write fails.
    pub fn delete(
        &self,
        id: RecordId,
        owner: Option<UserId>,
    ) -> Result<ReplicatedWrite<bool>, WriteError> {
        let statement = Statement::delete(table::<R>(), owned_filter::<R>(id, owner));
        let write = self.ctx.with_replicated_write(&Mutation::single(statement))?;
        Ok(write.map(|result| result.rows_affected > 0))
    }

    /// Loads one record by id.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the read fails.
    pub fn get(&self, id: RecordId) -> Result<Option<R>, SqliteStoreError> {
        let sql = format!("{} WHERE id = ?1", select_sql::<R>());
        Ok(self.query(&sql, vec![Value::Integer(id.get())])?.into_iter().next())
    }

    /// Lists every record owned by `user`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Invalid`] for tables without an owner
    /// column, or a read error.
    pub fn list_for_user(&self, user: UserId) -> Result<Vec<R>, SqliteStoreError> {
        let Some(owner) = R::OWNER_COLUMN else {
            return Err(SqliteStoreError::Invalid(format!("{} has no owner column", table::<R>())));
        };
        let sql = format!("{} WHERE {owner} = ?1 ORDER BY id", select_sql::<R>());
        self.query(&sql, vec![Value::Integer(user.get())])
    }

    /// Runs a select built from [`select_sql`] on a primary reader.
    fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<R>, SqliteStoreError> {
        self.ctx.primary().with_reader(|connection| {
            let mut stmt = connection.prepare(sql).map_err(|err| SqliteStoreError::from_db(&err))?;
            let rows = stmt
                .query_map(params_from_iter(params), R::from_row)
                .map_err(|err| SqliteStoreError::from_db(&err))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(|err| SqliteStoreError::from_db(&err))
        })
    }
}

/// Table written by `R`.
const fn table<R: TableRecord>() -> fintrack_core::Table {
    <R::Input as RecordInput>::TABLE
}

/// `SELECT <columns> FROM <table>`.
fn select_sql<R: TableRecord>() -> String {
    format!("SELECT {} FROM {}", R::COLUMNS.join(", "), table::<R>())
}

/// Filter selecting `id`, scoped to `owner` when the table has an owner column.
fn owned_filter<R: TableRecord>(id: RecordId, owner: Option<UserId>) -> Filter {
    let filter = Filter::by_id(id);
    match R::OWNER_COLUMN {
        Some(column) => filter.and(column, owner),
        None => filter,
    }
}

// ============================================================================
// SECTION: Reporting Queries
// ============================================================================

/// Sum of amounts per category over a date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    /// Category id.
    pub category_id: RecordId,
    /// Sum of amounts.
    pub total: f64,
    /// Number of rows.
    pub count: i64,
}

/// Validates an inclusive `YYYY-MM-DD` range.
fn date_range(from: &str, to: &str) -> Result<Vec<Value>, SqliteStoreError> {
    let start = parse_date("from", from).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    let end = parse_date("to", to).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    if end < start {
        return Err(SqliteStoreError::Invalid(format!("range end {to} precedes start {from}")));
    }
    Ok(vec![Value::Text(from.to_string()), Value::Text(to.to_string())])
}

/// Totals per category for a dated money table.
fn totals_by_category(
    ctx: &StorageContext,
    table: fintrack_core::Table,
    user: UserId,
    from: &str,
    to: &str,
) -> Result<Vec<CategoryTotal>, SqliteStoreError> {
    let mut params = vec![Value::Integer(user.get())];
    params.extend(date_range(from, to)?);
    let sql = format!(
        "SELECT category_id, SUM(amount), COUNT(*) FROM {table} \
         WHERE user_id = ?1 AND date BETWEEN ?2 AND ?3 \
         GROUP BY category_id ORDER BY SUM(amount) DESC, category_id"
    );
    ctx.primary().with_reader(|connection| {
        let mut stmt = connection.prepare(&sql).map_err(|err| SqliteStoreError::from_db(&err))?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                Ok(CategoryTotal {
                    category_id: RecordId::new(row.get(0)?),
                    total: row.get(1)?,
                    count: row.get(2)?,
                })
            })
            .map_err(|err| SqliteStoreError::from_db(&err))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| SqliteStoreError::from_db(&err))
    })
}

impl Repository<'_, Expense> {
    /// Lists a user's expenses dated within `from..=to`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] for malformed dates or read failures.
    pub fn list_between(
        &self,
        user: UserId,
        from: &str,
        to: &str,
    ) -> Result<Vec<Expense>, SqliteStoreError> {
        let mut params = vec![Value::Integer(user.get())];
        params.extend(date_range(from, to)?);
        let sql = format!(
            "{} WHERE user_id = ?1 AND date BETWEEN ?2 AND ?3 ORDER BY date, id",
            select_sql::<Expense>()
        );
        self.query(&sql, params)
    }

    /// Sums a user's expenses per category within `from..=to`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] for malformed dates or read failures.
    pub fn totals_by_category(
        &self,
        user: UserId,
        from: &str,
        to: &str,
    ) -> Result<Vec<CategoryTotal>, SqliteStoreError> {
        totals_by_category(self.ctx, fintrack_core::Table::Expenses, user, from, to)
    }
}

impl Repository<'_, Income> {
    /// Lists a user's incomes dated within `from..=to`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] for malformed dates or read failures.
    pub fn list_between(
        &self,
        user: UserId,
        from: &str,
        to: &str,
    ) -> Result<Vec<Income>, SqliteStoreError> {
        let mut params = vec![Value::Integer(user.get())];
        params.extend(date_range(from, to)?);
        let sql = format!(
            "{} WHERE user_id = ?1 AND date BETWEEN ?2 AND ?3 ORDER BY date, id",
            select_sql::<Income>()
        );
        self.query(&sql, params)
    }

    /// Sums a user's incomes per category within `from..=to`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] for malformed dates or read failures.
    pub fn totals_by_category(
        &self,
        user: UserId,
        from: &str,
        to: &str,
    ) -> Result<Vec<CategoryTotal>, SqliteStoreError> {
        totals_by_category(self.ctx, fintrack_core::Table::Incomes, user, from, to)
    }
}

impl Repository<'_, Account> {
    /// Returns the user's default account, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the read fails.
    pub fn default_for_user(&self, user: UserId) -> Result<Option<Account>, SqliteStoreError> {
        let sql = format!(
            "{} WHERE user_id = ?1 AND is_default = 1 ORDER BY id LIMIT 1",
            select_sql::<Account>()
        );
        Ok(self.query(&sql, vec![Value::Integer(user.get())])?.into_iter().next())
    }
}

impl Repository<'_, Category> {
    /// Lists default categories plus the user's own.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the read fails.
    pub fn list_visible(&self, user: UserId) -> Result<Vec<Category>, SqliteStoreError> {
        let sql = format!(
            "{} WHERE user_id IS NULL OR user_id = ?1 ORDER BY id",
            select_sql::<Category>()
        );
        self.query(&sql, vec![Value::Integer(user.get())])
    }
}

impl Repository<'_, IncomeCategory> {
    /// Lists default income categories plus the user's own.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the read fails.
    pub fn list_visible(&self, user: UserId) -> Result<Vec<IncomeCategory>, SqliteStoreError> {
        let sql = format!(
            "{} WHERE user_id IS NULL OR user_id = ?1 ORDER BY id",
            select_sql::<IncomeCategory>()
        );
        self.query(&sql, vec![Value::Integer(user.get())])
    }
}

impl Repository<'_, User> {
    /// Finds a user by exact username.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the read fails.
    pub fn find_by_username(&self, username: &str) -> Result<Option<User>, SqliteStoreError> {
        let sql = format!("{} WHERE username = ?1", select_sql::<User>());
        Ok(self.query(&sql, vec![Value::Text(username.to_string())])?.into_iter().next())
    }
}
