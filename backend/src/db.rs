use anyhow::{bail, Result};
use sqlx::{migrate::MigrateDatabase, FromRow, MySqlPool, Sqlite, SqlitePool};

/// Canonical expense record produced by inbound normalization, ready to insert.
///
/// Fields are stored exactly as resolved; `locations` is already serialized
/// to its JSON text form (at minimum "[]").
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub date: Option<String>,
    pub expense_name: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub paid_by: Option<String>,
    pub category: Option<String>,
    pub locations: String,
    pub status: Option<String>,
    pub receipt_url: Option<String>,
    pub notes: Option<String>,
}

/// One raw row of the expenses table. `locations` stays in its stored text
/// form here; outbound normalization turns it back into a sequence.
#[derive(Debug, Clone, FromRow)]
pub struct ExpenseRow {
    pub id: i64,
    pub date: Option<String>,
    pub expense_name: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub paid_by: Option<String>,
    pub category: Option<String>,
    pub locations: Option<String>,
    pub status: Option<String>,
    pub receipt_url: Option<String>,
    pub notes: Option<String>,
}

// The DML is identical on both engines (`?` placeholders bind on each);
// only the DDL differs.
const SQLITE_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS expenses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT,
        expense_name TEXT,
        amount REAL,
        currency TEXT,
        paid_by TEXT,
        category TEXT,
        locations TEXT,
        status TEXT,
        receipt_url TEXT,
        notes TEXT
    );
"#;

const MYSQL_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS expenses (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        date VARCHAR(255),
        expense_name VARCHAR(255),
        amount DOUBLE,
        currency VARCHAR(255),
        paid_by VARCHAR(255),
        category VARCHAR(255),
        locations TEXT,
        status VARCHAR(255),
        receipt_url VARCHAR(255),
        notes TEXT
    );
"#;

const LIST_SQL: &str = "SELECT id, date, expense_name, amount, currency, paid_by, category, \
                        locations, status, receipt_url, notes FROM expenses ORDER BY id DESC";

const INSERT_SQL: &str = "INSERT INTO expenses (date, expense_name, amount, currency, paid_by, \
                          category, locations, status, receipt_url, notes) \
                          VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const DELETE_SQL: &str = "DELETE FROM expenses WHERE id = ?";

const CLEAR_SQL: &str = "DELETE FROM expenses";

/// Database owns the expenses table and executes every statement against it.
///
/// Two backends are supported, selected by the connection URL scheme:
/// `sqlite:` for the embedded file engine and `mysql:` for the networked
/// server engine. The schema is applied idempotently once at connect time.
#[derive(Clone)]
pub enum Database {
    Sqlite(SqlitePool),
    MySql(MySqlPool),
}

impl Database {
    /// Connect to the engine named by the URL and ensure the schema exists.
    ///
    /// A missing SQLite database file is created first; a MySQL database is
    /// expected to already exist on the server.
    pub async fn connect(url: &str) -> Result<Self> {
        let db = if url.starts_with("sqlite:") {
            if !Sqlite::database_exists(url).await.unwrap_or(false) {
                Sqlite::create_database(url).await?;
            }
            Database::Sqlite(SqlitePool::connect(url).await?)
        } else if url.starts_with("mysql:") {
            Database::MySql(MySqlPool::connect(url).await?)
        } else {
            bail!("unsupported database URL (expected sqlite: or mysql:): {url}");
        };

        db.setup_schema().await?;
        Ok(db)
    }

    /// Initialize a test database with a unique name
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        // Generate a unique in-memory database per test
        let test_id = uuid::Uuid::new_v4().to_string();
        let db_url = format!("sqlite:file:memdb_{}?mode=memory&cache=shared", test_id);

        Self::connect(&db_url).await
    }

    /// Apply the engine-appropriate DDL. Idempotent; runs once per process.
    async fn setup_schema(&self) -> Result<()> {
        match self {
            Database::Sqlite(pool) => {
                sqlx::query(SQLITE_SCHEMA).execute(pool).await?;
            }
            Database::MySql(pool) => {
                sqlx::query(MYSQL_SCHEMA).execute(pool).await?;
            }
        }
        Ok(())
    }

    /// Fetch every expense row, newest first (descending id).
    pub async fn fetch_expenses(&self) -> Result<Vec<ExpenseRow>> {
        let rows = match self {
            Database::Sqlite(pool) => {
                sqlx::query_as::<_, ExpenseRow>(LIST_SQL).fetch_all(pool).await?
            }
            Database::MySql(pool) => {
                sqlx::query_as::<_, ExpenseRow>(LIST_SQL).fetch_all(pool).await?
            }
        };
        Ok(rows)
    }

    /// Insert one expense row and return the engine-assigned id.
    pub async fn insert_expense(&self, expense: &NewExpense) -> Result<i64> {
        let id = match self {
            Database::Sqlite(pool) => sqlx::query(INSERT_SQL)
                .bind(&expense.date)
                .bind(&expense.expense_name)
                .bind(expense.amount)
                .bind(&expense.currency)
                .bind(&expense.paid_by)
                .bind(&expense.category)
                .bind(&expense.locations)
                .bind(&expense.status)
                .bind(&expense.receipt_url)
                .bind(&expense.notes)
                .execute(pool)
                .await?
                .last_insert_rowid(),
            Database::MySql(pool) => sqlx::query(INSERT_SQL)
                .bind(&expense.date)
                .bind(&expense.expense_name)
                .bind(expense.amount)
                .bind(&expense.currency)
                .bind(&expense.paid_by)
                .bind(&expense.category)
                .bind(&expense.locations)
                .bind(&expense.status)
                .bind(&expense.receipt_url)
                .bind(&expense.notes)
                .execute(pool)
                .await?
                .last_insert_id() as i64,
        };
        Ok(id)
    }

    /// Delete a single expense by id.
    /// Returns true if a row was found and deleted, false otherwise.
    pub async fn delete_expense(&self, id: i64) -> Result<bool> {
        let rows_affected = match self {
            Database::Sqlite(pool) => {
                sqlx::query(DELETE_SQL).bind(id).execute(pool).await?.rows_affected()
            }
            Database::MySql(pool) => {
                sqlx::query(DELETE_SQL).bind(id).execute(pool).await?.rows_affected()
            }
        };
        Ok(rows_affected > 0)
    }

    /// Remove every expense row. Returns the number of rows deleted;
    /// deleting from an empty table succeeds with 0.
    pub async fn delete_all_expenses(&self) -> Result<u64> {
        let rows_affected = match self {
            Database::Sqlite(pool) => sqlx::query(CLEAR_SQL).execute(pool).await?.rows_affected(),
            Database::MySql(pool) => sqlx::query(CLEAR_SQL).execute(pool).await?.rows_affected(),
        };
        Ok(rows_affected)
    }

    /// Overwrite the stored locations blob for one row. Test seam for
    /// simulating pre-existing corrupt data; not reachable from any route.
    #[cfg(test)]
    pub async fn overwrite_locations(&self, id: i64, blob: &str) -> Result<()> {
        let sql = "UPDATE expenses SET locations = ? WHERE id = ?";
        match self {
            Database::Sqlite(pool) => {
                sqlx::query(sql).bind(blob).bind(id).execute(pool).await?;
            }
            Database::MySql(pool) => {
                sqlx::query(sql).bind(blob).bind(id).execute(pool).await?;
            }
        }
        Ok(())
    }
}
