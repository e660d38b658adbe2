//! Generic entity repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide list/get/insert/update/delete for every registry table from
//!   the static catalogue, instead of one hand-written repository per kind.
//! - Read dependent entities with their relations joined in.
//! - Translate store constraint failures into semantic errors.
//!
//! # Invariants
//! - Lists are ordered `name_en ASC, id ASC`.
//! - Writes only touch catalogue columns, plus `updated_at` on update.
//! - SQL text is built from catalogue constants, never from caller input.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::entity::{DeleteGuard, EntityKind};
use crate::model::record::{
    Illam, IllamRecord, LookupRecord, Namboodiri, NamboodiriRecord, Record, RecordId,
};
use crate::model::validate::{EntityDraft, FieldValue};
use once_cell::sync::Lazy;
use rusqlite::types::Value;
use rusqlite::{ffi, params_from_iter, Connection, ErrorCode, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const LOOKUP_COLUMNS: &[&str] = &["id", "name_en", "name_ml", "created_at", "updated_at"];
const ILLAM_COLUMNS: &[&str] = &[
    "id",
    "name_en",
    "name_ml",
    "gothram_id",
    "gramam_id",
    "vedam_id",
    "phone",
    "address",
    "district",
    "state",
    "pincode",
    "maps_url",
    "created_at",
    "updated_at",
];
const NAMBOODIRI_COLUMNS: &[&str] = &[
    "id",
    "name_en",
    "name_ml",
    "gothram_id",
    "illam_id",
    "profession_id",
    "phone",
    "email",
    "address",
    "district",
    "state",
    "pincode",
    "created_at",
    "updated_at",
];

static ILLAM_SELECT_SQL: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT {}, {}, {}, {}
         FROM illam i
         INNER JOIN gothram g ON g.id = i.gothram_id
         INNER JOIN gramam r ON r.id = i.gramam_id
         INNER JOIN vedam v ON v.id = i.vedam_id",
        aliased_columns("i", "", ILLAM_COLUMNS),
        aliased_columns("g", "gothram__", LOOKUP_COLUMNS),
        aliased_columns("r", "gramam__", LOOKUP_COLUMNS),
        aliased_columns("v", "vedam__", LOOKUP_COLUMNS),
    )
});

static NAMBOODIRI_SELECT_SQL: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT {}, {}, {}, {}
         FROM namboodiri n
         INNER JOIN gothram g ON g.id = n.gothram_id
         INNER JOIN illam i ON i.id = n.illam_id
         INNER JOIN profession p ON p.id = n.profession_id",
        aliased_columns("n", "", NAMBOODIRI_COLUMNS),
        aliased_columns("g", "gothram__", LOOKUP_COLUMNS),
        aliased_columns("i", "illam__", ILLAM_COLUMNS),
        aliased_columns("p", "profession__", LOOKUP_COLUMNS),
    )
});

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for registry persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// No row with this identity.
    NotFound { kind: EntityKind, id: RecordId },
    /// Unique name constraint rejected the write.
    Duplicate(EntityKind),
    /// Store-level foreign key constraint rejected the write or delete.
    ForeignKeyViolation(EntityKind),
    /// Connection schema is not at the version this binary expects.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Duplicate(kind) => write!(f, "{kind} with this name already exists"),
            Self::ForeignKeyViolation(kind) => {
                write!(f, "{kind} write violates a foreign key constraint")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "entity repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface shared by all six entity kinds.
pub trait EntityRepository {
    /// Lists every row of `kind`, ordered by `name_en`.
    fn list(&self, kind: EntityKind) -> RepoResult<Vec<Record>>;
    /// Loads one row with relations inlined.
    fn get(&self, kind: EntityKind, id: RecordId) -> RepoResult<Option<Record>>;
    /// Cheap existence probe used by the reference guard.
    fn exists(&self, kind: EntityKind, id: RecordId) -> RepoResult<bool>;
    /// Inserts a validated draft and returns the assigned id.
    fn insert(&self, draft: &EntityDraft) -> RepoResult<RecordId>;
    /// Replaces every writable column of row `id`.
    fn update(&self, id: RecordId, draft: &EntityDraft) -> RepoResult<()>;
    /// Removes one row.
    fn delete(&self, kind: EntityKind, id: RecordId) -> RepoResult<()>;
    /// Counts dependent rows that reference `id` through `guard`.
    fn count_references(&self, guard: &DeleteGuard, id: RecordId) -> RepoResult<u64>;
    /// Runs `f` inside one write transaction; commits only on `Ok`.
    fn in_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>;
}

/// SQLite-backed entity repository.
pub struct SqliteEntityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version = current_user_version(conn)?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    fn query_records(&self, kind: EntityKind, id: Option<RecordId>) -> RepoResult<Vec<Record>> {
        let (select_sql, alias) = match kind {
            EntityKind::Illam => (ILLAM_SELECT_SQL.clone(), "i."),
            EntityKind::Namboodiri => (NAMBOODIRI_SELECT_SQL.clone(), "n."),
            lookup => (
                format!("SELECT {} FROM {}", LOOKUP_COLUMNS.join(", "), lookup.table()),
                "",
            ),
        };
        let filter = if id.is_some() {
            format!(" WHERE {alias}id = ?1")
        } else {
            String::new()
        };
        let sql = format!("{select_sql}{filter} ORDER BY {alias}name_en ASC, {alias}id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = match id {
            Some(id) => stmt.query([id])?,
            None => stmt.query([])?,
        };
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record(kind, row)?);
        }
        Ok(records)
    }
}

impl EntityRepository for SqliteEntityRepository<'_> {
    fn list(&self, kind: EntityKind) -> RepoResult<Vec<Record>> {
        self.query_records(kind, None)
    }

    fn get(&self, kind: EntityKind, id: RecordId) -> RepoResult<Option<Record>> {
        let mut records = self.query_records(kind, Some(id))?;
        Ok(records.pop())
    }

    fn exists(&self, kind: EntityKind, id: RecordId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1);",
                kind.table()
            ),
            [id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn insert(&self, draft: &EntityDraft) -> RepoResult<RecordId> {
        let kind = draft.kind();
        let columns: Vec<&str> = draft.values().iter().map(|(field, _)| field.column).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({});",
            kind.table(),
            columns.join(", "),
            placeholders.join(", ")
        );

        self.conn
            .execute(&sql, params_from_iter(draft_values(draft)))
            .map_err(|err| classify_write_error(kind, err))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&self, id: RecordId, draft: &EntityDraft) -> RepoResult<()> {
        let kind = draft.kind();
        let assignments: Vec<String> = draft
            .values()
            .iter()
            .enumerate()
            .map(|(index, (field, _))| format!("{} = ?{}", field.column, index + 1))
            .collect();
        let sql = format!(
            "UPDATE {}
             SET {},
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?{};",
            kind.table(),
            assignments.join(", "),
            assignments.len() + 1
        );

        let mut bind = draft_values(draft);
        bind.push(Value::Integer(id));
        let changed = self
            .conn
            .execute(&sql, params_from_iter(bind))
            .map_err(|err| classify_write_error(kind, err))?;
        if changed == 0 {
            return Err(RepoError::NotFound { kind, id });
        }
        Ok(())
    }

    fn delete(&self, kind: EntityKind, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute(&format!("DELETE FROM {} WHERE id = ?1;", kind.table()), [id])
            .map_err(|err| classify_write_error(kind, err))?;
        if changed == 0 {
            return Err(RepoError::NotFound { kind, id });
        }
        Ok(())
    }

    fn count_references(&self, guard: &DeleteGuard, id: RecordId) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE {} = ?1;",
                guard.dependent.table(),
                guard.column
            ),
            [id],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative reference count {count}")))
    }

    fn in_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>,
    {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;
        // Dropping `tx` on the error path rolls back.
        let value = f(self)?;
        tx.commit().map_err(RepoError::from)?;
        Ok(value)
    }
}

fn draft_values(draft: &EntityDraft) -> Vec<Value> {
    draft
        .values()
        .iter()
        .map(|(_, value)| match value {
            FieldValue::Text(text) => Value::Text(text.clone()),
            FieldValue::Id(id) => Value::Integer(*id),
            FieldValue::Null => Value::Null,
        })
        .collect()
}

const FOREIGN_KEY_FAILED_MESSAGE: &str = "FOREIGN KEY constraint failed";

fn classify_write_error(kind: EntityKind, err: rusqlite::Error) -> RepoError {
    if let rusqlite::Error::SqliteFailure(failure, message) = &err {
        if failure.code == ErrorCode::ConstraintViolation {
            match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE => return RepoError::Duplicate(kind),
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return RepoError::ForeignKeyViolation(kind)
                }
                // `ON DELETE RESTRICT` fires as a trigger constraint.
                ffi::SQLITE_CONSTRAINT_TRIGGER
                    if message.as_deref() == Some(FOREIGN_KEY_FAILED_MESSAGE) =>
                {
                    return RepoError::ForeignKeyViolation(kind)
                }
                _ => {}
            }
        }
    }
    err.into()
}

fn aliased_columns(table_alias: &str, prefix: &str, columns: &[&str]) -> String {
    columns
        .iter()
        .map(|column| format!("{table_alias}.{column} AS {prefix}{column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_record(kind: EntityKind, row: &Row<'_>) -> RepoResult<Record> {
    let record = match kind {
        EntityKind::Illam => Record::Illam(Illam {
            record: parse_illam_record(row, "")?,
            gothram: parse_lookup(row, "gothram__")?,
            gramam: parse_lookup(row, "gramam__")?,
            vedam: parse_lookup(row, "vedam__")?,
        }),
        EntityKind::Namboodiri => Record::Namboodiri(Namboodiri {
            record: parse_namboodiri_record(row)?,
            gothram: parse_lookup(row, "gothram__")?,
            illam: parse_illam_record(row, "illam__")?,
            profession: parse_lookup(row, "profession__")?,
        }),
        lookup => Record::Lookup(lookup, parse_lookup(row, "")?),
    };

    if record.name_en().is_empty() || record.name_ml().is_empty() {
        return Err(RepoError::InvalidData(format!(
            "empty name in {}.id={}",
            kind.table(),
            record.id()
        )));
    }
    Ok(record)
}

fn parse_lookup(row: &Row<'_>, prefix: &str) -> rusqlite::Result<LookupRecord> {
    let column = |name: &str| format!("{prefix}{name}");
    Ok(LookupRecord {
        id: row.get(column("id").as_str())?,
        name_en: row.get(column("name_en").as_str())?,
        name_ml: row.get(column("name_ml").as_str())?,
        created_at: row.get(column("created_at").as_str())?,
        updated_at: row.get(column("updated_at").as_str())?,
    })
}

fn parse_illam_record(row: &Row<'_>, prefix: &str) -> rusqlite::Result<IllamRecord> {
    let column = |name: &str| format!("{prefix}{name}");
    Ok(IllamRecord {
        id: row.get(column("id").as_str())?,
        name_en: row.get(column("name_en").as_str())?,
        name_ml: row.get(column("name_ml").as_str())?,
        gothram_id: row.get(column("gothram_id").as_str())?,
        gramam_id: row.get(column("gramam_id").as_str())?,
        vedam_id: row.get(column("vedam_id").as_str())?,
        phone: row.get(column("phone").as_str())?,
        address: row.get(column("address").as_str())?,
        district: row.get(column("district").as_str())?,
        state: row.get(column("state").as_str())?,
        pincode: row.get(column("pincode").as_str())?,
        maps_url: row.get(column("maps_url").as_str())?,
        created_at: row.get(column("created_at").as_str())?,
        updated_at: row.get(column("updated_at").as_str())?,
    })
}

fn parse_namboodiri_record(row: &Row<'_>) -> rusqlite::Result<NamboodiriRecord> {
    Ok(NamboodiriRecord {
        id: row.get("id")?,
        name_en: row.get("name_en")?,
        name_ml: row.get("name_ml")?,
        gothram_id: row.get("gothram_id")?,
        illam_id: row.get("illam_id")?,
        profession_id: row.get("profession_id")?,
        phone: row.get("phone")?,
        email: row.get("email")?,
        address: row.get("address")?,
        district: row.get("district")?,
        state: row.get("state")?,
        pincode: row.get("pincode")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
