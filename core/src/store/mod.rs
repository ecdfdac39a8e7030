//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! The service calls store methods and never executes SQL itself.

mod holder;
mod stats;
mod user;

pub use stats::{DistributionColumn, InsightWindows, MetricsRow};
pub use user::UserRow;

use crate::{error::HolderResult, holder::InsuranceHolder};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{functions::FunctionFlags, Connection, Row};

/// SQL function lowercasing the full Unicode range. SQLite's own `lower()`
/// and `LIKE` only fold ASCII.
pub const UNICODE_LOWER_FN: &str = "unicode_lower";

/// A checked-out connection. Returns to its pool on drop.
pub struct HolderStore {
    conn: PooledConnection<SqliteConnectionManager>,
}

impl HolderStore {
    pub(crate) fn new(conn: PooledConnection<SqliteConnectionManager>) -> Self {
        Self { conn }
    }

    /// A migrated private in-memory database (used in unit tests).
    pub fn in_memory() -> HolderResult<Self> {
        crate::pool::StorePool::in_memory()?.acquire()
    }

    /// Cheap liveness probe.
    pub fn ping(&self) -> HolderResult<()> {
        self.conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    /// Raw statements, for tests that break the schema on purpose.
    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> HolderResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

/// Per-connection setup, run by the pool on every new connection:
/// pragmas, the Unicode lowercase function, then all migrations in order.
pub(crate) fn prepare_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    // WAL only applies to real files; memory databases report "memory".
    let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
    conn.execute_batch("PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;")?;
    conn.create_scalar_function(
        UNICODE_LOWER_FN,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
    )?;
    migrate(conn)
}

/// Apply all schema migrations in order. Every statement is idempotent.
fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(include_str!("../../../migrations/001_insurance_holders.sql"))?;
    conn.execute_batch(include_str!("../../../migrations/002_users.sql"))?;
    conn.execute_batch(include_str!("../../../migrations/003_patients.sql"))?;
    Ok(())
}

/// Holder columns in the order `holder_from_row` reads them.
pub(crate) const HOLDER_COLUMNS: &str = "id, ci, name, phone, otherPhone, fixedPhone, email,
    birthDate, age, gender, address, city, state, clientId, insuranceCompany,
    policyNumber, policyType, policyStatus, policyStartDate, policyEndDate,
    coverageType, maxCoverageAmount, usedCoverageAmount, emergencyContact,
    emergencyPhone, bloodType, allergies, medicalHistory, isActive, created_at,
    updated_at,
    (SELECT COUNT(*) FROM holder_patient_relationships r
      WHERE r.holderId = insurance_holders.id) AS totalPatients";

pub(crate) fn holder_from_row(row: &Row<'_>) -> rusqlite::Result<InsuranceHolder> {
    Ok(InsuranceHolder {
        id: row.get(0)?,
        ci: row.get(1)?,
        name: row.get(2)?,
        phone: row.get(3)?,
        other_phone: row.get(4)?,
        fixed_phone: row.get(5)?,
        email: row.get(6)?,
        birth_date: row.get(7)?,
        age: row.get(8)?,
        gender: row.get(9)?,
        address: row.get(10)?,
        city: row.get(11)?,
        state: row.get(12)?,
        client_id: row.get(13)?,
        insurance_company: row.get(14)?,
        policy_number: row.get(15)?,
        policy_type: row.get(16)?,
        policy_status: row.get(17)?,
        policy_start_date: row.get(18)?,
        policy_end_date: row.get(19)?,
        coverage_type: row.get(20)?,
        max_coverage_amount: row.get(21)?,
        used_coverage_amount: row.get::<_, Option<f64>>(22)?.unwrap_or(0.0),
        emergency_contact: row.get(23)?,
        emergency_phone: row.get(24)?,
        blood_type: row.get(25)?,
        allergies: row.get(26)?,
        medical_history: row.get(27)?,
        is_active: row.get::<_, i64>(28)? != 0,
        created_at: row.get(29)?,
        updated_at: row.get(30)?,
        total_patients: Some(row.get(31)?),
        total_cases: None,
        patients: None,
    })
}
