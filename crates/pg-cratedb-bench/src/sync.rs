//! Manual dual-write synchronization of the `customers` table.
//!
//! Each mutation is applied to PostgreSQL and committed, then replayed
//! against CrateDB. There is no coupling between the two writes: when the
//! CrateDB write fails after PostgreSQL committed, the divergence is recorded
//! in the phase and nothing is compensated or retried.

use std::fmt;

use rand::Rng;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::datagen::{now_utc, Faker};
use crate::engine::Engine;
use crate::error::{BenchError, Result};
use crate::schema;
use crate::value::SqlValue;

pub const UPDATE_STATUSES: &[&str] = &["inactive", "suspended", "active"];

const PG_PICK_RANDOM: &str =
    "SELECT customer_id, name, email, status FROM customers ORDER BY RANDOM() LIMIT 1";
const PG_EMAIL_TAKEN: &str = "SELECT COUNT(*) FROM customers WHERE email = $1";
const PG_UPDATE: &str =
    "UPDATE customers SET name = $1, email = $2, status = $3 WHERE customer_id = $4";
const PG_READ_BACK: &str = "SELECT name, email, status FROM customers WHERE customer_id = $1";
const PG_REGISTRATION_DATE: &str =
    "SELECT registration_date FROM customers WHERE customer_id = $1";
const PG_INSERT: &str = "INSERT INTO customers (customer_id, name, email, registration_date, status) \
                         VALUES ($1, $2, $3, $4, $5)";
const PG_DELETE: &str = "DELETE FROM customers WHERE customer_id = $1";
const PG_COUNT_ID: &str = "SELECT COUNT(*) FROM customers WHERE customer_id = $1";

const CRATE_UPSERT: &str = "INSERT INTO customers (customer_id, name, email, registration_date, status) \
                            VALUES (?, ?, ?, ?, ?) \
                            ON CONFLICT (customer_id) DO UPDATE SET name = ?, email = ?, status = ?";
const CRATE_READ_BACK: &str = "SELECT name, email, status FROM customers WHERE customer_id = ?";
const CRATE_INSERT: &str = "INSERT INTO customers (customer_id, name, email, registration_date, status) \
                            VALUES (?, ?, ?, ?, ?)";
const CRATE_DELETE: &str = "DELETE FROM customers WHERE customer_id = ?";
const CRATE_COUNT_ID: &str = "SELECT COUNT(*) FROM customers WHERE customer_id = ?";

const MAX_ID: &str = "SELECT MAX(customer_id) FROM customers";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOp {
    Update,
    Insert,
    Delete,
}

impl fmt::Display for SyncOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOp::Update => write!(f, "UPDATE"),
            SyncOp::Insert => write!(f, "INSERT"),
            SyncOp::Delete => write!(f, "DELETE"),
        }
    }
}

/// Customer columns compared across engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerState {
    pub name: String,
    pub email: String,
    pub status: String,
}

impl CustomerState {
    fn from_row(row: &[SqlValue]) -> Option<Self> {
        match row {
            [name, email, status, ..] => Some(Self {
                name: name.to_string(),
                email: email.to_string(),
                status: status.to_string(),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for CustomerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Name='{}', Email='{}', Status='{}'",
            self.name, self.email, self.status
        )
    }
}

/// What one engine looks like after a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Observed {
    Row(CustomerState),
    Missing,
    Count(i64),
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observed::Row(state) => write!(f, "{}", state),
            Observed::Missing => write!(f, "<no row>"),
            Observed::Count(n) => write!(f, "count = {}", n),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncPhase {
    pub op: SyncOp,
    pub customer_id: Option<i64>,
    pub before: Option<CustomerState>,
    pub pg_state: Option<Observed>,
    pub crate_state: Option<Observed>,
    pub consistent: bool,
    pub skipped: bool,
    /// CrateDB propagation error, if any.
    pub error: Option<String>,
}

impl SyncPhase {
    fn skipped(op: SyncOp) -> Self {
        Self {
            op,
            customer_id: None,
            before: None,
            pg_state: None,
            crate_state: None,
            consistent: true,
            skipped: true,
            error: None,
        }
    }

    fn finish(
        op: SyncOp,
        customer_id: i64,
        before: Option<CustomerState>,
        pg_state: Observed,
        crate_side: std::result::Result<Observed, String>,
    ) -> Self {
        let (crate_state, error) = match crate_side {
            Ok(state) => (Some(state), None),
            Err(e) => (None, Some(e)),
        };
        let consistent = crate_state.as_ref() == Some(&pg_state);
        Self {
            op,
            customer_id: Some(customer_id),
            before,
            pg_state: Some(pg_state),
            crate_state,
            consistent,
            skipped: false,
            error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub phases: Vec<SyncPhase>,
}

impl SyncReport {
    pub fn is_consistent(&self) -> bool {
        self.phases.iter().all(|p| p.consistent)
    }
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub record_count: i64,
    pub bulk_insert_test_count: i64,
    pub concurrent_insert_count: i64,
    pub unique_email_retries: usize,
    pub seed: Option<u64>,
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            record_count: config.dataset.record_count as i64,
            bulk_insert_test_count: config.sync.bulk_insert_test_count,
            concurrent_insert_count: config.sync.concurrent_insert_count,
            unique_email_retries: config.sync.unique_email_retries,
            seed: config.dataset.seed,
        }
    }

    /// Lowest id the INSERT phase may use before the random offset.
    fn id_floor(&self) -> i64 {
        self.record_count
            .max(self.bulk_insert_test_count)
            .max(self.concurrent_insert_count)
    }
}

/// An email the faker has not issued before and PostgreSQL does not hold.
pub async fn unique_email_for<E: Engine + ?Sized>(
    pg: &E,
    faker: &mut Faker,
    retries: usize,
) -> Result<String> {
    for _ in 0..retries {
        let email = faker.unique_email();
        let taken = pg
            .query(PG_EMAIL_TAKEN, &[SqlValue::text(email.as_str())])
            .await?
            .first_value()
            .and_then(SqlValue::as_i64)
            .unwrap_or(0);
        if taken == 0 {
            return Ok(email);
        }
    }
    Err(BenchError::Sync(format!(
        "Could not generate a unique email after {} attempts",
        retries
    )))
}

async fn read_state<E: Engine + ?Sized>(engine: &E, sql: &str, id: &SqlValue) -> Result<Observed> {
    let result = engine.query(sql, std::slice::from_ref(id)).await?;
    Ok(result
        .first_row()
        .and_then(|r| CustomerState::from_row(r))
        .map(Observed::Row)
        .unwrap_or(Observed::Missing))
}

async fn read_count<E: Engine + ?Sized>(engine: &E, sql: &str, id: &SqlValue) -> Result<Observed> {
    let result = engine.query(sql, std::slice::from_ref(id)).await?;
    Ok(Observed::Count(
        result.first_value().and_then(SqlValue::as_i64).unwrap_or(0),
    ))
}

async fn max_id<E: Engine + ?Sized>(engine: &E) -> Result<i64> {
    Ok(engine
        .query(MAX_ID, &[])
        .await?
        .first_value()
        .and_then(SqlValue::as_i64)
        .unwrap_or(0))
}

/// Replay on CrateDB: write, refresh, read back. Errors become strings.
async fn propagate<C, F>(crate_db: &C, write: F, read: &str, id: &SqlValue, count: bool) -> std::result::Result<Observed, String>
where
    C: Engine + ?Sized,
    F: std::future::Future<Output = Result<u64>>,
{
    let outcome = async {
        write.await?;
        crate_db.refresh(schema::CUSTOMERS).await?;
        if count {
            read_count(crate_db, read, id).await
        } else {
            read_state(crate_db, read, id).await
        }
    }
    .await;

    outcome.map_err(|e| {
        error!("CrateDB propagation FAILED: {}", e);
        e.to_string()
    })
}

fn log_states(phase: &SyncPhase) {
    if let Some(state) = &phase.pg_state {
        info!("    PG Current: {}", state);
    }
    match (&phase.crate_state, &phase.error) {
        (Some(state), _) => info!("    CrateDB Current: {}", state),
        (None, Some(e)) => warn!("    CrateDB diverged from PostgreSQL: {}", e),
        _ => {}
    }
}

async fn sync_update<P, C>(pg: &P, crate_db: &C, faker: &mut Faker, options: &SyncOptions) -> Result<SyncPhase>
where
    P: Engine + ?Sized,
    C: Engine + ?Sized,
{
    info!("--- Demonstrating UPDATE synchronization ---");
    let picked = pg.query(PG_PICK_RANDOM, &[]).await?;
    let Some(row) = picked.first_row().cloned() else {
        info!("No customers found to update. Skipping UPDATE demo.");
        return Ok(SyncPhase::skipped(SyncOp::Update));
    };

    let id = row.first().cloned().unwrap_or(SqlValue::Null);
    let customer_id = id
        .as_i64()
        .ok_or_else(|| BenchError::Sync(format!("unexpected customer_id value {}", id)))?;
    let before = row.get(1..).and_then(CustomerState::from_row);

    let new_name = format!("SYNCED {} {}", faker.first_name(), faker.last_name());
    let new_email = unique_email_for(pg, faker, options.unique_email_retries).await?;
    let new_status = faker.choice(UPDATE_STATUSES).to_string();

    info!("Attempting to update customer_id {}:", customer_id);
    if let Some(b) = &before {
        info!("    PG Original: {}", b);
    }

    let name = SqlValue::Text(new_name);
    let email = SqlValue::Text(new_email);
    let status = SqlValue::Text(new_status);

    pg.execute(
        PG_UPDATE,
        &[name.clone(), email.clone(), status.clone(), id.clone()],
    )
    .await?;
    info!("PostgreSQL updated successfully.");
    let pg_state = read_state(pg, PG_READ_BACK, &id).await?;

    let registration_date = pg
        .query(PG_REGISTRATION_DATE, std::slice::from_ref(&id))
        .await?
        .first_value()
        .cloned()
        .unwrap_or(SqlValue::Null);

    info!("Propagating update to CrateDB...");
    let params = vec![
        id.clone(),
        name.clone(),
        email.clone(),
        registration_date,
        status.clone(),
        name,
        email,
        status,
    ];
    let crate_side = propagate(
        crate_db,
        crate_db.execute(CRATE_UPSERT, &params),
        CRATE_READ_BACK,
        &id,
        false,
    )
    .await;

    let phase = SyncPhase::finish(SyncOp::Update, customer_id, before, pg_state, crate_side);
    log_states(&phase);
    Ok(phase)
}

async fn sync_insert<P, C>(
    pg: &P,
    crate_db: &C,
    faker: &mut Faker,
    options: &SyncOptions,
) -> Result<(SyncPhase, SqlValue)>
where
    P: Engine + ?Sized,
    C: Engine + ?Sized,
{
    info!("--- Demonstrating INSERT synchronization ---");
    let max_pg = max_id(pg).await?;
    let max_crate = match max_id(crate_db).await {
        Ok(max) => max,
        Err(e) => {
            warn!("Could not read MAX(customer_id) from CrateDB: {}", e);
            0
        }
    };

    let base = max_pg.max(max_crate).max(options.id_floor());
    let new_id = base + 1 + faker.rng().gen_range(1..=1000);
    let id = i32::try_from(new_id)
        .map(SqlValue::Int)
        .map_err(|_| BenchError::Sync(format!("customer_id {} exceeds INTEGER range", new_id)))?;

    let name = SqlValue::Text(format!("NEW {} {}", faker.first_name(), faker.last_name()));
    let email = SqlValue::Text(unique_email_for(pg, faker, options.unique_email_retries).await?);
    let params = vec![
        id.clone(),
        name,
        email,
        SqlValue::Timestamp(now_utc()),
        SqlValue::text("pending"),
    ];

    info!("Inserting new customer_id {} into PostgreSQL...", new_id);
    pg.execute(PG_INSERT, &params).await?;
    info!("PostgreSQL insert successful.");
    let pg_state = read_state(pg, PG_READ_BACK, &id).await?;

    info!("Propagating new customer to CrateDB...");
    let crate_side = propagate(
        crate_db,
        crate_db.execute(CRATE_INSERT, &params),
        CRATE_READ_BACK,
        &id,
        false,
    )
    .await;

    let phase = SyncPhase::finish(SyncOp::Insert, new_id, None, pg_state, crate_side);
    log_states(&phase);
    Ok((phase, id))
}

async fn sync_delete<P, C>(pg: &P, crate_db: &C, id: &SqlValue) -> Result<SyncPhase>
where
    P: Engine + ?Sized,
    C: Engine + ?Sized,
{
    info!("--- Demonstrating DELETE synchronization (cleaning up new customer) ---");
    let customer_id = id.as_i64().unwrap_or_default();

    info!("Deleting customer_id {} from PostgreSQL...", customer_id);
    pg.execute(PG_DELETE, std::slice::from_ref(id)).await?;
    info!("PostgreSQL delete successful.");
    let pg_state = read_count(pg, PG_COUNT_ID, id).await?;

    info!("Propagating delete to CrateDB...");
    let crate_side = propagate(
        crate_db,
        crate_db.execute(CRATE_DELETE, std::slice::from_ref(id)),
        CRATE_COUNT_ID,
        id,
        true,
    )
    .await;

    let phase = SyncPhase::finish(SyncOp::Delete, customer_id, None, pg_state, crate_side);
    log_states(&phase);
    Ok(phase)
}

/// Run the UPDATE, INSERT and DELETE demonstrations in order.
pub async fn run_sync<P, C>(pg: &P, crate_db: &C, options: &SyncOptions) -> Result<SyncReport>
where
    P: Engine + ?Sized,
    C: Engine + ?Sized,
{
    info!("Starting data synchronization demo (customers table)");
    let mut faker = Faker::with_seed(options.seed.map(|s| s.wrapping_add(2)));

    let update = sync_update(pg, crate_db, &mut faker, options).await?;
    let (insert, new_id) = sync_insert(pg, crate_db, &mut faker, options).await?;
    let delete = sync_delete(pg, crate_db, &new_id).await?;

    let report = SyncReport {
        phases: vec![update, insert, delete],
    };
    if report.is_consistent() {
        info!("All data synchronization demos complete");
    } else {
        warn!("Synchronization finished with diverging engines");
    }
    Ok(report)
}
