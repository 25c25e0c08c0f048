use anyhow::{bail, Context, Result};
use log::info;
use rusqlite::Connection;

/// Schema scripts in order. Entry `n` moves a database from `user_version`
/// `n` to `n + 1`.
const MIGRATIONS: [&str; 2] = [
    include_str!("schemas/schema_v1.sql"),
    include_str!("schemas/schema_v2.sql"),
];

pub fn migrate(conn: &mut Connection) -> Result<()> {
    let stored: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read schema version")?;
    let current = usize::try_from(stored)
        .with_context(|| format!("invalid schema version {stored}"))?;

    if current > MIGRATIONS.len() {
        bail!(
            "workout database schema v{current} is newer than this build supports (v{})",
            MIGRATIONS.len()
        );
    }

    for (index, script) in MIGRATIONS.iter().enumerate().skip(current) {
        let version = index + 1;
        let tx = conn.transaction()?;
        tx.execute_batch(script)
            .with_context(|| format!("failed to apply schema v{version}"))?;
        tx.pragma_update(None, "user_version", i64::try_from(version)?)?;
        tx.commit()
            .with_context(|| format!("failed to commit schema v{version}"))?;
        info!("Workout database upgraded to schema v{version}");
    }

    Ok(())
}
