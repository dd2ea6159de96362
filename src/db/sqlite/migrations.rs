//! SQLite database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Create migrations table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_sector_performance", CREATE_SECTOR_PERFORMANCE_TABLE)?;
    run_migration(conn, "002_zt_pool", CREATE_ZT_POOL_TABLE)?;
    run_migration(conn, "003_dt_pool", CREATE_DT_POOL_TABLE)?;
    run_migration(conn, "004_zb_pool", CREATE_ZB_POOL_TABLE)?;
    run_migration(conn, "005_index_quotes", CREATE_INDEX_QUOTES_TABLE)?;
    run_migration(conn, "006_job_execution_logs", CREATE_JOB_EXECUTION_LOGS_TABLE)?;
    run_migration(conn, "007_trade_calendar", CREATE_TRADE_CALENDAR_TABLE)?;
    run_migration(conn, "008_sync_jobs", CREATE_SYNC_JOBS_TABLE)?;

    tracing::info!("Database migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    // Check if migration already applied
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
    }

    Ok(())
}

const CREATE_SECTOR_PERFORMANCE_TABLE: &str = r#"
CREATE TABLE sector_performance (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trade_date TEXT NOT NULL,
    board_type TEXT NOT NULL,
    rank INTEGER NOT NULL,
    board_name TEXT NOT NULL,
    board_code TEXT,
    latest_price REAL,
    change_amount REAL,
    change_pct REAL,
    total_market_cap REAL,
    turnover_rate REAL,
    up_count INTEGER,
    down_count INTEGER,
    leading_stock TEXT,
    leading_stock_change_pct REAL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(trade_date, board_type, rank)
);
"#;

const CREATE_ZT_POOL_TABLE: &str = r#"
CREATE TABLE zt_pool (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trade_date TEXT NOT NULL,
    rank INTEGER NOT NULL,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    change_pct REAL,
    latest_price REAL,
    turnover_amount REAL,
    float_market_cap REAL,
    total_market_cap REAL,
    turnover_rate REAL,
    seal_amount REAL,
    first_seal_time TEXT,
    last_seal_time TEXT,
    break_count INTEGER,
    limit_up_stats TEXT,
    consecutive_boards INTEGER,
    industry TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(trade_date, rank)
);

CREATE INDEX idx_zt_pool_code ON zt_pool(code);
"#;

const CREATE_DT_POOL_TABLE: &str = r#"
CREATE TABLE dt_pool (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trade_date TEXT NOT NULL,
    rank INTEGER NOT NULL,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    change_pct REAL,
    latest_price REAL,
    turnover_amount REAL,
    float_market_cap REAL,
    total_market_cap REAL,
    pe_dynamic REAL,
    turnover_rate REAL,
    seal_amount REAL,
    last_seal_time TEXT,
    board_turnover_amount REAL,
    consecutive_limit_downs INTEGER,
    open_count INTEGER,
    industry TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(trade_date, rank)
);

CREATE INDEX idx_dt_pool_code ON dt_pool(code);
"#;

const CREATE_ZB_POOL_TABLE: &str = r#"
CREATE TABLE zb_pool (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trade_date TEXT NOT NULL,
    rank INTEGER NOT NULL,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    change_pct REAL,
    latest_price REAL,
    limit_up_price REAL,
    turnover_amount REAL,
    float_market_cap REAL,
    total_market_cap REAL,
    turnover_rate REAL,
    rise_speed REAL,
    first_seal_time TEXT,
    break_count INTEGER,
    limit_up_stats TEXT,
    amplitude REAL,
    industry TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(trade_date, rank)
);

CREATE INDEX idx_zb_pool_code ON zb_pool(code);
"#;

const CREATE_INDEX_QUOTES_TABLE: &str = r#"
CREATE TABLE index_quotes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trade_date TEXT NOT NULL,
    rank INTEGER NOT NULL,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    latest_price REAL,
    change_pct REAL,
    change_amount REAL,
    volume REAL,
    turnover_amount REAL,
    amplitude REAL,
    high REAL,
    low REAL,
    open REAL,
    prev_close REAL,
    volume_ratio REAL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(trade_date, rank)
);
"#;

/// Append-only ledger, one row per orchestration run
const CREATE_JOB_EXECUTION_LOGS_TABLE: &str = r#"
CREATE TABLE job_execution_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL,
    job_id TEXT NOT NULL,
    execution_date TEXT NOT NULL,
    execution_time TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('success', 'failed', 'skipped')),
    trigger_source TEXT NOT NULL DEFAULT 'scheduled',
    forced INTEGER NOT NULL DEFAULT 0,
    duration_ms INTEGER NOT NULL DEFAULT 0,
    is_trading_day INTEGER NOT NULL DEFAULT 1,
    industry_count INTEGER NOT NULL DEFAULT 0,
    concept_count INTEGER NOT NULL DEFAULT 0,
    zt_pool_count INTEGER NOT NULL DEFAULT 0,
    dt_pool_count INTEGER NOT NULL DEFAULT 0,
    zb_pool_count INTEGER NOT NULL DEFAULT 0,
    index_count INTEGER NOT NULL DEFAULT 0,
    dataset_results TEXT NOT NULL DEFAULT '[]',
    error_message TEXT,
    error_stack TEXT,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_job_execution_logs_job ON job_execution_logs(job_id, execution_date, execution_time);
CREATE INDEX idx_job_execution_logs_date ON job_execution_logs(execution_date, execution_time);
"#;

const CREATE_TRADE_CALENDAR_TABLE: &str = r#"
CREATE TABLE trade_calendar (
    trade_date TEXT PRIMARY KEY,
    fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Job schedules, seeded with the post-close daily sync and the limit-up recheck
const CREATE_SYNC_JOBS_TABLE: &str = r#"
CREATE TABLE sync_jobs (
    job_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    hour INTEGER NOT NULL CHECK (hour BETWEEN 0 AND 23),
    minute INTEGER NOT NULL CHECK (minute BETWEEN 0 AND 59),
    timezone TEXT NOT NULL DEFAULT 'Asia/Shanghai',
    datasets TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

INSERT OR IGNORE INTO sync_jobs (job_id, name, hour, minute, timezone, datasets)
VALUES (
    'daily_snapshot_sync',
    'Daily market snapshot sync',
    15, 10, 'Asia/Shanghai',
    '["industry_sector","concept_sector","zt_pool","dt_pool","zb_pool","index_quote"]'
);

INSERT OR IGNORE INTO sync_jobs (job_id, name, hour, minute, timezone, datasets)
VALUES (
    'zt_pool_recheck',
    'Limit-up pool recheck',
    15, 35, 'Asia/Shanghai',
    '["zt_pool"]'
);
"#;
