//! SQLite store for elite boards and physics telemetry.
//!
//! Two logical tables: an append-only `best_boards` table shared by every
//! run, and one `physics_logs_<timestamp>_t<thread>` table per worker per
//! run. The store is write-seldom: a single mutex-guarded connection is
//! plenty, and any persistence failure is reported to the caller, who
//! logs it and keeps searching.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Result};

use crate::board::{parse_board, serialize_board, Board};
use crate::constants::{OPERATOR_SLOTS, SOLVER_VERSION};
use crate::physics::PhysicsLogRecord;

/// Default database path, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "db/optimizer.db";

/// One elite board drawn from the store.
#[derive(Debug, Clone)]
pub struct EliteBoard {
    pub lineage_id: i32,
    pub board: Board,
    pub initial_temp: f64,
}

/// Timestamped prefix for this run's telemetry tables.
pub fn log_table_prefix() -> String {
    chrono::Local::now()
        .format("physics_logs_%Y%m%d_%H%M%S")
        .to_string()
}

/// Open (creating if needed) the database and the `best_boards` table.
///
/// WAL mode plus a busy timeout keeps concurrent worker writes from
/// failing with "database is locked".
pub fn init_database(path: &str) -> Result<Arc<Mutex<Connection>>> {
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let conn = Connection::open(path)?;

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = 30000;",
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS best_boards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lineage_id INTEGER,
            initial_temp REAL,
            score INTEGER,
            board_data TEXT,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            solver_version TEXT DEFAULT '1.0'
        )",
        [],
    )?;

    Ok(Arc::new(Mutex::new(conn)))
}

/// Create this run's per-thread telemetry tables.
pub fn create_physics_log_tables(
    conn: &Connection,
    prefix: &str,
    num_threads: usize,
) -> Result<()> {
    for t in 0..num_threads {
        let mut op_cols = String::new();
        for i in 0..OPERATOR_SLOTS {
            op_cols.push_str(&format!(", p{i} REAL, ar{i} REAL, de{i} REAL"));
        }
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {prefix}_t{t} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_id INTEGER,
                lineage_id INTEGER,
                cycle_num INTEGER,
                iteration INTEGER,
                temp REAL,
                overall_ar REAL,
                bad_ar REAL,
                energy_stddev REAL,
                avg_bad_prop_delta REAL,
                avg_bad_acc_delta REAL,
                score INTEGER{op_cols},
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
            )"
        );
        conn.execute(&sql, [])?;
    }
    Ok(())
}

/// Append one elite board.
pub fn save_best_board(
    conn: &Connection,
    lineage_id: i32,
    initial_temp: f64,
    score: i64,
    board: &Board,
) -> Result<()> {
    conn.execute(
        "INSERT INTO best_boards (lineage_id, initial_temp, score, board_data, solver_version)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![lineage_id, initial_temp, score, serialize_board(board), SOLVER_VERSION],
    )?;
    Ok(())
}

/// Fetch the top 100 boards by score and sample `count` of them without
/// replacement, rank `i` weighted `1/(i+1)`. Asking for at least as many
/// boards as there are candidates returns all of them.
pub fn load_random_elites(conn: &Connection, count: usize) -> Result<Vec<EliteBoard>> {
    let mut stmt = conn.prepare(
        "SELECT board_data, lineage_id, initial_temp
         FROM best_boards ORDER BY score DESC LIMIT 100",
    )?;

    let mut candidates: Vec<EliteBoard> = stmt
        .query_map([], |row| {
            let board_data: String = row.get(0)?;
            Ok(EliteBoard {
                lineage_id: row.get(1)?,
                board: parse_board(&board_data),
                initial_temp: row.get(2)?,
            })
        })?
        .collect::<Result<_>>()?;

    if candidates.is_empty() || count >= candidates.len() {
        return Ok(candidates);
    }

    use rand::Rng;
    let mut rng = rand::thread_rng();
    let mut weights: Vec<f64> = (0..candidates.len()).map(|i| 1.0 / (i as f64 + 1.0)).collect();
    let mut results = Vec::with_capacity(count);

    for _ in 0..count {
        let total: f64 = weights.iter().sum();
        let mut choice = rng.gen::<f64>() * total;
        let mut picked = candidates.len() - 1;
        for (i, &w) in weights.iter().enumerate() {
            choice -= w;
            if choice <= 0.0 {
                picked = i;
                break;
            }
        }
        results.push(candidates.remove(picked));
        weights.remove(picked);
    }

    Ok(results)
}

/// Insert a batch of telemetry records inside one transaction.
pub fn save_physics_log_batch(
    conn: &mut Connection,
    prefix: &str,
    records: &[PhysicsLogRecord],
) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }

    let mut placeholders = String::new();
    let mut op_cols = String::new();
    for i in 0..OPERATOR_SLOTS {
        op_cols.push_str(&format!(", p{i}, ar{i}, de{i}"));
        placeholders.push_str(", ?, ?, ?");
    }

    let tx = conn.transaction()?;
    for rec in records {
        let sql = format!(
            "INSERT INTO {prefix}_t{} (thread_id, lineage_id, cycle_num, iteration, temp,
                overall_ar, bad_ar, energy_stddev, avg_bad_prop_delta, avg_bad_acc_delta,
                score{op_cols})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?{placeholders})",
            rec.thread_id
        );

        let mut values: Vec<Value> = vec![
            Value::Integer(rec.thread_id as i64),
            Value::Integer(rec.lineage_id as i64),
            Value::Integer(rec.cycle as i64),
            Value::Integer(rec.iteration as i64),
            Value::Real(rec.temp),
            Value::Real(rec.overall_ar),
            Value::Real(rec.bad_ar),
            Value::Real(rec.energy_stddev),
            Value::Real(rec.avg_bad_prop_delta),
            Value::Real(rec.avg_bad_acc_delta),
            Value::Integer(rec.score),
        ];
        for i in 0..OPERATOR_SLOTS {
            values.push(Value::Real(rec.probs[i]));
            values.push(Value::Real(rec.ars[i]));
            values.push(Value::Real(rec.deltas[i]));
        }

        tx.execute(&sql, params_from_iter(values))?;
    }
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{COLS, ROWS};
    use tempfile::tempdir;

    fn open_test_db() -> (tempfile::TempDir, Arc<Mutex<Connection>>) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let conn = init_database(path.to_str().unwrap()).unwrap();
        (dir, conn)
    }

    fn board_of(fill: i8) -> Board {
        [[fill; COLS]; ROWS]
    }

    #[test]
    fn best_board_round_trips() {
        let (_dir, conn) = open_test_db();
        let conn = conn.lock().unwrap();

        let mut board = board_of(3);
        board[0][0] = 9;
        save_best_board(&conn, 42, 19.5, 1234, &board).unwrap();

        let elites = load_random_elites(&conn, 10).unwrap();
        assert_eq!(elites.len(), 1);
        assert_eq!(elites[0].lineage_id, 42);
        assert_eq!(elites[0].initial_temp, 19.5);
        assert_eq!(elites[0].board, board);
    }

    #[test]
    fn elites_come_from_the_top_of_the_score_order() {
        let (_dir, conn) = open_test_db();
        let conn = conn.lock().unwrap();

        for score in 0..150i64 {
            save_best_board(&conn, score as i32, 1.0, score, &board_of(1)).unwrap();
        }

        // The top-100 window excludes the 50 lowest scores.
        let elites = load_random_elites(&conn, 200).unwrap();
        assert_eq!(elites.len(), 100);
        assert!(elites.iter().all(|e| e.lineage_id >= 50));
    }

    #[test]
    fn sampled_elites_are_distinct_rows() {
        let (_dir, conn) = open_test_db();
        let conn = conn.lock().unwrap();

        for score in 0..30i64 {
            save_best_board(&conn, score as i32, 1.0, score, &board_of(2)).unwrap();
        }

        let elites = load_random_elites(&conn, 10).unwrap();
        assert_eq!(elites.len(), 10);
        let mut ids: Vec<i32> = elites.iter().map(|e| e.lineage_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 10, "without-replacement sample repeated a row");
    }

    #[test]
    fn physics_batch_inserts_every_record() {
        let (_dir, conn) = open_test_db();
        let mut conn = conn.lock().unwrap();
        create_physics_log_tables(&conn, "physics_logs_test", 2).unwrap();

        let rec = PhysicsLogRecord {
            thread_id: 1,
            lineage_id: 7,
            cycle: 0,
            iteration: 3000,
            temp: 39.23,
            overall_ar: 0.5,
            bad_ar: 0.2,
            energy_stddev: 1.5,
            avg_bad_prop_delta: -2.0,
            avg_bad_acc_delta: -0.5,
            score: 900,
            probs: [0.0; OPERATOR_SLOTS],
            ars: [0.0; OPERATOR_SLOTS],
            deltas: [0.0; OPERATOR_SLOTS],
        };
        save_physics_log_batch(&mut conn, "physics_logs_test", &[rec.clone(), rec]).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM physics_logs_test_t1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);

        let (temp, score): (f64, i64) = conn
            .query_row(
                "SELECT temp, score FROM physics_logs_test_t1 LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(temp, 39.23);
        assert_eq!(score, 900);
    }
}
