//! Embedded SQLite handle for relgraph.
//!
// The driver talks to libsqlite3 directly
#![allow(unsafe_code)]
//!
//! Implements the `Connection` and `TransactionOps` traits from relgraph-core
//! over the bundled SQLite library. Statements execute synchronously under
//! the handle's mutex, so the returned futures are ready on first poll.
//!
//! ```rust,ignore
//! use relgraph_core::{Connection, Cx, Value};
//! use relgraph_sqlite::SqliteConnection;
//!
//! let conn = SqliteConnection::open_memory()?;
//! conn.execute_raw("CREATE TABLE tag (code TEXT PRIMARY KEY)")?;
//!
//! let cx = Cx::for_testing();
//! conn.execute(&cx, "INSERT INTO tag (code) VALUES (?)", &[Value::from("rust")]).await;
//! ```
//!
//! # Type Mapping
//!
//! | Value | SQLite storage class |
//! |-------|----------------------|
//! | `Bool`, `TinyInt`, `SmallInt`, `Int`, `BigInt` | INTEGER |
//! | `Float`, `Double` | REAL |
//! | `Text`, `Json` | TEXT |
//! | `Bytes` | BLOB |
//! | `Null` | NULL |

pub mod connection;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection, SqliteTransaction};

use libsqlite3_sys as ffi;
use std::ffi::CStr;

/// Version string of the linked SQLite library.
pub fn sqlite_version() -> &'static str {
    // SAFETY: sqlite3_libversion returns a static NUL-terminated string
    unsafe { CStr::from_ptr(ffi::sqlite3_libversion()) }
        .to_str()
        .unwrap_or("unknown")
}

/// Version number of the linked SQLite library, e.g. 3045000.
pub fn sqlite_version_number() -> i32 {
    // SAFETY: no preconditions
    unsafe { ffi::sqlite3_libversion_number() }
}
