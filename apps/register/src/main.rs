//! # Khazna Register Entry Point
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  khazna edit-sale request.json                                          │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  main.rs ────► khazna_register::run(args_os)                            │
//! │                  1. Parse arguments (clap)                              │
//! │                  2. Load RegisterConfig                                 │
//! │                  3. Initialize tracing                                  │
//! │                  4. Open SQLite (WAL) & run migrations                  │
//! │                  5. Dispatch the command                                │
//! │                  6. Print the JSON envelope, exit 0 / 1                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    khazna_register::run(std::env::args_os()).await
}
