//! CLI command implementations.
//!
//! | Module   | Commands handled   |
//! |----------|--------------------|
//! | `run`    | `Run`, `Status`    |
//! | `serve`  | `Serve`            |
//! | `config` | `Config`           |

pub mod config;
pub mod run;
pub mod serve;

pub use config::cmd_config;
pub use run::{cmd_run, cmd_status, read_sequence};
pub use serve::cmd_serve;
