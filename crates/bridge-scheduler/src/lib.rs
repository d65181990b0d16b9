//! `bridge-scheduler` — the Cron Service.
//!
//! | Kind    | Behaviour                                             |
//! |---------|--------------------------------------------------------|
//! | `at`    | single fire at an absolute UTC instant                |
//! | `every` | repeat every N milliseconds                           |
//! | `cron`  | 5-field cron expression (`*`, `N`, `*/N`, `a-b`, `a,b,c`) |

pub mod cron_expr;
pub mod engine;
pub mod error;
pub mod run_log;
pub mod schedule;
pub mod store;
pub mod types;

pub use cron_expr::CronExpr;
pub use engine::CronEngine;
pub use error::{Result, SchedulerError};
pub use run_log::CronRunLog;
pub use schedule::{compute_next_run, format_schedule, parse_schedule_arg};
pub use store::CronStore;
pub use types::{CronDocument, CronEvent, CronJob, CronRunRecord, LastStatus, RunStatus, Schedule, SessionTarget, WakeMode};
