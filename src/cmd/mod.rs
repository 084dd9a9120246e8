//! CLI command implementations.
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `view`   | `View`           |
//! | `config` | `Config`         |

pub mod config;
pub mod view;

pub use config::cmd_config;
pub use view::{ViewArgs, cmd_view};
