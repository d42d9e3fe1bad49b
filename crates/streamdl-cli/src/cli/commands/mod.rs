//! CLI command handlers. Each command is in its own file.

mod add;
mod cancel;
mod clear_completed;
mod completions;
mod logs;
mod pause;
mod remove;
mod resume;
mod retry;
mod serve;
mod status;

pub use add::{run_add, AddArgs};
pub use cancel::run_cancel;
pub use clear_completed::run_clear_completed;
pub use completions::{run_completions, run_man};
pub use logs::run_logs;
pub use pause::run_pause;
pub use remove::run_remove;
pub use resume::run_resume;
pub use retry::run_retry;
pub use serve::run_serve;
pub use status::run_status;
