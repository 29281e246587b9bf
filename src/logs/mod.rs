// Logs module - Logger registry, pipelines and the std log bridge

mod logger;
mod manager;
mod record;
mod stdlog;

pub use logger::{Logger, Pipeline, Sink, FALLBACK_APPENDER};
pub use manager::{ContentInitPolicy, Manager, ManagerOptions, Phase};
pub use record::Record;
pub use stdlog::{is_redirected as std_log_redirected, StdLogRedirect, STD_LOG_LOGGER};
