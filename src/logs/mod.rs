//! Service output logs

mod history;
mod sink;

pub use history::{latest_log_path, read_latest_log, service_logs};
pub use sink::{log_file_name, open_wrapper_log, LogSink, FILE_TIMESTAMP_FORMAT};
