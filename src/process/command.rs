//! Building the command line for the supervised process

use crate::config::ServiceConfig;
use crate::logs::LogSink;
use std::process::{Command, Stdio};

/// Split an argument string on whitespace
///
/// There is no quoting: `"a b"` yields two arguments, `"a` and `b"`.
pub fn tokenize_args(args: &str) -> Vec<String> {
    args.split_whitespace().map(str::to_string).collect()
}

/// Command for the configured target with output routed into `sink`
pub(crate) fn build_command(config: &ServiceConfig, sink: &LogSink) -> Command {
    let mut cmd = Command::new(&config.exe_path);
    cmd.args(config.argv())
        .stdin(Stdio::null())
        .stdout(sink.stdio())
        .stderr(sink.stdio());

    let working_dir = config.working_dir();
    if !working_dir.as_os_str().is_empty() {
        cmd.current_dir(working_dir);
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        use windows::Win32::System::Threading::CREATE_NO_WINDOW;

        // Run without a console window
        cmd.creation_flags(CREATE_NO_WINDOW.0);
    }

    cmd
}
