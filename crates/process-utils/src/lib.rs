//! External tool execution for the engines.
//!
//! [`tokio_command`] builds a command that does not pop up a console window
//! on Windows and [`run_streaming`] drives it to completion.

use std::ffi::OsStr;

mod runner;

pub use runner::{OutputStream, ProcessOutput, RunError, run_streaming};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// A `tokio::process::Command` for `program` with no console window.
pub fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    #[cfg_attr(not(windows), allow(unused_mut))]
    let mut command = tokio::process::Command::new(program);
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        command.as_std_mut().creation_flags(CREATE_NO_WINDOW);
    }
    command
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_tokio_command_keeps_program() {
        let command = tokio_command("mkvmerge");
        assert_eq!(command.as_std().get_program(), "mkvmerge");
    }
}
