//! Local socket discovery
//!
//! When the target is localhost, ask `my_print_defaults` for the server's
//! socket path. Any failure falls back to host/port without complaint.

use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Server option files, checked in order
pub const MY_CNF_LOCATIONS: &[&str] = &[
    "/etc/my.cnf",
    "/etc/mysql/my.cnf",
    "/etc/mysql/conf.d/my.cnf",
];

const MY_PRINT_DEFAULTS: &str = "my_print_defaults";

fn find_my_cnf(candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(Path::new)
        .find(|path| path.is_file())
        .map(Path::to_path_buf)
}

/// Pull `--<option>=value` out of `my_print_defaults` output
pub fn parse_defaults_option(output: &str, option: &str) -> Option<String> {
    let flag = format!("--{}", option);
    output
        .lines()
        .filter_map(|line| line.trim().split_once('='))
        .find(|(name, _)| *name == flag)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Resolve the local server socket, if one can be found
pub async fn resolve_local_socket() -> Option<PathBuf> {
    let my_cnf = find_my_cnf(MY_CNF_LOCATIONS)?;

    let output = match Command::new(MY_PRINT_DEFAULTS)
        .arg("--defaults-file")
        .arg(&my_cnf)
        .arg("mysqld")
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) => {
            debug!(error = %e, "Could not run my_print_defaults");
            return None;
        }
    };

    if !output.status.success() {
        debug!(
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "my_print_defaults failed"
        );
        return None;
    }

    let socket = parse_defaults_option(&String::from_utf8_lossy(&output.stdout), "socket")?;
    debug!(socket = %socket, my_cnf = %my_cnf.display(), "Found local socket");
    Some(PathBuf::from(socket))
}
