//! Host identity shown in headers and written to the kill log

use super::ProcessListSource;
use crate::config::ConnectionParams;
use tracing::debug;

fn local_hostname() -> Option<String> {
    hostname::get()
        .ok()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}

/// Resolve the host identity once at startup.
///
/// Local targets use this machine's hostname, remote ones ask the server.
/// Falls back to the configured host name.
pub async fn resolve_host_identity(
    params: &ConnectionParams,
    source: &mut dyn ProcessListSource,
) -> String {
    let resolved = if params.is_localhost() || params.socket.is_some() {
        local_hostname()
    } else {
        match source.server_hostname().await {
            Ok(name) => name.filter(|n| !n.is_empty()),
            Err(e) => {
                debug!(error = %e, "Could not read @@hostname");
                None
            }
        }
    };

    resolved.unwrap_or_else(|| params.host.clone())
}
