use glob::glob;
use std::fs;

/// True when any process (this one included) holds `port_name` open.
pub fn is_port_open(port_name: &str) -> bool {
    let target = fs::canonicalize(port_name).unwrap_or_else(|_| port_name.into());

    let fds = match glob("/proc/[0-9]*/fd/*") {
        Ok(fds) => fds,
        Err(_) => return false,
    };

    fds.filter_map(|p| p.ok())
        .filter_map(|path| fs::read_link(path).ok())
        .any(|link| link == target)
}
