use anyhow::{Context, Result, bail};

/// On macOS the callout device (`/dev/cu.*`) must be used instead of `/dev/tty.*`,
/// otherwise opening the port blocks waiting for carrier detect.
pub fn normalize_port_name(port_name: &str) -> String {
    #[cfg(target_os = "macos")]
    {
        if let Some(rest) = port_name.strip_prefix("/dev/tty.") {
            return format!("/dev/cu.{}", rest);
        }
    }
    port_name.to_string()
}

/// Names of the serial ports the OS currently reports.
pub fn available_port_names() -> Result<Vec<String>> {
    let ports = serialport::available_ports().context("Failed to get available ports list")?;
    Ok(ports
        .into_iter()
        .map(|p| p.port_name)
        .filter(|name| !cfg!(target_os = "macos") || !name.starts_with("/dev/tty."))
        .collect())
}

/// Fails with a message listing the alternatives when `port_name` is unknown.
///
/// Callers treat this as a warning: a board already sitting in its
/// bootloader has no serial port at all.
pub fn check_port_available(port_name: &str) -> Result<()> {
    let ports = available_port_names()?;
    if ports.iter().any(|p| p == port_name) {
        return Ok(());
    }
    let alternatives = if ports.is_empty() {
        "No available ports".to_string()
    } else {
        ports.join(", ")
    };
    bail!(
        "Serial port '{}' was not found. Available ports: {}",
        port_name,
        alternatives
    )
}
