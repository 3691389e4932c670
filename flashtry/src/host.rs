//! Host capability checks and serial port discovery.

/// Serial access available on this host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerialSupport {
    /// Ports the host enumerates right now. May be empty even when a
    /// device node exists, e.g. inside containers without udev.
    pub ports: Vec<String>,
}

/// Check once, before any channel is built, that serial access works.
///
/// Fails with [`Error::Unsupported`](crate::Error::Unsupported) and a
/// remediation hint when the crate was built without the `native` feature.
#[cfg(feature = "native")]
pub fn serial_support() -> crate::Result<SerialSupport> {
    Ok(SerialSupport {
        ports: list_ports(),
    })
}

/// Check once, before any channel is built, that serial access works.
#[cfg(not(feature = "native"))]
pub fn serial_support() -> crate::Result<SerialSupport> {
    Err(crate::Error::Unsupported(
        "serial access is not compiled in; rebuild flashtry with the `native` feature".to_string(),
    ))
}

/// Names of the serial ports the host enumerates.
#[cfg(feature = "native")]
pub fn list_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports
            .into_iter()
            .map(|p| p.port_name)
            .collect(),
        Err(e) => {
            log::debug!("Failed to enumerate serial ports: {e}");
            Vec::new()
        },
    }
}

/// Names of the serial ports the host enumerates.
#[cfg(not(feature = "native"))]
pub fn list_ports() -> Vec<String> {
    Vec::new()
}
