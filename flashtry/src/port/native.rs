//! Native serial channel implementation using the `serialport` crate.

use {
    crate::{
        error::{Error, Result},
        port::{Channel, Connector, SerialConfig},
    },
    log::trace,
    serialport::{DataBits, FlowControl, Parity, StopBits},
    std::io::{ErrorKind, Read, Write},
};

/// Native serial channel, 8N1 without flow control.
pub struct NativeChannel {
    port: Option<Box<dyn serialport::SerialPort>>,
    name: String,
}

impl NativeChannel {
    /// Open a serial channel with the given configuration.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = serialport::new(&config.port_name, config.baud_rate)
            .timeout(config.timeout)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open()
            .map_err(|e| Error::Connection {
                path: config
                    .port_name
                    .clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            port: Some(port),
            name: config
                .port_name
                .clone(),
        })
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| Error::Write(format!("{} is closed", self.name)))
    }
}

impl Channel for NativeChannel {
    fn read_available(&mut self) -> Result<Vec<u8>> {
        let Some(port) = self.port.as_mut() else {
            return Ok(Vec::new());
        };

        let pending = port.bytes_to_read()?;
        if pending == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; pending as usize];
        match port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                trace!("{}: read {n} bytes", self.name);
                Ok(buf)
            },
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.port_mut()?
            .write_all(data)
            .map_err(|e| Error::Write(e.to_string()))
    }

    fn flush(&mut self) -> Result<()> {
        self.port_mut()?
            .flush()
            .map_err(|e| Error::Write(e.to_string()))
    }

    fn close(&mut self) {
        // Dropping the handle closes the port
        if self.port.take().is_some() {
            trace!("Closed {}", self.name);
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Connector opening [`NativeChannel`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeConnector;

impl Connector for NativeConnector {
    type Channel = NativeChannel;

    fn open(&mut self, config: &SerialConfig) -> Result<Self::Channel> {
        NativeChannel::open(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device_is_connection_error() {
        let config = SerialConfig::new("/dev/flashtry-does-not-exist", 115_200);
        match NativeChannel::open(&config) {
            Err(Error::Connection { path, .. }) => {
                assert_eq!(path, "/dev/flashtry-does-not-exist");
            },
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("opening a missing device must fail"),
        }
    }

    #[test]
    fn test_connector_exists_on_missing_path() {
        let connector = NativeConnector;
        assert!(!connector.exists("/dev/flashtry-does-not-exist"));
    }
}
