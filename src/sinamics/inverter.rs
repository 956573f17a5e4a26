use crate::prelude::*;
use crate::sinamics::ADDRESS_MIN;
use crate::transport::RegisterTransport;

use {
    async_trait::async_trait,
    std::io::ErrorKind,
    tokio_modbus::client::{Client, Context, Reader},
    tokio_modbus::Slave,
    tokio_serial::{ClearBuffer, DataBits, Parity, SerialPort, SerialStream, StopBits},
};

/// Converts a 4xxxx register number into the zero-based offset that goes
/// on the wire (40001 -> 0).
pub fn protocol_offset(address: u16) -> Result<u16, TransportError> {
    address
        .checked_sub(ADDRESS_MIN)
        .ok_or(TransportError::InvalidAddress(address))
}

/// Modbus RTU link to one V20 on a serial line.
pub struct ModbusRtu {
    settings: config::Modbus,
    ctx: Option<Context>,
}

impl ModbusRtu {
    pub fn new(settings: config::Modbus) -> Self {
        Self {
            settings,
            ctx: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.ctx.is_some()
    }

    fn builder(&self) -> Result<tokio_serial::SerialPortBuilder> {
        let s = &self.settings;

        let parity = match s.parity() {
            'N' => Parity::None,
            'E' => Parity::Even,
            'O' => Parity::Odd,
            other => bail!("unsupported parity {}", other),
        };
        let stop_bits = match s.stopbits() {
            1 => StopBits::One,
            2 => StopBits::Two,
            other => bail!("unsupported stop bits {}", other),
        };
        let data_bits = match s.bytesize() {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            8 => DataBits::Eight,
            other => bail!("unsupported byte size {}", other),
        };

        Ok(tokio_serial::new(s.port(), s.baudrate())
            .parity(parity)
            .stop_bits(stop_bits)
            .data_bits(data_bits)
            .timeout(s.timeout()))
    }

    /// Opens the port with its input buffer cleared and attaches an RTU
    /// client to it.
    fn open(&self) -> Result<Context> {
        let builder = self
            .builder()
            .map_err(|e| anyhow!("invalid serial settings for {}: {}", self.settings.port(), e))?;

        let stream = SerialStream::open(&builder)
            .map_err(|e| anyhow!("failed to open {}: {}", self.settings.port(), e))?;
        if let Err(e) = stream.clear(ClearBuffer::Input) {
            warn!("cannot clear input buffer on {}: {}", self.settings.port(), e);
        }

        let slave = Slave(self.settings.slave_id());
        Ok(tokio_modbus::client::rtu::attach_slave(stream, slave))
    }

    /// RTU frames carry no transaction id, so a reply arriving after its
    /// request timed out would be taken as the answer to the next request.
    /// Drop the context and start over on a fresh port; if that fails the
    /// link counts as lost.
    fn resync(&mut self) {
        self.ctx = None;
        match self.open() {
            Ok(ctx) => {
                debug!("reopened {} after timeout", self.settings.port());
                self.ctx = Some(ctx);
            }
            Err(e) => error!("{}", e),
        }
    }
}

fn classify_io(err: &std::io::Error) -> TransportError {
    match err.kind() {
        ErrorKind::NotConnected
        | ErrorKind::BrokenPipe
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted => TransportError::NotConnected,
        ErrorKind::TimedOut => TransportError::Timeout,
        _ => TransportError::Io(err.to_string()),
    }
}

#[async_trait]
impl RegisterTransport for ModbusRtu {
    async fn connect(&mut self) -> Result<bool, TransportError> {
        info!(
            "opening {} at {} baud, slave {}",
            self.settings.port(),
            self.settings.baudrate(),
            self.settings.slave_id()
        );

        match self.open() {
            Ok(ctx) => {
                self.ctx = Some(ctx);
                info!("connected to modbus device on {}", self.settings.port());
                Ok(true)
            }
            Err(e) => {
                error!("{}", e);
                Ok(false)
            }
        }
    }

    async fn read_block(&mut self, address: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        let timeout = self.settings.timeout();
        let offset = protocol_offset(address)?;
        let ctx = self.ctx.as_mut().ok_or(TransportError::NotConnected)?;

        let result = tokio::time::timeout(timeout, ctx.read_holding_registers(offset, count)).await;
        match result {
            Err(_) => {
                self.resync();
                Err(TransportError::Timeout)
            }
            Ok(Err(tokio_modbus::Error::Transport(e))) => Err(classify_io(&e)),
            Ok(Err(e)) => Err(TransportError::Protocol(e.to_string())),
            Ok(Ok(Err(exception))) => Err(TransportError::Exception(format!("{:?}", exception))),
            Ok(Ok(Ok(registers))) => {
                if registers.len() < count as usize {
                    return Err(TransportError::ShortRead {
                        expected: count,
                        got: registers.len(),
                    });
                }
                debug!("read {:?} from {} (+{})", registers, address, count);
                Ok(registers)
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut ctx) = self.ctx.take() {
            if let Err(e) = ctx.disconnect().await {
                warn!("error disconnecting from {}: {}", self.settings.port(), e);
            }
            info!("disconnected from modbus device on {}", self.settings.port());
        }
    }
}
