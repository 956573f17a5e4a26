use crate::prelude::*;

use async_trait::async_trait;

/// The fieldbus seen from the poller: connect, read a block of holding
/// registers by 4xxxx address, close. Framing, CRC and per-call timeouts
/// belong to the implementation.
#[async_trait]
pub trait RegisterTransport: Send {
    /// `Ok(false)` means the port opened nothing usable; errors are reserved
    /// for conditions worth reporting verbatim.
    async fn connect(&mut self) -> Result<bool, TransportError>;

    async fn read_block(&mut self, address: u16, count: u16) -> Result<Vec<u16>, TransportError>;

    async fn close(&mut self);
}

#[async_trait]
impl<T: RegisterTransport + ?Sized> RegisterTransport for Box<T> {
    async fn connect(&mut self) -> Result<bool, TransportError> {
        (**self).connect().await
    }

    async fn read_block(&mut self, address: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        (**self).read_block(address, count).await
    }

    async fn close(&mut self) {
        (**self).close().await
    }
}

/// Calls `connect()` up to `attempts` times, doubling the delay between
/// tries. A single attempt reproduces the plain connect-or-exit behaviour.
pub async fn connect_with_retry<T: RegisterTransport + ?Sized>(
    transport: &mut T,
    attempts: u32,
    initial_backoff: std::time::Duration,
) -> Result<(), TransportError> {
    let mut backoff = initial_backoff;
    let mut last_error = TransportError::NotConnected;

    for attempt in 1..=attempts.max(1) {
        match transport.connect().await {
            Ok(true) => return Ok(()),
            Ok(false) => {
                warn!("connect attempt {} of {} failed", attempt, attempts);
                last_error = TransportError::NotConnected;
            }
            Err(e) => {
                warn!("connect attempt {} of {} failed: {}", attempt, attempts, e);
                last_error = e;
            }
        }

        if attempt < attempts {
            info!("retrying connect in {:?}", backoff);
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }

    Err(last_error)
}
