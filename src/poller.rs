use crate::prelude::*;
use crate::decoder;
use crate::register::Registry;
use crate::transport::RegisterTransport;

/// Largest block a single Modbus "read holding registers" request may ask for.
pub const MAX_BLOCK: u16 = 125;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadStrategy {
    /// One transaction per register. Robust against holes in the map.
    #[default]
    PerRegister,
    /// One transaction per run of consecutive addresses, falling back to
    /// per-register reads for a run whose block read fails.
    Contiguous,
}

/// Drives one read cycle against a transport.
pub struct Poller<T: RegisterTransport> {
    registry: Arc<Registry>,
    transport: T,
    strategy: ReadStrategy,
}

impl<T: RegisterTransport> Poller<T> {
    pub fn new(registry: Arc<Registry>, transport: T) -> Self {
        Self {
            registry,
            transport,
            strategy: ReadStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: ReadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Reads one register. Per-register failures come back as a sample
    /// with no value; only a lost connection is an error.
    pub async fn read_one(&mut self, address: u16) -> Result<RawSample, PollError> {
        match self.transport.read_block(address, 1).await {
            Ok(registers) => match registers.first() {
                Some(&raw) => Ok(RawSample::ok(address, raw)),
                None => {
                    warn!("empty reply reading {}", address);
                    Ok(RawSample::failed(address))
                }
            },
            Err(e) if e.is_fatal() => Err(PollError::Fatal(e)),
            Err(e) => {
                warn!("error reading address {}: {}", address, e);
                Ok(RawSample::failed(address))
            }
        }
    }

    /// Output has the same length and order as `addresses`, whatever fails.
    pub async fn read_many(&mut self, addresses: &[u16]) -> Result<Vec<RawSample>, PollError> {
        let samples = match self.strategy {
            ReadStrategy::PerRegister => self.read_each(addresses).await?,
            ReadStrategy::Contiguous => self.read_runs(addresses).await?,
        };

        debug!(
            "read {} addresses, {} failed",
            samples.len(),
            samples.iter().filter(|s| s.raw_value.is_none()).count()
        );
        Ok(samples)
    }

    pub async fn poll_all(&mut self) -> Result<Snapshot, PollError> {
        let taken_at = Utc::now();
        let addresses = self.registry.all_addresses();
        let samples = self.read_many(&addresses).await?;
        Ok(decoder::samples_to_snapshot(&self.registry, &samples, taken_at)?)
    }

    /// Polls a caller-chosen subset by parameter name.
    pub async fn poll_names(&mut self, names: &[&str]) -> Result<Snapshot, PollError> {
        let taken_at = Utc::now();
        let addresses = names
            .iter()
            .map(|n| self.registry.address_of(n))
            .collect::<Result<Vec<_>, _>>()
            .map_err(DecodeError::from)?;
        let samples = self.read_many(&addresses).await?;
        Ok(decoder::samples_to_snapshot(&self.registry, &samples, taken_at)?)
    }

    pub async fn close(&mut self) {
        self.transport.close().await
    }

    async fn read_each(&mut self, addresses: &[u16]) -> Result<Vec<RawSample>, PollError> {
        let mut samples = Vec::with_capacity(addresses.len());
        for &address in addresses {
            samples.push(self.read_one(address).await?);
        }
        Ok(samples)
    }

    async fn read_runs(&mut self, addresses: &[u16]) -> Result<Vec<RawSample>, PollError> {
        let mut samples = Vec::with_capacity(addresses.len());

        for run in contiguous_runs(addresses, MAX_BLOCK) {
            let start = run[0];
            let count = run.len() as u16;

            match self.transport.read_block(start, count).await {
                Ok(registers) if registers.len() >= run.len() => {
                    samples.extend(
                        run.iter()
                            .zip(registers)
                            .map(|(&address, raw)| RawSample::ok(address, raw)),
                    );
                }
                Err(e) if e.is_fatal() => return Err(PollError::Fatal(e)),
                other => {
                    if let Err(e) = other {
                        debug!("block read {} (+{}) failed: {}, reading singly", start, count, e);
                    }
                    samples.extend(self.read_each(run).await?);
                }
            }
        }

        Ok(samples)
    }
}

/// Splits `addresses` into maximal runs of consecutive values, each at most
/// `max_len` long. Order is preserved, so concatenating the runs gives the
/// input back.
pub fn contiguous_runs(addresses: &[u16], max_len: u16) -> Vec<&[u16]> {
    let mut runs = Vec::new();
    let mut start = 0;

    for i in 1..=addresses.len() {
        let split = i == addresses.len()
            || addresses[i] != addresses[i - 1].wrapping_add(1)
            || i - start >= max_len as usize;
        if split {
            runs.push(&addresses[start..i]);
            start = i;
        }
    }

    runs
}
