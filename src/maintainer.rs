use crate::prelude::*;
use crate::database::Database;
use crate::register::Registry;
use crate::scheduler;

use serde::Deserialize;
use std::path::Path;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedClass {
    Stopped,
    Slow,
    Normal,
    High,
}

impl SpeedClass {
    pub fn classify(speed: f64) -> Self {
        if speed <= 0.1 {
            SpeedClass::Stopped
        } else if speed <= 7.0 {
            SpeedClass::Slow
        } else if speed <= 13.0 {
            SpeedClass::Normal
        } else {
            SpeedClass::High
        }
    }

    pub fn is_alarm(&self) -> bool {
        matches!(self, SpeedClass::Slow | SpeedClass::High)
    }
}

impl std::fmt::Display for SpeedClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeedClass::Stopped => write!(f, "MOTOR STOPPED"),
            SpeedClass::Slow => write!(f, "speed too low"),
            SpeedClass::Normal => write!(f, "speed normal"),
            SpeedClass::High => write!(f, "speed too high"),
        }
    }
}

/// Anything that turns one row of features into a single estimate.
pub trait Predictor: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<f64>;
}

/// `intercept + sum(coefficients[i] * features[i])`, loaded from JSON.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| file_error!("cannot read model {}: {}", path.display(), err))?;
        let model: Self = serde_json::from_str(&content)?;
        info!(
            "loaded linear model from {} ({} coefficients)",
            path.display(),
            model.coefficients.len()
        );
        Ok(model)
    }
}

impl Predictor for LinearModel {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.coefficients.len() {
            bail!(
                "model expects {} features, got {}",
                self.coefficients.len(),
                features.len()
            );
        }
        Ok(self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(c, x)| c * x)
                .sum::<f64>())
    }
}

/// What one maintenance pass concluded.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub speed: Option<f64>,
    pub class: Option<SpeedClass>,
    pub prediction: Option<f64>,
}

/// Watches the stored latest values and reports on motor speed.
pub struct Maintainer {
    config: config::Maintainer,
    registry: Arc<Registry>,
    database: Database,
    predictor: Option<Box<dyn Predictor>>,
    max_cycles: Option<u64>,
    shutdown_rx: Option<broadcast::Receiver<()>>,
}

impl Maintainer {
    pub fn new(
        config: config::Maintainer,
        registry: Arc<Registry>,
        database: Database,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        let predictor = match LinearModel::load(config.model_path()) {
            Ok(model) => Some(Box::new(model) as Box<dyn Predictor>),
            Err(err) => {
                warn!("no prediction model: {}", err);
                None
            }
        };

        Self {
            config,
            registry,
            database,
            predictor,
            max_cycles: None,
            shutdown_rx: Some(shutdown_rx),
        }
    }

    pub fn with_predictor(mut self, predictor: Option<Box<dyn Predictor>>) -> Self {
        self.predictor = predictor;
        self
    }

    pub fn with_max_cycles(mut self, max_cycles: Option<u64>) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Checks every interval until shutdown or `max_cycles`. Returns the
    /// number of checks made.
    pub async fn run(&mut self) -> Result<u64> {
        info!("maintainer starting, checking every {:?}", self.config.interval());

        let mut cycles = 0;
        loop {
            let started = Instant::now();

            if let Err(err) = self.check().await {
                error!("maintenance check failed: {}", err);
            }
            cycles += 1;

            if self.max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }

            let pause = scheduler::sleep_time(self.config.interval(), started.elapsed());
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = scheduler::wait_for_shutdown(&mut self.shutdown_rx) => {
                    info!("shutdown requested");
                    break;
                }
            }
        }

        info!("maintainer stopped after {} checks", cycles);
        Ok(cycles)
    }

    /// One pass over the latest stored row.
    pub async fn check(&self) -> Result<Assessment> {
        let mut assessment = Assessment {
            speed: None,
            class: None,
            prediction: None,
        };

        let Some(row) = self.database.fetch_latest().await? else {
            warn!("no data in database yet");
            return Ok(assessment);
        };

        match row.value("SPEED") {
            Some(raw) => {
                let speed = raw * self.config.rpm_conversion_factor();
                let class = SpeedClass::classify(speed);
                if class.is_alarm() {
                    warn!("{}: {:.2}", class, speed);
                } else {
                    info!("{}: {:.2}", class, speed);
                }
                assessment.speed = Some(speed);
                assessment.class = Some(class);
            }
            None => warn!("no SPEED value in latest row"),
        }

        if self.config.check_ranges() {
            for violation in self.registry.out_of_range(&row) {
                warn!("out of range: {}", violation);
            }
        }

        if let Some(predictor) = &self.predictor {
            assessment.prediction = predict_row(predictor.as_ref(), &row)?;
            if let Some(prediction) = assessment.prediction {
                info!("predicted value: {:.3}", prediction);
            }
        }

        Ok(assessment)
    }
}

/// Features are the row's values in order. `Ok(None)` if any is missing.
pub fn predict_row(predictor: &dyn Predictor, row: &Snapshot) -> Result<Option<f64>> {
    let features: Option<Vec<f64>> = row.iter().map(|(_, v)| v).collect();
    match features {
        Some(features) => Ok(Some(predictor.predict(&features)?)),
        None => {
            debug!("skipping prediction, {} values missing", row.failed_count());
            Ok(None)
        }
    }
}
