use crate::{ReservationError, Result, ServiceConfig};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

/// Prefix for environment overrides, e.g. `SEAT_RESERVATION_SEATS_INITIAL=10`.
pub const ENV_PREFIX: &str = "SEAT_RESERVATION";

/// Property keys understood by [`apply_property`].
pub const KNOWN_KEYS: &[&str] = &[
    "application.id",
    "seats.initial",
    "seats.reset.on.start",
    "server.port",
    "shutdown.timeout.ms",
    "store.backend",
    "state.dir",
    "queue.job.timeout.ms",
    "queue.timeout.policy",
    "queue.max.attempts",
    "queue.remove.on.complete",
    "queue.process.on.startup",
];

/// Parse a Java properties file into a [`ServiceConfig`]
pub fn parse_properties_file<P: AsRef<Path>>(path: P, application_id: &str) -> Result<ServiceConfig> {
    let properties = read_properties(path.as_ref())?;

    let mut config = ServiceConfig {
        application_id: application_id.to_string(),
        ..ServiceConfig::default()
    };

    for (key, value) in properties {
        apply_property(&mut config, &key, &value)?;
    }

    Ok(config)
}

/// Parse an overlay properties file and apply it on top of `config`
pub fn merge_properties_file<P: AsRef<Path>>(mut config: ServiceConfig, path: P) -> Result<ServiceConfig> {
    let properties = read_properties(path.as_ref())?;

    for (key, value) in properties {
        apply_property(&mut config, &key, &value)?;
    }

    Ok(config)
}

/// Apply `SEAT_RESERVATION_*` environment variables on top of `config`
pub fn apply_env_overrides(config: ServiceConfig) -> Result<ServiceConfig> {
    let source = config::Config::builder()
        .add_source(config::Environment::with_prefix(ENV_PREFIX))
        .build()?;

    apply_overrides(config, &source)
}

/// Apply every known key present in `source`.
///
/// Keys are looked up with dots replaced by underscores, which is how the
/// `config` crate exposes environment variables once the prefix is stripped.
pub fn apply_overrides(mut config: ServiceConfig, source: &config::Config) -> Result<ServiceConfig> {
    for key in KNOWN_KEYS {
        let lookup = key.replace('.', "_");
        match source.get_string(&lookup) {
            Ok(value) => apply_property(&mut config, key, &value)?,
            Err(config::ConfigError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(config)
}

/// Apply a single property to `config`. Unknown keys are kept verbatim.
pub fn apply_property(config: &mut ServiceConfig, key: &str, value: &str) -> Result<()> {
    let value = value.trim();
    match key {
        "application.id" => config.application_id = value.to_string(),
        "seats.initial" => {
            let seats: i64 = parse_value(key, value)?;
            if seats < 0 {
                return Err(ReservationError::InvalidArgument(format!(
                    "seats.initial must not be negative: {}",
                    seats
                )));
            }
            config.initial_seats = seats;
        }
        "seats.reset.on.start" => config.reset_seats_on_start = parse_value(key, value)?,
        "server.port" => config.port = parse_value(key, value)?,
        "shutdown.timeout.ms" => config.shutdown_timeout_ms = parse_value(key, value)?,
        "store.backend" => config.store.backend = value.parse()?,
        "state.dir" => config.store.state_dir = value.to_string(),
        "queue.job.timeout.ms" => config.queue.job_timeout_ms = parse_value(key, value)?,
        "queue.timeout.policy" => config.queue.timeout_policy = value.parse()?,
        "queue.max.attempts" => {
            let attempts: u32 = parse_value(key, value)?;
            if attempts == 0 {
                return Err(ReservationError::InvalidArgument(
                    "queue.max.attempts must be at least 1".to_string(),
                ));
            }
            config.queue.max_attempts = attempts;
        }
        "queue.remove.on.complete" => config.queue.remove_on_complete = parse_value(key, value)?,
        "queue.process.on.startup" => config.queue.process_on_startup = parse_value(key, value)?,
        _ => {
            config
                .additional_properties
                .insert(key.to_string(), value.to_string());
        }
    }
    Ok(())
}

fn read_properties(path: &Path) -> Result<HashMap<String, String>> {
    let file = File::open(path).map_err(|e| {
        ReservationError::InvalidArgument(format!("Failed to open config file {:?}: {}", path, e))
    })?;

    let properties = java_properties::read(BufReader::new(file))?;
    Ok(properties)
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        ReservationError::InvalidArgument(format!("Invalid value for {}: {}", key, value))
    })
}
