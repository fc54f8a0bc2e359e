use torflux::{ConfigError, Driver, FluxConfig};

/// Rotate circuits on every configured endpoint
///
/// Best effort: the exit status is 0 even when individual endpoints fail,
/// unless strict mode is on. A missing password has already been written to
/// the audit log and echoed by the driver, so it maps straight to status 1.
pub async fn execute(config: &FluxConfig) -> Result<i32, Box<dyn std::error::Error>> {
    let driver = Driver::from_config(config);

    match driver.run().await {
        Ok(report) => Ok(report.exit_code(driver.strict())),
        Err(ConfigError::MissingCredential { .. }) => Ok(1),
        Err(e) => Err(e.into()),
    }
}
