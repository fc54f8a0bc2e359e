use torflux::{ConfigError, Driver, FluxConfig};

/// Run one action (`hup` unless named) against the main or dns Tor instance
pub async fn execute(
    config: &FluxConfig,
    instance: &str,
    action: Option<&str>,
) -> Result<i32, Box<dyn std::error::Error>> {
    let driver = Driver::from_config(config);

    match driver.control(instance, action).await {
        Ok(true) => Ok(0),
        Ok(false) => Ok(1),
        Err(ConfigError::MissingCredential { .. }) => Ok(1),
        Err(e) => Err(e.into()),
    }
}
