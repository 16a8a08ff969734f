use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - `app.timezone` names an IANA zone
/// - An API key is present when `auth.method = "api_key"`
/// - `app.password_hash_cost` is within bcrypt's accepted range
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.app.timezone.parse::<chrono_tz::Tz>().is_err() {
        return Err(ConfigError::ValidationError(format!(
            "app.timezone is not a valid IANA timezone: {}",
            config.app.timezone
        )));
    }

    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_deref().unwrap_or("").is_empty()
    {
        return Err(ConfigError::ValidationError(
            "auth.api_key must be set when auth.method is api_key".to_string(),
        ));
    }

    let cost = config.app.password_hash_cost;
    if !(crate::config::BCRYPT_MIN_COST..=crate::config::BCRYPT_MAX_COST).contains(&cost) {
        return Err(ConfigError::ValidationError(format!(
            "app.password_hash_cost must be between {} and {}, got {}",
            crate::config::BCRYPT_MIN_COST,
            crate::config::BCRYPT_MAX_COST,
            cost
        )));
    }

    Ok(())
}
