//! Per-domain validation

use crate::error::{ConfigError, ConfigResult};

/// A configuration section that can check itself after loading
pub trait Validatable {
    fn validate(&self) -> ConfigResult<()>;

    /// Section name used in error messages, e.g. `coordination`
    fn domain_name(&self) -> &'static str;

    fn validation_error(&self, message: impl Into<String>) -> ConfigError
    where
        Self: Sized,
    {
        invalid(self.domain_name(), message)
    }
}

fn invalid(domain: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        domain: domain.to_string(),
        message: message.into(),
    }
}

pub fn validate_required_string(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(invalid(domain, format!("{} is required", field_name)));
    }
    Ok(())
}

pub fn validate_positive<T>(value: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value > T::default() {
        Ok(())
    } else {
        Err(invalid(domain, format!("{} must be positive (got {})", field_name, value)))
    }
}

/// Absolute http or https URL
pub fn validate_url(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    validate_required_string(value, field_name, domain)?;
    let parsed = url::Url::parse(value)
        .map_err(|e| invalid(domain, format!("{} is not a URL ({}): {}", field_name, e, value)))?;
    if matches!(parsed.scheme(), "http" | "https") {
        Ok(())
    } else {
        Err(invalid(
            domain,
            format!("{} must use http or https, not {}", field_name, parsed.scheme()),
        ))
    }
}

/// Non-zero port. Privileged ports only warn since the helper may run as root in a pod.
pub fn validate_port_range(port: u16, field_name: &str, domain: &str) -> ConfigResult<()> {
    if port == 0 {
        return Err(invalid(domain, format!("{} cannot be 0", field_name)));
    }
    if port < 1024 {
        log::warn!("{} {} is a privileged port", field_name, port);
    }
    Ok(())
}
