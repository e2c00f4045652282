use std::fmt::{ Debug, Display };

/// Standard format for activity logs: component - message: details
pub fn log_activity(component: &str, message: &str, details: Option<&str>) {
    let details_str = details.unwrap_or("");
    log::info!("{} - {}: {}", component, message, details_str);
}

/// Standard format for error logs: component - ERROR - context: message
pub fn log_error<E: Display + ?Sized>(component: &str, context: &str, err: &E) {
    log::error!("{} - ERROR - {}: {}", component, context, err);
}

/// Log statistics with standard format
pub fn log_stats(component: &str, context: &str, stats: &str) {
    log_activity(component, context, Some(stats));
}

/// Log debug information
pub fn log_debug<T: Debug + ?Sized>(component: &str, context: &str, details: &T) {
    if log::log_enabled!(log::Level::Debug) {
        log::debug!("[{}] {} - Details: {:?}", component, context, details);
    }
}
