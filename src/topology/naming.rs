//! Naming convention for broker objects.
//!
//! Pure functions: the same service key always maps to the same names, in
//! every process and across restarts.

/// The single direct exchange every service is bound to.
pub const EXCHANGE_NAME: &str = "settix";

/// Exchange name.
pub fn exchange_name() -> &'static str {
    EXCHANGE_NAME
}

/// Queue consumed by the service.
pub fn queue_name(service_key: &str) -> String {
    format!("{EXCHANGE_NAME}.{service_key}")
}

/// Routing key binding the service queue to the exchange.
pub fn routing_key(service_key: &str) -> String {
    service_key.to_string()
}

/// Names derived for one service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopologyNames {
    pub exchange: String,
    pub queue: String,
    pub routing_key: String,
}

impl TopologyNames {
    pub fn for_service(service_key: &str) -> Self {
        Self {
            exchange: exchange_name().to_string(),
            queue: queue_name(service_key),
            routing_key: routing_key(service_key),
        }
    }
}
