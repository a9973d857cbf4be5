//! Named HTTP services, one per backend resource.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::config::ApiConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Posts,
    Users,
    Todos,
    Photos,
    Albums,
    Comments,
}

impl Service {
    pub const ALL: [Service; 6] = [
        Service::Posts,
        Service::Users,
        Service::Todos,
        Service::Photos,
        Service::Albums,
        Service::Comments,
    ];

    /// Path segment of the resource on the backend.
    pub fn name(self) -> &'static str {
        match self {
            Service::Posts => "posts",
            Service::Users => "users",
            Service::Todos => "todos",
            Service::Photos => "photos",
            Service::Albums => "albums",
            Service::Comments => "comments",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub name: &'static str,
    pub base_url: String,
    pub timeout: Duration,
}

/// Maps every [`Service`] to its base URL and timeout.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    services: HashMap<Service, ServiceConfig>,
}

impl ServiceRegistry {
    pub fn new(config: &ApiConfig) -> Self {
        let services = Service::ALL
            .into_iter()
            .map(|service| {
                let entry = ServiceConfig {
                    name: service.name(),
                    base_url: format!("{}/{}", config.base_url, service.name()),
                    timeout: config.default_timeout,
                };
                (service, entry)
            })
            .collect();
        Self { services }
    }

    pub fn with_timeout(mut self, service: Service, timeout: Duration) -> Self {
        if let Some(entry) = self.services.get_mut(&service) {
            entry.timeout = timeout;
        }
        self
    }

    pub fn get(&self, service: Service) -> &ServiceConfig {
        // `new` registers every variant of `Service`.
        &self.services[&service]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_service_gets_its_own_base_url() {
        let registry = ServiceRegistry::new(&ApiConfig::new("http://localhost:3000/"));
        for service in Service::ALL {
            let entry = registry.get(service);
            assert_eq!(entry.base_url, format!("http://localhost:3000/{}", service.name()));
            assert_eq!(entry.timeout, Duration::from_secs(10));
        }
    }

    #[test]
    fn timeout_override_touches_one_service() {
        let registry = ServiceRegistry::new(&ApiConfig::default())
            .with_timeout(Service::Photos, Duration::from_secs(30));
        assert_eq!(registry.get(Service::Photos).timeout, Duration::from_secs(30));
        assert_eq!(registry.get(Service::Posts).timeout, Duration::from_secs(10));
    }
}
