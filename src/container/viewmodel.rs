//! Read-only snapshot of a local run, for status output.

use super::compat;
use super::lifecycle::LocalContainer;
use super::{commands, Result};
use crate::runner::CommandRunner;
use std::collections::HashMap;
use std::fmt;

/// One container's externally visible state.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub cid: String,
    pub is_running: bool,
    pub ip: String,
    pub hostports: Vec<String>,
}

impl ServiceInfo {
    /// Addresses the service answers on, one per exposed host port.
    pub fn urls(&self) -> Vec<String> {
        self.hostports
            .iter()
            .map(|port| format!("{}:{}", self.ip, port))
            .collect()
    }
}

/// Snapshot across every container a project runs under. Engine query
/// failures leave a service listed as stopped with no ports rather than
/// failing the whole view.
#[derive(Debug, Clone)]
pub struct ContainerViewModel {
    pub ip: String,
    pub services: Vec<ServiceInfo>,
}

impl ContainerViewModel {
    pub async fn from_container(
        container: &LocalContainer,
        runner: &CommandRunner,
    ) -> Result<Self> {
        let ip = compat::container_ip(runner).await;

        let mut services = Vec::new();
        for cid in container.container_names()? {
            let is_running = commands::is_running(runner, &cid).await?;
            let hostports = commands::exposed_hostports(runner, &cid).await?;
            services.push(ServiceInfo {
                cid,
                is_running,
                ip: ip.clone(),
                hostports,
            });
        }

        Ok(Self { ip, services })
    }

    /// Whether any of the project's containers is up.
    pub fn is_running(&self) -> bool {
        self.services.iter().any(|s| s.is_running)
    }

    pub fn num_services(&self) -> usize {
        self.services.len()
    }

    /// Total host ports exposed across all services.
    pub fn num_exposed_hostports(&self) -> usize {
        self.services.iter().map(|s| s.hostports.len()).sum()
    }

    /// Container name to its exposed host ports.
    pub fn cid_hostports_map(&self) -> HashMap<String, Vec<String>> {
        self.services
            .iter()
            .map(|s| (s.cid.clone(), s.hostports.clone()))
            .collect()
    }

    /// Flattened (container name, host port) pairs, in service order.
    pub fn cid_hostport_pairs(&self) -> Vec<(String, String)> {
        self.services
            .iter()
            .flat_map(|s| {
                s.hostports
                    .iter()
                    .map(|port| (s.cid.clone(), port.clone()))
            })
            .collect()
    }
}

impl fmt::Display for ContainerViewModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for service in &self.services {
            writeln!(f, "container: {}", service.cid)?;
            writeln!(
                f,
                "  status: {}",
                if service.is_running { "running" } else { "stopped" }
            )?;
            for url in service.urls() {
                writeln!(f, "  url: {}", url)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(cid: &str, is_running: bool, hostports: &[&str]) -> ServiceInfo {
        ServiceInfo {
            cid: cid.to_string(),
            is_running,
            ip: "127.0.0.1".to_string(),
            hostports: hostports.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_urls_pair_ip_with_each_hostport() {
        let info = service("abc", true, &["8080", "9090"]);
        assert_eq!(info.urls(), vec!["127.0.0.1:8080", "127.0.0.1:9090"]);
    }

    #[test]
    fn test_is_running_aggregates_services() {
        let stopped = ContainerViewModel {
            ip: "127.0.0.1".to_string(),
            services: vec![service("a", false, &[]), service("b", false, &[])],
        };
        assert!(!stopped.is_running());

        let partial = ContainerViewModel {
            ip: "127.0.0.1".to_string(),
            services: vec![service("a", false, &[]), service("b", true, &["80"])],
        };
        assert!(partial.is_running());
        assert_eq!(partial.num_services(), 2);
    }

    #[test]
    fn test_hostport_aggregations() {
        let view = ContainerViewModel {
            ip: "127.0.0.1".to_string(),
            services: vec![
                service("web", true, &["8080", "8443"]),
                service("db", true, &[]),
                service("cache", true, &["6379"]),
            ],
        };

        assert_eq!(view.num_exposed_hostports(), 3);

        let map = view.cid_hostports_map();
        assert_eq!(map["web"], vec!["8080", "8443"]);
        assert!(map["db"].is_empty());

        let pairs = view.cid_hostport_pairs();
        assert_eq!(
            pairs,
            vec![
                ("web".to_string(), "8080".to_string()),
                ("web".to_string(), "8443".to_string()),
                ("cache".to_string(), "6379".to_string()),
            ]
        );
    }

    #[test]
    fn test_display_lists_each_service() {
        let view = ContainerViewModel {
            ip: "127.0.0.1".to_string(),
            services: vec![service("localdock_web_1", true, &["8080"])],
        };

        let rendered = view.to_string();
        assert!(rendered.contains("container: localdock_web_1"));
        assert!(rendered.contains("status: running"));
        assert!(rendered.contains("url: 127.0.0.1:8080"));
    }
}
