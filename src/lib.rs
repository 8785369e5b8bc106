//! Pulse Registry Core Library
//!
//! Provides the core infrastructure for a minimal microservice toolkit:
//! service registration, heartbeat-based health tracking, versioned
//! instance-list distribution, and client-side weighted load balancing.

pub mod balancer;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod utils;

// Re-exports
pub use balancer::{BalancedService, Balancer, LoadBalanceStrategy, WrrBalancer, create_balancer};
pub use client::ServiceClient;
pub use config::{BalancerConfig, Config, RegistryConfig, ServerConfig, ServiceConfig};
pub use error::{RegistryError, Result};
pub use registry::dto::{RegisterRequest, RegisteredInfo, ServiceInstances, ServiceKey};
pub use registry::{InstanceManager, MicroService, RegistryServer, RegistryStore, ServiceStatus};
pub use utils::SystemLoad;
