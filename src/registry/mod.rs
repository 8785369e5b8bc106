//! 服务注册模块
//!
//! 注册表存储、注册中心服务端与客户端实例管理器

pub mod dto;
pub mod instance;
pub mod manager;
pub mod server;
pub mod store;

pub use instance::{DEFAULT_WEIGHT, MicroService, ServiceStatus};
pub use manager::InstanceManager;
pub use server::{RegistryServer, SharedStore};
pub use store::RegistryStore;
