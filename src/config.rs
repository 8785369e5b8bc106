//! 配置模块
//!
//! 从 TOML 文件加载服务、注册中心与负载均衡配置，所有字段都有默认值

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub balancer: BalancerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
}

/// 注册中心配置
///
/// 服务端与客户端共用：服务端使用健康扫描相关的时长，
/// 客户端使用 `endpoint` 与心跳间隔
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    /// 注册中心地址（客户端侧）
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// 心跳间隔（秒）
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    /// 健康扫描间隔（秒）
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// 超过该时长没有心跳则标记为 Down（秒）
    #[serde(default = "default_up_to_down")]
    pub up_to_down_secs: u64,
    /// Down 状态持续该时长后从注册表移除（秒）
    #[serde(default = "default_down_to_remove")]
    pub down_to_remove_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BalancerConfig {
    /// 负载均衡策略标识，见 [`crate::balancer::LoadBalanceStrategy`]
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// 出站调用超时（毫秒）
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8400".to_string()
}

fn default_heartbeat_interval() -> u64 {
    3
}

fn default_sweep_interval() -> u64 {
    3
}

fn default_up_to_down() -> u64 {
    10
}

fn default_down_to_remove() -> u64 {
    30
}

fn default_strategy() -> String {
    "wrr".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            sweep_interval_secs: default_sweep_interval(),
            up_to_down_secs: default_up_to_down(),
            down_to_remove_secs: default_down_to_remove(),
        }
    }
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl RegistryConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn up_to_down(&self) -> Duration {
        Duration::from_secs(self.up_to_down_secs)
    }

    pub fn down_to_remove(&self) -> Duration {
        Duration::from_secs(self.down_to_remove_secs)
    }
}

impl BalancerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RegistryError::config(format!("failed to read {}: {}", path, e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| RegistryError::config(format!("failed to parse {}: {}", path, e)))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 只给出必填段时，注册中心与均衡器字段全部取默认值
    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [service]
            name = "demo"
            version = "0.1.0"

            [server]
            address = "0.0.0.0"
            port = 9001
            "#,
        )
        .unwrap();

        assert_eq!(config.registry.endpoint, "http://127.0.0.1:8400");
        assert_eq!(config.registry.heartbeat_interval(), Duration::from_secs(3));
        assert_eq!(config.registry.up_to_down(), Duration::from_secs(10));
        assert_eq!(config.registry.down_to_remove(), Duration::from_secs(30));
        assert_eq!(config.balancer.strategy, "wrr");
        assert_eq!(config.balancer.timeout(), Duration::from_millis(5000));
    }

    /// 显式配置覆盖默认值
    #[test]
    fn explicit_values_override_defaults() {
        let config: Config = toml::from_str(
            r#"
            [service]
            name = "demo"
            version = "0.1.0"

            [server]
            address = "0.0.0.0"
            port = 9001

            [registry]
            endpoint = "http://registry.internal:8400"
            up_to_down_secs = 5

            [balancer]
            timeout_ms = 800
            "#,
        )
        .unwrap();

        assert_eq!(config.registry.endpoint, "http://registry.internal:8400");
        assert_eq!(config.registry.up_to_down(), Duration::from_secs(5));
        // 未覆盖的字段保持默认
        assert_eq!(config.registry.down_to_remove(), Duration::from_secs(30));
        assert_eq!(config.balancer.timeout(), Duration::from_millis(800));
    }
}
