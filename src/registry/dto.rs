//! 注册中心线上协议的请求/应答 DTO

use crate::registry::instance::{MicroService, ServiceStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// 注册中心统一入口路径
pub const REGISTRY_PATH: &str = "/_ds";

/// 注册请求（POST）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub service_name: String,
    pub weight: u32,
    pub port: u16,
    pub cpu_use: u32,
    pub memory_total: u64,
    pub memory_used: u64,
}

/// 实例定位键（心跳/注销共用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceKey {
    pub service_name: String,
    pub guid: Uuid,
}

/// 注册应答：注册中心分配的身份
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredInfo {
    pub instance_id: Uuid,
    pub register_time: DateTime<Utc>,
    pub status: ServiceStatus,
}

/// 带版本号的全量实例快照
///
/// 心跳拉取在版本不变时返回空应答，版本变化时返回该结构
/// （过滤掉所有 Down 状态的实例）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceInstances {
    #[serde(default)]
    pub instance: HashMap<String, Vec<MicroService>>,
    pub version: u64,
}

/// 心跳拉取的版本号查询参数
#[derive(Debug, Clone, Deserialize)]
pub struct VersionQuery {
    pub version: u64,
}
