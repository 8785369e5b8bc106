//! 服务实例定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 未显式指定权重时的默认权重
pub const DEFAULT_WEIGHT: u32 = 255;

/// 实例健康状态
///
/// 状态机：`Up -> Down`（心跳超时）`-> 移除`（超时持续），
/// 移除前收到心跳则 `Down -> Up`。
/// `Exhausted` 为资源耗尽预留值，核心逻辑不会主动进入该状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Up,
    Exhausted,
    Down,
}

/// 服务实例
///
/// 一个正在运行的、可寻址的具名服务副本。标识由注册中心在注册时分配，
/// 地址取自注册中心观察到的对端地址，之后只由注册中心修改心跳与状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicroService {
    /// 实例标识（注册中心分配，分配后不变）
    pub instance_id: Uuid,
    /// 注册时间
    pub register_time: DateTime<Utc>,
    /// 最近一次心跳时间
    pub last_heartbeat: DateTime<Utc>,
    /// 健康状态
    pub status: ServiceStatus,

    /// 网络地址（由注册中心根据对端地址填写）
    pub address: String,
    /// 服务端口
    pub port: u16,
    /// 服务名
    pub service_name: String,
    /// 负载均衡权重
    pub weight: u32,

    /// 资源快照（仅供参考）
    pub cpu_use: u32,
    pub memory_total: u64,
    pub memory_used: u64,
}

impl MicroService {
    /// 创建默认权重的本地实例（尚未注册，标识为空）
    pub fn new(service_name: impl Into<String>, port: u16) -> Self {
        Self::new_weighted(service_name, port, DEFAULT_WEIGHT)
    }

    /// 创建指定权重的本地实例
    pub fn new_weighted(service_name: impl Into<String>, port: u16, weight: u32) -> Self {
        let now = Utc::now();
        Self {
            instance_id: Uuid::nil(),
            register_time: now,
            last_heartbeat: now,
            status: ServiceStatus::Up,
            address: String::new(),
            port,
            service_name: service_name.into(),
            weight,
            cpu_use: 0,
            memory_total: 0,
            memory_used: 0,
        }
    }

    /// 是否已经向注册中心注册过
    pub fn is_registered(&self) -> bool {
        !self.instance_id.is_nil()
    }

    /// 实例的 HTTP 基础地址
    pub fn to_http_url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}
