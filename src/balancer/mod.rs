//! 负载均衡模块
//!
//! 定义均衡器的能力集合（选取实例、接收调用反馈、全量刷新拓扑），
//! 具体策略在构建时确定

pub mod wrr;

use crate::client::ServiceClient;
use crate::config::BalancerConfig;
use crate::error::Result;
use crate::registry::instance::MicroService;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub use wrr::WrrBalancer;

/// 负载均衡策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadBalanceStrategy {
    /// 平滑加权轮询（Weighted Smooth Round Robin）
    WeightedRoundRobin,
}

impl LoadBalanceStrategy {
    /// 按配置标识解析策略，未知标识回落到加权轮询
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "wrr" => LoadBalanceStrategy::WeightedRoundRobin,
            _ => LoadBalanceStrategy::WeightedRoundRobin,
        }
    }
}

/// 一次选取的结果
///
/// 持有被选中实例、调用句柄以及实例在簇内的下标。
/// 反馈调用结果时需要把它交还给均衡器，以便落到正确的权重槽位
pub struct BalancedService {
    /// 被选中的实例
    pub service: MicroService,
    /// 指向该实例的调用句柄
    pub client: ServiceClient,
    index: usize,
}

impl BalancedService {
    pub(crate) fn new(service: MicroService, client: ServiceClient, index: usize) -> Self {
        Self {
            service,
            client,
            index,
        }
    }

    /// 实例在簇内的下标
    pub fn index(&self) -> usize {
        self.index
    }
}

/// 负载均衡器能力集合
#[async_trait]
pub trait Balancer: Send + Sync {
    /// 为指定服务选取一个实例；没有可用实例时返回 None，由调用方处理
    async fn pick_instance(&self, service_name: &str) -> Option<BalancedService>;

    /// 反馈一次调用结果（成功恢复权重，失败削减权重）
    async fn notify_effect(&self, service: &BalancedService, ok: bool);

    /// 全量替换内部的服务到簇映射
    async fn refresh_instances(&self, instances: HashMap<String, Vec<MicroService>>);
}

/// 按配置构建负载均衡器
pub fn create_balancer(config: &BalancerConfig) -> Result<Arc<dyn Balancer>> {
    match LoadBalanceStrategy::from_str(&config.strategy) {
        LoadBalanceStrategy::WeightedRoundRobin => {
            Ok(Arc::new(WrrBalancer::new(config.timeout())?))
        }
    }
}
