//! 平滑加权轮询均衡器
//!
//! 每个服务名对应一个加权簇。一个 `sum(weight)` 长度的选取周期内，
//! 每个实例被选中的次数与其权重成正比，且同一实例不会被突发式连选。
//! 顶层映射用读写锁保护（并发选取、独占刷新）；
//! 每个簇的两组权重数组由簇自己的互斥锁保护，选取与反馈都走这把锁，
//! 互不相关的服务之间反馈不串行

use crate::balancer::{BalancedService, Balancer};
use crate::client::ServiceClient;
use crate::error::{RegistryError, Result};
use crate::registry::instance::MicroService;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// 一个服务的加权簇
///
/// 不变式：`0 <= effective[i] <= instances[i].weight` 恒成立。
/// 刷新时整簇重建，从不原地修改实例列表
struct WeightedCluster {
    instances: Vec<MicroService>,
    state: Mutex<ClusterState>,
}

struct ClusterState {
    /// 累积权重（有符号，选中后减去总权重）
    current: Vec<i64>,
    /// 有效权重（失败衰减、成功恢复，上限为配置权重）
    effective: Vec<u32>,
}

impl WeightedCluster {
    fn new(instances: Vec<MicroService>) -> Self {
        let effective = instances.iter().map(|ins| ins.weight).collect();
        let current = vec![0; instances.len()];
        Self {
            instances,
            state: Mutex::new(ClusterState { current, effective }),
        }
    }

    /// 执行一步平滑加权轮询
    ///
    /// 基准值取下标 0 自增后的累积权重，扫描中只在严格大于时换人，
    /// 平局保持先到者，保证分布的平滑性
    async fn pick(&self) -> usize {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let mut max_i = 0usize;
        let mut total: i64 = 0;
        let mut max_weight = state.current[0] + state.effective[0] as i64;
        for i in 0..state.current.len() {
            state.current[i] += state.effective[i] as i64;
            total += state.current[i];
            if state.current[i] > max_weight {
                max_i = i;
                max_weight = state.current[i];
            }
        }
        state.current[max_i] -= total;
        max_i
    }

    /// 调整有效权重：成功缓步恢复（封顶配置权重），失败缓步削减（不低于 0）
    async fn adjust(&self, index: usize, ok: bool) {
        let mut state = self.state.lock().await;
        // 刷新后旧的下标可能越界，直接忽略
        if index >= state.effective.len() {
            return;
        }

        if ok {
            if state.effective[index] < self.instances[index].weight {
                state.effective[index] += 1;
            }
        } else if state.effective[index] > 0 {
            state.effective[index] -= 1;
        }
    }
}

/// 平滑加权轮询负载均衡器
pub struct WrrBalancer {
    http: reqwest::Client,
    services: RwLock<HashMap<String, Arc<WeightedCluster>>>,
}

impl WrrBalancer {
    /// 创建均衡器，`timeout` 限定对被选实例的每次出站调用
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::config(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            http,
            services: RwLock::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl Balancer for WrrBalancer {
    async fn pick_instance(&self, service_name: &str) -> Option<BalancedService> {
        // 只按住映射读锁取簇句柄，选取本身走簇锁
        let cluster = self.services.read().await.get(service_name).cloned()?;
        if cluster.instances.is_empty() {
            return None;
        }

        let index = cluster.pick().await;
        let service = cluster.instances[index].clone();
        let client = ServiceClient::new(self.http.clone(), &service);
        Some(BalancedService::new(service, client, index))
    }

    async fn notify_effect(&self, service: &BalancedService, ok: bool) {
        let cluster = self
            .services
            .read()
            .await
            .get(&service.service.service_name)
            .cloned();
        // 刷新可能已经换掉整个簇，此时这次反馈作废
        let Some(cluster) = cluster else { return };
        cluster.adjust(service.index(), ok).await;
    }

    async fn refresh_instances(&self, instances: HashMap<String, Vec<MicroService>>) {
        let mut fresh = HashMap::with_capacity(instances.len());
        for (name, list) in instances {
            fresh.insert(name, Arc::new(WeightedCluster::new(list)));
        }

        // 整体换掉映射，并发的选取要么看到旧拓扑要么看到新拓扑
        let mut services = self.services.write().await;
        *services = fresh;
        debug!(services = services.len(), "balancer topology refreshed");
    }
}
