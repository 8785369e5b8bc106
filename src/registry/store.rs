//! 注册表存储
//!
//! 服务名到实例列表的权威映射，附带一个全局自增版本号。
//! 版本号只在结构性变更（注册、注销、扫描移除）时自增，
//! 状态翻转不计入版本。进程重启后版本归零，不做持久化

use crate::error::{RegistryError, Result};
use crate::registry::dto::{RegisterRequest, RegisteredInfo, ServiceInstances, ServiceKey};
use crate::registry::instance::{MicroService, ServiceStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// 注册表存储
///
/// 所有变更都要求调用方持有对它的独占访问（注册中心将其放在一把
/// 全局互斥锁后面），因此内部方法都是 `&mut self` 的同步实现
pub struct RegistryStore {
    instances: HashMap<String, Vec<MicroService>>,
    version: u64,
    up_to_down: Duration,
    down_to_remove: Duration,
}

/// `reference` 相对 `now` 是否已超过 `threshold`
fn stale(now: DateTime<Utc>, reference: DateTime<Utc>, threshold: Duration) -> bool {
    now.signed_duration_since(reference)
        .to_std()
        .is_ok_and(|elapsed| elapsed > threshold)
}

impl RegistryStore {
    pub fn new(up_to_down: Duration, down_to_remove: Duration) -> Self {
        Self {
            instances: HashMap::new(),
            version: 0,
            up_to_down,
            down_to_remove,
        }
    }

    /// 当前版本号
    pub fn version(&self) -> u64 {
        self.version
    }

    /// 按服务名与实例标识查找实例
    pub fn get_instance(&self, service_name: &str, instance_id: Uuid) -> Option<&MicroService> {
        self.instances
            .get(service_name)?
            .iter()
            .find(|ins| ins.instance_id == instance_id)
    }

    /// 注册一个新实例
    ///
    /// 分配全新标识，注册时间与首次心跳取当前时间，状态置为 Up。
    /// 实例地址取注册中心观察到的对端 IP，不采信请求体里的任何地址。
    /// 逻辑上总是成功
    pub fn register(&mut self, req: &RegisterRequest, peer_ip: String) -> RegisteredInfo {
        let now = Utc::now();
        let service = MicroService {
            instance_id: Uuid::new_v4(),
            register_time: now,
            last_heartbeat: now,
            status: ServiceStatus::Up,
            address: peer_ip,
            port: req.port,
            service_name: req.service_name.clone(),
            weight: req.weight,
            cpu_use: req.cpu_use,
            memory_total: req.memory_total,
            memory_used: req.memory_used,
        };

        let info = RegisteredInfo {
            instance_id: service.instance_id,
            register_time: service.register_time,
            status: service.status,
        };

        info!(
            service_name = %service.service_name,
            instance_id = %service.instance_id,
            address = %service.address,
            "instance registered"
        );

        self.instances
            .entry(req.service_name.clone())
            .or_default()
            .push(service);
        self.version += 1;

        info
    }

    /// 更新实例心跳
    ///
    /// 刷新心跳时间并把状态强制回 Up（移除前的迟到心跳会复活 Down 实例）。
    /// 标识未知时返回 `NoSuchInstance`
    pub fn heartbeat(&mut self, key: &ServiceKey) -> Result<()> {
        let instance = self
            .instances
            .get_mut(&key.service_name)
            .and_then(|list| list.iter_mut().find(|ins| ins.instance_id == key.guid))
            .ok_or(RegistryError::NoSuchInstance)?;

        instance.last_heartbeat = Utc::now();
        instance.status = ServiceStatus::Up;
        Ok(())
    }

    /// 版本不同时返回过滤后的全量快照，相同时返回 None
    ///
    /// 快照剔除所有 Down 状态实例，并带上当前版本号
    pub fn snapshot_if_newer(&self, known_version: u64) -> Option<ServiceInstances> {
        if known_version == self.version {
            return None;
        }

        let mut filtered = HashMap::new();
        for (name, list) in &self.instances {
            let alive: Vec<MicroService> = list
                .iter()
                .filter(|ins| ins.status != ServiceStatus::Down)
                .cloned()
                .collect();
            filtered.insert(name.clone(), alive);
        }

        Some(ServiceInstances {
            instance: filtered,
            version: self.version,
        })
    }

    /// 注销实例
    ///
    /// 只有标识存在且请求来源 IP 与注册时一致才会移除，
    /// 否则返回 `NoSuchInstance` 且注册表不变
    pub fn deregister(&mut self, key: &ServiceKey, peer_ip: &str) -> Result<()> {
        let list = self
            .instances
            .get_mut(&key.service_name)
            .ok_or(RegistryError::NoSuchInstance)?;

        let pos = list
            .iter()
            .position(|ins| ins.instance_id == key.guid && ins.address == peer_ip)
            .ok_or(RegistryError::NoSuchInstance)?;

        list.remove(pos);
        if list.is_empty() {
            self.instances.remove(&key.service_name);
        }
        self.version += 1;

        info!(
            service_name = %key.service_name,
            instance_id = %key.guid,
            "instance deregistered"
        );
        Ok(())
    }

    /// 健康扫描（整表一次性遍历，调用方持有独占锁）
    ///
    /// Up 实例心跳超过 `up_to_down` 翻转为 Down；
    /// Down 实例心跳超过 `up_to_down + down_to_remove` 从注册表移除，
    /// 每个被移除的实例计一次结构性变更
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        let remove_after = self.up_to_down + self.down_to_remove;
        let mut removed = 0u64;

        for (name, list) in self.instances.iter_mut() {
            for instance in list.iter_mut() {
                if instance.status == ServiceStatus::Up
                    && stale(now, instance.last_heartbeat, self.up_to_down)
                {
                    instance.status = ServiceStatus::Down;
                    warn!(
                        service_name = %name,
                        instance_id = %instance.instance_id,
                        "instance marked DOWN, no heartbeat"
                    );
                }
            }

            list.retain(|instance| {
                let expired = instance.status == ServiceStatus::Down
                    && stale(now, instance.last_heartbeat, remove_after);
                if expired {
                    removed += 1;
                    warn!(
                        service_name = %name,
                        instance_id = %instance.instance_id,
                        "instance removed, DOWN with no heartbeat"
                    );
                }
                !expired
            });
        }

        self.instances.retain(|_, list| !list.is_empty());
        self.version += removed;
    }
}
