//! 实例管理器（客户端侧）
//!
//! 把当前进程表示为某个具名服务的一个注册实例：一次性注册、
//! 周期性心跳拉取、退出时优雅注销。
//! 拉取到新快照时整体替换本地缓存（从不增量合并），
//! 并可选地把快照推给负载均衡器做全量刷新

use crate::balancer::Balancer;
use crate::error::{RegistryError, Result};
use crate::registry::dto::{REGISTRY_PATH, RegisterRequest, RegisteredInfo, ServiceInstances, ServiceKey};
use crate::registry::instance::MicroService;
use crate::utils::SystemLoad;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// 实例管理器
///
/// `current` 为空表示尚未注册。注册成功后采用注册中心返回的身份，
/// 注销后身份清空
pub struct InstanceManager {
    current: Arc<RwLock<Option<MicroService>>>,
    info: Arc<RwLock<ServiceInstances>>,
    endpoint: String,
    http: reqwest::Client,
    balancer: Option<Arc<dyn Balancer>>,
    heartbeat_shutdown: Option<mpsc::Sender<()>>,
}

impl InstanceManager {
    /// 创建实例管理器
    ///
    /// `endpoint` 为注册中心基础地址（如 `http://127.0.0.1:8400`），
    /// `timeout` 限定每次注册/心跳/注销调用的时长
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::config(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            current: Arc::new(RwLock::new(None)),
            info: Arc::new(RwLock::new(ServiceInstances::default())),
            endpoint: endpoint.into(),
            http,
            balancer: None,
            heartbeat_shutdown: None,
        })
    }

    /// 挂接负载均衡器：快照变化时自动调用其全量刷新
    pub fn with_balancer(mut self, balancer: Arc<dyn Balancer>) -> Self {
        self.balancer = Some(balancer);
        self
    }

    /// 向注册中心注册本地实例并启动心跳任务
    ///
    /// 注册失败时本地身份保持为空并记录原因，不做自动重试。
    /// 注册成功后立即做一次拉取，之后由心跳任务按 `heartbeat_interval`
    /// 周期性拉取，单次失败只记录日志，下个周期自然重试
    pub async fn register(
        &mut self,
        mut service: MicroService,
        heartbeat_interval: Duration,
    ) -> Result<()> {
        let load = SystemLoad::acquire();
        let req = RegisterRequest {
            service_name: service.service_name.clone(),
            weight: service.weight,
            port: service.port,
            cpu_use: load.cpu_use,
            memory_total: load.memory_total,
            memory_used: load.memory_used,
        };

        let url = format!("{}{}", self.endpoint, REGISTRY_PATH);
        let registered: RegisteredInfo = match self.http.post(&url).json(&req).send().await {
            Ok(resp) if resp.status().is_success() => resp.json().await?,
            Ok(resp) => {
                let err = RegistryError::transport(format!(
                    "registry returned status {}",
                    resp.status()
                ));
                error!(error = %err, "failed to register instance");
                return Err(err);
            }
            Err(e) => {
                error!(error = %e, "failed to register instance");
                return Err(e.into());
            }
        };

        // 采用注册中心分配的身份
        service.instance_id = registered.instance_id;
        service.register_time = registered.register_time;
        service.last_heartbeat = registered.register_time;
        service.status = registered.status;

        info!(
            service_name = %service.service_name,
            instance_id = %registered.instance_id,
            "✅ instance registered"
        );

        let key = ServiceKey {
            service_name: service.service_name.clone(),
            guid: service.instance_id,
        };

        *self.current.write().await = Some(service);
        *self.info.write().await = ServiceInstances::default();

        self.start_heartbeat(heartbeat_interval);

        // 注册后立即拉取一次，尽快拿到当前拓扑
        if let Err(e) = fetch_instances(
            &self.http,
            &self.endpoint,
            &key,
            &self.info,
            self.balancer.as_ref(),
        )
        .await
        {
            warn!(error = %e, "initial instance fetch failed");
        }

        Ok(())
    }

    /// 停止心跳任务，尽力注销，然后清空本地身份
    ///
    /// 注销调用失败只记录日志，不重试
    pub async fn unregister(&mut self) {
        if let Some(tx) = self.heartbeat_shutdown.take() {
            let _ = tx.send(()).await;
        }

        let Some(service) = self.current.write().await.take() else {
            return;
        };

        let key = ServiceKey {
            service_name: service.service_name.clone(),
            guid: service.instance_id,
        };
        let url = format!("{}{}", self.endpoint, REGISTRY_PATH);

        match self.http.delete(&url).json(&key).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(instance_id = %key.guid, "✅ instance deregistered");
            }
            Ok(resp) => {
                warn!(
                    instance_id = %key.guid,
                    status = %resp.status(),
                    "failed to deregister instance"
                );
            }
            Err(e) => {
                warn!(instance_id = %key.guid, error = %e, "failed to deregister instance");
            }
        }

        *self.info.write().await = ServiceInstances::default();
    }

    /// 本地实例身份（未注册时为空）
    pub async fn current(&self) -> Option<MicroService> {
        self.current.read().await.clone()
    }

    /// 本地缓存的实例快照
    pub async fn instances(&self) -> ServiceInstances {
        self.info.read().await.clone()
    }

    /// 启动周期性心跳任务
    ///
    /// 每个周期以最近一次已知版本号调用心跳拉取；
    /// 任何错误都被吞掉并记录，保证定时任务不会停摆
    fn start_heartbeat(&mut self, heartbeat_interval: Duration) {
        if self.heartbeat_shutdown.is_some() {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let http = self.http.clone();
        let endpoint = self.endpoint.clone();
        let current = self.current.clone();
        let info = self.info.clone();
        let balancer = self.balancer.clone();

        tokio::spawn(async move {
            let mut ticker = interval(heartbeat_interval);
            // 第一次 tick 立即触发，跳过它避免与注册后的首次拉取重复
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let key = {
                            let current = current.read().await;
                            let Some(service) = current.as_ref() else { continue };
                            ServiceKey {
                                service_name: service.service_name.clone(),
                                guid: service.instance_id,
                            }
                        };
                        if let Err(e) =
                            fetch_instances(&http, &endpoint, &key, &info, balancer.as_ref()).await
                        {
                            warn!(error = %e, "heartbeat failed, will retry on next tick");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("🛑 heartbeat task stopped");
                        break;
                    }
                }
            }
        });

        self.heartbeat_shutdown = Some(shutdown_tx);
    }
}

impl Drop for InstanceManager {
    fn drop(&mut self) {
        if let Some(tx) = self.heartbeat_shutdown.take() {
            let _ = tx.try_send(());
        }
    }
}

/// 心跳拉取
///
/// 空应答表示版本未变化；否则整体替换本地缓存，
/// 并把新快照推给挂接的负载均衡器
async fn fetch_instances(
    http: &reqwest::Client,
    endpoint: &str,
    key: &ServiceKey,
    info: &Arc<RwLock<ServiceInstances>>,
    balancer: Option<&Arc<dyn Balancer>>,
) -> Result<()> {
    let known_version = info.read().await.version;
    let url = format!("{}{}", endpoint, REGISTRY_PATH);

    let resp = http
        .get(&url)
        .query(&[("version", known_version)])
        .json(key)
        .send()
        .await?;

    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(RegistryError::NoSuchInstance);
    }
    if !resp.status().is_success() {
        return Err(RegistryError::transport(format!(
            "registry returned status {}",
            resp.status()
        )));
    }

    let body = resp.bytes().await?;
    if body.is_empty() {
        debug!("instance list is up to date");
        return Ok(());
    }

    let snapshot: ServiceInstances = serde_json::from_slice(&body)
        .map_err(|e| RegistryError::invalid_request(format!("bad snapshot body: {}", e)))?;

    info!(version = snapshot.version, "instance list updated");

    if let Some(balancer) = balancer {
        balancer.refresh_instances(snapshot.instance.clone()).await;
    }
    *info.write().await = snapshot;

    Ok(())
}
