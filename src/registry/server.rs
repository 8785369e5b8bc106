//! 注册中心服务端
//!
//! 在单一入口 `/_ds` 上暴露注册（POST）、心跳拉取（GET）、注销（DELETE）
//! 三个操作，并运行独立的周期性健康扫描任务。
//! 整个注册表放在一把全局互斥锁后面：注册中心是控制面组件，
//! 写入全局串行化的代价可以接受

use crate::config::RegistryConfig;
use crate::error::Result;
use crate::registry::dto::{
    REGISTRY_PATH, RegisterRequest, RegisteredInfo, ServiceKey, VersionQuery,
};
use crate::registry::store::RegistryStore;
use crate::utils::peer_ip;
use axum::Json;
use axum::Router;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::time::interval;
use tracing::info;

/// 注册表的共享句柄
pub type SharedStore = Arc<Mutex<RegistryStore>>;

/// 注册中心服务端
pub struct RegistryServer {
    store: SharedStore,
    sweep_interval: Duration,
    sweep_shutdown: Option<mpsc::Sender<()>>,
}

impl RegistryServer {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(RegistryStore::new(
                config.up_to_down(),
                config.down_to_remove(),
            ))),
            sweep_interval: config.sweep_interval(),
            sweep_shutdown: None,
        }
    }

    /// 注册表句柄（扫描任务与测试使用）
    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    /// 构建路由：三个操作共用一个入口路径
    pub fn router(&self) -> Router {
        Router::new()
            .route(
                REGISTRY_PATH,
                post(register_handler)
                    .get(heartbeat_handler)
                    .delete(deregister_handler),
            )
            .with_state(self.store.clone())
    }

    /// 启动周期性健康扫描任务
    ///
    /// 任务独立于任何请求，持有注册表独占锁完成整表扫描，
    /// 通过关闭信号停止
    pub fn start_sweep(&mut self) {
        if self.sweep_shutdown.is_some() {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let store = self.store.clone();
        let sweep_interval = self.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        store.lock().await.sweep(Utc::now());
                    }
                    _ = shutdown_rx.recv() => {
                        info!("🛑 registry sweep task stopped");
                        break;
                    }
                }
            }
        });

        self.sweep_shutdown = Some(shutdown_tx);
    }

    /// 停止健康扫描任务
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.sweep_shutdown.take() {
            let _ = tx.try_send(());
        }
    }

    /// 启动扫描任务并在指定地址上对外服务（阻塞直到服务退出）
    pub async fn serve(mut self, addr: SocketAddr) -> Result<()> {
        self.start_sweep();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "registry server listening");
        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }
}

impl Drop for RegistryServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// 注册：分配身份并写入注册表，版本号自增
async fn register_handler(
    State(store): State<SharedStore>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(req): Json<RegisterRequest>,
) -> Json<RegisteredInfo> {
    let mut store = store.lock().await;
    Json(store.register(&req, peer_ip(&peer)))
}

/// 心跳拉取：刷新心跳时间，版本未变化时返回空应答
async fn heartbeat_handler(
    State(store): State<SharedStore>,
    Query(query): Query<VersionQuery>,
    Json(key): Json<ServiceKey>,
) -> Result<Response> {
    let mut store = store.lock().await;
    store.heartbeat(&key)?;

    match store.snapshot_if_newer(query.version) {
        Some(snapshot) => Ok(Json(snapshot).into_response()),
        None => Ok(StatusCode::OK.into_response()),
    }
}

/// 注销：只接受来自注册时同一地址的请求
async fn deregister_handler(
    State(store): State<SharedStore>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(key): Json<ServiceKey>,
) -> Result<StatusCode> {
    let mut store = store.lock().await;
    store.deregister(&key, &peer_ip(&peer))?;
    Ok(StatusCode::OK)
}
