//! 工具模块

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// 系统资源快照（仅供参考，不参与调度决策）
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SystemLoad {
    pub cpu_use: u32,
    pub memory_total: u64,
    pub memory_used: u64,
}

impl SystemLoad {
    /// 采集当前进程的资源快照
    ///
    /// TODO: 接入 /proc 读取真实 CPU 与内存占用，目前上报零值
    pub fn acquire() -> Self {
        Self::default()
    }
}

/// 从对端 socket 地址提取 IP 部分
///
/// 实例地址一律取自注册中心观察到的对端地址，不信任调用方上报的值
pub fn peer_ip(addr: &SocketAddr) -> String {
    addr.ip().to_string()
}
