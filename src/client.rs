//! 服务间调用客户端
//!
//! 绑定到某个被选中实例的出站 HTTP 客户端，超时由负载均衡配置决定

use crate::error::{RegistryError, Result};
use crate::registry::instance::MicroService;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// 被选中实例的调用句柄
///
/// 底层复用负载均衡器的 reqwest 连接池，只绑定目标实例的基础地址
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl ServiceClient {
    pub(crate) fn new(http: reqwest::Client, service: &MicroService) -> Self {
        Self {
            http,
            base_url: service.to_http_url(),
        }
    }

    /// 目标实例的基础地址（`http://address:port`）
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET 请求并反序列化 JSON 应答
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        Self::parse(resp).await
    }

    /// POST JSON 请求并反序列化 JSON 应答
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        Self::parse(resp).await
    }

    async fn parse<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        if !resp.status().is_success() {
            return Err(RegistryError::transport(format!(
                "instance returned status {}",
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }
}
