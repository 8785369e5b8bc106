//! 平滑加权轮询均衡器测试
//!
//! 覆盖公平性分布、无簇可用、以及与全量刷新并发时的原子性

use pulse_registry::{Balancer, MicroService, RegistryError, WrrBalancer};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn weighted(service_name: &str, port: u16, weight: u32) -> MicroService {
    MicroService::new_weighted(service_name, port, weight)
}

fn topology(service_name: &str, ports_weights: &[(u16, u32)]) -> HashMap<String, Vec<MicroService>> {
    HashMap::from([(
        service_name.to_string(),
        ports_weights
            .iter()
            .map(|&(port, weight)| weighted(service_name, port, weight))
            .collect(),
    )])
}

/// 权重 [1,2,3] 的三个实例，12 次连续选取（无反馈介入）
/// 必须精确分布为 [2,4,6]
#[tokio::test]
async fn wrr_distribution_is_proportional_to_weight() {
    let balancer = WrrBalancer::new(Duration::from_secs(10)).unwrap();

    let mut instances = topology("SN1", &[(1001, 1), (1002, 2), (1003, 3)]);
    instances.extend(topology("SN2", &[(1001, 1), (1002, 2), (1003, 3)]));
    balancer.refresh_instances(instances).await;

    let mut total = [0usize; 3];
    for _ in 0..12 {
        let picked = balancer.pick_instance("SN1").await.unwrap();
        total[picked.index()] += 1;
    }

    assert_eq!(total, [2, 4, 6]);
}

/// 平滑性：权重最高的实例不会被突发式连选，
/// 一个完整周期内的选取序列是确定的交错序列
#[tokio::test]
async fn wrr_selection_order_is_smooth() {
    let balancer = WrrBalancer::new(Duration::from_secs(10)).unwrap();
    balancer
        .refresh_instances(topology("SN1", &[(1001, 1), (1002, 2), (1003, 3)]))
        .await;

    let mut order = Vec::new();
    for _ in 0..6 {
        order.push(balancer.pick_instance("SN1").await.unwrap().index());
    }

    assert_eq!(order, vec![2, 1, 0, 2, 1, 2]);
}

/// 未知服务名：返回 None，由调用方决定如何处理
#[tokio::test]
async fn pick_unknown_service_returns_none() {
    let balancer = WrrBalancer::new(Duration::from_secs(10)).unwrap();
    assert!(balancer.pick_instance("nope").await.is_none());

    // 空实例列表同样视为无可用实例
    balancer
        .refresh_instances(HashMap::from([("empty".to_string(), Vec::new())]))
        .await;
    assert!(balancer.pick_instance("empty").await.is_none());
}

/// 选取的结果携带指向实例的调用句柄
#[tokio::test]
async fn picked_service_carries_client_handle() {
    let balancer = WrrBalancer::new(Duration::from_secs(10)).unwrap();
    let mut instance = weighted("SN1", 9001, 1);
    instance.address = "10.1.2.3".to_string();
    balancer
        .refresh_instances(HashMap::from([("SN1".to_string(), vec![instance])]))
        .await;

    let picked = balancer.pick_instance("SN1").await.unwrap();
    assert_eq!(picked.client.base_url(), "http://10.1.2.3:9001");
    assert_eq!(picked.service.port, 9001);
}

/// 调用句柄打通请求与解析路径：对被选实例发起 GET/POST 并反序列化应答，
/// 非 2xx 应答映射为传输错误
#[tokio::test]
async fn picked_client_round_trips_json() {
    use axum::Json;
    use axum::routing::{get, post};

    // 目标实例：一个最小的 HTTP 服务
    let app = axum::Router::new()
        .route(
            "/ping",
            get(|| async { Json(serde_json::json!({ "pong": true })) }),
        )
        .route(
            "/echo",
            post(|Json(body): Json<serde_json::Value>| async move { Json(body) }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let balancer = WrrBalancer::new(Duration::from_secs(5)).unwrap();
    let mut instance = weighted("SN1", port, 1);
    instance.address = "127.0.0.1".to_string();
    balancer
        .refresh_instances(HashMap::from([("SN1".to_string(), vec![instance])]))
        .await;

    let picked = balancer.pick_instance("SN1").await.unwrap();

    let pong: serde_json::Value = picked.client.get_json("/ping").await.unwrap();
    assert_eq!(pong["pong"], true);

    let echoed: serde_json::Value = picked
        .client
        .post_json("/echo", &serde_json::json!({ "seq": 7 }))
        .await
        .unwrap();
    assert_eq!(echoed["seq"], 7);

    let err = picked
        .client
        .get_json::<serde_json::Value>("/missing")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Transport(_)));
}

/// 刷新原子性：与刷新并发的选取永远返回新旧两个拓扑之一的实例，
/// 不会观察到半更新状态
#[tokio::test]
async fn concurrent_pick_and_refresh_observe_whole_topologies() {
    let balancer = Arc::new(WrrBalancer::new(Duration::from_secs(10)).unwrap());
    balancer
        .refresh_instances(topology("SN1", &[(1001, 1), (1002, 2), (1003, 3)]))
        .await;

    let refresher = {
        let balancer = balancer.clone();
        tokio::spawn(async move {
            for round in 0..200 {
                let ports: &[(u16, u32)] = if round % 2 == 0 {
                    &[(2001, 3), (2002, 2), (2003, 1)]
                } else {
                    &[(1001, 1), (1002, 2), (1003, 3)]
                };
                balancer.refresh_instances(topology("SN1", ports)).await;
                tokio::task::yield_now().await;
            }
        })
    };

    let picker = {
        let balancer = balancer.clone();
        tokio::spawn(async move {
            for _ in 0..2000 {
                if let Some(picked) = balancer.pick_instance("SN1").await {
                    let port = picked.service.port;
                    assert!(
                        (1001..=1003).contains(&port) || (2001..=2003).contains(&port),
                        "picked instance from a mixed topology: port {}",
                        port
                    );
                    balancer.notify_effect(&picked, port % 2 == 0).await;
                }
            }
        })
    };

    refresher.await.unwrap();
    picker.await.unwrap();
}
