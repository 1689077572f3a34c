//! 短信网关运行时：队列消费、设备下发、链路注册表维护与运维 HTTP 接口。

mod handlers;
mod middleware;
mod routes;
mod utils;

use domain::permissions::{AccessPolicy, StaticAccessPolicy};
use smsgw_config::AppConfig;
use smsgw_link::{
    DispatchConfig, MqttLinkConfig, MqttLinkTransport, PresenceTracker,
    RegistryGuardedDispatcher, SweepConfig, release_instance_links, spawn_link_listener,
    spawn_registry_sweeper,
};
use smsgw_pipeline::{DeliveryReportPublisher, DeviceReceiptHandler, SmsIngestor, SubmissionRouter};
use smsgw_queue::{AmqpQueueConfig, AmqpQueueGateway, QueueGateway};
use smsgw_storage::{
    LinkRegistry, PgDeviceStore, PgMessageLogStore, PgRoutingRuleStore, RedisLinkRegistry,
    connect_pool,
};
use smsgw_telemetry::init_tracing;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub instance_id: String,
    pub registry: Arc<dyn LinkRegistry>,
    pub queue: Arc<dyn QueueGateway>,
    pub send_queue: String,
    pub policy: Arc<dyn AccessPolicy>,
    /// `api_key → role`
    pub api_keys: Arc<HashMap<String, String>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    // Postgres：设备、路由规则、消息日志共用连接池
    let pool = connect_pool(&config.database_url).await?;
    let devices = Arc::new(PgDeviceStore::new(pool.clone()));
    let rules = Arc::new(PgRoutingRuleStore::new(pool.clone()));
    let logs = Arc::new(PgMessageLogStore::new(pool));

    // Redis：跨实例共享的链路注册表
    let registry: Arc<dyn LinkRegistry> = Arc::new(RedisLinkRegistry::connect(
        &config.redis_url,
        config.registry_ttl_seconds,
    )?);

    // AMQP：有限次重试建连，声明固定队列
    let amqp = Arc::new(AmqpQueueGateway::new(AmqpQueueConfig {
        url: config.amqp_url.clone(),
        connect_attempts: config.amqp_connect_attempts,
        retry_delay_ms: config.amqp_retry_delay_ms,
    }));
    amqp.connect().await?;
    let queue: Arc<dyn QueueGateway> = amqp;
    queue.declare(&config.send_queue).await?;
    queue.declare(&config.submit_queue).await?;
    if config.dlr_exchange.is_empty() {
        queue.declare(&config.dlr_routing_key).await?;
    }

    // MQTT：设备链路下发
    let link_config = MqttLinkConfig {
        host: config.mqtt_host.clone(),
        port: config.mqtt_port,
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        topic_prefix: config.mqtt_topic_prefix.clone(),
        qos: config.mqtt_qos,
    };
    let (transport, mqtt_handle) = MqttLinkTransport::connect(link_config.clone())?;
    let dispatcher = Arc::new(RegistryGuardedDispatcher::new(
        config.instance_id.clone(),
        registry.clone(),
        Arc::new(transport),
        DispatchConfig {
            max_retries: config.dispatch_max_retries,
            backoff_ms: config.dispatch_backoff_ms,
        },
    ));

    // 队列消费者：应用侧接入 + 电信侧路由，各自独立任务
    let ingestor = Arc::new(SmsIngestor::new(
        devices.clone(),
        logs.clone(),
        dispatcher.clone(),
        queue.clone(),
    ));
    let reports = Arc::new(DeliveryReportPublisher::new(
        queue.clone(),
        config.dlr_exchange.clone(),
        config.dlr_routing_key.clone(),
    ));
    let router = Arc::new(
        SubmissionRouter::new(rules, devices, logs.clone(), dispatcher)
            .with_reports(reports.clone()),
    );
    let mut tasks = vec![
        mqtt_handle,
        queue.consume(&config.send_queue, ingestor).await?,
        queue.consume(&config.submit_queue, router).await?,
    ];

    tasks.push(spawn_registry_sweeper(
        registry.clone(),
        SweepConfig {
            interval: Duration::from_secs(config.registry_sweep_interval_seconds),
            stale_after: Duration::from_secs(config.registry_stale_after_seconds),
        },
    ));

    if config.link_listener_enabled {
        let receipts = Arc::new(DeviceReceiptHandler::new(logs, Some(reports)));
        let tracker = Arc::new(PresenceTracker::new(
            config.instance_id.clone(),
            registry.clone(),
        ));
        tasks.push(spawn_link_listener(link_config, tracker, receipts));
    }

    let state = AppState {
        instance_id: config.instance_id.clone(),
        registry: registry.clone(),
        queue,
        send_queue: config.send_queue.clone(),
        policy: Arc::new(StaticAccessPolicy::with_default_roles()),
        api_keys: Arc::new(config.api_keys.iter().cloned().collect()),
    };
    let app = routes::create_app(state);

    info!(
        target: "smsgw.api",
        instance_id = %config.instance_id,
        http_addr = %config.http_addr,
        link_listener = config.link_listener_enabled,
        "gateway_started"
    );
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 退出前释放本实例持有的链路记录
    if let Err(err) = release_instance_links(registry.as_ref(), &config.instance_id).await {
        warn!(
            target: "smsgw.registry",
            instance_id = %config.instance_id,
            error = %err,
            "registry_release_on_shutdown_failed"
        );
    }
    for task in tasks {
        task.abort();
    }
    info!(target: "smsgw.api", instance_id = %config.instance_id, "gateway_stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(target: "smsgw.api", error = %err, "shutdown_signal_failed");
        std::future::pending::<()>().await;
    }
}
