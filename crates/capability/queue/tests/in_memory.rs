use async_trait::async_trait;
use smsgw_queue::{InMemoryQueueGateway, MessageHandler, QueueError, QueueGateway};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct ForwardingHandler {
    sender: mpsc::UnboundedSender<Vec<u8>>,
    fail: bool,
}

#[async_trait]
impl MessageHandler for ForwardingHandler {
    async fn handle(&self, payload: Vec<u8>) -> Result<(), QueueError> {
        let _ = self.sender.send(payload);
        if self.fail {
            return Err(QueueError::Handler("boom".to_string()));
        }
        Ok(())
    }
}

async fn next(receiver: &mut mpsc::UnboundedReceiver<Vec<u8>>) -> Vec<u8> {
    tokio::time::timeout(Duration::from_secs(1), receiver.recv())
        .await
        .expect("timely delivery")
        .expect("payload")
}

#[tokio::test]
async fn declare_is_repeatable() {
    let gateway = InMemoryQueueGateway::new();
    gateway.declare("sms").await.expect("declare");
    gateway.declare("sms").await.expect("declare again");
    assert!(gateway.is_declared("sms"));
}

#[tokio::test]
async fn consumer_receives_backlog_and_new_messages() {
    let gateway = InMemoryQueueGateway::new();
    gateway.publish("sms", b"first").await.expect("publish");

    let (sender, mut receiver) = mpsc::unbounded_channel();
    let _handle = gateway
        .consume("sms", Arc::new(ForwardingHandler { sender, fail: false }))
        .await
        .expect("consume");
    gateway.publish("sms", b"second").await.expect("publish");

    assert_eq!(next(&mut receiver).await, b"first".to_vec());
    assert_eq!(next(&mut receiver).await, b"second".to_vec());
    assert_eq!(gateway.published("sms").len(), 2);
}

#[tokio::test]
async fn handler_errors_do_not_stop_consumer() {
    let gateway = InMemoryQueueGateway::new();
    let (sender, mut receiver) = mpsc::unbounded_channel();
    let handle = gateway
        .consume("sms", Arc::new(ForwardingHandler { sender, fail: true }))
        .await
        .expect("consume");

    gateway.publish("sms", b"a").await.expect("publish");
    gateway.publish("sms", b"b").await.expect("publish");
    assert_eq!(next(&mut receiver).await, b"a".to_vec());
    assert_eq!(next(&mut receiver).await, b"b".to_vec());
    assert!(!handle.is_finished());
}

#[tokio::test]
async fn publish_to_exchange_is_recorded() {
    let gateway = InMemoryQueueGateway::new();
    gateway
        .publish_to("dlr", "smpp_delivery_reports", b"{}")
        .await
        .expect("publish");
    let history = gateway.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].exchange, "dlr");
    assert_eq!(history[0].routing_key, "smpp_delivery_reports");
}

#[tokio::test]
async fn closed_channel_rejects_publish() {
    let gateway = InMemoryQueueGateway::new();
    gateway.close();
    let err = gateway.publish("sms", b"x").await.expect_err("closed");
    assert!(matches!(err, QueueError::ChannelClosed));
    assert!(err.is_retryable());
}
