mod common;

use api_contract::{DeliveryReportMessage, DeviceReceiptMessage};
use common::device;
use domain::{MessageStatus, Priority};
use smsgw_pipeline::{DeliveryReportPublisher, DeviceReceiptHandler, ReceiptOutcome};
use smsgw_queue::InMemoryQueueGateway;
use smsgw_storage::{InMemoryMessageLogStore, MessageLogRecord, MessageLogStore};
use std::sync::Arc;

const DLR_ROUTING_KEY: &str = "sms.dlr";

struct Fixture {
    logs: Arc<InMemoryMessageLogStore>,
    queue: Arc<InMemoryQueueGateway>,
    handler: DeviceReceiptHandler,
}

fn fixture() -> Fixture {
    let logs = Arc::new(InMemoryMessageLogStore::new());
    let queue = Arc::new(InMemoryQueueGateway::new());
    let reports = Arc::new(DeliveryReportPublisher::new(
        queue.clone(),
        "",
        DLR_ROUTING_KEY,
    ));
    let handler = DeviceReceiptHandler::new(logs.clone(), Some(reports));
    Fixture {
        logs,
        queue,
        handler,
    }
}

fn telecom_log(message_id: &str) -> MessageLogRecord {
    let mut log = MessageLogRecord::outbound(
        message_id,
        "+15551234567",
        "hello from the telecom side of things",
        Priority::Normal,
        100,
    )
    .with_device(&device("dev-1", "field-team", true));
    log.correlation_id = Some("smpp-1".to_string());
    log.system_id = Some("ACME".to_string());
    log.source_addr = "ACME".to_string();
    log.delivery_report_requested = true;
    log.status = MessageStatus::Sent;
    log
}

fn receipt(message_id: &str, status: &str) -> DeviceReceiptMessage {
    DeviceReceiptMessage {
        message_id: message_id.to_string(),
        status: status.to_string(),
        error: None,
        ts_ms: Some(500),
    }
}

#[tokio::test]
async fn delivered_receipt_patches_log_and_publishes_report() {
    let fx = fixture();
    fx.logs.create_log(telecom_log("msg-1")).await.expect("log");

    let outcome = fx
        .handler
        .process("dev-1", &receipt("msg-1", "delivered"))
        .await
        .expect("process");
    assert_eq!(
        outcome,
        ReceiptOutcome::Delivered {
            report_published: true
        }
    );

    let log = fx.logs.find_log("msg-1").await.expect("find").expect("log");
    assert_eq!(log.status, MessageStatus::Delivered);
    assert_eq!(log.delivered_at_ms, Some(500));

    let published = fx.queue.published(DLR_ROUTING_KEY);
    assert_eq!(published.len(), 1);
    let report: DeliveryReportMessage =
        serde_json::from_slice(&published[0]).expect("report");
    assert_eq!(report.message_id, "smpp-1");
    assert_eq!(report.system_id, "ACME");
    assert!(report.delivered);
    assert!(!report.failed);
    assert_eq!(report.error_code, 0);
    assert_eq!(report.submit_date, 100);
    assert_eq!(report.done_date, 500);
    assert_eq!(
        report.original_text.as_deref(),
        Some("hello from the telec")
    );
}

#[tokio::test]
async fn failed_receipt_reports_undeliverable() {
    let fx = fixture();
    fx.logs.create_log(telecom_log("msg-2")).await.expect("log");
    let mut failed = receipt("msg-2", "failed");
    failed.error = Some("radio off".to_string());

    let outcome = fx.handler.process("dev-1", &failed).await.expect("process");
    assert_eq!(
        outcome,
        ReceiptOutcome::Failed {
            report_published: true
        }
    );
    let log = fx.logs.find_log("msg-2").await.expect("find").expect("log");
    assert_eq!(log.error_message.as_deref(), Some("radio off"));

    let published = fx.queue.published(DLR_ROUTING_KEY);
    let report: DeliveryReportMessage =
        serde_json::from_slice(&published[0]).expect("report");
    assert!(report.failed);
    assert_eq!(report.error_code, 1);
    assert_eq!(report.failure_reason.as_deref(), Some("radio off"));
}

#[tokio::test]
async fn application_log_gets_no_report() {
    let fx = fixture();
    let mut log = telecom_log("msg-3");
    log.correlation_id = None;
    fx.logs.create_log(log).await.expect("log");

    let outcome = fx
        .handler
        .process("dev-1", &receipt("msg-3", "ok"))
        .await
        .expect("process");
    assert_eq!(
        outcome,
        ReceiptOutcome::Delivered {
            report_published: false
        }
    );
    assert!(fx.queue.history().is_empty());
}

#[tokio::test]
async fn receipts_that_do_not_match_a_log_are_ignored() {
    let fx = fixture();
    fx.logs.create_log(telecom_log("msg-4")).await.expect("log");

    let unknown = fx
        .handler
        .process("dev-1", &receipt("msg-missing", "delivered"))
        .await
        .expect("process");
    assert_eq!(unknown, ReceiptOutcome::UnknownMessage);

    let mismatch = fx
        .handler
        .process("dev-2", &receipt("msg-4", "delivered"))
        .await
        .expect("process");
    assert_eq!(mismatch, ReceiptOutcome::DeviceMismatch);

    let unrecognized = fx
        .handler
        .process("dev-1", &receipt("msg-4", "maybe"))
        .await
        .expect("process");
    assert_eq!(unrecognized, ReceiptOutcome::UnrecognizedStatus);

    let log = fx.logs.find_log("msg-4").await.expect("find").expect("log");
    assert_eq!(log.status, MessageStatus::Sent);
    assert!(fx.queue.history().is_empty());
}

#[tokio::test]
async fn fan_out_reports_first_delivery_once() {
    let fx = fixture();
    for id in ["msg-a", "msg-b", "msg-c"] {
        fx.logs.create_log(telecom_log(id)).await.expect("log");
    }

    let first = fx
        .handler
        .process("dev-1", &receipt("msg-a", "delivered"))
        .await
        .expect("process");
    assert_eq!(
        first,
        ReceiptOutcome::Delivered {
            report_published: true
        }
    );
    for id in ["msg-b", "msg-c"] {
        let outcome = fx
            .handler
            .process("dev-1", &receipt(id, "failed"))
            .await
            .expect("process");
        assert_eq!(
            outcome,
            ReceiptOutcome::Failed {
                report_published: false
            }
        );
    }

    let published = fx.queue.published(DLR_ROUTING_KEY);
    assert_eq!(published.len(), 1);
    let report: DeliveryReportMessage =
        serde_json::from_slice(&published[0]).expect("report");
    assert!(report.delivered);
    assert_eq!(report.message_id, "smpp-1");
}

#[tokio::test]
async fn second_delivery_on_fan_out_is_not_reported() {
    let fx = fixture();
    for id in ["msg-a", "msg-b"] {
        fx.logs.create_log(telecom_log(id)).await.expect("log");
    }

    for (id, expected) in [("msg-a", true), ("msg-b", false)] {
        let outcome = fx
            .handler
            .process("dev-1", &receipt(id, "delivered"))
            .await
            .expect("process");
        assert_eq!(
            outcome,
            ReceiptOutcome::Delivered {
                report_published: expected
            }
        );
    }
    assert_eq!(fx.queue.published(DLR_ROUTING_KEY).len(), 1);
}

#[tokio::test]
async fn fan_out_reports_failure_after_last_attempt_fails() {
    let fx = fixture();
    for id in ["msg-a", "msg-b", "msg-c"] {
        fx.logs.create_log(telecom_log(id)).await.expect("log");
    }

    for id in ["msg-a", "msg-b"] {
        fx.handler
            .process("dev-1", &receipt(id, "failed"))
            .await
            .expect("process");
        assert!(fx.queue.published(DLR_ROUTING_KEY).is_empty());
    }
    let last = fx
        .handler
        .process("dev-1", &receipt("msg-c", "failed"))
        .await
        .expect("process");
    assert_eq!(
        last,
        ReceiptOutcome::Failed {
            report_published: true
        }
    );

    let published = fx.queue.published(DLR_ROUTING_KEY);
    assert_eq!(published.len(), 1);
    let report: DeliveryReportMessage =
        serde_json::from_slice(&published[0]).expect("report");
    assert!(report.failed);
}

#[tokio::test]
async fn late_receipt_does_not_change_terminal_log() {
    let fx = fixture();
    fx.logs.create_log(telecom_log("msg-5")).await.expect("log");

    fx.handler
        .process("dev-1", &receipt("msg-5", "delivered"))
        .await
        .expect("process");
    let late = fx
        .handler
        .process("dev-1", &receipt("msg-5", "failed"))
        .await
        .expect("process");
    assert_eq!(late, ReceiptOutcome::Duplicate);

    let log = fx.logs.find_log("msg-5").await.expect("find").expect("log");
    assert_eq!(log.status, MessageStatus::Delivered);
    assert!(log.error_message.is_none());
    assert_eq!(fx.queue.published(DLR_ROUTING_KEY).len(), 1);
}
