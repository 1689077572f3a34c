use api_contract::{
    PriorityField, SendRequestMessage, SendResponseMessage, SendSmsRequest, SubmissionMessage,
};

#[test]
fn send_request_accepts_missing_optional_fields() {
    let payload = r#"{"system_id":"crm","device_id":"dev-1","phone_number":"+15550001","message":"hi"}"#;
    let req: SendRequestMessage = serde_json::from_str(payload).expect("parse");
    assert_eq!(req.system_id, "crm");
    assert!(req.message_id.is_none());
    assert!(req.priority.is_none());
    assert!(req.sim_slot.is_none());
}

#[test]
fn send_request_priority_accepts_text_or_number() {
    let text: SendRequestMessage = serde_json::from_str(
        r#"{"system_id":"a","device_id":"d","phone_number":"p","message":"m","priority":"high"}"#,
    )
    .expect("parse text");
    assert_eq!(text.priority, Some(PriorityField::Text("high".to_string())));
    let flag: SendRequestMessage = serde_json::from_str(
        r#"{"system_id":"a","device_id":"d","phone_number":"p","message":"m","priority":2}"#,
    )
    .expect("parse flag");
    assert_eq!(flag.priority, Some(PriorityField::Flag(2)));
}

#[test]
fn send_response_omits_empty_error() {
    let response = SendResponseMessage {
        system_id: "crm".to_string(),
        message_id: "m-1".to_string(),
        status: "queued".to_string(),
        error: None,
    };
    let value = serde_json::to_value(response).expect("serialize");
    assert_eq!(value["status"], "queued");
    assert!(value.get("error").is_none());
}

#[test]
fn submission_accepts_short_aliases() {
    let payload = r#"{"system_id":"ACME","dest":"+15551234567","body":"hi",
        "concatenation":{"reference_number":7,"total_segments":2,"sequence_number":1}}"#;
    let submission: SubmissionMessage = serde_json::from_str(payload).expect("parse");
    assert_eq!(submission.destination_addr, "+15551234567");
    assert_eq!(submission.message, "hi");
    assert_eq!(submission.source_addr, "");
    assert_eq!(submission.priority_flag, None);
    let concat = submission.concatenation.expect("concatenation");
    assert_eq!(concat.total_segments, 2);
}

#[test]
fn http_send_request_is_camel_case() {
    let payload = r#"{"systemId":"crm","deviceId":"dev-1","phoneNumber":"+1","message":"hi"}"#;
    let req: SendSmsRequest = serde_json::from_str(payload).expect("parse");
    assert_eq!(req.device_id, "dev-1");
    assert!(req.priority.is_none());
}

#[test]
fn submission_priority_flag_tolerates_any_json_value() {
    let big: SubmissionMessage = serde_json::from_str(
        r#"{"system_id":"ACME","dest":"+1","body":"hi","priority_flag":300}"#,
    )
    .expect("parse large flag");
    assert_eq!(big.priority_flag, Some(PriorityField::Flag(300)));
    let negative: SubmissionMessage = serde_json::from_str(
        r#"{"system_id":"ACME","dest":"+1","body":"hi","priority_flag":-1}"#,
    )
    .expect("parse negative flag");
    assert!(matches!(negative.priority_flag, Some(PriorityField::Other(_))));
}
