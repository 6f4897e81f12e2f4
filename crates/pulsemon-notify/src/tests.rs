use crate::{deliver, NotificationChannel, SlackConfig, SlackWebhookChannel};
use chrono::{TimeZone, Utc};
use pulsemon_common::types::{AlertEventType, AlertNotice, NoticeField};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn notice(kind: AlertEventType, channel: Option<&str>) -> AlertNotice {
    AlertNotice {
        kind,
        text: "Alert: High latency — axiom.latency.p95 is 812 (threshold: gt 500)".into(),
        fields: vec![
            NoticeField {
                title: "Metric".into(),
                value: "axiom.latency.p95".into(),
                short: true,
            },
            NoticeField {
                title: "Value".into(),
                value: "812".into(),
                short: true,
            },
        ],
        channel: channel.map(str::to_string),
        timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    }
}

fn channel(server: &MockServer, default_channel: Option<&str>) -> SlackWebhookChannel {
    SlackWebhookChannel::new(
        SlackConfig {
            webhook_url: Some(format!("{}/services/T000/B000/XXX", server.uri())),
            default_channel: default_channel.map(str::to_string),
        },
        reqwest::Client::new(),
    )
}

#[tokio::test]
async fn fired_notice_posts_danger_attachment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/services/T000/B000/XXX"))
        .and(body_json(serde_json::json!({
            "channel": "#ops",
            "attachments": [{
                "color": "danger",
                "text": "Alert: High latency — axiom.latency.p95 is 812 (threshold: gt 500)",
                "fields": [
                    { "title": "Metric", "value": "axiom.latency.p95", "short": true },
                    { "title": "Value", "value": "812", "short": true }
                ],
                "ts": 1772366400
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    channel(&server, Some("#alerts"))
        .send(&notice(AlertEventType::Fired, Some("#ops")))
        .await
        .unwrap();
}

#[tokio::test]
async fn resolved_notice_uses_default_channel_and_good_color() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    channel(&server, Some("#alerts"))
        .send(&notice(AlertEventType::Resolved, None))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["channel"], "#alerts");
    assert_eq!(body["attachments"][0]["color"], "good");
}

#[tokio::test]
async fn channel_is_omitted_when_none_configured() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    channel(&server, None)
        .send(&notice(AlertEventType::Fired, None))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("channel").is_none());
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no_service"))
        .mount(&server)
        .await;

    let slack = channel(&server, None);
    let err = slack
        .send(&notice(AlertEventType::Fired, None))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("status=404"));
    assert!(err.to_string().contains("no_service"));

    // deliver swallows the failure and does not retry
    deliver(&slack, &notice(AlertEventType::Fired, None)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn missing_webhook_url_skips_delivery() {
    let slack = SlackWebhookChannel::new(SlackConfig::default(), reqwest::Client::new());
    assert!(!slack.is_configured());
    slack
        .send(&notice(AlertEventType::Fired, Some("#ops")))
        .await
        .unwrap();
}
