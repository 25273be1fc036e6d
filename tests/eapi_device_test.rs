use anta::domain::model::OutputFormat;
use anta::{AntaCommand, AntaDevice, AsyncEosDevice, DeviceOptions};
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;

fn device_for(server: &MockServer) -> DeviceOptions {
    let mut options = DeviceOptions::new(server.host(), "admin", "admin");
    options.proto = "http".to_string();
    options.port = Some(server.port());
    options.name = Some("leaf1".to_string());
    options.timeout = Duration::from_secs(5);
    options
}

#[tokio::test]
async fn test_refresh_reads_hardware_model() {
    let server = MockServer::start();
    let version_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/command-api")
            .header("Authorization", "Basic YWRtaW46YWRtaW4=")
            .body_contains("show version");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({
                "jsonrpc": "2.0",
                "id": "anta-1",
                "result": [{"modelName": "DCS-7280CR3-32P4", "version": "4.31.1F"}]
            }));
    });

    let device = AsyncEosDevice::new(device_for(&server)).unwrap();
    assert!(!device.established());

    device.refresh().await;

    version_mock.assert();
    assert!(device.is_online());
    assert!(device.established());
    assert_eq!(device.hw_model().as_deref(), Some("DCS-7280CR3-32P4"));
}

#[tokio::test]
async fn test_refresh_unreachable_device() {
    let mut options = DeviceOptions::new("127.0.0.1", "admin", "admin");
    options.proto = "http".to_string();
    options.port = Some(9);
    options.timeout = Duration::from_secs(2);
    let device = AsyncEosDevice::new(options).unwrap();

    device.refresh().await;

    assert!(!device.is_online());
    assert!(!device.established());
    assert!(device.hw_model().is_none());
}

#[tokio::test]
async fn test_enable_is_sent_before_command() {
    let server = MockServer::start();
    let clock_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/command-api")
            .body_contains(r#"{"cmd":"enable","input":"secret"}"#)
            .body_contains("show clock");
        then.status(200).json_body(json!({
            "jsonrpc": "2.0",
            "id": "anta-1",
            "result": [{}, {"utcTime": 1700000000.0}]
        }));
    });

    let mut options = device_for(&server);
    options.enable = true;
    options.enable_password = Some("secret".to_string());
    let device = AsyncEosDevice::new(options).unwrap();

    let mut command = AntaCommand::new("show clock");
    device.collect(&mut command).await;

    clock_mock.assert();
    assert!(command.collected());
    assert_eq!(command.json_output().unwrap()["utcTime"], json!(1700000000.0));
}

#[tokio::test]
async fn test_command_error_is_recorded() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/command-api").body_contains("show bgp summary");
        then.status(200).json_body(json!({
            "jsonrpc": "2.0",
            "id": "anta-1",
            "error": {
                "code": 1002,
                "message": "CLI command 1 of 1 'show bgp summary' failed: invalid command",
                "data": [{"errors": ["Invalid input (at token 1: 'bgp')"]}]
            }
        }));
    });

    let device = AsyncEosDevice::new(device_for(&server)).unwrap();
    let mut command = AntaCommand::new("show bgp summary");
    device.collect(&mut command).await;

    assert!(command.error());
    assert!(!command.collected());
    assert_eq!(command.errors, vec!["Invalid input (at token 1: 'bgp')".to_string()]);
    assert!(command.supported());
}

#[tokio::test]
async fn test_unsupported_command_is_detected() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/command-api").body_contains("show hardware counter drop");
        then.status(200).json_body(json!({
            "jsonrpc": "2.0",
            "id": "anta-1",
            "error": {
                "code": 1000,
                "message": "CLI command 1 of 1 'show hardware counter drop' failed",
                "data": [{"errors": ["Unavailable command (not supported on this hardware platform)"]}]
            }
        }));
    });

    let device = AsyncEosDevice::new(device_for(&server)).unwrap();
    let mut command = AntaCommand::new("show hardware counter drop");
    device.collect(&mut command).await;

    assert!(command.error());
    assert!(!command.supported());
}

#[tokio::test]
async fn test_text_output() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/command-api")
            .body_contains(r#""format":"text""#)
            .body_contains("show ntp status");
        then.status(200).json_body(json!({
            "jsonrpc": "2.0",
            "id": "anta-1",
            "result": [{"output": "synchronised to NTP server (10.0.0.1) at stratum 3\n"}]
        }));
    });

    let device = AsyncEosDevice::new(device_for(&server)).unwrap();
    let mut command = AntaCommand::new("show ntp status").with_ofmt(OutputFormat::Text);
    device.collect(&mut command).await;

    assert!(command.collected());
    assert!(command.text_output().unwrap().starts_with("synchronised"));
}

#[tokio::test]
async fn test_cached_command_sent_once() {
    let server = MockServer::start();
    let uptime_mock = server.mock(|when, then| {
        when.method(POST).path("/command-api").body_contains("show uptime");
        then.status(200).json_body(json!({
            "jsonrpc": "2.0",
            "id": "anta-1",
            "result": [{"upTime": 1000000.0}]
        }));
    });

    let device = AsyncEosDevice::new(device_for(&server)).unwrap();
    let mut first = AntaCommand::new("show uptime");
    let mut second = AntaCommand::new("show uptime");
    device.collect(&mut first).await;
    device.collect(&mut second).await;

    uptime_mock.assert_hits(1);
    assert_eq!(first.output, second.output);
    let stats = device.cache_statistics().await.unwrap();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.total, 2);
}

#[tokio::test]
async fn test_disabled_cache_always_sends() {
    let server = MockServer::start();
    let uptime_mock = server.mock(|when, then| {
        when.method(POST).path("/command-api").body_contains("show uptime");
        then.status(200).json_body(json!({
            "jsonrpc": "2.0",
            "id": "anta-1",
            "result": [{"upTime": 1000000.0}]
        }));
    });

    let mut options = device_for(&server);
    options.disable_cache = true;
    let device = AsyncEosDevice::new(options).unwrap();
    for _ in 0..2 {
        let mut command = AntaCommand::new("show uptime");
        device.collect(&mut command).await;
        assert!(command.collected());
    }

    uptime_mock.assert_hits(2);
    assert!(device.cache_statistics().await.is_none());
}

#[tokio::test]
async fn test_http_error_status() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/command-api");
        then.status(401).body("Unauthorized");
    });

    let device = AsyncEosDevice::new(device_for(&server)).unwrap();
    let mut command = AntaCommand::new("show version");
    device.collect(&mut command).await;

    assert!(command.error());
    assert!(command.errors[0].contains("401"));
}

#[tokio::test]
async fn test_max_connections_serializes_requests() {
    let server = MockServer::start();
    let slow_mock = server.mock(|when, then| {
        when.method(POST).path("/command-api");
        then.status(200)
            .delay(Duration::from_millis(200))
            .json_body(json!({"jsonrpc": "2.0", "id": "anta-1", "result": [{}]}));
    });

    let mut options = device_for(&server);
    options.max_connections = 1;
    options.disable_cache = true;
    let device = AsyncEosDevice::new(options).unwrap();

    let mut clock = AntaCommand::new("show clock");
    let mut hostname = AntaCommand::new("show hostname");
    let started = std::time::Instant::now();
    tokio::join!(device.collect(&mut clock), device.collect(&mut hostname));

    // 同一台裝置一次只允許一個連線，兩個請求依序完成
    assert!(started.elapsed() >= Duration::from_millis(400));
    assert!(clock.collected());
    assert!(hostname.collected());
    slow_mock.assert_hits(2);
}
