//! Runs the bridge binary and subscribes over WebSocket.

use std::io::Write;
use std::process::{Child, Command};
use std::time::Duration;

use futures_util::StreamExt;
use tokio_tungstenite::{connect_async, tungstenite::Message};

struct Bridge(Child);

impl Drop for Bridge {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn spawn(args: &[&str], token: Option<&str>) -> Bridge {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_wattline_bridge"));
    cmd.args(args);
    match token {
        Some(t) => cmd.env("WATTLINE_BRIDGE_TOKEN", t),
        None => cmd.env_remove("WATTLINE_BRIDGE_TOKEN"),
    };
    Bridge(cmd.spawn().expect("spawn bridge"))
}

async fn first_text(url: &str) -> String {
    // The bridge needs a moment to bind; retry for a few seconds.
    for _ in 0..50 {
        if let Ok((mut ws, _)) = connect_async(url).await {
            let next = tokio::time::timeout(Duration::from_secs(5), ws.next()).await;
            if let Ok(Some(Ok(Message::Text(t)))) = next {
                return t;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("no frame from {url}");
}

#[tokio::test]
async fn simulator_frames_reach_subscribers() {
    let _bridge = spawn(&["--port", "9571", "--interval-ms", "100", "--house-id", "T1"], None);
    let text = first_text("ws://127.0.0.1:9571/").await;
    let v: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(v["id"], "T1");
    assert!(v["batteryLevel"].as_f64().unwrap() >= 60.0);
    assert!(v["donateEnabled"].is_boolean());

    // Same stream on the /ws path
    let text = first_text("ws://127.0.0.1:9571/ws").await;
    assert!(text.contains("\"currentProduction\""));
}

#[tokio::test]
async fn serial_file_last_line_is_served_to_late_subscribers() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "{{\"id\":\"HouseA\",\"batteryLevel\":70}}").unwrap();
    writeln!(f, "not json").unwrap();
    writeln!(f, "{{\"id\":\"HouseA\",\"batteryLevel\":71}}").unwrap();
    f.flush().unwrap();
    let path = f.path().to_str().unwrap().to_string();

    let _bridge = spawn(&["--port", "9572", "--serial", &path], None);
    tokio::time::sleep(Duration::from_millis(300)).await;
    let text = first_text("ws://127.0.0.1:9572/").await;
    assert_eq!(text, "{\"id\":\"HouseA\",\"batteryLevel\":71}");
}

#[tokio::test]
async fn token_is_required_when_configured() {
    let _bridge = spawn(&["--port", "9573", "--interval-ms", "100"], Some("s3cret"));
    let text = first_text("ws://127.0.0.1:9573/?token=s3cret").await;
    assert!(text.contains("\"id\""));
    assert!(connect_async("ws://127.0.0.1:9573/?token=wrong").await.is_err());
    assert!(connect_async("ws://127.0.0.1:9573/").await.is_err());
}
