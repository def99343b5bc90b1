//! Raw engine walkthrough - untyped calls, events, one session

use cdp::{Connection, ConnectionConfig, DomainFilter, Session, SessionScope};
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Connect to a running Chrome (--remote-debugging-port=9222)
    let endpoint = "ws://localhost:9222/devtools/browser";
    println!("Connecting to {}", endpoint);
    let connection = Connection::connect(endpoint, ConnectionConfig::default()).await?;

    let version: Value = connection.call("Browser.getVersion", None).await?;
    println!("Browser: {}", version["product"]);

    // Watch target lifecycle events network-wide
    let mut targets = connection.subscribe(DomainFilter::domain("Target"), SessionScope::Global)?;
    tokio::spawn(async move {
        while let Some(event) = targets.next().await {
            println!("event: {} {}", event.method, event.params);
        }
    });

    // Create a tab and attach a session to it
    let created: Value = connection
        .call(
            "Target.createTarget",
            Some(json!({"url": "about:blank"})),
        )
        .await?;
    let target_id = created["targetId"].as_str().unwrap_or_default();
    let session = Session::attach(connection.clone(), target_id).await?;
    println!("Attached session {} to target {}", session.id(), target_id);

    let _: Value = session.call("Page.enable", None).await?;
    let navigated: Value = session
        .call(
            "Page.navigate",
            Some(json!({"url": "https://example.com"})),
        )
        .await?;
    println!("Navigating frame {}", navigated["frameId"]);

    // Keep alive for a bit to see events
    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

    session.detach().await;
    connection.close();
    println!("Disconnected");

    Ok(())
}
