//! Typed walkthrough - target registry, navigation, evaluation

use api::{page, runtime, TargetRegistry};
use cdp::{Connection, ConnectionConfig, DomainFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let endpoint = "ws://localhost:9222/devtools/browser";
    let connection = Connection::connect(endpoint, ConnectionConfig::default()).await?;

    let registry = TargetRegistry::new(connection.clone()).await?;
    let session = registry.create("about:blank").await?;
    println!("Attached session {}", session.id());

    page::enable(&session).await?;
    let mut loads = session.subscribe(DomainFilter::method("Page.loadEventFired"))?;

    let navigated =
        page::navigate(&session, page::NavigateParams::new("https://example.com")).await?;
    println!("Navigating frame {}", navigated.frame_id);

    if let Some(event) = loads.next().await {
        let fired: page::LoadEventFiredEvent = event.params_as()?;
        println!("Loaded at {}", fired.timestamp);
    }

    let title = runtime::evaluate(&session, runtime::EvaluateParams::new("document.title")).await?;
    println!("Title: {:?}", title.result.value);

    for info in registry.list() {
        println!("target {} -> {}", info.target_id, info.url);
    }

    registry.close(&session).await?;
    connection.close();

    Ok(())
}
