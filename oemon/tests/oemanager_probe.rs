use std::time::Duration;

use oemon::client::{Connection, OeClient};
use oemon::poller::{build_sample, collect, Scope};

// Integration probe: only runs when OEMON_URL points at a PASOE instance.
// Example: OEMON_URL=http://127.0.0.1:8810 OEMON_USER=tomcat OEMON_PASSWORD=tomcat cargo test -p oemon --test oemanager_probe -- --nocapture
#[tokio::test]
async fn probe_oemanager_endpoints() {
    let url = match std::env::var("OEMON_URL") {
        Ok(v) if !v.is_empty() => v,
        _ => {
            eprintln!(
                "skipping oemanager_probe: set OEMON_URL=http://host:port to run this integration test"
            );
            return;
        }
    };
    let conn = Connection {
        url,
        username: std::env::var("OEMON_USER").unwrap_or_default(),
        password: std::env::var("OEMON_PASSWORD").unwrap_or_default(),
    };
    let client = OeClient::new(&conn, Duration::from_secs(10)).expect("client");

    let apps = client.applications().await.expect("list applications");
    let Some(app) = apps.first() else {
        eprintln!("server reports no applications; nothing more to probe");
        return;
    };

    let snap = collect(&client, &Scope::application(app.name.clone()))
        .await
        .expect("collect snapshot");
    let sample = build_sample(&snap);
    assert!(!sample.is_empty(), "expected at least one metric reading");
}
