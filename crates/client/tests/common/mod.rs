use std::time::Duration;

use axum::Router;
use roadwatch_client::{BackendApi, ClientConfig};

/// Token the mock backend accepts.
pub const TOKEN: &str = "test-token";

/// Serve `router` on an ephemeral localhost port and return the API base
/// URL (`http://127.0.0.1:<port>/api/`).
pub async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/api/")
}

/// Build a client for `base_url` with a short timeout.
pub fn api_for(base_url: &str, token: Option<&str>) -> BackendApi {
    let config = ClientConfig {
        base_url: base_url.to_string(),
        access_token: token.map(str::to_string),
        request_timeout: Duration::from_millis(500),
    };
    BackendApi::new(&config).unwrap()
}
