//! Throwaway HTTP servers standing in for remote hosts.

use axum::Router;
use tokio::net::TcpListener;

/// Serve `router` on a random local port, returning its base URL.
pub async fn spawn_upstream(router: Router) -> String {
    spawn_upstream_with(|_| router).await
}

/// Like [`spawn_upstream`], for routers that need to know their own URL.
pub async fn spawn_upstream_with(build: impl FnOnce(String) -> Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let base_url = format!(
        "http://{}",
        listener.local_addr().expect("Failed to get local address")
    );

    let router = build(base_url.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    base_url
}
