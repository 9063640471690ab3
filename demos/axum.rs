/* demos/axum.rs */

use axum::{
    Router,
    extract::{ConnectInfo, Extension},
    response::Json,
    routing::get,
};
use client_ip::{ClientIpAddr, ClientIpLayer, Configuration, HeaderParser, ResolvedClientIp};
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app = create_app();
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();

    println!("Server starting on http://localhost:3000");
    println!("Test endpoints:");
    println!("  • GET /ip            - JSON response with the resolved client IP");
    println!("  • GET /trusted       - Headers only honored from loopback peers");
    println!("  • GET /debug         - Resolution details and raw connection info");
    println!();
    println!("Test with headers:");
    println!("  curl -H 'Forwarded: for=\"[2001:db8::1]:4711\"' http://localhost:3000/ip");
    println!("  curl -H 'X-Forwarded-For: 198.51.100.1, 10.0.0.1' http://localhost:3000/trusted");
    println!("  curl -H 'CF-Connecting-IP: 192.0.2.100' http://localhost:3000/ip");
    println!();

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}

fn create_app() -> Router {
    let default_router = Router::new()
        .route("/ip", get(ip_handler))
        .route("/debug", get(debug_handler))
        .layer(ClientIpLayer::default());

    let trusted_layer = ClientIpLayer::new(
        Configuration::new()
            .with_allowed_remotes("127.0.0.1, ::1")
            .with_header_parser("x-forwarded-for", HeaderParser::FirstInList),
    );
    let trusted_router = Router::new()
        .route("/", get(ip_handler))
        .layer(trusted_layer);

    default_router.nest("/trusted", trusted_router)
}

/// Handler that returns IP information in JSON format
async fn ip_handler(ClientIpAddr(ip): ClientIpAddr) -> Json<serde_json::Value> {
    Json(json!({
        "client_ip": ip.to_string(),
        "ip_version": match ip {
            IpAddr::V4(_) => "IPv4",
            IpAddr::V6(_) => "IPv6",
        },
        "is_loopback": ip.is_loopback(),
    }))
}

/// Debug handler comparing the resolved address with the socket peer
async fn debug_handler(
    Extension(resolved): Extension<ResolvedClientIp>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: axum::http::HeaderMap,
) -> Json<serde_json::Value> {
    let forwarding_headers = client_ip::DEFAULT_HEADERS
        .iter()
        .filter_map(|name| {
            headers
                .get(*name)
                .and_then(|value| value.to_str().ok())
                .map(|value| (name.to_string(), value.to_string()))
        })
        .collect::<std::collections::HashMap<String, String>>();

    Json(json!({
        "resolved_client_ip": resolved.ip().map(|ip| ip.to_string()),
        "connection_info": {
            "remote_addr": addr.to_string(),
            "remote_ip": addr.ip().to_string(),
            "remote_port": addr.port(),
        },
        "forwarding_headers": forwarding_headers,
        "analysis": {
            "ip_source": if resolved.ip() == Some(addr.ip()) {
                "connection_fallback"
            } else {
                "header_extraction"
            },
        }
    }))
}
