/* demos/demo.rs */

use client_ip::{
    AllowedRemotes, ClientIp, ClientIpExtractor, Configuration, HeaderConstraints, HeaderParser,
    RemoteAddressSource, RequestSnapshot, get_client_ip,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Client IP Resolution Examples ===\n");

    // Example 1: Simple vendor header
    example_1_vendor_header();

    // Example 2: Forwarded header with quoted IPv6 and port
    example_2_forwarded();

    // Example 3: Multiple headers with priority
    example_3_header_priority();

    // Example 4: Forwarded header guarded by a shared secret
    example_4_forwarded_secret();

    // Example 5: Untrusted peer
    example_5_allowed_remotes();

    // Example 6: Custom header list and parsers
    example_6_custom_extractor();

    println!("=== All examples completed! ===");
}

fn show(label: &str, request: &RequestSnapshot, config: Option<&Configuration>) {
    match get_client_ip(request, config) {
        Some(ip) => println!("{}: {}", label, ip),
        None => println!("{}: no IP found", label),
    }
}

fn example_1_vendor_header() {
    println!("Example 1: CF-Connecting-IP");

    let request = RequestSnapshot::new()
        .with_header("CF-Connecting-IP", "198.51.100.42")
        .with_remote_address(RemoteAddressSource::Connection, "10.0.0.1");

    show("Extracted IP", &request, None);
    println!();
}

fn example_2_forwarded() {
    println!("Example 2: Forwarded header");

    let request = RequestSnapshot::new().with_header(
        "Forwarded",
        "proto=https;for=\"[2001:db8::1428:57ab]:4561\", for=198.51.100.17",
    );

    show("Extracted IP (first element only)", &request, None);
    println!();
}

fn example_3_header_priority() {
    println!("Example 3: Multiple headers with priority");

    let request = RequestSnapshot::new()
        .with_header("x-real-ip", "203.0.113.100")
        .with_header("forwarded", "for=192.0.2.50")
        .with_header("x-client-ip", "198.51.100.200");

    show("Extracted IP (x-client-ip has highest priority)", &request, None);
    println!();
}

fn example_4_forwarded_secret() {
    println!("Example 4: Forwarded header with required secret");

    let request = RequestSnapshot::new().with_header("forwarded", "for=203.0.113.7;secret=s3cr3t");

    let matching = Configuration::new().with_allowed_headers([(
        "forwarded",
        HeaderConstraints::new().require("secret", "s3cr3t"),
    )]);
    let mismatching = Configuration::new().with_allowed_headers([(
        "forwarded",
        HeaderConstraints::new().require("secret", "other"),
    )]);

    show("Matching secret", &request, Some(&matching));
    show("Mismatching secret", &request, Some(&mismatching));
    println!();
}

fn example_5_allowed_remotes() {
    println!("Example 5: Only trust headers from known proxies");

    let client_ip = ClientIp::new(Configuration::new().with_allowed_remotes("10.0.0.1, 10.0.0.2"));

    let trusted = RequestSnapshot::new()
        .with_header("x-real-ip", "203.0.113.9")
        .with_remote_address(RemoteAddressSource::Connection, "10.0.0.2");
    let spoofed = RequestSnapshot::new()
        .with_header("x-real-ip", "203.0.113.9")
        .with_remote_address(RemoteAddressSource::Connection, "198.51.100.3");

    println!("Trusted proxy: {:?}", client_ip.resolve(&trusted));
    println!("Unknown peer:  {:?}", client_ip.resolve(&spoofed));

    let loopback_only = Configuration::new()
        .with_allowed_remotes(AllowedRemotes::predicate(|ip| ip.is_loopback()));
    show("Loopback predicate", &spoofed, Some(&loopback_only));
    println!();
}

fn example_6_custom_extractor() {
    println!("Example 6: Custom extractor configuration");

    let request = RequestSnapshot::new()
        .with_header("x-forwarded-for", "203.0.113.200, 10.0.0.5")
        .with_header("x-edge-client", "ip=192.0.2.44");

    // X-Forwarded-For is read as a single address unless a list parser is registered
    show("Default extractor", &request, None);

    let extractor = ClientIpExtractor::new().with_headers(["x-edge-client", "x-forwarded-for"]);
    let client_ip = ClientIp::with_extractor(
        Configuration::new()
            .with_header_parser("x-forwarded-for", HeaderParser::FirstInList)
            .with_header_parser(
                "x-edge-client",
                HeaderParser::custom(|raw, _| raw.strip_prefix("ip=")?.parse().ok()),
            ),
        extractor,
    );

    match client_ip.resolve(&request) {
        Some(ip) => println!("Custom extractor result: {}", ip),
        None => println!("Custom extractor: No IP found"),
    }
    println!();
}
