//! Contract Test: HTTP IP Resolution
//!
//! Runs the resolver against wiremock echo servers.
//!
//! Constraints verified:
//! - The result is always an address some server actually returned
//! - The plurality answer wins
//! - Every failing response adds exactly one to that server's counter
//! - Unusable 200 bodies are ignored without being held against the server
//! - A round with no usable answer fails the call

use siip_core::{Error, IpResolver};
use siip_ip_http::{HttpIpResolver, IpServer, ResolverSettings};
use std::net::Ipv4Addr;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn echo(server: &MockServer, route: &str, response: ResponseTemplate) -> String {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
    format!("{}{}", server.uri(), route)
}

fn text(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(body)
}

fn resolver(urls: &[String]) -> HttpIpResolver {
    let settings = ResolverSettings {
        request_timeout: Duration::from_millis(300),
        ..ResolverSettings::default()
    };
    let servers = urls.iter().map(|url| IpServer::new(url.clone(), 1)).collect();
    HttpIpResolver::with_servers(servers, settings).expect("client builds")
}

#[tokio::test]
async fn plurality_answer_wins() {
    let server = MockServer::start().await;
    let urls = vec![
        echo(&server, "/a", text("1.2.3.4")).await,
        echo(&server, "/b", text("5.6.7.8\n")).await,
        echo(&server, "/c", text("Current IP: 1.2.3.4")).await,
    ];

    let ip = resolver(&urls).get_ip().await.expect("resolution succeeds");

    assert_eq!(ip, Ipv4Addr::new(1, 2, 3, 4));
}

#[tokio::test]
async fn result_is_never_fabricated() {
    let server = MockServer::start().await;
    let urls = vec![
        echo(&server, "/a", text("10.0.0.1")).await,
        echo(&server, "/b", text("10.0.0.2")).await,
        echo(&server, "/c", ResponseTemplate::new(500)).await,
    ];
    let resolver = resolver(&urls);

    for _ in 0..5 {
        let ip = resolver.get_ip().await.expect("resolution succeeds");
        assert!(
            ip == Ipv4Addr::new(10, 0, 0, 1) || ip == Ipv4Addr::new(10, 0, 0, 2),
            "unexpected {}",
            ip
        );
    }
}

#[tokio::test]
async fn sends_identifying_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ip"))
        .and(header("user-agent", "SI-IP Dynamic DNS updater"))
        .and(header("accept", "text/plain"))
        .respond_with(text("203.0.113.9"))
        .expect(1)
        .mount(&server)
        .await;

    let ip = resolver(&[format!("{}/ip", server.uri())])
        .get_ip()
        .await
        .expect("resolution succeeds");

    assert_eq!(ip, Ipv4Addr::new(203, 0, 113, 9));
}

#[tokio::test]
async fn each_failing_response_counts_once() {
    let server = MockServer::start().await;
    let ok = echo(&server, "/ok", text("1.2.3.4")).await;
    let limited = echo(&server, "/limited", ResponseTemplate::new(429)).await;
    let broken = echo(&server, "/broken", ResponseTemplate::new(500)).await;
    let urls = vec![ok.clone(), limited.clone(), broken.clone()];
    let resolver = resolver(&urls);

    resolver.get_ip().await.expect("one good answer is enough");

    assert_eq!(resolver.server_failures(&ok), Some(0));
    assert_eq!(resolver.server_failures(&limited), Some(1));
    assert_eq!(resolver.server_failures(&broken), Some(1));

    resolver.get_ip().await.expect("one good answer is enough");

    assert_eq!(resolver.server_failures(&limited), Some(2));
    assert_eq!(resolver.server_failures(&broken), Some(2));
}

#[tokio::test]
async fn timeout_counts_as_failure() {
    let server = MockServer::start().await;
    let ok = echo(&server, "/ok", text("1.2.3.4")).await;
    let slow = echo(
        &server,
        "/slow",
        text("5.6.7.8").set_delay(Duration::from_secs(2)),
    )
    .await;
    let resolver = resolver(&[ok, slow.clone()]);

    let ip = resolver.get_ip().await.expect("resolution succeeds");

    assert_eq!(ip, Ipv4Addr::new(1, 2, 3, 4));
    assert_eq!(resolver.server_failures(&slow), Some(1));
}

#[tokio::test]
async fn repeated_failures_exclude_server() {
    let server = MockServer::start().await;
    let ok = echo(&server, "/ok", text("1.2.3.4")).await;
    let blocked = echo(&server, "/blocked", ResponseTemplate::new(403)).await;
    let resolver = resolver(&[ok.clone(), blocked.clone()]);

    for _ in 0..3 {
        resolver.get_ip().await.expect("resolution succeeds");
    }

    assert_eq!(resolver.server_failures(&blocked), Some(3));
    assert_eq!(resolver.available_servers(), vec![ok]);
}

#[tokio::test]
async fn unusable_body_is_not_a_failure() {
    let server = MockServer::start().await;
    let ok = echo(&server, "/ok", text("1.2.3.4")).await;
    let garbled = echo(&server, "/garbled", text("<html>maintenance</html>")).await;
    let resolver = resolver(&[ok, garbled.clone()]);

    let ip = resolver.get_ip().await.expect("resolution succeeds");

    assert_eq!(ip, Ipv4Addr::new(1, 2, 3, 4));
    assert_eq!(resolver.server_failures(&garbled), Some(0));
}

#[tokio::test]
async fn round_without_usable_answer_fails() {
    let server = MockServer::start().await;
    let urls = vec![
        echo(&server, "/a", ResponseTemplate::new(503)).await,
        echo(&server, "/b", text("no address here")).await,
        echo(&server, "/c", text("300.1.2.3")).await,
    ];

    let result = resolver(&urls).get_ip().await;

    assert!(matches!(result, Err(Error::ResolutionFailed)), "got {:?}", result);
}

#[tokio::test]
async fn fully_exhausted_pool_reports_no_servers() {
    let server = MockServer::start().await;
    let url = echo(&server, "/down", ResponseTemplate::new(503)).await;

    let settings = ResolverSettings {
        max_failures: 1,
        request_timeout: Duration::from_millis(300),
        exhausted_backoff: Duration::from_millis(10),
        ..ResolverSettings::default()
    };
    let resolver =
        HttpIpResolver::with_servers(vec![IpServer::new(url, 1)], settings).expect("client builds");

    assert!(matches!(resolver.get_ip().await, Err(Error::ResolutionFailed)));
    assert!(matches!(resolver.get_ip().await, Err(Error::NoServersAvailable)));
}
