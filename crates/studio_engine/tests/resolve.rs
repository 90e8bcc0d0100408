use std::time::Duration;

use studio_engine::{
    decode_asset, AssetResolver, FailureKind, FetchSettings, Fetcher, HttpAssetResolver,
    ReqwestFetcher,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

async fn serve(server: &MockServer, route: &str, response: ResponseTemplate) -> String {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
    format!("{}{}", server.uri(), route)
}

fn resolver() -> HttpAssetResolver {
    HttpAssetResolver::new(ReqwestFetcher::new(FetchSettings::default()))
}

#[tokio::test]
async fn fetcher_returns_body_and_metadata() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "/sheet.csv",
        ResponseTemplate::new(200).set_body_raw("Name\nLobby\n", "text/csv; charset=utf-8"),
    )
    .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let output = fetcher.fetch(&url, &["text/*"]).await.expect("fetch ok");
    assert_eq!(output.metadata.original_url, url);
    assert_eq!(output.metadata.final_url, output.metadata.original_url);
    assert_eq!(output.metadata.redirect_count, 0);
    assert!(output
        .metadata
        .content_type
        .unwrap()
        .starts_with("text/csv"));
    assert_eq!(output.bytes, b"Name\nLobby\n");
}

#[tokio::test]
async fn fetcher_fails_on_http_status() {
    let server = MockServer::start().await;
    let url = serve(&server, "/missing", ResponseTemplate::new(404)).await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let err = fetcher.fetch(&url, &[]).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[tokio::test]
async fn fetcher_times_out_on_slow_response() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "/slow",
        ResponseTemplate::new(200)
            .set_delay(Duration::from_millis(250))
            .set_body_string("slow"),
    )
    .await;

    let fetcher = ReqwestFetcher::new(FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    });
    let err = fetcher.fetch(&url, &[]).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn fetcher_rejects_too_large_response() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "/large",
        ResponseTemplate::new(200)
            .insert_header("Content-Type", "image/png")
            .insert_header("Content-Length", "11")
            .set_body_string("01234567890"),
    )
    .await;

    let fetcher = ReqwestFetcher::new(FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    });
    let err = fetcher.fetch(&url, &[]).await.unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        }
    );
}

#[tokio::test]
async fn fetcher_rejects_unaccepted_content_type() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "/page",
        ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"),
    )
    .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let err = fetcher.fetch(&url, &["image/*"]).await.unwrap_err();
    assert!(matches!(
        err.kind,
        FailureKind::UnsupportedContentType { .. }
    ));
}

#[tokio::test]
async fn resolver_encodes_image_as_data_url() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "/ref.png",
        ResponseTemplate::new(200).set_body_raw(PNG, "image/png"),
    )
    .await;

    let asset = resolver().resolve(&url).await.expect("resolved");
    assert_eq!(asset.mime(), "image/png");
    assert!(asset.as_str().starts_with("data:image/png;base64,"));
    assert_eq!(decode_asset(&asset).unwrap(), PNG);
}

#[tokio::test]
async fn resolver_prefers_sniffed_format_over_declared_type() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "/blob",
        ResponseTemplate::new(200).set_body_raw(PNG, "application/octet-stream"),
    )
    .await;

    let asset = resolver().resolve(&url).await.expect("resolved");
    assert_eq!(asset.mime(), "image/png");
    assert_eq!(asset.file_extension(), "png");
}

#[tokio::test]
async fn resolver_fails_soft() {
    let server = MockServer::start().await;
    let missing = serve(&server, "/gone.png", ResponseTemplate::new(404)).await;
    let html = serve(
        &server,
        "/page",
        ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"),
    )
    .await;
    let empty = serve(
        &server,
        "/empty.png",
        ResponseTemplate::new(200).set_body_raw(Vec::<u8>::new(), "image/png"),
    )
    .await;
    let garbage = serve(
        &server,
        "/garbage",
        ResponseTemplate::new(200).set_body_raw("not an image", "application/octet-stream"),
    )
    .await;

    let resolver = resolver();
    assert!(resolver.resolve(&missing).await.is_none());
    assert!(resolver.resolve(&html).await.is_none());
    assert!(resolver.resolve(&empty).await.is_none());
    assert!(resolver.resolve(&garbage).await.is_none());
    assert!(resolver.resolve("http://127.0.0.1:9/unreachable.png").await.is_none());
}
