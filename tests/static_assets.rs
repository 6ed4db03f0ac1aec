//! Static asset serving through a running router.

mod common;

use common::{raw_get, router_config, spawn_router, start_echo_backend, status_of, Assets, Echo};

fn clip() -> Vec<u8> {
    (0..1000u32).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn test_full_response_advertises_ranges() {
    let assets = Assets::new();
    assets.write("videos/clip.mp4", &clip());
    let backend = start_echo_backend().await;
    let router = spawn_router(router_config(backend, &assets.videos(), &assets.converted())).await;

    let res = common::client()
        .get(router.url("/videos/clip.mp4"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let headers = res.headers();
    assert_eq!(headers["accept-ranges"], "bytes");
    assert_eq!(headers["content-type"], "video/mp4");
    assert_eq!(headers["content-length"], "1000");
    assert!(headers["cache-control"].to_str().unwrap().contains("immutable"));
    assert!(headers.contains_key("etag"));
    assert!(headers.contains_key("last-modified"));
    assert_eq!(res.bytes().await.unwrap().as_ref(), clip().as_slice());
}

#[tokio::test]
async fn test_range_request_returns_exact_bytes() {
    let assets = Assets::new();
    assets.write("converted/clip.webm", &clip());
    let backend = start_echo_backend().await;
    let router = spawn_router(router_config(backend, &assets.videos(), &assets.converted())).await;

    let res = common::client()
        .get(router.url("/converted/clip.webm"))
        .header("range", "bytes=100-199")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 206);
    assert_eq!(res.headers()["content-range"], "bytes 100-199/1000");
    assert_eq!(res.headers()["content-length"], "100");
    assert_eq!(res.bytes().await.unwrap().as_ref(), &clip()[100..200]);
}

#[tokio::test]
async fn test_unsatisfiable_range() {
    let assets = Assets::new();
    assets.write("videos/clip.mp4", &clip());
    let backend = start_echo_backend().await;
    let router = spawn_router(router_config(backend, &assets.videos(), &assets.converted())).await;

    let res = common::client()
        .get(router.url("/videos/clip.mp4"))
        .header("range", "bytes=5000-")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 416);
    assert_eq!(res.headers()["content-range"], "bytes */1000");
}

#[tokio::test]
async fn test_conditional_request_not_modified() {
    let assets = Assets::new();
    assets.write("videos/clip.mp4", &clip());
    let backend = start_echo_backend().await;
    let router = spawn_router(router_config(backend, &assets.videos(), &assets.converted())).await;
    let client = common::client();

    let first = client.get(router.url("/videos/clip.mp4")).send().await.unwrap();
    let etag = first.headers()["etag"].clone();

    let second = client
        .get(router.url("/videos/clip.mp4"))
        .header("if-none-match", etag)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 304);
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let assets = Assets::new();
    let backend = start_echo_backend().await;
    let router = spawn_router(router_config(backend, &assets.videos(), &assets.converted())).await;

    let res = common::client()
        .get(router.url("/videos/nope.mp4"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn test_traversal_never_escapes_root() {
    let assets = Assets::new();
    assets.write("videos/clip.mp4", &clip());
    let backend = start_echo_backend().await;
    let router = spawn_router(router_config(backend, &assets.videos(), &assets.converted())).await;

    for target in [
        "/videos/../secret.txt",
        "/videos/..%2fsecret.txt",
        "/videos/%2e%2e/secret.txt",
        "/videos/%2e%2e%2fsecret.txt",
        "/converted/../videos/../secret.txt",
    ] {
        let raw = raw_get(router.addr, target).await;
        assert_eq!(status_of(&raw), 404, "{target} -> {raw}");
        assert!(!raw.contains("outside the roots"), "{target} leaked");
    }
}

#[tokio::test]
async fn test_write_methods_rejected_on_assets() {
    let assets = Assets::new();
    assets.write("videos/clip.mp4", &clip());
    let backend = start_echo_backend().await;
    let router = spawn_router(router_config(backend, &assets.videos(), &assets.converted())).await;

    let res = common::client()
        .delete(router.url("/videos/clip.mp4"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 405);
    assert!(assets.videos().join("clip.mp4").exists());
}

#[tokio::test]
async fn test_prefix_matches_on_segment_boundary() {
    let assets = Assets::new();
    assets.write("videos/clip.mp4", &clip());
    let backend = start_echo_backend().await;
    let router = spawn_router(router_config(backend, &assets.videos(), &assets.converted())).await;
    let client = common::client();

    let from_disk = client.get(router.url("/videos/clip.mp4")).send().await.unwrap();
    assert_eq!(from_disk.headers()["content-type"], "video/mp4");

    let proxied = client.get(router.url("/videosx/clip.mp4")).send().await.unwrap();
    assert_eq!(proxied.status(), 200);
    let echo: Echo = proxied.json().await.unwrap();
    assert_eq!(echo.uri, "/videosx/clip.mp4");
}
