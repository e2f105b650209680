use std::sync::Arc;

use url::Url;

use mapch_client::domains::spots::SpotDetailService;
use mapch_client::infra::api::PostsApi;
use mapch_client::infra::cache::{
    CacheRoot, DiskStore, KeyValueStore, MemoryStore, PhotoCache,
    photo_cache_key,
};
use mapch_client::infra::events::SpotEvent;
use mapch_client::infra::http::Method;
use mapch_client::infra::testing::stubs::{ScriptedTransport, stub_spot};
use mapch_model::{ANONYMOUS_AUTHOR, Photo, Spot, SpotId};

mod support;
use support::client;

fn spot_with_photos(id: i64, paths: &[&str]) -> Spot {
    let mut spot = stub_spot(id, "展望台");
    spot.evaluation = Some("4".into());
    spot.photos = paths
        .iter()
        .enumerate()
        .map(|(n, path)| Photo {
            id: n as i64 + 1,
            spot_id: Some(SpotId(id)),
            path: path.to_string(),
        })
        .collect();
    spot
}

fn service(
    transport: &ScriptedTransport,
    cache: PhotoCache,
) -> SpotDetailService {
    SpotDetailService::new(
        PostsApi::new(client(transport)),
        cache,
        Url::parse("https://bucket.test/").expect("url"),
    )
}

#[tokio::test]
async fn disk_store_round_trips_and_forgets() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = DiskStore::new(CacheRoot::new(dir.path()));

    assert_eq!(store.get("missing").await.expect("read"), None);

    store.put("k", b"[\"a.jpg\"]").await.expect("write");
    assert_eq!(
        store.get("k").await.expect("read").as_deref(),
        Some(&b"[\"a.jpg\"]"[..])
    );

    store.remove("k").await.expect("remove");
    assert_eq!(store.get("k").await.expect("read"), None);
}

#[tokio::test]
async fn photo_cache_survives_a_new_store_on_the_same_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = vec!["photo/a.jpg".to_string(), "photo/b.jpg".to_string()];

    let first =
        PhotoCache::new(Arc::new(DiskStore::new(CacheRoot::new(dir.path()))));
    first.store(SpotId(8), &paths).await;

    let second =
        PhotoCache::new(Arc::new(DiskStore::new(CacheRoot::new(dir.path()))));
    assert_eq!(second.load(SpotId(8)).await, paths);
    assert!(second.load(SpotId(9)).await.is_empty());
}

#[tokio::test]
async fn unreadable_entry_loads_as_empty() {
    let store = MemoryStore::new();
    store
        .put(&photo_cache_key(SpotId(3)), b"{not json")
        .await
        .expect("write");
    let cache = PhotoCache::new(Arc::new(store));

    assert!(cache.try_load(SpotId(3)).await.is_err());
    assert!(cache.load(SpotId(3)).await.is_empty());
}

#[tokio::test]
async fn open_prefers_cached_paths_and_merges_server_ones() {
    let transport = ScriptedTransport::new();
    let cache = PhotoCache::new(Arc::new(MemoryStore::new()));
    let cached = vec!["photo/new.jpg".to_string(), "photo/a.jpg".to_string()];
    cache.store(SpotId(5), &cached).await;
    let service = service(&transport, cache);

    let spot = spot_with_photos(5, &[" photo/a.jpg ", "photo/b.jpg", ""]);
    let detail = service.open(&spot).await;

    assert_eq!(
        detail.photo_paths,
        vec!["photo/new.jpg", "photo/a.jpg", "photo/b.jpg"]
    );
    assert_eq!(detail.rating, 4);
    assert_eq!(
        service
            .header_photo_url(&detail)
            .expect("header photo")
            .as_str(),
        "https://bucket.test/photo/new.jpg"
    );
    assert_eq!(service.photo_urls(&detail).len(), 3);
}

#[tokio::test]
async fn photo_event_updates_detail_and_next_open() {
    let transport = ScriptedTransport::new();
    let cache = PhotoCache::new(Arc::new(MemoryStore::new()));
    let service = service(&transport, cache.clone());
    let spot = spot_with_photos(6, &["photo/old.jpg"]);
    let mut detail = service.open(&spot).await;

    let changed = service
        .on_spot_event(
            &mut detail,
            &SpotEvent::PhotosUpdated {
                id: SpotId(6),
                paths: vec!["photo/x.jpg".into(), " photo/x.jpg".into()],
            },
        )
        .await;
    assert!(changed);
    assert_eq!(detail.photo_paths, vec!["photo/x.jpg"]);
    assert_eq!(cache.load(SpotId(6)).await, vec!["photo/x.jpg"]);

    let other = service
        .on_spot_event(
            &mut detail,
            &SpotEvent::PhotosUpdated {
                id: SpotId(7),
                paths: vec!["photo/y.jpg".into()],
            },
        )
        .await;
    assert!(!other);

    let reopened = service.open(&spot).await;
    assert_eq!(reopened.photo_paths, vec!["photo/x.jpg", "photo/old.jpg"]);
}

#[tokio::test]
async fn submitted_comment_is_shown_first() {
    let transport = ScriptedTransport::new()
        .respond(
            Method::Get,
            "api/posts/by-spot/2",
            200,
            r#"[{"content": "前のコメント", "author": "ken", "rating": 2}]"#,
        )
        .respond(Method::Post, "api/posts/store", 201, "{}");
    let cache = PhotoCache::new(Arc::new(MemoryStore::new()));
    let service = service(&transport, cache);
    let mut detail = service.open(&stub_spot(2, "公園")).await;

    service.load_reviews(&mut detail).await.expect("reviews");
    assert_eq!(detail.reviews.len(), 1);
    assert_eq!(detail.lead_comment.as_deref(), Some("前のコメント"));

    let review = service
        .submit_comment(&mut detail, None, " 桜がきれい ")
        .await
        .expect("posted");
    assert_eq!(review.author, ANONYMOUS_AUTHOR);
    assert_eq!(detail.reviews[0].text, "桜がきれい");
    assert_eq!(detail.reviews.len(), 2);
    assert_eq!(detail.lead_comment.as_deref(), Some("前のコメント"));
}
