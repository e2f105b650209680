use std::ops::RangeInclusive;

use serde_json::json;

use mapch_client::domains::boards::BoardFeed;
use mapch_client::infra::api::{
    BoardQuery, BoardsApi, NewSpot, PhotoEdit, PostsApi, SpotUpdate, SpotsApi,
};
use mapch_client::infra::events::{EventBus, SpotEvent};
use mapch_client::ApiError;
use mapch_client::infra::http::{
    FilePart, HttpResponse, Method, RequestBody, TransportError,
};
use mapch_client::infra::testing::stubs::ScriptedTransport;
use mapch_model::{BoardSort, PageCursor, SpotId};

mod support;
use support::client;

fn board(id: i64) -> serde_json::Value {
    json!({
        "id": id,
        "description": format!("board {id}"),
        "location": {"name": "渋谷", "lat": 35.66, "lng": 139.7},
        "favorite_count": 3,
        "view_count": 10,
        "author": {"id": 1, "uid": "u1", "name": "たろう"},
        "category": {"id": 2, "name": "グルメ"},
        "created_at": "2025-09-01T12:00:00",
        "is_favorited": false
    })
}

fn board_page(ids: RangeInclusive<i64>, page: u32, total: u64) -> String {
    json!({
        "data": ids.map(board).collect::<Vec<_>>(),
        "meta": {"page": page, "per_page": 10, "total": total}
    })
    .to_string()
}

fn jpeg(name: &str) -> FilePart {
    FilePart::new(name, "image/jpeg", vec![0xff, 0xd8, 0xff])
}

// Posts

#[tokio::test(start_paused = true)]
async fn posts_are_read_from_the_first_route_with_a_list() {
    let transport = ScriptedTransport::new()
        .respond(Method::Get, "api/posts/by-spot/4", 404, "")
        .respond(
            Method::Get,
            "api/posts?spot_id=4",
            200,
            "{\"message\":\"ok\"}",
        )
        .respond(
            Method::Get,
            "api/spots/4",
            200,
            r#"{"spot": {"id": 4, "posts": [
                {"id": 1, "comment": "夜景が最高", "stars": "5",
                 "user": {"nickname": "hana"}}
            ]}}"#,
        );
    let posts = PostsApi::new(client(&transport));

    let list = posts.list_posts(SpotId(4)).await.expect("posts");

    assert_eq!(list.len(), 1);
    let review = list[0].to_review().expect("has text");
    assert_eq!(review.author, "hana");
    assert_eq!(review.rating, 5);
    assert_eq!(review.text, "夜景が最高");
    assert_eq!(
        transport.labels(),
        vec![
            "GET /api/posts/by-spot/4",
            "GET /api/posts?spot_id=4",
            "GET /api/spots/4",
        ]
    );
    assert!(
        transport
            .requests()
            .iter()
            .all(|r| r.header_value("Cache-Control") == Some("no-cache"))
    );
}

#[tokio::test(start_paused = true)]
async fn form_routes_receive_the_spot_id() {
    let transport = ScriptedTransport::new().respond(
        Method::Post,
        "getPosts",
        200,
        r#"{"data": [{"content": "静か", "rating": 3}]}"#,
    );
    let posts = PostsApi::new(client(&transport));

    let list = posts.list_posts(SpotId(12)).await.expect("posts");

    assert_eq!(list.len(), 1);
    let requests = transport.requests();
    let hit = requests.last().expect("requests made");
    assert_eq!(hit.label(), "POST /getPosts");
    assert_eq!(hit.body.field("id"), Some("12"));
}

#[tokio::test(start_paused = true)]
async fn spot_without_any_post_route_has_no_posts() {
    let transport = ScriptedTransport::new();
    let posts = PostsApi::new(client(&transport));

    let list = posts.list_posts(SpotId(4)).await.expect("empty, not error");

    assert!(list.is_empty());
    assert_eq!(transport.requests().len(), 11);
}

#[tokio::test(start_paused = true)]
async fn offline_post_listing_is_an_error() {
    let transport = ScriptedTransport::new()
        .otherwise(Err(TransportError::NotConnected));
    let posts = PostsApi::new(client(&transport));

    let err = posts.list_posts(SpotId(4)).await.expect_err("offline");

    assert!(err.is_transport());
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn blank_comment_is_rejected_locally() {
    let transport = ScriptedTransport::new();
    let posts = PostsApi::new(client(&transport));

    let err = posts
        .submit_post(SpotId(4), None, "   ")
        .await
        .expect_err("blank");

    assert!(matches!(err, ApiError::Validation(_)));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn comment_is_posted_as_json() {
    let transport = ScriptedTransport::new().respond(
        Method::Post,
        "api/posts/store",
        201,
        "{}",
    );
    let posts = PostsApi::new(client(&transport));

    posts
        .submit_post(SpotId(4), Some("  "), " いい場所 ")
        .await
        .expect("stored");

    assert_eq!(
        transport.requests()[0].body,
        RequestBody::Json(json!({
            "spot_id": 4,
            "author": null,
            "content": "いい場所",
        }))
    );
}

// Boards

#[tokio::test]
async fn board_pages_carry_filters_and_cursor() {
    let transport = ScriptedTransport::new().respond(
        Method::Get,
        "boards?sort=trending&category_id=2&page=1&per_page=10",
        200,
        &board_page(1..=10, 1, 25),
    );
    let boards = BoardsApi::new(client(&transport));

    let page = boards
        .fetch_boards(
            BoardQuery {
                sort: BoardSort::Trending,
                category_id: Some(2),
            },
            PageCursor::first(10),
        )
        .await
        .expect("page");

    assert_eq!(page.response.data.len(), 10);
    assert_eq!(page.next.map(|c| c.page), Some(2));
    assert!(transport.requests()[0].header_value("Authorization").is_none());
}

#[tokio::test]
async fn favorite_boards_send_the_bearer_token() {
    let transport = ScriptedTransport::new().respond(
        Method::Get,
        "boards?sort=favorite&page=1&per_page=10",
        200,
        &board_page(1..=2, 1, 2),
    );
    let api = client(&transport);
    api.set_token(Some("tok".into())).await;
    let boards = BoardsApi::new(api);

    let page = boards
        .fetch_boards(
            BoardQuery {
                sort: BoardSort::Favorite,
                category_id: None,
            },
            PageCursor::first(10),
        )
        .await
        .expect("page");

    assert!(page.next.is_none());
    assert_eq!(
        transport.requests()[0].header_value("Authorization"),
        Some("Bearer tok")
    );
}

#[tokio::test]
async fn feed_pages_in_near_the_end_and_resets_on_filter_change() {
    let transport = ScriptedTransport::new()
        .respond(
            Method::Get,
            "boards?sort=latest&page=1&per_page=10",
            200,
            &board_page(1..=10, 1, 15),
        )
        .respond(
            Method::Get,
            "boards?sort=latest&page=2&per_page=10",
            200,
            &board_page(11..=15, 2, 15),
        )
        .respond(
            Method::Get,
            "boards?sort=trending&page=1&per_page=10",
            200,
            &board_page(21..=22, 1, 2),
        );
    let mut feed = BoardFeed::new(BoardsApi::new(client(&transport)), 10);

    feed.reload().await.expect("first page");
    assert_eq!(feed.rows().len(), 10);
    assert_eq!(feed.rows()[0].author_name, "たろう");
    assert!(feed.has_more());

    assert!(!feed.on_item_visible(5).await.expect("no fetch"));
    assert!(feed.on_item_visible(6).await.expect("fetched"));
    assert_eq!(feed.rows().len(), 15);
    assert!(!feed.has_more());
    assert!(!feed.on_item_visible(15).await.expect("last page seen"));

    feed.set_filter(BoardSort::Trending, None)
        .await
        .expect("trending");
    assert_eq!(
        feed.rows().iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![21, 22]
    );
    assert_eq!(transport.requests().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn failed_board_page_raises_an_alert() {
    let transport = ScriptedTransport::new().respond(
        Method::Get,
        "boards?sort=latest&page=1&per_page=10",
        500,
        "oops",
    );
    let mut feed = BoardFeed::new(BoardsApi::new(client(&transport)), 10);

    assert!(feed.reload().await.is_err());
    assert!(feed.alert().is_some());
    assert!(!feed.is_loading());
    feed.dismiss_alert();
    assert!(feed.alert().is_none());
}

// Spots

const STORE: &str = "api/spots/store";

#[tokio::test(start_paused = true)]
async fn photo_field_is_probed_until_accepted() {
    let transport = ScriptedTransport::new()
        .respond(Method::Post, STORE, 422, "{\"photo\":\"invalid\"}")
        .respond(Method::Post, STORE, 422, "{\"photo\":\"invalid\"}")
        .respond(Method::Post, STORE, 201, r#"{"spot":{"id":77}}"#);
    let bus = EventBus::default();
    let mut events = bus.subscribe_spots();
    let spots = SpotsApi::new(client(&transport), bus);

    let id = spots
        .create_spot(&NewSpot {
            name: " 東京タワー ".into(),
            evaluation: 4,
            user_name: Some("hana".into()),
            comment: None,
            latitude: 35.6586,
            longitude: 139.7454,
            images: vec![jpeg("a.jpg")],
        })
        .await
        .expect("created");

    assert_eq!(id, Some(SpotId(77)));
    let fields: Vec<Vec<String>> = transport
        .requests()
        .iter()
        .map(|r| {
            r.body.file_fields().into_iter().map(str::to_string).collect()
        })
        .collect();
    assert_eq!(
        fields,
        vec![vec!["photo[]"], vec!["photos[]"], vec!["image[]"]]
    );
    let last = transport.requests().pop().expect("request");
    assert_eq!(last.body.field("spot_name"), Some("東京タワー"));
    assert_eq!(last.body.field("author"), Some("hana"));
    assert_eq!(
        events.try_recv().expect("event"),
        SpotEvent::Created {
            id: Some(SpotId(77))
        }
    );
}

#[tokio::test]
async fn spot_without_name_is_not_sent() {
    let transport = ScriptedTransport::new();
    let spots = SpotsApi::new(client(&transport), EventBus::default());

    let err = spots
        .create_spot(&NewSpot {
            name: " ".into(),
            evaluation: 3,
            user_name: None,
            comment: None,
            latitude: 35.0,
            longitude: 139.0,
            images: Vec::new(),
        })
        .await
        .expect_err("validation");

    assert!(matches!(err, ApiError::Validation(_)));
    assert!(transport.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn update_falls_back_to_tunnelled_form() {
    let transport = ScriptedTransport::new().respond(
        Method::Post,
        "api/spots/update/9",
        200,
        "{}",
    );
    let bus = EventBus::default();
    let mut events = bus.subscribe_spots();
    let spots = SpotsApi::new(client(&transport), bus);

    spots
        .update_spot(
            SpotId(9),
            &SpotUpdate {
                name: Some("新しい名前".into()),
                evaluation: Some(5),
            },
        )
        .await
        .expect("updated");

    assert_eq!(
        transport.labels(),
        vec![
            "PATCH /api/spots/update/9",
            "PUT /api/spots/9",
            "POST /api/spots/update/9",
        ]
    );
    let tunnelled = transport.requests().pop().expect("request");
    assert_eq!(
        tunnelled.header_value("X-HTTP-Method-Override"),
        Some("PATCH")
    );
    assert_eq!(tunnelled.body.field("_method"), Some("PATCH"));
    assert_eq!(tunnelled.body.field("evaluation"), Some("5"));
    assert_eq!(
        events.try_recv().expect("event"),
        SpotEvent::Updated {
            id: SpotId(9),
            name: Some("新しい名前".into()),
            evaluation: Some(5),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn delete_tries_every_route_before_failing() {
    let transport = ScriptedTransport::new().respond(
        Method::Post,
        "api/spots/delete",
        403,
        "forbidden",
    );
    let bus = EventBus::default();
    let mut events = bus.subscribe_spots();
    let spots = SpotsApi::new(client(&transport), bus);

    let err = spots.delete_spot(SpotId(3)).await.expect_err("refused");

    assert_eq!(err.status(), Some(403));
    assert_eq!(
        transport.labels(),
        vec![
            "DELETE /api/spots/delete/3",
            "DELETE /api/spots/3",
            "POST /api/spots/delete/3",
            "POST /api/spots/delete",
        ]
    );
    let last = transport.requests().pop().expect("request");
    assert_eq!(last.body.field("id"), Some("3"));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn photo_edit_publishes_returned_paths() {
    let transport = ScriptedTransport::new().respond(
        Method::Post,
        "api/spots/update/5",
        200,
        r#"{"spot": {"photos": [{"photo_path": "photo/new.jpg"}]}}"#,
    );
    let bus = EventBus::default();
    let mut events = bus.subscribe_spots();
    let spots = SpotsApi::new(client(&transport), bus);

    let paths = spots
        .edit_photos(
            SpotId(5),
            &PhotoEdit {
                name: "公園".into(),
                evaluation: 4,
                new_images: vec![jpeg("new.jpg")],
                delete_photo_ids: vec![11, 12],
            },
        )
        .await
        .expect("edited");

    assert_eq!(paths, vec!["photo/new.jpg"]);
    let request = &transport.requests()[0];
    assert_eq!(request.body.field("_method"), Some("PATCH"));
    assert_eq!(request.body.file_fields(), vec!["photo[]"]);
    let RequestBody::Multipart(parts) = &request.body else {
        panic!("multipart body expected");
    };
    let deleted = parts
        .iter()
        .filter(|p| p.name() == "delete_photo_ids[]")
        .count();
    assert_eq!(deleted, 2);

    assert!(matches!(
        events.try_recv().expect("updated"),
        SpotEvent::Updated { .. }
    ));
    assert_eq!(
        events.try_recv().expect("photos"),
        SpotEvent::PhotosUpdated {
            id: SpotId(5),
            paths: vec!["photo/new.jpg".into()],
        }
    );
}

#[tokio::test]
async fn spots_in_bounds_query_carries_the_box_and_limit() {
    let body = json!({
        "spots": [{"id": 1, "spot_name": "a", "ido": 35.1, "keido": 139.1}]
    });
    let transport = ScriptedTransport::new()
        .otherwise(Ok(HttpResponse::new(200, body.to_string())));
    let spots = SpotsApi::new(client(&transport), EventBus::default());
    let bounds = support::tokyo().bounding_box();

    let list = spots.fetch_in_bounds(bounds, 800).await.expect("spots");

    assert_eq!(list.len(), 1);
    let request = &transport.requests()[0];
    assert_eq!(request.url.path(), "/api/spots/in-bounds");
    let query: Vec<(String, String)> =
        request.url.query_pairs().into_owned().collect();
    assert!(query.contains(&("limit".into(), "800".into())));
    assert_eq!(query.len(), 5);
}
