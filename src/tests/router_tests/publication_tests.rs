use serde_json::json;

use crate::tests::utils::{
    body_json, create_active_publication, dispatch, get, get_authed, make_app, post_json_authed,
    put_json_authed, register_verified_user,
};

#[test]
fn create_requires_authentication() {
    let app = make_app("create_auth");

    let req = http::Request::builder()
        .method(http::Method::POST)
        .uri("/api/publications")
        .body(astra::Body::from(
            json!({ "title": "t", "category": "c", "amount": 100.0 })
                .to_string()
                .into_bytes(),
        ))
        .unwrap();
    let resp = dispatch(req, &app);
    assert_eq!(resp.status(), 401);
}

#[test]
fn created_publication_starts_pending_with_media() {
    let app = make_app("create");
    let (_, token) = register_verified_user(&app, "author@example.com");

    let req = post_json_authed(
        "/api/publications",
        &json!({
            "title": "Help the shelter",
            "category": "animals",
            "description": "food and meds",
            "amount": 50000.0,
            "uploaded_images": ["/media/1.jpg", "/media/2.jpg"],
            "uploaded_videos": ["/media/v.mp4"],
        }),
        &token,
    );
    let resp = dispatch(req, &app);
    assert_eq!(resp.status(), 201);

    let body = body_json(resp);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["images"].as_array().unwrap().len(), 2);
    assert_eq!(body["videos"].as_array().unwrap().len(), 1);
    assert_eq!(body["total_donated"], 0.0);
}

#[test]
fn list_shows_only_active_by_default() {
    let app = make_app("list_active");
    let (_, token) = register_verified_user(&app, "author@example.com");

    create_active_publication(&app, &token, "visible", "medical");
    // stays pending
    let resp = dispatch(
        post_json_authed(
            "/api/publications",
            &json!({ "title": "hidden", "category": "medical", "amount": 100.0 }),
            &token,
        ),
        &app,
    );
    assert_eq!(resp.status(), 201);

    let resp = dispatch(get("/api/publications"), &app);
    let body = body_json(resp);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["title"], "visible");
}

#[test]
fn listing_private_statuses_requires_auth_and_scopes_to_owner() {
    let app = make_app("list_pending");
    let (_, token) = register_verified_user(&app, "author@example.com");
    let (_, other_token) = register_verified_user(&app, "other@example.com");

    let resp = dispatch(
        post_json_authed(
            "/api/publications",
            &json!({ "title": "mine", "category": "medical", "amount": 100.0 }),
            &token,
        ),
        &app,
    );
    assert_eq!(resp.status(), 201);

    // anonymous request for a private status is refused
    let resp = dispatch(get("/api/publications?status=pending"), &app);
    assert_eq!(resp.status(), 403);

    // the owner sees their pending row
    let resp = dispatch(get_authed("/api/publications?status=pending", &token), &app);
    assert_eq!(body_json(resp).as_array().unwrap().len(), 1);

    // another user sees nothing
    let resp = dispatch(
        get_authed("/api/publications?status=pending", &other_token),
        &app,
    );
    assert_eq!(body_json(resp).as_array().unwrap().len(), 0);
}

#[test]
fn search_and_category_filters_apply() {
    let app = make_app("search");
    let (_, token) = register_verified_user(&app, "author@example.com");

    create_active_publication(&app, &token, "save the cats", "animals");
    create_active_publication(&app, &token, "school books", "education");

    let resp = dispatch(get("/api/publications?search=cats"), &app);
    let rows = body_json(resp);
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["title"], "save the cats");

    let resp = dispatch(get("/api/publications?category=education,other"), &app);
    let rows = body_json(resp);
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["category"], "education");
}

#[test]
fn detail_records_a_view_once_per_user() {
    let app = make_app("detail_view");
    let (_, author_token) = register_verified_user(&app, "author@example.com");
    let (_, viewer_token) = register_verified_user(&app, "viewer@example.com");
    let id = create_active_publication(&app, &author_token, "campaign", "medical");

    let uri = format!("/api/publications/{id}");
    for _ in 0..3 {
        let resp = dispatch(get_authed(&uri, &viewer_token), &app);
        assert_eq!(resp.status(), 200);
    }

    let resp = dispatch(get_authed(&uri, &viewer_token), &app);
    let body = body_json(resp);
    assert_eq!(body["total_views"], 1);
}

#[test]
fn inactive_publication_is_hidden_from_strangers() {
    let app = make_app("detail_access");
    let (_, author_token) = register_verified_user(&app, "author@example.com");
    let (_, other_token) = register_verified_user(&app, "other@example.com");

    // pending, never activated
    let resp = dispatch(
        post_json_authed(
            "/api/publications",
            &json!({ "title": "draft", "category": "medical", "amount": 100.0 }),
            &author_token,
        ),
        &app,
    );
    let id = body_json(resp)["id"].as_i64().unwrap();
    let uri = format!("/api/publications/{id}");

    // stranger and anonymous are refused
    let resp = dispatch(get_authed(&uri, &other_token), &app);
    assert_eq!(resp.status(), 403);
    let resp = dispatch(get(&uri), &app);
    assert_eq!(resp.status(), 403);

    // the author still sees it
    let resp = dispatch(get_authed(&uri, &author_token), &app);
    assert_eq!(resp.status(), 200);
}

#[test]
fn only_the_author_can_edit_or_delete() {
    let app = make_app("edit_access");
    let (_, author_token) = register_verified_user(&app, "author@example.com");
    let (_, other_token) = register_verified_user(&app, "other@example.com");
    let id = create_active_publication(&app, &author_token, "original", "medical");
    let uri = format!("/api/publications/{id}");

    let resp = dispatch(
        put_json_authed(&uri, &json!({ "title": "hijacked" }), &other_token),
        &app,
    );
    assert_eq!(resp.status(), 403);

    let resp = dispatch(
        put_json_authed(&uri, &json!({ "title": "updated" }), &author_token),
        &app,
    );
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp)["title"], "updated");

    let del = http::Request::builder()
        .method(http::Method::DELETE)
        .uri(uri.clone())
        .header("Authorization", format!("Bearer {author_token}"))
        .body(astra::Body::empty())
        .unwrap();
    let resp = dispatch(del, &app);
    assert_eq!(resp.status(), 200);

    let resp = dispatch(get(&uri), &app);
    assert_eq!(resp.status(), 404);
}

#[test]
fn donations_show_up_in_the_detail_payload() {
    let app = make_app("donate");
    let (_, author_token) = register_verified_user(&app, "author@example.com");
    let (_, donor_token) = register_verified_user(&app, "donor@example.com");
    let id = create_active_publication(&app, &author_token, "fund", "medical");

    let resp = dispatch(
        post_json_authed(
            &format!("/api/publications/{id}/donations"),
            &json!({ "amount": 2500.0, "donor_name": "Dana" }),
            &donor_token,
        ),
        &app,
    );
    assert_eq!(resp.status(), 201);

    let resp = dispatch(get(&format!("/api/publications/{id}")), &app);
    let body = body_json(resp);
    assert_eq!(body["total_donated"], 2500.0);
    assert_eq!(body["donations"][0]["donor_name"], "Dana");
    assert_eq!(body["donation_percentage"], 25.0);
}

#[test]
fn comments_count_toward_engagement() {
    let app = make_app("comment");
    let (_, author_token) = register_verified_user(&app, "author@example.com");
    let (_, commenter_token) = register_verified_user(&app, "c@example.com");
    let id = create_active_publication(&app, &author_token, "fund", "medical");

    let resp = dispatch(
        post_json_authed(
            &format!("/api/publications/{id}/comments"),
            &json!({ "content": "good luck!" }),
            &commenter_token,
        ),
        &app,
    );
    assert_eq!(resp.status(), 201);

    let resp = dispatch(get(&format!("/api/publications/{id}")), &app);
    assert_eq!(body_json(resp)["total_comments"], 1);
}
