use serde_json::json;

use crate::tests::utils::{
    body_json, create_active_publication, dispatch, get, get_authed, make_app, now_unix,
    post_json_authed, register_verified_user,
};

#[test]
fn top_excludes_untouched_publications_and_orders_by_score() {
    let app = make_app("top");
    let (_, author_token) = register_verified_user(&app, "author@example.com");
    let (_, donor_token) = register_verified_user(&app, "donor@example.com");

    let popular = create_active_publication(&app, &author_token, "popular", "medical");
    let modest = create_active_publication(&app, &author_token, "modest", "medical");
    // third one never gets a donation, view, or comment
    create_active_publication(&app, &author_token, "untouched", "medical");

    for (id, amount) in [(popular, 5000.0), (modest, 100.0)] {
        let resp = dispatch(
            post_json_authed(
                &format!("/api/publications/{id}/donations"),
                &json!({ "amount": amount }),
                &donor_token,
            ),
            &app,
        );
        assert_eq!(resp.status(), 201);
    }

    let resp = dispatch(get("/api/publications/top"), &app);
    assert_eq!(resp.status(), 200);
    let body = body_json(resp);
    let entries = body.as_array().unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["id"].as_i64().unwrap(), popular);
    assert_eq!(entries[1]["id"].as_i64().unwrap(), modest);
    assert!(entries[0]["score"].as_f64().unwrap() > entries[1]["score"].as_f64().unwrap());
}

#[test]
fn top_is_capped_at_ten() {
    let app = make_app("top_cap");
    let (_, author_token) = register_verified_user(&app, "author@example.com");
    let (_, donor_token) = register_verified_user(&app, "donor@example.com");

    for i in 0..12 {
        let id = create_active_publication(&app, &author_token, &format!("c{i}"), "medical");
        let resp = dispatch(
            post_json_authed(
                &format!("/api/publications/{id}/donations"),
                &json!({ "amount": 100.0 + i as f64 }),
                &donor_token,
            ),
            &app,
        );
        assert_eq!(resp.status(), 201);
    }

    let resp = dispatch(get("/api/publications/top"), &app);
    let body = body_json(resp);
    assert_eq!(body.as_array().unwrap().len(), 10);
}

#[test]
fn recommended_requires_authentication() {
    let app = make_app("rec_auth");
    let resp = dispatch(get("/api/publications/recommended"), &app);
    assert_eq!(resp.status(), 401);
}

#[test]
fn recommended_follows_viewing_history_and_skips_own() {
    let app = make_app("rec_history");
    let (_, author_token) = register_verified_user(&app, "author@example.com");
    let (_, user_token) = register_verified_user(&app, "user@example.com");

    let medical = create_active_publication(&app, &author_token, "med fund", "medical");
    create_active_publication(&app, &author_token, "school", "education");
    // the user's own campaign in the same category must never come back
    let own = create_active_publication(&app, &user_token, "my own", "medical");

    // build view history: the user opens the medical campaign
    let resp = dispatch(
        get_authed(&format!("/api/publications/{medical}"), &user_token),
        &app,
    );
    assert_eq!(resp.status(), 200);

    let resp = dispatch(get_authed("/api/publications/recommended", &user_token), &app);
    assert_eq!(resp.status(), 200);
    let body = body_json(resp);
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_i64().unwrap())
        .collect();

    assert_eq!(ids, vec![medical]);
    assert!(!ids.contains(&own));
}

#[test]
fn recommended_falls_back_to_popular_for_new_users() {
    let app = make_app("rec_fallback");
    let (_, author_token) = register_verified_user(&app, "author@example.com");
    let (_, donor_token) = register_verified_user(&app, "donor@example.com");
    let (_, fresh_token) = register_verified_user(&app, "fresh@example.com");

    let big = create_active_publication(&app, &author_token, "big", "medical");
    let small = create_active_publication(&app, &author_token, "small", "education");

    for (id, amount) in [(big, 9000.0), (small, 10.0)] {
        let resp = dispatch(
            post_json_authed(
                &format!("/api/publications/{id}/donations"),
                &json!({ "amount": amount }),
                &donor_token,
            ),
            &app,
        );
        assert_eq!(resp.status(), 201);
    }

    // no history at all -> global fallback, best funded first
    let resp = dispatch(get_authed("/api/publications/recommended", &fresh_token), &app);
    assert_eq!(resp.status(), 200);
    let body = body_json(resp);
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![big, small]);
}

#[test]
fn urgent_lists_campaigns_expiring_within_two_days() {
    let app = make_app("urgent");
    let (_, token) = register_verified_user(&app, "author@example.com");
    let now = now_unix();
    let day = 86_400;

    let soon = create_active_publication(&app, &token, "soon", "medical");
    let later = create_active_publication(&app, &token, "later", "medical");
    app.db
        .with_conn(|conn| {
            conn.execute(
                "update publications set expires_at = ? where id = ?",
                rusqlite::params![now + day, soon],
            )
            .map_err(|e| crate::errors::ServerError::DbError(e.to_string()))?;
            conn.execute(
                "update publications set expires_at = ? where id = ?",
                rusqlite::params![now + 10 * day, later],
            )
            .map_err(|e| crate::errors::ServerError::DbError(e.to_string()))?;
            Ok(())
        })
        .unwrap();

    let resp = dispatch(get("/api/publications/urgent"), &app);
    let body = body_json(resp);
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![soon]);
}

#[test]
fn my_lists_are_scoped_to_the_caller() {
    let app = make_app("my_lists");
    let (_, mine_token) = register_verified_user(&app, "mine@example.com");
    let (_, other_token) = register_verified_user(&app, "other@example.com");

    create_active_publication(&app, &mine_token, "my active", "medical");
    create_active_publication(&app, &other_token, "their active", "medical");
    // my pending draft
    let resp = dispatch(
        post_json_authed(
            "/api/publications",
            &json!({ "title": "my draft", "category": "medical", "amount": 100.0 }),
            &mine_token,
        ),
        &app,
    );
    assert_eq!(resp.status(), 201);

    let resp = dispatch(get_authed("/api/publications/active", &mine_token), &app);
    let rows = body_json(resp);
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["title"], "my active");

    let resp = dispatch(get_authed("/api/publications/pending", &mine_token), &app);
    let rows = body_json(resp);
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["title"], "my draft");

    let resp = dispatch(get_authed("/api/publications/archived", &mine_token), &app);
    assert_eq!(body_json(resp).as_array().unwrap().len(), 0);
}
