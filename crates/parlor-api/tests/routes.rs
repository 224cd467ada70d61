use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use parlor_api::{AppState, AppStateInner, router};
use parlor_db::Database;

struct TestApp {
    state: AppState,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        Self::with_db(Database::open_in_memory().unwrap())
    }

    fn with_db(db: Database) -> Self {
        let state: AppState = Arc::new(AppStateInner {
            db,
            secure_cookies: false,
        });
        let router = router(state.clone());
        Self { state, router }
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut req = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, uri: &str, form: &str, cookie: Option<&str>) -> Response<Body> {
        let mut req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::from(form.to_string())).unwrap()).await
    }

    async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }

    async fn register(&self, username: &str, password: &str, color: &str) -> Response<Body> {
        let form = format!("username={}&password={}&color={}", username, password, color);
        self.post_form("/register", &form, None).await
    }

    /// Register and log in, returning the `Cookie` header value for the session.
    async fn sign_up(&self, username: &str, password: &str) -> String {
        let resp = self.register(username, password, "%23ff0000").await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);

        let form = format!("username={}&password={}", username, password);
        let resp = self.post_form("/login", &form, None).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        session_cookie(&resp).expect("login sets a session cookie")
    }
}

fn location(resp: &Response<Body>) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn session_cookie(resp: &Response<Body>) -> Option<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("parlor_session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

async fn body_text(resp: Response<Body>) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn register_login_and_post_end_to_end() {
    let app = TestApp::new();

    let resp = app.register("alice", "pw1", "%23ff0000").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");
    assert!(session_cookie(&resp).is_none(), "registration must not log in");

    let resp = app.post_form("/login", "username=alice&password=pw1", None).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
    let cookie = session_cookie(&resp).unwrap();

    let resp = app
        .post_form("/create_post", "title=Hello&content=World", Some(&cookie))
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");

    let resp = app.get("/", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_text(resp).await;
    assert_eq!(body.matches(">Hello</a>").count(), 1);
    assert!(body.contains(">alice</span>"));

    let posts = app.state.db.list_posts().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].title, "Hello");
    assert_eq!(posts[0].author, "alice");
}

#[tokio::test]
async fn protected_routes_redirect_to_login() {
    let app = TestApp::new();

    for uri in ["/", "/chat", "/my_page", "/create_post", "/post/1", "/logout"] {
        let resp = app.get(uri, None).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "GET {}", uri);
        assert_eq!(location(&resp), "/login", "GET {}", uri);
    }

    let resp = app.post_form("/delete_comment/1", "", None).await;
    assert_eq!(location(&resp), "/login");

    let resp = app.get("/", Some("parlor_session=forged")).await;
    assert_eq!(location(&resp), "/login");
}

#[tokio::test]
async fn duplicate_username_is_conflict() {
    let app = TestApp::new();
    assert_eq!(app.register("alice", "pw1", "%23ff0000").await.status(), StatusCode::SEE_OTHER);

    let resp = app.register("alice", "other", "%230000ff").await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert!(body_text(resp).await.contains("Username already exists"));
    assert_eq!(app.state.db.count_users().unwrap(), 1);

    // Surrounding whitespace does not make a new name
    let resp = app.register("alice%20", "other", "%230000ff").await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(app.state.db.count_users().unwrap(), 1);
}

#[tokio::test]
async fn usernames_are_trimmed_on_login() {
    let app = TestApp::new();
    app.register("%20alice%09", "pw1", "%23ff0000").await;
    assert!(app.state.db.get_user_by_username("alice").unwrap().is_some());

    let resp = app.post_form("/login", "username=alice%20&password=pw1", None).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(session_cookie(&resp).is_some());
}

#[tokio::test]
async fn color_outside_hex_triplet_is_rejected() {
    let app = TestApp::new();

    for color in ["red%3Bposition%3Afixed", "red", "%23ff0000%3Bdisplay%3Anone"] {
        let resp = app.register("mallory", "pw1", color).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "color {}", color);
        assert!(body_text(resp).await.contains("Color must look like #rrggbb"));
    }
    assert_eq!(app.state.db.count_users().unwrap(), 0);
}

#[tokio::test]
async fn bad_credentials_are_rejected() {
    let app = TestApp::new();
    app.register("alice", "pw1", "%23ff0000").await;

    let resp = app.post_form("/login", "username=alice&password=wrong", None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(session_cookie(&resp).is_none());

    let resp = app.post_form("/login", "username=nobody&password=pw1", None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(resp).await.contains("Invalid credentials"));
}

#[tokio::test]
async fn stranger_cannot_delete_a_comment() {
    let app = TestApp::new();
    let alice = app.sign_up("alice", "pw1").await;
    let bob = app.sign_up("bob", "pw2").await;

    app.post_form("/create_post", "title=P&content=body", Some(&alice)).await;
    let post_id = app.state.db.list_posts().unwrap()[0].id;

    let resp = app
        .post_form(&format!("/post/{}", post_id), "content=mine", Some(&alice))
        .await;
    assert_eq!(location(&resp), format!("/post/{}", post_id));
    let comment_id = app.state.db.list_comments(post_id).unwrap()[0].id;

    let resp = app
        .post_form(&format!("/delete_comment/{}", comment_id), "", Some(&bob))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(body_text(resp).await.contains("Unauthorized action"));

    let resp = app.get(&format!("/post/{}", post_id), Some(&alice)).await;
    assert!(body_text(resp).await.contains("<p>mine</p>"));
}

#[tokio::test]
async fn owner_edits_and_deletes_comment() {
    let app = TestApp::new();
    let alice = app.sign_up("alice", "pw1").await;
    let bob = app.sign_up("bob", "pw2").await;

    app.post_form("/create_post", "title=P&content=body", Some(&alice)).await;
    let post_id = app.state.db.list_posts().unwrap()[0].id;
    app.post_form(&format!("/post/{}", post_id), "content=draft", Some(&alice))
        .await;
    let comment_id = app.state.db.list_comments(post_id).unwrap()[0].id;
    let edit_uri = format!("/edit_comment/{}", comment_id);

    assert_eq!(app.get(&edit_uri, Some(&bob)).await.status(), StatusCode::FORBIDDEN);
    let resp = app.post_form(&edit_uri, "content=hijacked", Some(&bob)).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app.get(&edit_uri, Some(&alice)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains(">draft</textarea>"));

    let resp = app.post_form(&edit_uri, "content=final", Some(&alice)).await;
    assert_eq!(location(&resp), format!("/post/{}", post_id));
    let comment = app.state.db.get_comment(comment_id).unwrap().unwrap();
    assert_eq!(comment.content, "final");

    let resp = app
        .post_form(&format!("/delete_comment/{}", comment_id), "", Some(&alice))
        .await;
    assert_eq!(location(&resp), format!("/post/{}", post_id));
    assert!(app.state.db.get_comment(comment_id).unwrap().is_none());
}

#[tokio::test]
async fn replies_render_nested_and_stay_on_their_post() {
    let app = TestApp::new();
    let alice = app.sign_up("alice", "pw1").await;

    app.post_form("/create_post", "title=X&content=x", Some(&alice)).await;
    app.post_form("/create_post", "title=Y&content=y", Some(&alice)).await;
    let posts = app.state.db.list_posts().unwrap();
    let (y, x) = (posts[0].id, posts[1].id);

    app.post_form(&format!("/post/{}", x), "content=root&parent_id=", Some(&alice))
        .await;
    let root = app.state.db.list_comments(x).unwrap()[0].id;

    let resp = app
        .post_form(
            &format!("/post/{}", x),
            &format!("content=reply&parent_id={}", root),
            Some(&alice),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let top = app.state.db.list_top_level_comments(x).unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(app.state.db.list_replies(root).unwrap()[0].content, "reply");

    let body = body_text(app.get(&format!("/post/{}", x), Some(&alice)).await).await;
    assert!(body.contains("margin-left: 2em"));

    let resp = app
        .post_form(
            &format!("/post/{}", y),
            &format!("content=stray&parent_id={}", root),
            Some(&alice),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(app.state.db.list_comments(y).unwrap().is_empty());
}

#[tokio::test]
async fn chat_log_is_chronological() {
    let app = TestApp::new();
    let alice = app.sign_up("alice", "pw1").await;
    let bob = app.sign_up("bob", "pw2").await;

    for (who, text) in [(&alice, "msg-one"), (&bob, "msg-two"), (&alice, "msg-three")] {
        let resp = app.post_form("/chat", &format!("content={}", text), Some(who.as_str())).await;
        assert_eq!(location(&resp), "/chat");
    }

    let body = body_text(app.get("/chat", Some(&bob)).await).await;
    let one = body.find("msg-one").unwrap();
    let two = body.find("msg-two").unwrap();
    let three = body.find("msg-three").unwrap();
    assert!(one < two && two < three);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::new();
    let alice = app.sign_up("alice", "pw1").await;
    assert_eq!(app.get("/", Some(&alice)).await.status(), StatusCode::OK);

    let resp = app.get("/logout", Some(&alice)).await;
    assert_eq!(location(&resp), "/login");

    let resp = app.get("/", Some(&alice)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");
}

#[tokio::test]
async fn invalid_input_gets_structured_errors() {
    let app = TestApp::new();
    let alice = app.sign_up("alice", "pw1").await;

    let resp = app.post_form("/chat", "content=", Some(&alice)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(resp).await.contains("Message cannot be empty"));

    let resp = app.post_form("/create_post", "title=only", Some(&alice)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app.post_form("/register", "username=carol&password=pw", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert_eq!(app.get("/post/999", Some(&alice)).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get("/post/abc", Some(&alice)).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        app.post_form("/post/999", "content=hi", Some(&alice)).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn my_page_lists_only_own_posts() {
    let app = TestApp::new();
    let alice = app.sign_up("alice", "pw1").await;
    let bob = app.sign_up("bob", "pw2").await;

    app.post_form("/create_post", "title=AlicePost&content=a", Some(&alice)).await;
    app.post_form("/create_post", "title=BobPost&content=b", Some(&bob)).await;

    let body = body_text(app.get("/my_page", Some(&alice)).await).await;
    assert!(body.contains("AlicePost"));
    assert!(!body.contains("BobPost"));
}

#[tokio::test]
async fn busy_store_is_unavailable_and_writes_nothing() {
    let db = Database::open_in_memory()
        .unwrap()
        .with_lock_timeout(Duration::from_millis(50));
    let app = TestApp::with_db(db);
    let alice = app.sign_up("alice", "pw1").await;

    let (held, wait_held) = std::sync::mpsc::channel();
    let state = app.state.clone();
    let holder = std::thread::spawn(move || {
        state
            .db
            .with_conn(|_| {
                held.send(()).unwrap();
                std::thread::sleep(Duration::from_millis(500));
                Ok(())
            })
            .unwrap();
    });
    wait_held.recv().unwrap();

    let resp = app.post_form("/chat", "content=too-late", Some(&alice)).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body_text(resp).await.contains("try again shortly"));

    holder.join().unwrap();
    assert!(app.state.db.list_messages().unwrap().is_empty());
}
