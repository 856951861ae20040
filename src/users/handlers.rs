use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use crate::{
    state::AppState,
    users::{
        dto::{BiographyBody, NewUser, SafeUser, UserBody, UserUpdate},
        services::ServiceError,
    },
};

pub const INVALID_USER_BODY: &str = "Invalid user body";
pub const INVALID_REQUEST_BODY: &str = "Invalid request body";

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/resetPassword", patch(reset_password))
        .route("/updateBiography", patch(update_biography))
        .route("/getUser/:username", get(get_user))
        .route("/getUsers", get(get_users))
        .route("/deleteUser/:username", delete(delete_user))
}

/// Username and password, both present and non-empty.
fn credentials(body: Result<Json<UserBody>, JsonRejection>) -> Option<(String, String)> {
    let Json(body) = body.ok()?;
    let username = body.username.filter(|s| !s.is_empty())?;
    let password = body.password.filter(|s| !s.is_empty())?;
    Some((username, password))
}

fn bad_request(message: &str) -> (StatusCode, String) {
    warn!(reason = message, "rejected request body");
    (StatusCode::BAD_REQUEST, message.to_string())
}

fn internal(op: &'static str) -> impl FnOnce(ServiceError) -> (StatusCode, String) {
    move |e| {
        error!(error = %e, op, "user service failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    body: Result<Json<UserBody>, JsonRejection>,
) -> ApiResult<SafeUser> {
    let (username, password) = credentials(body).ok_or_else(|| bad_request(INVALID_USER_BODY))?;

    let new_user = NewUser {
        username,
        password,
        date_joined: OffsetDateTime::now_utc(),
    };
    let user = state.users.create(new_user).await.map_err(internal("signup"))?;

    info!(user_id = %user.id, username = %user.username, "user signed up");
    Ok(Json(user))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<UserBody>, JsonRejection>,
) -> ApiResult<SafeUser> {
    let (username, password) = credentials(body).ok_or_else(|| bad_request(INVALID_USER_BODY))?;

    let user = state
        .users
        .authenticate(&username, &password)
        .await
        .map_err(internal("login"))?;

    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok(Json(user))
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    body: Result<Json<UserBody>, JsonRejection>,
) -> ApiResult<SafeUser> {
    let (username, password) = credentials(body).ok_or_else(|| bad_request(INVALID_USER_BODY))?;

    let user = state
        .users
        .update(&username, UserUpdate::password(password))
        .await
        .map_err(internal("reset_password"))?;

    info!(user_id = %user.id, "password reset");
    Ok(Json(user))
}

#[instrument(skip_all)]
pub async fn update_biography(
    State(state): State<AppState>,
    body: Result<Json<BiographyBody>, JsonRejection>,
) -> ApiResult<SafeUser> {
    // An empty biography is allowed; it clears the text.
    let (username, biography) = body
        .ok()
        .and_then(|Json(b)| Some((b.username.filter(|s| !s.is_empty())?, b.biography?)))
        .ok_or_else(|| bad_request(INVALID_REQUEST_BODY))?;

    let user = state
        .users
        .update(&username, UserUpdate::biography(biography))
        .await
        .map_err(internal("update_biography"))?;

    info!(user_id = %user.id, "biography updated");
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<SafeUser> {
    let user = state.users.find(&username).await.map_err(internal("get_user"))?;
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn get_users(State(state): State<AppState>) -> ApiResult<Vec<SafeUser>> {
    let users = state.users.list().await.map_err(internal("get_users"))?;
    Ok(Json(users))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<SafeUser> {
    let user = state.users.delete(&username).await.map_err(internal("delete_user"))?;
    info!(user_id = %user.id, username = %user.username, "user deleted");
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header::CONTENT_TYPE, Method, Request},
        response::Response,
    };
    use serde_json::{json, Value};
    use time::macros::datetime;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::{
        app::build_app,
        users::services::{ServiceResult, UserService},
    };

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Create(NewUser),
        Authenticate(String, String),
        Update(String, UserUpdate),
        Find(String),
        List,
        Delete(String),
    }

    /// Records every call and answers with a canned user, or fails everything.
    struct Recorder {
        calls: Mutex<Vec<Call>>,
        fail: bool,
    }

    impl Recorder {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn answer(&self, call: Call, user: SafeUser) -> ServiceResult<SafeUser> {
            self.calls.lock().unwrap().push(call);
            if self.fail {
                Err(ServiceError::Storage(anyhow::anyhow!("database unavailable")))
            } else {
                Ok(user)
            }
        }
    }

    fn canned(username: &str) -> SafeUser {
        SafeUser {
            id: Uuid::nil(),
            username: username.into(),
            date_joined: datetime!(2024-05-01 8:00 UTC),
            biography: None,
        }
    }

    #[async_trait]
    impl UserService for Recorder {
        async fn create(&self, user: NewUser) -> ServiceResult<SafeUser> {
            let out = SafeUser {
                date_joined: user.date_joined,
                ..canned(&user.username)
            };
            self.answer(Call::Create(user), out)
        }
        async fn authenticate(&self, username: &str, password: &str) -> ServiceResult<SafeUser> {
            self.answer(Call::Authenticate(username.into(), password.into()), canned(username))
        }
        async fn update(&self, username: &str, update: UserUpdate) -> ServiceResult<SafeUser> {
            let out = SafeUser {
                biography: update.biography.clone(),
                ..canned(username)
            };
            self.answer(Call::Update(username.into(), update), out)
        }
        async fn find(&self, username: &str) -> ServiceResult<SafeUser> {
            self.answer(Call::Find(username.into()), canned(username))
        }
        async fn list(&self) -> ServiceResult<Vec<SafeUser>> {
            self.answer(Call::List, canned("ada")).map(|u| vec![u, canned("bob")])
        }
        async fn delete(&self, username: &str) -> ServiceResult<SafeUser> {
            self.answer(Call::Delete(username.into()), canned(username))
        }
    }

    fn app(svc: Arc<Recorder>) -> Router {
        let mut state = AppState::in_memory();
        state.users = svc as Arc<dyn UserService>;
        build_app(state)
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header(CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        app.oneshot(req.body(body).unwrap()).await.unwrap()
    }

    async fn text(res: Response) -> String {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn json_body(res: Response) -> Value {
        serde_json::from_str(&text(res).await).unwrap()
    }

    const CREDENTIAL_ROUTES: [(&str, &str); 3] = [
        ("POST", "/user/signup"),
        ("POST", "/user/login"),
        ("PATCH", "/user/resetPassword"),
    ];

    #[tokio::test]
    async fn credential_routes_reject_incomplete_bodies() {
        let bad_bodies = [
            json!({}),
            json!({ "username": "ada" }),
            json!({ "password": "pw" }),
            json!({ "username": "", "password": "pw" }),
            json!({ "username": "ada", "password": "" }),
            json!({ "username": 7, "password": "pw" }),
        ];
        for (method, uri) in CREDENTIAL_ROUTES {
            for body in &bad_bodies {
                let svc = Recorder::new(false);
                let res = send(app(svc.clone()), method.parse().unwrap(), uri, Some(body.clone())).await;
                assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{method} {uri} {body}");
                assert_eq!(text(res).await, INVALID_USER_BODY);
                assert!(svc.calls().is_empty());
            }
        }
    }

    #[tokio::test]
    async fn credential_routes_reject_missing_or_malformed_payload() {
        for (method, uri) in CREDENTIAL_ROUTES {
            let svc = Recorder::new(false);
            let res = send(app(svc.clone()), method.parse().unwrap(), uri, None).await;
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
            assert_eq!(text(res).await, INVALID_USER_BODY);

            let req = Request::builder()
                .method(method)
                .uri(uri)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap();
            let res = app(svc.clone()).oneshot(req).await.unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
            assert!(svc.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn update_biography_rejects_incomplete_bodies() {
        for body in [
            json!({}),
            json!({ "username": "ada" }),
            json!({ "biography": "hi" }),
            json!({ "username": "", "biography": "hi" }),
        ] {
            let svc = Recorder::new(false);
            let res = send(app(svc.clone()), Method::PATCH, "/user/updateBiography", Some(body)).await;
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
            assert_eq!(text(res).await, INVALID_REQUEST_BODY);
            assert!(svc.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn signup_passes_submitted_fields_and_join_date() {
        let svc = Recorder::new(false);
        let before = OffsetDateTime::now_utc();
        let res = send(
            app(svc.clone()),
            Method::POST,
            "/user/signup",
            Some(json!({ "username": "ada", "password": "pw" })),
        )
        .await;
        let after = OffsetDateTime::now_utc();
        assert_eq!(res.status(), StatusCode::OK);

        let calls = svc.calls();
        let [Call::Create(new_user)] = calls.as_slice() else {
            panic!("unexpected calls: {calls:?}");
        };
        assert_eq!(new_user.username, "ada");
        assert_eq!(new_user.password, "pw");
        assert!(before <= new_user.date_joined && new_user.date_joined <= after);

        let expected = SafeUser {
            date_joined: new_user.date_joined,
            ..canned("ada")
        };
        let body = json_body(res).await;
        assert_eq!(body, serde_json::to_value(&expected).unwrap());
        assert!(body.get("password").is_none());
        let date = body["dateJoined"].as_str().unwrap();
        assert!(OffsetDateTime::parse(date, &time::format_description::well_known::Rfc3339).is_ok());
    }

    #[tokio::test]
    async fn login_delegates_credentials() {
        let svc = Recorder::new(false);
        let res = send(
            app(svc.clone()),
            Method::POST,
            "/user/login",
            Some(json!({ "username": "ada", "password": "pw" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(svc.calls(), vec![Call::Authenticate("ada".into(), "pw".into())]);
        assert_eq!(json_body(res).await["username"], "ada");
    }

    #[tokio::test]
    async fn reset_password_updates_only_the_password() {
        let svc = Recorder::new(false);
        let res = send(
            app(svc.clone()),
            Method::PATCH,
            "/user/resetPassword",
            Some(json!({ "username": "ada", "password": "new-pw", "biography": "ignored" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            svc.calls(),
            vec![Call::Update("ada".into(), UserUpdate::password("new-pw"))]
        );
    }

    #[tokio::test]
    async fn update_biography_updates_only_the_biography() {
        let svc = Recorder::new(false);
        let res = send(
            app(svc.clone()),
            Method::PATCH,
            "/user/updateBiography",
            Some(json!({ "username": "ada", "biography": "likes engines", "password": "ignored" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            svc.calls(),
            vec![Call::Update("ada".into(), UserUpdate::biography("likes engines"))]
        );
        assert_eq!(json_body(res).await["biography"], "likes engines");
    }

    #[tokio::test]
    async fn update_biography_accepts_empty_text() {
        let svc = Recorder::new(false);
        let res = send(
            app(svc.clone()),
            Method::PATCH,
            "/user/updateBiography",
            Some(json!({ "username": "ada", "biography": "" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(svc.calls(), vec![Call::Update("ada".into(), UserUpdate::biography(""))]);
    }

    #[tokio::test]
    async fn lookup_list_and_delete_delegate() {
        let svc = Recorder::new(false);

        let res = send(app(svc.clone()), Method::GET, "/user/getUser/ada", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["username"], "ada");

        let res = send(app(svc.clone()), Method::GET, "/user/getUsers", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let list = json_body(res).await;
        assert_eq!(list.as_array().map(Vec::len), Some(2));

        let res = send(app(svc.clone()), Method::DELETE, "/user/deleteUser/bob", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["username"], "bob");

        assert_eq!(
            svc.calls(),
            vec![Call::Find("ada".into()), Call::List, Call::Delete("bob".into())]
        );
    }

    #[tokio::test]
    async fn missing_path_parameter_is_not_found() {
        for (method, uri) in [
            (Method::GET, "/user/getUser"),
            (Method::GET, "/user/getUser/"),
            (Method::DELETE, "/user/deleteUser"),
            (Method::DELETE, "/user/deleteUser/"),
        ] {
            let svc = Recorder::new(false);
            let res = send(app(svc.clone()), method, uri, None).await;
            assert_eq!(res.status(), StatusCode::NOT_FOUND, "{uri}");
            assert!(svc.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn service_errors_are_internal_on_every_route() {
        let creds = json!({ "username": "ada", "password": "pw" });
        let bio = json!({ "username": "ada", "biography": "hi" });
        let cases = [
            (Method::POST, "/user/signup", Some(creds.clone())),
            (Method::POST, "/user/login", Some(creds.clone())),
            (Method::PATCH, "/user/resetPassword", Some(creds)),
            (Method::PATCH, "/user/updateBiography", Some(bio)),
            (Method::GET, "/user/getUser/ada", None),
            (Method::GET, "/user/getUsers", None),
            (Method::DELETE, "/user/deleteUser/ada", None),
        ];
        for (method, uri, body) in cases {
            let svc = Recorder::new(true);
            let res = send(app(svc.clone()), method, uri, body).await;
            assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
            assert_eq!(svc.calls().len(), 1);
        }
    }

    #[tokio::test]
    async fn full_lifecycle_against_memory_store() {
        let app = build_app(AppState::in_memory());
        let creds = json!({ "username": "ada", "password": "pw" });

        let res = send(app.clone(), Method::POST, "/user/signup", Some(creds.clone())).await;
        assert_eq!(res.status(), StatusCode::OK);
        let created = json_body(res).await;

        let res = send(app.clone(), Method::POST, "/user/signup", Some(creds.clone())).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let res = send(app.clone(), Method::POST, "/user/login", Some(creds)).await;
        assert_eq!(json_body(res).await, created);

        let wrong = json!({ "username": "ada", "password": "nope" });
        let res = send(app.clone(), Method::POST, "/user/login", Some(wrong)).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let res = send(
            app.clone(),
            Method::PATCH,
            "/user/updateBiography",
            Some(json!({ "username": "ada", "biography": "hi" })),
        )
        .await;
        assert_eq!(json_body(res).await["biography"], "hi");

        let res = send(app.clone(), Method::DELETE, "/user/deleteUser/ada", None).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = send(app.clone(), Method::GET, "/user/getUser/ada", None).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let res = send(app, Method::GET, "/user/getUsers", None).await;
        assert_eq!(json_body(res).await, json!([]));
    }
}
