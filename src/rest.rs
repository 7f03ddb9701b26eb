//! REST API layer using Axum.
//!
//! Public catalog routes are served directly; admin routes sit behind the
//! bearer-token gate. Every request runs under the CORS policy and a
//! request timeout.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

use crate::auth::{hash_password, verify_password, TokenIssuer, TokenValidator};
use crate::config::AuthConfig;
use crate::error::{ApiError, AuthError, ConfigError};
use crate::identity::IdentityStore;
use crate::middleware::{cors_layer, require_bearer, RequestScope};
use crate::models::{AuthenticatedUser, Credentials, Movie, MoviePayload};
use crate::poster::PosterLookup;
use crate::storage::Storage;

/// Shared app state for REST handlers (Arc-wrapped for concurrency).
pub struct AppState {
    pub storage: Storage,
    pub identities: Arc<dyn IdentityStore>,
    pub issuer: TokenIssuer,
    pub validator: TokenValidator,
    pub posters: Arc<dyn PosterLookup>,
    pub environment: String,
    /// Compared against when the email is unknown, so both failures cost one bcrypt check.
    decoy_hash: String,
}

impl AppState {
    /// `decoy_cost` must be the cost of the stored credential hashes
    /// (see `auth::hash_cost`) for an unknown email to take as long as a wrong password.
    pub fn new(
        storage: Storage,
        identities: Arc<dyn IdentityStore>,
        auth: Arc<AuthConfig>,
        posters: Arc<dyn PosterLookup>,
        decoy_cost: u32,
        environment: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let decoy_hash = hash_password(&uuid::Uuid::new_v4().to_string(), decoy_cost)?;
        Ok(Self {
            storage,
            identities,
            issuer: TokenIssuer::new(auth.clone()),
            validator: TokenValidator::new(auth),
            posters,
            environment: environment.into(),
            decoy_hash,
        })
    }
}

#[derive(Serialize)]
pub struct AppStatus {
    pub status: String,
    pub environment: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct JsonResponse {
    pub ok: bool,
    pub message: String,
}

/// Upper bound on how long a single request may take before it is answered with 408.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Create the Axum router: public routes, gated admin routes, global CORS and timeout.
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    let admin_routes = Router::new()
        .route("/v1/admin/editmovie", post(edit_movie_handler))
        .route("/v1/admin/deletemovie/:id", get(delete_movie_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    let router = Router::new()
        .route("/status", get(status_handler))
        .route("/v1/signin", post(signin_handler))
        .route("/v1/movie/:id", get(get_movie_handler))
        .route("/v1/movies", get(list_movies_handler))
        .route("/v1/movies/:genre_id", get(movies_by_genre_handler))
        .route("/v1/genres", get(list_genres_handler))
        .merge(admin_routes)
        .with_state(state);
    with_global_layers(router, REQUEST_TIMEOUT)
}

fn with_global_layers(router: Router, timeout: Duration) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .layer(cors_layer()),
    )
}

/// Wrap `data` as `{ key: data }`.
fn envelope<T: Serialize>(key: &str, data: T) -> Result<Json<Value>, ApiError> {
    let value = serde_json::to_value(data)
        .map_err(|e| ApiError::Internal(format!("error marshaling data: {e}")))?;
    let mut wrapped = serde_json::Map::new();
    wrapped.insert(key.to_string(), value);
    Ok(Json(Value::Object(wrapped)))
}

fn parse_field<T: FromStr>(value: &str, field: &str) -> Result<T, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid {field}: {value:?}")))
}

fn parse_release_date(value: &str) -> Result<Option<NaiveDate>, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| ApiError::BadRequest(format!("invalid release_date: {value:?}")))
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<AppStatus> {
    Json(AppStatus {
        status: "Available".to_string(),
        environment: state.environment.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Sign-in: verify the password, then mint a token.
///
/// A body that does not parse is answered exactly like a wrong password.
async fn signin_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(creds) = payload.map_err(|err| {
        tracing::warn!(error = %err.body_text(), "unauthorized user at signin");
        AuthError::InvalidCredentials
    })?;

    let identity = state.identities.find_by_email(&creds.email);
    let stored_hash = identity
        .as_ref()
        .map(|i| i.password_hash.clone())
        .unwrap_or_else(|| state.decoy_hash.clone());

    let password = creds.password;
    let verdict = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| ApiError::Internal(format!("password check aborted: {e}")))?;

    let identity = match (verdict, identity) {
        (Ok(()), Some(identity)) => identity,
        _ => {
            tracing::warn!("unauthorized user at signin");
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    let token = state
        .issuer
        .issue(&identity, Utc::now().timestamp())
        .map_err(|e| ApiError::Internal(format!("error signing: {e}")))?;

    tracing::info!(user_id = identity.id, "signed in");
    envelope("response", token)
}

async fn get_movie_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id: i64 = parse_field(&id, "id parameter")?;
    let movie = state
        .storage
        .get_movie(id)?
        .ok_or_else(|| ApiError::NotFound(format!("movie {id} not found")))?;
    envelope("movie", movie)
}

async fn list_movies_handler(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    envelope("movies", state.storage.all_movies(None)?)
}

async fn movies_by_genre_handler(
    State(state): State<Arc<AppState>>,
    Path(genre_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let genre_id: i64 = parse_field(&genre_id, "genre_id parameter")?;
    envelope("movies", state.storage.all_movies(Some(genre_id))?)
}

async fn list_genres_handler(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    envelope("genres", state.storage.all_genres()?)
}

/// Insert (`id == "0"`) or update a movie.
async fn edit_movie_handler(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    payload: Result<Json<MoviePayload>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(payload) = payload.map_err(|err| ApiError::BadRequest(err.body_text()))?;

    let id: i64 = parse_field(&payload.id, "id")?;
    let release_date = parse_release_date(&payload.release_date)?;
    let runtime: i32 = parse_field(&payload.runtime, "runtime")?;
    let rating: i32 = parse_field(&payload.rating, "rating")?;
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }

    let now = Utc::now();
    let mut movie = if id == 0 {
        Movie {
            id: 0,
            title: String::new(),
            description: String::new(),
            year: 0,
            release_date: None,
            runtime: 0,
            rating: 0,
            mpaa_rating: String::new(),
            poster: String::new(),
            genres: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    } else {
        state
            .storage
            .get_movie(id)?
            .ok_or_else(|| ApiError::NotFound(format!("movie {id} not found")))?
    };

    movie.year = match release_date {
        Some(date) => date.year(),
        None if !payload.year.trim().is_empty() => parse_field(&payload.year, "year")?,
        None => movie.year,
    };
    movie.title = payload.title;
    movie.description = payload.description;
    movie.release_date = release_date;
    movie.runtime = runtime;
    movie.rating = rating;
    movie.mpaa_rating = payload.mpaa_rating;
    movie.updated_at = now;

    if movie.poster.is_empty() {
        if let Some(poster) = state.posters.poster_for(&movie.title).await {
            movie.poster = poster;
        }
    }

    let movie_id = if id == 0 {
        state.storage.insert_movie(movie)?
    } else {
        state.storage.update_movie(&movie)?;
        id
    };
    tracing::info!(user_id = user.user_id, movie_id, "movie edited");

    envelope(
        "response",
        JsonResponse {
            ok: true,
            message: "Movie edited successfully".to_string(),
        },
    )
}

async fn delete_movie_handler(
    State(state): State<Arc<AppState>>,
    scope: RequestScope<String>,
) -> Result<Json<Value>, ApiError> {
    let id: i64 = parse_field(&scope.params, "id parameter")?;
    state.storage.delete_movie(id)?;
    tracing::info!(user_id = scope.user.user_id, movie_id = id, "movie deleted");

    envelope(
        "response",
        JsonResponse {
            ok: true,
            message: String::new(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_cost;
    use crate::auth::test_support::{admin, auth_config};
    use crate::identity::StaticIdentityStore;
    use crate::models::Genre;
    use crate::poster::NoPosterLookup;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::json;
    use tower::ServiceExt; // For .oneshot() testing

    struct FixedPoster;

    #[async_trait]
    impl PosterLookup for FixedPoster {
        async fn poster_for(&self, _title: &str) -> Option<String> {
            Some("/poster.jpg".to_string())
        }
    }

    fn test_state(storage: Storage, posters: Arc<dyn PosterLookup>) -> AppState {
        let admin = admin();
        let decoy_cost = hash_cost(&admin.password_hash).unwrap();
        AppState::new(
            storage,
            Arc::new(StaticIdentityStore::new(admin)),
            auth_config(),
            posters,
            decoy_cost,
            "test",
        )
        .unwrap()
    }

    fn test_app_with(posters: Arc<dyn PosterLookup>) -> (Router, Storage) {
        let storage = Storage::temporary().expect("Storage for REST test");
        let state = test_state(storage.clone(), posters);
        (create_router(state), storage)
    }

    fn test_app() -> (Router, Storage) {
        test_app_with(Arc::new(NoPosterLookup))
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.expect("request")
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_req(uri: &str, authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri).method("GET");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, authorization: Option<&str>, body: &Value) -> Request<Body> {
        let mut builder = Request::builder()
            .uri(uri)
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn signin(app: &Router) -> String {
        let response = send(
            app,
            post_json(
                "/v1/signin",
                None,
                &json!({ "email": "me@here.com", "password": "password" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        body["response"].as_str().expect("token string").to_string()
    }

    fn new_movie(title: &str) -> Value {
        json!({
            "id": "0",
            "title": title,
            "description": "A shark",
            "year": "",
            "release_date": "1975-06-20",
            "runtime": "124",
            "rating": "5",
            "mpaa_rating": "PG"
        })
    }

    fn seed_movie(storage: &Storage, title: &str, genre: (i64, &str)) -> i64 {
        storage
            .insert_movie(Movie {
                id: 0,
                title: title.to_string(),
                description: String::new(),
                year: 1979,
                release_date: None,
                runtime: 117,
                rating: 5,
                mpaa_rating: "R".to_string(),
                poster: String::new(),
                genres: BTreeMap::from([(genre.0, genre.1.to_string())]),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_status_and_cors_headers() {
        let (app, _) = test_app();
        let request = Request::builder()
            .uri("/status")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = send(&app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        let body = body_json(response).await;
        assert_eq!(body["status"], "Available");
        assert_eq!(body["environment"], "test");
    }

    #[tokio::test]
    async fn test_preflight_answered_with_cors() {
        let (app, _) = test_app();
        let request = Request::builder()
            .uri("/v1/admin/editmovie")
            .method("OPTIONS")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
            .body(Body::empty())
            .unwrap();
        let response = send(&app, request).await;

        // Answered by the CORS layer; the auth gate never sees it.
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS]
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(allowed.contains("authorization"), "{allowed}");
        assert!(allowed.contains("content-type"), "{allowed}");
        let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
        assert!(methods.contains("POST"), "{methods}");
    }

    #[tokio::test]
    async fn test_slow_request_times_out() {
        let router = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    "done"
                }),
            )
            .route("/fast", get(|| async { "done" }));
        let app = with_global_layers(router, Duration::from_millis(50));

        let response = send(&app, get_req("/slow", None)).await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        let response = send(&app, get_req("/fast", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_decoy_hash_matches_admin_cost() {
        let admin_cost = hash_cost(&admin().password_hash).unwrap();
        let state = test_state(Storage::temporary().unwrap(), Arc::new(NoPosterLookup));
        assert_eq!(hash_cost(&state.decoy_hash).unwrap(), admin_cost);

        let state = AppState::new(
            Storage::temporary().unwrap(),
            Arc::new(StaticIdentityStore::new(admin())),
            auth_config(),
            Arc::new(NoPosterLookup),
            5,
            "test",
        )
        .unwrap();
        assert_eq!(hash_cost(&state.decoy_hash).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_signin_then_protected_route_end_to_end() {
        let (app, storage) = test_app();
        let token = signin(&app).await;
        assert!(!token.is_empty());

        let response = send(
            &app,
            post_json(
                "/v1/admin/editmovie",
                Some(&format!("Bearer {token}")),
                &new_movie("Jaws"),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get_all(header::VARY)
            .iter()
            .any(|v| v == "Authorization"));
        let body = body_json(response).await;
        assert_eq!(body["response"]["ok"], true);
        assert_eq!(body["response"]["message"], "Movie edited successfully");

        let stored = storage.all_movies(None).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "Jaws");
        assert_eq!(stored[0].year, 1975);
        assert_eq!(stored[0].runtime, 124);

        // Last character flipped.
        let mut tampered = token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });
        let response = send(
            &app,
            post_json(
                "/v1/admin/editmovie",
                Some(&format!("Bearer {tampered}")),
                &new_movie("Alien"),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let response = send(
            &app,
            post_json("/v1/admin/editmovie", Some("Basic xyz"), &new_movie("Alien")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(&app, post_json("/v1/admin/editmovie", None, &new_movie("Alien"))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "invalid auth header");

        // Rejected requests never reach the handler.
        assert_eq!(storage.all_movies(None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_header_wins_over_token_checks() {
        let (app, _) = test_app();
        let token = signin(&app).await;

        let response = send(
            &app,
            get_req("/v1/admin/deletemovie/1", Some(&format!("Bearer {token} extra"))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &app,
            get_req("/v1/admin/deletemovie/1", Some("Bearer not.a.token extra")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_signin_rejections_are_uniform() {
        let (app, _) = test_app();

        let cases = [
            json!({ "email": "me@here.com", "password": "wrong" }),
            json!({ "email": "me@here.com", "password": "" }),
            json!({ "email": "nobody@here.com", "password": "password" }),
            json!({ "email": "me@here.com" }),
        ];
        for body in cases {
            let response = send(&app, post_json("/v1/signin", None, &body)).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{body}");
            let body = body_json(response).await;
            assert_eq!(body["error"]["message"], "unauthorized");
        }

        let garbage = Request::builder()
            .uri("/v1/signin")
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = send(&app, garbage).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_public_catalog_routes() {
        let (app, storage) = test_app();
        let alien = seed_movie(&storage, "Alien", (2, "Sci-Fi"));
        seed_movie(&storage, "Annie Hall", (3, "Comedy"));
        storage
            .insert_genre(&Genre {
                id: 2,
                genre_name: "Sci-Fi".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .unwrap();

        let response = send(&app, get_req(&format!("/v1/movie/{alien}"), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["movie"]["title"], "Alien");

        let response = send(&app, get_req("/v1/movie/abc", None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&app, get_req("/v1/movie/999", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, get_req("/v1/movies", None)).await;
        let body = body_json(response).await;
        assert_eq!(body["movies"].as_array().unwrap().len(), 2);

        let response = send(&app, get_req("/v1/movies/2", None)).await;
        let body = body_json(response).await;
        let movies = body["movies"].as_array().unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0]["title"], "Alien");

        let response = send(&app, get_req("/v1/genres", None)).await;
        let body = body_json(response).await;
        assert_eq!(body["genres"][0]["genre_name"], "Sci-Fi");
    }

    #[tokio::test]
    async fn test_delete_movie_behind_gate() {
        let (app, storage) = test_app();
        let id = seed_movie(&storage, "Alien", (2, "Sci-Fi"));
        let uri = format!("/v1/admin/deletemovie/{id}");

        let response = send(&app, get_req(&uri, None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(storage.get_movie(id).unwrap().is_some());

        let bearer = format!("Bearer {}", signin(&app).await);
        let response = send(&app, get_req(&uri, Some(&bearer))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["response"]["ok"], true);
        assert!(storage.get_movie(id).unwrap().is_none());

        let response = send(&app, get_req(&uri, Some(&bearer))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, get_req("/v1/admin/deletemovie/abc", Some(&bearer))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_edit_movie_updates_and_validates() {
        let (app, storage) = test_app_with(Arc::new(FixedPoster));
        let bearer = format!("Bearer {}", signin(&app).await);

        let response = send(&app, post_json("/v1/admin/editmovie", Some(&bearer), &new_movie("Jaws"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let created = storage.get_movie(1).unwrap().unwrap();
        assert_eq!(created.poster, "/poster.jpg");

        let mut update = new_movie("Jaws 2");
        update["id"] = json!("1");
        update["release_date"] = json!("1978-06-16");
        let response = send(&app, post_json("/v1/admin/editmovie", Some(&bearer), &update)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated = storage.get_movie(1).unwrap().unwrap();
        assert_eq!(updated.title, "Jaws 2");
        assert_eq!(updated.year, 1978);
        assert_eq!(updated.created_at, created.created_at);

        let mut missing = new_movie("Ghost");
        missing["id"] = json!("42");
        let response = send(&app, post_json("/v1/admin/editmovie", Some(&bearer), &missing)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let mut bad_runtime = new_movie("Jaws");
        bad_runtime["runtime"] = json!("two hours");
        let response = send(&app, post_json("/v1/admin/editmovie", Some(&bearer), &bad_runtime)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let mut bad_date = new_movie("Jaws");
        bad_date["release_date"] = json!("20/06/1975");
        let response = send(&app, post_json("/v1/admin/editmovie", Some(&bearer), &bad_date)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert_eq!(storage.all_movies(None).unwrap().len(), 1);
    }
}
