use std::io;
use std::sync::Arc;

use ntex::http::{header, StatusCode};
use ntex::util::Bytes;
use ntex::web;
use ntex::web::HttpRequest;
use ntex_files::NamedFile;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use spdlog::{error, info, warn};

use crate::auth::{self, Authorizer, LoginForm, SessionAuthorizer, SESSION_COOKIE};
use crate::catalog;
use crate::config::{self, Config};
use crate::content::{frontmatter, PostDocument};
use crate::error::ContentError;
use crate::generator::{GenerationOutcome, Generator};
use crate::images;
use crate::store::safe_path::safe_join;
use crate::store::ContentRepository;
use crate::suggest::suggest;
use crate::workflow::ContentWorkflow;

const JSON_BODY_LIMIT: usize = 4 * 1024 * 1024;

pub struct AppState {
    config: Config,
    workflow: ContentWorkflow,
    generator: Option<Generator>,
    authorizer: Box<dyn Authorizer>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let repository = ContentRepository::from_dirs(
            config.paths.drafts_dir.clone(),
            config.paths.published_dir.clone(),
        );
        let generator = config.generator.build_generator();
        if generator.is_none() {
            warn!("No generator API key configured, draft generation is disabled");
        }

        AppState {
            authorizer: Box::new(SessionAuthorizer::new(config.admin.session_value.clone())),
            workflow: ContentWorkflow::new(repository),
            generator,
            config,
        }
    }

    fn is_authorized(&self, req: &HttpRequest) -> bool {
        let principal = req.headers()
            .get(header::COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|cookies| auth::cookie_value(cookies, SESSION_COOKIE));
        self.authorizer.is_authorized(principal)
    }
}

type State = web::types::State<Arc<AppState>>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilePathRequest {
    file_path: String,
}

#[derive(Deserialize)]
struct SlugRequest {
    slug: String,
}

#[derive(Deserialize)]
struct SavePostRequest {
    slug: String,
    frontmatter: Map<String, Value>,
    #[serde(default)]
    body: String,
}

#[derive(Deserialize)]
struct TopicRequest {
    topic: String,
}

#[derive(Deserialize)]
struct SuggestRequest {
    content: String,
}

pub fn status_for(err: &ContentError) -> StatusCode {
    match err {
        ContentError::NotFound(_) => StatusCode::NOT_FOUND,
        ContentError::PathTraversal { .. }
        | ContentError::InvalidSlug(_)
        | ContentError::InvalidUpload(_)
        | ContentError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        ContentError::Conflict(_) => StatusCode::CONFLICT,
        ContentError::MalformedFrontmatter(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ContentError::Write { .. } | ContentError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> web::HttpResponse {
    match serde_json::to_string(value) {
        Ok(body) => web::HttpResponse::build(status)
            .content_type("application/json")
            .body(body),
        Err(e) => web::HttpResponse::InternalServerError()
            .body(format!("Error serializing response: {}", e)),
    }
}

fn message(status: StatusCode, text: impl Into<String>) -> web::HttpResponse {
    json_response(status, &json!({ "message": text.into() }))
}

fn error_response(err: &ContentError) -> web::HttpResponse {
    let status = status_for(err);
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        info!("Request rejected: {}", err);
    }
    message(status, err.to_string())
}

fn unauthorized() -> web::HttpResponse {
    message(StatusCode::UNAUTHORIZED, "Unauthorized")
}

/// JSON bodies are read only once the caller is authorized.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, web::HttpResponse> {
    serde_json::from_slice(body)
        .map_err(|e| message(StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e)))
}

fn is_json(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

fn redirect(location: &str) -> web::HttpResponse {
    web::HttpResponse::Found()
        .header("Location", location)
        .finish()
}

// Begin: Session region --------
#[web::post("/api/admin/login")]
async fn login(body: Bytes, state: State) -> web::HttpResponse {
    let form: LoginForm = match serde_urlencoded::from_bytes(&body) {
        Ok(form) => form,
        Err(_) => return redirect("/admin/login?error=true"),
    };

    let admin = &state.config.admin;
    if !auth::credentials_match(&form, admin.username.as_deref(), admin.password.as_deref()) {
        warn!("Failed login for user '{}'", form.username);
        return redirect("/admin/login?error=true");
    }

    info!("User '{}' logged in", form.username);
    web::HttpResponse::Found()
        .header("Location", "/admin")
        .header("Set-Cookie", auth::session_cookie(&admin.session_value, state.config.server.secure_cookies))
        .finish()
}

#[web::post("/api/admin/logout")]
async fn logout() -> web::HttpResponse {
    web::HttpResponse::Ok()
        .header("Set-Cookie", auth::clear_session_cookie())
        .content_type("application/json")
        .body(json!({ "message": "Logged out" }).to_string())
}
// End: Session region --------

#[web::get("/api/admin/content/drafts")]
async fn list_drafts(req: HttpRequest, state: State) -> web::HttpResponse {
    if !state.is_authorized(&req) {
        return unauthorized();
    }

    match state.workflow.repository().list_drafts() {
        Ok(drafts) => json_response(StatusCode::OK, &json!({ "drafts": drafts })),
        Err(e) => error_response(&e),
    }
}

#[web::post("/api/admin/content/approve")]
async fn approve(req: HttpRequest, body: Bytes, state: State) -> web::HttpResponse {
    if !state.is_authorized(&req) {
        return unauthorized();
    }
    let request: FilePathRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state.workflow.approve(&request.file_path) {
        Ok(approval) => json_response(StatusCode::OK, &json!({
            "message": format!("Draft '{}' approved and published.", request.file_path),
            "slug": approval.slug,
        })),
        Err(e) => error_response(&e),
    }
}

#[web::post("/api/admin/content/reject")]
async fn reject(req: HttpRequest, body: Bytes, state: State) -> web::HttpResponse {
    if !state.is_authorized(&req) {
        return unauthorized();
    }
    let request: FilePathRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state.workflow.reject(&request.file_path) {
        Ok(()) => message(StatusCode::OK, format!("Draft '{}' rejected and deleted.", request.file_path)),
        Err(e) => error_response(&e),
    }
}

#[web::post("/api/admin/content/unpublish")]
async fn unpublish(req: HttpRequest, body: Bytes, state: State) -> web::HttpResponse {
    if !state.is_authorized(&req) {
        return unauthorized();
    }
    let request: SlugRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state.workflow.unpublish(&request.slug) {
        Ok(unpublished) => message(StatusCode::OK, format!("Post '{}' moved back to drafts.", unpublished.slug)),
        Err(e) => error_response(&e),
    }
}

#[web::post("/api/admin/content/save-draft")]
async fn save_draft(req: HttpRequest, body: Bytes, state: State) -> web::HttpResponse {
    if !state.is_authorized(&req) {
        return unauthorized();
    }
    let request: SavePostRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let doc = PostDocument::new(frontmatter::from_json(&request.frontmatter), request.body);
    match state.workflow.save_draft(&request.slug, &doc) {
        Ok(_) => message(StatusCode::OK, format!("Draft '{}' saved successfully.", request.slug)),
        Err(e) => error_response(&e),
    }
}

#[web::post("/api/admin/content/save-published-post")]
async fn save_published_post(req: HttpRequest, body: Bytes, state: State) -> web::HttpResponse {
    if !state.is_authorized(&req) {
        return unauthorized();
    }
    let request: SavePostRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let doc = PostDocument::new(frontmatter::from_json(&request.frontmatter), request.body);
    match state.workflow.save_published(&request.slug, doc) {
        Ok(_) => message(StatusCode::OK, format!("Post '{}' updated successfully.", request.slug)),
        Err(e) => error_response(&e),
    }
}

#[web::post("/api/admin/generate")]
async fn generate(req: HttpRequest, body: Bytes, state: State) -> web::HttpResponse {
    if !state.is_authorized(&req) {
        return unauthorized();
    }
    let request: TopicRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let topic = request.topic.trim();
    if topic.is_empty() {
        return message(StatusCode::BAD_REQUEST, "'topic' is required and must be a non-empty string.");
    }
    let Some(generator) = state.generator.as_ref() else {
        return message(StatusCode::SERVICE_UNAVAILABLE, "Draft generation is not configured.");
    };

    match generator.generate(topic, &state.workflow).await {
        Ok(GenerationOutcome::Saved { slug, title, .. }) => json_response(StatusCode::OK, &json!({
            "message": format!("Draft '{}' generated.", title),
            "slug": slug,
        })),
        Ok(GenerationOutcome::Duplicate(verdict)) => json_response(StatusCode::CONFLICT, &json!({
            "message": format!("Topic not generated: {}.", verdict.reason()),
            "duplicateOf": verdict.matched_entry().map(|entry| entry.title.clone()),
        })),
        Err(e) => error_response(&e),
    }
}

#[web::post("/api/admin/ai/suggest")]
async fn ai_suggest(req: HttpRequest, body: Bytes, state: State) -> web::HttpResponse {
    if !state.is_authorized(&req) {
        return unauthorized();
    }
    let request: SuggestRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    json_response(StatusCode::OK, &json!({ "suggestion": suggest(&request.content) }))
}

#[web::post("/api/admin/upload-image")]
async fn upload_image(req: HttpRequest, body: Bytes, state: State) -> web::HttpResponse {
    if !state.is_authorized(&req) {
        return unauthorized();
    }

    let content_type = req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    let max_size = state.config.uploads.max_image_bytes;

    match images::store_image(&state.config.paths.images_dir, content_type, &body, max_size) {
        Ok(stored) => json_response(StatusCode::OK, &json!({ "url": stored.url })),
        Err(e) => error_response(&e),
    }
}

#[web::post("/api/admin/config")]
async fn save_config(req: HttpRequest, body: Bytes, state: State) -> web::HttpResponse {
    if !state.is_authorized(&req) {
        return unauthorized();
    }
    if !is_json(&req) {
        return message(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Content-Type must be application/json");
    }
    let section: Map<String, Value> = match parse_body::<Value>(&body) {
        Ok(Value::Object(section)) => section,
        Ok(_) => return message(StatusCode::BAD_REQUEST, "Invalid JSON data: Expected an object."),
        Err(response) => return response,
    };
    let Some(cfg_path) = state.config.source.as_deref() else {
        return message(StatusCode::SERVICE_UNAVAILABLE, "The configuration was not loaded from a file.");
    };

    match config::save_generator_section(cfg_path, &section) {
        Ok(_) => message(StatusCode::OK, "Configuration saved successfully"),
        Err(e) => error_response(&e),
    }
}

#[web::get("/images/{file_name}")]
async fn image_files(path: web::types::Path<String>, state: State) -> Result<NamedFile, web::Error> {
    let file_path = match safe_join(&state.config.paths.images_dir, &path.into_inner()) {
        Ok(file_path) => file_path,
        Err(_) => return Err(web::error::ErrorUnauthorized("Access forbidden").into()),
    };

    Ok(NamedFile::open(file_path)?)
}

// Begin: Catalog region --------
#[web::get("/api/tags.json")]
async fn tags(state: State) -> web::HttpResponse {
    match state.workflow.repository().list_published() {
        Ok(entries) => json_response(StatusCode::OK, &catalog::unique_tags(&entries)),
        Err(e) => error_response(&e),
    }
}

#[web::get("/api/randomPost.json")]
async fn random_post(state: State) -> web::HttpResponse {
    let entries = match state.workflow.repository().list_published() {
        Ok(entries) => entries,
        Err(e) => return error_response(&e),
    };

    match catalog::random_post(&entries, &mut rand::thread_rng()) {
        Some(entry) => json_response(StatusCode::OK, &json!({
            "title": entry.title,
            "url": catalog::post_url(&entry.slug),
        })),
        None => json_response(StatusCode::NOT_FOUND, &json!({ "error": "No blog posts found" })),
    }
}

#[web::get("/api/posts/{slug}/related")]
async fn related_posts(path: web::types::Path<String>, state: State) -> web::HttpResponse {
    let slug = path.into_inner();
    let entries = match state.workflow.repository().list_published() {
        Ok(entries) => entries,
        Err(e) => return error_response(&e),
    };

    match catalog::related_posts(&slug, &entries, catalog::MAX_RELATED_POSTS) {
        Some(related) => json_response(StatusCode::OK, &related),
        None => error_response(&ContentError::NotFound(format!("published/{}", slug))),
    }
}

#[web::get("/api/categories/{category}")]
async fn category_posts(path: web::types::Path<String>, state: State) -> web::HttpResponse {
    let category = path.into_inner();
    match state.workflow.repository().list_published() {
        Ok(entries) => json_response(StatusCode::OK, &catalog::posts_by_category(&entries, &category)),
        Err(e) => error_response(&e),
    }
}
// End: Catalog region --------

pub async fn server_run(config: Config) -> io::Result<()> {
    let bind_addr = config.server.address.clone();
    let bind_port = config.server.port;
    // One byte over the image limit so oversized images reach the validation message
    let body_limit = (config.uploads.max_image_bytes + 1).max(JSON_BODY_LIMIT);
    let app_state = Arc::new(AppState::new(config));

    web::HttpServer::new(move || {
        web::App::new()
            .state(app_state.clone())
            .state(web::types::PayloadConfig::new(body_limit))
            .service(login)
            .service(logout)
            .service(list_drafts)
            .service(approve)
            .service(reject)
            .service(unpublish)
            .service(save_draft)
            .service(save_published_post)
            .service(generate)
            .service(ai_suggest)
            .service(upload_image)
            .service(save_config)
            .service(image_files)
            .service(tags)
            .service(random_post)
            .service(related_posts)
            .service(category_posts)
    })
        .bind((bind_addr, bind_port))?
        .run()
        .await
}
