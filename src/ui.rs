use axum::{
    body::Body,
    extract::Path,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "public/"]
struct PublicAssets;

fn asset_response(path: &str) -> Response {
    match PublicAssets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                Body::from(content.data.into_owned()),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}

pub async fn serve_index() -> impl IntoResponse {
    asset_response("index.html")
}

pub async fn serve_asset(Path(path): Path<String>) -> impl IntoResponse {
    asset_response(path.trim_start_matches('/'))
}
