use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose, Engine};
use std::sync::Arc;

use crate::handlers::Shell;
use crate::models::{ImageMime, PromptTemplate, UploadedImage, NUTRITION_PROMPT};
use crate::services::InferenceGateway;

pub mod page;

/// Name of the file input on the form.
const IMAGE_FIELD: &str = "image";

// Hidden fields carrying the last selected image back with a re-submit.
const CARRIED_DATA_FIELD: &str = "image_data";
const CARRIED_MIME_FIELD: &str = "image_mime";
const CARRIED_NAME_FIELD: &str = "image_name";

pub struct AppState {
    pub gateway: Arc<dyn InferenceGateway>,
    pub prompt: PromptTemplate,
}

pub fn create_router(gateway: Arc<dyn InferenceGateway>, max_upload_bytes: usize) -> Router {
    let state = Arc::new(AppState {
        gateway,
        prompt: NUTRITION_PROMPT,
    });

    Router::new()
        .route("/", get(index_handler))
        .route("/analyze", post(analyze_handler))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    let shell = Shell::new(state.prompt);
    Html(page::render(&shell.view()))
}

struct FilePart {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Bytes,
}

/// The fields of one form submission.
#[derive(Default)]
struct AnalyzeForm {
    upload: Option<FilePart>,
    carried_data: Option<String>,
    carried_mime: Option<String>,
    carried_name: Option<String>,
}

fn upload_error(e: MultipartError) -> (StatusCode, String) {
    log::error!("❌ Failed to read upload: {}", e);
    (e.status(), e.body_text())
}

async fn read_form(multipart: &mut Multipart) -> Result<AnalyzeForm, (StatusCode, String)> {
    let mut form = AnalyzeForm::default();

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(IMAGE_FIELD) => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(upload_error)?;
                form.upload = Some(FilePart {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            Some(CARRIED_DATA_FIELD) => {
                form.carried_data = Some(field.text().await.map_err(upload_error)?)
            }
            Some(CARRIED_MIME_FIELD) => {
                form.carried_mime = Some(field.text().await.map_err(upload_error)?)
            }
            Some(CARRIED_NAME_FIELD) => {
                form.carried_name = Some(field.text().await.map_err(upload_error)?)
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Rebuilds the image the previous page carried, if any.
fn carried_image(form: AnalyzeForm) -> Result<Option<UploadedImage>, (StatusCode, String)> {
    let Some(data) = form.carried_data.filter(|d| !d.trim().is_empty()) else {
        return Ok(None);
    };

    let mime = form
        .carried_mime
        .as_deref()
        .and_then(ImageMime::from_content_type)
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "Missing or unsupported image type for the carried image".to_string(),
            )
        })?;

    let bytes = general_purpose::STANDARD.decode(data.trim()).map_err(|e| {
        log::error!("❌ Failed to decode carried image: {}", e);
        (
            StatusCode::BAD_REQUEST,
            "Carried image is not valid base64".to_string(),
        )
    })?;

    let file_name = form.carried_name.filter(|n| !n.is_empty());
    Ok(Some(UploadedImage::new(file_name, mime, bytes)))
}

fn select_upload(shell: &mut Shell, file: FilePart) {
    match ImageMime::resolve(file.content_type.as_deref(), file.file_name.as_deref()) {
        Some(mime) => {
            shell.select_file(UploadedImage::new(file.file_name, mime, file.bytes.to_vec()))
        }
        None => {
            let declared = file
                .content_type
                .as_deref()
                .or(file.file_name.as_deref())
                .unwrap_or("unknown");
            shell.reject_file(format!(
                "Unsupported file type '{}'. Please upload a JPG or PNG image.",
                declared
            ));
        }
    }
}

async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Html<String>, (StatusCode, String)> {
    let mut shell = Shell::new(state.prompt);
    let mut form = read_form(&mut multipart).await?;

    // Browsers send an empty file part when no file was chosen; a fresh file
    // always wins over the one carried from the previous answer.
    match form.upload.take().filter(|file| !file.bytes.is_empty()) {
        Some(file) => select_upload(&mut shell, file),
        None => match carried_image(form)? {
            Some(image) => shell.select_file(image),
            None => shell.clear_file(),
        },
    }

    shell.submit(state.gateway.as_ref()).await;

    Ok(Html(page::render(&shell.view())))
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InferenceRequest;
    use crate::services::ai_service::MockInferenceGateway;
    use crate::services::GatewayError;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-MEAL-ANALYZER-BOUNDARY";
    const LIMIT: usize = 10 * 1024 * 1024;

    enum FormPart<'a> {
        File {
            file_name: &'a str,
            content_type: &'a str,
            bytes: &'a [u8],
        },
        Text {
            name: &'a str,
            value: &'a str,
        },
    }

    fn multipart_form(parts: &[FormPart<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                FormPart::File {
                    file_name,
                    content_type,
                    bytes,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\n",
                            file_name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(
                        format!("Content-Type: {}\r\n\r\n", content_type).as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
                FormPart::Text { name, value } => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn multipart_body(file_name: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
        multipart_form(&[FormPart::File {
            file_name,
            content_type,
            bytes,
        }])
    }

    /// Value of the hidden input `name` on a rendered page.
    fn hidden_value(html: &str, name: &str) -> String {
        let marker = format!("name=\"{}\" value=\"", name);
        let start = html.find(&marker).unwrap() + marker.len();
        let end = start + html[start..].find('"').unwrap();
        html[start..end].to_string()
    }

    fn analyze_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/analyze")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_index_renders_form() {
        let mut gateway = MockInferenceGateway::new();
        gateway.expect_analyze().times(0);
        let app = create_router(Arc::new(gateway), LIMIT);

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (status, html) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("Choose an image of your meal..."));
        assert!(html.contains("Please upload an image to get started."));
    }

    #[tokio::test]
    async fn test_jpeg_upload_shows_analysis() {
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x01, 0x02, 0x03, 0xFF, 0xD9];
        let expected = jpeg.clone();
        let answer = "1. Apple - 95 calories\nHealthy\n- **Carbohydrates:** 95%";

        let mut gateway = MockInferenceGateway::new();
        gateway
            .expect_analyze()
            .withf(move |request: &InferenceRequest| {
                let image = request.image.as_ref().unwrap();
                image.bytes == expected && image.mime == ImageMime::Jpeg
            })
            .times(1)
            .returning(move |_| Ok(answer.to_string()));
        let app = create_router(Arc::new(gateway), LIMIT);

        let body = multipart_body("apple.jpg", "image/jpeg", &jpeg);
        let (status, html) = send(app, analyze_request(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("<h3>Nutritional Analysis:</h3>"));
        assert!(html.contains("1. Apple - 95 calories\nHealthy\n- **Carbohydrates:** 95%"));
        assert!(html.contains("<figcaption>Uploaded Image</figcaption>"));
    }

    #[tokio::test]
    async fn test_submit_without_file_warns() {
        let mut gateway = MockInferenceGateway::new();
        gateway.expect_analyze().times(0);
        let app = create_router(Arc::new(gateway), LIMIT);

        let body = multipart_body("", "application/octet-stream", b"");
        let (status, html) = send(app, analyze_request(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(html.contains(
            "Please upload an image before clicking &#39;Analyze My Meal!&#39;."
        ));
        assert!(!html.contains("Nutritional Analysis:"));
    }

    #[tokio::test]
    async fn test_gateway_failure_renders_fallback() {
        let mut gateway = MockInferenceGateway::new();
        gateway.expect_analyze().times(1).returning(|_| {
            Err(GatewayError::Service {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                message: "overloaded".to_string(),
            })
        });
        let app = create_router(Arc::new(gateway), LIMIT);

        let body = multipart_body("salad.png", "image/png", &[0x89, 0x50, 0x4E, 0x47]);
        let (status, html) = send(app, analyze_request(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("Could not get a response from Gemini. Please try again."));
        assert!(html.contains("Error generating content with Gemini:"));
    }

    #[tokio::test]
    async fn test_unsupported_type_is_not_sent() {
        let mut gateway = MockInferenceGateway::new();
        gateway.expect_analyze().times(0);
        let app = create_router(Arc::new(gateway), LIMIT);

        let body = multipart_body("anim.gif", "image/gif", b"GIF89a");
        let (_, html) = send(app, analyze_request(body)).await;

        assert!(html.contains("Unsupported file type &#39;image/gif&#39;."));
    }

    #[tokio::test]
    async fn test_upload_over_limit_is_rejected() {
        let mut gateway = MockInferenceGateway::new();
        gateway.expect_analyze().times(0);
        let app = create_router(Arc::new(gateway), 1024);

        let body = multipart_body("big.jpg", "image/jpeg", &vec![0u8; 4096]);
        let (status, _) = send(app, analyze_request(body)).await;

        assert_ne!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_result_page_can_be_submitted_again() {
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x2B, 0x2F, 0x3D, 0xFF, 0xD9];
        let expected = jpeg.clone();

        let mut gateway = MockInferenceGateway::new();
        gateway
            .expect_analyze()
            .withf(move |request: &InferenceRequest| {
                let image = request.image.as_ref().unwrap();
                image.bytes == expected && image.mime == ImageMime::Jpeg
            })
            .times(2)
            .returning(|_| Ok("1. Apple - 95 calories".to_string()));
        let app = create_router(Arc::new(gateway), LIMIT);

        let body = multipart_body("apple.jpg", "image/jpeg", &jpeg);
        let (_, first) = send(app.clone(), analyze_request(body)).await;

        // Same form again: the file input is empty, the hidden fields are not.
        let data = hidden_value(&first, "image_data");
        let mime = hidden_value(&first, "image_mime");
        let name = hidden_value(&first, "image_name");
        let body = multipart_form(&[
            FormPart::File {
                file_name: "",
                content_type: "application/octet-stream",
                bytes: b"",
            },
            FormPart::Text {
                name: "image_data",
                value: &data,
            },
            FormPart::Text {
                name: "image_mime",
                value: &mime,
            },
            FormPart::Text {
                name: "image_name",
                value: &name,
            },
        ]);
        let (status, second) = send(app, analyze_request(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(name, "apple.jpg");
        assert!(second.contains("<h3>Nutritional Analysis:</h3>"));
        assert!(!second.contains("Please upload an image before clicking"));
    }

    #[tokio::test]
    async fn test_new_file_replaces_carried_image() {
        let png = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        let expected = png.clone();

        let mut gateway = MockInferenceGateway::new();
        gateway
            .expect_analyze()
            .withf(move |request: &InferenceRequest| {
                let image = request.image.as_ref().unwrap();
                image.bytes == expected && image.mime == ImageMime::Png
            })
            .times(1)
            .returning(|_| Ok("1. Salad - 150 calories".to_string()));
        let app = create_router(Arc::new(gateway), LIMIT);

        let body = multipart_form(&[
            FormPart::File {
                file_name: "salad.png",
                content_type: "image/png",
                bytes: &png,
            },
            FormPart::Text {
                name: "image_data",
                value: "/9j/4A==",
            },
            FormPart::Text {
                name: "image_mime",
                value: "image/jpeg",
            },
        ]);
        let (status, html) = send(app, analyze_request(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("1. Salad - 150 calories"));
    }

    #[tokio::test]
    async fn test_malformed_carried_image_is_bad_request() {
        let mut gateway = MockInferenceGateway::new();
        gateway.expect_analyze().times(0);
        let app = create_router(Arc::new(gateway), LIMIT);

        let body = multipart_form(&[
            FormPart::Text {
                name: "image_data",
                value: "not base64!",
            },
            FormPart::Text {
                name: "image_mime",
                value: "image/jpeg",
            },
        ]);
        let (status, _) = send(app, analyze_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(Arc::new(MockInferenceGateway::new()), LIMIT);

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }
}
