use base64::{engine::general_purpose, Engine};
use std::fmt::Write;

use super::{CARRIED_DATA_FIELD, CARRIED_MIME_FIELD, CARRIED_NAME_FIELD, IMAGE_FIELD};
use crate::handlers::shell::{
    ShellView, BUSY_MESSAGE, INTRO, PREVIEW_CAPTION, RESULT_HEADING, SUBMIT_LABEL, TITLE,
    UPLOAD_LABEL,
};
use crate::models::UploadedImage;

const TEMPLATE: &str = include_str!("../../static/index.html");

/// Renders the whole page for one view of the shell.
pub fn render(view: &ShellView<'_>) -> String {
    let mut body = String::new();

    let _ = writeln!(body, "<h1>{}</h1>", escape_html(TITLE));
    let _ = writeln!(body, "<p>{}</p>", escape_html(INTRO));

    let _ = writeln!(
        body,
        "<form id=\"analyze-form\" method=\"post\" action=\"/analyze\" \
         enctype=\"multipart/form-data\">"
    );
    let _ = writeln!(
        body,
        "<label for=\"image\">{}</label>\n<input type=\"file\" id=\"image\" name=\"{}\" \
         accept=\"image/jpeg,image/png,.jpg,.jpeg,.png\">",
        escape_html(UPLOAD_LABEL),
        IMAGE_FIELD
    );

    push_preview(&mut body, view.preview);

    if let Some(info) = view.info {
        let _ = writeln!(
            body,
            "<div id=\"get-started\" class=\"notice info\">{}</div>",
            escape_html(info)
        );
    }

    let _ = writeln!(
        body,
        "<button type=\"submit\" id=\"submit\">{}</button>\n</form>",
        escape_html(SUBMIT_LABEL)
    );

    let busy_class = if view.busy.is_some() {
        "notice info busy active"
    } else {
        "notice info busy"
    };
    let _ = writeln!(
        body,
        "<div id=\"busy\" class=\"{}\">{}</div>",
        busy_class,
        escape_html(view.busy.unwrap_or(BUSY_MESSAGE))
    );

    if let Some(warning) = view.warning {
        push_notice(&mut body, "warning", warning);
    }

    if let Some(error) = view.error {
        push_notice(&mut body, "error", error);
    }

    if let Some(result) = view.result {
        let _ = writeln!(body, "<h3>{}</h3>", escape_html(RESULT_HEADING));
        let _ = writeln!(body, "<div class=\"result\">{}</div>", escape_html(result));
    }

    TEMPLATE
        .replace("{{TITLE}}", &escape_html(TITLE))
        .replace("{{BODY}}", &body)
}

/// The preview figure is always present so the page can fill it in when a
/// file is picked. A selected image also travels back in hidden fields, which
/// is what lets the user submit it again from the result page.
fn push_preview(body: &mut String, image: Option<&UploadedImage>) {
    let Some(image) = image else {
        let _ = writeln!(
            body,
            "<figure id=\"preview\" hidden><img id=\"preview-image\" alt=\"{0}\">\
             <figcaption>{0}</figcaption></figure>",
            escape_html(PREVIEW_CAPTION)
        );
        return;
    };

    let encoded = general_purpose::STANDARD.encode(&image.bytes);
    let _ = writeln!(
        body,
        "<figure id=\"preview\"><img id=\"preview-image\" src=\"data:{1};base64,{2}\" alt=\"{0}\">\
         <figcaption>{0}</figcaption></figure>",
        escape_html(PREVIEW_CAPTION),
        image.mime,
        encoded
    );

    let _ = writeln!(body, "<div id=\"carried\">");
    let _ = writeln!(
        body,
        "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
        CARRIED_DATA_FIELD, encoded
    );
    let _ = writeln!(
        body,
        "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
        CARRIED_MIME_FIELD, image.mime
    );
    if let Some(file_name) = &image.file_name {
        let _ = writeln!(
            body,
            "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
            CARRIED_NAME_FIELD,
            escape_html(file_name)
        );
    }
    let _ = writeln!(body, "</div>");
}

fn push_notice(body: &mut String, kind: &str, text: &str) {
    let _ = writeln!(body, "<div class=\"notice {}\">{}</div>", kind, escape_html(text));
}

/// Escapes text for use in HTML element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
