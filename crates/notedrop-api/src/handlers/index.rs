//! Upload form

use axum::response::Html;

const UPLOAD_FORM: &str = r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8">
    <title>Meeting Notes Drop</title>
  </head>
  <body>
    <h1>Upload a meeting recording</h1>
    <form action="/upload" method="post" enctype="multipart/form-data">
      <p><input type="file" name="file" accept="audio/*,video/*" required></p>
      <p><label>Output name <input type="text" name="output_name" placeholder="meeting-notes.md"></label></p>
      <p><label>Options <input type="text" name="options" placeholder='["--language", "en"]'></label></p>
      <p><input type="submit" value="Upload"></p>
    </form>
  </body>
</html>
"#;

/// Static HTML upload form
pub async fn index() -> Html<&'static str> {
    Html(UPLOAD_FORM)
}
