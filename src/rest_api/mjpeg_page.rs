use actix_web::{HttpResponse, Responder};

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>pitchtrack live</title></head>
<body style="margin:0;background:#111">
<img src="/live_streaming" style="display:block;margin:0 auto" />
</body>
</html>"#;

pub async fn mjpeg_page() -> impl Responder {
    HttpResponse::Ok().append_header(("Content-Type", "text/html")).body(PAGE)
}
