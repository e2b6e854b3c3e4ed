//! Upload Example - Routing and Multipart Decoding
//!
//! This example walks one request through trellis:
//! - A nested router with a typed path parameter
//! - Path parameter conversion
//! - Streaming multipart decoding with a spooled upload
//!
//! # Running This Example
//!
//! ```bash
//! RUST_LOG=trellis=debug cargo run --example upload_demo
//! ```
//!
//! # Expected Output
//!
//! ```text
//! POST /albums/7/photos -> upload_photo
//!   album_id = 7
//!   caption  = "sunset"
//!   photo    = sunset.png (12 bytes, image/png)
//! GET /albums/x/photos -> 422 Unprocessable Entity
//! ```

use futures_executor::block_on;
use trellis::prelude::*;
use trellis::testing::ScriptedReceive;

const BOUNDARY: &str = "----demo";

fn body() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"caption\"\r\n\r\nsunset\r\n");
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"photo\"; filename=\"sunset.png\"\r\n\
          Content-Type: image/png\r\n\r\n\x89PNG\r\n\x1a\n....\r\n",
    );
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn main() -> Result<()> {
    if let Err(e) = LogConfig::development().init() {
        eprintln!("logging disabled: {e}");
    }

    let mut photos = Router::with_prefix("/albums")?;
    photos.add_endpoint(
        "/{album_id}/photos",
        Declared::new(
            "upload_photo",
            Signature::new().param(ParamDecl::new("album_id", ParamType::Int)),
        ),
        ["GET", "POST"],
    )?;
    let mut app = Router::new();
    app.include_router(photos)?;

    let body = body();
    let reader = BodyReader::new(ScriptedReceive::split(&body, 9), "", body.len());
    let content_type = format!("multipart/form-data; boundary={BOUNDARY}");
    let mut routed = route_request(
        &app,
        Method::Post,
        "/albums/7/photos",
        Some(content_type.as_str()),
        reader,
    )?;
    println!("POST /albums/7/photos -> {}", routed.handler().func());
    for (name, value) in routed.request.params().iter() {
        println!("  {name} = {}", serde_json::to_string(value).unwrap_or_default());
    }

    let form = block_on(routed.request.form())?;
    if let Some(caption) = form.get_text("caption") {
        println!("  caption  = {caption:?}");
    }
    for (_, file) in form.files() {
        println!(
            "  photo    = {} ({} bytes, {})",
            file.filename(),
            file.size(),
            file.content_type_or_default()
        );
    }

    let empty = BodyReader::new(ScriptedReceive::default(), "", 0);
    if let Err(e) = route_request(&app, Method::Get, "/albums/x/photos", None, empty) {
        println!("GET /albums/x/photos -> {} Unprocessable Entity", e.status_code());
    }
    Ok(())
}
