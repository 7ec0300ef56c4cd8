//! Shared form decoding for the body-consuming parsers.
//!
//! A request body can be read once, but an endpoint may bind a form-schema
//! parser and an upload parser side by side. [`form_of`] decodes the body on
//! first use and memoizes the result in the request extensions so every
//! later binding sees the same [`ParsedForm`].

use core::mem;
use core::pin::Pin;
use core::task::{Context, Poll};
use std::sync::Arc;

use futures_core::Stream;
use http_kit::header::{HeaderMap, CONTENT_TYPE};
use http_kit::utils::{Bytes, Stream as LiteStream};
use http_kit::{Body, Request};
use pin_project_lite::pin_project;

use crate::error::DecodeError;

/// An uploaded file decoded from a multipart body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    field_name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

impl UploadedFile {
    /// The form field that carried the file.
    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// The client-reported file name, if any.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// The part's content type, if reported.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The file contents.
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

/// A decoded form body: text fields and files, in wire order.
#[derive(Debug, Default)]
pub struct ParsedForm {
    fields: Vec<(String, String)>,
    files: Vec<UploadedFile>,
}

impl ParsedForm {
    /// Text fields in wire order.
    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Uploaded files in wire order.
    #[must_use]
    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }
}

fn boundary_from_headers(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    multer::parse_boundary(content_type).ok()
}

fn is_urlencoded(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.split(';').next())
        .map(|mime| {
            mime.trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
        .unwrap_or(false)
}

pin_project! {
    struct RequestBodyStream {
        #[pin]
        body: Body,
    }
}

impl RequestBodyStream {
    const fn new(body: Body) -> Self {
        Self { body }
    }
}

impl Stream for RequestBodyStream {
    type Item = Result<Bytes, http_kit::BodyError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut body = self.project().body;
        <Body as LiteStream>::poll_next(body.as_mut(), cx)
    }
}

async fn decode_multipart(boundary: String, body: Body) -> Result<ParsedForm, DecodeError> {
    let mut multipart = multer::Multipart::new(RequestBodyStream::new(body), boundary);
    let mut form = ParsedForm::default();

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| DecodeError::new(format!("Invalid form data: {e}")))?;
        let Some(field) = field else { break };

        let name = field.name().unwrap_or_default().to_owned();
        if field.file_name().is_some() {
            let file_name = field.file_name().map(str::to_owned);
            let content_type = field.content_type().map(ToString::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| DecodeError::new(format!("Invalid form data: {e}")))?;
            form.files.push(UploadedFile {
                field_name: name,
                file_name,
                content_type,
                data,
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| DecodeError::new(format!("Invalid form data: {e}")))?;
            form.fields.push((name, value));
        }
    }

    Ok(form)
}

async fn decode_urlencoded(body: Body) -> Result<ParsedForm, DecodeError> {
    let data = body
        .into_string()
        .await
        .map_err(|e| DecodeError::new(format!("Invalid form data: {e}")))?;
    let fields: Vec<(String, String)> = serde_urlencoded::from_str(&data)
        .map_err(|e| DecodeError::new(format!("Invalid form data: {e}")))?;
    Ok(ParsedForm {
        fields,
        files: Vec::new(),
    })
}

/// Decode the request's form body, memoizing the result in the extensions.
///
/// Unrecognized or missing content types yield an empty form rather than an
/// error; the schema layer reports missing required fields.
///
/// # Errors
///
/// Returns [`DecodeError`] when the body claims a form content type but
/// cannot be decoded as one.
pub(crate) async fn form_of(request: &mut Request) -> Result<Arc<ParsedForm>, DecodeError> {
    if let Some(form) = request.extensions().get::<Arc<ParsedForm>>() {
        return Ok(form.clone());
    }

    let body = mem::replace(request.body_mut(), Body::empty());
    let form = if let Some(boundary) = boundary_from_headers(request.headers()) {
        decode_multipart(boundary, body).await?
    } else if is_urlencoded(request.headers()) {
        decode_urlencoded(body).await?
    } else {
        ParsedForm::default()
    };

    let form = Arc::new(form);
    request.extensions_mut().insert(form.clone());
    Ok(form)
}
