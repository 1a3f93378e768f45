//! Request body parsing.
//!
//! [`parse_body`] runs on every request. JSON and URL-encoded bodies are
//! buffered (up to the configured limit), parsed into a [`serde_json::Value`]
//! and stored in the request extensions; the raw bytes are put back so that
//! downstream extractors such as `axum::Json` keep working. Handlers read the
//! parsed value through the [`ParsedBody`] extractor.
//!
//! URL-encoded bodies use "extended" semantics: bracketed keys build nested
//! objects and arrays (`a[b]=1`, `a[]=1`, `a[0][b]=1`), repeated keys collect
//! into arrays.

use std::error::Error as _;

use axum::body::Body;
use axum::extract::{FromRequestParts, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http_body_util::LengthLimitError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ApiError, AppError};

/// Nesting depth after which the remainder of a form key is kept literally.
const MAX_DEPTH: usize = 5;
/// Largest numeric form index treated as an array position.
const ARRAY_LIMIT: usize = 20;
/// Maximum number of pairs accepted in a URL-encoded body.
const PARAMETER_LIMIT: usize = 1000;

/// Maximum accepted body size in bytes, passed as middleware state.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimit(pub usize);

/// The parsed request body.
///
/// `ParsedBody` (i.e. `ParsedBody<Value>`) yields the raw parsed value; any
/// other `T` is deserialized from it and rejects with 400 on mismatch.
/// Requests whose body was not JSON or URL-encoded yield an empty object.
#[derive(Debug, Clone)]
pub struct ParsedBody<T = Value>(pub T);

impl<S, T> FromRequestParts<S> for ParsedBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .extensions
            .get::<ParsedBody<Value>>()
            .map(|body| body.0.clone())
            .unwrap_or_else(|| Value::Object(Map::new()));

        serde_json::from_value(value)
            .map(ParsedBody)
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    UrlEncoded,
}

/// Middleware that parses JSON and URL-encoded request bodies.
pub async fn parse_body(
    State(limit): State<BodyLimit>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let kind = match body_kind(request.headers()) {
        Ok(kind) => kind,
        Err(err) => return err.into_response(),
    };

    let Some(kind) = kind else {
        let mut request = request;
        request
            .extensions_mut()
            .insert(ParsedBody(Value::Object(Map::new())));
        return next.run(request).await;
    };

    if declared_length(request.headers()).is_some_and(|len| len > limit.0) {
        return ApiError::from(AppError::PayloadTooLarge).into_response();
    }

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, limit.0).await {
        Ok(bytes) => bytes,
        Err(err) if is_length_limit(&err) => {
            return ApiError::from(AppError::PayloadTooLarge).into_response();
        }
        Err(err) => {
            return ApiError::bad_request(format!("Failed to read request body: {err}"))
                .into_response();
        }
    };

    let parsed = match kind {
        BodyKind::Json => parse_json(&bytes),
        BodyKind::UrlEncoded => parse_urlencoded(&bytes),
    };
    let value = match parsed {
        Ok(value) => value,
        Err(err) => return err.into_response(),
    };

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(ParsedBody(value));
    next.run(request).await
}

fn body_kind(headers: &HeaderMap) -> Result<Option<BodyKind>, ApiError> {
    let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return Ok(None);
    };

    let mut params = content_type.split(';');
    let mime = params.next().unwrap_or_default().trim().to_ascii_lowercase();
    let kind = if mime == "application/json" {
        BodyKind::Json
    } else if mime == "application/x-www-form-urlencoded" {
        BodyKind::UrlEncoded
    } else {
        return Ok(None);
    };

    for param in params {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("charset") {
            let charset = value.trim().trim_matches('"').to_ascii_lowercase();
            if charset != "utf-8" && charset != "utf8" {
                return Err(AppError::UnsupportedCharset(charset).into());
            }
        }
    }

    Ok(Some(kind))
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source = err.source();
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// Parse a JSON body. Empty bodies yield `{}`; only objects and arrays are
/// accepted at the top level.
pub fn parse_json(bytes: &[u8]) -> Result<Value, ApiError> {
    let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
    match first {
        None => return Ok(Value::Object(Map::new())),
        Some(b'{') | Some(b'[') => {}
        Some(_) => {
            return Err(ApiError::bad_request(
                "Invalid JSON body: top-level value must be an object or array",
            ));
        }
    }

    serde_json::from_slice(bytes).map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))
}

/// Parse a URL-encoded body with nested (bracketed) key support.
pub fn parse_urlencoded(bytes: &[u8]) -> Result<Value, ApiError> {
    let mut root = Value::Object(Map::new());

    for (count, (key, value)) in url::form_urlencoded::parse(bytes).enumerate() {
        if count >= PARAMETER_LIMIT {
            return Err(ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "too many parameters",
            ));
        }
        if key.is_empty() {
            continue;
        }
        let segments = split_key(&key);
        merge(&mut root, build(&segments, value.into_owned()));
    }

    compact(&mut root);
    Ok(root)
}

#[derive(Debug, PartialEq, Eq)]
enum Segment {
    Key(String),
    Append,
    Index(usize),
}

fn split_key(key: &str) -> Vec<Segment> {
    let literal = || vec![Segment::Key(key.to_string())];

    let Some(open) = key.find('[') else {
        return literal();
    };
    if open == 0 || !key[open..].contains(']') {
        return literal();
    }

    let mut segments = vec![Segment::Key(key[..open].to_string())];
    let mut rest = &key[open..];
    while rest.starts_with('[') && segments.len() <= MAX_DEPTH {
        let Some(close) = rest.find(']') else {
            break;
        };
        let inner = &rest[1..close];
        segments.push(match inner.parse::<usize>() {
            _ if inner.is_empty() => Segment::Append,
            Ok(index) if index <= ARRAY_LIMIT => Segment::Index(index),
            _ => Segment::Key(inner.to_string()),
        });
        rest = &rest[close + 1..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Key(rest.to_string()));
    }
    segments
}

/// Build the nested value for one pair. Array holes are `Null` until
/// [`compact`] removes them.
fn build(segments: &[Segment], value: String) -> Value {
    let mut node = Value::String(value);
    for segment in segments.iter().rev() {
        node = match segment {
            Segment::Append => Value::Array(vec![node]),
            Segment::Index(index) => {
                let mut items = vec![Value::Null; *index];
                items.push(node);
                Value::Array(items)
            }
            Segment::Key(key) => {
                let mut map = Map::new();
                map.insert(key.clone(), node);
                Value::Object(map)
            }
        };
    }
    node
}

fn merge(target: &mut Value, source: Value) {
    match source {
        Value::Array(_) | Value::Object(_) => {}
        scalar => {
            match target {
                Value::Array(items) => items.push(scalar),
                Value::Object(map) => {
                    if let Value::String(key) = scalar {
                        map.insert(key, Value::Bool(true));
                    }
                }
                existing => {
                    let previous = existing.take();
                    *existing = if previous.is_null() {
                        scalar
                    } else {
                        Value::Array(vec![previous, scalar])
                    };
                }
            }
            return;
        }
    }

    if !(target.is_array() || target.is_object()) {
        let previous = target.take();
        let mut items = if previous.is_null() { Vec::new() } else { vec![previous] };
        match source {
            Value::Array(new) => items.extend(new),
            other => items.push(other),
        }
        *target = Value::Array(items);
        return;
    }

    if target.is_array() && source.is_object() {
        if let Value::Array(items) = target.take() {
            let map = items
                .into_iter()
                .enumerate()
                .filter(|(_, v)| !v.is_null())
                .map(|(i, v)| (i.to_string(), v))
                .collect();
            *target = Value::Object(map);
        }
    }

    match (target, source) {
        (Value::Array(items), Value::Array(new)) => {
            for (index, item) in new.into_iter().enumerate() {
                if item.is_null() {
                    continue;
                }
                if index >= items.len() {
                    items.resize(index, Value::Null);
                    items.push(item);
                } else if items[index].is_null() {
                    items[index] = item;
                } else if is_container(&items[index]) && is_container(&item) {
                    merge(&mut items[index], item);
                } else {
                    items.push(item);
                }
            }
        }
        (Value::Object(map), Value::Array(new)) => {
            for (index, item) in new.into_iter().enumerate() {
                if !item.is_null() {
                    merge_key(map, index.to_string(), item);
                }
            }
        }
        (Value::Object(map), Value::Object(new)) => {
            for (key, item) in new {
                merge_key(map, key, item);
            }
        }
        _ => {}
    }
}

fn merge_key(map: &mut Map<String, Value>, key: String, item: Value) {
    match map.get_mut(&key) {
        Some(existing) => merge(existing, item),
        None => {
            map.insert(key, item);
        }
    }
}

fn is_container(value: &Value) -> bool {
    value.is_array() || value.is_object()
}

fn compact(value: &mut Value) {
    match value {
        Value::Array(items) => {
            items.retain(|v| !v.is_null());
            items.iter_mut().for_each(compact);
        }
        Value::Object(map) => map.values_mut().for_each(compact),
        _ => {}
    }
}
