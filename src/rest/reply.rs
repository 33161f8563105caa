//! Response envelope and return-value normalization.
//!
//! Every structurally matched request answers with
//! `{"success": bool, "msg": string, "result": [...], "total": n}`.
//! Operations return anything implementing [`IntoReply`]; the shape of that
//! value decides `result` and `total`:
//!
//! | returned                          | result        | total        |
//! |-----------------------------------|---------------|--------------|
//! | `()`, `None`, `""`, JSON `null`   | `[]`          | `0`          |
//! | `(Vec<T>, u64)` / `(u64, Vec<T>)` | the list      | the integer  |
//! | `Vec<T>`, JSON array              | the list      | list length  |
//! | anything else                     | `[value]`     | `1`          |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rest::error::RestError;

/// The uniform JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    pub msg: String,
    pub result: Vec<Value>,
    pub total: u64,
}

impl Default for ResponseEnvelope {
    fn default() -> Self {
        Self {
            success: true,
            msg: String::new(),
            result: Vec::new(),
            total: 0,
        }
    }
}

impl ResponseEnvelope {
    /// Successful envelope carrying a normalized reply.
    pub fn from_reply(reply: Reply) -> Self {
        let (result, total) = match reply {
            Reply::Empty | Reply::Raw(_) => (Vec::new(), 0),
            Reply::Page { items, total } => (items, total),
            Reply::List(items) => {
                let total = items.len() as u64;
                (items, total)
            }
            Reply::Single(value) => (vec![value], 1),
        };
        Self {
            result,
            total,
            ..Self::default()
        }
    }

    /// Failed envelope; the message is the error's display text.
    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            msg: msg.into(),
            ..Self::default()
        }
    }
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// A normalized operation result.
#[derive(Debug)]
pub enum Reply {
    Empty,
    /// Paginated slice with the overall count, which may exceed `items.len()`.
    Page { items: Vec<Value>, total: u64 },
    List(Vec<Value>),
    Single(Value),
    /// The operation built the HTTP response itself (downloads, redirects).
    /// No envelope is written.
    Raw(Response),
}

impl Reply {
    /// Normalize a dynamically shaped JSON value.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Reply::Empty,
            Value::String(s) if s.is_empty() => Reply::Empty,
            Value::Array(items) => Reply::List(items),
            other => Reply::Single(other),
        }
    }

    pub fn page<T: Serialize>(items: Vec<T>, total: u64) -> Result<Self, RestError> {
        Ok(Reply::Page {
            items: to_values(items)?,
            total,
        })
    }
}

/// Wraps a serializable value that must be returned as one element
/// (`result: [value]`, `total: 1`) regardless of its JSON shape.
#[derive(Debug, Clone)]
pub struct Single<T>(pub T);

/// Conversion from an operation's return value into a [`Reply`].
pub trait IntoReply {
    fn into_reply(self) -> Result<Reply, RestError>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, RestError> {
        Ok(self)
    }
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Reply, RestError> {
        Ok(Reply::Empty)
    }
}

impl IntoReply for Value {
    fn into_reply(self) -> Result<Reply, RestError> {
        Ok(Reply::from_value(self))
    }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<Reply, RestError> {
        Ok(Reply::from_value(Value::String(self)))
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<Reply, RestError> {
        self.to_string().into_reply()
    }
}

macro_rules! scalar_reply {
    ($($ty:ty),*) => {
        $(
            impl IntoReply for $ty {
                fn into_reply(self) -> Result<Reply, RestError> {
                    Ok(Reply::Single(Value::from(self)))
                }
            }
        )*
    };
}

scalar_reply!(bool, i64, u64, f64);

impl IntoReply for Response {
    fn into_reply(self) -> Result<Reply, RestError> {
        Ok(Reply::Raw(self))
    }
}

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> Result<Reply, RestError> {
        match self {
            Some(inner) => inner.into_reply(),
            None => Ok(Reply::Empty),
        }
    }
}

impl<T: Serialize> IntoReply for Vec<T> {
    fn into_reply(self) -> Result<Reply, RestError> {
        Ok(Reply::List(to_values(self)?))
    }
}

impl<T: Serialize> IntoReply for (Vec<T>, u64) {
    fn into_reply(self) -> Result<Reply, RestError> {
        Reply::page(self.0, self.1)
    }
}

impl<T: Serialize> IntoReply for (u64, Vec<T>) {
    fn into_reply(self) -> Result<Reply, RestError> {
        Reply::page(self.1, self.0)
    }
}

impl<T: Serialize> IntoReply for Single<T> {
    fn into_reply(self) -> Result<Reply, RestError> {
        serde_json::to_value(self.0)
            .map(Reply::Single)
            .map_err(RestError::Encode)
    }
}

fn to_values<T: Serialize>(items: Vec<T>) -> Result<Vec<Value>, RestError> {
    items
        .into_iter()
        .map(|item| serde_json::to_value(item).map_err(RestError::Encode))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: impl IntoReply) -> ResponseEnvelope {
        ResponseEnvelope::from_reply(value.into_reply().unwrap())
    }

    #[test]
    fn test_page_keeps_declared_total() {
        let env = envelope((vec!["a", "b"], 2u64));
        assert_eq!(env.result, vec![json!("a"), json!("b")]);
        assert_eq!(env.total, 2);

        let env = envelope((40u64, vec![1, 2, 3]));
        assert_eq!(env.result.len(), 3);
        assert_eq!(env.total, 40);
    }

    #[test]
    fn test_empty_values() {
        for env in [
            envelope(()),
            envelope(None::<String>),
            envelope(""),
            envelope(Value::Null),
        ] {
            assert!(env.success);
            assert!(env.result.is_empty());
            assert_eq!(env.total, 0);
        }
    }

    #[test]
    fn test_scalar_is_wrapped() {
        let env = envelope("x");
        assert_eq!(env.result, vec![json!("x")]);
        assert_eq!(env.total, 1);

        let env = envelope(json!({"id": 7}));
        assert_eq!(env.result, vec![json!({"id": 7})]);
        assert_eq!(env.total, 1);
    }

    #[test]
    fn test_sequence_counts_items() {
        let env = envelope(vec![json!(1), json!(2), json!(3)]);
        assert_eq!(env.total, 3);

        let env = envelope(json!(["a"]));
        assert_eq!(env.result, vec![json!("a")]);
        assert_eq!(env.total, 1);
    }

    #[test]
    fn test_single_wrapper_keeps_arrays_whole() {
        let env = envelope(Single(vec![1, 2]));
        assert_eq!(env.result, vec![json!([1, 2])]);
        assert_eq!(env.total, 1);
    }

    #[test]
    fn test_failure_serializes_envelope_shape() {
        let env = ResponseEnvelope::failure("boom");
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"success": false, "msg": "boom", "result": [], "total": 0})
        );
    }
}
