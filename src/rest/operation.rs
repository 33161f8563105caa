//! Operation tables and argument binding.
//!
//! A handler type lists its operations once, in [`RestHandler::routes`].
//! The resulting [`OperationTable`] is an ordered list of
//! `(RouteMetadata, callable)` pairs; declaration order is the tie-break when
//! several operations match the same request.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::rest::dispatcher::{DispatchOutcome, Dispatcher};
use crate::rest::error::{BoxError, RestError};
use crate::rest::reply::{IntoReply, Reply};
use crate::rest::request::IncomingRequest;
use crate::rest::route::{RouteMetadata, Verb};

/// A type whose methods are exposed as REST operations.
///
/// ```ignore
/// impl RestHandler for OrderService {
///     fn routes(table: &mut OperationTable<Self>) {
///         table.get("/orders/{id}").handle(|svc, args| async move {
///             svc.find(args.require("id")?).await
///         });
///     }
/// }
/// ```
pub trait RestHandler: Send + Sync + Sized + 'static {
    fn routes(table: &mut OperationTable<Self>);
}

type OperationFn<S> =
    Arc<dyn Fn(Arc<S>, Args) -> BoxFuture<'static, Result<Reply, RestError>> + Send + Sync>;

/// One dispatchable operation.
pub struct Operation<S> {
    metadata: RouteMetadata,
    call: OperationFn<S>,
}

impl<S> Operation<S> {
    pub fn metadata(&self) -> &RouteMetadata {
        &self.metadata
    }

    pub(crate) fn invoke(
        &self,
        handler: Arc<S>,
        args: Args,
    ) -> BoxFuture<'static, Result<Reply, RestError>> {
        (self.call)(handler, args)
    }
}

impl<S> Clone for Operation<S> {
    fn clone(&self) -> Self {
        Self {
            metadata: self.metadata.clone(),
            call: self.call.clone(),
        }
    }
}

impl<S> std::fmt::Debug for Operation<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Ordered operations of one handler type.
pub struct OperationTable<S> {
    operations: Vec<Operation<S>>,
}

impl<S> Default for OperationTable<S> {
    fn default() -> Self {
        Self {
            operations: Vec::new(),
        }
    }
}

impl<S: Send + Sync + 'static> OperationTable<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, template: &str) -> OperationBuilder<'_, S> {
        self.route(Verb::Get, template)
    }

    pub fn post(&mut self, template: &str) -> OperationBuilder<'_, S> {
        self.route(Verb::Post, template)
    }

    pub fn put(&mut self, template: &str) -> OperationBuilder<'_, S> {
        self.route(Verb::Put, template)
    }

    pub fn delete(&mut self, template: &str) -> OperationBuilder<'_, S> {
        self.route(Verb::Delete, template)
    }

    pub fn route(&mut self, verb: Verb, template: &str) -> OperationBuilder<'_, S> {
        OperationBuilder {
            table: self,
            verb,
            template: template.to_string(),
            params: None,
        }
    }
}

impl<S> OperationTable<S> {
    pub fn iter(&self) -> impl Iterator<Item = &Operation<S>> {
        self.operations.iter()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Whether any operation is declared for `verb`.
    pub fn declares(&self, verb: Verb) -> bool {
        self.operations.iter().any(|op| op.metadata.verb() == verb)
    }

    /// First operation, in declaration order, matching verb and path structure.
    pub fn find(&self, verb: Verb, segments: &[&str]) -> Option<&Operation<S>> {
        self.operations
            .iter()
            .find(|op| op.metadata.verb() == verb && op.metadata.matches_path(segments))
    }
}

/// Declares one operation; finished by [`handle`](Self::handle).
#[must_use = "an operation is only registered once `handle` is called"]
pub struct OperationBuilder<'t, S> {
    table: &'t mut OperationTable<S>,
    verb: Verb,
    template: String,
    params: Option<Vec<String>>,
}

impl<'t, S: Send + Sync + 'static> OperationBuilder<'t, S> {
    /// Ordered parameter names of the operation.
    ///
    /// Path values fill the leading positions, then each remaining name is
    /// looked up in the query string. Defaults to the template's placeholders:
    /// path parameters first, then query parameters.
    pub fn params<I, P>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.params = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn handle<F, Fut, R, E>(self, f: F)
    where
        F: Fn(Arc<S>, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: IntoReply + 'static,
        E: Into<BoxError> + 'static,
    {
        let metadata = match self.params {
            Some(params) => RouteMetadata::new(self.verb, self.template, params),
            None => RouteMetadata::from_template(self.verb, self.template),
        };
        let call: OperationFn<S> = Arc::new(
            move |handler: Arc<S>, args: Args| -> BoxFuture<'static, Result<Reply, RestError>> {
                let fut = f(handler, args);
                Box::pin(async move {
                    match fut.await {
                        Ok(value) => value.into_reply(),
                        Err(err) => Err(RestError::operation(err)),
                    }
                })
            },
        );
        self.table.operations.push(Operation { metadata, call });
    }
}

/// Arguments bound for one invocation.
///
/// `positional` follows the operation's parameter list: values taken from
/// path slots come first, then query lookups for the remaining names.
/// Anything unresolved is `None`.
#[derive(Debug, Clone)]
pub struct Args {
    names: Arc<[String]>,
    positional: Vec<Option<String>>,
    body: Option<Value>,
    request: Arc<IncomingRequest>,
}

impl Args {
    /// Bind the arguments for `metadata` from an already matched request.
    pub(crate) fn bind(
        metadata: &RouteMetadata,
        request: Arc<IncomingRequest>,
        segments: &[&str],
    ) -> Result<Self, RestError> {
        let mut positional: Vec<Option<String>> = metadata
            .path_values(segments)
            .into_iter()
            .map(|v| Some(v.to_string()))
            .collect();
        positional.extend(
            metadata
                .unbound_params()
                .map(|name| request.query_first(name).map(str::to_string)),
        );
        let body = request.json_body()?;

        Ok(Self {
            names: metadata.function_param_names().clone(),
            positional,
            body,
            request,
        })
    }

    /// Value bound to the named parameter.
    pub fn get(&self, name: &str) -> Option<&str> {
        let index = self.names.iter().position(|n| n == name)?;
        self.positional.get(index)?.as_deref()
    }

    /// Value bound to the named parameter, failing if it is absent.
    pub fn require(&self, name: &str) -> Result<&str, RestError> {
        self.get(name)
            .ok_or_else(|| RestError::MissingParameter(name.to_string()))
    }

    /// Parse an optional parameter.
    pub fn parse<T>(&self, name: &str) -> Result<Option<T>, RestError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name)
            .map(|raw| {
                raw.parse().map_err(|e: T::Err| RestError::InvalidParameter {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    /// Positional values in parameter order.
    pub fn positional(&self) -> &[Option<String>] {
        &self.positional
    }

    /// The JSON body, when the request declared one.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Deserialize the JSON body into `T`.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<Option<T>, RestError> {
        self.body
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(RestError::InvalidBody)
    }

    pub fn request(&self) -> &IncomingRequest {
        &self.request
    }
}

/// A handler instance together with its operation table.
pub struct Service<S> {
    handler: Arc<S>,
    table: Arc<OperationTable<S>>,
}

impl<S> Clone for Service<S> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            table: self.table.clone(),
        }
    }
}

impl<S: RestHandler> Service<S> {
    pub fn new(handler: S) -> Self {
        Self::from_arc(Arc::new(handler))
    }

    pub fn from_arc(handler: Arc<S>) -> Self {
        let mut table = OperationTable::new();
        S::routes(&mut table);
        tracing::debug!(
            handler = std::any::type_name::<S>(),
            operations = table.len(),
            "Operation table built"
        );
        Self {
            handler,
            table: Arc::new(table),
        }
    }

    pub fn handler(&self) -> &Arc<S> {
        &self.handler
    }

    pub fn operations(&self) -> &OperationTable<S> {
        &self.table
    }

    /// Declared templates, in declaration order.
    pub fn paths(&self) -> Vec<&str> {
        self.table.iter().map(|op| op.metadata.path_template()).collect()
    }

    /// Literal tokens of each declared template.
    pub fn service_names(&self) -> Vec<&[String]> {
        self.table
            .iter()
            .map(|op| op.metadata.service_name_tokens())
            .collect()
    }
}

/// Type-erased service, as stored by the registry.
pub trait Endpoint: Send + Sync {
    fn name(&self) -> &'static str;

    fn routes(&self) -> Vec<&RouteMetadata>;

    fn dispatch<'a>(
        &'a self,
        dispatcher: &'a Dispatcher,
        request: IncomingRequest,
    ) -> BoxFuture<'a, DispatchOutcome>;
}

impl<S: RestHandler> Endpoint for Service<S> {
    fn name(&self) -> &'static str {
        std::any::type_name::<S>()
    }

    fn routes(&self) -> Vec<&RouteMetadata> {
        self.table.iter().map(Operation::metadata).collect()
    }

    fn dispatch<'a>(
        &'a self,
        dispatcher: &'a Dispatcher,
        request: IncomingRequest,
    ) -> BoxFuture<'a, DispatchOutcome> {
        Box::pin(dispatcher.dispatch(self, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use serde_json::json;

    struct Catalog;

    impl RestHandler for Catalog {
        fn routes(table: &mut OperationTable<Self>) {
            table
                .get("/items/{id}")
                .params(["id", "expand", "limit"])
                .handle(|_, args| async move { Ok::<_, RestError>(args.get("id").map(str::to_string)) });
            table
                .get("/items")
                .handle(|_, _| async { Ok::<_, RestError>(vec!["a", "b"]) });
            table
                .delete("/items/{id}")
                .handle(|_, _| async { Ok::<_, RestError>(()) });
        }
    }

    fn bind(template_index: usize, request: IncomingRequest) -> Args {
        let service = Service::new(Catalog);
        let op = service.operations().iter().nth(template_index).unwrap().clone();
        let request = Arc::new(request);
        let segments = request.segments();
        Args::bind(op.metadata(), request.clone(), &segments).unwrap()
    }

    #[test]
    fn test_table_keeps_declaration_order() {
        let service = Service::new(Catalog);
        assert_eq!(service.paths(), vec!["/items/{id}", "/items", "/items/{id}"]);
        assert_eq!(service.service_names(), vec![["items"]; 3]);
        assert!(service.operations().declares(Verb::Delete));
        assert!(!service.operations().declares(Verb::Put));
    }

    #[test]
    fn test_find_respects_verb_and_arity() {
        let service = Service::new(Catalog);
        let table = service.operations();
        let found = table.find(Verb::Get, &["items", "9"]).unwrap();
        assert_eq!(found.metadata().path_template(), "/items/{id}");
        let found = table.find(Verb::Get, &["items"]).unwrap();
        assert_eq!(found.metadata().path_template(), "/items");
        assert!(table.find(Verb::Get, &["items", "9", "x"]).is_none());
        assert_eq!(
            table.find(Verb::Delete, &["items", "9"]).unwrap().metadata().verb(),
            Verb::Delete
        );
    }

    #[test]
    fn test_bind_path_then_query() {
        let args = bind(
            0,
            IncomingRequest::new(Method::GET, "/items/42").with_query("limit=5&limit=9&other=1"),
        );
        assert_eq!(args.get("id"), Some("42"));
        assert_eq!(args.get("expand"), None);
        assert_eq!(args.get("limit"), Some("5"));
        assert_eq!(
            args.positional(),
            &[Some("42".to_string()), None, Some("5".to_string())]
        );
        assert_eq!(args.parse::<u32>("limit").unwrap(), Some(5));
        assert!(args.require("expand").is_err());
    }

    #[test]
    fn test_bind_rejects_bad_number() {
        let args = bind(0, IncomingRequest::new(Method::GET, "/items/1").with_query("limit=ten"));
        assert!(matches!(
            args.parse::<u32>("limit"),
            Err(RestError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_bind_json_body() {
        let args = bind(
            2,
            IncomingRequest::new(Method::DELETE, "/items/3").with_json(&json!({"reason": "dup"})),
        );
        assert_eq!(args.body(), Some(&json!({"reason": "dup"})));
        #[derive(serde::Deserialize)]
        struct Reason {
            reason: String,
        }
        let parsed: Reason = args.body_as().unwrap().unwrap();
        assert_eq!(parsed.reason, "dup");
    }
}
