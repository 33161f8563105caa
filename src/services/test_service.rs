//! Liveness probe service.

use std::sync::Arc;

use crate::rest::{OperationTable, RestError, RestHandler};

#[derive(Debug, Default)]
pub struct TestService;

impl TestService {
    async fn test(self: Arc<Self>) -> Result<&'static str, RestError> {
        tracing::debug!("call test ...");
        Ok("test ...")
    }
}

impl RestHandler for TestService {
    fn routes(table: &mut OperationTable<Self>) {
        table.get("/test").handle(|svc, _| svc.test());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::{Dispatcher, IncomingRequest, Service};
    use axum::http::Method;
    use serde_json::json;

    #[tokio::test]
    async fn test_answers_test() {
        let service = Service::new(TestService);
        let outcome = Dispatcher::default()
            .dispatch(&service, IncomingRequest::new(Method::GET, "/test"))
            .await;
        let envelope = outcome.envelope().cloned().unwrap();
        assert_eq!(
            serde_json::to_value(envelope).unwrap(),
            json!({"success": true, "msg": "", "result": ["test ..."], "total": 1})
        );
    }
}
