use actix_web::{
    body::MessageBody,
    http::{header::HeaderMap, StatusCode},
    test,
    test::TestRequest,
    web::ServiceConfig,
    App,
};
use log::debug;

use crate::middleware::ADMIN_KEY_HEADER;

pub const ADMIN_KEY: &str = "test-admin-key";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or_else(|e| panic!("Response is not JSON: {e}. {}", self.body))
    }
}

/// Sends `req` to an app set up by `configure`. Errors raised by middleware are turned into responses, the same way
/// the server would return them.
pub async fn send(req: TestRequest, configure: impl FnOnce(&mut ServiceConfig)) -> TestResponse {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => res.map_into_boxed_body().into_parts().1,
        Err(e) => e.error_response(),
    };
    let status = res.status();
    let headers = res.headers().clone();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    TestResponse { status, headers, body }
}

pub async fn get_request(
    path: &str,
    admin_key: Option<&str>,
    configure: impl FnOnce(&mut ServiceConfig),
) -> TestResponse {
    let mut req = TestRequest::get().uri(path);
    if let Some(key) = admin_key {
        req = req.insert_header((ADMIN_KEY_HEADER, key));
    }
    send(req, configure).await
}

pub async fn post_request(
    path: &str,
    body: Option<serde_json::Value>,
    admin_key: Option<&str>,
    configure: impl FnOnce(&mut ServiceConfig),
) -> TestResponse {
    let mut req = TestRequest::post().uri(path);
    if let Some(key) = admin_key {
        req = req.insert_header((ADMIN_KEY_HEADER, key));
    }
    if let Some(body) = body {
        req = req.set_json(body);
    }
    send(req, configure).await
}
