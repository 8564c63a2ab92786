//! Authentication through the interceptor chain

use grpc_interceptors::{build_default_with_auth, status::response_status};
use grpc_jwt_auth::{AuthConfig, Authenticator};
use http::{Request, Response};
use jsonwebtoken::{encode, get_current_timestamp, Algorithm, EncodingKey, Header};
use request_context::RequestContextExt;
use serde_json::json;
use std::sync::Arc;
use tonic::Code;
use tower::{service_fn, BoxError, Layer, Service, ServiceExt};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ISSUER: &str = "https://idp.example.com";
const AUDIENCE: &str = "orders";
const SECRET: &[u8] = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const SECRET_B64: &str = "YWFhYWFhYWFhYWFhYWFhYWFhYWFhYWFhYWFhYWFhYWFh";

async fn authenticator(server: &MockServer) -> Arc<Authenticator> {
    Mock::given(method("GET"))
        .and(path("/jwks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": [{"kty": "oct", "kid": "k1", "alg": "HS256", "k": SECRET_B64}]
        })))
        .mount(server)
        .await;

    let auth = Authenticator::new(AuthConfig {
        jwks_url: format!("{}/jwks", server.uri()),
        issuer: ISSUER.to_string(),
        audience: AUDIENCE.to_string(),
        ..Default::default()
    })
    .await
    .unwrap();
    Arc::new(auth)
}

fn token() -> String {
    let now = get_current_timestamp();
    let claims = json!({
        "sub": "user-7",
        "iss": ISSUER,
        "aud": AUDIENCE,
        "exp": now + 600,
        "roles": ["admin", "viewer"],
    });
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some("k1".to_string());
    encode(&header, &claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

fn request(authorization: Option<&str>) -> Request<String> {
    let mut builder = Request::builder().uri("/orders.v1.OrderService/ListOrders");
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }
    builder.body(String::new()).unwrap()
}

#[tokio::test]
async fn test_auth_chain() {
    let server = MockServer::start().await;
    let layer = build_default_with_auth(authenticator(&server).await).unwrap();
    let mut svc = layer.layer(service_fn(|req: Request<String>| async move {
        let claims = req.require_claims()?;
        let body = format!("{}:{}", claims.user_id, claims.roles.join(","));
        Ok::<_, BoxError>(Response::new(body))
    }));

    let response = svc
        .ready()
        .await
        .unwrap()
        .call(request(Some(&format!("Bearer {}", token()))))
        .await
        .unwrap();
    assert!(response_status(&response).is_none());
    assert_eq!(response.body(), "user-7:admin,viewer");

    let response = svc.ready().await.unwrap().call(request(None)).await.unwrap();
    let status = response_status(&response).unwrap();
    assert_eq!(status.code(), Code::Unauthenticated);

    let response = svc
        .ready()
        .await
        .unwrap()
        .call(request(Some("Basic dXNlcjpwYXNz")))
        .await
        .unwrap();
    let status = response_status(&response).unwrap();
    assert_eq!(status.code(), Code::Unauthenticated);

    let response = svc
        .ready()
        .await
        .unwrap()
        .call(request(Some("Bearer not-a-jwt")))
        .await
        .unwrap();
    let status = response_status(&response).unwrap();
    assert_eq!(status.code(), Code::Unauthenticated);
}

#[tokio::test]
async fn test_request_id_present_on_rejected_calls() {
    let server = MockServer::start().await;
    let layer = build_default_with_auth(authenticator(&server).await).unwrap();
    let svc = layer.layer(service_fn(|_req: Request<String>| async {
        Ok::<_, BoxError>(Response::new(String::new()))
    }));

    let response = svc.oneshot(request(None)).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        response_status(&response).unwrap().code(),
        Code::Unauthenticated
    );
}
