use axum::{
    extract::{Request, State},
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

const STRICT_CSP: &str = "default-src 'none'; frame-ancestors 'none'";

/// Swagger UI ships inline scripts and styles and frames itself.
const SWAGGER_CSP: &str = "default-src 'self'; \
     script-src 'self' 'unsafe-inline'; \
     style-src 'self' 'unsafe-inline'; \
     img-src 'self' data:; \
     font-src 'self'; \
     connect-src 'self'";

/// Security header policy, injected at router construction.
#[derive(Debug, Clone, Default)]
pub struct SecurityHeadersPolicy {
    /// HSTS is only meaningful behind TLS; enabled in production.
    pub hsts: bool,
}

pub async fn security_headers_middleware(
    State(policy): State<SecurityHeadersPolicy>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path();
    let relaxed = path.starts_with("/docs") || path == "/.well-known/openapi.json";

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    let mut set = |name: &'static str, value: &'static str| {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    };

    set("x-content-type-options", "nosniff");
    set("x-xss-protection", "1; mode=block");
    set("referrer-policy", "strict-origin-when-cross-origin");
    set("x-frame-options", if relaxed { "SAMEORIGIN" } else { "DENY" });
    set(
        "content-security-policy",
        if relaxed { SWAGGER_CSP } else { STRICT_CSP },
    );
    if policy.hsts {
        set(
            "strict-transport-security",
            "max-age=31536000; includeSubDomains",
        );
    }

    response
}
