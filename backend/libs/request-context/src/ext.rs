//! Extension trait for reading and writing request-scoped values

use crate::{Claims, RequestId};
use tonic::Status;

/// Access to request-scoped values stored in request extensions
///
/// Implementors only provide typed get/insert on their extension map; every
/// other method has a default implementation.
///
/// The identity accessors (`user_id`, `tenant_id`, `roles`, `permissions`)
/// return `Some` exactly when claims are present, even if the individual
/// field is empty.
pub trait RequestContextExt {
    fn extension<T: Clone + Send + Sync + 'static>(&self) -> Option<&T>;

    fn insert_extension<T: Clone + Send + Sync + 'static>(&mut self, value: T);

    fn set_request_id(&mut self, id: RequestId) {
        self.insert_extension(id);
    }

    fn request_id(&self) -> Option<&str> {
        self.extension::<RequestId>().map(RequestId::as_str)
    }

    fn set_claims(&mut self, claims: Claims) {
        self.insert_extension(claims);
    }

    fn claims(&self) -> Option<&Claims> {
        self.extension::<Claims>()
    }

    fn user_id(&self) -> Option<&str> {
        self.claims().map(|c| c.user_id.as_str())
    }

    fn tenant_id(&self) -> Option<&str> {
        self.claims().map(|c| c.tenant_id.as_str())
    }

    fn roles(&self) -> Option<&[String]> {
        self.claims().map(|c| c.roles.as_slice())
    }

    fn permissions(&self) -> Option<&[String]> {
        self.claims().map(|c| c.permissions.as_slice())
    }

    /// Claims of the authenticated caller
    ///
    /// Returns `Status::unauthenticated` when no authentication layer stored
    /// claims for this request.
    fn require_claims(&self) -> Result<&Claims, Status> {
        self.claims().ok_or_else(|| {
            Status::unauthenticated("No claims found. Ensure the auth layer is installed.")
        })
    }
}

impl RequestContextExt for http::Extensions {
    fn extension<T: Clone + Send + Sync + 'static>(&self) -> Option<&T> {
        self.get::<T>()
    }

    fn insert_extension<T: Clone + Send + Sync + 'static>(&mut self, value: T) {
        self.insert(value);
    }
}

impl<B> RequestContextExt for http::Request<B> {
    fn extension<T: Clone + Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions().get::<T>()
    }

    fn insert_extension<T: Clone + Send + Sync + 'static>(&mut self, value: T) {
        self.extensions_mut().insert(value);
    }
}

impl<M> RequestContextExt for tonic::Request<M> {
    fn extension<T: Clone + Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions().get::<T>()
    }

    fn insert_extension<T: Clone + Send + Sync + 'static>(&mut self, value: T) {
        self.extensions_mut().insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_missing() {
        let extensions = http::Extensions::new();
        assert_eq!(extensions.request_id(), None);
    }

    #[test]
    fn test_request_id_roundtrip_on_http_request() {
        let mut request = http::Request::new(());
        request.set_request_id(RequestId::from("abc"));
        assert_eq!(request.request_id(), Some("abc"));
    }

    #[test]
    fn test_identity_accessors_without_claims() {
        let request = tonic::Request::new(());
        assert!(request.claims().is_none());
        assert!(request.user_id().is_none());
        assert!(request.tenant_id().is_none());
        assert!(request.roles().is_none());
        assert!(request.permissions().is_none());
    }

    #[test]
    fn test_identity_accessors_with_empty_claims() {
        let mut request = tonic::Request::new(());
        request.set_claims(Claims::default());

        assert_eq!(request.user_id(), Some(""));
        assert_eq!(request.tenant_id(), Some(""));
        assert_eq!(request.roles(), Some(&[][..]));
        assert_eq!(request.permissions(), Some(&[][..]));
    }

    #[test]
    fn test_identity_accessors_with_claims() {
        let mut extensions = http::Extensions::new();
        extensions.set_claims(Claims {
            user_id: "u-1".to_string(),
            tenant_id: "t-1".to_string(),
            roles: vec!["admin".to_string()],
            permissions: vec!["read".to_string(), "write".to_string()],
        });

        assert_eq!(extensions.user_id(), Some("u-1"));
        assert_eq!(extensions.tenant_id(), Some("t-1"));
        assert_eq!(extensions.roles().unwrap(), ["admin".to_string()]);
        assert_eq!(extensions.permissions().unwrap().len(), 2);
    }

    #[test]
    fn test_set_claims_replaces_previous() {
        let mut extensions = http::Extensions::new();
        extensions.set_claims(Claims {
            user_id: "first".to_string(),
            ..Default::default()
        });
        extensions.set_claims(Claims {
            user_id: "second".to_string(),
            ..Default::default()
        });
        assert_eq!(extensions.user_id(), Some("second"));
    }

    #[test]
    fn test_require_claims_missing() {
        let request = tonic::Request::new(());
        let status = request.require_claims().unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);
        assert!(status.message().contains("No claims found"));
    }
}
