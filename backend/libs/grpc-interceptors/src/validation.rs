//! Request payload validation

use tonic::Status;
use validator::Validate;

/// Validate a request message, mapping failures to `INVALID_ARGUMENT`
///
/// ```rust
/// use validator::Validate;
///
/// #[derive(Validate)]
/// struct CreateOrder {
///     #[validate(length(min = 1))]
///     sku: String,
/// }
///
/// let err = grpc_interceptors::validate(&CreateOrder { sku: String::new() }).unwrap_err();
/// assert_eq!(err.code(), tonic::Code::InvalidArgument);
/// ```
pub fn validate<T: Validate>(message: &T) -> Result<(), Status> {
    message
        .validate()
        .map_err(|errors| Status::invalid_argument(errors.to_string()))
}
