//! gRPC status carried in HTTP response headers

use http::header::{HeaderValue, CONTENT_TYPE};
use http::Response;
use tonic::{Code, Status};

/// Build a trailers-only gRPC response for `status`
pub fn status_response<B: Default>(status: Status) -> Response<B> {
    let mut response = Response::new(B::default());
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/grpc"));
    if let Err(invalid) = status.add_header(headers) {
        // Only fails on unencodable metadata; fall back to the bare code
        let _ = Status::new(invalid.code(), "").add_header(headers);
    }
    response
}

/// Status announced in the response headers, if any
///
/// Unary handler errors arrive as trailers-only responses with the status
/// in the headers. Responses without `grpc-status` are treated as `OK`.
pub fn response_status<B>(response: &Response<B>) -> Option<Status> {
    Status::from_header_map(response.headers())
}

pub fn response_code<B>(response: &Response<B>) -> Code {
    response_status(response).map_or(Code::Ok, |s| s.code())
}

/// Lowercase snake case name of `code`, as used in logs
pub fn code_name(code: Code) -> &'static str {
    match code {
        Code::Ok => "ok",
        Code::Cancelled => "canceled",
        Code::Unknown => "unknown",
        Code::InvalidArgument => "invalid_argument",
        Code::DeadlineExceeded => "deadline_exceeded",
        Code::NotFound => "not_found",
        Code::AlreadyExists => "already_exists",
        Code::PermissionDenied => "permission_denied",
        Code::ResourceExhausted => "resource_exhausted",
        Code::FailedPrecondition => "failed_precondition",
        Code::Aborted => "aborted",
        Code::OutOfRange => "out_of_range",
        Code::Unimplemented => "unimplemented",
        Code::Internal => "internal",
        Code::Unavailable => "unavailable",
        Code::DataLoss => "data_loss",
        Code::Unauthenticated => "unauthenticated",
    }
}
