//! Mapping of Service Catalog SDK errors onto vendo's error taxonomy

use std::error::Error;
use std::fmt::Debug;

use aws_sdk_servicecatalog::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use vendo_core::client::ClientError;

/// Error code returned for unknown records and provisioned products
pub const NOT_FOUND_CODE: &str = "ResourceNotFoundException";

/// Error codes worth retrying while polling
const RETRYABLE_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "RequestThrottledException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "InternalFailure",
    "InternalServerError",
    "ServiceUnavailable",
    "RequestTimeout",
    "RequestTimeoutException",
];

/// How an SDK error should be handled by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Transient,
    Fatal,
}

/// Classify an SDK error
///
/// Transport level failures (timeouts, dispatch and response errors) are
/// transient. Service errors are classified by their error code.
pub fn classify<E, R>(err: &SdkError<E, R>) -> ErrorClass
where
    E: ProvideErrorMetadata,
{
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ErrorClass::Transient
        }
        SdkError::ServiceError(service) => classify_code(service.err().code()),
        _ => ErrorClass::Fatal,
    }
}

/// Classify a service error code
pub fn classify_code(code: Option<&str>) -> ErrorClass {
    match code {
        Some(NOT_FOUND_CODE) => ErrorClass::NotFound,
        Some(code) if RETRYABLE_CODES.contains(&code) => ErrorClass::Transient,
        _ => ErrorClass::Fatal,
    }
}

/// Render an SDK error with its full source chain
pub fn message<E, R>(err: &SdkError<E, R>) -> String
where
    E: Error + 'static,
    R: Debug,
{
    format!("{}", DisplayErrorContext(err))
}

/// Convert an error raised by a submission
///
/// Submissions are never retried, so every failure is a rejection.
pub fn submission_error<E, R>(err: SdkError<E, R>) -> ClientError
where
    E: Error + 'static,
    R: Debug,
{
    ClientError::Submission(message(&err))
}

/// Convert an error raised while describing a record
pub fn describe_error<E, R>(err: SdkError<E, R>) -> ClientError
where
    E: Error + ProvideErrorMetadata + 'static,
    R: Debug,
{
    let msg = message(&err);
    match classify(&err) {
        ErrorClass::NotFound => ClientError::NotFound(msg),
        ErrorClass::Transient => ClientError::Transient(msg),
        ErrorClass::Fatal => ClientError::Fatal(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_servicecatalog::config::http::HttpResponse;
    use aws_sdk_servicecatalog::error::ErrorMetadata;
    use aws_sdk_servicecatalog::types::error::ResourceNotFoundException;
    use aws_sdk_servicecatalog::operation::describe_record::DescribeRecordError;

    #[test]
    fn test_classify_not_found_code() {
        assert_eq!(
            classify_code(Some("ResourceNotFoundException")),
            ErrorClass::NotFound
        );
    }

    #[test]
    fn test_classify_retryable_codes() {
        assert_eq!(classify_code(Some("ThrottlingException")), ErrorClass::Transient);
        assert_eq!(classify_code(Some("ServiceUnavailable")), ErrorClass::Transient);
    }

    #[test]
    fn test_classify_fatal_codes() {
        assert_eq!(classify_code(Some("AccessDeniedException")), ErrorClass::Fatal);
        assert_eq!(classify_code(Some("InvalidParametersException")), ErrorClass::Fatal);
        assert_eq!(classify_code(None), ErrorClass::Fatal);
    }

    #[test]
    fn test_timeout_is_transient() {
        let err: SdkError<DescribeRecordError, HttpResponse> = SdkError::timeout_error("slow");
        assert_eq!(classify(&err), ErrorClass::Transient);
        assert!(matches!(describe_error(err), ClientError::Transient(_)));
    }

    #[test]
    fn test_construction_failure_is_fatal() {
        let err: SdkError<DescribeRecordError, HttpResponse> =
            SdkError::construction_failure("missing record id");
        assert_eq!(classify(&err), ErrorClass::Fatal);
        assert!(matches!(describe_error(err), ClientError::Fatal(_)));
    }

    #[test]
    fn test_service_error_classified_by_code() {
        let not_found = DescribeRecordError::ResourceNotFoundException(
            ResourceNotFoundException::builder()
                .meta(ErrorMetadata::builder().code(NOT_FOUND_CODE).build())
                .build(),
        );
        let err: SdkError<DescribeRecordError, ()> = SdkError::service_error(not_found, ());
        assert_eq!(classify(&err), ErrorClass::NotFound);
        assert!(matches!(describe_error(err), ClientError::NotFound(_)));

        let throttled = DescribeRecordError::generic(
            ErrorMetadata::builder().code("ThrottlingException").build(),
        );
        let err: SdkError<DescribeRecordError, ()> = SdkError::service_error(throttled, ());
        assert!(matches!(describe_error(err), ClientError::Transient(_)));

        let denied = DescribeRecordError::generic(
            ErrorMetadata::builder()
                .code("AccessDeniedException")
                .build(),
        );
        let err: SdkError<DescribeRecordError, ()> = SdkError::service_error(denied, ());
        assert!(matches!(describe_error(err), ClientError::Fatal(_)));
    }

    #[test]
    fn test_submission_errors_are_rejections() {
        let err: SdkError<DescribeRecordError, HttpResponse> = SdkError::timeout_error("slow");
        assert!(matches!(submission_error(err), ClientError::Submission(_)));
    }
}
