//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `OdmError::Backend` from `tyodm_core`.

use std::fmt::Debug;

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use tyodm_core::OdmError;

/// Map a TransactWriteItems SDK error to OdmError.
pub fn map_transact_write_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<TransactWriteItemsError, R>,
) -> OdmError {
    match err.into_service_error() {
        TransactWriteItemsError::TransactionCanceledException(e) => OdmError::Backend(format!(
            "Transaction cancelled: {}",
            e.message().unwrap_or("no reason given")
        )),
        TransactWriteItemsError::TransactionInProgressException(_) => {
            OdmError::Backend("Transaction in progress, please retry".to_string())
        }
        TransactWriteItemsError::ResourceNotFoundException(_) => {
            OdmError::Backend("Table not found".to_string())
        }
        TransactWriteItemsError::ProvisionedThroughputExceededException(_) => {
            OdmError::Backend("Throughput exceeded, please retry".to_string())
        }
        TransactWriteItemsError::RequestLimitExceeded(_) => {
            OdmError::Backend("Request limit exceeded, please retry".to_string())
        }
        TransactWriteItemsError::InternalServerError(_) => {
            OdmError::Backend("DynamoDB internal server error".to_string())
        }
        err => OdmError::Backend(format!("TransactWriteItems failed: {:?}", err)),
    }
}

/// Map a Query SDK error to OdmError.
pub fn map_query_error<R: Debug + Send + Sync + 'static>(err: SdkError<QueryError, R>) -> OdmError {
    match err.into_service_error() {
        QueryError::ResourceNotFoundException(_) => OdmError::Backend("Table not found".to_string()),
        QueryError::ProvisionedThroughputExceededException(_) => {
            OdmError::Backend("Throughput exceeded, please retry".to_string())
        }
        QueryError::RequestLimitExceeded(_) => {
            OdmError::Backend("Request limit exceeded, please retry".to_string())
        }
        QueryError::InternalServerError(_) => {
            OdmError::Backend("DynamoDB internal server error".to_string())
        }
        err => OdmError::Backend(format!("Query failed: {:?}", err)),
    }
}

/// Map a request building error (missing required fields) to OdmError.
pub fn map_build_error(err: impl std::fmt::Display) -> OdmError {
    OdmError::Backend(format!("Invalid DynamoDB request: {}", err))
}
