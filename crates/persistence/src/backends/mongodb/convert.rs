//! Conversions between crate types and BSON.

use mongodb::IndexModel;
use mongodb::bson::{self, Bson, Document, doc};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use serde_json::Value;

use crate::error::{BackendError, StorageError, StorageResult};
use crate::types::IndexSpec;

/// Duplicate key server error code.
const DUPLICATE_KEY_CODE: i32 = 11000;

pub(crate) fn to_document(value: &Value) -> StorageResult<Document> {
    Ok(bson::to_document(value)?)
}

pub(crate) fn to_bson(value: &Value) -> StorageResult<Bson> {
    Ok(bson::to_bson(value)?)
}

/// Converts a stored document to JSON.
///
/// Documents keep string ids, but an `ObjectId` key assigned by another
/// writer is rendered as its hex string rather than as `{"$oid": ..}`.
pub(crate) fn to_json(mut document: Document) -> Value {
    if let Ok(id) = document.get_object_id("_id") {
        document.insert("_id", id.to_hex());
    }
    Bson::Document(document).into_relaxed_extjson()
}

pub(crate) fn index_model(spec: &IndexSpec) -> IndexModel {
    let mut keys = Document::new();
    for (path, order) in &spec.keys {
        keys.insert(path.clone(), order.as_i32());
    }

    let partial = spec.partial_on_field.as_ref().map(|field| {
        let mut filter = Document::new();
        filter.insert(field.clone(), doc! { "$exists": true });
        filter
    });

    let options = IndexOptions::builder()
        .name(spec.name.clone())
        .unique(spec.unique.then_some(true))
        .partial_filter_expression(partial)
        .build();

    IndexModel::builder().keys(keys).options(options).build()
}

pub(crate) fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        ErrorKind::InsertMany(insert_error) => insert_error
            .write_errors
            .as_ref()
            .is_some_and(|errors| errors.iter().any(|e| e.code == DUPLICATE_KEY_CODE)),
        _ => false,
    }
}

pub(crate) fn operation_failed(operation: &str, collection: &str, err: MongoError) -> StorageError {
    if let Some(labelled) = StorageError::from_transaction_label(&err) {
        return labelled;
    }
    StorageError::Backend(BackendError::OperationFailed {
        backend_name: "mongodb".to_string(),
        operation: operation.to_string(),
        collection: collection.to_string(),
        message: err.to_string(),
    })
}
