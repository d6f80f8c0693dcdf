//! Summary storage and aggregation pipelines for MongoDB.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc, oid::ObjectId};
use mongodb::options::{Collation, CollationStrength};
use serde_json::Value;
use tracing::debug;

use crate::error::{BackendError, StorageResult};
use crate::summary::{
    Clause, SUMMARY_COLLECTION, SummaryKey, SummaryQuery, SummaryStore, UpsertOutcome,
};
use crate::types::Page;

use super::MongoBackend;
use super::convert::{operation_failed, to_bson, to_document, to_json};

fn key_filter(key: &SummaryKey) -> Document {
    doc! {
        "userId": key.user_id.as_str(),
        "type": key.summary_type.as_str(),
    }
}

/// Update document for a summary upsert. Inserted documents get a string
/// id like every other collection.
fn upsert_update(document: &Value) -> StorageResult<Document> {
    Ok(doc! {
        "$set": to_document(document)?,
        "$setOnInsert": { "_id": ObjectId::new().to_hex() },
    })
}

/// Adds `operator: value` to the operator document of `field`, so that two
/// bounds on one field end up in the same sub-document.
fn merge_operator(filter: &mut Document, field: &str, operator: &str, value: Bson) {
    match filter.get_mut(field) {
        Some(Bson::Document(existing)) => {
            existing.insert(operator, value);
        }
        _ => {
            let mut operators = Document::new();
            operators.insert(operator, value);
            filter.insert(field, operators);
        }
    }
}

/// Translates the compiled predicate into a `$match` document.
pub(crate) fn match_document(predicate: &[Clause]) -> StorageResult<Document> {
    let mut filter = Document::new();
    for clause in predicate {
        match clause {
            Clause::Equals { field, value } => {
                filter.insert(field.as_str(), to_bson(value)?);
            }
            Clause::ElementMatch {
                array,
                field,
                value,
            } => {
                let mut element = Document::new();
                element.insert(field.as_str(), to_bson(value)?);
                filter.insert(array.as_str(), doc! { "$elemMatch": element });
            }
            Clause::Matches { fields, pattern } => {
                let alternatives: Vec<Bson> = fields
                    .iter()
                    .map(|field| {
                        let mut alternative = Document::new();
                        alternative.insert(
                            field.as_str(),
                            doc! { "$regex": pattern.as_str(), "$options": "i" },
                        );
                        Bson::Document(alternative)
                    })
                    .collect();
                filter.insert("$or", alternatives);
            }
            Clause::Compare {
                field,
                comparator,
                value,
            } => merge_operator(&mut filter, field, comparator.operator(), to_bson(value)?),
            Clause::NotEquals { field, value } => {
                merge_operator(&mut filter, field, "$ne", to_bson(value)?)
            }
        }
    }
    Ok(filter)
}

/// Builds the paging pipeline: match, sort, then one `$facet` returning the
/// window and the total count together.
pub(crate) fn pipeline(query: &SummaryQuery) -> StorageResult<Vec<Document>> {
    let mut sort = Document::new();
    for key in &query.sort {
        sort.insert(key.field.as_str(), if key.is_ascending() { 1 } else { -1 });
    }

    Ok(vec![
        doc! { "$match": match_document(&query.predicate)? },
        doc! { "$sort": sort },
        doc! {
            "$facet": {
                "data": [
                    { "$skip": query.skip as i64 },
                    { "$limit": query.limit as i64 },
                ],
                "meta": [ { "$count": "count" } ],
            }
        },
        doc! {
            "$project": {
                "data": 1,
                "count": { "$ifNull": [ { "$arrayElemAt": ["$meta.count", 0] }, 0 ] },
            }
        },
    ])
}

fn primary_collation() -> Collation {
    Collation::builder()
        .locale("en")
        .strength(CollationStrength::Primary)
        .build()
}

fn decode_page(result: Option<Document>) -> StorageResult<Page<Value>> {
    let Some(result) = result else {
        return Ok(Page::empty());
    };

    let total = match result.get("count") {
        Some(Bson::Int32(count)) => u64::try_from(*count).unwrap_or_default(),
        Some(Bson::Int64(count)) => u64::try_from(*count).unwrap_or_default(),
        _ => 0,
    };

    let items = match result.get("data") {
        Some(Bson::Array(items)) => items
            .iter()
            .map(|item| match item {
                Bson::Document(document) => Ok(to_json(document.clone())),
                other => Err(BackendError::SerializationError {
                    message: format!("unexpected summary element: {other}"),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => Vec::new(),
    };

    Ok(Page::new(items, total))
}

#[async_trait]
impl SummaryStore for MongoBackend {
    async fn find_summary(&self, key: &SummaryKey) -> StorageResult<Option<Value>> {
        let found = self
            .documents(SUMMARY_COLLECTION)
            .find_one(key_filter(key))
            .await
            .map_err(|e| operation_failed("find_one", SUMMARY_COLLECTION, e))?;
        Ok(found.map(to_json))
    }

    async fn delete_summary(&self, key: &SummaryKey) -> StorageResult<u64> {
        let result = self
            .documents(SUMMARY_COLLECTION)
            .delete_one(key_filter(key))
            .await
            .map_err(|e| operation_failed("delete_one", SUMMARY_COLLECTION, e))?;
        Ok(result.deleted_count)
    }

    async fn upsert_summary(&self, key: &SummaryKey, document: Value) -> StorageResult<UpsertOutcome> {
        let update = upsert_update(&document)?;
        let result = self
            .documents(SUMMARY_COLLECTION)
            .update_one(key_filter(key), update)
            .upsert(true)
            .await
            .map_err(|e| operation_failed("update_one", SUMMARY_COLLECTION, e))?;

        Ok(UpsertOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted: result.upserted_id.is_some(),
        })
    }

    async fn query_summaries(&self, query: &SummaryQuery) -> StorageResult<Page<Value>> {
        let pipeline = pipeline(query)?;
        debug!(
            collection = SUMMARY_COLLECTION,
            stages = pipeline.len(),
            case_insensitive = query.case_insensitive,
            "Running summary pipeline"
        );

        let collection = self.documents(SUMMARY_COLLECTION);
        let aggregate = collection.aggregate(pipeline);
        let mut cursor = if query.case_insensitive {
            aggregate.collation(primary_collation()).await
        } else {
            aggregate.await
        }
        .map_err(|e| operation_failed("aggregate", SUMMARY_COLLECTION, e))?;

        let first = cursor
            .try_next()
            .await
            .map_err(|e| operation_failed("aggregate", SUMMARY_COLLECTION, e))?;
        decode_page(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::query::compile;
    use crate::summary::{Comparator, Filter, StatField, SummaryType};
    use crate::types::{Pagination, Sort};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_match_merges_date_bounds() {
        let filter = Filter::for_clinic("c1").with_last_upload_between(
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
        );
        let query = compile(SummaryType::Cgm, &filter, Pagination::default(), &[]).unwrap();
        let matched = match_document(&query.predicate).unwrap();

        assert_eq!(matched.get_str("type").unwrap(), "cgm");
        assert_eq!(
            matched.get_document("patients").unwrap(),
            &doc! { "$elemMatch": { "clinicId": "c1" } }
        );
        assert_eq!(
            matched.get_document("dates.lastUploadDate").unwrap(),
            &doc! {
                "$gte": "2024-01-01T00:00:00.000Z",
                "$lt": "2024-02-01T00:00:00.000Z",
            }
        );
    }

    #[test]
    fn test_match_search_and_thresholds() {
        let filter = Filter::default()
            .with_search("smith")
            .with_threshold(StatField::TimeInTargetPercent, Comparator::GreaterThanOrEqual, 0.7);
        let query = compile(SummaryType::Cgm, &filter, Pagination::default(), &[]).unwrap();
        let matched = match_document(&query.predicate).unwrap();

        let alternatives = matched.get_array("$or").unwrap();
        assert_eq!(alternatives.len(), 4);
        assert_eq!(
            alternatives[0],
            Bson::Document(doc! {
                "patients.fullName": { "$regex": "smith", "$options": "i" }
            })
        );
        assert_eq!(
            matched.get_document("stats.timeInTargetPercent").unwrap(),
            &doc! { "$gte": 0.7 }
        );
        assert_eq!(
            matched.get_document("stats.timeInLowPercent").unwrap(),
            &doc! { "$ne": -1111.0 }
        );
    }

    #[test]
    fn test_pipeline_shape() {
        let query = compile(
            SummaryType::Bgm,
            &Filter::default(),
            Pagination::new(10, 5),
            &[Sort::parse("-dates.lastUploadDate")],
        )
        .unwrap();
        let stages = pipeline(&query).unwrap();

        assert_eq!(stages.len(), 4);
        assert_eq!(
            stages[1],
            doc! { "$sort": { "dates.lastUploadDate": -1, "_id": 1 } }
        );
        let facet = stages[2].get_document("$facet").unwrap();
        assert_eq!(
            facet.get_array("data").unwrap(),
            &vec![
                Bson::Document(doc! { "$skip": 10_i64 }),
                Bson::Document(doc! { "$limit": 5_i64 }),
            ]
        );
    }

    #[test]
    fn test_upsert_assigns_string_id_on_insert() {
        let update = upsert_update(&serde_json::json!({"userId": "u1", "type": "cgm"})).unwrap();

        assert_eq!(
            update.get_document("$set").unwrap(),
            &doc! { "userId": "u1", "type": "cgm" }
        );
        let id = update
            .get_document("$setOnInsert")
            .unwrap()
            .get_str("_id")
            .unwrap();
        assert!(ObjectId::parse_str(id).is_ok());
    }

    #[test]
    fn test_decode_page() {
        let page = decode_page(Some(doc! {
            "data": [ { "_id": "a", "userId": "u1" } ],
            "count": 23_i32,
        }))
        .unwrap();
        assert_eq!(page.total, 23);
        assert_eq!(page.items[0]["userId"], "u1");

        let empty = decode_page(None).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.total, 0);
    }
}
