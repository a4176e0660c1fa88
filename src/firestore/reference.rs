use super::listen::{listen_request, ListenStream};
use super::models::{
    ArrayValue, CollectionSelector, Document, ListDocumentsResponse, ListenRequest, MapValue,
    QueryTarget, StructuredQuery, Target, Value, ValueType,
};
use super::snapshot::{DocumentSnapshot, QuerySnapshot};
use super::watch::{spawn_watch, Subscription};
use super::FirestoreError;
use crate::core::parse_error_response;
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde::de::{DeserializeOwned, Error};
use serde::ser::Error as SerError;
use serde::Serialize;
use serde_json::map::Map;
use serde_json::Value as SerdeValue;
use std::collections::HashMap;
use std::time::Duration;

// Helper to convert Firestore's value map to a standard serde_json::Value
pub(crate) fn convert_fields_to_serde_value(
    fields: HashMap<String, Value>,
) -> Result<SerdeValue, FirestoreError> {
    let mut map = Map::new();
    for (key, value) in fields {
        map.insert(key, convert_value_to_serde_value(value)?);
    }
    Ok(SerdeValue::Object(map))
}

pub(crate) fn convert_value_to_serde_value(value: Value) -> Result<SerdeValue, FirestoreError> {
    use serde_json::json;
    Ok(match value.value_type {
        ValueType::StringValue(s) => SerdeValue::String(s),
        ValueType::IntegerValue(s) => {
            let i: i64 = s.parse().map_err(|e| {
                <serde_json::Error as Error>::custom(format!(
                    "Failed to parse integer string '{}': {}",
                    s, e
                ))
            })?;
            SerdeValue::Number(i.into())
        }
        ValueType::DoubleValue(d) => SerdeValue::Number(
            serde_json::Number::from_f64(d).ok_or_else(|| {
                <serde_json::Error as Error>::custom(format!("Invalid f64 value: {}", d))
            })?,
        ),
        ValueType::BooleanValue(b) => SerdeValue::Bool(b),
        ValueType::MapValue(map_value) => convert_fields_to_serde_value(map_value.fields)?,
        ValueType::ArrayValue(array_value) => {
            let values = array_value
                .values
                .into_iter()
                .map(convert_value_to_serde_value)
                .collect::<Result<Vec<_>, _>>()?;
            SerdeValue::Array(values)
        }
        ValueType::NullValue(_) => SerdeValue::Null,
        ValueType::TimestampValue(s) => SerdeValue::String(s),
        ValueType::GeoPointValue(gp) => {
            json!({ "latitude": gp.latitude, "longitude": gp.longitude })
        }
        ValueType::BytesValue(s) => SerdeValue::String(s),
        ValueType::ReferenceValue(s) => SerdeValue::String(s),
    })
}

// Helper to convert a serializable Rust struct to Firestore's value map
pub(crate) fn convert_serializable_to_fields<T: Serialize>(
    value: &T,
) -> Result<HashMap<String, Value>, FirestoreError> {
    let serde_value = serde_json::to_value(value)?;
    if let SerdeValue::Object(map) = serde_value {
        let mut fields = HashMap::new();
        for (k, v) in map {
            fields.insert(k, convert_serde_value_to_firestore_value(v)?);
        }
        Ok(fields)
    } else {
        Err(FirestoreError::SerializationError(SerError::custom(
            "Can only set objects as documents",
        )))
    }
}

pub(crate) fn convert_serde_value_to_firestore_value(
    value: SerdeValue,
) -> Result<Value, FirestoreError> {
    let value_type = match value {
        SerdeValue::Null => ValueType::NullValue(()),
        SerdeValue::Bool(b) => ValueType::BooleanValue(b),
        SerdeValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                ValueType::IntegerValue(i.to_string())
            } else if let Some(f) = n.as_f64() {
                ValueType::DoubleValue(f)
            } else {
                return Err(FirestoreError::SerializationError(SerError::custom(format!(
                    "Unsupported number type: {}",
                    n
                ))));
            }
        }
        SerdeValue::String(s) => ValueType::StringValue(s),
        SerdeValue::Array(a) => {
            let values = a
                .into_iter()
                .map(convert_serde_value_to_firestore_value)
                .collect::<Result<Vec<_>, _>>()?;
            ValueType::ArrayValue(ArrayValue { values })
        }
        SerdeValue::Object(o) => {
            let mut fields = HashMap::new();
            for (k, v) in o {
                fields.insert(k, convert_serde_value_to_firestore_value(v)?);
            }
            ValueType::MapValue(MapValue { fields })
        }
    };
    Ok(Value { value_type })
}

fn fields_body<T: Serialize>(value: &T) -> Result<Vec<u8>, FirestoreError> {
    let fields = convert_serializable_to_fields(value)?;
    Ok(serde_json::to_vec(&serde_json::json!({ "fields": fields }))?)
}

/// A reference to a single document. Owns its client handle so it can be moved into tasks.
#[derive(Clone, Debug)]
pub struct DocumentReference {
    pub(crate) client: ClientWithMiddleware,
    pub(crate) path: String,
}

impl DocumentReference {
    /// The document ID (last path segment).
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    async fn fetch(&self) -> Result<Option<Document>, FirestoreError> {
        let response = self.client.get(&self.path).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, "Get document failed").await,
            ));
        }

        Ok(Some(response.json().await?))
    }

    /// Reads the document and deserializes it. Missing documents yield `Ok(None)`.
    pub async fn get<T: DeserializeOwned>(&self) -> Result<Option<T>, FirestoreError> {
        match self.fetch().await? {
            Some(doc) => {
                let serde_value = convert_fields_to_serde_value(doc.fields)?;
                Ok(Some(serde_json::from_value(serde_value)?))
            }
            None => Ok(None),
        }
    }

    /// Reads the document as a snapshot, which exists or not.
    pub async fn snapshot(&self) -> Result<DocumentSnapshot, FirestoreError> {
        let document = self.fetch().await?;
        Ok(DocumentSnapshot {
            id: self.id().to_string(),
            document,
        })
    }

    /// Overwrites the whole document, creating it if necessary.
    pub async fn set<T: Serialize>(&self, value: &T) -> Result<Document, FirestoreError> {
        let body = fields_body(value)?;

        let response = self
            .client
            .patch(&self.path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, "Set document failed").await,
            ));
        }

        Ok(response.json().await?)
    }

    pub async fn delete(&self) -> Result<(), FirestoreError> {
        let response = self.client.delete(&self.path).send().await?;

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, "Delete document failed").await,
            ));
        }

        Ok(())
    }
}

/// A reference to a root collection.
#[derive(Clone, Debug)]
pub struct CollectionReference {
    pub(crate) client: ClientWithMiddleware,
    pub(crate) database_url: String,
    pub(crate) database_name: String,
    pub(crate) collection_id: String,
}

impl CollectionReference {
    pub fn id(&self) -> &str {
        &self.collection_id
    }

    fn path(&self) -> String {
        format!("{}/documents/{}", self.database_url, self.collection_id)
    }

    pub fn doc(&self, document_id: &str) -> DocumentReference {
        DocumentReference {
            client: self.client.clone(),
            path: format!("{}/{}", self.path(), document_id),
        }
    }

    /// Lists every document of the collection, following page tokens.
    pub async fn list_documents(&self) -> Result<Vec<Document>, FirestoreError> {
        let url = self.path();
        let mut documents = Vec::new();
        let mut next_page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(&url).query(&[("pageSize", "300")]);
            if let Some(token) = next_page_token.take() {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request.send().await?;

            if !response.status().is_success() {
                return Err(FirestoreError::ApiError(
                    parse_error_response(response, "List documents failed").await,
                ));
            }

            let page: ListDocumentsResponse = response.json().await?;
            documents.extend(page.documents);

            match page.next_page_token {
                Some(token) if !token.is_empty() => next_page_token = Some(token),
                _ => break,
            }
        }

        Ok(documents)
    }

    /// Reads the whole collection once as a snapshot.
    pub async fn get(&self) -> Result<QuerySnapshot, FirestoreError> {
        let documents = self.list_documents().await?;
        Ok(QuerySnapshot::from_documents(documents, None))
    }

    /// Creates a document with a server-generated ID.
    pub async fn add<T: Serialize>(&self, value: &T) -> Result<Document, FirestoreError> {
        let body = fields_body(value)?;

        let response = self
            .client
            .post(self.path())
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, "Add document failed").await,
            ));
        }

        Ok(response.json().await?)
    }

    pub(crate) fn listen_request(
        &self,
        target_id: i32,
        resume_token: Option<String>,
    ) -> ListenRequest {
        ListenRequest {
            add_target: Target {
                query: QueryTarget {
                    parent: format!("{}/documents", self.database_name),
                    structured_query: StructuredQuery {
                        from: vec![CollectionSelector {
                            collection_id: self.collection_id.clone(),
                        }],
                    },
                },
                target_id,
                resume_token,
            },
        }
    }

    /// Opens a raw listen stream over the whole collection.
    pub async fn listen(
        &self,
        target_id: i32,
        resume_token: Option<String>,
    ) -> Result<ListenStream, FirestoreError> {
        let request = self.listen_request(target_id, resume_token);
        listen_request(&self.client, &self.database_url, &request).await
    }

    /// Starts a live snapshot subscription on the collection.
    ///
    /// `on_next` receives the full result set after every consistent change, `on_error`
    /// every stream failure. The subscription reconnects after `retry_delay`.
    pub fn on_snapshot<N, E>(
        &self,
        retry_delay: Duration,
        on_next: N,
        on_error: E,
    ) -> Subscription
    where
        N: FnMut(QuerySnapshot) + Send + 'static,
        E: FnMut(&FirestoreError) + Send + 'static,
    {
        spawn_watch(self.clone(), retry_delay, on_next, on_error)
    }
}
