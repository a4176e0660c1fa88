use super::models::{Document, Value, ValueType};
use super::reference::{convert_fields_to_serde_value, convert_value_to_serde_value};
use super::FirestoreError;
use serde::de::DeserializeOwned;

/// A snapshot of a document in Firestore.
///
/// It contains data read from a document in your Firestore database.
/// The data can be extracted with `.data()`.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub(crate) id: String,
    pub(crate) document: Option<Document>,
}

impl DocumentSnapshot {
    pub(crate) fn from_document(document: Document) -> Self {
        Self {
            id: document.id().to_string(),
            document: Some(document),
        }
    }

    /// The ID of the document.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns `true` if the document exists.
    pub fn exists(&self) -> bool {
        self.document.is_some()
    }

    /// The time the document was last updated. Returns `None` if the document does not exist.
    pub fn update_time(&self) -> Option<&str> {
        self.document.as_ref().and_then(|d| d.update_time.as_deref())
    }

    /// Retrieves all fields in the document as a specific type.
    ///
    /// Returns `Ok(None)` if the document does not exist.
    pub fn data<T: DeserializeOwned>(&self) -> Result<Option<T>, FirestoreError> {
        if let Some(doc) = &self.document {
            let serde_value = convert_fields_to_serde_value(doc.fields.clone())?;
            let obj = serde_json::from_value(serde_value)?;
            Ok(Some(obj))
        } else {
            Ok(None)
        }
    }

    /// Retrieves a single field. `path` may descend into map values with dots
    /// (e.g. `"address.city"`).
    pub fn get_field<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, FirestoreError> {
        let Some(doc) = &self.document else {
            return Ok(None);
        };

        let mut segments = path.split('.');
        let Some(first) = segments.next() else {
            return Ok(None);
        };

        let mut current: &Value = match doc.fields.get(first) {
            Some(value) => value,
            None => return Ok(None),
        };

        for segment in segments {
            current = match &current.value_type {
                ValueType::MapValue(map) => match map.fields.get(segment) {
                    Some(value) => value,
                    None => return Ok(None),
                },
                _ => return Ok(None),
            };
        }

        let serde_value = convert_value_to_serde_value(current.clone())?;
        Ok(Some(serde_json::from_value(serde_value)?))
    }
}

/// A `QuerySnapshot` contains zero or more `DocumentSnapshot` objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySnapshot {
    pub(crate) documents: Vec<DocumentSnapshot>,
    pub(crate) read_time: Option<String>,
}

impl QuerySnapshot {
    /// Builds a snapshot ordered by document ID.
    pub(crate) fn from_documents(
        documents: impl IntoIterator<Item = Document>,
        read_time: Option<String>,
    ) -> Self {
        let mut documents: Vec<DocumentSnapshot> = documents
            .into_iter()
            .map(DocumentSnapshot::from_document)
            .collect();
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            documents,
            read_time,
        }
    }

    /// The documents in this snapshot.
    pub fn documents(&self) -> &[DocumentSnapshot] {
        &self.documents
    }

    /// Returns `true` if there are no documents in the snapshot.
    pub fn empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// The number of documents in the snapshot.
    pub fn size(&self) -> usize {
        self.documents.len()
    }

    /// The time this snapshot was read.
    pub fn read_time(&self) -> Option<&str> {
        self.read_time.as_deref()
    }

    /// Iterates over the document snapshots.
    pub fn iter(&self) -> std::slice::Iter<'_, DocumentSnapshot> {
        self.documents.iter()
    }
}

impl<'a> IntoIterator for &'a QuerySnapshot {
    type Item = &'a DocumentSnapshot;
    type IntoIter = std::slice::Iter<'a, DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}
