//! Live snapshot subscriptions.
//!
//! A subscription owns a background task that keeps a listen stream open,
//! folds the incoming changes into a document set and hands out a full
//! `QuerySnapshot` whenever the server reports a consistent point.

use super::models::{Document, ListenResponse, TargetChangeType};
use super::reference::CollectionReference;
use super::snapshot::QuerySnapshot;
use super::FirestoreError;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::task::JoinHandle;

const TARGET_ID: i32 = 1;

/// Folds listen messages for a single target into snapshots.
#[derive(Debug, Default)]
pub(crate) struct WatchState {
    documents: BTreeMap<String, Document>,
    current: bool,
    changed: bool,
    emitted_once: bool,
    resync: bool,
    resume_token: Option<String>,
}

impl WatchState {
    pub(crate) fn resume_token(&self) -> Option<String> {
        self.resume_token.clone()
    }

    /// Drops everything learned from the server, including the resume token.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Forgets per-connection progress. Documents are only kept when the
    /// stream resumes from a token; a fresh target re-sends everything.
    pub(crate) fn reconnecting(&mut self) {
        self.current = false;
        self.resync = false;
        if self.resume_token.is_none() && !self.documents.is_empty() {
            self.documents.clear();
            self.changed = true;
        }
    }

    /// Whether the stream must be reopened from scratch.
    pub(crate) fn needs_resync(&self) -> bool {
        self.resync
    }

    /// Applies one message. Returns a snapshot when the result set is consistent
    /// and differs from the last one handed out.
    pub(crate) fn apply(
        &mut self,
        message: ListenResponse,
    ) -> Result<Option<QuerySnapshot>, FirestoreError> {
        match message {
            ListenResponse::TargetChange(change) => {
                if change.resume_token.is_some() {
                    self.resume_token = change.resume_token.clone();
                }

                match change.target_change_type {
                    TargetChangeType::Add => {}
                    TargetChangeType::Current => {
                        self.current = true;
                    }
                    TargetChangeType::Reset => {
                        self.documents.clear();
                        self.changed = true;
                    }
                    TargetChangeType::Remove => {
                        let message = change
                            .cause
                            .map(|status| format!("{} (code: {})", status.message, status.code))
                            .unwrap_or_else(|| "target removed".to_string());
                        return Err(FirestoreError::ApiError(format!(
                            "Listen target removed: {}",
                            message
                        )));
                    }
                    TargetChangeType::NoChange => {
                        if change.target_ids.is_empty() && self.current {
                            return Ok(self.take_snapshot(change.read_time));
                        }
                    }
                }
            }
            ListenResponse::DocumentChange(change) => {
                if change.target_ids.contains(&TARGET_ID) {
                    self.documents
                        .insert(change.document.name.clone(), change.document);
                    self.changed = true;
                } else if change.removed_target_ids.contains(&TARGET_ID) {
                    self.documents.remove(&change.document.name);
                    self.changed = true;
                }
            }
            ListenResponse::DocumentDelete(delete) => {
                if self.documents.remove(&delete.document).is_some() {
                    self.changed = true;
                }
            }
            ListenResponse::DocumentRemove(remove) => {
                if self.documents.remove(&remove.document).is_some() {
                    self.changed = true;
                }
            }
            ListenResponse::Filter(filter) => {
                if filter.target_id == TARGET_ID && filter.count as usize != self.documents.len() {
                    tracing::debug!(
                        expected = filter.count,
                        cached = self.documents.len(),
                        "existence filter mismatch, resyncing"
                    );
                    let emitted_once = self.emitted_once;
                    self.reset();
                    self.emitted_once = emitted_once;
                    self.changed = true;
                    self.resync = true;
                }
            }
        }

        Ok(None)
    }

    fn take_snapshot(&mut self, read_time: Option<String>) -> Option<QuerySnapshot> {
        if self.emitted_once && !self.changed {
            return None;
        }
        self.emitted_once = true;
        self.changed = false;
        Some(QuerySnapshot::from_documents(
            self.documents.values().cloned(),
            read_time,
        ))
    }
}

/// Handle to a running live subscription. Dropping it stops the subscription.
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stops the subscription. No callback runs after this returns.
    pub fn unsubscribe(self) {
        self.handle.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub(crate) fn spawn_watch<N, E>(
    collection: CollectionReference,
    retry_delay: Duration,
    mut on_next: N,
    mut on_error: E,
) -> Subscription
where
    N: FnMut(QuerySnapshot) + Send + 'static,
    E: FnMut(&FirestoreError) + Send + 'static,
{
    let handle = tokio::spawn(async move {
        let mut state = WatchState::default();

        loop {
            state.reconnecting();
            match run_stream(&collection, &mut state, &mut on_next).await {
                Ok(StreamEnd::Resync) => continue,
                Ok(StreamEnd::Closed) => {
                    tracing::debug!(
                        collection = collection.id(),
                        "listen stream closed, reconnecting"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        collection = collection.id(),
                        error = %e,
                        "listen stream failed"
                    );
                    on_error(&e);
                }
            }

            tokio::time::sleep(retry_delay).await;
        }
    });

    Subscription { handle }
}

enum StreamEnd {
    Closed,
    Resync,
}

async fn run_stream<N>(
    collection: &CollectionReference,
    state: &mut WatchState,
    on_next: &mut N,
) -> Result<StreamEnd, FirestoreError>
where
    N: FnMut(QuerySnapshot),
{
    let mut stream = collection.listen(TARGET_ID, state.resume_token()).await?;

    while let Some(message) = stream.next().await {
        let snapshot = state.apply(message?)?;
        if state.needs_resync() {
            return Ok(StreamEnd::Resync);
        }
        if let Some(snapshot) = snapshot {
            tracing::debug!(
                collection = collection.id(),
                documents = snapshot.size(),
                "snapshot"
            );
            on_next(snapshot);
        }
    }

    Ok(StreamEnd::Closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ITEMS: &str = "projects/p/databases/(default)/documents/items";

    fn message(value: serde_json::Value) -> ListenResponse {
        serde_json::from_value(value).unwrap()
    }

    fn doc_change(id: &str, name: &str) -> ListenResponse {
        message(json!({
            "documentChange": {
                "document": {
                    "name": format!("{}/{}", ITEMS, id),
                    "fields": { "name": { "stringValue": name } }
                },
                "targetIds": [1]
            }
        }))
    }

    fn target_change(kind: &str) -> ListenResponse {
        message(json!({ "targetChange": { "targetChangeType": kind, "targetIds": [1] } }))
    }

    fn current() -> ListenResponse {
        message(json!({
            "targetChange": {
                "targetChangeType": "CURRENT",
                "targetIds": [1],
                "resumeToken": "tok1"
            }
        }))
    }

    fn global_no_change() -> ListenResponse {
        message(json!({ "targetChange": { "readTime": "2024-01-01T00:00:00Z" } }))
    }

    fn ids(snapshot: &QuerySnapshot) -> Vec<&str> {
        snapshot.iter().map(|d| d.id()).collect()
    }

    #[test]
    fn emits_after_current_and_global_consistency_point() {
        let mut state = WatchState::default();
        assert!(state.apply(target_change("ADD")).unwrap().is_none());
        assert!(state.apply(doc_change("b", "Zange")).unwrap().is_none());
        assert!(state.apply(doc_change("a", "Hammer")).unwrap().is_none());
        assert!(state.apply(current()).unwrap().is_none());

        let snapshot = state.apply(global_no_change()).unwrap().unwrap();
        assert_eq!(ids(&snapshot), vec!["a", "b"]);
        assert_eq!(snapshot.read_time(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(state.resume_token(), Some("tok1".to_string()));
    }

    #[test]
    fn empty_collection_still_emits_once() {
        let mut state = WatchState::default();
        state.apply(current()).unwrap();
        let snapshot = state.apply(global_no_change()).unwrap().unwrap();
        assert!(snapshot.empty());
        assert!(state.apply(global_no_change()).unwrap().is_none());
    }

    #[test]
    fn delete_and_remove_drop_documents() {
        let mut state = WatchState::default();
        state.apply(doc_change("a", "Hammer")).unwrap();
        state.apply(doc_change("b", "Zange")).unwrap();
        state.apply(current()).unwrap();
        state.apply(global_no_change()).unwrap();

        let delete = message(json!({
            "documentDelete": { "document": format!("{}/a", ITEMS), "removedTargetIds": [1] }
        }));
        state.apply(delete).unwrap();
        let snapshot = state.apply(global_no_change()).unwrap().unwrap();
        assert_eq!(ids(&snapshot), vec!["b"]);

        let removed = message(json!({
            "documentChange": {
                "document": { "name": format!("{}/b", ITEMS) },
                "removedTargetIds": [1]
            }
        }));
        state.apply(removed).unwrap();
        assert!(state.apply(global_no_change()).unwrap().unwrap().empty());
    }

    #[test]
    fn reset_clears_documents() {
        let mut state = WatchState::default();
        state.apply(doc_change("a", "Hammer")).unwrap();
        state.apply(target_change("RESET")).unwrap();
        state.apply(current()).unwrap();
        assert!(state.apply(global_no_change()).unwrap().unwrap().empty());
    }

    #[test]
    fn no_snapshot_before_target_is_current() {
        let mut state = WatchState::default();
        state.apply(doc_change("a", "Hammer")).unwrap();
        assert!(state.apply(global_no_change()).unwrap().is_none());
    }

    #[test]
    fn reconnect_without_token_starts_from_empty_set() {
        let mut state = WatchState::default();
        state.apply(doc_change("a", "Hammer")).unwrap();

        state.reconnecting();
        state.apply(doc_change("b", "Zange")).unwrap();
        state.apply(current()).unwrap();

        let snapshot = state.apply(global_no_change()).unwrap().unwrap();
        assert_eq!(ids(&snapshot), vec!["b"]);
    }

    #[test]
    fn reconnect_with_token_keeps_documents() {
        let mut state = WatchState::default();
        state.apply(doc_change("a", "Hammer")).unwrap();
        state.apply(current()).unwrap();
        state.apply(global_no_change()).unwrap();

        state.reconnecting();
        assert!(state.apply(global_no_change()).unwrap().is_none());
        state.apply(doc_change("b", "Zange")).unwrap();
        state.apply(current()).unwrap();

        let snapshot = state.apply(global_no_change()).unwrap().unwrap();
        assert_eq!(ids(&snapshot), vec!["a", "b"]);
    }

    #[test]
    fn target_removal_is_an_error() {
        let mut state = WatchState::default();
        let result = state.apply(message(json!({
            "targetChange": {
                "targetChangeType": "REMOVE",
                "targetIds": [1],
                "cause": { "code": 7, "message": "Missing or insufficient permissions." }
            }
        })));
        match result {
            Err(FirestoreError::ApiError(msg)) => {
                assert!(msg.contains("insufficient permissions"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn existence_filter_mismatch_requests_silent_resync() {
        let mut state = WatchState::default();
        state.apply(doc_change("a", "Hammer")).unwrap();
        state.apply(current()).unwrap();
        state.apply(global_no_change()).unwrap();

        let matching = message(json!({ "filter": { "targetId": 1, "count": 1 } }));
        assert!(state.apply(matching).unwrap().is_none());
        assert!(!state.needs_resync());

        let drifted = message(json!({ "filter": { "targetId": 1, "count": 3 } }));
        assert!(state.apply(drifted).unwrap().is_none());
        assert!(state.needs_resync());
        assert_eq!(state.resume_token(), None);

        // The reopened stream delivers the full set again.
        state.reconnecting();
        assert!(!state.needs_resync());
        for (id, name) in [("a", "Hammer"), ("b", "Zange"), ("c", "Säge")] {
            state.apply(doc_change(id, name)).unwrap();
        }
        state.apply(current()).unwrap();
        let snapshot = state.apply(global_no_change()).unwrap().unwrap();
        assert_eq!(ids(&snapshot), vec!["a", "b", "c"]);
    }
}
