use super::models::{ListenRequest, ListenResponse};
use super::FirestoreError;
use crate::core::parse_error_response;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream};
use reqwest_middleware::ClientWithMiddleware;
use std::pin::Pin;
use std::task::{Context, Poll};

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// A stream of `ListenResponse` messages.
///
/// The REST listen endpoint answers with one long JSON array; elements are
/// yielded as soon as they are complete.
pub struct ListenStream {
    inner: ByteStream,
    buffer: BytesMut,
}

impl ListenStream {
    pub fn new(inner: ByteStream) -> Self {
        Self {
            inner,
            buffer: BytesMut::new(),
        }
    }
}

impl Stream for ListenStream {
    type Item = Result<ListenResponse, FirestoreError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let skip = leading_separators(&self.buffer);
            let _ = self.buffer.split_to(skip);

            if let Some(&first) = self.buffer.first() {
                if first != b'{' {
                    self.buffer.clear();
                    return Poll::Ready(Some(Err(FirestoreError::ApiError(format!(
                        "Unexpected byte in listen stream: {:?}",
                        first as char
                    )))));
                }
            }

            if let Some(len) = find_object_end(&self.buffer) {
                let bytes = self.buffer.split_to(len);
                return match serde_json::from_slice::<ListenResponse>(&bytes) {
                    Ok(msg) => Poll::Ready(Some(Ok(msg))),
                    Err(e) => Poll::Ready(Some(Err(FirestoreError::SerializationError(e)))),
                };
            }

            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    self.buffer.extend_from_slice(&chunk);
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(FirestoreError::RequestError(e))));
                }
                Poll::Ready(None) => {
                    if !self.buffer.is_empty() {
                        self.buffer.clear();
                        return Poll::Ready(Some(Err(FirestoreError::ApiError(
                            "Stream ended with incomplete JSON".into(),
                        ))));
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Counts the bytes before the next array element: whitespace, brackets and commas.
fn leading_separators(buf: &[u8]) -> usize {
    buf.iter()
        .take_while(|b| b.is_ascii_whitespace() || matches!(b, b'[' | b']' | b','))
        .count()
}

/// Finds the length of the JSON object at the start of `buf`, if it is complete.
fn find_object_end(buf: &[u8]) -> Option<usize> {
    if buf.first() != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (i, &b) in buf.iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
            } else if b == b'\\' {
                escape = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

pub async fn listen_request(
    client: &ClientWithMiddleware,
    database_url: &str,
    request: &ListenRequest,
) -> Result<ListenStream, FirestoreError> {
    let url = format!("{}/documents:listen", database_url);

    let response = client.post(&url).json(request).send().await?;

    if !response.status().is_success() {
        return Err(FirestoreError::ApiError(
            parse_error_response(response, "Listen failed").await,
        ));
    }

    let stream = stream::unfold(response, |mut resp| async move {
        match resp.chunk().await {
            Ok(Some(bytes)) => Some((Ok(bytes), resp)),
            Ok(None) => None,
            Err(e) => Some((Err(e), resp)),
        }
    });

    Ok(ListenStream::new(Box::pin(stream)))
}
