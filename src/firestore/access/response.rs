use crate::firestore::error::{FirestoreError, FirestoreResult};

/// Result envelope returned by one-shot fetches.
#[derive(Clone, Debug, PartialEq)]
pub enum AsyncResponse<T> {
    Success(T),
    Failure(FirestoreError),
}

impl<T> AsyncResponse<T> {
    pub fn success(data: T) -> Self {
        AsyncResponse::Success(data)
    }

    pub fn failure(error: FirestoreError) -> Self {
        AsyncResponse::Failure(error)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AsyncResponse::Success(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            AsyncResponse::Success(data) => Some(data),
            AsyncResponse::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&FirestoreError> {
        match self {
            AsyncResponse::Success(_) => None,
            AsyncResponse::Failure(error) => Some(error),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> AsyncResponse<U> {
        match self {
            AsyncResponse::Success(data) => AsyncResponse::Success(f(data)),
            AsyncResponse::Failure(error) => AsyncResponse::Failure(error),
        }
    }

    pub fn into_result(self) -> FirestoreResult<T> {
        self.into()
    }
}

impl<T> From<FirestoreResult<T>> for AsyncResponse<T> {
    fn from(result: FirestoreResult<T>) -> Self {
        match result {
            Ok(data) => AsyncResponse::Success(data),
            Err(error) => AsyncResponse::Failure(error),
        }
    }
}

impl<T> From<AsyncResponse<T>> for FirestoreResult<T> {
    fn from(response: AsyncResponse<T>) -> Self {
        match response {
            AsyncResponse::Success(data) => Ok(data),
            AsyncResponse::Failure(error) => Err(error),
        }
    }
}
