//! Blob storage endpoints (`/storage/v1/object/*`).

use tracing::{debug, instrument};

use super::RestBackend;
use crate::backend::{BackendError, DocumentStore};

impl DocumentStore for RestBackend {
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    async fn upload(
        &self,
        bucket: &str,
        object: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError> {
        let url = self.endpoint(&format!("storage/v1/object/{bucket}/{object}"));
        let response = self
            .authed(self.inner.http.post(url))
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        Self::check(response).await?;

        let path = format!("{bucket}/{object}");
        debug!(%path, "document uploaded");
        Ok(path)
    }
}
