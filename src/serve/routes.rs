use parking_lot::RwLock;
use poem::http::StatusCode;
use poem_openapi::{
    Multipart, OpenApi,
    param::Path,
    payload::{Binary, Json},
    types::multipart::Upload,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::serve::validator::Validator;
use crate::storage::models::FileDescriptor;

/// Multipart upload body: a single file part carrying the filename and
/// content type.
#[derive(Debug, Multipart)]
pub struct FileUpload {
    file: Upload,
}

pub struct StoreApi {
    validator: Arc<RwLock<Validator>>,
}

impl StoreApi {
    pub fn new(validator: Validator) -> Self {
        Self {
            validator: Arc::new(RwLock::new(validator)),
        }
    }
}

#[OpenApi]
impl StoreApi {
    // service liveness and stripe shape
    #[oai(path = "/health", method = "get")]
    async fn health(&self) -> Json<serde_json::Value> {
        let validator = self.validator.read();
        Json(json!({
            "status": "ok",
            "num_blocks": validator.storage().num_blocks(),
        }))
    }

    // store a new file as a parity-protected stripe
    #[oai(path = "/file", method = "post")]
    async fn create_file(&self, upload: FileUpload) -> poem::Result<Json<FileDescriptor>> {
        let (filename, content_type, content) = ingest(upload).await?;
        info!(filename = filename.as_str(), size = content.len(), "create");

        let validator = self.validator.write();
        let descriptor = validator.create_file(&filename, content_type.as_deref(), &content)?;
        Ok(Json(descriptor))
    }

    // reassemble and return the stored payload
    #[oai(path = "/file/:filename", method = "get")]
    async fn retrieve_file(&self, filename: Path<String>) -> poem::Result<Binary<Vec<u8>>> {
        let validator = self.validator.write();
        let content = validator.retrieve_file(&filename)?;
        Ok(Binary(content))
    }

    // replace an existing file
    #[oai(path = "/file", method = "put")]
    async fn update_file(&self, upload: FileUpload) -> poem::Result<Json<FileDescriptor>> {
        let (filename, content_type, content) = ingest(upload).await?;
        info!(filename = filename.as_str(), size = content.len(), "update");

        let validator = self.validator.write();
        let descriptor = validator.update_file(&filename, content_type.as_deref(), &content)?;
        Ok(Json(descriptor))
    }

    #[oai(path = "/file/:filename", method = "delete")]
    async fn delete_file(&self, filename: Path<String>) -> poem::Result<Json<serde_json::Value>> {
        let validator = self.validator.write();
        validator.delete_file(&filename)?;
        Ok(Json(json!({ "detail": "file deleted" })))
    }

    // rebuild one lost block from the survivors
    #[oai(path = "/fix/:block_id", method = "post")]
    async fn fix_block(&self, block_id: Path<usize>) -> poem::Result<Json<serde_json::Value>> {
        info!(block_id = block_id.0, "block repair requested");
        let validator = self.validator.write();
        validator.fix_block(block_id.0)?;
        Ok(Json(json!({ "detail": format!("block {} rebuilt", block_id.0) })))
    }
}

/// Reads the multipart body whole; the size cap is checked against the
/// materialized payload in the validator.
async fn ingest(upload: FileUpload) -> poem::Result<(String, Option<String>, Vec<u8>)> {
    let filename = match upload.file.file_name() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            return Err(poem::Error::from_string(
                "A filename is required",
                StatusCode::BAD_REQUEST,
            ));
        }
    };
    let content_type = upload.file.content_type().map(str::to_string);
    let content = upload.file.into_vec().await.map_err(|err| {
        tracing::error!("failed to read upload body: {err}");
        poem::Error::from_string(err.to_string(), StatusCode::BAD_REQUEST)
    })?;
    Ok((filename, content_type, content))
}
