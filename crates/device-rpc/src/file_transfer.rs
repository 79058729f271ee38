//! Chunked file uploads to the device's file-transfer endpoint.

use crate::{ControlContext, DeviceRpc, RpcError, RpcRequest, RpcResult};
use std::path::Path;
use tracing::{debug, info};

/// Upload endpoint; the file name is appended.
pub const UPLOAD_PATH_PREFIX: &str = "/mgmt/shared/file-transfer/uploads/";

/// Directory where uploaded files land on the device.
pub const DOWNLOADS_DIR: &str = "/var/config/rest/downloads/";

/// Largest chunk sent in one request.
pub const UPLOAD_CHUNK_SIZE: usize = 1024 * 1024;

/// Upload `content` as `file_name`, in `Content-Range` chunks.
///
/// Returns the on-device path of the uploaded file.
pub async fn upload_bytes(
    rpc: &dyn DeviceRpc,
    control: &ControlContext,
    file_name: &str,
    content: &[u8],
    why: &str,
) -> RpcResult<String> {
    let path = format!("{UPLOAD_PATH_PREFIX}{file_name}");
    let total = content.len();

    if total == 0 {
        let request = RpcRequest::post(&path, why)
            .with_raw(Vec::new(), "application/octet-stream")
            .with_header("Content-Range", "0-0/0");
        rpc.call_json(control, request).await?;
        return Ok(format!("{DOWNLOADS_DIR}{file_name}"));
    }

    let mut start = 0;
    while start < total {
        let end = usize::min(start + UPLOAD_CHUNK_SIZE, total);
        let range = format!("{}-{}/{}", start, end - 1, total);
        debug!(file = file_name, range = %range, "Uploading chunk");

        let request = RpcRequest::post(&path, why)
            .with_raw(content[start..end].to_vec(), "application/octet-stream")
            .with_header("Content-Range", range);
        rpc.call_json(control, request).await?;
        start = end;
    }

    Ok(format!("{DOWNLOADS_DIR}{file_name}"))
}

/// Copy a local file to the device's downloads directory.
pub async fn copy_to_host(
    rpc: &dyn DeviceRpc,
    control: &ControlContext,
    local_path: &Path,
) -> RpcResult<String> {
    let file_name = local_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            RpcError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} has no file name", local_path.display()),
            ))
        })?
        .to_string();

    let content = tokio::fs::read(local_path).await?;
    let remote = upload_bytes(
        rpc,
        control,
        &file_name,
        &content,
        &format!("copy {} to host", file_name),
    )
    .await?;

    info!(
        host = %control.identity(),
        file = %file_name,
        bytes = content.len(),
        "Copied file to host"
    );
    Ok(remote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedDeviceRpc, ScriptedReply};
    use crate::Method;
    use serde_json::json;

    fn control() -> ControlContext {
        ControlContext::new("192.0.2.10", 443)
    }

    #[tokio::test]
    async fn upload_splits_into_ranges() {
        let rpc = ScriptedDeviceRpc::new();
        rpc.always(Method::Post, UPLOAD_PATH_PREFIX, ScriptedReply::ok(json!({})));

        let content = vec![b'a'; UPLOAD_CHUNK_SIZE + 10];
        let remote = upload_bytes(&rpc, &control(), "big.bin", &content, "test")
            .await
            .unwrap();

        assert_eq!(remote, "/var/config/rest/downloads/big.bin");
        let calls = rpc.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].headers,
            vec![(
                "Content-Range".to_string(),
                format!("0-{}/{}", UPLOAD_CHUNK_SIZE - 1, UPLOAD_CHUNK_SIZE + 10)
            )]
        );
        assert_eq!(calls[1].raw.as_ref().map(Vec::len), Some(10));
    }

    #[tokio::test]
    async fn upload_propagates_device_failure() {
        let rpc = ScriptedDeviceRpc::new();
        rpc.on(
            Method::Post,
            UPLOAD_PATH_PREFIX,
            ScriptedReply::status(400, json!({"message": "bad range"})),
        );

        let err = upload_bytes(&rpc, &control(), "x.cli", b"abc", "test")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(400));
        assert_eq!(err.to_string(), "bad range");
    }

    #[tokio::test]
    async fn copy_to_host_reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appsvcs-3.50.0.noarch.rpm");
        std::fs::write(&path, b"rpm-bytes").unwrap();

        let rpc = ScriptedDeviceRpc::new();
        rpc.always(Method::Post, UPLOAD_PATH_PREFIX, ScriptedReply::ok(json!({})));

        let remote = copy_to_host(&rpc, &control(), &path).await.unwrap();
        assert_eq!(
            remote,
            "/var/config/rest/downloads/appsvcs-3.50.0.noarch.rpm"
        );
        assert_eq!(
            rpc.calls()[0].path,
            "/mgmt/shared/file-transfer/uploads/appsvcs-3.50.0.noarch.rpm"
        );
    }
}
