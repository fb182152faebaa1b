use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::intent::{FileOp, FileRequest};

const STORAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin translation layer onto the sibling file-storage service. Each
/// sub-intent maps to one call scoped by the caller identity; storage
/// semantics (quotas, paths, persistence) belong to that service.
pub struct FileStore {
    client: Client,
    base_url: String,
}

impl FileStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, tail: &str) -> String {
        format!("{}/api/agents/files/{}", self.base_url, tail)
    }

    async fn post(&self, tail: &str, body: Value) -> Result<Value, String> {
        let response = self
            .client
            .post(self.endpoint(tail))
            .timeout(STORAGE_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        response.json().await.map_err(|e| e.to_string())
    }

    async fn get(&self, tail: &str, query: &[(&str, &str)]) -> Result<Value, String> {
        let params: Vec<String> = query
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        let url = format!("{}?{}", self.endpoint(tail), params.join("&"));
        let response = self
            .client
            .get(&url)
            .timeout(STORAGE_TIMEOUT)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        response.json().await.map_err(|e| e.to_string())
    }

    async fn delete(&self, tail: &str, query: &[(&str, &str)]) -> Result<Value, String> {
        let params: Vec<String> = query
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        let url = format!("{}?{}", self.endpoint(tail), params.join("&"));
        let response = self
            .client
            .delete(&url)
            .timeout(STORAGE_TIMEOUT)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        response.json().await.map_err(|e| e.to_string())
    }

    /// Execute one file sub-intent and render a structured confirmation or
    /// failure message.
    pub async fn handle(&self, request: &FileRequest, user_id: &str) -> String {
        let filename = request.filename.as_deref().unwrap_or_default();

        let result = match request.op {
            FileOp::Create => {
                let content = request.content.as_deref().unwrap_or_default();
                self.post(
                    "create",
                    json!({"filename": filename, "content": content, "userId": user_id}),
                )
                .await
                .map(|r| render_create(filename, &r))
            }
            FileOp::Read => self
                .get("read", &[("filename", filename), ("userId", user_id)])
                .await
                .map(|r| render_read(filename, &r)),
            FileOp::List => self
                .get("list", &[("userId", user_id)])
                .await
                .map(|r| render_list(&r)),
            FileOp::Delete => self
                .delete("delete", &[("filename", filename), ("userId", user_id)])
                .await
                .map(|r| render_delete(filename, &r)),
            FileOp::Append => {
                let content = request.content.as_deref().unwrap_or_default();
                self.post(
                    "append",
                    json!({"filename": filename, "content": content, "userId": user_id}),
                )
                .await
                .map(|r| render_simple(&r, &format!("Appended to `{}`.", filename)))
            }
            FileOp::ExtractText => self
                .post(
                    "extract-text",
                    json!({"filename": filename, "userId": user_id}),
                )
                .await
                .map(|r| render_text(filename, &r, "Extracted text from")),
            FileOp::ConvertText => self
                .post(
                    "convert-to-text",
                    json!({"filename": filename, "userId": user_id}),
                )
                .await
                .map(|r| render_text(filename, &r, "Converted to text:")),
            FileOp::Download => self
                .get("download", &[("filename", filename), ("userId", user_id)])
                .await
                .map(|r| render_download(filename, &r)),
        };

        result.unwrap_or_else(|raw| {
            format!(
                "**Could not reach the file workspace.**\n\nThe storage service \
did not respond ({}). Your files are untouched; try again shortly.",
                raw
            )
        })
    }
}

fn succeeded(result: &Value) -> bool {
    result["success"].as_bool().unwrap_or(false)
}

fn remote_error(result: &Value) -> &str {
    result["error"].as_str().unwrap_or("unknown storage error")
}

fn render_create(filename: &str, result: &Value) -> String {
    if succeeded(result) {
        let size = result["size"].as_i64().unwrap_or(0);
        format!(
            "**File created.**\n\n**Filename:** `{}`\n**Size:** {} bytes\n\n\
Your file has been saved to your workspace.",
            filename, size
        )
    } else {
        format!("**File creation failed.**\n\n{}", remote_error(result))
    }
}

fn render_read(filename: &str, result: &Value) -> String {
    if succeeded(result) {
        let content = result["content"].as_str().unwrap_or_default();
        let size = result["size"].as_i64().unwrap_or(0);
        format!(
            "**File: `{}`**\n\n```\n{}\n```\n\n*Size: {} bytes*",
            filename, content, size
        )
    } else {
        format!("**Could not read the file.**\n\n{}", remote_error(result))
    }
}

fn render_list(result: &Value) -> String {
    let files = result["files"].as_array();
    match files {
        Some(files) if succeeded(result) && !files.is_empty() => {
            let mut message = String::from("**Your files:**\n\n");
            for file in files {
                let name = file["name"].as_str().unwrap_or("?");
                match file["size"].as_i64() {
                    Some(size) => message.push_str(&format!("- `{}` ({} bytes)\n", name, size)),
                    None => message.push_str(&format!("- `{}`\n", name)),
                }
            }
            message.push_str(&format!("\n**Total:** {} files", files.len()));
            message
        }
        _ => "**Your workspace is empty.**\n\nCreate a file by saying \
\"create a file called example.txt\"."
            .to_string(),
    }
}

fn render_delete(filename: &str, result: &Value) -> String {
    if succeeded(result) {
        format!(
            "**File deleted.**\n\n`{}` has been removed from your workspace.",
            filename
        )
    } else {
        format!("**Could not delete the file.**\n\n{}", remote_error(result))
    }
}

fn render_simple(result: &Value, confirmation: &str) -> String {
    if succeeded(result) {
        format!("**Done.** {}", confirmation)
    } else {
        format!("**The operation failed.**\n\n{}", remote_error(result))
    }
}

fn render_text(filename: &str, result: &Value, verb: &str) -> String {
    if succeeded(result) {
        let text = result["text"]
            .as_str()
            .or_else(|| result["content"].as_str())
            .unwrap_or_default();
        format!("**{} `{}`:**\n\n{}", verb, filename, text)
    } else {
        format!("**The operation failed.**\n\n{}", remote_error(result))
    }
}

fn render_download(filename: &str, result: &Value) -> String {
    match result["url"].as_str() {
        Some(url) if succeeded(result) => {
            format!("**Download ready.**\n\n[{}]({})", filename, url)
        }
        _ => format!(
            "**Could not prepare the download.**\n\n{}",
            remote_error(result)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_create_renders_confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/agents/files/create"))
            .and(body_string_contains("notes.txt"))
            .and(body_string_contains("user-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true, "size": 17
            })))
            .mount(&server)
            .await;

        let store = FileStore::new(server.uri());
        let request = FileRequest {
            op: FileOp::Create,
            filename: Some("notes.txt".to_string()),
            content: Some("remember the milk".to_string()),
        };
        let message = store.handle(&request, "user-1").await;

        assert!(message.contains("File created"));
        assert!(message.contains("`notes.txt`"));
        assert!(message.contains("17 bytes"));
    }

    #[tokio::test]
    async fn test_list_scopes_by_caller() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/agents/files/list"))
            .and(query_param("userId", "user-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "files": [
                    {"name": "a.txt", "size": 3},
                    {"name": "b.md", "size": 14}
                ]
            })))
            .mount(&server)
            .await;

        let store = FileStore::new(server.uri());
        let request = FileRequest {
            op: FileOp::List,
            filename: None,
            content: None,
        };
        let message = store.handle(&request, "user-1").await;

        assert!(message.contains("`a.txt` (3 bytes)"));
        assert!(message.contains("`b.md` (14 bytes)"));
        assert!(message.contains("**Total:** 2 files"));
    }

    #[tokio::test]
    async fn test_delete_failure_carries_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/agents/files/delete"))
            .and(query_param("filename", "ghost.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false, "error": "File not found"
            })))
            .mount(&server)
            .await;

        let store = FileStore::new(server.uri());
        let request = FileRequest {
            op: FileOp::Delete,
            filename: Some("ghost.txt".to_string()),
            content: None,
        };
        let message = store.handle(&request, "user-1").await;

        assert!(message.contains("Could not delete"));
        assert!(message.contains("File not found"));
    }

    #[tokio::test]
    async fn test_unreachable_storage_renders_failure() {
        // nothing is listening on this port
        let store = FileStore::new("http://127.0.0.1:9");
        let request = FileRequest {
            op: FileOp::List,
            filename: None,
            content: None,
        };
        let message = store.handle(&request, "user-1").await;
        assert!(message.contains("Could not reach the file workspace"));
    }
}
