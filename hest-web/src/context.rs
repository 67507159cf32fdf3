//! 请求上下文
//!
//! 每个请求一个 [`HttpContext`]：方法、URI、请求头、路径参数，以及惰性读取并缓存的请求体。
//! 处理器可通过上下文设置响应状态码与响应头。

use axum::body::Body;
use axum::extract::Query;
use axum::response::Response;
use bytes::Bytes;
use http::header::IntoHeaderName;
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tokio::sync::OnceCell;

#[derive(Debug, Default)]
struct ResponseState {
    status: Option<StatusCode>,
    headers: HeaderMap,
}

/// 单个请求的上下文
pub struct HttpContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    path_params: Result<HashMap<String, String>, String>,
    body: Mutex<Option<Body>>,
    body_bytes: OnceCell<Result<Bytes, String>>,
    body_limit: usize,
    response: Mutex<ResponseState>,
}

impl std::fmt::Debug for HttpContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpContext")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("path_params", &self.path_params)
            .finish()
    }
}

impl HttpContext {
    pub fn new(
        parts: http::request::Parts,
        body: Body,
        path_params: Result<HashMap<String, String>, String>,
        body_limit: usize,
    ) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            path_params,
            body: Mutex::new(Some(body)),
            body_bytes: OnceCell::new(),
            body_limit,
            response: Mutex::new(ResponseState::default()),
        }
    }

    /// 从完整请求构造，路径参数为空（测试与中间件使用）
    pub fn from_request(request: axum::extract::Request, body_limit: usize) -> Self {
        let (parts, body) = request.into_parts();
        Self::new(parts, body, Ok(HashMap::new()), body_limit)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    // ---------- 路径参数 ----------

    pub fn param(&self, key: &str) -> Result<Option<String>, String> {
        Ok(self.params()?.get(key).cloned())
    }

    pub fn params(&self) -> Result<&HashMap<String, String>, String> {
        self.path_params.as_ref().map_err(Clone::clone)
    }

    // ---------- 查询参数 ----------

    /// 单个查询参数，重复出现时取第一个值
    pub fn query(&self, key: &str) -> Result<Option<String>, String> {
        Ok(self
            .query_pairs()?
            .into_iter()
            .find_map(|(k, v)| (k == key).then_some(v)))
    }

    /// 全部查询参数，重复的键保留第一个值
    pub fn queries(&self) -> Result<HashMap<String, String>, String> {
        let mut map = HashMap::new();
        for (key, value) in self.query_pairs()? {
            map.entry(key).or_insert(value);
        }
        Ok(map)
    }

    fn query_pairs(&self) -> Result<Vec<(String, String)>, String> {
        Query::<Vec<(String, String)>>::try_from_uri(&self.uri)
            .map(|Query(pairs)| pairs)
            .map_err(|e| e.body_text())
    }

    // ---------- 请求头 ----------

    /// 非 ASCII 字节按 UTF-8 宽松解码，不会失败
    pub fn header(&self, key: &str) -> Option<String> {
        self.headers.get(key).map(decode_header)
    }

    /// 全部请求头，键为小写名称
    pub fn headers(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), decode_header(value)))
            .collect()
    }

    pub fn header_map(&self) -> &HeaderMap {
        &self.headers
    }

    // ---------- 请求体 ----------

    /// 读取请求体，首次读取后缓存
    pub async fn bytes(&self) -> Result<Bytes, String> {
        self.body_bytes
            .get_or_init(|| async {
                let body = self.body.lock().take();
                match body {
                    Some(body) => axum::body::to_bytes(body, self.body_limit)
                        .await
                        .map_err(|e| format!("Failed to read request body: {}", e)),
                    None => Ok(Bytes::new()),
                }
            })
            .await
            .clone()
    }

    pub async fn text(&self) -> Result<String, String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn json<T: DeserializeOwned>(&self) -> Result<T, String> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| format!("Invalid JSON body: {}", e))
    }

    // ---------- 响应状态 ----------

    /// 覆盖成功响应的状态码
    pub fn set_status(&self, status: StatusCode) {
        self.response.lock().status = Some(status);
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.response.lock().status
    }

    /// 为成功响应附加响应头
    pub fn set_header<K: IntoHeaderName>(&self, name: K, value: HeaderValue) {
        self.response.lock().headers.insert(name, value);
    }

    pub(crate) fn apply_response_state(&self, response: &mut Response) {
        let state = self.response.lock();
        if let Some(status) = state.status {
            *response.status_mut() = status;
        }
        for (name, value) in state.headers.iter() {
            response.headers_mut().insert(name.clone(), value.clone());
        }
    }
}

/// 异常过滤器看到的请求参数宿主
#[derive(Debug, Clone)]
pub struct ArgumentsHost {
    context: std::sync::Arc<HttpContext>,
}

impl ArgumentsHost {
    pub fn new(context: std::sync::Arc<HttpContext>) -> Self {
        Self { context }
    }

    pub fn get_context(&self) -> &std::sync::Arc<HttpContext> {
        &self.context
    }

    pub fn get_request(&self) -> &HttpContext {
        &self.context
    }

    pub fn get_response(&self) -> &HttpContext {
        &self.context
    }

    pub fn path(&self) -> &str {
        self.context.path()
    }
}

fn decode_header(value: &HeaderValue) -> String {
    String::from_utf8_lossy(value.as_bytes()).into_owned()
}
