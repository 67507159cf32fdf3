//! 参数绑定
//!
//! 按参数元数据从请求上下文中解析出处理器的参数列表。
//! 单个参数失败不会中断绑定，全部失败在最后汇总为 [`ParameterBindingError`]。

use crate::context::HttpContext;
use crate::exception::HttpException;
use crate::metadata::{ParamType, ParameterMetadata};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// 解析后的参数值
#[derive(Debug, Clone, Default)]
pub enum ParamValue {
    /// 未声明的位置或缺失的键
    #[default]
    Undefined,
    /// 可解析为 JSON 的请求体
    Json(Value),
    /// 单个文本值，或无法解析为 JSON 的请求体
    Text(String),
    /// 未指定键时的整张映射
    Map(HashMap<String, String>),
    /// 请求上下文句柄（request / response / context）
    Context(Arc<HttpContext>),
}

impl ParamValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, ParamValue::Undefined)
    }

    fn kind(&self) -> &'static str {
        match self {
            ParamValue::Undefined => "undefined",
            ParamValue::Json(_) => "json",
            ParamValue::Text(_) => "text",
            ParamValue::Map(_) => "map",
            ParamValue::Context(_) => "context",
        }
    }
}

/// 处理器参数列表，按参数下标排列
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<ParamValue>,
}

impl Args {
    pub fn new(values: Vec<ParamValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[ParamValue] {
        &self.values
    }

    /// 下标越界时返回 `Undefined`
    pub fn get(&self, index: usize) -> &ParamValue {
        const UNDEFINED: &ParamValue = &ParamValue::Undefined;
        self.values.get(index).unwrap_or(UNDEFINED)
    }

    pub fn take(&mut self, index: usize) -> ParamValue {
        self.values
            .get_mut(index)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// 反序列化为目标类型；映射按 JSON 对象处理，缺失值按 `null` 处理
    pub fn json<T: DeserializeOwned>(&self, index: usize) -> Result<T, HttpException> {
        let value = match self.get(index) {
            ParamValue::Undefined => Value::Null,
            ParamValue::Json(value) => value.clone(),
            ParamValue::Text(text) => Value::String(text.clone()),
            ParamValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
            ParamValue::Context(_) => {
                return Err(HttpException::bad_request(format!(
                    "Parameter {} is a request context, not a value",
                    index
                )))
            }
        };
        serde_json::from_value(value).map_err(|e| {
            HttpException::bad_request(format!("Invalid value for parameter {}: {}", index, e))
        })
    }

    pub fn optional_string(&self, index: usize) -> Option<String> {
        match self.get(index) {
            ParamValue::Text(text) => Some(text.clone()),
            ParamValue::Json(Value::String(s)) => Some(s.clone()),
            ParamValue::Json(Value::Null) => None,
            ParamValue::Json(value) => Some(value.to_string()),
            _ => None,
        }
    }

    pub fn string(&self, index: usize) -> Result<String, HttpException> {
        self.optional_string(index).ok_or_else(|| {
            HttpException::bad_request(format!(
                "Missing value for parameter {} ({})",
                index,
                self.get(index).kind()
            ))
        })
    }

    /// 按 `FromStr` 解析文本参数
    pub fn parse<T>(&self, index: usize) -> Result<T, HttpException>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let text = self.string(index)?;
        text.parse().map_err(|e| {
            HttpException::bad_request(format!(
                "Invalid value '{}' for parameter {}: {}",
                text, index, e
            ))
        })
    }

    pub fn map(&self, index: usize) -> Result<HashMap<String, String>, HttpException> {
        match self.get(index) {
            ParamValue::Map(map) => Ok(map.clone()),
            ParamValue::Undefined => Ok(HashMap::new()),
            other => Err(HttpException::bad_request(format!(
                "Parameter {} is {}, not a map",
                index,
                other.kind()
            ))),
        }
    }

    pub fn context(&self, index: usize) -> Result<Arc<HttpContext>, HttpException> {
        match self.get(index) {
            ParamValue::Context(ctx) => Ok(Arc::clone(ctx)),
            other => Err(HttpException::bad_request(format!(
                "Parameter {} is {}, not a request context",
                index,
                other.kind()
            ))),
        }
    }
}

/// 单个参数的解析失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterError {
    pub index: usize,
    pub param_type: ParamType,
    pub message: String,
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parameter {} ({}): {}",
            self.index, self.param_type, self.message
        )
    }
}

/// 一次请求中全部参数解析失败的汇总
#[derive(Error, Debug, Clone)]
#[error("Parameter resolution failed: {}", join_errors(.errors))]
pub struct ParameterBindingError {
    pub errors: Vec<ParameterError>,
}

fn join_errors(errors: &[ParameterError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// 绑定结果
#[derive(Debug, Default)]
pub struct ResolutionResult {
    pub args: Args,
    pub errors: Vec<ParameterError>,
}

impl ResolutionResult {
    pub fn into_result(self) -> Result<Args, ParameterBindingError> {
        if self.errors.is_empty() {
            Ok(self.args)
        } else {
            Err(ParameterBindingError {
                errors: self.errors,
            })
        }
    }
}

/// 参数解析器
pub struct ParameterResolver;

impl ParameterResolver {
    /// 解析参数列表
    ///
    /// 列表长度为最大下标加一，未声明的位置为 `Undefined`；同一下标声明多次时最后一次生效。
    pub async fn resolve(
        ctx: &Arc<HttpContext>,
        parameters: &[ParameterMetadata],
    ) -> ResolutionResult {
        let mut sorted: Vec<&ParameterMetadata> = parameters.iter().collect();
        sorted.sort_by_key(|p| p.index);

        let len = sorted.last().map(|p| p.index + 1).unwrap_or(0);
        let mut values = vec![ParamValue::Undefined; len];
        let mut errors = Vec::new();

        for param in sorted {
            match Self::resolve_one(ctx, param).await {
                Ok(value) => values[param.index] = value,
                Err(message) => {
                    tracing::debug!(
                        index = param.index,
                        param_type = %param.param_type,
                        "Parameter resolution failed: {}",
                        message
                    );
                    errors.push(ParameterError {
                        index: param.index,
                        param_type: param.param_type,
                        message,
                    });
                }
            }
        }

        ResolutionResult {
            args: Args::new(values),
            errors,
        }
    }

    async fn resolve_one(
        ctx: &Arc<HttpContext>,
        param: &ParameterMetadata,
    ) -> Result<ParamValue, String> {
        let key = param.key.as_deref();
        match param.param_type {
            ParamType::Body => {
                let bytes = ctx.bytes().await?;
                Ok(match serde_json::from_slice::<Value>(&bytes) {
                    Ok(value) => ParamValue::Json(value),
                    Err(_) => ParamValue::Text(String::from_utf8_lossy(&bytes).into_owned()),
                })
            }
            ParamType::Param => match key {
                Some(key) => Ok(ctx.param(key)?.map_or(ParamValue::Undefined, ParamValue::Text)),
                None => Ok(ParamValue::Map(ctx.params()?.clone())),
            },
            ParamType::Query => match key {
                Some(key) => Ok(ctx.query(key)?.map_or(ParamValue::Undefined, ParamValue::Text)),
                None => Ok(ParamValue::Map(ctx.queries()?)),
            },
            ParamType::Header => match key {
                Some(key) => Ok(ctx.header(key).map_or(ParamValue::Undefined, ParamValue::Text)),
                None => Ok(ParamValue::Map(ctx.headers())),
            },
            ParamType::Request | ParamType::Response | ParamType::Context => {
                Ok(ParamValue::Context(Arc::clone(ctx)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde::Deserialize;

    fn ctx(request: Request<Body>, params: &[(&str, &str)]) -> Arc<HttpContext> {
        let (parts, body) = request.into_parts();
        let params = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Arc::new(HttpContext::new(parts, body, Ok(params), 1024))
    }

    fn meta(index: usize, param_type: ParamType, key: Option<&str>) -> ParameterMetadata {
        ParameterMetadata {
            index,
            param_type,
            key: key.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_binds_by_index_regardless_of_declaration_order() {
        let ctx = ctx(
            Request::builder()
                .uri("/users/7?name=x")
                .body(Body::empty())
                .unwrap(),
            &[("id", "7")],
        );
        let params = vec![
            meta(1, ParamType::Query, Some("name")),
            meta(0, ParamType::Param, Some("id")),
        ];

        let args = ParameterResolver::resolve(&ctx, &params)
            .await
            .into_result()
            .unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(args.string(0).unwrap(), "7");
        assert_eq!(args.string(1).unwrap(), "x");
        assert_eq!(args.parse::<u64>(0).unwrap(), 7);
    }

    #[tokio::test]
    async fn test_body_falls_back_to_text() {
        let ctx = ctx(
            Request::builder()
                .method("POST")
                .uri("/echo")
                .body(Body::from("hello"))
                .unwrap(),
            &[],
        );
        let args = ParameterResolver::resolve(&ctx, &[meta(0, ParamType::Body, None)])
            .await
            .into_result()
            .unwrap();
        assert!(matches!(args.get(0), ParamValue::Text(t) if t == "hello"));
    }

    #[tokio::test]
    async fn test_body_json_and_typed_access() {
        #[derive(Deserialize)]
        struct CreateUser {
            name: String,
        }

        let ctx = ctx(
            Request::builder()
                .method("POST")
                .uri("/users")
                .body(Body::from(r#"{"name":"a"}"#))
                .unwrap(),
            &[],
        );
        let args = ParameterResolver::resolve(&ctx, &[meta(0, ParamType::Body, None)])
            .await
            .into_result()
            .unwrap();
        let dto: CreateUser = args.json(0).unwrap();
        assert_eq!(dto.name, "a");
    }

    #[tokio::test]
    async fn test_sparse_indexes_and_last_declaration_wins() {
        let ctx = ctx(
            Request::builder()
                .uri("/?a=1&b=2")
                .body(Body::empty())
                .unwrap(),
            &[],
        );
        let params = vec![
            meta(2, ParamType::Query, Some("a")),
            meta(2, ParamType::Query, Some("b")),
        ];
        let args = ParameterResolver::resolve(&ctx, &params)
            .await
            .into_result()
            .unwrap();

        assert_eq!(args.len(), 3);
        assert!(args.get(0).is_undefined());
        assert!(args.get(1).is_undefined());
        assert_eq!(args.string(2).unwrap(), "2");
        assert!(args.get(10).is_undefined());
    }

    #[tokio::test]
    async fn test_whole_maps_and_context() {
        let ctx = ctx(
            Request::builder()
                .uri("/a/b?x=1")
                .header("x-trace", "t")
                .body(Body::empty())
                .unwrap(),
            &[("first", "a"), ("second", "b")],
        );
        let params = vec![
            meta(0, ParamType::Param, None),
            meta(1, ParamType::Query, None),
            meta(2, ParamType::Header, None),
            meta(3, ParamType::Request, None),
            meta(4, ParamType::Context, None),
        ];
        let args = ParameterResolver::resolve(&ctx, &params)
            .await
            .into_result()
            .unwrap();

        assert_eq!(args.map(0).unwrap().len(), 2);
        assert_eq!(args.map(1).unwrap().get("x").map(String::as_str), Some("1"));
        assert_eq!(args.map(2).unwrap().get("x-trace").map(String::as_str), Some("t"));
        assert_eq!(args.context(3).unwrap().path(), "/a/b");
        assert!(Arc::ptr_eq(&args.context(4).unwrap(), &ctx));
    }

    #[tokio::test]
    async fn test_errors_are_collected() {
        let (parts, body) = Request::builder()
            .uri("/")
            .header("x-name", http::HeaderValue::from_bytes(b"caf\xe9").unwrap())
            .header("x-trace", "t")
            .body(Body::from("0123456789"))
            .unwrap()
            .into_parts();
        let ctx = Arc::new(HttpContext::new(
            parts,
            body,
            Err("Invalid UTF-8 in path parameter".to_string()),
            4,
        ));
        let params = vec![
            meta(0, ParamType::Param, Some("id")),
            meta(1, ParamType::Header, None),
            meta(2, ParamType::Header, Some("x-trace")),
            meta(3, ParamType::Body, None),
        ];

        let result = ParameterResolver::resolve(&ctx, &params).await;
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0].index, 0);
        assert_eq!(result.errors[1].index, 3);
        assert_eq!(result.errors[1].param_type, ParamType::Body);

        // 非 ASCII 请求头不会导致绑定失败
        assert_eq!(
            result.args.map(1).unwrap().get("x-name").map(String::as_str),
            Some("caf\u{fffd}")
        );
        assert_eq!(result.args.string(2).unwrap(), "t");

        let err = result.into_result().unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Parameter resolution failed: parameter 0 (param)"));
        assert!(message.contains(", parameter 3 (body)"));
    }

    #[test]
    fn test_accessor_errors_are_bad_requests() {
        let args = Args::new(vec![ParamValue::Text("abc".into())]);
        let err = args.parse::<u32>(0).unwrap_err();
        assert_eq!(err.status(), http::StatusCode::BAD_REQUEST);
        assert!(args.string(1).is_err());
        assert!(args.context(0).is_err());
    }
}
