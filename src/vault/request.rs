//! Wire request construction.
//!
//! Requests are described as plain data first so the exact query string and
//! body can be inspected, then replayed on whichever transport the trust
//! resolver picks (possibly twice, when the pinned attempt fails).

use crate::vault::{ConnectionConfig, ParamValue, ParameterBag, VaultError, AUTH_TOKEN_HEADER};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Method;
use std::fmt;
use url::Url;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// GET and DELETE carry their parameters in the query string.
    pub fn uses_query(&self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Delete)
    }

    pub fn as_method(&self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_method().as_str())
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl WireRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Prepares the request on `client`. Can be called more than once.
    pub fn to_builder(&self, client: &Client) -> RequestBuilder {
        let mut builder = client.request(self.method.as_method(), self.url.clone());
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &self.body {
            builder = builder.body(body.clone());
        }
        builder
    }
}

/// Builds the request for `path` relative to the configured server URL.
pub fn build_request(
    config: &ConnectionConfig,
    params: &ParameterBag,
    path: &str,
    method: HttpMethod,
) -> Result<WireRequest, VaultError> {
    let mut url = Url::parse(&format!("{}{}", config.server_url(), path))?;
    let mut headers = vec![(AUTH_TOKEN_HEADER.to_string(), config.auth_token().to_string())];

    let body = if method.uses_query() {
        let pairs = query_pairs(params);
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        None
    } else {
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
        Some(serde_json::to_vec(params)?)
    };

    Ok(WireRequest {
        method,
        url,
        headers,
        body,
    })
}

/// Flattens a bag into query pairs. Lists repeat their key once per element.
fn query_pairs(params: &ParameterBag) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(params.len());
    for (key, value) in params.iter() {
        match value {
            ParamValue::Str(s) if s.is_empty() => {}
            ParamValue::Str(s) => pairs.push((key.to_string(), s.clone())),
            ParamValue::Int(n) => pairs.push((key.to_string(), n.to_string())),
            ParamValue::Bool(b) => pairs.push((key.to_string(), b.to_string())),
            ParamValue::IntList(ids) => {
                pairs.extend(ids.iter().map(|id| (key.to_string(), id.to_string())));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::ConfigValue;
    use std::collections::BTreeSet;

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("http://127.0.0.1:5959", "tok-123", None).unwrap()
    }

    #[test]
    fn test_get_renders_query_string() {
        let mut params = ParameterBag::new();
        params
            .insert("account_id", 42i64)
            .insert("account_name", "svc1")
            .insert("account_title", "");
        let req =
            build_request(&config(), &params, "/secretsmanagement/get_account", HttpMethod::Get)
                .unwrap();
        assert_eq!(
            req.url.as_str(),
            "http://127.0.0.1:5959/secretsmanagement/get_account?account_id=42&account_name=svc1"
        );
        assert!(req.body.is_none());
        assert_eq!(req.header("authtoken"), Some("tok-123"));
        assert_eq!(req.header("content-type"), None);
    }

    #[test]
    fn test_empty_bag_has_no_query() {
        let req = build_request(&config(), &ParameterBag::new(), "/api/ping", HttpMethod::Get)
            .unwrap();
        assert_eq!(req.url.as_str(), "http://127.0.0.1:5959/api/ping");
    }

    #[test]
    fn test_delete_repeats_list_keys() {
        let ids = [1, 2, 3].map(ConfigValue::Known);
        let mut params = ParameterBag::new();
        params
            .set_ids("account_ids", &ids)
            .insert("delete_permanently", true);
        let req =
            build_request(&config(), &params, "/api/delete_accounts", HttpMethod::Delete).unwrap();

        let decoded: BTreeSet<i64> = req
            .url
            .query_pairs()
            .filter(|(k, _)| k == "account_ids")
            .map(|(_, v)| v.parse().unwrap())
            .collect();
        assert_eq!(decoded, BTreeSet::from([1, 2, 3]));
        assert!(req
            .url
            .query_pairs()
            .any(|(k, v)| k == "delete_permanently" && v == "true"));
    }

    #[test]
    fn test_post_serializes_json_body() {
        let ids = [
            ConfigValue::Known(7),
            ConfigValue::Unknown,
            ConfigValue::Known(9),
        ];
        let mut params = ParameterBag::new();
        params.set_ids("account_ids", &ids);
        let req = build_request(
            &config(),
            &params,
            "/secretsmanagement/get_accounts",
            HttpMethod::Post,
        )
        .unwrap();

        assert_eq!(req.url.query(), None);
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_slice(req.body.as_ref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"account_ids": [7, 9]}));
    }

    #[test]
    fn test_put_and_patch_use_body() {
        let mut params = ParameterBag::new();
        params.insert("account_id", 5i64);
        for method in [HttpMethod::Put, HttpMethod::Patch] {
            let req = build_request(&config(), &params, "/api/edit_account", method).unwrap();
            assert!(req.body.is_some(), "{} should carry a body", method);
        }
    }

    #[test]
    fn test_query_values_are_form_encoded() {
        let mut params = ParameterBag::new();
        params.insert("account_title", "db admin&co");
        let req = build_request(&config(), &params, "/x", HttpMethod::Get).unwrap();
        assert_eq!(req.url.query(), Some("account_title=db+admin%26co"));
    }
}
