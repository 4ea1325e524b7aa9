use crate::constants::network::DEFAULT_CONTENT_TYPE;
use crate::errors::DispatchError;
use crate::services::auth::{AuthDecision, AuthLocation};
use crate::services::operation_index::OperationDescriptor;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::{Map, Value};
use url::Url;

/// A fully assembled HTTP call, ready for the executor.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl PreparedRequest {
    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }
}

pub fn build(
    descriptor: &OperationDescriptor,
    path_params: &Map<String, Value>,
    query: &Map<String, Value>,
    extra_headers: &Map<String, Value>,
    body: Option<&Value>,
    auth: &AuthDecision,
) -> Result<PreparedRequest, DispatchError> {
    let path = substitute_path(&descriptor.path_template, path_params);
    let raw_url = format!("{}{}", descriptor.base_url.trim_end_matches('/'), path);
    let mut url = Url::parse(&raw_url).map_err(|err| {
        DispatchError::InvalidRequest(format!("cannot build URL from {}: {}", raw_url, err))
    })?;

    let pairs = serialize_query(query);
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

    if let AuthDecision::Attach {
        location,
        name,
        secret,
    } = auth
    {
        match location {
            AuthLocation::Header => {
                let (name, mut value) = header_pair(name, secret)?;
                value.set_sensitive(true);
                headers.insert(name, value);
            }
            AuthLocation::Query => set_query_param(&mut url, name, secret),
        }
    }

    for (key, value) in extra_headers {
        if value.is_null() {
            continue;
        }
        let (name, value) = header_pair(key, &stringify(value))?;
        headers.insert(name, value);
    }

    let body = if descriptor.method == Method::GET {
        None
    } else {
        body.filter(|b| !b.is_null()).map(|b| match b {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
    };

    Ok(PreparedRequest {
        method: descriptor.method.clone(),
        url,
        headers,
        body,
    })
}

/// Replaces every `{name}` with the percent-encoded value. Placeholders with
/// no supplied value are left untouched.
pub fn substitute_path(template: &str, path_params: &Map<String, Value>) -> String {
    let mut path = template.to_string();
    for (key, value) in path_params {
        if value.is_null() {
            continue;
        }
        let encoded = urlencoding::encode(&stringify(value)).into_owned();
        path = path.replace(&format!("{{{}}}", key), &encoded);
    }
    path
}

/// Null values are dropped and arrays expand into repeated keys, in order.
pub fn serialize_query(query: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in query {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items.iter().filter(|item| !item.is_null()) {
                    pairs.push((key.clone(), stringify(item)));
                }
            }
            other => pairs.push((key.clone(), stringify(other))),
        }
    }
    pairs
}

/// Sets `name` to `value`: the first existing occurrence is replaced and any
/// later duplicates removed, otherwise the pair is appended.
pub fn set_query_param(url: &mut Url, name: &str, value: &str) {
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let mut replaced = false;
    pairs.retain_mut(|(key, current)| {
        if key != name {
            return true;
        }
        if replaced {
            return false;
        }
        *current = value.to_string();
        replaced = true;
        true
    });
    if !replaced {
        pairs.push((name.to_string(), value.to_string()));
    }
    url.query_pairs_mut().clear().extend_pairs(pairs);
}

/// Removes every occurrence of `name` from the query string.
pub fn remove_query_param(url: &mut Url, name: &str) {
    if url.query().is_none() {
        return;
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .into_owned()
        .filter(|(key, _)| key != name)
        .collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), DispatchError> {
    let header_name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|_| DispatchError::InvalidRequest(format!("invalid header name: {}", name)))?;
    let header_value = HeaderValue::from_str(value).map_err(|_| {
        DispatchError::InvalidRequest(format!("invalid value for header {}", name))
    })?;
    Ok((header_name, header_value))
}
