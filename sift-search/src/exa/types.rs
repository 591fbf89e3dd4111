use serde::{Deserialize, Serialize};

/// Request body for `POST /search`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaSearchRequest<'a> {
    pub query: &'a str,
    pub num_results: u32,
    /// "auto" lets Exa pick between neural and keyword search.
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub contents: ExaContents,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExaContents {
    pub text: ExaTextOptions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaTextOptions {
    pub max_characters: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaSearchResponse {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub results: Vec<ExaResult>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaResult {
    #[serde(default)]
    pub title: Option<String>,
    pub url: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub published_date: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}
