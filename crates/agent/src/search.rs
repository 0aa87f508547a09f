//! A stand-in web search tool.

use acore::{BoxFuture, FunctionDeclaration, Tool, ToolContext};
use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Arguments of [`GoogleSearch`].
#[derive(Debug, Clone, JsonSchema, Deserialize)]
pub struct SearchArgs {
    /// The search query to execute
    pub query: String,
    /// Number of results to return (max 10)
    #[serde(default = "default_results")]
    pub num_results: u32,
}

fn default_results() -> u32 {
    5
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// Returns two canned results for any query; no network access.
#[derive(Debug, Default, Clone, Copy)]
pub struct GoogleSearch;

impl GoogleSearch {
    /// Produce the results for `args`.
    pub fn search(&self, args: &SearchArgs) -> Vec<SearchResult> {
        tracing::info!("searching for '{}'", args.query);
        let query = &args.query;
        vec![
            SearchResult {
                title: format!("Result 1 for {query}"),
                link: "https://example.com/1".into(),
                snippet: format!("This is a sample result for the query \"{query}\"."),
            },
            SearchResult {
                title: format!("Result 2 for {query}"),
                link: "https://example.com/2".into(),
                snippet: format!("Another sample result for \"{query}\"."),
            },
        ]
    }
}

impl Tool for GoogleSearch {
    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration::new(
            "google_search",
            "Search the web using Google",
            schemars::schema_for!(SearchArgs),
        )
    }

    fn invoke(&self, args: Value, _ctx: ToolContext) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let args: SearchArgs =
                serde_json::from_value(args).context("invalid google_search arguments")?;
            let results = self.search(&args);
            Ok(serde_json::json!({ "results": results }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acore::InvocationContext;
    use serde_json::json;

    #[tokio::test]
    async fn returns_two_results_for_the_query() {
        let ctx = ToolContext::new(InvocationContext::new(Vec::new()));
        let value = GoogleSearch
            .invoke(json!({"query": "rust"}), ctx)
            .await
            .unwrap();
        let results = value["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["title"], "Result 1 for rust");
        assert_eq!(results[1]["link"], "https://example.com/2");
    }

    #[test]
    fn num_results_defaults_to_five() {
        let args: SearchArgs = serde_json::from_value(json!({"query": "q"})).unwrap();
        assert_eq!(args.num_results, 5);
    }

    #[test]
    fn declaration_requires_query() {
        let declaration = GoogleSearch.declaration();
        assert_eq!(declaration.name, "google_search");
        let schema = serde_json::to_value(&declaration.parameters).unwrap();
        assert_eq!(schema["required"], json!(["query"]));
    }
}
