//! Workspace users with client-side filtering

use std::sync::Arc;

use fireblocks_client::CustodyApi;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ToolError;
use crate::tools::{Field, ObjectSchema, Tool};

pub(super) fn tools(api: &Arc<dyn CustodyApi>) -> Vec<Tool> {
    vec![get_users(api.clone())]
}

/// Filters applied to the full user list. All given filters must match.
#[derive(Debug, Default, Deserialize)]
struct UserFilter {
    id: Option<String>,
    email: Option<String>,
    query: Option<String>,
}

/// An empty filter value counts as not given
fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl UserFilter {
    fn matches(&self, user: &Value) -> bool {
        let field = |name: &str| user.get(name).and_then(Value::as_str).unwrap_or("");

        if let Some(id) = given(&self.id) {
            if field("id") != id {
                return false;
            }
        }

        if let Some(email) = given(&self.email) {
            if user.get("email").and_then(Value::as_str).map(str::to_lowercase) != Some(email.to_lowercase()) {
                return false;
            }
        }

        if let Some(query) = given(&self.query) {
            let query = query.to_lowercase();
            let full_name = format!("{} {}", field("firstName"), field("lastName"))
                .trim()
                .to_lowercase();
            let email = field("email").to_lowercase();
            if !full_name.contains(&query) && !email.contains(&query) {
                return false;
            }
        }

        true
    }

    /// Keep matching users; non-array payloads pass through unchanged
    fn apply(&self, users: Value) -> Value {
        match users {
            Value::Array(users) => Value::Array(users.into_iter().filter(|u| self.matches(u)).collect()),
            other => other,
        }
    }
}

fn get_users(api: Arc<dyn CustodyApi>) -> Tool {
    let schema = ObjectSchema::strict()
        .field("id", Field::string().optional().describe("Filter users by specific user ID"))
        .field(
            "email",
            Field::string()
                .optional()
                .describe("Filter users by specific email address"),
        )
        .field(
            "query",
            Field::string()
                .optional()
                .describe("Search users by name (firstName + lastName) or email (case-insensitive)"),
        );

    Tool::new(
        "get_users",
        "List all users for the workspace with optional filtering (requires Admin permissions)",
        schema,
        move |filter: UserFilter| {
            let api = api.clone();
            async move {
                let users = api.get_users().await?;
                Ok::<_, ToolError>(filter.apply(users))
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::test_support::StubApi;
    use crate::tools::ToolOutput;
    use serde_json::json;

    fn users() -> Value {
        json!([
            { "id": "1", "firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.com" },
            { "id": "2", "firstName": "Alan", "lastName": "Turing", "email": "Alan@Example.com" },
            { "id": "3", "firstName": "Grace", "email": "grace@navy.mil" }
        ])
    }

    fn ids(value: &Value) -> Vec<&str> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["id"].as_str().unwrap())
            .collect()
    }

    fn filter(id: Option<&str>, email: Option<&str>, query: Option<&str>) -> UserFilter {
        UserFilter {
            id: id.map(str::to_string),
            email: email.map(str::to_string),
            query: query.map(str::to_string),
        }
    }

    #[test]
    fn test_no_filters_returns_everyone() {
        assert_eq!(ids(&UserFilter::default().apply(users())), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_filter_by_id() {
        assert_eq!(ids(&filter(Some("2"), None, None).apply(users())), vec!["2"]);
    }

    #[test]
    fn test_email_is_case_insensitive_exact() {
        assert_eq!(ids(&filter(None, Some("alan@example.com"), None).apply(users())), vec!["2"]);
        assert!(ids(&filter(None, Some("alan@"), None).apply(users())).is_empty());
    }

    #[test]
    fn test_query_matches_name_or_email() {
        assert_eq!(ids(&filter(None, None, Some("ada lov")).apply(users())), vec!["1"]);
        assert_eq!(ids(&filter(None, None, Some("EXAMPLE")).apply(users())), vec!["1", "2"]);
        assert_eq!(ids(&filter(None, None, Some("grace")).apply(users())), vec!["3"]);
    }

    #[test]
    fn test_empty_filters_are_ignored() {
        assert_eq!(ids(&filter(Some(""), Some(""), Some("")).apply(users())), vec!["1", "2", "3"]);
        assert_eq!(ids(&filter(Some(""), None, Some("turing")).apply(users())), vec!["2"]);
    }

    #[test]
    fn test_filters_combine() {
        assert!(ids(&filter(Some("1"), None, Some("turing")).apply(users())).is_empty());
    }

    #[tokio::test]
    async fn test_tool_filters_upstream_list() {
        let api = Arc::new(StubApi::returning(users()));
        let tool = get_users(api.clone());

        let output = tool.invoke(json!({ "query": "turing" })).await.unwrap();
        match output {
            ToolOutput::Json(value) => assert_eq!(ids(&value), vec!["2"]),
            other => panic!("unexpected output: {:?}", other),
        }
        assert_eq!(api.calls().len(), 1);
    }
}
