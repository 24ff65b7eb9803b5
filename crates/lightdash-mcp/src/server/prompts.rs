//! Canned prompts for common Lightdash workflows.

use rmcp::model::{GetPromptResult, JsonObject, Prompt, PromptArgument, PromptMessage, PromptMessageRole};

fn argument(name: &str, description: &str, required: bool) -> PromptArgument {
    PromptArgument {
        name: name.to_string(),
        title: None,
        description: Some(description.to_string()),
        required: Some(required),
    }
}

/// Every prompt the server offers.
pub fn list_prompts() -> Vec<Prompt> {
    vec![
        Prompt::new(
            "explore_data",
            Some("Discover what a project contains and answer a question from its data"),
            Some(vec![
                argument("project_uuid", "Project to explore (defaults to the configured one)", false),
                argument("question", "Business question to answer", false),
            ]),
        ),
        Prompt::new(
            "build_query",
            Some("Build and run a query against one explore"),
            Some(vec![
                argument("explore_id", "Explore (table) to query, e.g. orders", true),
                argument("goal", "What the query should show", false),
            ]),
        ),
        Prompt::new(
            "debug_query_error",
            Some("Work out why a query failed and how to fix it"),
            Some(vec![argument("error", "The error message returned by run_query", true)]),
        ),
    ]
}

/// String value of an argument; blank counts as absent.
fn arg(args: &JsonObject, name: &str) -> Option<String> {
    let value = args.get(name)?;
    let text = value
        .as_str()
        .map_or_else(|| value.to_string(), str::to_string);
    (!text.trim().is_empty()).then_some(text)
}

fn required_arg(args: &JsonObject, prompt: &str, name: &str) -> Result<String, String> {
    arg(args, name).ok_or_else(|| format!("prompt `{prompt}` requires the `{name}` argument"))
}

/// Render the prompt `name` with `args`.
pub fn get_prompt(name: &str, args: &JsonObject) -> Result<GetPromptResult, String> {
    let (description, text) = match name {
        "explore_data" => {
            let project = arg(args, "project_uuid").map_or_else(
                || "the default project".to_string(),
                |p| format!("project {p}"),
            );
            let question = arg(args, "question").map_or_else(
                || "Summarize what data is available and suggest useful questions.".to_string(),
                |q| format!("Answer this question: {q}"),
            );
            (
                "Explore a Lightdash project",
                format!(
                    "You are exploring {project} in Lightdash.\n\n\
                     1. Call list_explores to see the queryable tables.\n\
                     2. Call get_explore on the relevant explores to learn their dimensions and metrics.\n\
                     3. Check list_charts and list_dashboards for existing work before building new queries.\n\
                     4. Use run_query with the smallest set of fields and a modest limit.\n\n\
                     {question}"
                ),
            )
        }
        "build_query" => {
            let explore = required_arg(args, name, "explore_id")?;
            let goal = arg(args, "goal").map_or_else(String::new, |g| format!("\nGoal: {g}\n"));
            (
                "Build a query",
                format!(
                    "Build a query against the `{explore}` explore.\n{goal}\n\
                     1. Call get_explore with explore_id `{explore}` and pick dimensions and metrics by field ID.\n\
                     2. Field names may be short (\"status\"); they are qualified as `{explore}_status`.\n\
                     3. Filters look like {{\"dimensions\": {{\"and\": [{{\"target\": {{\"fieldId\": \"status\"}}, \"operator\": \"equals\", \"values\": [\"completed\"]}}]}}}}.\n\
                     4. Call analyze_query first if the query has many fields or a large limit.\n\
                     5. Call run_query and present the rows."
                ),
            )
        }
        "debug_query_error" => {
            let error = required_arg(args, name, "error")?;
            (
                "Debug a failed query",
                format!(
                    "A Lightdash query failed with:\n\n{error}\n\n\
                     Work through the likely causes:\n\
                     - Unknown field IDs: compare every dimension and metric with get_explore.\n\
                     - Unknown explore: check the name with list_explores.\n\
                     - Filter shape: filters need `dimensions`/`metrics` groups with `and`/`or` lists.\n\
                     - 401/403: the API key lacks access to this project.\n\
                     Then propose a corrected query."
                ),
            )
        }
        other => return Err(format!("unknown prompt: {other}")),
    };

    Ok(GetPromptResult {
        description: Some(description.to_string()),
        messages: vec![PromptMessage::new_text(PromptMessageRole::User, text)],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::PromptMessageContent;
    use serde_json::json;

    fn args(value: serde_json::Value) -> JsonObject {
        value.as_object().cloned().unwrap_or_default()
    }

    fn text_of(result: &GetPromptResult) -> &str {
        match &result.messages[0].content {
            PromptMessageContent::Text { text } => text,
            other => panic!("expected text content, got {other:?}"),
        }
    }

    #[test]
    fn lists_three_prompts() {
        let names: Vec<_> = list_prompts().into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["explore_data", "build_query", "debug_query_error"]);
    }

    #[test]
    fn explore_data_works_without_arguments() {
        let result = get_prompt("explore_data", &JsonObject::new()).unwrap();
        assert!(text_of(&result).contains("the default project"));
    }

    #[test]
    fn build_query_interpolates_explore() {
        let result = get_prompt(
            "build_query",
            &args(json!({"explore_id": "orders", "goal": "revenue by month"})),
        )
        .unwrap();
        let text = text_of(&result);
        assert!(text.contains("`orders` explore"));
        assert!(text.contains("orders_status"));
        assert!(text.contains("revenue by month"));
    }

    #[test]
    fn missing_required_argument_is_an_error() {
        let err = get_prompt("build_query", &JsonObject::new()).unwrap_err();
        assert!(err.contains("explore_id"));

        let err = get_prompt("debug_query_error", &args(json!({"error": "  "}))).unwrap_err();
        assert!(err.contains("error"));
    }

    #[test]
    fn debug_query_error_quotes_the_error() {
        let result = get_prompt(
            "debug_query_error",
            &args(json!({"error": "Lightdash API error: Field not found (HTTP 400)"})),
        )
        .unwrap();
        assert!(text_of(&result).contains("Field not found"));
    }

    #[test]
    fn unknown_prompt_is_an_error() {
        assert!(get_prompt("nope", &JsonObject::new()).is_err());
    }
}
