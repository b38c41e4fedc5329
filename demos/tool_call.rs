use llmkit::{execute_tool, generate_text, get_all_tools, llm_tool, CompletionOptions};

#[llm_tool(description = "Adds two integers together")]
fn add_numbers(a: i32, b: i32) -> i32 {
    a + b
}

#[llm_tool(description = "Multiplies two floating point numbers")]
fn multiply_numbers(a: f64, b: f64) -> f64 {
    a * b
}

/// Registers two tools via the attribute macro, asks the model a question
/// that should trigger one of them, and runs whatever call comes back.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let add_result = execute_tool("add_numbers", r#"{"a": 5, "b": 7}"#)?;
    println!("direct call: add_numbers(5, 7) = {add_result}");

    let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY is required");
    let opts = CompletionOptions { api_key: Some(api_key), tools: Some(get_all_tools()), ..Default::default() };

    let response = generate_text("openai:gpt-4o-mini", "What is 42 plus 17?", opts).await?;
    if response.tool_calls.is_empty() {
        println!("model answered directly: {}", response.text);
    } else {
        for call in &response.tool_calls {
            let result = execute_tool(&call.function.name, &call.function.arguments)?;
            println!("model called {}({}) = {result}", call.function.name, call.function.arguments);
        }
    }

    Ok(())
}
