use llmkit::{generate_text, stream_text, CompletionOptions};

/// Sends a single prompt and prints the buffered response, then repeats the
/// request in streaming mode and prints deltas as they arrive.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY is required");
    let opts = CompletionOptions { api_key: Some(api_key), ..Default::default() };

    let response = generate_text("openai:gpt-4o-mini", "Say hello in one sentence.", opts.clone()).await?;
    println!("buffered: {}", response.text);

    let mut stream = stream_text("openai:gpt-4o-mini", "Count from one to five.", opts).await?;
    print!("streamed: ");
    while let Some(chunk) = stream.next().await {
        if let llmkit::Chunk::Text(delta) = chunk? {
            print!("{delta}");
        }
    }
    println!();

    Ok(())
}
