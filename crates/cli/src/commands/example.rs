//! `delve example` - Scripted demo session.

const QUERIES: [&str; 3] = [
    "Research the latest trends in artificial intelligence",
    "Calculate the compound growth of $1000 growing to $2500 over 8 years: (2500 / 1000) ** (1 / 8)",
    "Create a report on quantum computing developments",
];

const PREVIEW_CHARS: usize = 300;

pub async fn run(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let mut agent = super::build_agent(&config, verbose).await?;

    println!("\nRunning example research session...\n");
    let info = agent.info();
    println!("Agent: {} with {}", info.framework, info.llm);
    println!("Tools: {}\n", info.tools.join(", "));

    for (i, query) in QUERIES.iter().enumerate() {
        println!("Example {}: {query}", i + 1);
        match agent.research(query).await {
            Ok(outcome) => {
                let preview: String = outcome.answer.chars().take(PREVIEW_CHARS).collect();
                println!("Response: {preview}...\n");
            }
            Err(e) => println!("Error: {e}\n"),
        }
        println!("{}", "-".repeat(60));
    }

    let stats = agent.memory_stats();
    println!("\nSession Statistics:");
    println!("• total_messages: {}", stats.total_messages);
    println!("• research_topics_count: {}", stats.research_topics_count);

    println!("\nGenerated Files:\n{}", agent.list_generated_files().await);
    println!("\nExample session completed!");
    Ok(())
}
