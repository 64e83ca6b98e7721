//! `delve chat` - Interactive research session or a single query.

use delve_agent::ResearchAgent;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Characters of a tool description shown by the `tools` command.
const TOOL_DESCRIPTION_CHARS: usize = 100;

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Empty,
    History,
    Context,
    Tools,
    Files,
    Stats,
    Info,
    Clear,
    Help,
    Quit,
    Query(String),
}

impl ChatCommand {
    /// Keywords match case-insensitively; anything else is a query.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line.to_lowercase().as_str() {
            "" => Self::Empty,
            "history" => Self::History,
            "context" => Self::Context,
            "tools" => Self::Tools,
            "files" => Self::Files,
            "stats" => Self::Stats,
            "info" => Self::Info,
            "clear" => Self::Clear,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => Self::Query(line.to_string()),
        }
    }
}

pub async fn run(message: Option<String>, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let mut agent = super::build_agent(&config, verbose).await?;

    if let Some(query) = message {
        eprint!("  Researching...");
        let outcome = agent.research(&query).await?;
        eprint!("\r                \r");
        println!("{}", outcome.answer);
        return Ok(());
    }

    print_banner();
    print_example_queries();

    let info = agent.info();
    println!("Agent ready! Framework: {}, LLM: {}", info.framework, info.llm);
    println!("Tools available: {}", info.tools.join(", "));
    println!("\nWhat would you like to investigate?\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!("\n\nResearch session interrupted. Goodbye!");
                break;
            }
        };
        let Some(line) = line else {
            println!();
            break;
        };

        if !dispatch(&mut agent, ChatCommand::parse(&line)).await {
            println!("\nThank you for using Delve!");
            break;
        }
    }

    Ok(())
}

fn prompt() -> std::io::Result<()> {
    use std::io::Write;
    print!("Research Query: ");
    std::io::stdout().flush()
}

/// Handle one command. Returns `false` when the session should end.
async fn dispatch(agent: &mut ResearchAgent, command: ChatCommand) -> bool {
    match command {
        ChatCommand::Empty => {}
        ChatCommand::Quit => return false,
        ChatCommand::Clear => {
            agent.clear_memory();
            println!("Conversation memory cleared.\n");
        }
        ChatCommand::History => println!("\n{}\n", agent.conversation_history()),
        ChatCommand::Context => println!("\nCurrent Research Context:\n{}\n", agent.research_context()),
        ChatCommand::Tools => {
            println!("\nAvailable Tools:");
            for tool in agent.available_tools() {
                println!("• {}: {}", tool.name, shorten(&tool.description, TOOL_DESCRIPTION_CHARS));
            }
            println!();
        }
        ChatCommand::Files => println!("\nGenerated Files:\n{}\n", agent.list_generated_files().await),
        ChatCommand::Stats => {
            let stats = agent.memory_stats();
            println!("\nMemory Statistics:");
            println!("• total_messages: {}", stats.total_messages);
            println!("• human_messages: {}", stats.human_messages);
            println!("• assistant_messages: {}", stats.assistant_messages);
            println!("• research_topics_count: {}", stats.research_topics_count);
            println!("• has_session_summary: {}", stats.has_session_summary);
            println!();
        }
        ChatCommand::Info => {
            println!("\nAgent Configuration:");
            match serde_json::to_string_pretty(&agent.info()) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("  [Error] {e}"),
            }
            println!();
        }
        ChatCommand::Help => print_example_queries(),
        ChatCommand::Query(query) => {
            println!("\nResearching: {query}\n");
            match agent.research(&query).await {
                Ok(outcome) => {
                    println!("Research Results:");
                    println!("{}", "-".repeat(50));
                    println!("{}", outcome.answer);
                    println!("{}", "-".repeat(50));
                    if outcome.truncated {
                        println!("(stopped after {} reasoning steps)", outcome.iterations);
                    }
                    println!();
                }
                Err(e) => {
                    eprintln!("\nError during research: {e}");
                    eprintln!("Please try rephrasing your query or check your connection.\n");
                }
            }
        }
    }
    true
}

fn shorten(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn print_banner() {
    println!("{}", "=".repeat(70));
    println!("Delve Research Assistant");
    println!("{}", "=".repeat(70));
    println!("Capabilities:");
    println!("• Web search and information retrieval");
    println!("• Mathematical calculations");
    println!("• Research report generation");
    println!("• Conversation context and research continuity");
    println!();
    println!("Commands:");
    println!("• Type your research question");
    println!("• 'history' - View conversation history");
    println!("• 'context' - Show current research context");
    println!("• 'tools' - List available tools");
    println!("• 'files' - List generated files");
    println!("• 'stats' - Show memory statistics");
    println!("• 'info' - Show agent configuration");
    println!("• 'clear' - Clear conversation memory");
    println!("• 'help' - Show example queries");
    println!("• 'quit' or 'exit' - Exit the application");
    println!("{}", "=".repeat(70));
}

fn print_example_queries() {
    println!("\nExample queries:");
    println!();
    println!("Web Research:");
    println!("  • 'Research the latest developments in quantum computing'");
    println!("  • 'Analyze current trends in renewable energy adoption'");
    println!();
    println!("Calculations:");
    println!("  • 'What is 15% of 2400?'");
    println!("  • 'Calculate (1250 - 980) / 980 * 100'");
    println!();
    println!("Reports:");
    println!("  • 'Create a report on cybersecurity trends'");
    println!("  • 'Research electric vehicle adoption and create a summary report'");
    println!();
}
