use std::io::{self, BufRead, Write};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use reportqa_cli::{bootstrap, logging};

fn is_exit(input: &str) -> bool {
    matches!(input.to_lowercase().as_str(), "exit" | "quit" | "q")
}

fn main() -> anyhow::Result<()> {
    logging::init();
    let verbose = std::env::args().skip(1).any(|a| a == "--verbose" || a == "-v");
    let settings = bootstrap::load_settings()?;

    println!("📚 reportqa-chat\n===============");
    println!("Report: {}", settings.report.path);
    let service = bootstrap::build_service(&settings, true)?;
    if !service.is_ready() {
        eprintln!("⚠️  The index could not be built; every answer will be an error.");
    }

    println!("\nChatbot ready. Type 'exit' to quit.");
    println!("Ask questions about the hotel booking report:\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("You: ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if is_exit(input) {
            break;
        }

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::default_spinner());
        spinner.set_message("Retrieving context and generating response");
        spinner.enable_steady_tick(Duration::from_millis(100));

        if verbose {
            let result = service.ask_detailed(input);
            spinner.finish_and_clear();
            match result {
                Ok(ctx) => {
                    for (i, text) in ctx.retrieved_texts.iter().enumerate() {
                        println!("\n  [{}] {}", i + 1, text);
                    }
                    println!("\nChatbot: {}\n", ctx.answer);
                }
                Err(e) => println!("\nError: {}\n", e),
            }
        } else {
            let answer = service.ask(input);
            spinner.finish_and_clear();
            println!("\nChatbot: {}\n", answer);
        }
    }
    println!("Chatbot terminated.");
    Ok(())
}
