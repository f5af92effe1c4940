use console::{style, Term};
use dialoguer::{theme::ColorfulTheme, BasicHistory, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::env;
use std::io::Write;
use std::time::Duration;
use tokio::runtime::Runtime;

use role_chat::client::RelayClient;
use role_chat::commands::{handle_command, is_command, parse_command, Command};
use role_chat::data::CommandCompletion;
use role_chat::history::{History, Transcript};
use role_chat::models::{ChatTurn, Speaker};
use role_chat::response::{
    erase_partial, extract_code_blocks, process_response, CodeBlock, ERROR_NOTICE,
};

const ASSISTANT_PREFIX: &str = "🤖 ";

fn print_nicely_formatted_history(history: &[ChatTurn]) {
    for turn in history {
        match turn.role {
            Speaker::User => println!("👤 User: {}", turn.content),
            Speaker::Assistant => println!("{}Assistant: {}", ASSISTANT_PREFIX, turn.content),
        }
        println!();
    }
}

fn pick_role(roles: &[String]) -> Option<String> {
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select your expert consultant")
        .items(roles)
        .default(0)
        .interact()
        .ok()?;
    roles.get(selection).cloned()
}

fn greet(role: &str) -> ChatTurn {
    let greeting = ChatTurn::assistant(&format!(
        "Hello! I am your {}. How can I assist you today?",
        role
    ));
    println!(
        "{}{}\n",
        ASSISTANT_PREFIX,
        style(&greeting.content).cyan()
    );
    greeting
}

fn spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message("Thinking...");
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn main() {
    let rt = match Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };
    let client = RelayClient::from_env();
    let term = Term::stdout();

    let mut transcript = Transcript::new(
        env::var("CHAT_TRANSCRIPT")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(History::new),
    );

    if let Some(file) = transcript.file() {
        match file.load_turns() {
            Ok(turns) if !turns.is_empty() => {
                println!("Previous conversation:");
                print_nicely_formatted_history(&turns);
            }
            Ok(_) => {}
            Err(e) => eprintln!("Failed to load transcript: {}", e),
        }
    }

    let roles = rt.block_on(client.roles());
    let Some(mut role) = pick_role(&roles) else {
        return;
    };
    transcript.push_greeting(greet(&role));

    let mut history = BasicHistory::new().max_entries(99).no_duplicates(false);
    let completion = CommandCompletion::default();
    let mut code_blocks: Vec<CodeBlock> = Vec::new();

    loop {
        let input = match Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(role.as_str())
            .completion_with(&completion)
            .history_with(&mut history)
            .interact_text()
        {
            Ok(input) => input,
            Err(_) => break,
        };

        if input.trim().is_empty() {
            continue;
        }

        if is_command(&input) {
            match parse_command(&input) {
                Command::Exit => break,
                Command::History => print_nicely_formatted_history(transcript.turns()),
                Command::Role => {
                    if let Some(picked) = pick_role(&roles) {
                        role = picked;
                        code_blocks.clear();
                        transcript.push_greeting(greet(&role));
                    }
                }
                other => handle_command(&other, &code_blocks),
            }
            continue;
        }

        transcript.record(ChatTurn::user(&input));

        let bar = spinner();
        let stream = match rt.block_on(client.send_message(&role, &input)) {
            Ok(stream) => stream,
            Err(err) => {
                bar.finish_and_clear();
                println!("{}{}\n", ASSISTANT_PREFIX, style(err.to_string()).red());
                code_blocks.clear();
                transcript.record_failure();
                continue;
            }
        };

        let mut stdout = std::io::stdout();
        let reply = rt.block_on(process_response(stream, &mut stdout, || {
            bar.finish_and_clear();
            print!("{}", ASSISTANT_PREFIX);
        }));
        bar.finish_and_clear();

        match reply {
            Ok(content) => {
                println!("\n");
                code_blocks = extract_code_blocks(&content);
                transcript.record(ChatTurn::assistant(&content));
            }
            Err(aborted) => {
                if !aborted.partial.is_empty() {
                    let printed = format!("{}{}", ASSISTANT_PREFIX, aborted.partial);
                    if let Err(e) = erase_partial(&term, &printed) {
                        eprintln!("\nFailed to clear terminal: {}", e);
                    }
                }
                code_blocks.clear();
                println!("{}{}\n", ASSISTANT_PREFIX, style(ERROR_NOTICE).red());
                transcript.record_failure();
                print_detail(&aborted.error.to_string());
            }
        }
        let _ = std::io::stdout().flush();
    }
}

fn print_detail(detail: &str) {
    eprintln!("{}", style(format!("({})", detail)).dim());
}
