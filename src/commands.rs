use arboard::Clipboard;
use dialoguer::{theme::ColorfulTheme, Select};

use crate::response::{pretty_print, CodeBlock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    Clear,
    Role,
    History,
    Copy,
    CopyAll,
    Code,
    Unknown(String),
}

pub fn is_command(input: &str) -> bool {
    input
        .trim()
        .strip_prefix('/')
        .map(|rest| !rest.is_empty() && !rest.contains(' '))
        .unwrap_or(false)
}

pub fn parse_command(input: &str) -> Command {
    match input.trim() {
        "/exit" | "/quit" => Command::Exit,
        "/clear" => Command::Clear,
        "/role" => Command::Role,
        "/history" => Command::History,
        "/copy" => Command::Copy,
        "/copy_all" => Command::CopyAll,
        "/code" => Command::Code,
        other => Command::Unknown(other.to_string()),
    }
}

/// Runs the commands that only touch the terminal or clipboard.
/// `Exit`, `Role` and `History` need session state and are left to the caller.
pub fn handle_command(cmd: &Command, code_blocks: &[CodeBlock]) {
    match cmd {
        Command::Exit | Command::Role | Command::History => {}
        Command::Clear => print!("\x1B[2J\x1B[1;1H"),
        Command::Copy => {
            if code_blocks.is_empty() {
                println!("No code blocks to copy.");
                return;
            }

            let selections: Vec<String> = code_blocks.iter().map(selection_label).collect();
            let selection = match Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Select code block to copy")
                .items(&selections)
                .default(0)
                .interact()
            {
                Ok(selection) => selection,
                Err(err) => {
                    eprintln!("Selection failed: {}", err);
                    return;
                }
            };

            if copy_to_clipboard(&code_blocks[selection].code) {
                println!("Code block copied to clipboard");
            }
        }
        Command::CopyAll => {
            if code_blocks.is_empty() {
                println!("No code blocks to copy.");
                return;
            }

            if copy_to_clipboard(&join_code_blocks(code_blocks)) {
                println!("All code blocks copied to clipboard");
            }
        }
        Command::Code => {
            if code_blocks.is_empty() {
                println!("No code blocks in the last reply.");
                return;
            }
            for block in code_blocks {
                pretty_print(block);
                println!();
            }
        }
        Command::Unknown(name) => println!("Unknown command: {}", name),
    }
}

pub fn join_code_blocks(code_blocks: &[CodeBlock]) -> String {
    code_blocks
        .iter()
        .map(|block| block.code.trim_end())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn selection_label(block: &CodeBlock) -> String {
    let first_line = block.code.lines().next().unwrap_or_default();
    match &block.language {
        Some(language) => format!("[{}] {}", language, first_line),
        None => first_line.to_string(),
    }
}

fn copy_to_clipboard(text: &str) -> bool {
    match Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text.to_string())) {
        Ok(()) => true,
        Err(err) => {
            eprintln!("Failed to access clipboard: {}", err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_command() {
        assert!(is_command("/exit"));
        assert!(is_command("  /copy_all "));
        assert!(!is_command("/"));
        assert!(!is_command("/not a command"));
        assert!(!is_command("hello /exit"));
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/quit"), Command::Exit);
        assert_eq!(parse_command("/role"), Command::Role);
        assert_eq!(parse_command("/code"), Command::Code);
        assert_eq!(parse_command("/nope"), Command::Unknown("/nope".to_string()));
    }

    #[test]
    fn test_join_and_label() {
        let blocks = vec![
            CodeBlock {
                language: Some("sh".to_string()),
                code: "ls -la\n".to_string(),
            },
            CodeBlock {
                language: None,
                code: "echo hi\n".to_string(),
            },
        ];
        assert_eq!(join_code_blocks(&blocks), "ls -la\n\necho hi");
        assert_eq!(selection_label(&blocks[0]), "[sh] ls -la");
        assert_eq!(selection_label(&blocks[1]), "echo hi");
    }
}
