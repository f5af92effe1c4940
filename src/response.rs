use bat::PrettyPrinter;
use console::{measure_text_width, Term};
use futures_util::{Stream, StreamExt};
use std::io::{self, Write};

use crate::client::ClientError;

pub const ERROR_NOTICE: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub code: String,
}

/// A reply that broke off mid-stream.
#[derive(Debug)]
pub struct Aborted {
    pub partial: String,
    pub error: ClientError,
}

/// Writes fragments to `out` as they arrive and returns the full reply.
///
/// `on_first` runs once, right before the first fragment is written.
pub async fn process_response<S, W, F>(
    stream: S,
    out: &mut W,
    on_first: F,
) -> Result<String, Aborted>
where
    S: Stream<Item = Result<String, ClientError>>,
    W: Write,
    F: FnOnce(),
{
    let mut stream = std::pin::pin!(stream);
    let mut on_first = Some(on_first);
    let mut full_response = String::new();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(content) => {
                if let Some(f) = on_first.take() {
                    f();
                }
                full_response.push_str(&content);
                // a closed terminal does not abort the reply
                let _ = write!(out, "{}", content);
                let _ = out.flush();
            }
            Err(error) => {
                return Err(Aborted {
                    partial: full_response,
                    error,
                })
            }
        }
    }
    Ok(full_response)
}

/// Number of terminal rows `text` occupies when printed from column 0.
pub fn printed_rows(text: &str, width: usize) -> usize {
    let width = width.max(1);
    text.split('\n')
        .map(|line| {
            let w = measure_text_width(line);
            if w == 0 {
                1
            } else {
                (w + width - 1) / width
            }
        })
        .sum()
}

/// Removes a partially printed reply, cursor assumed on its last row.
pub fn erase_partial(term: &Term, printed: &str) -> io::Result<()> {
    let (_, cols) = term.size();
    let rows = printed_rows(printed, cols as usize);
    term.clear_line()?;
    if rows > 1 {
        term.clear_last_lines(rows - 1)?;
    }
    Ok(())
}

/// Fenced code blocks of a completed reply, in order. An unclosed fence
/// at the end is still returned.
pub fn extract_code_blocks(content: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<CodeBlock> = None;

    for line in content.lines() {
        let trimmed = line.trim();
        match current.take() {
            Some(block) if trimmed == "```" => blocks.push(block),
            Some(mut block) => {
                block.code.push_str(line);
                block.code.push('\n');
                current = Some(block);
            }
            None => {
                if let Some(info) = trimmed.strip_prefix("```") {
                    let language = info.split_whitespace().next().map(String::from);
                    current = Some(CodeBlock {
                        language,
                        code: String::new(),
                    });
                }
            }
        }
    }

    if let Some(block) = current {
        if !block.code.is_empty() {
            blocks.push(block);
        }
    }
    blocks
}

pub fn pretty_print(block: &CodeBlock) {
    let language = block.language.as_deref().unwrap_or("txt");
    let printed = PrettyPrinter::new()
        .input_from_bytes(block.code.as_bytes())
        .language(language)
        .print();

    if printed.is_err() {
        print!("{}", block.code);
        let _ = io::stdout().flush();
    }
}
