//! Interactive export setup
//!
//! Walks the user through choosing an output file, a table and the attributes
//! to export. Attribute candidates come from a sample of the table, so names
//! that only appear in later records can be typed in by hand.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use reedline::{Prompt, PromptEditMode, PromptHistorySearch, Reedline, Signal};

use crate::discovery;
use crate::error::{Result, TableDumpError};
use crate::export::RowSource;

use super::ExportTarget;

/// Source of answers to interactive questions
pub trait LineInput {
    /// Ask `question` and read one line
    ///
    /// # Returns
    /// * `Result<Option<String>>` - Answer, or None on EOF / interrupt
    fn read_line(&mut self, question: &str) -> Result<Option<String>>;
}

/// Line input backed by a reedline editor
pub struct TerminalInput {
    editor: Reedline,
}

impl TerminalInput {
    pub fn new() -> Self {
        Self {
            editor: Reedline::create(),
        }
    }
}

impl Default for TerminalInput {
    fn default() -> Self {
        Self::new()
    }
}

impl LineInput for TerminalInput {
    fn read_line(&mut self, question: &str) -> Result<Option<String>> {
        let prompt = QuestionPrompt::new(question);
        match self.editor.read_line(&prompt) {
            Ok(Signal::Success(line)) => Ok(Some(line)),
            // Ctrl-C / Ctrl-D
            Ok(_) => Ok(None),
            Err(err) => Err(TableDumpError::Generic(format!("Read error: {}", err))),
        }
    }
}

/// Prompt rendering a single question with no indicator
struct QuestionPrompt {
    question: String,
}

impl QuestionPrompt {
    fn new(question: &str) -> Self {
        Self {
            question: question.to_string(),
        }
    }
}

impl Prompt for QuestionPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        self.question.as_str().into()
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        "".into()
    }

    fn render_prompt_indicator(&self, _prompt_mode: PromptEditMode) -> Cow<'_, str> {
        "".into()
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        "... ".into()
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        format!("(search: {}) ", history_search.term).into()
    }
}

/// Parsed answer to a numbered-list question
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The user typed `done`
    Done,

    /// Zero-based picks, plus the 1-based numbers that were out of range
    Picks {
        valid: Vec<usize>,
        out_of_range: Vec<usize>,
    },

    /// Something other than comma-separated numbers
    Invalid,
}

/// Parse a comma-separated list of 1-based numbers against `available` entries
pub fn parse_selection(input: &str, available: usize) -> Selection {
    let input = input.trim();
    if input.eq_ignore_ascii_case("done") {
        return Selection::Done;
    }

    let mut valid = Vec::new();
    let mut out_of_range = Vec::new();

    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.parse::<usize>() {
            Ok(n) if (1..=available).contains(&n) => valid.push(n - 1),
            Ok(n) => out_of_range.push(n),
            Err(_) => return Selection::Invalid,
        }
    }

    if valid.is_empty() && out_of_range.is_empty() {
        return Selection::Invalid;
    }
    Selection::Picks {
        valid,
        out_of_range,
    }
}

/// Timestamped file name used when the user leaves the output blank
pub fn default_output_name(now: DateTime<Local>) -> String {
    format!("export_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Ask for the output file
///
/// A blank answer picks a timestamped name in the current directory.
pub fn prompt_output(input: &mut dyn LineInput) -> Result<Option<PathBuf>> {
    let Some(answer) = input.read_line("Enter output CSV file name: ")? else {
        return Ok(None);
    };

    let answer = answer.trim();
    if answer.is_empty() {
        let name = default_output_name(Local::now());
        println!("Using {}", name);
        return Ok(Some(PathBuf::from(name)));
    }
    Ok(Some(PathBuf::from(answer)))
}

/// Show the tables as a numbered list and ask for one
///
/// # Returns
/// * `Result<Option<String>>` - Chosen table, or None on EOF
pub fn select_table(input: &mut dyn LineInput, tables: &[String]) -> Result<Option<String>> {
    println!("\nAvailable tables:");
    for (i, table) in tables.iter().enumerate() {
        println!("{}. {}", i + 1, table);
    }

    loop {
        let Some(answer) = input.read_line("\nSelect table (enter number): ")? else {
            return Ok(None);
        };

        match answer.trim().parse::<usize>() {
            Ok(n) if (1..=tables.len()).contains(&n) => return Ok(Some(tables[n - 1].clone())),
            Ok(_) => println!(
                "Invalid selection. Please enter a number between 1 and {}",
                tables.len()
            ),
            Err(_) => println!("Please enter a valid number."),
        }
    }
}

/// Pick attributes from the discovered set, then optionally add others by name
///
/// Selection order is output column order. Repeated picks are ignored.
pub fn select_attributes(
    input: &mut dyn LineInput,
    available: &BTreeSet<String>,
) -> Result<Vec<String>> {
    let sorted: Vec<&String> = available.iter().collect();
    let mut selected: Vec<String> = Vec::new();

    println!("\nAvailable attributes:");
    for (i, name) in sorted.iter().enumerate() {
        println!("{}. {}", i + 1, name);
    }

    loop {
        let question =
            "\nSelect attributes (enter numbers separated by commas, or 'done' to finish): ";
        let Some(answer) = input.read_line(question)? else {
            return Ok(selected);
        };

        match parse_selection(&answer, sorted.len()) {
            Selection::Done => break,
            Selection::Picks {
                valid,
                out_of_range,
            } => {
                for index in valid {
                    add_unique(&mut selected, sorted[index]);
                }
                for n in out_of_range {
                    println!("Invalid selection: {}", n);
                }
            }
            Selection::Invalid => println!("Please enter valid numbers separated by commas."),
        }
    }

    let wants_more = input
        .read_line("\nWould you like to add any additional attributes not found in the sample? (y/n): ")?
        .is_some_and(|a| a.trim().eq_ignore_ascii_case("y"));

    if wants_more {
        while let Some(answer) = input.read_line("Enter attribute name (or 'done' to finish): ")? {
            let name = answer.trim();
            if name.eq_ignore_ascii_case("done") {
                break;
            }
            if !name.is_empty() {
                add_unique(&mut selected, name);
            }
        }
    }

    println!("\nSelected attributes: {}", selected.join(", "));
    Ok(selected)
}

fn add_unique(selected: &mut Vec<String>, name: &str) {
    if !selected.iter().any(|s| s == name) {
        selected.push(name.to_string());
        println!("Added: {}", name);
    }
}

/// Drive the whole interactive setup
///
/// `output` and `table` skip their question when already known. Returns None
/// whenever the user backs out or there is nothing to choose from; nothing
/// has been written at that point.
pub async fn run_interactive(
    input: &mut dyn LineInput,
    source: &dyn RowSource,
    sample_size: usize,
    output: Option<PathBuf>,
    table: Option<String>,
) -> Result<Option<ExportTarget>> {
    let output = match output {
        Some(path) => path,
        None => match prompt_output(input)? {
            Some(path) => path,
            None => return Ok(None),
        },
    };

    let table = match table {
        Some(table) => table,
        None => {
            println!("Listing tables...");
            let tables = discovery::list_tables(source).await?;
            if tables.is_empty() {
                println!("No tables found.");
                return Ok(None);
            }
            match select_table(input, &tables)? {
                Some(table) => table,
                None => {
                    println!("No table selected. Exiting.");
                    return Ok(None);
                }
            }
        }
    };

    println!("Sampling table to discover attributes...");
    let available = discovery::discover_attributes(source, &table, sample_size).await?;
    println!("Found {} unique attributes from sample data.", available.len());
    if available.is_empty() {
        println!("No attributes found in table. Exiting.");
        return Ok(None);
    }

    let attributes = select_attributes(input, &available)?;
    if attributes.is_empty() {
        println!("No attributes selected. Exiting.");
        return Ok(None);
    }

    Ok(Some(ExportTarget {
        output,
        table,
        attributes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{MemoryRowSource, Record};
    use chrono::TimeZone;
    use std::collections::VecDeque;

    /// Answers questions from a fixed script
    struct ScriptedInput {
        answers: VecDeque<String>,
        asked: Vec<String>,
    }

    impl ScriptedInput {
        fn new(answers: &[&str]) -> Self {
            Self {
                answers: answers.iter().map(|a| a.to_string()).collect(),
                asked: Vec::new(),
            }
        }
    }

    impl LineInput for ScriptedInput {
        fn read_line(&mut self, question: &str) -> Result<Option<String>> {
            self.asked.push(question.to_string());
            Ok(self.answers.pop_front())
        }
    }

    fn attributes(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("done", 3), Selection::Done);
        assert_eq!(parse_selection(" DONE ", 3), Selection::Done);
        assert_eq!(
            parse_selection("1, 3", 3),
            Selection::Picks {
                valid: vec![0, 2],
                out_of_range: vec![]
            }
        );
        assert_eq!(
            parse_selection("2,9", 3),
            Selection::Picks {
                valid: vec![1],
                out_of_range: vec![9]
            }
        );
        assert_eq!(parse_selection("1,x", 3), Selection::Invalid);
        assert_eq!(parse_selection("", 3), Selection::Invalid);
    }

    #[test]
    fn test_default_output_name() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(default_output_name(now), "export_20240309_140507.csv");
    }

    #[test]
    fn test_select_table_retries_until_valid() {
        let tables = vec!["orders".to_string(), "users".to_string()];
        let mut input = ScriptedInput::new(&["abc", "5", "2"]);

        let table = select_table(&mut input, &tables).unwrap();
        assert_eq!(table.as_deref(), Some("users"));
        assert_eq!(input.asked.len(), 3);
    }

    #[test]
    fn test_select_table_eof() {
        let tables = vec!["orders".to_string()];
        let mut input = ScriptedInput::new(&[]);
        assert!(select_table(&mut input, &tables).unwrap().is_none());
    }

    #[test]
    fn test_select_attributes_keeps_order_and_skips_duplicates() {
        let available = attributes(&["email", "id", "name"]);
        let mut input = ScriptedInput::new(&["2,3", "2", "1", "done", "n"]);

        let selected = select_attributes(&mut input, &available).unwrap();
        assert_eq!(selected, vec!["id", "name", "email"]);
    }

    #[test]
    fn test_select_attributes_with_extra_names() {
        let available = attributes(&["id"]);
        let mut input = ScriptedInput::new(&["1", "done", "y", "zip", "", "id", "zip", "done"]);

        let selected = select_attributes(&mut input, &available).unwrap();
        assert_eq!(selected, vec!["id", "zip"]);
    }

    #[test]
    fn test_prompt_output_blank_uses_default_name() {
        let mut input = ScriptedInput::new(&["  "]);
        let path = prompt_output(&mut input).unwrap().unwrap();
        let name = path.to_string_lossy();
        assert!(name.starts_with("export_") && name.ends_with(".csv"));

        let mut input = ScriptedInput::new(&["out.csv"]);
        assert_eq!(
            prompt_output(&mut input).unwrap(),
            Some(PathBuf::from("out.csv"))
        );
    }

    #[tokio::test]
    async fn test_run_interactive_full_flow() {
        let source = MemoryRowSource::new()
            .with_table("audit", Vec::new())
            .with_table(
                "users",
                vec![
                    Record::new().with("id", "1").with("name", "Ann"),
                    Record::new().with("id", "2").with("email", "b@example.com"),
                ],
            );
        // tables: audit, users; attributes: email, id, name
        let mut input = ScriptedInput::new(&["people.csv", "2", "2,3", "done", "n"]);

        let target = run_interactive(&mut input, &source, 100, None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(target.output, PathBuf::from("people.csv"));
        assert_eq!(target.table, "users");
        assert_eq!(target.attributes, vec!["id", "name"]);
    }

    #[tokio::test]
    async fn test_run_interactive_empty_selection_aborts() {
        let source =
            MemoryRowSource::new().with_table("users", vec![Record::new().with("id", "1")]);
        let mut input = ScriptedInput::new(&["done", "n"]);

        let target = run_interactive(
            &mut input,
            &source,
            100,
            Some(PathBuf::from("out.csv")),
            Some("users".to_string()),
        )
        .await
        .unwrap();
        assert!(target.is_none());
    }

    #[tokio::test]
    async fn test_run_interactive_no_attributes() {
        let source = MemoryRowSource::new().with_table("audit", Vec::new());
        let mut input = ScriptedInput::new(&[]);

        let target = run_interactive(
            &mut input,
            &source,
            100,
            Some(PathBuf::from("out.csv")),
            Some("audit".to_string()),
        )
        .await
        .unwrap();
        assert!(target.is_none());
        assert!(input.asked.is_empty());
    }
}
