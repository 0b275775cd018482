//! Quote pricing CLI - evaluate and maintain calculated-column formulas

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use quote_pricing::prelude::*;
use quote_pricing::{
    evaluate_rule_with_fallback, remove_column_from_expression, Evaluation, EvaluationContext,
    FALLBACK_VALUE,
};
use serde_json::json;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Parser)]
#[command(name = "qprice")]
#[command(
    author,
    version,
    about = "Evaluate and maintain pricing-table formulas"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a rule against one row
    Eval {
        /// Rule JSON file
        #[arg(long)]
        rule: PathBuf,

        /// Row JSON file
        #[arg(long)]
        row: PathBuf,

        /// Calculated column being computed (resolves the cell value marker)
        #[arg(long)]
        column: Option<String>,

        /// Value reported when the rule fails
        #[arg(long, default_value_t = FALLBACK_VALUE, allow_negative_numbers = true)]
        fallback: f64,

        /// Exit with an error instead of printing the fallback value
        #[arg(long)]
        strict: bool,
    },

    /// Rewrite a rule as if a column had been deleted
    RemoveColumn {
        /// Rule JSON file
        #[arg(long)]
        rule: PathBuf,

        /// Deleted column id
        #[arg(long)]
        column: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Recalculate every calculated cell of a table
    #[command(alias = "calc")]
    Recalc {
        /// Pricing table JSON file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Value written to cells whose formula fails
        #[arg(long, default_value_t = FALLBACK_VALUE, allow_negative_numbers = true)]
        fallback: f64,

        /// Only update calculated cells that already exist in a row
        #[arg(long)]
        no_insert: bool,
    },

    /// Set an input cell and recalculate the cells depending on it
    Edit {
        /// Pricing table JSON file
        input: PathBuf,

        /// Row id
        #[arg(long)]
        row: String,

        /// Input column id
        #[arg(long)]
        column: String,

        /// New value
        #[arg(long, allow_negative_numbers = true)]
        value: f64,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a column, rewriting the rules that reference it
    DeleteColumn {
        /// Pricing table JSON file
        input: PathBuf,

        /// Column id to delete
        #[arg(long)]
        column: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a table for circular and dangling column references
    Check {
        /// Pricing table JSON file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Eval {
            rule,
            row,
            column,
            fallback,
            strict,
        } => eval(&rule, &row, column.as_deref(), fallback, strict),
        Commands::RemoveColumn {
            rule,
            column,
            output,
        } => remove_column(&rule, &column, output.as_deref()),
        Commands::Recalc {
            input,
            output,
            fallback,
            no_insert,
        } => {
            let options = CalculationOptions {
                fallback_value: fallback,
                insert_missing_cells: !no_insert,
                ..Default::default()
            };
            recalc(&input, output.as_deref(), &options)
        }
        Commands::Edit {
            input,
            row,
            column,
            value,
            output,
        } => edit(&input, &row, &column, value, output.as_deref()),
        Commands::DeleteColumn {
            input,
            column,
            output,
        } => delete_column(&input, &column, output.as_deref()),
        Commands::Check { input } => check(&input),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {} from '{}'", what, path.display()))
}

fn open_table(path: &Path) -> Result<PricingTable> {
    PricingTable::open(path).with_context(|| format!("Failed to open '{}'", path.display()))
}

fn write_output(text: &str, output: Option<&Path>) -> Result<()> {
    if let Some(output_path) = output {
        std::fs::write(output_path, text)
            .with_context(|| format!("Failed to write '{}'", output_path.display()))?;
        eprintln!("Wrote '{}'", output_path.display());
    } else {
        let mut stdout = io::stdout();
        stdout
            .write_all(text.as_bytes())
            .and_then(|_| stdout.write_all(b"\n"))
            .context("Failed to write to stdout")?;
    }
    Ok(())
}

fn report_diagnostics(diagnostics: &[CellDiagnostic]) {
    for diagnostic in diagnostics {
        eprintln!(
            "Warning: row {} column {}: {} [{}]",
            diagnostic.row, diagnostic.column_id, diagnostic.error, diagnostic.rule
        );
    }
}

fn evaluate_files(
    rule_path: &Path,
    row_path: &Path,
    column: Option<&str>,
    fallback: f64,
) -> Result<(RuleModel, Evaluation)> {
    if !fallback.is_finite() {
        bail!("Fallback value must be a finite number, got {}", fallback);
    }
    let rule: RuleModel = read_json(rule_path, "rule")?;
    let row: ProductRow = read_json(row_path, "row")?;

    let ctx = match column {
        Some(column_id) => EvaluationContext::for_column(&row, column_id),
        None => EvaluationContext::new(&row),
    };
    let evaluation = evaluate_rule_with_fallback(&rule, &ctx, fallback);
    Ok((rule, evaluation))
}

fn eval(
    rule_path: &Path,
    row_path: &Path,
    column: Option<&str>,
    fallback: f64,
    strict: bool,
) -> Result<()> {
    let (rule, evaluation) = evaluate_files(rule_path, row_path, column, fallback)?;

    if strict {
        if let Some(error) = &evaluation.error {
            bail!("Evaluation of '{}' failed: {}", rule, error);
        }
    }

    let report = json!({
        "value": evaluation.value,
        "error": evaluation.error,
    });
    write_output(&serde_json::to_string_pretty(&report)?, None)
}

fn remove_column(rule_path: &Path, column: &str, output: Option<&Path>) -> Result<()> {
    let rule: RuleModel = read_json(rule_path, "rule")?;
    let rewritten = remove_column_from_expression(column, &rule);

    if rewritten == rule {
        eprintln!("Rule does not reference column '{}'", column);
    }

    write_output(&serde_json::to_string_pretty(&rewritten)?, output)
}

fn recalc(input: &Path, output: Option<&Path>, options: &CalculationOptions) -> Result<()> {
    let mut table = open_table(input)?;
    let stats = table
        .calculate_with_options(options)
        .context("Failed to calculate table")?;

    eprintln!(
        "Calculated {} cells in {} rows ({} errors)",
        stats.cells_calculated, stats.rows_calculated, stats.errors
    );
    report_diagnostics(&stats.diagnostics);

    write_output(&table.to_json()?, output)
}

fn edit(input: &Path, row: &str, column: &str, value: f64, output: Option<&Path>) -> Result<()> {
    let mut table = open_table(input)?;
    let stats = table
        .on_cell_edited(row, column, value)
        .with_context(|| format!("Failed to edit row '{}' column '{}'", row, column))?;

    eprintln!("Recalculated {} cells", stats.cells_calculated);
    report_diagnostics(table.diagnostics());

    write_output(&table.to_json()?, output)
}

fn delete_column(input: &Path, column: &str, output: Option<&Path>) -> Result<()> {
    let mut table = open_table(input)?;
    let removal = table
        .on_column_deleted(column)
        .with_context(|| format!("Failed to delete column '{}'", column))?;

    if removal.rewritten_rules.is_empty() {
        eprintln!("Deleted column '{}'", column);
    } else {
        eprintln!(
            "Deleted column '{}', rewrote rules of: {}",
            column,
            removal.rewritten_rules.join(", ")
        );
    }
    report_diagnostics(&removal.stats.diagnostics);

    write_output(&table.to_json()?, output)
}

/// Problems found in a table's schema
fn table_problems(table: &PricingTable) -> Vec<String> {
    let mut problems = Vec::new();

    if let Err(err) = table.dependency_graph().calculation_order() {
        problems.push(err.to_string());
    }
    for dangling in table.dangling_references() {
        problems.push(format!(
            "Column '{}' references unknown column '{}'",
            dangling.column_id, dangling.missing_column_id
        ));
    }

    problems
}

fn check(input: &Path) -> Result<()> {
    let table = open_table(input)?;
    let problems = table_problems(&table);

    for problem in &problems {
        println!("{}", problem);
    }
    if !problems.is_empty() {
        bail!("{} problem(s) found in '{}'", problems.len(), input.display());
    }

    println!(
        "OK: {} columns ({} calculated), {} rows",
        table.columns.len(),
        table.calculated_columns().count(),
        table.rows.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TABLE: &str = r#"{
        "columns": [
            { "id": "qty" },
            { "id": "total", "rule": { "expression": {
                "type": "operation", "operation": "multiply",
                "args": [
                    { "type": "columnReference", "columnId": "qty" },
                    { "type": "columnReference", "columnId": "unitCost" }
                ]
            } } }
        ],
        "rows": [ { "id": "r1", "cells": [ { "columnID": "qty", "value": 3 } ] } ]
    }"#;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();

        let cli = Cli::parse_from([
            "qprice", "-vv", "edit", "t.json", "--row", "r1", "--column", "qty", "--value", "-2",
        ]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Edit { value, .. } if value == -2.0));
    }

    #[test]
    fn test_eval_fallback_flag() {
        let cli = Cli::parse_from(["qprice", "eval", "--rule", "r.json", "--row", "w.json"]);
        assert!(matches!(
            cli.command,
            Commands::Eval { fallback, .. } if fallback == FALLBACK_VALUE
        ));

        let cli = Cli::parse_from([
            "qprice", "eval", "--rule", "r.json", "--row", "w.json", "--fallback", "-1",
        ]);
        assert!(matches!(cli.command, Commands::Eval { fallback, .. } if fallback == -1.0));
    }

    #[test]
    fn test_eval_reports_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let rule = dir.path().join("rule.json");
        let row = dir.path().join("row.json");
        std::fs::write(
            &rule,
            r#"{ "expression": { "type": "operation", "operation": "divide", "args": [
                { "type": "columnReference", "columnId": "qty" },
                { "type": "constantValue", "value": 0 }
            ] } }"#,
        )
        .unwrap();
        std::fs::write(&row, r#"{ "cells": [ { "columnID": "qty", "value": 3 } ] }"#).unwrap();

        let (_, evaluation) = evaluate_files(&rule, &row, None, -1.0).unwrap();
        assert_eq!(evaluation.value, -1.0);
        assert_eq!(evaluation.error, Some(EvalError::DivisionByZero));

        let (_, evaluation) = evaluate_files(&rule, &row, None, FALLBACK_VALUE).unwrap();
        assert_eq!(evaluation.value, FALLBACK_VALUE);

        assert!(evaluate_files(&rule, &row, None, f64::NAN).is_err());
    }

    #[test]
    fn test_table_problems() {
        let table = PricingTable::from_json(TABLE).unwrap();
        assert_eq!(
            table_problems(&table),
            vec!["Column 'total' references unknown column 'unitCost'".to_string()]
        );
    }

    #[test]
    fn test_recalc_writes_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("table.json");
        let output = dir.path().join("out.json");
        std::fs::write(&input, TABLE).unwrap();

        recalc(&input, Some(&output), &CalculationOptions::default()).unwrap();

        let table = PricingTable::open(&output).unwrap();
        // unitCost is missing from the row, so the fallback is stored
        assert_eq!(table.row("r1").unwrap().value("total"), Some(0.0));
    }

    #[test]
    fn test_delete_column_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("table.json");
        let output = dir.path().join("out.json");
        std::fs::write(&input, TABLE).unwrap();

        delete_column(&input, "qty", Some(&output)).unwrap();

        let table = PricingTable::open(&output).unwrap();
        assert!(table.column("qty").is_none());
        assert_eq!(
            table.column("total").unwrap().rule,
            Some(RuleModel::new(ExpressionNode::multiply(vec![
                ExpressionNode::constant(1.0),
                ExpressionNode::column("unitCost"),
            ])))
        );
    }

    #[test]
    fn test_missing_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = check(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
    }
}
