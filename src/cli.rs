//! Minimal CLI: resolve | order | check
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;

use crate::ir::{Protocol, Structure};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// resolve a JSON protocol meta-model into a dependency-ordered IR
#[derive(Parser, Debug)]
#[command(name = "metamodel-ir", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// resolve one meta-model and print the IR as pretty JSON
    Resolve(ResolveOut),
    /// print the emission order of type aliases and structures
    Order(OrderOut),
    /// resolve every matching meta-model and report pass/fail per file
    Check(CheckInputs),
}

#[derive(Args, Debug)]
struct ResolveOut {
    /// meta-model .json file
    #[arg(long, short)]
    input: PathBuf,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(Args, Debug)]
struct OrderOut {
    /// meta-model .json file
    #[arg(long, short)]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct CheckInputs {
    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Resolve(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let protocol = load(&target.input)?;
                let ir_src = serde_json::to_string_pretty(&protocol)?;
                if let Some(out) = target.out.as_ref() {
                    if let Some(parent) = out.parent() {
                        std::fs::create_dir_all(parent)
                            .with_context(|| format!("failed to create {}", parent.display()))?;
                    }
                    std::fs::write(out, &ir_src).with_context(|| format!("failed to write {}", out.display()))?;
                } else {
                    println!("{ir_src}");
                }
                Ok(())
            }
            Command::Order(target) => {
                let protocol = load(&target.input)?;
                print!("{}", render_order(&protocol));
                Ok(())
            }
            Command::Check(target) => {
                let source_paths = resolve_file_path_patterns(&target.input)?;
                // one fresh resolver per file
                let results: Vec<(PathBuf, crate::Result<Protocol>)> = source_paths
                    .into_par_iter()
                    .map(|path| {
                        let result = crate::load(&path);
                        (path, result)
                    })
                    .collect();

                let mut failures = 0;
                for (path, result) in &results {
                    match result {
                        Ok(protocol) => println!(
                            "{} {} ({} structures, {} type aliases, {} requests, {} notifications)",
                            "pass".green().bold(),
                            path.display(),
                            protocol.structures.len(),
                            protocol.type_aliases.len(),
                            protocol.requests.len(),
                            protocol.notifications.len(),
                        ),
                        Err(error) => {
                            failures += 1;
                            println!("{} {}", "fail".red().bold(), path.display());
                            for line in error.to_string().lines() {
                                println!("    {line}");
                            }
                        }
                    }
                }
                if failures > 0 {
                    bail!("{failures} of {} meta-models failed to resolve", results.len());
                }
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn load(path: &Path) -> Result<Protocol> {
    crate::load(path).with_context(|| format!("failed to resolve {}", path.display()))
}

/// Type aliases, then structures with their nested structures indented
/// under them.
fn render_order(protocol: &Protocol) -> String {
    fn structure(out: &mut String, s: &Structure, depth: usize) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&s.qualified_name());
        if let Some(kind) = &s.kind {
            out.push_str(&format!(" (kind: {kind})"));
        }
        out.push('\n');
        for nested in &s.nested_structures {
            structure(out, nested, depth + 1);
        }
    }

    let mut out = String::from("type aliases:\n");
    for alias in &protocol.type_aliases {
        out.push_str(&format!("  {}\n", alias.name));
    }
    out.push_str("structures:\n");
    for s in &protocol.structures {
        structure(&mut out, s, 1);
    }
    out
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
