//! Pipeline commands — `pcrflow run` and `pcrflow status`.

use anyhow::{Context, Result, bail};
use console::style;
use std::io::Read;
use std::path::Path;

use pcrflow::config::PipelineConfig;
use pcrflow::pipeline::{ArtifactReport, Pipeline};

/// Take the sequence from the positional argument or from `file` ("-" = stdin).
pub fn read_sequence(sequence: Option<&str>, file: Option<&Path>) -> Result<String> {
    match (sequence, file) {
        (Some(sequence), _) => Ok(sequence.to_string()),
        (None, Some(path)) if path == Path::new("-") => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("Failed to read sequence from stdin")?;
            Ok(strip_fasta_headers(&content))
        }
        (None, Some(path)) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read sequence file: {}", path.display()))?;
            Ok(strip_fasta_headers(&content))
        }
        (None, None) => bail!("Provide a sequence argument or --file <path>"),
    }
}

/// Drop FASTA header (`>`) and comment (`;`) lines so their letters do not
/// leak into the sanitized sequence.
fn strip_fasta_headers(text: &str) -> String {
    text.lines()
        .filter(|line| !line.starts_with('>') && !line.starts_with(';'))
        .collect::<Vec<_>>()
        .join("\n")
}

fn cache_label(artifact: &ArtifactReport, fresh: &str) -> String {
    if artifact.cached {
        style("cached").green().to_string()
    } else {
        style(fresh).yellow().to_string()
    }
}

pub async fn cmd_run(config: PipelineConfig, raw_sequence: &str, json: bool) -> Result<()> {
    let pipeline = Pipeline::with_shell_runner(config);
    let report = pipeline.execute(raw_sequence).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} {}", style("Identity: ").bold(), report.identity);
    println!("{} {}", style("Workspace:").bold(), report.workspace.display());
    println!("{} {} bases", style("Sequence: ").bold(), report.sequence.len());
    println!();
    println!(
        "  primer3 template       {}",
        cache_label(&report.design.template, "written")
    );
    println!(
        "  primer3 output         {}",
        cache_label(&report.design.output, "computed")
    );
    println!(
        "  primersearch template  {}",
        cache_label(&report.search.template, "written")
    );
    println!(
        "  primersearch output    {}",
        cache_label(&report.search.output, "computed")
    );
    println!();

    let pairs = report.design.primers.primer_pairs();
    if pairs.is_empty() {
        println!("{}", style("primer3 returned no primer pairs").dim());
    } else {
        for pair in &pairs {
            println!(
                "  {}  {} / {}",
                style(&pair.name).cyan(),
                pair.forward,
                pair.reverse
            );
        }
    }
    println!();
    print!("{}", report.search.output.content);

    Ok(())
}

pub fn cmd_status(config: PipelineConfig, raw_sequence: &str) -> Result<()> {
    let pipeline = Pipeline::with_shell_runner(config);
    let status = pipeline.status_for_sequence(raw_sequence);

    println!("{} {}", style("Identity: ").bold(), status.identity);
    println!(
        "{} {}{}",
        style("Workspace:").bold(),
        status.directory.display(),
        if status.exists { "" } else { " (not created)" }
    );
    println!();

    for artifact in &status.artifacts {
        let state = if artifact.present {
            style("present").green()
        } else {
            style("missing").dim()
        };
        let detail = match (artifact.size, artifact.modified) {
            (Some(size), Some(modified)) => {
                format!("  {} bytes, {}", size, modified.format("%Y-%m-%d %H:%M:%S UTC"))
            }
            _ => String::new(),
        };
        println!(
            "  {:<13} {:<9} {}{}",
            artifact.stage.tool_name(),
            artifact.role.to_string(),
            state,
            detail
        );
    }

    if status.is_complete() {
        println!();
        println!("All artifacts cached; `pcrflow run` will not invoke any tool.");
    }
    Ok(())
}
