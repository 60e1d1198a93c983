use anyhow::Context;
use clap::Parser;
use console::style;
use htmlcode::{
    Cli, CancelFlag, ExtractError, ExtractionResult, HtmlCodeExtractor, PreviewReport,
    UserFriendlyError,
};
use std::path::Path;
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(error) => {
            print_error(&error);
            exit_code_for(&error)
        }
    };
    process::exit(exit_code);
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    if cli.generate_selectors {
        print!("{}", htmlcode::SelectorConfig::default().to_toml()?);
        return Ok(0);
    }

    let input = cli
        .input
        .clone()
        .context("an input document or archive directory is required")?;
    let config = cli.selector_config()?;
    let options = cli.extract_options()?;

    let cancel = CancelFlag::new();
    install_signal_handler(&cancel)?;

    let extractor = HtmlCodeExtractor::new(config)?
        .with_options(options)
        .with_cancel_flag(cancel.clone());

    if let Some(ref archive_dest) = cli.archive {
        let archive_dir = extractor.save_archive(&input, archive_dest, cli.name.as_deref())?;
        if !cli.quiet {
            println!(
                "{} {}",
                style("Archived to").green(),
                archive_dir.display()
            );
        }
        return Ok(0);
    }

    if cli.preview {
        let report = preview_input(&extractor, &input)?;
        print_preview(&report, cli.quiet);
        return Ok(if report.skipped.is_empty() { 0 } else { 2 });
    }

    let result = if input.is_dir() {
        extractor.extract_archive(&input, &cli.output)?
    } else {
        extractor
            .extract_file_async(input, cli.output.clone())
            .await?
    };

    print_result(&result, &cli.output, cli.quiet);

    cancel.check()?;
    Ok(if result.skipped.is_empty() { 0 } else { 2 })
}

fn preview_input(extractor: &HtmlCodeExtractor, input: &Path) -> anyhow::Result<PreviewReport> {
    if input.is_dir() {
        let archive = htmlcode::load_archive(input)?;
        let options = extractor
            .options()
            .clone()
            .with_encoding(Some(archive.metadata.encoding));
        Ok(htmlcode::preview(
            &archive.document,
            &archive.metadata.selectors,
            &options,
        )?)
    } else {
        let bytes = std::fs::read(input)
            .with_context(|| format!("cannot read input file {}", input.display()))?;
        Ok(extractor.preview_bytes(&bytes)?)
    }
}

fn print_preview(report: &PreviewReport, quiet: bool) {
    println!(
        "{} {} file(s) would be created",
        style("Preview:").cyan().bold(),
        report.files.len()
    );
    if quiet {
        return;
    }
    for file in &report.files {
        println!(
            "  {} ({} lines)",
            style(file.relative_path.display()).green(),
            file.line_count
        );
        for line in file.snippet.lines().take(3) {
            println!("      {}", style(line).dim());
        }
    }
    print_skips_and_notes(&report.skipped, &report.notes);
}

fn print_result(result: &ExtractionResult, output_root: &Path, quiet: bool) {
    println!(
        "{} {} file(s) under {}",
        style("Created").green().bold(),
        result.created.len(),
        output_root.display()
    );
    if quiet {
        return;
    }
    for path in &result.created {
        println!("  {}", path.display());
    }
    print_skips_and_notes(&result.skipped, &result.notes);
}

fn print_skips_and_notes(skipped: &[htmlcode::SkippedBlock], notes: &[String]) {
    if !skipped.is_empty() {
        println!("{}", style("Skipped:").yellow().bold());
        for skip in skipped {
            let label = if skip.raw_path.is_empty() {
                "<unnamed>"
            } else {
                skip.raw_path.as_str()
            };
            println!("  {}: {}", label, skip.reason);
        }
    }
    for note in notes {
        println!("{} {}", style("note:").yellow(), note);
    }
}

fn install_signal_handler(cancel: &CancelFlag) -> anyhow::Result<()> {
    let flag = cancel.clone();
    ctrlc::set_handler(move || {
        if flag.is_cancelled() {
            eprintln!("\nForce stopping...");
            process::exit(130);
        }
        eprintln!("\nStopping after the current file... (press Ctrl+C again to force)");
        flag.cancel();
    })
    .context("failed to install signal handler")
}

fn print_error(error: &anyhow::Error) {
    if let Some(extract_error) = error.downcast_ref::<ExtractError>() {
        eprintln!("{} {}", style("Error:").red().bold(), extract_error.user_message());
        if let Some(suggestion) = extract_error.suggestion() {
            eprintln!("{} {}", style("Hint:").cyan(), suggestion);
        }
    } else {
        eprintln!("{} {:#}", style("Error:").red().bold(), error);
    }
}

fn exit_code_for(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<ExtractError>() {
        Some(ExtractError::Cancelled) => 130,
        Some(ExtractError::Parse { .. }) => 3,
        Some(ExtractError::Selector { .. }) | Some(ExtractError::Config { .. }) => 4,
        Some(ExtractError::ArchiveFormat { .. }) | Some(ExtractError::ArchiveNotFound { .. }) => 5,
        _ => 1,
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_filter = if quiet {
        "htmlcode=error"
    } else {
        match verbose {
            0 => "htmlcode=warn",
            1 => "htmlcode=info",
            _ => "htmlcode=debug",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}
