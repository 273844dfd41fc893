use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use arx_sdk::{inspect, ArchiveInfo, ArxConfig, DecodeLimits, Format};
use arx_text::TextDecoder;
use colored::Colorize;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Inspect(args) => cmd_inspect(args, &cli.format),
        Command::Tokens(args) => {
            let config = load_config(cli.config.as_deref())?;
            cmd_tokens(args, &config, &cli.format)
        }
        Command::Config(args) => {
            let path = args.file.or(cli.config);
            let config = load_config(path.as_deref())?;
            cmd_config(&config, &cli.format)
        }
    }
}

/// Read an [`ArxConfig`] from TOML, or the defaults when no file is given.
fn load_config(path: Option<&Path>) -> anyhow::Result<ArxConfig> {
    let Some(path) = path else {
        return Ok(ArxConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn cmd_inspect(args: InspectArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let bytes = fs::read(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let info = inspect(&bytes)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&info)?),
        OutputFormat::Text => print_info(&args.file, &info),
    }
    Ok(())
}

fn print_info(path: &Path, info: &ArchiveInfo) {
    println!("{} {}", "✓".green().bold(), path.display().to_string().bold());
    println!("  Format:  {}", info.format.to_string().cyan());
    println!(
        "  Version: {}",
        format!("{}.{}", info.major_version, info.minor_version).yellow()
    );
    println!("  Size:    {} bytes", info.size);
}

/// Lex a text archive into its tokens, stopping after `limit` if given.
fn text_tokens(
    bytes: &[u8],
    limits: &DecodeLimits,
    limit: Option<usize>,
) -> anyhow::Result<Vec<String>> {
    match Format::detect(bytes) {
        Some(Format::Text) => {}
        Some(other) => bail!("tokens are only available for text archives, found {other}"),
        None => bail!("not an ARX archive"),
    }
    let mut source = bytes;
    let mut decoder = TextDecoder::new(&mut source, limits.clone())?;
    let mut tokens = Vec::new();
    while limit.map_or(true, |limit| tokens.len() < limit) {
        match decoder.next_token()? {
            Some(token) => tokens.push(token),
            None => break,
        }
    }
    Ok(tokens)
}

fn cmd_tokens(args: TokensArgs, config: &ArxConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let bytes = fs::read(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let tokens = text_tokens(&bytes, &config.text.limits, args.limit)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tokens)?),
        OutputFormat::Text => {
            for (i, token) in tokens.iter().enumerate() {
                println!("{:>6}  {}", i.to_string().dimmed(), token);
            }
            println!("{} tokens", tokens.len().to_string().bold());
        }
    }
    Ok(())
}

fn cmd_config(config: &ArxConfig, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Text => print!("{}", toml::to_string_pretty(config)?),
    }
    Ok(())
}
