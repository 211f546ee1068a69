//! Build automation tasks for auditsync
//!
//! - Generating the CLI reference from the clap definitions

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for auditsync", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<auditsync_ingest::Cli>();

    let content = format!(
        r#"# auditsync CLI Reference

Generated from the CLI source code. Last updated: {}.

## Quick Start

```bash
# Exchange the refresh token issued by the provider
auditsync save-token --refresh-token "$TOKEN"

# Check the sources file
auditsync validate

# Poll until interrupted (events are written to stdout as JSON lines)
auditsync run > events.jsonl
```

## Commands

{}

## Environment Variables

| Variable | Default |
|----------|---------|
| `AUDITSYNC_API_BASE_URL` | `https://openapi.swit.io/v1/api` |
| `AUDITSYNC_TOKEN_URL` | `https://splunk.switstore.io/refresh` |
| `AUDITSYNC_DATA_DIR` | platform data directory + `/auditsync` |
| `AUDITSYNC_SOURCES_FILE` | `sources.toml` |
| `AUDITSYNC_OUTPUT` | `-` (stdout) |
| `AUDITSYNC_HTTP_TIMEOUT_SECS` | `60` |
| `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR`, `LOG_FILTER` | see `auditsync-common` |

## Sources File

```toml
[[sources]]
name = "workspace-audit"
start_time = "2024-01-01 00:00:00"   # UTC, at most one year back
interval_secs = 60                    # at least 30
```

---

*To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
