use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::cli::{load_dataset, OutputFormat};
use crate::core::types::to_position;

#[derive(Args)]
pub struct DatasetArgs {
    #[command(subcommand)]
    pub command: DatasetCommands,
}

#[derive(Subcommand)]
pub enum DatasetCommands {
    /// Show data set metadata and table sizes
    Info {
        /// Path to a data set file (defaults to embedded)
        #[arg(long)]
        dataset: Option<PathBuf>,
    },

    /// List signatures in rank order
    Signatures {
        /// Path to a data set file (defaults to embedded)
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Show at most this many signatures
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Compile a data set to the binary format
    Compile {
        /// Output file path
        #[arg(required = true)]
        output: PathBuf,

        /// Path to a data set file to compile (defaults to embedded)
        #[arg(long)]
        dataset: Option<PathBuf>,
    },

    /// Export a data set as JSON source (gzip-compressed when the output ends in .gz)
    Export {
        /// Output file path
        #[arg(required = true)]
        output: PathBuf,

        /// Path to a data set file to export (defaults to embedded)
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
}

/// Execute dataset subcommand
///
/// # Errors
///
/// Returns an error if the data set cannot be loaded or the output cannot be
/// written.
pub fn run(args: DatasetArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    match args.command {
        DatasetCommands::Info { dataset } => run_info(dataset.as_deref(), format, verbose),
        DatasetCommands::Signatures { dataset, limit } => {
            run_signatures(dataset.as_deref(), limit, format, verbose)
        }
        DatasetCommands::Compile { output, dataset } => {
            run_compile(&output, dataset.as_deref(), verbose)
        }
        DatasetCommands::Export { output, dataset } => {
            run_export(&output, dataset.as_deref(), verbose)
        }
    }
}

fn run_info(path: Option<&Path>, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let dataset = load_dataset(path, verbose)?;
    let complete = dataset.nodes.iter().filter(|n| n.is_complete()).count();

    match format {
        OutputFormat::Json => {
            let components: Vec<serde_json::Value> = dataset
                .components
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "name": c.name,
                        "default_profile": c.default_profile.0,
                        "http_headers": c.http_headers,
                    })
                })
                .collect();
            let info = serde_json::json!({
                "name": dataset.name,
                "version": dataset.version,
                "published": dataset.published.to_rfc3339(),
                "min_user_agent_length": dataset.min_user_agent_length,
                "max_signatures": dataset.max_signatures,
                "components": components,
                "profiles": dataset.profiles.len(),
                "nodes": dataset.nodes.len(),
                "complete_nodes": complete,
                "root_nodes": dataset.root_node_count(),
                "signatures": dataset.len(),
                "http_headers": dataset.http_headers(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        OutputFormat::Tsv => {
            println!("field\tvalue");
            println!("name\t{}", dataset.name);
            println!("version\t{}", dataset.version);
            println!("published\t{}", dataset.published.to_rfc3339());
            println!("components\t{}", dataset.components.len());
            println!("profiles\t{}", dataset.profiles.len());
            println!("nodes\t{}", dataset.nodes.len());
            println!("complete_nodes\t{complete}");
            println!("root_nodes\t{}", dataset.root_node_count());
            println!("signatures\t{}", dataset.len());
        }
        OutputFormat::Text => {
            println!("Data set: {} (v{})", dataset.name, dataset.version);
            println!("Published: {}", dataset.published.format("%Y-%m-%d"));
            println!(
                "Signatures: {} (scoring at most {} per match)",
                dataset.len(),
                dataset.max_signatures
            );
            println!(
                "Nodes: {} ({complete} complete, {} root)",
                dataset.nodes.len(),
                dataset.root_node_count()
            );
            println!("Profiles: {}", dataset.profiles.len());
            println!("Minimum User-Agent length: {}", dataset.min_user_agent_length);
            println!("\nComponents:");
            for component in &dataset.components {
                println!(
                    "   {} (default profile {}) from {}",
                    component.name,
                    component.default_profile,
                    component.http_headers.join(", ")
                );
            }
        }
    }

    Ok(())
}

fn run_signatures(
    path: Option<&Path>,
    limit: Option<usize>,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    let dataset = load_dataset(path, verbose)?;
    let count = limit.map_or(dataset.len(), |l| l.min(dataset.len()));

    let mut rows = Vec::with_capacity(count);
    for rank in 0..count {
        let signature = dataset.ranked_signature(to_position(rank))?;
        let profiles: Vec<u32> = signature.profile_ids.iter().map(|id| id.0).collect();
        rows.push((signature, profiles, signature.render(&dataset)?));
    }

    match format {
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = rows
                .iter()
                .map(|(signature, profiles, rendered)| {
                    serde_json::json!({
                        "rank": signature.rank,
                        "index": signature.index,
                        "nodes": signature.node_offsets,
                        "profiles": profiles,
                        "signature": rendered,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Tsv => {
            println!("rank\tindex\tprofiles\tsignature");
            for (signature, profiles, rendered) in &rows {
                let profiles: Vec<String> = profiles.iter().map(ToString::to_string).collect();
                println!(
                    "{}\t{}\t{}\t{rendered}",
                    signature.rank,
                    signature.index,
                    profiles.join(",")
                );
            }
        }
        OutputFormat::Text => {
            println!("{:<6} {:<6} Signature", "Rank", "Index");
            println!("{}", "-".repeat(60));
            for (signature, _, rendered) in &rows {
                println!("{:<6} {:<6} {rendered}", signature.rank, signature.index);
            }
            println!("\nShowing {count} of {} signatures", dataset.len());
        }
    }

    Ok(())
}

fn run_compile(output: &Path, path: Option<&Path>, verbose: bool) -> anyhow::Result<()> {
    let dataset = load_dataset(path, verbose)?;
    let file = File::create(output)
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", output.display()))?;
    dataset.write_binary(BufWriter::new(file))?;

    println!(
        "Compiled {} signatures and {} nodes to {}",
        dataset.len(),
        dataset.nodes.len(),
        output.display()
    );
    Ok(())
}

fn run_export(output: &Path, path: Option<&Path>, verbose: bool) -> anyhow::Result<()> {
    let dataset = load_dataset(path, verbose)?;
    let json = dataset.to_json()?;
    let file = File::create(output)
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", output.display()))?;

    let gzip = output
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    if gzip {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        encoder.write_all(json.as_bytes())?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = BufWriter::new(file);
        writer.write_all(json.as_bytes())?;
        writer.flush()?;
    }

    println!("Exported {} signatures to {}", dataset.len(), output.display());
    Ok(())
}
