use std::collections::BTreeMap;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::cli::{load_dataset, OutputFormat};
use crate::core::profile::{Profile, USER_AGENT_HEADER};
use crate::core::types::MatchMethod;
use crate::dataset::store::DataSet;
use crate::matching::engine::{HeadersMatch, MatchingConfig, MatchingEngine};
use crate::matching::state::MatchState;
use crate::utils::validation::{check_length, parse_headers};

#[derive(Args)]
pub struct MatchArgs {
    /// User-Agent strings to match
    pub user_agents: Vec<String>,

    /// Read User-Agents from a file, one per line
    /// Use '-' for stdin
    #[arg(short, long, conflicts_with = "user_agents")]
    pub input: Option<PathBuf>,

    /// Extra HTTP header as "Name: value"; may be repeated.
    /// Each User-Agent is matched together with these headers.
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Path to a data set file (JSON source, gzipped JSON or compiled)
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    /// Maximum number of candidate signatures to score
    #[arg(long)]
    pub max_signatures: Option<usize>,

    /// Score every candidate in full instead of stopping early
    #[arg(long)]
    pub no_branch_and_bound: bool,
}

/// One profile in a match report
#[derive(Debug, Serialize)]
struct ProfileReport<'a> {
    component: &'a str,
    id: u32,
    properties: &'a BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct CounterReport {
    root_nodes_evaluated: u32,
    nodes_evaluated: u32,
    signatures_read: u32,
    signatures_compared: u32,
    closest_signatures: u32,
}

#[derive(Debug, Serialize)]
struct HeaderReport {
    name: String,
    method: MatchMethod,
    score: u32,
    signature: Option<i32>,
}

/// Serializable result for one input line
#[derive(Debug, Serialize)]
struct MatchReport<'a> {
    user_agent: String,
    method: MatchMethod,
    score: u32,
    signature: Option<i32>,
    rank: Option<i32>,
    matched: String,
    profiles: Vec<ProfileReport<'a>>,
    counters: CounterReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    headers: Vec<HeaderReport>,
}

impl<'a> MatchReport<'a> {
    fn from_state(dataset: &'a DataSet, state: &MatchState<'a>) -> Self {
        Self {
            user_agent: state.user_agent().into_owned(),
            method: state.method(),
            score: state.lowest_score(),
            signature: state.signature().map(|s| s.index),
            rank: state.signature().map(|s| s.rank),
            matched: state.matched_characters(),
            profiles: profile_reports(dataset, state.profiles()),
            counters: CounterReport {
                root_nodes_evaluated: state.root_nodes_evaluated(),
                nodes_evaluated: state.nodes_evaluated(),
                signatures_read: state.signatures_read(),
                signatures_compared: state.signatures_compared(),
                closest_signatures: state.closest_signatures(),
            },
            headers: Vec::new(),
        }
    }

    fn from_headers(dataset: &'a DataSet, result: &HeadersMatch<'a>) -> Self {
        let mut report = match result.header(USER_AGENT_HEADER) {
            Some(state) => Self::from_state(dataset, state),
            None => Self::from_state(dataset, &MatchState::new(dataset)),
        };
        report.method = result.method;
        report.profiles = profile_reports(dataset, &result.profiles);
        report.headers = result
            .matches
            .iter()
            .map(|(name, state)| HeaderReport {
                name: name.clone(),
                method: state.method(),
                score: state.lowest_score(),
                signature: state.signature().map(|s| s.index),
            })
            .collect();
        report
    }
}

fn profile_reports<'a>(dataset: &'a DataSet, profiles: &[&'a Profile]) -> Vec<ProfileReport<'a>> {
    profiles
        .iter()
        .map(|p| ProfileReport {
            component: dataset
                .components
                .get(p.component)
                .map_or("", |c| c.name.as_str()),
            id: p.id.0,
            properties: &p.properties,
        })
        .collect()
}

/// Execute match subcommand
///
/// # Errors
///
/// Returns an error if the data set or input cannot be read, an argument is
/// invalid, or matching fails.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: MatchArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let headers = parse_headers(&args.headers)?;
    let user_agents = read_user_agents(&args)?;
    if user_agents.is_empty() && headers.is_empty() {
        anyhow::bail!("No User-Agent given: pass strings, --input FILE, --input - or --header");
    }
    for user_agent in &user_agents {
        check_length(user_agent)?;
    }

    let dataset = load_dataset(args.dataset.as_deref(), verbose)?;
    let config = MatchingConfig {
        max_signatures: args.max_signatures,
        branch_and_bound: !args.no_branch_and_bound,
    };
    let engine = MatchingEngine::with_config(&dataset, config);

    let mut states = Vec::new();
    let mut header_matches = Vec::new();
    if headers.is_empty() {
        let mut state = MatchState::new(&dataset);
        for user_agent in &user_agents {
            engine.match_into(user_agent.as_bytes(), &mut state)?;
            states.push(state.clone());
        }
    } else if user_agents.is_empty() {
        header_matches.push(engine.match_headers(&headers)?);
    } else {
        for user_agent in &user_agents {
            let mut combined = vec![(USER_AGENT_HEADER.to_string(), user_agent.clone())];
            combined.extend(headers.iter().cloned());
            header_matches.push(engine.match_headers(&combined)?);
        }
    }

    let reports: Vec<MatchReport<'_>> = states
        .iter()
        .map(|state| MatchReport::from_state(&dataset, state))
        .chain(
            header_matches
                .iter()
                .map(|result| MatchReport::from_headers(&dataset, result)),
        )
        .collect();

    match format {
        OutputFormat::Text => print_text_results(&reports, verbose),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Tsv => print_tsv_results(&reports),
    }

    Ok(())
}

fn read_user_agents(args: &MatchArgs) -> anyhow::Result<Vec<String>> {
    let Some(path) = &args.input else {
        return Ok(args.user_agents.clone());
    };

    let reader: Box<dyn BufRead> = if path.to_string_lossy() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = std::fs::File::open(path)
            .map_err(|e| anyhow::anyhow!("Failed to open {}: {e}", path.display()))?;
        Box::new(BufReader::new(file))
    };

    let mut user_agents = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if !line.trim().is_empty() {
            user_agents.push(line.to_string());
        }
    }
    Ok(user_agents)
}

fn print_text_results(reports: &[MatchReport<'_>], verbose: bool) {
    for (i, report) in reports.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("User-Agent: {}", report.user_agent);
        println!("   Method: {} (score {})", report.method, report.score);
        if let (Some(index), Some(rank)) = (report.signature, report.rank) {
            println!("   Signature: {index} (rank {rank})");
        }
        println!("   Matched: {}", report.matched);

        for profile in &report.profiles {
            let properties: Vec<String> = profile
                .properties
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            println!(
                "   {}: {} {}",
                profile.component,
                profile.id,
                properties.join(", ")
            );
        }

        for header in &report.headers {
            println!(
                "   Header {}: {} (score {})",
                header.name, header.method, header.score
            );
        }

        if verbose {
            let c = &report.counters;
            println!(
                "   Evaluated: {} root nodes, {} nodes, {} signatures read, {} compared, {} candidates",
                c.root_nodes_evaluated,
                c.nodes_evaluated,
                c.signatures_read,
                c.signatures_compared,
                c.closest_signatures
            );
        }
    }
}

fn print_tsv_results(reports: &[MatchReport<'_>]) {
    println!("user_agent\tmethod\tscore\tsignature\trank\tprofiles");
    for report in reports {
        let profiles: Vec<String> = report.profiles.iter().map(|p| p.id.to_string()).collect();
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            report.user_agent.replace('\t', " "),
            report.method,
            report.score,
            report.signature.map(|s| s.to_string()).unwrap_or_default(),
            report.rank.map(|r| r.to_string()).unwrap_or_default(),
            profiles.join(",")
        );
    }
}
