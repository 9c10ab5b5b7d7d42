//! Content Blocking CLI
//!
//! CLI tool for checking requests against filter lists and managing
//! profiles.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};

use cb_compiler::{build_rule_set_from_reader, ListHeader};
use cb_core::types::ResourceType;
use cb_profile::{EngineConfig, ProfileRegistry};

#[derive(Parser)]
#[command(name = "cb-cli")]
#[command(about = "Adblock Plus filter list engine tools")]
struct Cli {
    /// Engine config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory, overrides the config file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Drop rules that use `*`
    #[arg(long, global = true)]
    no_wildcards: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a request would be blocked
    Check {
        /// Request URL
        #[arg(short, long)]
        url: String,

        /// URL of the page making the request
        #[arg(short, long, default_value = "")]
        base: String,

        /// Resource type (image, script, stylesheet, object, object-subrequest, subdocument, xmlhttprequest)
        #[arg(short = 't', long = "type", default_value = "other")]
        resource_type: String,

        /// Filter list files; without them the profiles in the data directory are used
        #[arg(short, long)]
        list: Vec<PathBuf>,

        /// Profiles to consult (default: all)
        #[arg(short, long)]
        profile: Vec<String>,
    },

    /// Show header and statistics of a filter list file
    Info {
        /// Filter list file
        #[arg(short, long)]
        input: PathBuf,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Download and verify a profile
    Update {
        /// Profile name
        #[arg(short, long)]
        profile: String,
    },

    /// List element hiding selectors for a domain
    Styles {
        /// Domain to look up
        #[arg(short, long)]
        domain: String,

        /// Profiles to consult (default: all)
        #[arg(short, long)]
        profile: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = load_config(&cli).and_then(|config| match cli.command {
        Commands::Check {
            url,
            base,
            resource_type,
            list,
            profile,
        } => cmd_check(config, &url, &base, &resource_type, &list, &profile),
        Commands::Info { input, json } => cmd_info(&input, json, config.enable_wildcards),
        Commands::Update { profile } => cmd_update(config, &profile),
        Commands::Styles { domain, profile } => cmd_styles(config, &domain, &profile),
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<EngineConfig, String> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path).map_err(|e| e.to_string())?,
        None => EngineConfig::default(),
    };

    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if cli.no_wildcards {
        config.enable_wildcards = false;
    }
    Ok(config)
}

fn open_registry(config: EngineConfig) -> Result<ProfileRegistry, String> {
    ProfileRegistry::new(config).map_err(|e| format!("Failed to open profiles: {}", e))
}

fn select_profiles(registry: &ProfileRegistry, names: &[String]) -> Result<Vec<usize>, String> {
    if names.is_empty() {
        return Ok((0..registry.profiles().len()).collect());
    }

    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let selected = registry.profile_list(&names);
    if selected.len() != names.len() {
        return Err(format!("Unknown profile in {:?}; known: {:?}", names, registry.profile_names()));
    }
    Ok(selected)
}

fn cmd_check(
    config: EngineConfig,
    url: &str,
    base: &str,
    resource_type: &str,
    lists: &[PathBuf],
    profiles: &[String],
) -> Result<(), String> {
    let resource_type = ResourceType::from_name(resource_type);

    if lists.is_empty() {
        let registry = open_registry(config)?;
        let selected = select_profiles(&registry, profiles)?;
        let result = registry.check_url(&selected, base, url, resource_type);
        if result.is_blocked {
            println!("BLOCKED by profile '{}'", result.profile);
        } else {
            println!("ALLOWED");
        }
        return Ok(());
    }

    for path in lists {
        let start = Instant::now();
        let set = read_list(path, config.enable_wildcards)?;
        let load_time = start.elapsed();

        if let Some(rule) = set.check_url(base, url, resource_type) {
            println!("BLOCKED by '{}' in {}", rule.text, path.display());
            println!("  Load: {:.1}ms", load_time.as_secs_f64() * 1000.0);
            return Ok(());
        }
    }

    println!("ALLOWED");
    Ok(())
}

fn read_list(path: &Path, enable_wildcards: bool) -> Result<cb_core::RuleSet, String> {
    let file = fs::File::open(path).map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    build_rule_set_from_reader(BufReader::new(file), enable_wildcards)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))
}

fn cmd_info(input: &Path, json: bool, enable_wildcards: bool) -> Result<(), String> {
    let text = fs::read_to_string(input).map_err(|e| format!("Failed to read '{}': {}", input.display(), e))?;
    let header = ListHeader::parse(&text).map_err(|e| format!("Invalid list '{}': {}", input.display(), e))?;

    let start = Instant::now();
    let set = cb_compiler::build_rule_set(&text, enable_wildcards);
    let build_time = start.elapsed();
    let stats = set.stats();

    if json {
        let value = serde_json::json!({
            "file": input.display().to_string(),
            "version": header.version,
            "title": header.title,
            "update_url": header.update_url,
            "checksum": header.checksum,
            "expires_days": header.expires_days(),
            "network_rules": stats.network_rules,
            "exception_rules": stats.exception_rules,
            "trie_nodes": stats.trie_nodes,
            "global_selectors": stats.global_selectors,
            "black_list_entries": stats.black_list_entries,
            "white_list_entries": stats.white_list_entries,
            "dropped_lines": stats.dropped_lines,
            "duplicate_rules": stats.duplicate_rules,
            "build_ms": build_time.as_secs_f64() * 1000.0,
        });
        let out = serde_json::to_string_pretty(&value).map_err(|e| format!("Failed to encode JSON: {}", e))?;
        println!("{out}");
        return Ok(());
    }

    println!("List: {}", input.display());
    println!("  Header:     {}", header.version);
    println!("  Title:      {}", header.title.as_deref().unwrap_or("(none)"));
    println!("  URL:        {}", header.update_url.as_deref().unwrap_or("(none)"));
    println!("  Checksum:   {}", header.checksum.as_deref().unwrap_or("(none)"));
    if let Some(days) = header.expires_days() {
        println!("  Expires:    {} days", days);
    }
    println!();
    println!("Rules:");
    println!("  Network:    {} ({} exceptions)", stats.network_rules, stats.exception_rules);
    println!("  Trie nodes: {}", stats.trie_nodes);
    println!(
        "  Cosmetic:   {} global, {} hide, {} unhide",
        stats.global_selectors, stats.black_list_entries, stats.white_list_entries
    );
    println!("  Dropped:    {} lines, {} duplicates", stats.dropped_lines, stats.duplicate_rules);
    println!("  Time:       {:.1}ms", build_time.as_secs_f64() * 1000.0);

    Ok(())
}

fn cmd_update(config: EngineConfig, name: &str) -> Result<(), String> {
    let runtime = tokio::runtime::Runtime::new().map_err(|e| format!("Failed to start runtime: {}", e))?;
    runtime.block_on(async {
        let registry = open_registry(config)?;
        let profile = registry
            .profile(name)
            .ok_or_else(|| format!("Unknown profile '{}'; known: {:?}", name, registry.profile_names()))?;

        profile.update().await.map_err(|e| format!("Failed to update '{}': {}", name, e))?;

        println!("Updated '{}' ({})", name, profile.title());
        if let Some(stats) = profile.stats() {
            println!("  Network rules: {}", stats.network_rules);
        }
        Ok::<(), String>(())
    })
}

fn cmd_styles(config: EngineConfig, domain: &str, profiles: &[String]) -> Result<(), String> {
    let registry = open_registry(config)?;
    let selected = select_profiles(&registry, profiles)?;

    let global = registry.style_sheet(&selected);
    let hide = registry.style_sheet_black_list(domain, &selected);
    let unhide = registry.style_sheet_white_list(domain, &selected);

    println!("Global ({}):", global.len());
    for selector in &global {
        println!("  {selector}");
    }
    println!("{} hide ({}):", domain, hide.len());
    for selector in &hide {
        println!("  {selector}");
    }
    println!("{} unhide ({}):", domain, unhide.len());
    for selector in &unhide {
        println!("  {selector}");
    }

    Ok(())
}
