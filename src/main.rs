//! docweave - compose nested Word documents

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::debug;

use docweave::package::BODY_PART;
use docweave::{
    ComposeConfig, Composer, CoreProperty, DocumentNode, DocumentRecord, Error, Package, Result,
    build_tree, read_properties, scan, write_properties,
};

#[derive(Parser)]
#[command(name = "docweave")]
#[command(version, about = "Compose nested Word documents", long_about = None)]
#[command(after_help = "EXAMPLES:
    docweave compose -m tree.json -r 12 -o out/    Write the composed document
    docweave text -m tree.json -r 12               Print its text
    docweave bookmarks contract.docx               List bookmark ranges
    docweave props contract.docx --set title=Act   Rewrite a core property")]
struct Cli {
    /// Log more (repeat for trace output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Selects a tree from a JSON manifest of document records.
#[derive(clap::Args)]
struct TreeArgs {
    /// JSON array of {id, contentPath, parentId, supersededById, level}
    #[arg(short, long, value_name = "FILE")]
    manifest: PathBuf,

    /// Id of the document to compose
    #[arg(short, long, value_name = "ID")]
    root: i64,

    /// Banner for superseded documents ({id} is the successor)
    #[arg(long, value_name = "TEXT")]
    banner: Option<String>,

    /// Deepest nesting to accept
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Compose a tree and write the resulting container
    Compose {
        #[command(flatten)]
        tree: TreeArgs,

        /// Output directory (defaults to the system temp dir)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
    /// Compose a tree and print the merged body XML
    Body {
        #[command(flatten)]
        tree: TreeArgs,
    },
    /// Compose a tree and print its plain text
    Text {
        #[command(flatten)]
        tree: TreeArgs,
    },
    /// List the bookmarks of a container
    Bookmarks {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
    /// Show or rewrite core properties
    Props {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Field to rewrite; dates take millisecond timestamps
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Compose { tree, output_dir } => {
            let (composer, root) = prepare(&tree, output_dir)?;
            let path = composer.compose_to_file(&root)?;
            println!("{}", path.display());
        }
        Command::Body { tree } => {
            let (composer, root) = prepare(&tree, None)?;
            println!("{}", composer.compose_xml(&root)?);
        }
        Command::Text { tree } => {
            let (composer, root) = prepare(&tree, None)?;
            print!("{}", composer.extract_text(&root)?);
        }
        Command::Bookmarks { input } => show_bookmarks(&input)?,
        Command::Props { input, set } => {
            if set.is_empty() {
                show_properties(&input)?;
            } else {
                let updates = set
                    .iter()
                    .map(|pair| parse_assignment(pair))
                    .collect::<Result<Vec<_>>>()?;
                write_properties(&input, &updates)?;
            }
        }
    }
    Ok(())
}

fn prepare(args: &TreeArgs, output_dir: Option<PathBuf>) -> Result<(Composer, DocumentNode)> {
    let records = load_manifest(&args.manifest)?;
    let root = build_tree(&records, args.root)?;
    debug!("composing {} documents under {}", root.node_count(), root.id);

    let mut config = ComposeConfig::default();
    if let Some(dir) = output_dir {
        config = config.with_output_dir(dir);
    }
    if let Some(banner) = &args.banner {
        config = config.with_banner_template(banner.as_str());
    }
    if let Some(depth) = args.max_depth {
        config = config.with_max_depth(depth);
    }
    Ok((Composer::new().with_config(config), root))
}

/// Read the manifest, resolving relative content paths against its directory.
fn load_manifest(path: &Path) -> Result<Vec<DocumentRecord>> {
    let file = File::open(path)?;
    let mut records: Vec<DocumentRecord> = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::Io(e.into()))?;

    let base = path.parent().unwrap_or(Path::new(""));
    for record in &mut records {
        if record.content_path.is_relative() {
            record.content_path = base.join(&record.content_path);
        }
    }
    Ok(records)
}

fn show_bookmarks(path: &Path) -> Result<()> {
    let package = Package::open(path)?;
    let bookmarks = scan(&package.read_entry_as_text(BODY_PART)?)?;

    println!("File: {}", path.display());
    for mark in bookmarks.iter() {
        println!(
            "{:>5}  {:<24} {:>4}..{:<4} ({} paragraphs)",
            mark.id,
            mark.name.as_deref().unwrap_or("-"),
            mark.start,
            mark.end,
            mark.count_paragraphs
        );
    }
    Ok(())
}

fn show_properties(path: &Path) -> Result<()> {
    let record = read_properties(path)?;
    let json = serde_json::to_string_pretty(&record).map_err(|e| Error::Io(e.into()))?;
    println!("{json}");
    Ok(())
}

fn parse_assignment(pair: &str) -> Result<(CoreProperty, String)> {
    let Some((key, value)) = pair.split_once('=') else {
        return Err(Error::InvalidProperty {
            field: pair.to_string(),
            value: String::new(),
        });
    };
    Ok((key.trim().parse()?, value.to_string()))
}
