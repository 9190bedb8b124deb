//! YSON command-line tool for validating, formatting, and transcoding YSON documents.
//!
//! Usage: yson [OPTIONS] [FILE]
//!
//! Reads FILE (or stdin), decodes it from `--from`, and writes it in the
//! `--to` format to stdout or `--output`. With `--check` the input is only
//! validated.

use clap::{Parser, ValueEnum};
use libyson::{DumpOptions, Encoding, Format, LoadOptions, Node, YsonType, DEFAULT_NESTING_LIMIT};
use log::{debug, info};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

mod transcode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum InputFormat {
    Yson,
    Json,
    #[value(alias = "yml")]
    Yaml,
    Toml,
    Cbor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Binary,
    Pretty,
    Json,
    #[value(alias = "yml")]
    Yaml,
    Toml,
    Cbor,
}

impl OutputFormat {
    fn yson(self) -> Option<Format> {
        match self {
            OutputFormat::Text => Some(Format::Text),
            OutputFormat::Binary => Some(Format::Binary),
            OutputFormat::Pretty => Some(Format::Pretty),
            _ => None,
        }
    }
}

#[derive(Parser)]
#[command(name = "yson", version, about = "Validate, format, and transcode YSON documents")]
struct Cli {
    /// Input format
    #[arg(short, long, value_enum, default_value = "yson")]
    from: InputFormat,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    to: OutputFormat,

    /// Shape of the YSON document: node, list_fragment or map_fragment
    #[arg(long, default_value = "node")]
    yson_type: YsonType,

    /// How YSON strings are decoded: utf-8 or none
    #[arg(long, default_value = "utf-8")]
    encoding: Encoding,

    /// Maximum container depth accepted while parsing YSON
    #[arg(long, default_value_t = DEFAULT_NESTING_LIMIT)]
    nesting_limit: usize,

    /// Write map and attribute entries ordered by key
    #[arg(long)]
    sort_keys: bool,

    /// Write output to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only check that the input is valid
    #[arg(long)]
    check: bool,

    /// Log what the tool is doing
    #[arg(short, long)]
    verbose: bool,

    /// Input file; stdin when absent or "-"
    file: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    if cli.verbose {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let input_path = cli.file.as_ref().filter(|path| path.as_os_str() != "-");
    let name = input_path
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<stdin>".to_string());

    let node = decode_input(&cli, input_path).map_err(|e| format!("{name}: {e}"))?;
    if cli.check {
        println!("{name}: ok");
        return Ok(());
    }

    let output = encode_output(&cli, &node)?;
    debug!("writing {} bytes as {:?}", output.len(), cli.to);
    match &cli.output {
        Some(path) => {
            fs::write(path, &output).map_err(|e| format!("Error writing {}: {}", path.display(), e))?;
            info!("wrote {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&output)
                .and_then(|()| stdout.flush())
                .map_err(|e| format!("Error writing output: {}", e))?;
        }
    }
    Ok(())
}

fn decode_input(cli: &Cli, input_path: Option<&PathBuf>) -> Result<Node, String> {
    if cli.from == InputFormat::Yson {
        let options = LoadOptions::default()
            .yson_type(cli.yson_type)
            .encoding(cli.encoding)
            .nesting_limit(cli.nesting_limit);
        // YSON streams straight from the file; the other formats need the whole input.
        return match input_path {
            Some(path) => {
                let file = fs::File::open(path).map_err(|e| e.to_string())?;
                libyson::load(io::BufReader::new(file), &options)
            }
            None => libyson::load(io::stdin().lock(), &options),
        }
        .map_err(|e| e.to_string());
    }

    let mut input = Vec::new();
    match input_path {
        Some(path) => input = fs::read(path).map_err(|e| e.to_string())?,
        None => {
            io::stdin()
                .read_to_end(&mut input)
                .map_err(|e| format!("Error reading stdin: {}", e))?;
        }
    }
    debug!("decoding {} bytes of {:?}", input.len(), cli.from);
    match cli.from {
        InputFormat::Json => transcode::json::decode(&input),
        InputFormat::Yaml => transcode::yaml::decode(&input),
        InputFormat::Toml => transcode::toml::decode(&input),
        InputFormat::Cbor => transcode::cbor::decode(&input),
        InputFormat::Yson => unreachable!("handled above"),
    }
}

fn encode_output(cli: &Cli, node: &Node) -> Result<Vec<u8>, String> {
    if let Some(format) = cli.to.yson() {
        let options = DumpOptions::default()
            .format(format)
            .yson_type(cli.yson_type)
            .encoding(cli.encoding)
            .sort_keys(cli.sort_keys);
        let mut out = libyson::dumps(node, &options).map_err(|e| e.to_string())?;
        // Fragments already end with a newline in the text formats.
        if format != Format::Binary && cli.yson_type == YsonType::Node {
            out.push(b'\n');
        }
        return Ok(out);
    }

    let text = match cli.to {
        OutputFormat::Json => transcode::json::encode(node)?,
        OutputFormat::Yaml => transcode::yaml::encode(node)?,
        OutputFormat::Toml => transcode::toml::encode(node)?,
        OutputFormat::Cbor => return transcode::cbor::encode(node),
        _ => unreachable!("YSON formats handled above"),
    };
    let mut out = text.into_bytes();
    if !out.ends_with(b"\n") {
        out.push(b'\n');
    }
    Ok(out)
}
