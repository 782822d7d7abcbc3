//! Read stylesheets and print how they are composed from their included and
//! imported documents.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use xslinc::{
    error::StylesheetError,
    io::path_to_uri,
    processor::{
        ProcessorConfig, ProcessorOption, Stylesheet, StylesheetHandler, StylesheetType,
        DEFAULT_MAX_DEPTH,
    },
};

// Exit codes.
const RETURN_OK: u8 = 0; // No error
const ERR_INCLUDE: u8 = 1; // Some inclusions failed
const ERR_RDFILE: u8 = 4; // A stylesheet could not be read

#[derive(Parser, Debug)]
#[command(version, name = "xslinc", arg_required_else_help = true)]
struct CmdArgs {
    /// stylesheet files or URIs, "-" reads the standard input
    #[clap(required = true)]
    xsl_files: Vec<String>,
    /// refuse to fetch documents over the network
    #[arg(long)]
    nonet: bool,
    /// do not load external entities
    #[arg(long)]
    noextent: bool,
    /// stop at the first inclusion that fails
    #[arg(long)]
    abort: bool,
    /// the maximum nesting of inclusions
    #[arg(long, value_name = "depth", default_value_t = DEFAULT_MAX_DEPTH)]
    maxdepth: usize,
    /// print the content of every document read
    #[arg(long)]
    dump: bool,
    /// don't output the outline of the stylesheets
    #[arg(long)]
    noout: bool,
}

impl CmdArgs {
    fn config(&self) -> ProcessorConfig {
        let mut options = 0;
        if self.nonet {
            options |= ProcessorOption::NoNet as i32;
        }
        if self.noextent {
            options |= ProcessorOption::NoExtEnt as i32;
        }
        if self.abort {
            options |= ProcessorOption::Abort as i32;
        }
        ProcessorConfig::new()
            .with_options(options)
            .with_max_depth(self.maxdepth)
    }
}

/// Turn a command line argument into a system identifier.
fn system_id(arg: &str) -> anyhow::Result<String> {
    if arg == "-" || arg.contains("://") || arg.starts_with("file:") {
        return Ok(arg.to_owned());
    }
    path_to_uri(arg).with_context(|| format!("cannot locate {arg}"))
}

fn print_outline(sheet: &Stylesheet, indent: usize, dump: bool) {
    let label = match sheet.kind() {
        StylesheetType::TopLevel => "",
        StylesheetType::Include => "include ",
        StylesheetType::Import => "import ",
    };
    println!(
        "{:indent$}{label}{}",
        "",
        sheet.system_id().unwrap_or("(memory)"),
        indent = indent * 2
    );
    if dump {
        println!("{}", sheet.tree());
    }
    for child in sheet.children() {
        print_outline(child, indent + 1, dump);
    }
}

fn process(args: &CmdArgs, arg: &str) -> anyhow::Result<u8> {
    let system_id = system_id(arg)?;
    let mut handler = StylesheetHandler::new(args.config());
    let sheet = match handler.parse_file(&system_id) {
        Ok(sheet) => sheet,
        Err(StylesheetError::Include(err)) => {
            // aborted at a failed inclusion, already reported
            tracing::debug!(href = err.href(), "stylesheet aborted");
            return Ok(ERR_INCLUDE);
        }
        Err(err) => return Err(err).with_context(|| format!("failed to read {arg}")),
    };
    if !args.noout {
        print_outline(&sheet, 0, args.dump);
    }
    Ok(if handler.errors().is_empty() {
        RETURN_OK
    } else {
        ERR_INCLUDE
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CmdArgs::parse();
    let mut status = RETURN_OK;
    for arg in &args.xsl_files {
        match process(&args, arg) {
            Ok(code) => status = status.max(code),
            Err(err) => {
                eprintln!("{err:#}");
                status = status.max(ERR_RDFILE);
            }
        }
    }
    ExitCode::from(status)
}
