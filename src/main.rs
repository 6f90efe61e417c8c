//! mtfw CLI
//!
//! Command-line tool for inspecting and modifying MT-family adapter
//! firmware images.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mtfw_tools::{
    FwImage, HumanFormatter, JsonFormatter, ReportFormatter, SectionSelector, ShortFormatter,
};
use std::path::PathBuf;
use std::process::ExitCode;

/// Firmware image analysis and modification for MT-family adapters.
///
/// Parses FS3/FS4 firmware images, verifies their checksums, decodes the
/// embedded metadata, replaces sections, and disassembles images into
/// parts that reassemble byte-exactly.
#[derive(Parser, Debug)]
#[command(name = "mtfw")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output (enables debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the sections of an image and verify their checksums
    Sections {
        /// Image file to inspect
        image: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "human")]
        format: OutputFormat,
    },
    /// Decode the firmware metadata record
    Query {
        /// Image file to inspect
        image: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "human")]
        format: OutputFormat,
    },
    /// Replace one section and re-stamp affected checksums and pointers
    Replace {
        /// Image file to rewrite
        image: PathBuf,

        /// Section to replace: registry name, 0x-prefixed type code, or
        /// list index
        #[arg(short, long)]
        section: String,

        /// File holding the replacement payload
        #[arg(short = 'w', long)]
        with: PathBuf,

        /// Where to write the rewritten image
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Disassemble an image into a manifest plus one blob per chunk
    Dump {
        /// Image file to disassemble
        image: PathBuf,

        /// Directory for the manifest and blobs
        #[arg(short = 'd', long, default_value = "dump")]
        out_dir: PathBuf,

        /// Extract a single section's payload instead of a full dump
        #[arg(short, long, requires = "output")]
        section: Option<String>,

        /// Output file for --section
        #[arg(short, long, requires = "section")]
        output: Option<PathBuf>,
    },
    /// Rebuild an image from a dump directory
    Assemble {
        /// Directory holding manifest.json and the blobs
        dir: PathBuf,

        /// Where to write the rebuilt image
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
    /// Compact tab-separated output
    Short,
}

impl OutputFormat {
    fn formatter(self) -> Box<dyn ReportFormatter> {
        match self {
            OutputFormat::Human => Box::new(HumanFormatter::new()),
            OutputFormat::Json => Box::new(JsonFormatter::new()),
            OutputFormat::Short => Box::new(ShortFormatter::new()),
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("mtfw_tools=debug")
            .init();
    }

    match run(&args.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: &Command) -> Result<ExitCode> {
    match command {
        Command::Sections { image, format } => {
            let mut fw = FwImage::open(image)
                .with_context(|| format!("cannot parse {}", image.display()))?;
            let report = fw.verify();
            emit(&format.formatter().format_report(&report, image));
            // FAIL / NO ENTRY / NOT FOUND rows make the listing exit
            // non-zero; ENCRYPTED and SIZE NOT ALIGNED do not.
            if report.has_fatal() {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Command::Query { image, format } => {
            let mut fw = FwImage::open(image)
                .with_context(|| format!("cannot parse {}", image.display()))?;
            let meta = fw
                .metadata()
                .with_context(|| format!("cannot decode metadata of {}", image.display()))?;
            emit(&format.formatter().format_metadata(&meta, image));
            Ok(ExitCode::SUCCESS)
        }
        Command::Replace {
            image,
            section,
            with,
            output,
        } => {
            let selector: SectionSelector = section.parse()?;
            let replacement = std::fs::read(with)
                .with_context(|| format!("cannot read replacement {}", with.display()))?;
            let mut fw = FwImage::open(image)
                .with_context(|| format!("cannot parse {}", image.display()))?;
            // Any rewrite failure aborts here, before the output file exists.
            let rewritten = fw.replace_section(&selector, &replacement)?;
            std::fs::write(output, rewritten)
                .with_context(|| format!("cannot write {}", output.display()))?;
            println!("wrote {}", output.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Dump {
            image,
            out_dir,
            section,
            output,
        } => {
            let mut fw = FwImage::open(image)
                .with_context(|| format!("cannot parse {}", image.display()))?;
            if let (Some(section), Some(output)) = (section, output) {
                let selector: SectionSelector = section.parse()?;
                let payload = fw.section_payload(&selector)?;
                std::fs::write(output, payload)
                    .with_context(|| format!("cannot write {}", output.display()))?;
                println!("wrote {}", output.display());
            } else {
                let manifest = fw.disassemble(out_dir)?;
                println!(
                    "wrote {} chunks to {}",
                    manifest.chunks.len(),
                    out_dir.display()
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Assemble { dir, output } => {
            let bytes = mtfw_tools::assemble(dir)?;
            std::fs::write(output, bytes)
                .with_context(|| format!("cannot write {}", output.display()))?;
            println!("wrote {}", output.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn emit(text: &str) {
    if text.ends_with('\n') {
        print!("{text}");
    } else {
        println!("{text}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::try_parse_from(["mtfw", "sections", "fw.bin"]).unwrap();
        assert!(matches!(args.command, Command::Sections { .. }));
        assert!(!args.verbose);
    }

    #[test]
    fn test_format_options() {
        let args = Args::try_parse_from(["mtfw", "sections", "-f", "json", "fw.bin"]).unwrap();
        let Command::Sections { format, .. } = args.command else {
            panic!("wrong subcommand");
        };
        assert!(matches!(format, OutputFormat::Json));
    }

    #[test]
    fn test_replace_args() {
        let args = Args::try_parse_from([
            "mtfw", "replace", "fw.bin", "--section", "ROM_CODE", "--with", "rom.bin",
            "--output", "out.bin",
        ])
        .unwrap();
        let Command::Replace { section, .. } = args.command else {
            panic!("wrong subcommand");
        };
        assert_eq!(section, "ROM_CODE");
    }

    #[test]
    fn test_dump_section_requires_output() {
        assert!(
            Args::try_parse_from(["mtfw", "dump", "fw.bin", "--section", "ROM_CODE"]).is_err()
        );
    }

    #[test]
    fn test_global_verbose() {
        let args = Args::try_parse_from(["mtfw", "query", "fw.bin", "--verbose"]).unwrap();
        assert!(args.verbose);
    }
}
