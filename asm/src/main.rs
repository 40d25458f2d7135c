use color_print::cprintln;
use gxarch::{Isa, OverflowPolicy};
use gxasm::{config, error::print_warning, util, Assembler, Diag, Error};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(author, version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Source file
    input: PathBuf,

    /// Output image
    output: PathBuf,

    /// Built-in ISA revision: proto, base or ext
    #[clap(long, default_value = "base", value_parser = Isa::from_str)]
    isa: Isa,

    /// Load the ISA revision from a YAML file instead
    #[clap(long)]
    isa_config: Option<PathBuf>,

    /// Override the revision's overflow policy: reject or truncate
    #[clap(long, value_parser = OverflowPolicy::from_str)]
    overflow: Option<OverflowPolicy>,

    /// Dump assembly listing
    #[clap(short, long)]
    dump: bool,
}

fn fail(path: &str, lines: &[&str], diags: &[Diag]) -> ExitCode {
    for diag in diags {
        diag.print(path, lines);
    }
    cprintln!(
        "<red,bold>error</>: aborting due to {} error(s), nothing written",
        diags.len()
    );
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    use clap::Parser;

    let args = Args::parse();
    let input = args.input.display().to_string();
    println!("GraphX Assembler");

    println!("1. Load ISA Revision");
    let revision =
        match config::load_revision(args.isa, args.isa_config.as_deref(), args.overflow) {
            Ok(revision) => revision,
            Err(err) => return fail(&input, &[], &[Diag::global(err)]),
        };
    println!(
        "  = {} ({}-bit words, overflow: {})",
        revision.name(),
        revision.layout().word_bits,
        revision.overflow()
    );

    println!("2. Read File");
    println!("  < {}", input);
    let source = match std::fs::read_to_string(&args.input) {
        Ok(source) => source,
        Err(err) => return fail(&input, &[], &[Diag::global(Error::IoFailure(input.clone(), err))]),
    };
    let lines: Vec<&str> = source.lines().collect();

    println!("3. Resolve Labels & Generate Binary");
    println!("  > {}", args.output.display());
    let assembler = Assembler::new(revision);
    let assembly = match assembler.assemble_to_file(&source, &args.output) {
        Ok(assembly) => assembly,
        Err(diags) => return fail(&input, &lines, &diags),
    };
    for warning in assembly.warnings() {
        print_warning(&warning);
    }

    if args.dump {
        util::print_dump(&input, &lines, &assembly, assembler.revision());
    }

    cprintln!("<green,bold>[OK]</> Assembled {}", args.output.display());
    println!("    {}", util::summary(&assembly));
    ExitCode::SUCCESS
}
