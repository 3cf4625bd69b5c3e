use std::process::ExitCode;

use as_lib::assemble;
use common::constants::DEFAULT_ORIGIN;
use common::program::Program;

use clap::Parser;
use clap_stdin::FileOrStdin;

/// 8086 Assembler
#[derive(Parser)]
#[command(about)]
struct Args {
    /// Input assembly file
    input: FileOrStdin,

    /// Origin address, in hex
    #[arg(long, short, default_value_t = format!("{DEFAULT_ORIGIN:X}"))]
    origin: String,

    /// Print only the raw bytes, space separated
    #[arg(long)]
    raw: bool,

    /// Print the label table
    #[arg(long)]
    dump_labels: bool,
}

fn print_labels(prog: &Program) {
    let mut labels: Vec<_> = prog.labels.iter().collect();
    labels.sort_by_key(|(_, addr)| **addr);
    eprintln!("labels:");
    for (k, v) in labels {
        eprintln!("{k}:\t{v:04X}");
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    let input = match args.input.contents() {
        Ok(input) => input,
        Err(e) => {
            eprintln!("Error reading input: {e}");
            return ExitCode::FAILURE;
        }
    };
    let Some(origin) = as_lib::misc::parse_hex(&args.origin) else {
        eprintln!("Bad origin {}", args.origin);
        return ExitCode::FAILURE;
    };

    let prog = match assemble(input.as_str(), origin) {
        Ok(prog) => prog,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if args.dump_labels {
        print_labels(&prog);
    }

    if args.raw {
        let bytes: Vec<String> = prog.text().iter().map(|b| format!("{b:02X}")).collect();
        println!("{}", bytes.join(" "));
    } else {
        for line in &prog.listing {
            println!("{line}");
        }
    }
    ExitCode::SUCCESS
}
