use std::process::ExitCode;

use as_lib::misc::parse_hex;
use common::constants::{DEFAULT_MAX_STEPS, DEFAULT_ORIGIN};
use interp::{Session, StepResult};

use clap::Parser;
use clap_stdin::FileOrStdin;

/// 8086 Assembly Interpreter
#[derive(Parser)]
#[command(about)]
struct Args {
    /// Input assembly file
    input: FileOrStdin,

    /// Origin address, in hex [default: 1000]
    #[arg(long, short, value_parser = hex_arg)]
    origin: Option<u32>,

    /// Address at which to start executing, in hex. Defaults to the origin
    #[arg(long, value_parser = hex_arg)]
    start: Option<u32>,

    /// Stop after this many instructions
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: usize,

    /// Print the registers after every instruction
    #[arg(long)]
    step: bool,

    /// Print the assembled listing before running
    #[arg(long)]
    listing: bool,

    /// Print the label table
    #[arg(long)]
    dump_labels: bool,

    /// Write bytes to memory before assembling, as ADDR:HEXBYTES (e.g. 3000:48656c6c6f)
    #[arg(long, value_parser = poke_arg)]
    poke: Vec<(u32, Vec<u8>)>,

    /// Dump memory after running, as ADDR:LEN (address in hex)
    #[arg(long, value_parser = mem_range_arg)]
    dump_mem: Vec<(u32, usize)>,
}

fn hex_arg(s: &str) -> Result<u32, String> {
    parse_hex(s).ok_or_else(|| format!("Invalid hex address {s}"))
}

fn mem_range_arg(s: &str) -> Result<(u32, usize), String> {
    let Some((addr, len)) = s.split_once(':') else {
        return Err(format!("Expected ADDR:LEN, got {s}"));
    };
    let len = len.parse::<usize>().map_err(|e| format!("Invalid length {len}: {e}"))?;
    Ok((hex_arg(addr)?, len))
}

// Whitespace between bytes is ignored.
fn poke_arg(s: &str) -> Result<(u32, Vec<u8>), String> {
    let Some((addr, bytes)) = s.split_once(':') else {
        return Err(format!("Expected ADDR:HEXBYTES, got {s}"));
    };
    let digits: Vec<u8> = bytes.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return Err(format!("Expected an even number of hex digits, got {bytes}"));
    }
    let data = digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("Invalid hex byte in {bytes}"))
        })
        .collect::<Result<Vec<u8>, String>>()?;
    Ok((hex_arg(addr)?, data))
}

fn dump_mem(session: &Session, addr: u32, len: usize) {
    for row in (0..len).step_by(16) {
        let start = addr.wrapping_add(row as u32);
        let bytes: Vec<String> = (0..16usize.min(len - row))
            .map(|i| format!("{:02X}", session.mem_read_byte(start.wrapping_add(i as u32))))
            .collect();
        println!("{start:05X}: {}", bytes.join(" "));
    }
}

// Single-steps, printing state as it goes.
fn step_all(session: &mut Session, max_steps: usize) -> Result<(), interp::SessionError> {
    for _ in 0..max_steps {
        match session.step()? {
            StepResult::Executed { trace, snapshot } => {
                println!("{:04X}  {}", trace.addr, trace.line);
                println!("      {snapshot}");
            }
            StepResult::Halted(_) => return Ok(()),
        }
    }
    eprintln!("Stopped after {max_steps} instructions");
    Ok(())
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

    let mut session = Session::new();
    for (addr, data) in &args.poke {
        session.mem_write_bytes(*addr, data);
    }
    if let Err(e) = session.assemble(input.as_str(), args.origin.unwrap_or(DEFAULT_ORIGIN)) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    if args.listing {
        if let Some(prog) = session.program() {
            for line in &prog.listing {
                println!("{line}");
            }
        }
    }

    if args.dump_labels {
        if let Some(prog) = session.program() {
            let mut labels: Vec<_> = prog.labels.iter().collect();
            labels.sort_by_key(|(_, addr)| **addr);
            eprintln!("labels:");
            for (k, v) in labels {
                eprintln!("{k}:\t{v:04X}");
            }
        }
    }

    let result = if args.step {
        args.start
            .map_or(Ok(()), |start| session.seek(start))
            .and_then(|()| step_all(&mut session, args.max_steps))
    } else {
        session.run(args.start, args.max_steps).map(|summary| {
            for trace in &summary.trace {
                println!("{:04X}  {}", trace.addr, trace.line);
            }
            if summary.max_steps_reached {
                eprintln!("Stopped after {} instructions", summary.steps);
            }
        })
    };

    if let Err(e) = result {
        eprintln!("{e}");
        println!("{}", session.snapshot());
        return ExitCode::FAILURE;
    }

    println!("{}", session.snapshot());
    eprintln!("Executed {} instructions", session.num_ins());
    for (addr, len) in args.dump_mem {
        dump_mem(&session, addr, len);
    }
    ExitCode::SUCCESS
}
