//! `ashdec` — extract an `ASH0` file back to its raw contents.

use ash0::DecoderBuilder;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::{env, process};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn usage() -> ! {
    println!("ashdec v{}\n", VERSION);
    println!("Usage: ashdec <infile> [optional arguments]\n");
    println!("Arguments:");
    println!(" -o <f> Specify output file path");
    println!(" -d <n> Specify distance tree bits  (default: 11)");
    println!(" -l <n> Specify length tree bits    (default:  9)");
    println!(" -v     Verbose output");
    println!();
    process::exit(1);
}

fn numeric_arg(args: &[String], i: usize) -> u32 {
    match args.get(i).and_then(|s| s.parse().ok()) {
        Some(n) => n,
        None => usage(),
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args[1].starts_with('-') {
        usage();
    }

    let inpath = &args[1];
    let mut outpath: Option<String> = None;
    // These work for ASH0 files found in the System Menu and Animal
    // Crossing: City Folk. My Pokémon Ranch wants -d 15.
    let mut sym_bits: u32 = 9;
    let mut dist_bits: u32 = 11;
    let mut level = LevelFilter::Warn;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "-o" => {
                i += 1;
                match args.get(i) {
                    Some(path) => outpath = Some(path.clone()),
                    None => usage(),
                }
            }
            "-d" => {
                i += 1;
                dist_bits = numeric_arg(&args, i);
            }
            "-l" => {
                i += 1;
                sym_bits = numeric_arg(&args, i);
            }
            "-v" => level = LevelFilter::Debug,
            _ => usage(),
        }
        i += 1;
    }

    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .unwrap();

    // if no output file is specified, append .arc to the input name
    let outpath = outpath.unwrap_or_else(|| format!("{}.arc", inpath));

    let result = DecoderBuilder::for_file(inpath).and_then(|mut dec| {
        dec.sym_bits(sym_bits)
            .dist_bits(dist_bits)
            .decode_to_file(&outpath)
    });

    match result {
        Ok(()) => info!("extracted {} to {}", inpath, outpath),
        Err(e) => {
            eprintln!("ashdec: {}", e);
            process::exit(1);
        }
    }
}
