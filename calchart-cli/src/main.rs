#![allow(dead_code)]

use clap::{Parser, Subcommand};
use std::error::Error;
use std::fs;
use std::path::PathBuf;

use calchart_anim::Animation;
use calchart_show::{RejectUnknownVersion, Show};

#[derive(Parser)]
#[command(name = "calchart", about = "Inspect, compile, and seek CalChart show files")]
struct Opts {
    #[command(subcommand)]
    subcommand: SubCommand,
}

#[derive(Subcommand)]
enum SubCommand {
    /// Decode a show file and print its top-level structure.
    Inspect(Inspect),
    /// Decode and compile a show, reporting per-sheet continuity errors.
    Compile(Compile),
    /// Decode, compile, and seek to a specific (sheet, beat), printing
    /// every marcher's resulting position, facing, and collisions.
    Seek(Seek),
}

#[derive(Parser)]
struct Inspect {
    input: PathBuf,
}

#[derive(Parser)]
struct Compile {
    input: PathBuf,
}

#[derive(Parser)]
struct Seek {
    input: PathBuf,
    sheet: usize,
    beat: u32,
}

fn load_show(path: &PathBuf) -> Result<Show, Box<dyn Error>> {
    let bytes = fs::read(path)?;
    Ok(Show::decode(&bytes, &RejectUnknownVersion)?)
}

fn run() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let opts = Opts::parse();

    match opts.subcommand {
        SubCommand::Inspect(c) => {
            let show = load_show(&c.input)?;
            println!("marchers: {}", show.num_marchers);
            println!("sheets: {}", show.sheets.len());
            println!("current sheet: {}", show.current_sheet);
            for (i, sheet) in show.sheets.iter().enumerate() {
                println!("  [{}] {:?} ({} beats)", i, sheet.name, sheet.beats);
            }
        }
        SubCommand::Compile(c) => {
            let show = load_show(&c.input)?;
            let anim = Animation::compile(&show)?;
            println!("compiled {} sheet(s)", anim.num_sheets());
        }
        SubCommand::Seek(c) => {
            let show = load_show(&c.input)?;
            let mut anim = Animation::compile(&show)?;
            anim.seek(c.sheet, c.beat)?;
            for (i, state) in anim.states().iter().enumerate() {
                println!(
                    "marcher {}: position=({}, {}) facing={:.1} style={:?}",
                    i, state.position.x, state.position.y, state.facing, state.step_style
                );
            }
            let collisions = anim.collisions();
            if collisions.is_empty() {
                println!("no collisions");
            } else {
                for (a, b) in collisions {
                    println!("collision: marcher {} and marcher {}", a, b);
                }
            }
        }
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    match run() {
        Err(e) => Err(e.to_string().into()),
        Ok(_) => Ok(()),
    }
}
