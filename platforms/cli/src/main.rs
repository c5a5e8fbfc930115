use clap::Parser;
use std::io::BufRead;
use std::path::Path;
use std::process::ExitCode;

use tapestry::loader::ProgramLoader;
use tapestry::machine::Machine;
use tapestry::programs::ProgramManager;
use tapestry::types::{Halt, Program, Step};

#[derive(Parser)]
#[clap(author, version, about, long_about = None, arg_required_else_help = true)]
struct Cli {
    /// The machine specification file to execute
    #[clap(short, long, conflicts_with = "builtin")]
    file: Option<String>,

    /// Run one of the built-in demo programs by name
    #[clap(short, long)]
    builtin: Option<String>,

    /// List the built-in demo programs and exit
    #[clap(short, long)]
    list: bool,

    /// Print each step of the execution; on a terminal, pause for Enter
    /// between steps
    #[clap(short = 'd', long)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.list {
        return list_builtins();
    }

    let program = match load(&cli) {
        Ok(program) => program,
        Err(message) => {
            eprintln!("error: {message}");
            return ExitCode::from(1);
        }
    };

    let mut machine = Machine::new(program);
    let halt = if cli.debug {
        debug_run(&mut machine)
    } else {
        machine.run()
    };

    for tape in machine.tapes() {
        println!("{}", tape.join(""));
    }

    match halt {
        Halt::Ok => ExitCode::SUCCESS,
        Halt::Err(fault) => {
            eprintln!("machine fault: {fault}");
            ExitCode::from(2)
        }
    }
}

fn load(cli: &Cli) -> Result<Program, String> {
    if let Some(path) = &cli.file {
        ProgramLoader::load_program(Path::new(path)).map_err(|err| err.to_string())
    } else if let Some(name) = &cli.builtin {
        ProgramManager::load_builtin_programs().map_err(|err| err.to_string())?;
        ProgramManager::get_by_name(name)
            .ok_or_else(|| format!("no built-in program named '{name}'"))
    } else {
        Err("pass --file <path> or --builtin <name>".to_string())
    }
}

fn list_builtins() -> ExitCode {
    if let Err(err) = ProgramManager::load_builtin_programs() {
        eprintln!("error: {err}");
        return ExitCode::from(1);
    }
    for info in ProgramManager::infos() {
        println!(
            "{}: {} ({} states, {} tapes, {} symbols)",
            info.index, info.name, info.state_count, info.tape_count, info.alphabet_size
        );
    }
    ExitCode::SUCCESS
}

fn debug_run(machine: &mut Machine) -> Halt {
    let interactive = atty::is(atty::Stream::Stdin);
    let stdin = std::io::stdin();

    print_step(machine);
    loop {
        if interactive {
            let mut line = String::new();
            let _ = stdin.lock().read_line(&mut line);
        }
        match machine.step() {
            Step::Continue => print_step(machine),
            Step::Halt(halt) => {
                println!("\nMachine halted.");
                return halt;
            }
        }
    }
}

fn print_step(machine: &Machine) {
    let tapes = machine
        .tapes()
        .iter()
        .map(|tape| tape.join(""))
        .collect::<Vec<String>>()
        .join(", ");

    println!(
        "Step: {}, State: {}, Tapes: [{}], Heads: {:?}",
        machine.step_count(),
        machine.state(),
        tapes,
        machine.heads()
    );
}
