use std::io::{self, BufRead, Write};
use std::process::exit;

use skiff::{Error, VM};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    match args.len() {
        1 => repl(),
        2 => run_file(&args[1]),
        _ => {
            eprintln!("Usage: skiff [path]");
            exit(64);
        }
    }
}

fn repl() {
    let mut vm = VM::default();
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush().expect("stdout is writable");
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                // Errors were already reported; the prompt just continues.
                let _ = vm.interpret(&line);
            }
            Err(err) => {
                eprintln!("Could not read input: {}", err);
                exit(74);
            }
        }
    }
}

fn run_file(path: &str) {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read file \"{}\": {}", path, err);
            exit(74);
        }
    };
    let mut vm = VM::default();
    match vm.interpret(&source) {
        Ok(()) => {}
        Err(Error::Compile) => exit(65),
        Err(Error::Runtime(_)) => exit(70),
    }
}
