mod args;
mod codegen;
mod fmt;
mod scope;
mod symbol;
mod syntax;
mod term;

use std::path::Path;

use term::color;


/// The input compiled when no path is given on the command line.
const DEFAULT_FILE: &str = "code.txt";


fn main() {
	let command = match args::parse(std::env::args_os()) {
		Ok(command) => command,
		Err(error) => {
			eprintln!("{}", error.message);
			std::process::exit(2);
		}
	};

	match command {
		args::Command::Help(message) | args::Command::Version(message) => println!("{}", message),
		args::Command::Run(args) => std::process::exit(run(args)),
	}
}


/// Compile each input in sequence. A failure is reported per file and does
/// not stop the batch. The exit code only reflects failures when running on
/// the default input.
fn run(args: args::Args) -> i32 {
	if args.files.is_empty() {
		return if compile_file(Path::new(DEFAULT_FILE)) { 0 } else { 1 };
	}

	for file in &args.files {
		compile_file(file);
	}

	0
}


/// Compile one file, writing its listing next to it, and report the outcome.
/// Returns whether the file compiled cleanly.
fn compile_file(path: &Path) -> bool {
	let mut interner = symbol::Interner::new();

	match syntax::compile_file(path, &mut interner) {
		Ok(report) if report.is_good() => {
			println!(
				"{}: Good code (parsed {}/{} tokens)",
				path.display(),
				report.consumed,
				report.produced,
			);
			true
		}

		Ok(report) => {
			eprintln!(
				"{}: Bad code (parsed {}/{} tokens)",
				path.display(),
				report.consumed,
				report.produced,
			);
			false
		}

		Err(error) => {
			report_error(path, &fmt::Show(&error, &interner));
			false
		}
	}
}


fn report_error(path: &Path, error: &dyn std::fmt::Display) {
	eprintln!(
		"{}: {}: {}",
		path.display(),
		color::Fg(color::Red, "error"),
		error,
	);
}
