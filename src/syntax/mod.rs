pub mod lexer;
pub mod parser;
mod source;

use std::{
	fs::File,
	io::{self, BufWriter},
	path::Path,
};

use crate::{
	fmt::{self, Display as _},
	symbol,
};
use lexer::{Cursor, Lexer};
use parser::Parser;
pub use source::Source;


/// An error from any stage of a compilation, including opening the input
/// and creating the listing beside it.
#[derive(Debug)]
pub enum Error {
	Lexer(lexer::Error),
	Parser(parser::Error),
	Io(io::Error),
}


impl std::error::Error for Error {}


impl From<io::Error> for Error {
	fn from(error: io::Error) -> Self {
		Self::Io(error)
	}
}


impl<'a> fmt::Display<'a> for Error {
	type Context = &'a symbol::Interner;

	fn fmt(&self, f: &mut std::fmt::Formatter<'_>, context: Self::Context) -> std::fmt::Result {
		match self {
			Self::Lexer(error) => std::fmt::Display::fmt(error, f),
			Self::Parser(error) => error.fmt(f, context),
			Self::Io(error) => std::fmt::Display::fmt(error, f),
		}
	}
}


/// We need this in order to be able to implement std::error::Error.
impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		fmt::Display::fmt(self, f, &symbol::Interner::new())
	}
}


/// Token accounting for a finished parse, checked by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
	/// Tokens the parser consumed.
	pub consumed: u64,
	/// Tokens the lexer produced.
	pub produced: u64,
	/// Whether grouping and block depths returned to zero.
	pub balanced: bool,
}


impl Report {
	pub fn is_good(&self) -> bool {
		self.consumed == self.produced && self.balanced
	}
}


/// Compile the file at `path`, writing a `.lst` listing next to it.
pub fn compile_file(path: &Path, interner: &mut symbol::Interner) -> Result<Report, Error> {
	let source = Source::from_path(path)?;

	let listing = source.path.with_extension("lst");
	let output = BufWriter::new(File::create(listing)?);

	compile(&source, interner, output)
}


/// Compile a single source file, writing the listing to `output`.
pub fn compile<W>(
	source: &Source,
	interner: &mut symbol::Interner,
	output: W,
) -> Result<Report, Error>
where
	W: io::Write,
{
	let cursor = Cursor::from(source);
	let lexer = Lexer::new(cursor, interner).map_err(Error::Lexer)?;

	let parser = Parser::new(lexer, interner, output).map_err(Error::Parser)?;
	parser.parse().map_err(Error::Parser)
}
