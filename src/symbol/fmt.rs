use super::{Interner, Symbol, SymbolExt};
use crate::{fmt::Display, term::color};


impl<'a> Display<'a> for Symbol {
	type Context = &'a Interner;

	fn fmt(&self, f: &mut std::fmt::Formatter<'_>, context: Self::Context) -> std::fmt::Result {
		match context.resolve(*self) {
			Some(ident) => std::fmt::Display::fmt(&color::Fg(color::Green, ident), f),
			None => write!(f, "<unresolved symbol #{}>", self.to_usize()),
		}
	}
}
