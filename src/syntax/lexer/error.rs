use std::fmt::{self, Display};

use super::State;


/// A lexical error. Lexing is all-or-nothing: the first bad byte aborts the
/// file. Positions are byte offsets; there is no line tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
	/// A byte with no transition out of the current state.
	Unexpected {
		byte: u8,
		state: State,
		previous: State,
		lexeme: Box<str>,
		offset: usize,
	},
	/// The automaton accepted in a state that emits no token class, such as a
	/// real literal cut short before its rational part or exponent is whole.
	BadAccept {
		state: State,
		lexeme: Box<str>,
		offset: usize,
	},
}


impl Error {
	pub fn unexpected(byte: u8, state: State, previous: State, lexeme: &str, offset: usize) -> Self {
		Self::Unexpected {
			byte,
			state,
			previous,
			lexeme: lexeme.into(),
			offset,
		}
	}


	pub fn bad_accept(state: State, lexeme: &str, offset: usize) -> Self {
		Self::BadAccept {
			state,
			lexeme: lexeme.into(),
			offset,
		}
	}
}


impl std::error::Error for Error {}


impl Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Unexpected { byte, state, previous, lexeme, offset } => write!(
				f,
				"invalid token at offset {}: byte {} has no transition in state {:?}, reached from state {:?}; got '{}'",
				offset, byte, state, previous, lexeme,
			),

			Self::BadAccept { state, lexeme, offset } => write!(
				f,
				"invalid token at offset {}: cannot produce a token from state {:?}; got '{}'",
				offset, state, lexeme,
			),
		}
	}
}
