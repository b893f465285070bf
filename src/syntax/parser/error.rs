use std::io;

use crate::{
	fmt::{self, Display as _},
	scope::{EntryKind, VarType},
	symbol::{Interner, Symbol},
};
use super::Keyword;


/// A parser error: the first one encountered aborts the file. Most grammar
/// mismatches carry a fixed message; errors involving identifiers or types
/// carry them for interpolation.
#[derive(Debug)]
pub enum Error {
	/// A grammar production did not find what it required.
	Syntax(&'static str),
	/// A declaration names a type that does not exist.
	UnknownType { name: Symbol },
	/// A name clashes with one already defined in the same scope.
	Redefined { name: Symbol, kind: EntryKind },
	/// Assignment with differing left- and right-hand types.
	TypeMismatch,
	/// `<` or `>` on an unordered pair of types.
	InvalidComparison,
	/// `=` is statically rejected on reals.
	RealEquality,
	/// Arithmetic on a pair of types it is not defined for.
	InvalidOperand,
	/// `and`/`or` on non-boolean operands.
	BooleanExpected { combinator: Keyword },
	/// A function's return type does not match the value it feeds.
	ReturnTypeMismatch,
	/// An identifier that does not resolve to a variable.
	NotAVariable { name: Symbol },
	/// A reference parameter was not given a variable name.
	ReferenceExpected { parameter: Symbol },
	/// A value argument of the wrong type.
	ArgumentTypeMismatch {
		parameter: Symbol,
		found: VarType,
		expected: VarType,
	},
	/// A reference argument of the wrong type.
	ReferenceTypeMismatch {
		routine: Symbol,
		found: VarType,
		expected: VarType,
	},
	/// Too few arguments in a function call.
	ArgumentCount {
		routine: Symbol,
		found: usize,
		expected: usize,
	},
	/// An integer literal that does not fit the target word.
	InvalidInteger { lexeme: Box<str> },
	/// A real literal that does not parse.
	InvalidReal { lexeme: Box<str> },
	/// Division by zero while folding constants.
	DivisionByZero,
	/// The expression needs more than the four temporaries.
	TooComplicated,
	/// A variable read with no free register.
	RegistersExhausted,
	/// A value was needed in a register, but none is live; comparison
	/// results, for one, cannot be stored.
	NoValueRegister,
	/// The listing could not be written.
	Io(io::Error),
}


impl std::error::Error for Error {}


impl<'a> fmt::Display<'a> for Error {
	type Context = &'a Interner;

	fn fmt(&self, f: &mut std::fmt::Formatter<'_>, context: Self::Context) -> std::fmt::Result {
		if let Self::Io(error) = self {
			return write!(f, "cannot write listing: {}", error);
		}

		write!(f, "Bad code: ")?;

		match self {
			Self::Syntax(message) => write!(f, "{}", message),

			Self::UnknownType { name } => {
				write!(f, "type '")?;
				name.fmt(f, context)?;
				write!(f, "' is not valid")
			}

			Self::Redefined { name, kind } => {
				write!(f, "{} '", kind)?;
				name.fmt(f, context)?;
				write!(f, "' already defined")
			}

			Self::TypeMismatch => write!(f, "type mismatch"),

			Self::InvalidComparison => write!(f, "invalid comparison in expression"),

			Self::RealEquality => {
				write!(f, "equivalence comparison cannot be performed on reals")
			}

			Self::InvalidOperand => {
				write!(f, "invalid type on left- or right-hand side of expression")
			}

			Self::BooleanExpected { combinator } => {
				write!(f, "expected type boolean for conjunctive '{}'", combinator)
			}

			Self::ReturnTypeMismatch => write!(f, "return type doesn't match variable type"),

			Self::NotAVariable { name } => {
				write!(f, "identifier '")?;
				name.fmt(f, context)?;
				write!(f, "' is not a variable")
			}

			Self::ReferenceExpected { parameter } => {
				write!(f, "parameter '")?;
				parameter.fmt(f, context)?;
				write!(f, "' expects reference")
			}

			Self::ArgumentTypeMismatch { parameter, found, expected } => {
				write!(f, "parameter '")?;
				parameter.fmt(f, context)?;
				write!(f, "' got datatype {}, but expected {}", found, expected)
			}

			Self::ReferenceTypeMismatch { routine, found, expected } => {
				write!(
					f,
					"type of variable ({}) does not match type of parameter ({}) within function declaration '",
					found, expected,
				)?;
				routine.fmt(f, context)?;
				write!(f, "'")
			}

			Self::ArgumentCount { routine, found, expected } => {
				write!(f, "function '")?;
				routine.fmt(f, context)?;
				write!(f, "' got {} parameters, but expected {}", found, expected)
			}

			Self::InvalidInteger { lexeme } => write!(f, "integer '{}' is not valid", lexeme),

			Self::InvalidReal { lexeme } => write!(f, "decimal '{}' is not valid", lexeme),

			Self::DivisionByZero => write!(f, "division by zero in constant expression"),

			Self::TooComplicated => write!(f, "expression is too complicated"),

			Self::RegistersExhausted => write!(f, "exceeded available registers"),

			Self::NoValueRegister => {
				write!(f, "expression does not leave a value in a register")
			}

			Self::Io(_) => Ok(()),
		}
	}
}


/// We need this in order to be able to implement std::error::Error.
impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		fmt::Display::fmt(self, f, &Interner::new())
	}
}
