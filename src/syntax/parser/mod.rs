mod error;
#[cfg(test)]
mod tests;

use std::{
	fmt,
	io::{self, Write},
};

use crate::{
	codegen::{Comparison, Listing, Literal, Registers, Sink, Value},
	scope::{Entry, EntryKind, Routine, SymbolTable, Variable, VarType, SCALAR_SIZE},
	symbol::{Interner, Symbol},
};
use super::{
	lexer::{Keyword, Lexer, Token},
	Report,
};
pub use error::Error;


/// The binary arithmetic operators, folded over literals or emitted over the
/// top two registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArithOp {
	Add,
	Sub,
	Mul,
	Div,
}


/// The parser. Grammar recognition, type checking and code emission happen
/// in a single traversal with one token of lookahead; there is no syntax
/// tree. Types are tracked on a compile-time value stack mirroring the
/// target's operand registers, and call arguments are emitted through
/// staging buffers so they can be reordered.
#[derive(Debug)]
pub struct Parser<'a, W> {
	lexer: Lexer,
	interner: &'a Interner,
	token: Option<Token>,
	index: u64,
	grouping_depth: u16,
	block_depth: u16,

	symtab: SymbolTable,
	temporaries: Vec<Symbol>,

	values: Vec<Value>,
	regs: Registers,
	listing: Listing<W>,

	last_comparison: Option<Comparison>,
	or_used: bool,
	for_while: bool,
	if_count: u64,
	while_count: u64,
	or_count: u64,
	conditional_stack: Vec<u64>,
	loop_stack: Vec<u64>,
}


impl<'a, W: io::Write> Parser<'a, W> {
	/// Create a parser over a lexed token queue. The listing is opened
	/// immediately: its prologue is on disk even if the parse later fails.
	pub fn new(lexer: Lexer, interner: &'a Interner, output: W) -> Result<Self, Error> {
		let listing = Listing::new(output).map_err(Error::Io)?;

		let mut parser = Self {
			lexer,
			interner,
			token: None,
			index: 0,
			grouping_depth: 0,
			block_depth: 0,

			symtab: SymbolTable::new(),
			temporaries: Vec::new(),

			values: Vec::new(),
			regs: Registers::new(),
			listing,

			last_comparison: None,
			or_used: false,
			for_while: false,
			if_count: 0,
			while_count: 0,
			or_count: 0,
			conditional_stack: Vec::new(),
			loop_stack: Vec::new(),
		};

		parser.token = parser.lexer.next();

		Ok(parser)
	}


	/// Parse the whole program, producing the token accounting for the
	/// driver.
	pub fn parse(mut self) -> Result<Report, Error> {
		self.program()?;

		let (produced, _) = self.lexer.counts();

		Ok(
			Report {
				consumed: self.index,
				produced,
				balanced: self.grouping_depth == 0 && self.block_depth == 0,
			}
		)
	}



	/// Consume the current token and fetch the next one.
	fn advance(&mut self) {
		self.index += 1;
		self.token = self.lexer.next();
	}


	fn is_special(&self, lexeme: &str) -> bool {
		matches!(&self.token, Some(Token::Special(special)) if &**special == lexeme)
	}


	fn is_keyword(&self, keyword: Keyword) -> bool {
		matches!(&self.token, Some(Token::ReservedWord(word)) if *word == keyword)
	}


	fn word(&self) -> Option<Symbol> {
		match &self.token {
			Some(Token::Word(name)) => Some(*name),
			_ => None,
		}
	}


	fn expect_special(&mut self, lexeme: &str, message: &'static str) -> Result<(), Error> {
		if self.is_special(lexeme) {
			self.advance();
			Ok(())
		} else {
			Err(Error::Syntax(message))
		}
	}


	fn resolve(&self, name: Symbol) -> &'a str {
		self.interner.resolve(name).unwrap_or("<unresolved>")
	}



	/// Write one instruction or label to the main listing.
	fn line(&mut self, line: fmt::Arguments) -> Result<(), Error> {
		self.listing.line(line).map_err(Error::Io)
	}


	/// Write one instruction or label to the active sink.
	fn emit(&mut self, sink: &mut Sink, line: fmt::Arguments) -> Result<(), Error> {
		match sink {
			Sink::Listing => self.listing.line(line).map_err(Error::Io),
			Sink::Stage(buffer) => writeln!(buffer, "{}", line).map_err(Error::Io),
		}
	}


	/// Write a staged run of instructions to the active sink.
	fn emit_raw(&mut self, sink: &mut Sink, bytes: &[u8]) -> Result<(), Error> {
		match sink {
			Sink::Listing => self.listing.raw(bytes).map_err(Error::Io),
			Sink::Stage(buffer) => {
				buffer.extend_from_slice(bytes);
				Ok(())
			}
		}
	}


	/// Emit the deferred load of a literal value into its register slot.
	/// Values without a literal are already in place.
	fn materialize(&mut self, sink: &mut Sink, value: Value, reg: &'static str) -> Result<(), Error> {
		match value.literal {
			Some(literal) => self.emit(sink, format_args!("MOV {}, {}", reg, literal)),
			None => Ok(()),
		}
	}


	fn pop_value(&mut self) -> Result<Value, Error> {
		self.values.pop().ok_or(Error::Syntax("malformed expression"))
	}



	fn program(&mut self) -> Result<(), Error> {
		if !self.is_keyword(Keyword::Program) {
			return Err(Error::Syntax("program keyword required to declare program"));
		}
		self.advance();

		if self.word().is_none() {
			return Err(Error::Syntax("expected word"));
		}
		self.advance();

		self.expect_special(";", "expected ';'")?;

		self.block()?;
		self.end_program()
	}


	/// Declarations, then frame setup, then the `begin ... end` body. The
	/// global block gets only the `kmain` entry label; subprogram blocks
	/// establish their own frame.
	fn block(&mut self) -> Result<(), Error> {
		self.declarations()?;

		if self.symtab.in_subprogram() {
			let locals = self.symtab.locals_size();

			self.line(format_args!("PUSH EDI"))?;
			self.line(format_args!("MOV EDI, ESP"))?;
			if locals != 0 {
				self.line(format_args!("SUB ESP, {}", locals))?;
			}
			self.line(format_args!("PUSHAD"))?;
		} else {
			self.line(format_args!("kmain:"))?;
		}

		if !self.is_keyword(Keyword::Begin) {
			return Err(Error::Syntax("expected a block"));
		}
		self.advance();
		self.block_depth += 1;

		self.statement()?;
		self.more_statements()?;

		if !self.is_keyword(Keyword::End) {
			return Err(Error::Syntax("unterminated block"));
		}
		self.block_depth -= 1;
		self.advance();

		Ok(())
	}


	fn end_program(&mut self) -> Result<(), Error> {
		if !self.is_special(".") {
			return Err(Error::Syntax("program must be terminated with a full stop ('.')"));
		}
		self.advance();

		self.listing.close().map_err(Error::Io)
	}



	fn declarations(&mut self) -> Result<(), Error> {
		loop {
			if self.is_keyword(Keyword::Var) {
				self.var_declarations()?;
			} else if self.is_keyword(Keyword::Procedure) {
				self.procedure_declaration()?;
			} else if self.is_keyword(Keyword::Function) {
				self.function_declaration()?;
			} else {
				return Ok(());
			}
		}
	}


	fn var_declarations(&mut self) -> Result<(), Error> {
		self.advance();

		match self.word() {
			Some(name) => self.temporaries.push(name),
			None => return Err(Error::Syntax("variable has invalid identifier")),
		}
		self.advance();
		self.varlist()?;

		self.expect_special(":", "variable must have datatype-specifier")?;
		self.datatype()?;
		self.declare_variables()?;
		self.advance();

		self.expect_special(";", "expected ';' to terminate variable declaration")?;

		self.more_var_declarations()
	}


	/// Further `names : type ;` lines under the same `var` keyword.
	fn more_var_declarations(&mut self) -> Result<(), Error> {
		while let Some(name) = self.word() {
			self.temporaries.push(name);
			self.advance();
			self.varlist()?;

			self.expect_special(":", "missing datatype specifier ':'")?;
			self.datatype()?;
			self.declare_variables()?;
			self.advance();

			self.expect_special(";", "variable declaration must end with ';'")?;
		}

		Ok(())
	}


	/// The `, name` tail of a declaration's name list.
	fn varlist(&mut self) -> Result<(), Error> {
		while self.is_special(",") {
			self.advance();

			match self.word() {
				Some(name) => self.temporaries.push(name),
				None => return Err(Error::Syntax("variable has invalid identifier")),
			}
			self.advance();
		}

		Ok(())
	}


	/// Validate a type specification. Plain type names are left as the
	/// current token for the caller to resolve; array specifications are
	/// consumed down to their element type, which the names are declared
	/// with. Arrays are recognized but carry no element access.
	fn datatype(&mut self) -> Result<(), Error> {
		if self.word().is_some() {
			self.declared_type()?;
			Ok(())
		} else if self.is_keyword(Keyword::Array) {
			self.advance();

			self.expect_special("[", "expected '[' for array specification")?;
			self.dimensions()?;
			self.expect_special("]", "expected ']' to end array specification")?;

			if !self.is_keyword(Keyword::Of) {
				return Err(
					Error::Syntax(
						"expected 'of' keyword to separate array length specification from data type"
					)
				);
			}
			self.advance();

			self.datatype()
		} else {
			Err(Error::Syntax("expected valid data type or array specification"))
		}
	}


	fn dimensions(&mut self) -> Result<(), Error> {
		loop {
			match &self.token {
				Some(Token::Integer(_)) => self.advance(),
				_ => return Err(Error::Syntax("expected integer for array bounds")),
			}

			self.expect_special("..", "expected '..' for array range specifier")?;

			match &self.token {
				Some(Token::Integer(_)) => self.advance(),
				_ => return Err(Error::Syntax("expected integer for array bounds")),
			}

			if self.is_special(",") {
				self.advance();
			} else {
				return Ok(());
			}
		}
	}


	/// The type named by the current token.
	fn declared_type(&self) -> Result<VarType, Error> {
		match self.word() {
			Some(name) => match self.interner.resolve(name).and_then(VarType::from_name) {
				Some(typ) => Ok(typ),
				None => Err(Error::UnknownType { name }),
			},
			None => Err(Error::Syntax("expected valid data type or array specification")),
		}
	}


	fn declare_variables(&mut self) -> Result<(), Error> {
		let typ = self.declared_type()?;
		let temporaries = std::mem::take(&mut self.temporaries);

		for name in temporaries {
			if !self.symtab.add_variable(name, typ, SCALAR_SIZE, false, false) {
				return Err(Error::Redefined { name, kind: EntryKind::Variable });
			}
		}

		Ok(())
	}


	fn declare_parameters(&mut self, by_ref: bool) -> Result<(), Error> {
		let typ = self.declared_type()?;
		let temporaries = std::mem::take(&mut self.temporaries);

		for name in temporaries {
			if !self.symtab.add_variable(name, typ, SCALAR_SIZE, by_ref, true) {
				return Err(Error::Redefined { name, kind: EntryKind::Variable });
			}
		}

		Ok(())
	}


	fn procedure_declaration(&mut self) -> Result<(), Error> {
		self.advance();

		let name = match self.word() {
			Some(name) => name,
			None => return Err(Error::Syntax("procedure has invalid identifier")),
		};

		if !self.symtab.enter_proc_scope(name) {
			return Err(Error::Syntax("cannot redeclare a procedure that already exists"));
		}

		let label = self.resolve(name);
		self.line(format_args!("{}:", label))?;
		self.advance();

		self.expect_special("(", "missing required parameter list for procedure")?;
		self.parameters()?;
		self.expect_special(")", "parameter list must be terminated with ')'")?;
		self.expect_special(";", "procedure declaration must be terminated with ';'")?;

		self.block()?;

		if !self.is_special(";") {
			return Err(Error::Syntax("procedure definition must be terminated with ';'"));
		}

		self.subprogram_epilogue()?;
		self.symtab.leave_scope();
		self.advance();

		Ok(())
	}


	fn function_declaration(&mut self) -> Result<(), Error> {
		self.advance();

		let name = match self.word() {
			Some(name) => name,
			None => return Err(Error::Syntax("function has invalid identifier")),
		};

		if !self.symtab.enter_func_scope(name) {
			return Err(Error::Syntax("cannot redeclare a function"));
		}

		let label = self.resolve(name);
		self.line(format_args!("{}:", label))?;
		self.advance();

		self.expect_special("(", "missing required parameter list for procedure")?;
		self.parameters()?;
		self.expect_special(")", "parameter list must be terminated with ')'")?;

		self.expect_special(":", "missing datatype specification indicator ':'")?;
		self.datatype()?;

		// The function name doubles as its return slot: a local of the
		// return type in the function's own scope.
		let typ = self.declared_type()?;
		if !self.symtab.add_variable(name, typ, SCALAR_SIZE, false, false) {
			return Err(Error::Redefined { name, kind: EntryKind::Function });
		}
		self.advance();

		self.expect_special(";", "function declaration must be terminated with ';'")?;

		self.block()?;

		if !self.is_special(";") {
			return Err(Error::Syntax("function definition must be terminated with ';'"));
		}

		self.subprogram_epilogue()?;
		self.symtab.leave_scope();
		self.advance();

		Ok(())
	}


	/// Unwind the frame set up by `block` and return, popping the caller's
	/// pushed arguments.
	fn subprogram_epilogue(&mut self) -> Result<(), Error> {
		let locals = self.symtab.locals_size();
		let parameters = self.symtab.params_size();

		self.line(format_args!("POPAD"))?;
		if locals != 0 {
			self.line(format_args!("ADD ESP, {}", locals))?;
		}
		self.line(format_args!("POP EDI"))?;

		if parameters != 0 {
			self.line(format_args!("RET {}", parameters))
		} else {
			self.line(format_args!("RET"))
		}
	}


	/// A parenthesized formal parameter list; may be empty.
	fn parameters(&mut self) -> Result<(), Error> {
		let mut by_ref = false;
		if self.is_keyword(Keyword::Var) {
			by_ref = true;
			self.advance();
		}

		match self.word() {
			Some(name) => self.temporaries.push(name),
			// An empty parameter list.
			None => return Ok(()),
		}
		self.advance();
		self.varlist()?;

		self.expect_special(
			":",
			"parameter declarations and parameter type specifications must be separated by ':'",
		)?;
		self.datatype()?;
		self.declare_parameters(by_ref)?;
		self.advance();

		while self.is_special(";") {
			self.advance();

			let mut by_ref = false;
			if self.is_keyword(Keyword::Var) {
				by_ref = true;
				self.advance();
			}

			match self.word() {
				Some(name) => self.temporaries.push(name),
				None => return Err(Error::Syntax("parameter has invalid identifier")),
			}
			self.advance();
			self.varlist()?;

			self.expect_special(
				":",
				"parameter declarations and parameter type specifications must be separated by ':'",
			)?;
			self.datatype()?;
			self.declare_parameters(by_ref)?;
			self.advance();
		}

		Ok(())
	}



	fn statement(&mut self) -> Result<(), Error> {
		match self.token.clone() {
			Some(Token::ReservedWord(Keyword::Begin)) => {
				self.advance();
				self.block_depth += 1;

				self.statement()?;
				self.more_statements()?;

				if !self.is_keyword(Keyword::End) {
					return Err(Error::Syntax("unterminated block"));
				}
				self.block_depth -= 1;
				self.advance();

				Ok(())
			}

			Some(Token::ReservedWord(Keyword::If)) => {
				self.advance();

				self.conditional_stack.push(self.if_count);
				self.if_count += 1;

				let mut sink = Sink::Listing;
				self.expression(&mut sink)?;

				self.handle_if()
			}

			Some(Token::ReservedWord(Keyword::While)) => {
				self.advance();

				self.loop_stack.push(self.while_count);
				self.while_count += 1;

				let label = self.while_count - 1;
				self.line(format_args!("while{}:", label))?;

				self.for_while = true;
				let mut sink = Sink::Listing;
				let test = self.expression(&mut sink);
				self.for_while = false;
				test?;

				self.handle_while()
			}

			Some(Token::Word(name)) => self.word_statement(name),

			// Anything else is left for the enclosing production to judge.
			_ => Ok(()),
		}
	}


	/// The `; statement` tail of a statement sequence.
	fn more_statements(&mut self) -> Result<(), Error> {
		while self.is_special(";") {
			self.advance();
			self.statement()?;
		}

		Ok(())
	}


	/// An identifier-led statement: an assignment to a local or outer
	/// variable, or a procedure or function call, whichever the name
	/// resolves to first.
	fn word_statement(&mut self, name: Symbol) -> Result<(), Error> {
		if let Some(variable) = self.symtab.var_info(name) {
			self.assignment(variable, false)
		} else if let Some(Entry::Variable(variable)) = self.symtab.find(name, EntryKind::Variable) {
			self.assignment(variable, true)
		} else if let Some(routine) = self.symtab.proc_info(name) {
			self.call_statement(routine, EntryKind::Procedure)
		} else if let Some(Entry::Procedure(routine)) = self.symtab.find(name, EntryKind::Procedure) {
			self.call_statement(routine, EntryKind::Procedure)
		} else if let Some(routine) = self.symtab.func_info(name) {
			self.call_statement(routine, EntryKind::Function)
		} else if let Some(Entry::Function(routine)) = self.symtab.find(name, EntryKind::Function) {
			self.call_statement(routine, EntryKind::Function)
		} else {
			// An unresolved word is not a statement; the enclosing block
			// will fail on it.
			Ok(())
		}
	}


	/// `name := expression`. Outer-scope variables always live in the data
	/// segment and are addressed off EBP.
	fn assignment(&mut self, variable: Variable, outer: bool) -> Result<(), Error> {
		self.values.push(Value::typed(variable.typ));
		self.advance();

		self.expect_special(":=", "expected ':=' for variable assignment")?;

		let mut sink = Sink::Listing;
		self.expression(&mut sink)?;

		let rhs = self.pop_value()?;
		let lhs = self.pop_value()?;
		if rhs.typ != lhs.typ {
			return Err(Error::TypeMismatch);
		}

		let reg = self.regs.get(1).ok_or(Error::NoValueRegister)?;
		self.materialize(&mut sink, rhs, reg)?;

		if outer || !self.symtab.in_subprogram() {
			self.emit(&mut sink, format_args!("MOV [EBP + {}], {}", variable.offset, reg))?;
		} else if !variable.is_param {
			self.emit(&mut sink, format_args!("MOV [EDI - {}], {}", variable.offset, reg))?;
		} else if variable.by_ref {
			self.emit(&mut sink, format_args!("MOV ESI, [EDI + {}]", variable.offset))?;
			self.emit(&mut sink, format_args!("MOV [ESI], {}", reg))?;
		} else {
			self.emit(&mut sink, format_args!("MOV [EDI + {}], {}", variable.offset, reg))?;
		}

		self.regs.free();

		Ok(())
	}


	/// A statement-level call: `name ( arguments )`.
	fn call_statement(&mut self, routine: Routine, kind: EntryKind) -> Result<(), Error> {
		self.advance();

		if !self.is_special("(") {
			return Err(Error::Syntax("procedure requires a call expression"));
		}
		self.advance();

		let mut sink = Sink::Listing;
		self.consume_params(&mut sink, routine, kind)?;

		if !self.is_special(")") {
			return Err(Error::Syntax("call expression requires termination"));
		}

		let callee = self.resolve(routine.name);
		self.line(format_args!("CALL {}", callee))?;
		self.advance();

		Ok(())
	}


	fn handle_if(&mut self) -> Result<(), Error> {
		if !self.is_keyword(Keyword::Then) {
			return Err(
				Error::Syntax("missing required keyword 'then' after conditional expression")
			);
		}

		let label = match self.conditional_stack.last() {
			Some(label) => *label,
			None => return Err(Error::Syntax("malformed expression")),
		};

		if let Some(comparison) = self.last_comparison {
			self.line(format_args!("{} if{}", comparison.jump(), label))?;
		}
		if self.or_used {
			let count = self.or_count;
			self.line(format_args!("or{}:", count))?;
			self.or_used = false;
			self.or_count += 1;
		}

		self.line(format_args!("JMP else{}", label))?;
		self.line(format_args!("if{}:", label))?;
		self.advance();

		self.statement()?;

		self.line(format_args!("JMP endif{}", label))?;
		self.line(format_args!("else{}:", label))?;

		self.else_branch()?;

		self.line(format_args!("JMP endif{}", label))?;
		self.line(format_args!("endif{}:", label))?;

		self.conditional_stack.pop();

		Ok(())
	}


	fn else_branch(&mut self) -> Result<(), Error> {
		if self.is_keyword(Keyword::Else) {
			self.advance();
			self.statement()?;
		}

		Ok(())
	}


	fn handle_while(&mut self) -> Result<(), Error> {
		if !self.is_keyword(Keyword::Do) {
			return Err(
				Error::Syntax("missing required keyword 'do' after conditional expression")
			);
		}

		let label = match self.loop_stack.last() {
			Some(label) => *label,
			None => return Err(Error::Syntax("malformed expression")),
		};

		if let Some(comparison) = self.last_comparison {
			self.line(format_args!("{} while{}inner", comparison.jump(), label))?;
		}
		if self.or_used {
			let count = self.or_count;
			self.line(format_args!("or{}:", count))?;
			self.or_used = false;
			self.or_count += 1;
		}

		self.line(format_args!("JMP endwhile{}", label))?;
		self.line(format_args!("while{}inner:", label))?;
		self.advance();

		self.statement()?;

		self.line(format_args!("JMP while{}", label))?;
		self.line(format_args!("endwhile{}:", label))?;

		self.loop_stack.pop();

		Ok(())
	}



	fn expression(&mut self, sink: &mut Sink) -> Result<(), Error> {
		self.s_expression(sink)
	}


	fn s_expression(&mut self, sink: &mut Sink) -> Result<(), Error> {
		self.term(sink)?;
		self.s_expression_tail(sink)
	}


	/// The relational tail: `< > =`, left-associative. Comparisons consume
	/// both operand registers; the result lives in the flags and is carried
	/// as a boolean on the value stack.
	fn s_expression_tail(&mut self, sink: &mut Sink) -> Result<(), Error> {
		loop {
			let comparison =
				if self.is_special("<") {
					Comparison::Lower
				} else if self.is_special(">") {
					Comparison::Greater
				} else if self.is_special("=") {
					Comparison::Equal
				} else {
					return Ok(());
				};

			self.last_comparison = Some(comparison);
			self.advance();

			self.term(sink)?;

			let rhs = self.pop_value()?;
			let lhs = self.pop_value()?;

			match comparison {
				Comparison::Lower | Comparison::Greater => {
					let ordered = matches!(
						(lhs.typ, rhs.typ),
						(VarType::Integer, VarType::Integer)
							| (VarType::Character, VarType::Character)
							| (VarType::Real, VarType::Real)
					);

					if !ordered {
						return Err(Error::InvalidComparison);
					}
				}

				Comparison::Equal => {
					// Equality on reals is never reliable; reject it
					// statically.
					if lhs.typ == VarType::Real || rhs.typ == VarType::Real {
						return Err(Error::RealEquality);
					}
					if lhs.typ != rhs.typ {
						return Err(Error::InvalidComparison);
					}
				}
			}

			self.values.push(Value::typed(VarType::Boolean));

			let src = self.regs.get(1).ok_or(Error::NoValueRegister)?;
			let dst = self.regs.get(2).ok_or(Error::NoValueRegister)?;
			self.materialize(sink, lhs, dst)?;
			self.materialize(sink, rhs, src)?;
			self.emit(sink, format_args!("CMP {}, {}", dst, src))?;
			self.regs.free();
			self.regs.free();
		}
	}


	/// The additive tail: `+ -` and the `or` combinator.
	fn term(&mut self, sink: &mut Sink) -> Result<(), Error> {
		self.fact(sink)?;
		self.term_tail(sink)
	}


	fn term_tail(&mut self, sink: &mut Sink) -> Result<(), Error> {
		loop {
			if self.is_special("+") || self.is_special("-") {
				let op = if self.is_special("-") { ArithOp::Sub } else { ArithOp::Add };
				self.advance();

				self.fact(sink)?;

				let rhs = self.pop_value()?;
				let lhs = self.pop_value()?;
				self.arithmetic(sink, op, lhs, rhs)?;
			} else if self.is_keyword(Keyword::Or) {
				self.advance();

				// Short-circuit: the comparison already compiled jumps
				// straight into the taken branch of the enclosing
				// conditional or loop.
				if let Some(comparison) = self.last_comparison {
					let target =
						if self.for_while {
							self.loop_stack.last().copied()
						} else {
							self.conditional_stack.last().copied()
						};

					if let Some(label) = target {
						if self.for_while {
							self.emit(
								sink,
								format_args!("{} while{}inner", comparison.jump(), label),
							)?;
						} else {
							self.emit(sink, format_args!("{} if{}", comparison.jump(), label))?;
						}
					}
				}

				if self.or_used {
					let count = self.or_count;
					self.emit(sink, format_args!("or{}:", count))?;
					self.or_used = false;
					self.or_count += 1;
				}

				self.fact(sink)?;

				let rhs = self.pop_value()?;
				let lhs = self.pop_value()?;

				if lhs.typ == VarType::Boolean && rhs.typ == VarType::Boolean {
					self.values.push(Value::typed(VarType::Boolean));
				} else {
					return Err(Error::BooleanExpected { combinator: Keyword::Or });
				}
			} else {
				return Ok(());
			}
		}
	}


	/// The multiplicative tail: `* /` and the `and` combinator.
	fn fact(&mut self, sink: &mut Sink) -> Result<(), Error> {
		self.fact_leaf(sink)?;
		self.fact_tail(sink)
	}


	fn fact_tail(&mut self, sink: &mut Sink) -> Result<(), Error> {
		loop {
			if self.is_special("*") || self.is_special("/") {
				let op = if self.is_special("/") { ArithOp::Div } else { ArithOp::Mul };
				self.advance();

				self.fact_leaf(sink)?;

				let rhs = self.pop_value()?;
				let lhs = self.pop_value()?;
				self.arithmetic(sink, op, lhs, rhs)?;
			} else if self.is_keyword(Keyword::And) {
				self.advance();

				// Short-circuit: leave for the pending `or` label when the
				// comparison fails.
				if let Some(comparison) = self.last_comparison {
					let count = self.or_count;
					self.emit(sink, format_args!("{} or{}", comparison.inverse(), count))?;
				}
				self.or_used = true;

				self.fact_leaf(sink)?;

				let rhs = self.pop_value()?;
				let lhs = self.pop_value()?;

				if lhs.typ == VarType::Boolean && rhs.typ == VarType::Boolean {
					self.values.push(Value::typed(VarType::Boolean));
				} else {
					return Err(Error::BooleanExpected { combinator: Keyword::And });
				}
			} else {
				return Ok(());
			}
		}
	}


	/// An expression leaf: a parenthesized expression, a signed factor, a
	/// literal, a variable read, or a function call.
	fn fact_leaf(&mut self, sink: &mut Sink) -> Result<(), Error> {
		match self.token.clone() {
			Some(Token::Special(special)) if &*special == "(" => {
				self.grouping_depth += 1;
				self.advance();

				self.expression(sink)?;

				if !self.is_special(")") {
					return Err(Error::Syntax("expected ')'"));
				}
				self.grouping_depth -= 1;
				self.advance();

				Ok(())
			}

			Some(Token::Special(special)) if &*special == "+" || &*special == "-" => {
				let negate = &*special == "-";
				self.advance();

				self.fact(sink)?;

				if negate {
					self.negate_top(sink)?;
				}

				Ok(())
			}

			Some(Token::Integer(lexeme)) => {
				let value: i32 = match lexeme.parse() {
					Ok(value) => value,
					Err(_) => return Err(Error::InvalidInteger { lexeme }),
				};

				self.regs.alloc().ok_or(Error::TooComplicated)?;
				self.values.push(Value::folded(VarType::Integer, Literal::Int(value)));
				self.advance();

				Ok(())
			}

			Some(Token::Real(lexeme)) => {
				let value: f32 = match lexeme.parse() {
					Ok(value) => value,
					Err(_) => return Err(Error::InvalidReal { lexeme }),
				};

				self.regs.alloc().ok_or(Error::TooComplicated)?;
				self.values.push(Value::folded(VarType::Real, Literal::Real(value)));
				self.advance();

				Ok(())
			}

			Some(Token::Word(name)) => {
				if let Some(variable) = self.symtab.var_info(name) {
					self.read_variable(sink, variable)?;
					self.advance();
					Ok(())
				} else if let Some(Entry::Variable(variable)) =
					self.symtab.find(name, EntryKind::Variable)
				{
					self.advance();
					self.read_outer_variable(sink, variable)
				} else if let Some(Entry::Function(routine)) =
					self.symtab.find(name, EntryKind::Function)
				{
					self.call_expression(sink, routine)
				} else {
					Err(Error::NotAVariable { name })
				}
			}

			_ => Err(
				Error::Syntax(
					"expected grouped expression, additive or subtractive operator, integer, \
					 real, or word"
				)
			),
		}
	}


	/// Fold negation into a pending literal, or negate the live register.
	fn negate_top(&mut self, sink: &mut Sink) -> Result<(), Error> {
		let pending = self.values.last().and_then(|value| value.literal);

		match pending {
			Some(literal) => {
				if let Some(value) = self.values.last_mut() {
					value.literal = Some(literal.negated());
				}
				Ok(())
			}

			None => {
				let reg = self.regs.get(1).ok_or(Error::NoValueRegister)?;
				self.emit(sink, format_args!("NEG {}", reg))
			}
		}
	}


	/// Load a variable of the current scope into the next register. The
	/// effective address depends on what the variable is: a subprogram
	/// local, a by-value or by-reference parameter, or a global.
	fn read_variable(&mut self, sink: &mut Sink, variable: Variable) -> Result<(), Error> {
		let reg = self.regs.alloc().ok_or(Error::RegistersExhausted)?;

		if self.symtab.in_subprogram() {
			if !variable.is_param {
				self.emit(sink, format_args!("MOV {}, [EDI - {}]", reg, variable.offset))?;
			} else if variable.by_ref {
				self.emit(sink, format_args!("MOV ESI, [EDI - {}]", variable.offset))?;
				self.emit(sink, format_args!("MOV {}, [ESI]", reg))?;
			} else {
				self.emit(sink, format_args!("MOV {}, [EDI + {}]", reg, variable.offset))?;
			}
		} else {
			self.emit(sink, format_args!("MOV {}, [EBP + {}]", reg, variable.offset))?;
		}

		self.values.push(Value::typed(variable.typ));

		Ok(())
	}


	/// Load an outer-scope variable, which always lives in the data segment.
	fn read_outer_variable(&mut self, sink: &mut Sink, variable: Variable) -> Result<(), Error> {
		let reg = self.regs.alloc().ok_or(Error::RegistersExhausted)?;

		self.emit(sink, format_args!("MOV {}, [EBP + {}]", reg, variable.offset))?;
		self.values.push(Value::typed(variable.typ));

		Ok(())
	}


	/// A function call in expression position: stage and emit the
	/// arguments, call, and claim a register for the returned value.
	fn call_expression(&mut self, sink: &mut Sink, routine: Routine) -> Result<(), Error> {
		self.advance();

		if !self.is_special("(") {
			return Err(Error::Syntax("procedure requires a call expression"));
		}
		self.advance();

		self.consume_params(sink, routine, EntryKind::Function)?;

		if !self.is_special(")") {
			return Err(Error::Syntax("call expression requires termination"));
		}
		self.advance();

		let callee = self.resolve(routine.name);
		self.emit(sink, format_args!("CALL {}", callee))?;

		let slot = match self.symtab.scope_var(routine.scope, routine.name) {
			Some(slot) => slot,
			None => return Err(Error::Syntax("malformed expression")),
		};

		// The value this call feeds is right below on the stack; its type
		// must match the return slot's.
		if let Some(below) = self.values.last() {
			if below.typ != slot.typ {
				return Err(Error::ReturnTypeMismatch);
			}
		}

		let reg = self.regs.alloc().ok_or(Error::RegistersExhausted)?;
		if reg != "EAX" {
			self.emit(sink, format_args!("MOV {}, EAX", reg))?;
		}

		self.values.push(Value::typed(slot.typ));

		Ok(())
	}



	fn arithmetic(
		&mut self,
		sink: &mut Sink,
		op: ArithOp,
		lhs: Value,
		rhs: Value,
	) -> Result<(), Error> {
		let result = match (lhs.typ, rhs.typ) {
			(VarType::Integer, VarType::Integer) | (VarType::Character, VarType::Character) => {
				VarType::Integer
			}
			(VarType::Real, VarType::Real) => VarType::Real,
			_ => return Err(Error::InvalidOperand),
		};

		// Two pending literals fold without emitting anything; the folded
		// literal takes over the lower of their register slots.
		if let (Some(left), Some(right)) = (lhs.literal, rhs.literal) {
			let folded = Self::fold(op, left, right)?;
			self.regs.free();
			self.values.push(Value::folded(result, folded));
			return Ok(());
		}

		if self.regs.is_full() {
			return Err(Error::TooComplicated);
		}

		let src = self.regs.get(1).ok_or(Error::NoValueRegister)?;
		let dst = self.regs.get(2).ok_or(Error::NoValueRegister)?;
		self.materialize(sink, lhs, dst)?;
		self.materialize(sink, rhs, src)?;

		match op {
			ArithOp::Add => self.emit(sink, format_args!("ADD {}, {}, {}", dst, dst, src))?,
			ArithOp::Sub => self.emit(sink, format_args!("SUB {}, {}, {}", dst, dst, src))?,
			ArithOp::Mul => self.emit(sink, format_args!("IMUL {}, {}, {}", dst, dst, src))?,

			// IDIV insists on EAX:EDX, so divisions not already targeting
			// EAX save and restore the pair around the divide.
			ArithOp::Div => {
				let save = dst != "EAX";

				if save {
					self.emit(sink, format_args!("PUSH EAX"))?;
					self.emit(sink, format_args!("PUSH EDX"))?;
					self.emit(sink, format_args!("MOV EAX, {}", dst))?;
				}

				self.emit(sink, format_args!("CDQ"))?;
				self.emit(sink, format_args!("IDIV {}", src))?;

				if save {
					self.emit(sink, format_args!("POP EDX"))?;
					self.emit(sink, format_args!("POP EAX"))?;
				}
			}
		}

		self.regs.free();
		self.values.push(Value::typed(result));

		Ok(())
	}


	/// Fold an operator over two literals. Integer arithmetic wraps, like
	/// the target's.
	fn fold(op: ArithOp, left: Literal, right: Literal) -> Result<Literal, Error> {
		match (left, right) {
			(Literal::Int(left), Literal::Int(right)) => Ok(
				Literal::Int(
					match op {
						ArithOp::Add => left.wrapping_add(right),
						ArithOp::Sub => left.wrapping_sub(right),
						ArithOp::Mul => left.wrapping_mul(right),
						ArithOp::Div => match left.checked_div(right) {
							Some(quotient) => quotient,
							None => return Err(Error::DivisionByZero),
						},
					}
				)
			),

			(Literal::Real(left), Literal::Real(right)) => Ok(
				Literal::Real(
					match op {
						ArithOp::Add => left + right,
						ArithOp::Sub => left - right,
						ArithOp::Mul => left * right,
						ArithOp::Div => left / right,
					}
				)
			),

			_ => Err(Error::Syntax("malformed expression")),
		}
	}



	/// Recognize and stage a call's arguments against the callee's formal
	/// parameters, in declaration order. Each argument compiles into its own
	/// buffer: value arguments evaluate and push their register, reference
	/// arguments push the named variable's data-segment address. The buffers
	/// then flush to the active sink, in declaration order for functions and
	/// in reverse for procedures.
	fn consume_params(
		&mut self,
		sink: &mut Sink,
		routine: Routine,
		kind: EntryKind,
	) -> Result<(), Error> {
		let parameters = self.symtab.params(routine.scope);
		let mut staged: Vec<Vec<u8>> = Vec::with_capacity(parameters.len());

		for (current, (param_name, parameter)) in parameters.iter().enumerate() {
			if current > 0 {
				if self.is_special(",") {
					self.advance();
				} else if kind == EntryKind::Function {
					return Err(
						Error::ArgumentCount {
							routine: routine.name,
							found: current,
							expected: parameters.len(),
						}
					);
				} else {
					return Err(Error::Syntax("got wrong number of parameters; expected ','"));
				}
			}

			if parameter.by_ref {
				let name = match self.word() {
					Some(name) => name,
					None if kind == EntryKind::Function => {
						return Err(Error::ReferenceExpected { parameter: *param_name })
					}
					None => {
						return Err(
							Error::Syntax("parameter expected pass-by-reference variable")
						)
					}
				};

				let variable = match self.symtab.find(name, EntryKind::Variable) {
					Some(Entry::Variable(variable)) => variable,
					_ => return Err(Error::NotAVariable { name }),
				};

				if variable.typ != parameter.typ {
					return Err(
						match kind {
							EntryKind::Function => Error::ReferenceTypeMismatch {
								routine: routine.name,
								found: variable.typ,
								expected: parameter.typ,
							},
							_ => Error::Syntax("parameter and variable type are invalid"),
						}
					);
				}

				let mut buffer = Vec::new();
				writeln!(buffer, "MOV EAX, {}", variable.offset).map_err(Error::Io)?;
				writeln!(buffer, "ADD EAX, EBP").map_err(Error::Io)?;
				writeln!(buffer, "PUSH EAX").map_err(Error::Io)?;
				staged.push(buffer);

				self.advance();
			} else {
				let mut stage = Sink::Stage(Vec::new());
				self.expression(&mut stage)?;

				let argument = self.pop_value()?;
				if argument.typ != parameter.typ {
					return Err(
						match kind {
							EntryKind::Function => Error::ArgumentTypeMismatch {
								parameter: *param_name,
								found: argument.typ,
								expected: parameter.typ,
							},
							_ => Error::Syntax("expression did not match expected data type"),
						}
					);
				}

				let reg = self.regs.get(1).ok_or(Error::NoValueRegister)?;
				self.materialize(&mut stage, argument, reg)?;
				self.emit(&mut stage, format_args!("PUSH {}", reg))?;
				self.regs.free();

				if let Sink::Stage(buffer) = stage {
					staged.push(buffer);
				}
			}
		}

		match kind {
			EntryKind::Procedure =>
				for buffer in staged.iter().rev() {
					self.emit_raw(sink, buffer)?;
				},
			_ =>
				for buffer in staged.iter() {
					self.emit_raw(sink, buffer)?;
				},
		}

		Ok(())
	}
}
