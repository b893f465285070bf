#[cfg(test)]
mod tests;

use std::fmt::{self, Display};

use crate::symbol::Symbol;


/// The scalar types of the source language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
	Integer,
	Boolean,
	Character,
	Real,
}


impl VarType {
	/// Resolve a type name as written in declarations.
	pub fn from_name(name: &str) -> Option<Self> {
		match name {
			"integer" => Some(Self::Integer),
			"boolean" => Some(Self::Boolean),
			"char" => Some(Self::Character),
			"real" => Some(Self::Real),
			_ => None,
		}
	}
}


impl Display for VarType {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Integer => write!(f, "integer"),
			Self::Boolean => write!(f, "boolean"),
			Self::Character => write!(f, "char"),
			Self::Real => write!(f, "real"),
		}
	}
}


/// Every scalar occupies a full machine word on the target.
pub const SCALAR_SIZE: u64 = 4;


/// The kind of entry a lookup is after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
	Variable,
	Procedure,
	Function,
}


impl Display for EntryKind {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Variable => write!(f, "variable"),
			Self::Procedure => write!(f, "procedure"),
			Self::Function => write!(f, "function"),
		}
	}
}


/// A variable entry: type, storage size and the assigned frame offset.
/// Parameters live at positive offsets past the saved frame pointer and
/// return address; locals start at zero.
#[derive(Debug, Clone, Copy)]
pub struct Variable {
	pub typ: VarType,
	pub size: u64,
	pub offset: u64,
	pub by_ref: bool,
	pub is_param: bool,
}


/// A procedure or function entry, pointing at its own scope.
#[derive(Debug, Clone, Copy)]
pub struct Routine {
	pub name: Symbol,
	pub scope: ScopeId,
}


/// An entry in a scope.
#[derive(Debug, Clone, Copy)]
pub enum Entry {
	Variable(Variable),
	Procedure(Routine),
	Function(Routine),
}


impl Entry {
	fn kind(&self) -> EntryKind {
		match self {
			Self::Variable(_) => EntryKind::Variable,
			Self::Procedure(_) => EntryKind::Procedure,
			Self::Function(_) => EntryKind::Function,
		}
	}
}


/// A handle into the scope arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);


/// A single scope: an insertion-ordered table of entries plus the running
/// offset counters used to place parameters and locals in the frame.
#[derive(Debug)]
struct Scope {
	entries: Vec<(Symbol, Entry)>,
	param_offset: u64,
	var_offset: u64,
	name: Option<Symbol>,
	parent: Option<ScopeId>,
}


impl Scope {
	fn new(name: Option<Symbol>, parent: Option<ScopeId>) -> Self {
		Self {
			entries: Vec::new(),
			param_offset: 0,
			var_offset: 0,
			name,
			parent,
		}
	}


	fn get(&self, name: Symbol) -> Option<&Entry> {
		self.entries
			.iter()
			.find(|(entry_name, _)| *entry_name == name)
			.map(|(_, entry)| entry)
	}


	fn contains(&self, name: Symbol) -> bool {
		self.get(name).is_some()
	}
}


/// The symbol table: an arena of scopes threaded by parent handles, with a
/// cursor at the scope currently being compiled. Scopes are never freed
/// while a compilation is running, so routine entries can be revisited at
/// call sites after their bodies have been left.
#[derive(Debug)]
pub struct SymbolTable {
	scopes: Vec<Scope>,
	current: ScopeId,
}


impl SymbolTable {
	pub fn new() -> Self {
		Self {
			scopes: vec![Scope::new(None, None)],
			current: ScopeId(0),
		}
	}


	fn scope(&self, id: ScopeId) -> &Scope {
		&self.scopes[id.0]
	}


	fn current(&self) -> &Scope {
		self.scope(self.current)
	}


	/// Whether the cursor is inside a procedure or function scope.
	pub fn in_subprogram(&self) -> bool {
		self.current().name.is_some()
	}


	/// Insert a variable into the current scope, assigning its frame offset.
	/// Parameters are placed past the saved frame pointer and return address.
	/// Returns false if the name is already taken in this scope.
	pub fn add_variable(
		&mut self,
		name: Symbol,
		typ: VarType,
		size: u64,
		by_ref: bool,
		is_param: bool,
	) -> bool {
		if self.current().contains(name) {
			return false;
		}

		let scope = &mut self.scopes[self.current.0];

		let offset =
			if is_param {
				let offset = 8 + scope.param_offset;
				scope.param_offset += size;
				offset
			} else {
				let offset = scope.var_offset;
				scope.var_offset += size;
				offset
			};

		let variable = Variable { typ, size, offset, by_ref, is_param };
		scope.entries.push((name, Entry::Variable(variable)));

		true
	}


	/// Insert a procedure entry pointing at a fresh child scope, and move the
	/// cursor into that scope. Returns false if the name is already taken.
	pub fn enter_proc_scope(&mut self, name: Symbol) -> bool {
		self.enter_routine_scope(name, EntryKind::Procedure)
	}


	/// Insert a function entry pointing at a fresh child scope, and move the
	/// cursor into that scope. Returns false if the name is already taken.
	pub fn enter_func_scope(&mut self, name: Symbol) -> bool {
		self.enter_routine_scope(name, EntryKind::Function)
	}


	fn enter_routine_scope(&mut self, name: Symbol, kind: EntryKind) -> bool {
		if self.current().contains(name) {
			return false;
		}

		let child = ScopeId(self.scopes.len());
		self.scopes.push(Scope::new(Some(name), Some(self.current)));

		let routine = Routine { name, scope: child };
		let entry = match kind {
			EntryKind::Procedure => Entry::Procedure(routine),
			_ => Entry::Function(routine),
		};

		self.scopes[self.current.0].entries.push((name, entry));
		self.current = child;

		true
	}


	/// Move the cursor up one level; no-op at the root.
	pub fn leave_scope(&mut self) {
		if let Some(parent) = self.current().parent {
			self.current = parent;
		}
	}


	/// Look a name up from the current scope outward. The search stops at the
	/// first scope containing the name: if the entry there is not of the
	/// requested kind, the name is considered shadowed and nothing is
	/// returned, even if an outer scope holds a matching entry.
	pub fn find(&self, name: Symbol, kind: EntryKind) -> Option<Entry> {
		let mut cursor = Some(self.current);

		while let Some(id) = cursor {
			let scope = self.scope(id);

			if let Some(entry) = scope.get(name) {
				return (entry.kind() == kind).then(|| *entry);
			}

			cursor = scope.parent;
		}

		None
	}


	/// A variable entry in the current scope only.
	pub fn var_info(&self, name: Symbol) -> Option<Variable> {
		match self.current().get(name) {
			Some(Entry::Variable(variable)) => Some(*variable),
			_ => None,
		}
	}


	/// A procedure entry in the current scope only.
	pub fn proc_info(&self, name: Symbol) -> Option<Routine> {
		match self.current().get(name) {
			Some(Entry::Procedure(routine)) => Some(*routine),
			_ => None,
		}
	}


	/// A function entry in the current scope only.
	pub fn func_info(&self, name: Symbol) -> Option<Routine> {
		match self.current().get(name) {
			Some(Entry::Function(routine)) => Some(*routine),
			_ => None,
		}
	}


	/// A variable entry in the given scope, regardless of the cursor.
	/// Used to fetch a function's return slot at call sites.
	pub fn scope_var(&self, scope: ScopeId, name: Symbol) -> Option<Variable> {
		match self.scope(scope).get(name) {
			Some(Entry::Variable(variable)) => Some(*variable),
			_ => None,
		}
	}


	/// The parameters of the given scope, in declaration order.
	pub fn params(&self, scope: ScopeId) -> Vec<(Symbol, Variable)> {
		self.scope(scope)
			.entries
			.iter()
			.filter_map(
				|(name, entry)| match entry {
					Entry::Variable(variable) if variable.is_param => Some((*name, *variable)),
					_ => None,
				}
			)
			.collect()
	}


	/// Total size of the current scope's locals, for frame setup.
	pub fn locals_size(&self) -> u64 {
		self.current()
			.entries
			.iter()
			.filter_map(
				|(_, entry)| match entry {
					Entry::Variable(variable) if !variable.is_param => Some(variable.size),
					_ => None,
				}
			)
			.sum()
	}


	/// Total size of the current scope's parameters, popped by `RET n`.
	pub fn params_size(&self) -> u64 {
		self.current()
			.entries
			.iter()
			.filter_map(
				|(_, entry)| match entry {
					Entry::Variable(variable) if variable.is_param => Some(variable.size),
					_ => None,
				}
			)
			.sum()
	}
}
