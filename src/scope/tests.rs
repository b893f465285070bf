use assert_matches::assert_matches;

use super::*;
use crate::symbol::Interner;


fn symbols(names: &[&str]) -> (Interner, Vec<Symbol>) {
	let mut interner = Interner::new();
	let symbols = names.iter().map(|name| interner.get_or_intern(name)).collect();
	(interner, symbols)
}


#[test]
fn test_local_offsets_grow_by_size() {
	let (_, names) = symbols(&["a", "b", "c"]);
	let mut table = SymbolTable::new();

	for name in &names {
		assert!(table.add_variable(*name, VarType::Integer, SCALAR_SIZE, false, false));
	}

	let offsets: Vec<u64> = names
		.iter()
		.map(|name| table.var_info(*name).unwrap().offset)
		.collect();

	assert_eq!(offsets, [0, 4, 8]);
	assert_eq!(table.locals_size(), 12);
	assert_eq!(table.params_size(), 0);
}


#[test]
fn test_param_offsets_start_past_the_frame_link() {
	let (_, names) = symbols(&["p", "a", "b"]);
	let mut table = SymbolTable::new();

	assert!(table.enter_proc_scope(names[0]));
	assert!(table.add_variable(names[1], VarType::Integer, SCALAR_SIZE, false, true));
	assert!(table.add_variable(names[2], VarType::Integer, SCALAR_SIZE, true, true));

	assert_eq!(table.var_info(names[1]).unwrap().offset, 8);
	assert_eq!(table.var_info(names[2]).unwrap().offset, 12);
	assert_eq!(table.params_size(), 8);
	assert_eq!(table.locals_size(), 0);
	assert!(table.in_subprogram());
}


#[test]
fn test_redefinition_in_same_scope_is_rejected() {
	let (_, names) = symbols(&["x"]);
	let mut table = SymbolTable::new();

	assert!(table.add_variable(names[0], VarType::Integer, SCALAR_SIZE, false, false));
	assert!(!table.add_variable(names[0], VarType::Real, SCALAR_SIZE, false, false));
	assert!(!table.enter_proc_scope(names[0]));
}


#[test]
fn test_inner_scope_may_redefine() {
	let (_, names) = symbols(&["x", "p"]);
	let mut table = SymbolTable::new();

	assert!(table.add_variable(names[0], VarType::Integer, SCALAR_SIZE, false, false));
	assert!(table.enter_proc_scope(names[1]));
	assert!(table.add_variable(names[0], VarType::Real, SCALAR_SIZE, false, false));

	assert_matches!(table.var_info(names[0]), Some(Variable { typ: VarType::Real, .. }));
}


#[test]
fn test_find_walks_outward() {
	let (_, names) = symbols(&["x", "p"]);
	let mut table = SymbolTable::new();

	assert!(table.add_variable(names[0], VarType::Integer, SCALAR_SIZE, false, false));
	assert!(table.enter_proc_scope(names[1]));

	assert_matches!(table.var_info(names[0]), None);
	assert_matches!(
		table.find(names[0], EntryKind::Variable),
		Some(Entry::Variable(Variable { typ: VarType::Integer, .. }))
	);
}


#[test]
fn test_shadowing_terminates_the_search() {
	// An inner variable `x` hides an outer procedure `x` completely: the
	// lookup stops at the first scope holding the name.
	let (_, names) = symbols(&["x", "p"]);
	let mut table = SymbolTable::new();

	assert!(table.enter_proc_scope(names[0]));
	table.leave_scope();

	assert!(table.enter_proc_scope(names[1]));
	assert!(table.add_variable(names[0], VarType::Integer, SCALAR_SIZE, false, false));

	assert_matches!(table.find(names[0], EntryKind::Procedure), None);
	assert_matches!(table.find(names[0], EntryKind::Variable), Some(Entry::Variable(_)));
}


#[test]
fn test_leave_scope_is_a_no_op_at_the_root() {
	let (_, names) = symbols(&["x"]);
	let mut table = SymbolTable::new();

	table.leave_scope();
	assert!(!table.in_subprogram());

	assert!(table.add_variable(names[0], VarType::Integer, SCALAR_SIZE, false, false));
	assert_matches!(table.var_info(names[0]), Some(_));
}


#[test]
fn test_params_keep_declaration_order() {
	let (_, names) = symbols(&["p", "b", "a", "local"]);
	let mut table = SymbolTable::new();

	assert!(table.enter_proc_scope(names[0]));
	assert!(table.add_variable(names[1], VarType::Integer, SCALAR_SIZE, false, true));
	assert!(table.add_variable(names[2], VarType::Real, SCALAR_SIZE, true, true));
	assert!(table.add_variable(names[3], VarType::Integer, SCALAR_SIZE, false, false));

	let scope = match table.find(names[0], EntryKind::Procedure) {
		Some(Entry::Procedure(routine)) => routine.scope,
		_ => panic!("procedure not found"),
	};

	let params = table.params(scope);
	let ordered: Vec<Symbol> = params.iter().map(|(name, _)| *name).collect();

	assert_eq!(ordered, [names[1], names[2]]);
	assert!(params[1].1.by_ref);
}


#[test]
fn test_function_return_slot_is_reachable_by_scope() {
	let (_, names) = symbols(&["f"]);
	let mut table = SymbolTable::new();

	assert!(table.enter_func_scope(names[0]));
	assert!(table.add_variable(names[0], VarType::Integer, SCALAR_SIZE, false, false));
	table.leave_scope();

	let routine = match table.find(names[0], EntryKind::Function) {
		Some(Entry::Function(routine)) => routine,
		_ => panic!("function not found"),
	};

	assert_matches!(
		table.scope_var(routine.scope, names[0]),
		Some(Variable { typ: VarType::Integer, offset: 0, .. })
	);
}
