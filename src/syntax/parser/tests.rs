use std::path::Path;

use assert_matches::assert_matches;

use super::*;
use crate::syntax::{self, Source};


const PROLOGUE: &str = "char data_segment[65536] = {0};\n\
	int main() {\n\
	_asm {\n\
	PUSHAD\n\
	LEA EBP, data_segment\n\
	JMP kmain\n";

const EPILOGUE: &str = "POPAD\n\
	}\n\
	return 0;\n\
	}\n";


fn compile(source: &str) -> (Result<Report, syntax::Error>, String) {
	let mut interner = Interner::new();
	let mut output = Vec::new();

	let source = Source {
		path: Path::new("test.pas").into(),
		contents: source.as_bytes().into(),
	};

	let result = syntax::compile(&source, &mut interner, &mut output);

	(result, String::from_utf8(output).expect("listing should be valid utf8"))
}


/// Assert the listing contains the given lines, consecutively.
fn assert_emitted(listing: &str, expected: &[&str]) {
	let lines: Vec<&str> = listing.lines().collect();

	let found = expected.len() <= lines.len()
		&& lines.windows(expected.len()).any(|window| window == expected);

	assert!(found, "expected lines {:#?} in listing:\n{}", expected, listing);
}


fn assert_not_emitted(listing: &str, mnemonic: &str) {
	let found = listing
		.lines()
		.any(|line| line.split_whitespace().next() == Some(mnemonic));

	assert!(!found, "unexpected {} in listing:\n{}", mnemonic, listing);
}


#[test]
fn test_empty_program() {
	let (report, listing) = compile("program P; begin end.");

	let report = report.unwrap();
	assert_eq!(report.consumed, 6);
	assert_eq!(report.produced, 6);
	assert!(report.is_good());

	assert_eq!(listing, format!("{}kmain:\n{}", PROLOGUE, EPILOGUE));
}


#[test]
fn test_trailing_tokens_leave_the_queue_unconsumed() {
	let (report, _) = compile("program P; begin end. extra");

	let report = report.unwrap();
	assert_eq!(report.consumed, 6);
	assert_eq!(report.produced, 7);
	assert!(!report.is_good());
}


#[test]
fn test_missing_program_keyword() {
	let (report, _) = compile("begin end.");

	assert_matches!(
		report,
		Err(syntax::Error::Parser(Error::Syntax(message)))
			if message.contains("program keyword")
	);
}


#[test]
fn test_pure_literal_expression_folds_to_a_single_load() {
	let (report, listing) = compile("program P; var x: integer; begin x := 1 + 2 end.");

	assert!(report.unwrap().is_good());
	assert_not_emitted(&listing, "ADD");
	assert_emitted(&listing, &["kmain:", "MOV EAX, 3", "MOV [EBP + 0], EAX"]);
}


#[test]
fn test_folding_spans_operator_levels() {
	let (report, listing) = compile("program P; var x: integer; begin x := 2 * 3 + 4 end.");

	assert!(report.unwrap().is_good());
	assert_not_emitted(&listing, "ADD");
	assert_not_emitted(&listing, "IMUL");
	assert_emitted(&listing, &["MOV EAX, 10", "MOV [EBP + 0], EAX"]);
}


#[test]
fn test_folded_division_truncates() {
	let (report, listing) = compile("program P; var x: integer; begin x := 7 / 2 end.");

	assert!(report.unwrap().is_good());
	assert_emitted(&listing, &["MOV EAX, 3", "MOV [EBP + 0], EAX"]);
}


#[test]
fn test_folded_division_by_zero_is_rejected() {
	let (report, _) = compile("program P; var x: integer; begin x := 1 / 0 end.");

	assert_matches!(report, Err(syntax::Error::Parser(Error::DivisionByZero)));
}


#[test]
fn test_folded_negation() {
	let (report, listing) = compile("program P; var x: integer; begin x := -5 end.");

	assert!(report.unwrap().is_good());
	assert_not_emitted(&listing, "NEG");
	assert_emitted(&listing, &["MOV EAX, -5", "MOV [EBP + 0], EAX"]);
}


#[test]
fn test_negation_of_a_variable_uses_neg() {
	let (report, listing) = compile("program P; var x, y: integer; begin x := -y end.");

	assert!(report.unwrap().is_good());
	assert_emitted(&listing, &["MOV EAX, [EBP + 4]", "NEG EAX", "MOV [EBP + 0], EAX"]);
}


#[test]
fn test_mixed_operands_materialize_the_literal() {
	let (report, listing) = compile("program P; var x, y: integer; begin x := y + 1 end.");

	assert!(report.unwrap().is_good());
	assert_emitted(
		&listing,
		&[
			"MOV EAX, [EBP + 4]",
			"MOV EBX, 1",
			"ADD EAX, EAX, EBX",
			"MOV [EBP + 0], EAX",
		],
	);
}


#[test]
fn test_real_subtraction_emits_sub() {
	let (report, listing) = compile("program P; var x, y: real; begin x := y - 1.5 end.");

	assert!(report.unwrap().is_good());
	assert_emitted(
		&listing,
		&[
			"MOV EAX, [EBP + 4]",
			"MOV EBX, 1.5",
			"SUB EAX, EAX, EBX",
			"MOV [EBP + 0], EAX",
		],
	);
}


#[test]
fn test_real_literals_fold() {
	let (report, listing) = compile("program P; var x: real; begin x := 2.5 - 0.5 end.");

	assert!(report.unwrap().is_good());
	assert_not_emitted(&listing, "SUB");
	assert_emitted(&listing, &["MOV EAX, 2", "MOV [EBP + 0], EAX"]);
}


#[test]
fn test_division_targeting_eax_skips_the_save() {
	let (report, listing) = compile("program P; var x, a, b: integer; begin x := a / b end.");

	assert!(report.unwrap().is_good());
	assert_not_emitted(&listing, "PUSH");
	assert_emitted(
		&listing,
		&[
			"MOV EAX, [EBP + 4]",
			"MOV EBX, [EBP + 8]",
			"CDQ",
			"IDIV EBX",
			"MOV [EBP + 0], EAX",
		],
	);
}


#[test]
fn test_division_off_eax_saves_the_pair() {
	let (report, listing) = compile(
		"program P; var x, a, b, c: integer; begin x := c + a / b end."
	);

	assert!(report.unwrap().is_good());
	assert_emitted(
		&listing,
		&[
			"MOV EAX, [EBP + 12]",
			"MOV EBX, [EBP + 4]",
			"MOV ECX, [EBP + 8]",
			"PUSH EAX",
			"PUSH EDX",
			"MOV EAX, EBX",
			"CDQ",
			"IDIV ECX",
			"POP EDX",
			"POP EAX",
			"ADD EAX, EAX, EBX",
			"MOV [EBP + 0], EAX",
		],
	);
}


#[test]
fn test_if_else_label_shape() {
	let (report, listing) = compile(
		"program P; var x: integer; begin if x < 0 then x := 0 else x := 1 end."
	);

	assert!(report.unwrap().is_good());
	assert_emitted(
		&listing,
		&[
			"kmain:",
			"MOV EAX, [EBP + 0]",
			"MOV EBX, 0",
			"CMP EAX, EBX",
			"JL if0",
			"JMP else0",
			"if0:",
			"MOV EAX, 0",
			"MOV [EBP + 0], EAX",
			"JMP endif0",
			"else0:",
			"MOV EAX, 1",
			"MOV [EBP + 0], EAX",
			"JMP endif0",
			"endif0:",
			"POPAD",
		],
	);
}


#[test]
fn test_while_label_shape() {
	let (report, listing) = compile(
		"program P; var x: integer; begin while x > 0 do x := x - 1 end."
	);

	assert!(report.unwrap().is_good());
	assert_emitted(
		&listing,
		&[
			"kmain:",
			"while0:",
			"MOV EAX, [EBP + 0]",
			"MOV EBX, 0",
			"CMP EAX, EBX",
			"JG while0inner",
			"JMP endwhile0",
			"while0inner:",
			"MOV EAX, [EBP + 0]",
			"MOV EBX, 1",
			"SUB EAX, EAX, EBX",
			"MOV [EBP + 0], EAX",
			"JMP while0",
			"endwhile0:",
		],
	);
}


#[test]
fn test_nested_ifs_number_their_labels_uniquely() {
	let (report, listing) = compile(
		"program P; var x: integer; \
		 begin if x < 0 then if x < 1 then x := 0 else x := 1 else x := 2 end."
	);

	assert!(report.unwrap().is_good());
	for label in ["if0:", "endif0:", "else0:", "if1:", "endif1:", "else1:"] {
		assert!(listing.lines().filter(|line| *line == label).count() == 1, "missing {}", label);
	}
}


#[test]
fn test_and_jumps_to_the_pending_or_label() {
	let (report, listing) = compile(
		"program P; var x: integer; begin if (x < 1) and (x > 0) then x := 1 end."
	);

	assert!(report.unwrap().is_good());
	assert_emitted(
		&listing,
		&[
			"MOV EAX, [EBP + 0]",
			"MOV EBX, 1",
			"CMP EAX, EBX",
			"JGE or0",
			"MOV EAX, [EBP + 0]",
			"MOV EBX, 0",
			"CMP EAX, EBX",
			"JG if0",
			"or0:",
			"JMP else0",
			"if0:",
		],
	);
}


#[test]
fn test_or_jumps_into_the_taken_branch() {
	let (report, listing) = compile(
		"program P; var x: integer; begin if (x < 1) or (x > 0) then x := 1 end."
	);

	assert!(report.unwrap().is_good());
	assert_emitted(
		&listing,
		&[
			"MOV EAX, [EBP + 0]",
			"MOV EBX, 1",
			"CMP EAX, EBX",
			"JL if0",
			"MOV EAX, [EBP + 0]",
			"MOV EBX, 0",
			"CMP EAX, EBX",
			"JG if0",
			"JMP else0",
			"if0:",
		],
	);
}


#[test]
fn test_or_inside_while_targets_the_inner_label() {
	let (report, listing) = compile(
		"program P; var x: integer; begin while (x < 1) or (x > 0) do x := 1 end."
	);

	assert!(report.unwrap().is_good());
	assert_emitted(&listing, &["JL while0inner"]);
	assert_emitted(&listing, &["JG while0inner", "JMP endwhile0", "while0inner:"]);
}


#[test]
fn test_procedure_frame_and_epilogue_match() {
	let (report, listing) = compile(
		"program P; var x: integer; \
		 procedure Q(a: integer); var b: integer; begin b := a end; \
		 begin Q(5) end."
	);

	assert!(report.unwrap().is_good());
	assert_emitted(
		&listing,
		&[
			"Q:",
			"PUSH EDI",
			"MOV EDI, ESP",
			"SUB ESP, 4",
			"PUSHAD",
			"MOV EAX, [EDI + 8]",
			"MOV [EDI - 0], EAX",
			"POPAD",
			"ADD ESP, 4",
			"POP EDI",
			"RET 4",
			"kmain:",
			"MOV EAX, 5",
			"PUSH EAX",
			"CALL Q",
			"POPAD",
		],
	);
}


#[test]
fn test_procedure_without_parameters_returns_plain() {
	let (report, listing) = compile(
		"program P; procedure Q(); begin end; begin Q() end."
	);

	assert!(report.unwrap().is_good());
	assert_emitted(&listing, &["Q:", "PUSH EDI", "MOV EDI, ESP", "PUSHAD", "POPAD", "POP EDI", "RET"]);
	assert_emitted(&listing, &["kmain:", "CALL Q"]);
}


#[test]
fn test_procedure_arguments_are_emitted_in_reverse() {
	let (report, listing) = compile(
		"program P; procedure Q(a, b: integer); begin end; begin Q(1, 2) end."
	);

	assert!(report.unwrap().is_good());
	assert_emitted(
		&listing,
		&[
			"MOV EAX, 2",
			"PUSH EAX",
			"MOV EAX, 1",
			"PUSH EAX",
			"CALL Q",
		],
	);
}


#[test]
fn test_function_arguments_are_emitted_in_declaration_order() {
	let (report, listing) = compile(
		"program P; var x: integer; \
		 function F(a, b: integer): integer; begin F := a end; \
		 begin x := F(1, 2) end."
	);

	assert!(report.unwrap().is_good());
	assert_emitted(
		&listing,
		&[
			"MOV EAX, 1",
			"PUSH EAX",
			"MOV EAX, 2",
			"PUSH EAX",
			"CALL F",
			"MOV [EBP + 0], EAX",
		],
	);
}


#[test]
fn test_function_gets_a_label_and_an_epilogue() {
	let (report, listing) = compile(
		"program P; var x: integer; \
		 function F(a: integer): integer; begin F := a end; \
		 begin x := F(1) end."
	);

	assert!(report.unwrap().is_good());
	assert_emitted(
		&listing,
		&[
			"F:",
			"PUSH EDI",
			"MOV EDI, ESP",
			"SUB ESP, 4",
			"PUSHAD",
			"MOV EAX, [EDI + 8]",
			"MOV [EDI - 0], EAX",
			"POPAD",
			"ADD ESP, 4",
			"POP EDI",
			"RET 4",
		],
	);
}


#[test]
fn test_by_reference_parameter_addressing() {
	let (report, listing) = compile(
		"program P; var x: integer; \
		 procedure Q(var a: integer); begin a := a end; \
		 begin Q(x) end."
	);

	assert!(report.unwrap().is_good());

	// Reads dereference [EDI - off], stores dereference [EDI + off].
	assert_emitted(
		&listing,
		&[
			"MOV ESI, [EDI - 8]",
			"MOV EAX, [ESI]",
			"MOV ESI, [EDI + 8]",
			"MOV [ESI], EAX",
		],
	);

	// The call site pushes the variable's data-segment address.
	assert_emitted(&listing, &["MOV EAX, 0", "ADD EAX, EBP", "PUSH EAX", "CALL Q"]);
}


#[test]
fn test_array_declarations_are_accepted_and_inert() {
	let (report, listing) = compile(
		"program P; var a: array[1..5] of integer; begin a := 3 end."
	);

	assert!(report.unwrap().is_good());
	assert_emitted(&listing, &["MOV EAX, 3", "MOV [EBP + 0], EAX"]);
}


#[test]
fn test_array_ranges_accept_spaced_dots_too() {
	let (report, _) = compile(
		"program P; var a: array [ 1 .. 5, 0 .. 9 ] of integer; begin a := 0 end."
	);

	assert!(report.unwrap().is_good());
}


#[test]
fn test_assignment_type_mismatch() {
	let (report, _) = compile("program P; var x: real; begin x := 1 end.");

	assert_matches!(report, Err(syntax::Error::Parser(Error::TypeMismatch)));
}


#[test]
fn test_real_equality_is_rejected() {
	let (report, _) = compile("program P; var x: real; begin if x = x then x := x end.");

	assert_matches!(report, Err(syntax::Error::Parser(Error::RealEquality)));
}


#[test]
fn test_comparison_requires_matching_types() {
	let (report, _) = compile(
		"program P; var x: integer; var y: real; begin if x < y then x := 1 end."
	);

	assert_matches!(report, Err(syntax::Error::Parser(Error::InvalidComparison)));
}


#[test]
fn test_unknown_identifier_in_expression() {
	let (report, _) = compile("program P; var x: integer; begin x := y end.");

	assert_matches!(report, Err(syntax::Error::Parser(Error::NotAVariable { .. })));
}


#[test]
fn test_unbound_reference_argument_is_a_scope_error() {
	let (report, _) = compile(
		"program P; procedure Q(var a: integer); begin a := 0 end; begin Q(a) end."
	);

	assert_matches!(report, Err(syntax::Error::Parser(Error::NotAVariable { .. })));
}


#[test]
fn test_function_argument_type_mismatch() {
	let (report, _) = compile(
		"program P; var x: integer; \
		 function F(a: integer): integer; begin F := a end; \
		 begin x := F(1.5) end."
	);

	assert_matches!(report, Err(syntax::Error::Parser(Error::ArgumentTypeMismatch { .. })));
}


#[test]
fn test_return_type_mismatch() {
	let (report, _) = compile(
		"program P; var x: real; \
		 function F(): integer; begin F := 0 end; \
		 begin x := F() end."
	);

	assert_matches!(report, Err(syntax::Error::Parser(Error::ReturnTypeMismatch)));
}


#[test]
fn test_duplicate_variable_declaration() {
	let (report, _) = compile("program P; var x: integer; var x: real; begin end.");

	assert_matches!(
		report,
		Err(syntax::Error::Parser(Error::Redefined { kind: EntryKind::Variable, .. }))
	);
}


#[test]
fn test_variable_reads_exhaust_the_register_pool() {
	let (report, _) = compile(
		"program P; var a, b, c, d, e: integer; begin a := a + (b + (c + (d + e))) end."
	);

	assert_matches!(report, Err(syntax::Error::Parser(Error::RegistersExhausted)));
}


#[test]
fn test_deep_literal_nesting_is_too_complicated() {
	let (report, _) = compile(
		"program P; var a: integer; begin a := 1 + (2 + (3 + (4 + 5))) end."
	);

	assert_matches!(report, Err(syntax::Error::Parser(Error::TooComplicated)));
}


#[test]
fn test_integer_literal_must_fit_the_word() {
	let (report, _) = compile("program P; var x: integer; begin x := 99999999999 end.");

	assert_matches!(report, Err(syntax::Error::Parser(Error::InvalidInteger { .. })));
}
