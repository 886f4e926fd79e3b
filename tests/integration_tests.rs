//! End-to-end tests driving the public API: build the fixture classes,
//! check the emitted bytes and the driver's bookkeeping.

use std::path::PathBuf;

use uscript::compiler::bytecode::{OpCode, header_len, read_u16};
use uscript::compiler::{ConversionCost, conversion_cost};
use uscript::core::{PropType, Property, PropertyFlags};
use uscript::prelude::*;
use uscript::test_utils::{build_set, class_id, init_test_logging};
use uscript::{SourceFile, load_sources};

fn fixtures() -> Vec<SourceFile> {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_scripts");
    load_sources(&dir).unwrap()
}

fn fixture(class: &str) -> String {
    fixtures()
        .into_iter()
        .find(|f| f.class == class)
        .map(|f| f.text)
        .unwrap_or_else(|| panic!("no fixture for {class}"))
}

/// Object plus the given extra classes, built once.
fn with_object(classes: &[(&str, &str)]) -> (CompilationUnitSet, BuildReport, Vec<String>) {
    let object = fixture("Object");
    let mut all = vec![("Object", object.as_str())];
    all.extend_from_slice(classes);
    build_set(CompilerConfig::default(), &all)
}

fn op(code: OpCode) -> u8 {
    code.into()
}

/// Body bytes of `class.function`, after the parameter header.
fn body<'a>(set: &'a CompilationUnitSet, class: &str, function: &str) -> &'a [u8] {
    let node = set.find_node(class_id(set, class), function).unwrap();
    let code = set.callable_code(node).unwrap();
    &code[header_len(code).unwrap()..]
}

// =========================================
// Whole-build behavior
// =========================================

#[test]
fn fixtures_build_and_round_trip() {
    init_test_logging();
    let mut set = CompilationUnitSet::new(CompilerConfig::default().with_verify_round_trip(true));
    for file in fixtures() {
        set.add_class(&file.class, file.text).unwrap();
    }
    let mut log = Vec::new();
    let report = set.compile_all(&mut NullHost, &mut log).unwrap();
    assert!(report.failed.is_empty(), "{:?}\n{}", report.failed, log.join("\n"));
    assert!(report.round_trip_mismatches.is_empty(), "{}", log.join("\n"));
    assert_eq!(report.compiled.len(), 5);

    for name in ["Actor", "Pawn", "Inventory", "Counter"] {
        let id = class_id(&set, name);
        assert!(set.verify_round_trip(id).unwrap(), "{}", set.decompile(id).unwrap());
    }
}

#[test]
fn decompiled_source_reads_back_the_constructs() {
    let (set, report, _) = build_set(
        CompilerConfig::default(),
        &[
            ("Object", fixture("Object").as_str()),
            ("Actor", fixture("Actor").as_str()),
            ("Inventory", fixture("Inventory").as_str()),
        ],
    );
    assert!(report.is_success(), "{:?}", report.failed);

    let actor = set.decompile(class_id(&set, "Actor")).unwrap();
    assert!(actor.contains("class Actor expands Object;"));
    assert!(actor.contains("foreach AllActors(class'Actor', A)"));
    assert!(actor.contains("Physics = PHYS_Falling;"));
    assert!(actor.contains("Location.X = 1.5;"));
    assert!(actor.contains("Rotation.Yaw = -4;"));
    assert!(actor.contains("auto state Idle"));

    let inventory = set.decompile(class_id(&set, "Inventory")).unwrap();
    assert!(inventory.contains("switch (Kind)"));
    assert!(inventory.contains("Level = 3;"));
    assert!(inventory.contains("} until (Total > 5);"));
}

#[test]
fn exec_directives_reach_the_host() {
    init_test_logging();
    let mut set = CompilationUnitSet::new(CompilerConfig::default());
    set.add_class("Object", fixture("Object")).unwrap();
    set.add_class("Actor", fixture("Actor")).unwrap();
    let mut host = RecordingHost::default();
    let report = set.compile_all(&mut host, &mut Vec::new()).unwrap();
    assert!(report.is_success());
    assert_eq!(host.commands.len(), 1);
    assert_eq!(host.commands[0].0, "Actor");
    assert!(host.commands[0].1.contains("TEXTURE IMPORT"));
}

// =========================================
// Conversions and operators
// =========================================

#[test]
fn conversion_cost_is_deterministic_and_out_params_are_strict() {
    let (set, report, _) = with_object(&[("Actor", fixture("Actor").as_str()), ("Pawn", fixture("Pawn").as_str())]);
    assert!(report.is_success(), "{:?}", report.failed);

    let int = Property::value(PropType::Int);
    let byte = Property::value(PropType::Byte);
    let first = conversion_cost(&int, &byte, &set);
    assert_eq!(first, conversion_cost(&int, &byte, &set));
    assert_eq!(first, ConversionCost::WIDEN);

    let out_int = Property::new("A", PropType::Int).with_flags(PropertyFlags::OUT_PARM);
    assert_eq!(conversion_cost(&out_int, &byte, &set), ConversionCost::INCOMPATIBLE);
    assert_eq!(conversion_cost(&out_int, &int, &set), ConversionCost::IDENTICAL);

    let pawn = Property::value(PropType::object("Pawn"));
    let actor = Property::value(PropType::object("Actor"));
    let object = Property::value(PropType::object("Object"));
    assert_eq!(conversion_cost(&actor, &pawn, &set), ConversionCost(1));
    assert_eq!(conversion_cost(&object, &pawn, &set), ConversionCost(2));
    assert!(!conversion_cost(&pawn, &actor, &set).is_compatible());
}

#[test]
fn tighter_operator_is_emitted_inside_the_looser_one() {
    let (set, report, _) = with_object(&[(
        "Prec",
        "class Prec expands Object;\nfunction int F(int A, int B, int C) { return A + B * C; }",
    )]);
    assert!(report.is_success(), "{:?}", report.failed);

    // [+] A [*] B C, with + and * as natives 100 and 102
    let expected = [
        op(OpCode::Return),
        op(OpCode::Native),
        100,
        0,
        op(OpCode::LocalVariable),
        0,
        0,
        op(OpCode::Native),
        102,
        0,
        op(OpCode::LocalVariable),
        4,
        0,
        op(OpCode::LocalVariable),
        8,
        0,
        op(OpCode::EndFunctionParms),
        op(OpCode::EndFunctionParms),
    ];
    assert!(body(&set, "Prec", "F").starts_with(&expected));
}

#[test]
fn equally_good_overloads_are_ambiguous() {
    let (_, report, log) = with_object(&[(
        "Amb",
        "class Amb expands Object;
intrinsic(300) static final operator(20) int % (int A, float B);
intrinsic(301) static final operator(20) int % (float A, int B);
function int F(int A, int B) { return A % B; }",
    )]);
    let (class, err) = &report.failed[0];
    assert_eq!(class, "Amb");
    assert!(matches!(err, CompileError::AmbiguousOperator { op, .. } if op == "%"), "{err}");
    assert_eq!(err.category(), ErrorCategory::Semantic);
    assert!(log.iter().any(|line| line.contains("ambiguous")));
}

// =========================================
// Semantic checks
// =========================================

const BASE: &str = "class Base expands Object;
var const int Fixed;
var int Slots[2];
function int Score(int A) { return A; }
final function Lock() {}
private function Secret() {}
intrinsic(200) final iterator function Each(out int I);
intrinsic(201) final latent function Sleep(float Seconds);";

#[test]
fn semantic_rules_reject_the_offending_class() {
    let cases = [
        ("function Score(int A) {}", "does not match the declaration in 'Base'"),
        ("function int Score(float A) { return 0; }", "does not match the declaration in 'Base'"),
        ("function Lock() {}", "overrides a final function of 'Base'"),
        ("function F(Base B) { local Base C; C = Base(B); }", "is redundant"),
        ("function F(Base B) { local Object O; O = Object(B); }", "is unnecessary"),
        ("function F(Base B) { local Other O; O = Other(B); }", "will always fail"),
        ("function F(int I) { I = int(I); }", "is redundant"),
        ("function F() { Secret(); }", "is private to class 'Base'"),
        ("function F() { Sleep(1.0); }", "can only be called from state code"),
        ("function F() { local int I; Each(I); }", "can only be called as a foreach head"),
        ("function F() { Fixed = 1; }", "cannot assign to const 'Fixed'"),
        ("function F(name N) { switch (N) { case 3: break; } }", "case value"),
        ("function F(int I) { I; }", "expression has no effect"),
        ("function F() { Slots[2] = 1; }", "index 2 is out of bounds for 'Slots[2]'"),
        ("function F() { Slots[-1] = 1; }", "index -1 is out of bounds"),
    ];
    for (body, message) in cases {
        let source = format!("class Rules expands Base;\n{body}");
        let (_, report, _) = with_object(&[
            ("Base", BASE),
            ("Other", "class Other expands Object;"),
            ("Rules", source.as_str()),
        ]);
        let failed: Vec<&str> = report.failed.iter().map(|(class, _)| class.as_str()).collect();
        assert_eq!(failed, ["Rules"], "{body}: {:?}", report.failed);
        let (_, err) = &report.failed[0];
        assert!(err.to_string().contains(message), "{body}: {err}");
        assert_eq!(err.category(), ErrorCategory::Semantic, "{body}: {err}");
    }
}

#[test]
fn constant_indices_inside_the_bounds_compile() {
    let (set, report, _) = with_object(&[
        ("Base", BASE),
        ("Rules", "class Rules expands Base;\nfunction F(int I) { Slots[0] = 1; Slots[1] = 2; Slots[I] = 3; }"),
    ]);
    assert!(report.is_success(), "{:?}", report.failed);
    assert!(set.verify_round_trip(class_id(&set, "Rules")).unwrap());
}

// =========================================
// Control flow
// =========================================

#[test]
fn if_else_jumps_land_inside_the_callable() {
    let (set, report, _) = with_object(&[(
        "Branch",
        "class Branch expands Object;
var int X;
function F(bool B) { if (B) { X = 1; } else { X = 2; } }
function G(bool B) { if (B) {} else {} }",
    )]);
    assert!(report.is_success(), "{:?}", report.failed);

    for (function, empty_else) in [("F", false), ("G", true)] {
        let node = set.find_node(class_id(&set, "Branch"), function).unwrap();
        let code = set.callable_code(node).unwrap();
        let start = header_len(code).unwrap();
        assert_eq!(code[start], op(OpCode::JumpIfNot));
        let else_at = read_u16(code, start + 1).unwrap() as usize;

        // the then-branch ends with the jump over the else-branch
        let jump_at = else_at - 3;
        assert_eq!(code[jump_at], op(OpCode::Jump));
        let end = read_u16(code, jump_at + 1).unwrap() as usize;

        assert!(else_at > start && else_at < code.len());
        assert!(end >= else_at && end < code.len());
        assert_eq!(end == else_at, empty_else, "{function}");
        assert_eq!(code[end], op(OpCode::Return));
        assert_eq!(code[end + 1], op(OpCode::Nothing));
    }
    assert!(set.verify_round_trip(class_id(&set, "Branch")).unwrap());
}

#[test]
fn unresolved_goto_is_structural() {
    let (_, report, _) = with_object(&[(
        "Lost",
        "class Lost expands Object;\nfunction F() { goto Nowhere; }",
    )]);
    let (_, err) = &report.failed[0];
    assert!(matches!(err, CompileError::UnresolvedLabel { name, .. } if name == "Nowhere"));
    assert_eq!(err.category(), ErrorCategory::Structural);
}

// =========================================
// Driver
// =========================================

#[test]
fn changing_a_parent_invalidates_its_children_only() {
    let (mut set, report, _) = with_object(&[
        ("Actor", fixture("Actor").as_str()),
        ("Pawn", fixture("Pawn").as_str()),
        ("Counter", fixture("Counter").as_str()),
    ]);
    assert!(report.is_success(), "{:?}", report.failed);

    let actor = class_id(&set, "Actor");
    let pawn = class_id(&set, "Pawn");
    let counter = class_id(&set, "Counter");
    let edited = fixture("Actor").replace("var int Health;", "var int Health;\nvar int Armor;");
    let invalidated = set.set_source(actor, edited);

    assert!(invalidated.contains(&actor));
    assert!(invalidated.contains(&pawn));
    assert!(!invalidated.contains(&counter));
    assert_ne!(set.status(pawn), Some(ClassStatus::Compiled));
    assert_eq!(set.status(counter), Some(ClassStatus::Compiled));

    let report = set.compile_all(&mut NullHost, &mut Vec::new()).unwrap();
    assert!(report.is_success(), "{:?}", report.failed);
    assert_eq!(report.compiled, ["Actor", "Pawn"]);
}

#[test]
fn a_failing_class_is_rolled_back_and_the_build_goes_on() {
    let (set, report, log) = with_object(&[
        ("Broken", "class Broken expands Object;\nfunction F() { Missing = 1; }"),
        ("Counter", fixture("Counter").as_str()),
    ]);
    assert_eq!(report.failed.len(), 1);
    assert!(report.compiled.contains(&"Counter".to_string()));
    assert!(log.iter().any(|line| line.contains("Missing")));

    let broken = class_id(&set, "Broken");
    assert_eq!(set.status(broken), Some(ClassStatus::Failed));
    assert!(set.unit(broken).unwrap().code().bytes.is_empty());
}

#[test]
fn code_calling_into_a_failed_class_is_rolled_back_with_it() {
    let (mut set, report, log) = with_object(&[
        ("User", "class User expands Object;\nvar Tool T;\nfunction F() { T.Bump(); }"),
        ("Tool", "class Tool expands Object;\nfinal function Bump() { Missing = 1; }"),
        ("Counter", fixture("Counter").as_str()),
    ]);
    let failed: Vec<&str> = report.failed.iter().map(|(class, _)| class.as_str()).collect();
    assert_eq!(failed, ["Tool", "User"]);
    let (_, err) = &report.failed[1];
    assert!(matches!(err, CompileError::DependencyFailed { dependency, .. } if dependency == "Tool"), "{err}");
    assert_eq!(err.category(), ErrorCategory::Driver);
    assert!(log.iter().any(|line| line.starts_with("User(") && line.contains("rolled back")));
    assert_eq!(report.compiled, ["Object", "Counter"]);

    let user = class_id(&set, "User");
    let tool = class_id(&set, "Tool");
    assert_eq!(set.status(user), Some(ClassStatus::Failed));
    assert!(set.unit(user).unwrap().code().bytes.is_empty());

    set.set_source(tool, "class Tool expands Object;\nfinal function Bump() {}");
    let report = set.compile_all(&mut NullHost, &mut Vec::new()).unwrap();
    assert!(report.is_success(), "{:?}", report.failed);
    assert!(set.decompile(user).unwrap().contains("T.Bump();"));
}

#[test]
fn bootstrap_mode_stops_at_the_first_error() {
    init_test_logging();
    let mut set = CompilationUnitSet::new(CompilerConfig::default().with_bootstrap(true));
    set.add_class("Object", fixture("Object")).unwrap();
    set.add_class("Broken", "class Broken expands Object;\nfunction F() { Missing = 1; }")
        .unwrap();
    let err = set.compile_all(&mut NullHost, &mut Vec::new()).unwrap_err();
    assert!(matches!(err, CompileError::UnknownIdentifier { ref name, .. } if name == "Missing"));
}
