use crate::ast::*;
use crate::error::{CompileError, Error, IF_IN_CONDITION};
use crate::traverse::{rename_identifier, walk_fork_mut, NodeMut};
use serde_json::json;

// ── Shared fixture runners ──────────────────────────────────────────

/// Embed fixture files at compile time.
const COMPILE_FIXTURES: &str = include_str!("../test-data/fixtures/compile.json");
const PARSE_ERROR_FIXTURES: &str = include_str!("../test-data/fixtures/parse-errors.json");

#[test]
fn test_fixture_compile() {
    let fixtures: Vec<serde_json::Value> = serde_json::from_str(COMPILE_FIXTURES).unwrap();

    for fixture in &fixtures {
        let name = fixture["name"].as_str().unwrap();
        let input = fixture["input"].as_str().unwrap();
        let expected = &fixture["expected"];

        let ir = crate::compile(input)
            .unwrap_or_else(|err| panic!("Fixture '{}': unexpected error: {}", name, err));
        assert_eq!(
            &ir, expected,
            "Fixture '{}': IR mismatch\n  Got:      {}\n  Expected: {}",
            name, ir, expected
        );
    }
}

#[test]
fn test_fixture_parse_errors() {
    let fixtures: Vec<serde_json::Value> = serde_json::from_str(PARSE_ERROR_FIXTURES).unwrap();

    for fixture in &fixtures {
        let name = fixture["name"].as_str().unwrap();
        let input = fixture["input"].as_str().unwrap();
        let code = fixture["code"].as_str().unwrap();
        let line = fixture["line"].as_u64().unwrap() as usize;

        let err = match crate::parse(input) {
            Ok(program) => panic!(
                "Fixture '{}': expected a parse error for input '{}', got {:?}",
                name, input, program
            ),
            Err(err) => err,
        };
        assert_eq!(err.code, code, "Fixture '{}': error code mismatch", name);
        assert_eq!(
            err.line(),
            line,
            "Fixture '{}': error line mismatch ({})",
            name,
            err
        );
    }
}

// ── Compiled output properties ──────────────────────────────────────

#[test]
fn test_fresh_parses_compile_identically() {
    let src = "input -> answer {\n  answer == 1 { act One }\n  _ { act Other }\n}\nrun \"Q\" () -> r";
    let first = crate::compile(src).unwrap();
    let second = crate::compile(src).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_precedence() {
    let ir = crate::compile("act 1 + 2 * 3").unwrap();
    assert_eq!(ir["@do"][0]["@act"], json!(["+", 1, ["*", 2, 3]]));
}

#[test]
fn test_literal_text_vs_name() {
    let text = crate::compile("X = \"hi\"").unwrap();
    assert_eq!(text["@do"][0], json!({"@set": "`X`", "val": "`hi`"}));

    let name = crate::compile("X = hi").unwrap();
    assert_eq!(name["@do"][0], json!({"@set": "`X`", "val": "hi"}));
}

#[test]
fn test_multi_target_is_not_unwrapped() {
    let many = crate::compile("X, Y = V").unwrap();
    assert_eq!(many["@do"][0]["@set"], json!(["`X`", "`Y`"]));

    let one = crate::compile("X = V").unwrap();
    assert_eq!(one["@do"][0]["@set"], json!("`X`"));
}

#[test]
fn test_sequence_is_not_unwrapped() {
    let ir = crate::compile("act A\nact B").unwrap();
    assert_eq!(ir, json!({"@do": [{"@act": "A"}, {"@act": "B"}]}));
}

#[test]
fn test_fork_next_to_other_statements_is_not_unwrapped() {
    let ir = crate::compile("act A\nif X { act B }").unwrap();
    assert!(ir.get("@do").is_some());
    assert!(ir.get("@fork").is_none());
}

#[test]
fn test_lone_input_unwraps_to_fork() {
    let ir = crate::compile("input -> r { _ { act r } }").unwrap();
    assert_eq!(
        ir,
        json!({"@fork": [{"@do": [{"@act": "_nlu"}]}], "await": ["input"]})
    );
}

#[test]
fn test_scheme_on_if() {
    let ir = crate::compile("#{depth: 3} if A { act B }").unwrap();
    assert_eq!(ir["scheme"], json!({"`depth`": 3}));
    assert_eq!(ir["@fork"][0]["if"], json!("A"));
}

#[test]
fn test_fractional_numbers_stay_floats() {
    let ir = crate::compile("act 0.5 * .25").unwrap();
    assert_eq!(ir["@do"][0]["@act"], json!(["*", 0.5, 0.25]));
}

#[test]
fn test_string_escapes() {
    let ir = crate::compile(r#"act "say \"hi\"\nA""#).unwrap();
    assert_eq!(ir["@do"][0]["@act"], json!("`say \"hi\"\nA`"));
}

#[test]
fn test_comment_markers_inside_strings_are_text() {
    let ir = crate::compile("act \"http://example.com\" // trailing").unwrap();
    assert_eq!(ir["@do"][0]["@act"], json!("`http://example.com`"));
}

#[test]
fn test_nested_input_inside_run_result() {
    let src = r#"
      run "Ask" (topic) -> answer {
        answer == "yes" {
          input -> reply {
            reply == answer { act Same }
          }
        }
      }
    "#;
    let ir = crate::compile(src).unwrap();
    let result_fork = &ir["@do"][0]["@do"][1];
    assert_eq!(result_fork["await"], json!(["return"]));
    assert_eq!(result_fork["@fork"][0]["if"], json!(["==", "_return", "`yes`"]));

    let input = &result_fork["@fork"][0]["@do"][0];
    assert_eq!(input["await"], json!(["input"]));
    assert_eq!(input["@fork"][0]["if"], json!(["==", "_nlu", "_return"]));
}

#[test]
fn test_planet_trivia_example() {
    let src = r#"
      if !exists(Init) {
        Init = true
        WrongCounter = 0
        Question = "What's the biggest planet?"
        CA = "planet.jupiter"
      }
      else {
        #{depth: 3}
        fork {
          WrongCounter <= 3 && !IsAnswerGiven  {
            act Question
            input -> result {
              result == CA {
                act CAResponse
                IsAnswerGiven = true
              }
              _ {
                WrongCounter = WrongCounter + 1
              }
            }
          }
          !IsAnswerGiven && WrongCounter == 3 {
            act Answer
            IsAnswerGiven = true
          }
        }
      }
    "#;
    let ir = crate::compile(src).unwrap();

    let branches = ir["@fork"].as_array().unwrap();
    assert_eq!(branches.len(), 2);
    assert_eq!(branches[0]["if"], json!(["!", ["?", "Init"]]));
    assert_eq!(
        branches[0]["@do"][2],
        json!({"@set": "`Question`", "val": "`What's the biggest planet?`"})
    );

    let inner = &branches[1]["@do"][0];
    assert_eq!(inner["scheme"], json!({"`depth`": 3}));
    assert_eq!(
        inner["@fork"][0]["if"],
        json!(["&&", ["<=", "WrongCounter", 3], ["!", "IsAnswerGiven"]])
    );
    let input = &inner["@fork"][0]["@do"][1];
    assert_eq!(input["await"], json!(["input"]));
    assert_eq!(input["@fork"][0]["if"], json!(["==", "_nlu", "CA"]));
    assert_eq!(
        input["@fork"][1]["@do"][0],
        json!({"@set": "`WrongCounter`", "val": ["+", "WrongCounter", 1]})
    );
}

// ── pref ────────────────────────────────────────────────────────────

#[test]
fn test_pref_numeric_spread() {
    let ir = crate::compile("utility = [pref({int: 10})]").unwrap();
    let val = &ir["@do"][0]["val"];
    assert_eq!(
        val,
        &json!([
            "",
            ["", {"`int`": 10}, {"`int`": 40}],
            ["", {"`int`": 10}, {"`int`": -20}]
        ])
    );
}

#[test]
fn test_pref_boolean_pair_is_not_spread() {
    let ir = crate::compile("utility = [pref({meeting_scheduled: true})]").unwrap();
    let val = ir["@do"][0]["val"].as_array().unwrap();
    // sentinel plus the one pair
    assert_eq!(val.len(), 2);
    assert_eq!(
        val[1],
        json!(["", {"`meeting_scheduled`": true}, {"`meeting_scheduled`": false}])
    );
}

#[test]
fn test_pref_outside_array() {
    let pair = crate::compile("act pref({done: false})").unwrap();
    assert_eq!(
        pair["@do"][0]["@act"],
        json!(["", {"`done`": false}, {"`done`": true}])
    );

    let spread = crate::compile("act pref({n: 0})").unwrap();
    assert_eq!(
        spread["@do"][0]["@act"],
        json!([["", {"`n`": 0}, {"`n`": 1}], ["", {"`n`": 0}, {"`n`": -1}]])
    );
}

#[test]
fn test_pref_rejects_string_values() {
    let err = crate::compile("utility = [pref({x: \"str\"})]").unwrap_err();
    assert!(matches!(err, Error::Compile(CompileError::Type { .. })), "{:?}", err);
}

#[test]
fn test_pref_rejects_non_string_flip_names() {
    let err = crate::compile("utility = [pref({x: 1}, [1])]").unwrap_err();
    match err {
        Error::Compile(CompileError::Type { message }) => {
            assert_eq!(message, "pref array must only contain strings")
        }
        other => panic!("expected a type error, got {:?}", other),
    }
}

#[test]
fn test_pref_requires_object() {
    let err = crate::compile("act pref(1)").unwrap_err();
    assert!(matches!(err, Error::Compile(CompileError::Malformed { .. })));
}

#[test]
fn test_flip_rules() {
    use crate::pref::{flip, Direction};
    assert_eq!(flip(&Literal::Boolean(true), Direction::Down), Literal::Boolean(false));
    assert_eq!(flip(&Literal::Number(0.0), Direction::Up), Literal::Number(1.0));
    assert_eq!(flip(&Literal::Number(0.0), Direction::Down), Literal::Number(-1.0));
    assert_eq!(flip(&Literal::Number(2.0), Direction::Up), Literal::Number(8.0));
    assert_eq!(flip(&Literal::Number(2.0), Direction::Down), Literal::Number(-4.0));
}

// ── Compile errors ──────────────────────────────────────────────────

#[test]
fn test_unsupported_assignment_targets() {
    for src in ["1 = 2", "X, Y[0] = 1", "f(x)[0] = 1"] {
        let err = crate::compile(src).unwrap_err();
        assert!(
            matches!(err, Error::Compile(CompileError::UnsupportedTarget { .. })),
            "{}: {:?}",
            src,
            err
        );
    }
}

#[test]
fn test_exists_without_argument() {
    let err = crate::compile("act exists()").unwrap_err();
    assert_eq!(err.code(), "dmpl-compile-malformed-node");
}

// ── Parse errors ────────────────────────────────────────────────────

#[test]
fn test_if_in_condition_message() {
    let err = crate::parse("fork {\n  if X == 0 {\n    act First\n  }\n}").unwrap_err();
    assert_eq!(err.code, IF_IN_CONDITION);
    assert_eq!(err.position.line, 2);
    assert_eq!(err.snippet, "if X == 0 {");
    assert_eq!(
        err.to_string(),
        "conditions do not need an `if`, remove it\n  Line 2: if X == 0 {"
    );
}

#[test]
fn test_error_position() {
    let err = crate::parse("act A\n  act [1,").unwrap_err();
    assert_eq!(err.position.line, 2);
    assert_eq!(err.position.column, 9);
    assert_eq!(err.position.offset, 15);
    assert_eq!(err.snippet, "act [1,");
}

#[test]
fn test_parse_error_surfaces_through_compile() {
    let err = crate::compile("act [").unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
    assert_eq!(err.code(), "dmpl-parse-syntax-error");
}

#[test]
fn test_error_to_json() {
    let err = crate::compile("fork {\n if A { act B }\n}").unwrap_err();
    let v = crate::json::error_to_json(&err);
    assert_eq!(v["code"], "dmpl-parse-if-in-condition");
    assert_eq!(v["line"], 2);

    let err = crate::compile("1 = 2").unwrap_err();
    let v = crate::json::error_to_json(&err);
    assert_eq!(v["code"], "dmpl-compile-unsupported-target");
    assert!(v["line"].is_null());
}

// ── Syntax tree shape ───────────────────────────────────────────────

fn ident(name: &str) -> Expression {
    Expression::Identifier(Identifier::new(name))
}

fn number(n: f64) -> Expression {
    Expression::Literal(Literal::Number(n))
}

#[test]
fn test_else_if_flattens_into_one_fork() {
    let program = crate::parse("if A { act 1 } else if B { act 2 } else { act 3 }").unwrap();
    assert_eq!(program.body.list.len(), 1);
    let Statement::Fork(fork) = &program.body.list[0] else {
        panic!("expected a fork, got {:?}", program.body.list[0]);
    };
    assert!(fork.scheme.is_none());
    let conditions: Vec<_> = fork.conditions.iter().map(|b| b.condition.clone()).collect();
    assert_eq!(conditions, vec![Some(ident("A")), Some(ident("B")), None]);
}

#[test]
fn test_indexed_assignment_parses_to_edit_reference() {
    let program = crate::parse("a[0][\"k\"] = 1").unwrap();
    match &program.body.list[0] {
        Statement::Set {
            target: SetTarget::EditReference { target, keys },
            value,
        } => {
            assert_eq!(target, &ident("a"));
            assert_eq!(
                keys,
                &vec![number(0.0), Expression::Literal(Literal::String("k".into()))]
            );
            assert_eq!(value, &number(1.0));
        }
        other => panic!("expected an indexed assignment, got {:?}", other),
    }
}

#[test]
fn test_binary_operators_fold_left() {
    let program = crate::parse("act 1 - 2 - 3").unwrap();
    let Statement::Act(expr) = &program.body.list[0] else {
        panic!("expected act");
    };
    let expected = Expression::BinOp {
        op: BinaryOperator::Sub,
        left: Box::new(Expression::BinOp {
            op: BinaryOperator::Sub,
            left: Box::new(number(1.0)),
            right: Box::new(number(2.0)),
        }),
        right: Box::new(number(3.0)),
    };
    assert_eq!(expr, &expected);
}

#[test]
fn test_word_literals_need_word_boundaries() {
    let program = crate::parse("act trueish\nact true").unwrap();
    assert_eq!(program.body.list[0], Statement::Act(ident("trueish")));
    assert_eq!(
        program.body.list[1],
        Statement::Act(Expression::Literal(Literal::Boolean(true)))
    );
}

#[test]
fn test_run_call_syntax_splits_name_and_args() {
    let program = crate::parse("run Foo(a, b)").unwrap();
    let Statement::Run(run) = &program.body.list[0] else {
        panic!("expected run");
    };
    assert_eq!(run.name, ident("Foo"));
    assert_eq!(run.args, vec![ident("a"), ident("b")]);
    assert!(run.result.is_none());
}

#[test]
fn test_use_records_imports_as_strings() {
    let program = crate::parse("use \"Lib\" import a, b").unwrap();
    assert_eq!(
        program.body.list[0],
        Statement::Use {
            name: Expression::Literal(Literal::String("Lib".into())),
            imports: vec![Literal::String("a".into()), Literal::String("b".into())],
        }
    );
}

// ── Traversal ───────────────────────────────────────────────────────

fn first_fork(src: &str) -> Fork {
    match crate::parse(src).unwrap().body.list.into_iter().next() {
        Some(Statement::Fork(fork)) => fork,
        other => panic!("expected a fork, got {:?}", other),
    }
}

#[test]
fn test_rename_reaches_nested_scopes() {
    let mut fork = first_fork("fork { x == 1 { y = x\n once { act [x, f(x)] } } _ { x = 2 } }");
    rename_identifier(&mut fork, "x", "_nlu");

    let mut names = Vec::new();
    walk_fork_mut(&mut fork, &mut |node: NodeMut<'_>| {
        if let NodeMut::Identifier(ident) = node {
            names.push(ident.name.clone());
        }
    });
    assert_eq!(names, vec!["_nlu", "y", "_nlu", "_nlu", "f", "_nlu", "_nlu"]);
}

#[test]
fn test_rename_skips_object_keys() {
    let mut fork = first_fork("#{x: x} fork { _ { act {x: x} } }");
    rename_identifier(&mut fork, "x", "_return");

    let scheme = fork.scheme.as_ref().unwrap();
    assert_eq!(scheme.properties[0].name.name, "x");
    assert_eq!(scheme.properties[0].value, ident("_return"));
}

#[test]
fn test_walk_visits_parents_first() {
    let mut fork = first_fork("fork { a { act b } }");
    let mut kinds = Vec::new();
    walk_fork_mut(&mut fork, &mut |node: NodeMut<'_>| {
        kinds.push(match node {
            NodeMut::StatementList(_) => "list",
            NodeMut::Statement(_) => "statement",
            NodeMut::Fork(_) => "fork",
            NodeMut::ForkBranch(_) => "branch",
            NodeMut::Expression(_) => "expression",
            NodeMut::Identifier(_) => "identifier",
            NodeMut::Literal(_) => "literal",
        });
    });
    assert_eq!(
        kinds,
        vec![
            "fork",
            "branch",
            "expression",
            "identifier",
            "list",
            "statement",
            "expression",
            "identifier"
        ]
    );
}
