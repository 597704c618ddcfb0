//! Grammar, lexer, and AST for automation scripts run by the interpreter.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{Branch, Node, Operator, OperandGroup, OtherKind, Scope, ScopeOptions};
pub use error::{lint, ParseError};
pub use parser::parse;

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_core::value::Value;

    fn top_children(script: &str) -> Vec<Node> {
        match parse(script).unwrap() {
            Node::Scope(s) => s.children,
            _ => panic!("expected top-level scope"),
        }
    }

    #[test]
    fn parses_arithmetic_assignment() {
        let lines = top_children("x = ( 2 + ( 3 * 4 ) )\n");
        assert_eq!(lines.len(), 1);
        match &lines[0] {
            Node::Line { line_no: 1, child } => match &**child {
                Node::Assignment { target, value } => {
                    assert!(matches!(**target, Node::Variable { ref name, .. } if name == "x"));
                    assert!(matches!(**value, Node::Infix { .. }));
                }
                other => panic!("expected assignment, got {other:?}"),
            },
            other => panic!("expected line 1, got {other:?}"),
        }
    }

    #[test]
    fn line_numbers_track_source() {
        let lines = top_children("x = 1\ny = 2\nz = 3\n");
        let nums: Vec<u32> = lines
            .iter()
            .map(|l| match l {
                Node::Line { line_no, .. } => *line_no,
                _ => panic!("expected line"),
            })
            .collect();
        assert_eq!(nums, vec![1, 2, 3]);
    }

    #[test]
    fn parses_ifelse_branches() {
        let lines = top_children("y = 0\nif ( x > 5 ) then y = 1\nelse y = 2\n");
        let ifelse_line = &lines[1];
        match ifelse_line {
            Node::Line { child, .. } => match &**child {
                Node::IfElse(branches) => {
                    assert_eq!(branches.len(), 2);
                    assert!(branches[0].condition.is_some());
                    assert!(branches[1].condition.is_none());
                }
                other => panic!("expected ifelse, got {other:?}"),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn parses_goto_and_jump_point() {
        let lines = top_children(":top\nx = ( x + 1 )\nif ( x < 3 ) then goto top\n");
        assert!(matches!(
            lines[0],
            Node::Line {
                child: ref c,
                ..
            } if matches!(**c, Node::JumpPoint { .. })
        ));
    }

    #[test]
    fn parses_scope_with_options() {
        let lines = top_children("begin(description='step', max_time=30)\nx = 1\nend\n");
        match &lines[0] {
            Node::Line { child, .. } => match &**child {
                Node::Scope(scope) => {
                    assert_eq!(scope.options.description.as_deref(), Some("step"));
                    assert_eq!(scope.options.max_time, Some(30));
                    assert_eq!(scope.children.len(), 1);
                }
                other => panic!("expected scope, got {other:?}"),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn parses_function_call_with_named_parameters() {
        let lines = top_children("delay(seconds=2)\n");
        match &lines[0] {
            Node::Line { child, .. } => match &**child {
                Node::Function { name, parameters, .. } => {
                    assert_eq!(name, "delay");
                    assert_eq!(parameters.len(), 1);
                    assert_eq!(parameters[0].0, "seconds");
                    assert!(matches!(parameters[0].1, Node::Constant(Value::Int(2))));
                }
                other => panic!("expected function, got {other:?}"),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn rejects_incomplete_infix() {
        let err = parse("x = ( 1 + )\n").unwrap_err();
        assert!(err.line >= 1);
    }

    #[test]
    fn lint_reports_first_error() {
        assert!(lint("x = ( 1 + )\n").is_some());
        assert!(lint("x = 1\n").is_none());
    }
}
