//! Line-level syntax of the primitive instruction grammar.
//!
//! Parsing here is purely syntactic; name resolution and graph mutation happen
//! in the engine.

use super::error::CompileError;
use super::instruction::Rhs;
use crate::store::{is_valid_name, Literal, NodeKind, Operation};

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Declare { kind: NodeKind, name: String },
    Define { name: String, rhs: Rhs },
}

/// Parses one line. Blank lines yield `Ok(None)`.
pub fn parse_statement(line: &str) -> Result<Option<Statement>, CompileError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let invalid = || CompileError::InvalidLine(line.trim().to_string());

    match tokens.as_slice() {
        [] => Ok(None),
        ["declare", kind, name] => {
            let kind = NodeKind::from_keyword(kind)
                .ok_or_else(|| CompileError::UnknownKind(kind.to_string()))?;
            if !is_valid_name(name) {
                return Err(CompileError::InvalidName(name.to_string()));
            }
            Ok(Some(Statement::Declare { kind, name: name.to_string() }))
        }
        ["define", name, "=", rhs @ ..] => {
            if !is_valid_name(name) {
                return Err(CompileError::InvalidName(name.to_string()));
            }
            let rhs = match rhs {
                [value] => Rhs::value(operand(value).ok_or_else(invalid)?),
                [op, x] => {
                    let op = op.parse::<Operation>().map_err(|_| invalid())?;
                    if op.arity() != 1 {
                        return Err(invalid());
                    }
                    Rhs::unary(op, operand(x).ok_or_else(invalid)?)
                }
                [op, a, b] => {
                    let op = op.parse::<Operation>().map_err(|_| invalid())?;
                    if op.arity() != 2 {
                        return Err(invalid());
                    }
                    Rhs::binary(op, operand(a).ok_or_else(invalid)?, operand(b).ok_or_else(invalid)?)
                }
                _ => return Err(invalid()),
            };
            Ok(Some(Statement::Define { name: name.to_string(), rhs }))
        }
        _ => Err(invalid()),
    }
}

fn operand(token: &str) -> Option<&str> {
    if Literal::parse(token).is_some() || is_valid_name(token) {
        Some(token)
    } else {
        None
    }
}

/// Lowers a right-hand side to the operation stored on the graph and its
/// ordered operands. A bare value `v` becomes `add v 0`.
pub fn canonical_form(rhs: &Rhs) -> (Operation, Vec<&str>) {
    match rhs {
        Rhs::Value(v) => (Operation::Add, vec![v.as_str(), "0"]),
        Rhs::Unary(op, x) => (*op, vec![x.as_str()]),
        Rhs::Binary(op, a, b) => (*op, vec![a.as_str(), b.as_str()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("declare weight w", Statement::Declare { kind: NodeKind::Weight, name: "w".into() })]
    #[case("  declare   exp_output  y ", Statement::Declare { kind: NodeKind::ExpectedOutput, name: "y".into() })]
    #[case("define h = 3", Statement::Define { name: "h".into(), rhs: Rhs::value("3") })]
    #[case("define h = x", Statement::Define { name: "h".into(), rhs: Rhs::value("x") })]
    #[case("define h = ln x", Statement::Define { name: "h".into(), rhs: Rhs::unary(Operation::NaturalLog, "x") })]
    #[case("define h = pow x -2", Statement::Define { name: "h".into(), rhs: Rhs::binary(Operation::Power, "x", "-2") })]
    fn test_valid_statements(#[case] line: &str, #[case] expected: Statement) {
        assert_eq!(parse_statement(line), Ok(Some(expected)));
    }

    #[rstest]
    #[case("define h = add x", -1)]
    #[case("define h = exp x y", -1)]
    #[case("define h = sub x y", -1)]
    #[case("define h = mul x y z", -1)]
    #[case("define h x", -1)]
    #[case("define h =", -1)]
    #[case("declare input", -1)]
    #[case("assign h = x", -1)]
    #[case("define h = mul x 2y", -1)]
    #[case("declare tensor t", -6)]
    #[case("declare input 9lives", -11)]
    #[case("define d/l = 1", -11)]
    fn test_invalid_statements(#[case] line: &str, #[case] code: i32) {
        let err = parse_statement(line).unwrap_err();
        assert_eq!(err.code(), code, "{line}: {err}");
    }

    #[test]
    fn test_blank_line_is_skipped() {
        assert_eq!(parse_statement("   \t"), Ok(None));
    }

    #[test]
    fn test_bare_values_become_add_zero() {
        let binding = Rhs::value("y");
        let (op, operands) = canonical_form(&binding);
        assert_eq!(op, Operation::Add);
        assert_eq!(operands, vec!["y", "0"]);
    }
}
