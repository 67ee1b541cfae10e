use super::instruction::Rhs;
use crate::store::Operation;

/// What a rule needs from the engine: fresh helper variables and a way to
/// bind the final derivative.
pub(super) trait GradientOps {
    /// Declares and defines a new intermediate helper scoped under `target`
    /// and returns its name.
    fn add_helper(&mut self, target: &str, rhs: Rhs) -> String;

    /// Binds `target`, which the caller has already declared.
    fn define(&mut self, target: &str, rhs: Rhs);
}

/// Which operand a local derivative is taken with respect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Slot {
    First,
    Second,
}

/// The operands of the node being differentiated, by their emitted text.
#[derive(Debug, Clone, Copy)]
pub(super) struct Operands<'a> {
    pub first: &'a str,
    pub second: Option<&'a str>,
}

impl<'a> Operands<'a> {
    fn same(&self) -> bool {
        self.second == Some(self.first)
    }

    fn second_or_first(&self) -> &'a str {
        self.second.unwrap_or(self.first)
    }
}

/// Emits the definition of `target = d(op(operands)) / d(operand at slot)`.
pub(super) fn apply_rule(
    ops: &mut impl GradientOps,
    op: Operation,
    slot: Slot,
    operands: Operands<'_>,
    target: &str,
) {
    let x = operands.first;
    match op {
        Operation::Add => ops.define(target, Rhs::value("1")),
        Operation::Multiply => {
            if operands.same() {
                ops.define(target, Rhs::binary(Operation::Multiply, "2", x));
            } else {
                let other = match slot {
                    Slot::First => operands.second_or_first(),
                    Slot::Second => x,
                };
                ops.define(target, Rhs::value(other));
            }
        }
        Operation::Exp => ops.define(target, Rhs::unary(Operation::Exp, x)),
        Operation::NaturalLog => ops.define(target, Rhs::binary(Operation::Power, x, "-1")),
        Operation::Logistic => {
            // e^x / (1 + e^x)^2
            let ex = ops.add_helper(target, Rhs::unary(Operation::Exp, x));
            let denom = ops.add_helper(target, Rhs::binary(Operation::Add, "1", ex.as_str()));
            let squared = ops.add_helper(target, Rhs::binary(Operation::Power, denom.as_str(), "2"));
            let recip = ops.add_helper(target, Rhs::binary(Operation::Power, squared.as_str(), "-1"));
            ops.define(target, Rhs::binary(Operation::Multiply, ex, recip));
        }
        Operation::Power => {
            let base = x;
            let exponent = operands.second_or_first();
            match slot {
                Slot::First => {
                    // e * b^(e - 1)
                    let lowered = ops.add_helper(target, Rhs::binary(Operation::Add, exponent, "-1"));
                    let pow = ops.add_helper(target, Rhs::binary(Operation::Power, base, lowered));
                    ops.define(target, Rhs::binary(Operation::Multiply, exponent, pow));
                }
                Slot::Second => {
                    // b^e * ln(b)
                    let pow = ops.add_helper(target, Rhs::binary(Operation::Power, base, exponent));
                    let log = ops.add_helper(target, Rhs::unary(Operation::NaturalLog, base));
                    ops.define(target, Rhs::binary(Operation::Multiply, pow, log));
                }
            }
        }
    }
}
