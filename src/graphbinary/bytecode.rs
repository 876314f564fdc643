//! Traversal bytecode.
//!
//! Bytecode is the append-only instruction program a fluent traversal
//! builds. Source instructions configure the traversal source
//! (`withStrategies`, `withSideEffect`, ...); step instructions form the
//! traversal itself (`V`, `has`, `out`, ...).

use std::fmt;


use super::value::Value;

/// Single bytecode instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Step or source name
    pub operator: String,
    /// Arguments, each serialized fully qualified
    pub arguments: Vec<Value>,
}

impl Instruction {
    /// Create a new instruction.
    pub fn new(operator: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            operator: operator.into(),
            arguments,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.operator)?;
        for (i, arg) in self.arguments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

/// Bytecode program.
///
/// Wire layout: `{steps}{sources}`, each written as an `i32` count followed by
/// `{name}{argument count}{arguments...}` per instruction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    /// Source instructions
    pub sources: Vec<Instruction>,
    /// Step instructions
    pub steps: Vec<Instruction>,
}

impl Bytecode {
    /// Create an empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source instruction.
    pub fn add_source(&mut self, operator: impl Into<String>, arguments: Vec<Value>) {
        self.sources.push(Instruction::new(operator, arguments));
    }

    /// Append a step instruction.
    pub fn add_step(&mut self, operator: impl Into<String>, arguments: Vec<Value>) {
        self.steps.push(Instruction::new(operator, arguments));
    }

    /// Builder form of [`Bytecode::add_step`].
    pub fn with_step(mut self, operator: impl Into<String>, arguments: Vec<Value>) -> Self {
        self.add_step(operator, arguments);
        self
    }

    /// Whether there are no instructions at all.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.steps.is_empty()
    }
}

impl fmt::Display for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |items: &[Instruction]| {
            items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(f, "[[{}], [{}]]", join(&self.sources), join(&self.steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_order() {
        let mut bytecode = Bytecode::new();
        assert!(bytecode.is_empty());
        bytecode.add_step("V", vec![]);
        bytecode.add_step("out", vec![Value::from("knows")]);
        bytecode.add_source("withSack", vec![Value::Int(1)]);

        assert_eq!(bytecode.steps.len(), 2);
        assert_eq!(bytecode.steps[1].operator, "out");
        assert_eq!(bytecode.sources[0].arguments, vec![Value::Int(1)]);
        assert!(!bytecode.is_empty());
    }

    #[test]
    fn test_display() {
        let bytecode = Bytecode::new()
            .with_step("V", vec![])
            .with_step("has", vec![Value::from("name"), Value::from("marko")]);
        assert_eq!(bytecode.to_string(), "[[], [V(), has(name, marko)]]");
    }
}
