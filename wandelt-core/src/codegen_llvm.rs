//! Lowering of the syntax tree to IR, printed as LLVM textual IR.
//!
//! All statements go into a single `i32 @main()`. Values are 32-bit
//! integers; comparisons are evaluated in `double` and widened back to
//! `i32`.

use std::fs;
use std::path::Path;

use tracing::{debug, trace};

use crate::ast::{Ast, BinaryOp, IdentifierKind, NodeId, NodeKind, UnaryOp};
use crate::builtins::{self, BuiltinDescriptor};
use crate::compiler::CompilerOptions;
use crate::error::CoreError;
use crate::ir::{
    BinOp, BlockId, ExternalFunction, FloatPredicate, IntPredicate, IrBuilder, IrType, Module, Value,
};

/// Name of the entry function.
pub const ENTRY_FUNCTION: &str = "main";

/// Global holding the builtin print format string.
pub const FORMAT_GLOBAL: &str = ".fmt";

/// Prefix of the globals backing variable references.
pub const VARIABLE_PREFIX: &str = "var.";

/// Lower a parsed program into an IR module.
///
/// The tree must come from a parse without diagnostics. Node shapes the
/// parser never produces (a scope used as a value, for example) panic.
pub fn generate_ir(ast: &Ast, statements: &[NodeId], options: &CompilerOptions) -> Module {
    let mut codegen = Codegen::new(ast, options);
    codegen.lower_program(statements);
    codegen.builder.finish()
}

/// Write the textual form of `module` to `path`.
pub fn write_ir(module: &Module, path: impl AsRef<Path>) -> Result<(), CoreError> {
    let path = path.as_ref();
    fs::write(path, module.to_string()).map_err(|source| CoreError::WriteIr {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "wrote IR");
    Ok(())
}

struct Codegen<'a> {
    ast: &'a Ast,
    builder: IrBuilder,
    print: PrintTarget,
}

/// Resolved pieces needed to emit a call to the print builtin.
struct PrintTarget {
    external: ExternalFunction,
    format: Option<Value>,
}

impl PrintTarget {
    fn declare(builder: &mut IrBuilder, builtin: &BuiltinDescriptor) -> Self {
        let external = builtin.external();
        builder.declare_external(external.clone());
        let format = builtin
            .format
            .map(|text| builder.add_string_constant(FORMAT_GLOBAL, text));
        Self { external, format }
    }
}

impl<'a> Codegen<'a> {
    fn new(ast: &'a Ast, options: &CompilerOptions) -> Self {
        let mut builder = IrBuilder::new(&options.module_name, &options.file_name);
        let print = PrintTarget::declare(&mut builder, builtins::print());
        builder.start_function(ENTRY_FUNCTION, IrType::I32);
        Self {
            ast,
            builder,
            print,
        }
    }

    fn lower_program(&mut self, statements: &[NodeId]) {
        self.lower_statements(statements);
        if !self.builder.is_terminated() {
            trace!("appending implicit return 0");
            self.builder.build_ret(Some(Value::Int(0)));
        }
    }

    /// Lower statements in order, stopping at the first one that leaves the
    /// current block terminated.
    fn lower_statements(&mut self, statements: &[NodeId]) {
        for (index, &statement) in statements.iter().enumerate() {
            if self.builder.is_terminated() {
                trace!(skipped = statements.len() - index, "unreachable statements");
                break;
            }
            self.lower(statement);
        }
    }

    /// Lower one node. Expressions yield their value, statements `None`.
    fn lower(&mut self, id: NodeId) -> Option<Value> {
        let ast = self.ast;
        match ast.kind(id) {
            NodeKind::NumberLiteral(value) => Some(Value::Int(*value)),
            NodeKind::BinaryExpression { left, right, op } => {
                let lhs = self.value(*left);
                let rhs = self.value(*right);
                Some(self.binary(*op, lhs, rhs))
            }
            NodeKind::UnaryExpression { operand, op } => {
                let operand = self.value(*operand);
                match op {
                    UnaryOp::Negate => match operand.as_const() {
                        Some(value) => Some(Value::Int(value.wrapping_neg())),
                        None => Some(self.builder.build_binary(BinOp::Sub, Value::Int(0), operand)),
                    },
                }
            }
            NodeKind::PowerExpression { base, exponent } => {
                let base = self.value(*base);
                let exponent = self.value(*exponent);
                Some(self.power(base, exponent))
            }
            NodeKind::GroupingExpression(inner) => self.lower(*inner),
            NodeKind::Scope(statements) => {
                self.lower_statements(statements);
                None
            }
            NodeKind::IfStatement {
                condition,
                then_scope,
                else_scope,
            } => {
                self.if_statement(*condition, *then_scope, *else_scope);
                None
            }
            NodeKind::ReturnStatement(expression) => {
                let value = match expression {
                    Some(expression) => self.value(*expression),
                    None => Value::Int(0),
                };
                self.builder.build_ret(Some(value));
                None
            }
            NodeKind::Declaration { identifier, kind } => match kind {
                IdentifierKind::Variable => Some(self.variable(identifier)),
                IdentifierKind::Function => {
                    panic!("function '{identifier}' used as a value")
                }
            },
            NodeKind::CallExpression { arguments, .. } => {
                let mut args = Vec::with_capacity(arguments.len() + 1);
                args.extend(self.print.format.clone());
                for &argument in arguments {
                    args.push(self.value(argument));
                }
                Some(self.builder.build_call(&self.print.external, args))
            }
        }
    }

    fn value(&mut self, id: NodeId) -> Value {
        match self.lower(id) {
            Some(value) => value,
            None => panic!(
                "{:?} at {} does not produce a value",
                self.ast.kind(id),
                self.ast[id].location
            ),
        }
    }

    /// Both operands constant folds to a constant, except for divisions
    /// whose result is undefined.
    fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Value {
        if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
            if let Some(folded) = fold_binary(op, a, b) {
                return Value::Int(folded);
            }
        }
        if op.is_comparison() {
            return self.comparison(op, lhs, rhs);
        }
        let arithmetic = match op {
            BinaryOp::Add => BinOp::Add,
            BinaryOp::Sub => BinOp::Sub,
            BinaryOp::Mul => BinOp::Mul,
            BinaryOp::Div => BinOp::SDiv,
            BinaryOp::Rem => BinOp::SRem,
            comparison => panic!("'{comparison}' is not arithmetic"),
        };
        self.builder.build_binary(arithmetic, lhs, rhs)
    }

    fn comparison(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Value {
        let pred = match op {
            BinaryOp::Equal => FloatPredicate::Oeq,
            BinaryOp::NotEqual => FloatPredicate::One,
            BinaryOp::Less => FloatPredicate::Olt,
            BinaryOp::LessEqual => FloatPredicate::Ole,
            BinaryOp::Greater => FloatPredicate::Ogt,
            BinaryOp::GreaterEqual => FloatPredicate::Oge,
            arithmetic => panic!("'{arithmetic}' is not a comparison"),
        };
        let lhs = self.builder.build_sitofp(lhs);
        let rhs = self.builder.build_sitofp(rhs);
        let flag = self.builder.build_fcmp(pred, lhs, rhs);
        self.builder.build_zext(flag, IrType::I32)
    }

    /// Constant operands are folded. Otherwise the current block becomes the
    /// pre-header of a counting loop:
    ///
    /// ```text
    /// pow.loop:
    ///   r      = phi [1, pre], [r_next, pow.loop]
    ///   c      = phi [0, pre], [c_next, pow.loop]
    ///   r_next = mul r, base
    ///   c_next = add c, 1
    ///   br (c_next <= exponent), pow.loop, pow.exit
    /// pow.exit:
    ///   result = phi [r, pow.loop]
    /// ```
    fn power(&mut self, base: Value, exponent: Value) -> Value {
        if let (Some(base), Some(exponent)) = (base.as_const(), exponent.as_const()) {
            return Value::Int(fold_power(base, exponent));
        }

        let preheader = self.builder.current_block();
        let body = self.builder.append_block("pow.loop");
        let exit = self.builder.append_block("pow.exit");
        self.builder.build_br(body);

        self.builder.position_at_end(body);
        let result = self
            .builder
            .build_phi(IrType::I32, vec![(Value::Int(1), preheader)]);
        let counter = self
            .builder
            .build_phi(IrType::I32, vec![(Value::Int(0), preheader)]);
        let next_result = self
            .builder
            .build_binary(BinOp::Mul, result.clone(), base);
        let next_counter = self
            .builder
            .build_binary(BinOp::Add, counter.clone(), Value::Int(1));
        let again = self
            .builder
            .build_icmp(IntPredicate::Sle, next_counter.clone(), exponent);
        self.builder.build_cond_br(again, body, exit);
        self.builder.add_incoming(&result, next_result, body);
        self.builder.add_incoming(&counter, next_counter, body);

        self.builder.position_at_end(exit);
        self.builder.build_phi(IrType::I32, vec![(result, body)])
    }

    fn if_statement(&mut self, condition: NodeId, then_scope: NodeId, else_scope: Option<NodeId>) {
        let condition = self.value(condition);
        let flag = self
            .builder
            .build_icmp(IntPredicate::Ne, condition, Value::Int(0));

        let then_block = self.builder.append_block("if.then");
        let else_block = else_scope.map(|_| self.builder.append_block("if.else"));
        let end_block = self.builder.append_block("if.end");
        self.builder
            .build_cond_br(flag, then_block, else_block.unwrap_or(end_block));

        self.branch(then_block, then_scope, end_block);
        if let (Some(block), Some(scope)) = (else_block, else_scope) {
            self.branch(block, scope, end_block);
        }

        self.builder.position_at_end(end_block);
    }

    fn branch(&mut self, block: BlockId, scope: NodeId, end_block: BlockId) {
        self.builder.position_at_end(block);
        self.lower(scope);
        if !self.builder.is_terminated() {
            self.builder.build_br(end_block);
        }
    }

    /// Variables have no binding form; each one reads a zero-initialised
    /// module global.
    fn variable(&mut self, identifier: &str) -> Value {
        let name = format!(
            "{VARIABLE_PREFIX}{}",
            identifier.strip_prefix('$').unwrap_or(identifier)
        );
        let global = self.builder.get_or_add_i32_global(&name, 0);
        self.builder.build_load(IrType::I32, global)
    }
}

/// `base ** exponent` with wrapping 32-bit multiplication. A non-positive
/// exponent yields 1.
pub fn fold_power(base: i32, exponent: i32) -> i32 {
    if exponent <= 0 {
        return 1;
    }
    base.wrapping_pow(exponent as u32)
}

/// Evaluate `lhs op rhs` on constants the way the emitted instructions
/// would. Comparisons yield 0 or 1. `None` for a division by zero or
/// `i32::MIN / -1`.
fn fold_binary(op: BinaryOp, lhs: i32, rhs: i32) -> Option<i32> {
    let value = match op {
        BinaryOp::Add => lhs.wrapping_add(rhs),
        BinaryOp::Sub => lhs.wrapping_sub(rhs),
        BinaryOp::Mul => lhs.wrapping_mul(rhs),
        BinaryOp::Div => lhs.checked_div(rhs)?,
        BinaryOp::Rem => lhs.checked_rem(rhs)?,
        BinaryOp::Equal => (lhs == rhs) as i32,
        BinaryOp::NotEqual => (lhs != rhs) as i32,
        BinaryOp::Less => (lhs < rhs) as i32,
        BinaryOp::LessEqual => (lhs <= rhs) as i32,
        BinaryOp::Greater => (lhs > rhs) as i32,
        BinaryOp::GreaterEqual => (lhs >= rhs) as i32,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;

    fn generate(source: &str) -> Module {
        let lexed = lex("test.wdt", source);
        assert!(lexed.is_valid(), "{:?}", lexed.diagnostics);
        let parsed = parse(&lexed.tokens);
        assert!(parsed.is_valid(), "{:?}", parsed.diagnostics);
        let options = CompilerOptions {
            file_name: "test.wdt".to_string(),
            ..CompilerOptions::default()
        };
        generate_ir(&parsed.ast, &parsed.statements, &options)
    }

    fn main_ir(source: &str) -> String {
        let module = generate(source);
        module
            .function(ENTRY_FUNCTION)
            .expect("main function")
            .to_string()
    }

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn folds_constant_power() {
        let ir = main_ir("return 2 ** 10;");
        assert!(ir.contains("ret i32 1024"), "{ir}");
        assert!(!ir.contains("pow.loop"), "{ir}");
        assert!(!ir.contains("phi"), "{ir}");
    }

    #[test]
    fn folds_right_associative_power_chain() {
        let ir = main_ir("return 2 ** 3 ** 2;");
        assert!(ir.contains("ret i32 512"), "{ir}");
    }

    #[test]
    fn folds_power_of_constant_expressions() {
        for (source, expected) in [
            ("return -2 ** 3;", "ret i32 -8"),
            ("return (2 + 3) ** 2;", "ret i32 25"),
            ("return 2 ** -1;", "ret i32 1"),
            ("return (1 < 2) ** 5;", "ret i32 1"),
        ] {
            let ir = main_ir(source);
            assert!(ir.contains(expected), "{source}: {ir}");
            assert!(!ir.contains("pow.loop"), "{source}: {ir}");
        }
    }

    #[test]
    fn constant_operands_are_folded() {
        assert_eq!(fold_binary(BinaryOp::Add, i32::MAX, 1), Some(i32::MIN));
        assert_eq!(fold_binary(BinaryOp::Rem, -7, 2), Some(-1));
        assert_eq!(fold_binary(BinaryOp::GreaterEqual, 3, 3), Some(1));
        assert_eq!(fold_binary(BinaryOp::NotEqual, 3, 3), Some(0));
        assert_eq!(fold_binary(BinaryOp::Div, 1, 0), None);
        assert_eq!(fold_binary(BinaryOp::Rem, i32::MIN, -1), None);

        let ir = main_ir("return (7 / 2) + (7 % 2) - -3 * 4 == 16;");
        assert!(ir.contains("ret i32 1"), "{ir}");
        assert!(!ir.contains("%t"), "{ir}");
    }

    #[test]
    fn division_by_constant_zero_is_left_to_the_instruction() {
        let ir = main_ir("return 1 / 0;");
        assert!(ir.contains("sdiv i32 1, 0"), "{ir}");
    }

    #[test]
    fn fold_power_edge_cases() {
        assert_eq!(fold_power(7, 0), 1);
        assert_eq!(fold_power(7, -3), 1);
        assert_eq!(fold_power(-2, 3), -8);
        assert_eq!(fold_power(2, 31), i32::MIN);
        assert_eq!(fold_power(2, 32), 0);
    }

    #[test]
    fn non_constant_power_lowers_to_counting_loop() {
        let module = generate("return $x ** 3;");
        let main = module.function(ENTRY_FUNCTION).expect("main");

        let body = main.find_block("pow.loop").expect("loop block");
        let phis = body
            .instructions
            .iter()
            .filter(|instruction| matches!(instruction.kind, crate::ir::InstrKind::Phi { .. }))
            .count();
        assert_eq!(phis, 2);
        assert!(main.find_block("pow.exit").is_some());

        let ir = main.to_string();
        assert!(ir.contains("icmp sle i32"), "{ir}");
        assert!(ir.contains("br label %pow.loop"), "{ir}");
        assert!(ir.contains("phi i32 [ 1, %entry ], [ %t"), "{ir}");
        assert!(ir.contains("phi i32 [ 0, %entry ], [ %t"), "{ir}");
        assert!(ir.contains("load i32, ptr @var.x"), "{ir}");
    }

    #[test]
    fn every_block_is_terminated_once() {
        let module = generate(
            "if $a { if $b ** 2 > 3 { return 1; } } else if 2 { print(1); } else { return 2; }",
        );
        let main = module.function(ENTRY_FUNCTION).expect("main");
        for block in &main.blocks {
            assert!(block.is_terminated(), "block {} has no terminator", block.label);
            for successor in block.terminator.iter().flat_map(|t| t.successors()) {
                assert!(successor.index() < main.blocks.len());
            }
        }
    }

    #[test]
    fn comparison_goes_through_double() {
        let ir = main_ir("return 1 < $y;");
        assert!(ir.contains("sitofp i32 1 to double"), "{ir}");
        assert!(ir.contains("fcmp olt double"), "{ir}");
        assert!(ir.contains("zext i1"), "{ir}");
        assert!(ir.contains("to i32"), "{ir}");
    }

    #[test]
    fn arithmetic_maps_to_integer_instructions() {
        let ir = main_ir("return ($a / 2) + ($a % 2) - -$b * 4;");
        for opcode in ["sdiv i32 %t", "srem i32 %t", "sub i32 0, %t", "mul i32 %t", "add i32 %t"] {
            assert!(ir.contains(opcode), "missing {opcode} in {ir}");
        }
    }

    #[test]
    fn if_without_else_branches_to_end() {
        let ir = main_ir("if 1 { print(2); }\nreturn 3;");
        assert!(ir.contains("icmp ne i32 1, 0"), "{ir}");
        assert!(ir.contains("label %if.then, label %if.end"), "{ir}");
        assert!(!ir.contains("if.else"), "{ir}");
        assert_eq!(count(&ir, "br label %if.end"), 1, "{ir}");
        assert!(ir.contains("ret i32 3"), "{ir}");
    }

    #[test]
    fn if_else_with_returning_branches() {
        let ir = main_ir("if 0 { return 1; } else { return 2; }");
        assert!(ir.contains("label %if.then, label %if.else"), "{ir}");
        assert!(!ir.contains("br label %if.end"), "{ir}");
        assert!(ir.contains("ret i32 1"), "{ir}");
        assert!(ir.contains("ret i32 2"), "{ir}");
        // The join block is unreachable but still closed off.
        assert!(ir.contains("if.end:\n  ret i32 0"), "{ir}");
    }

    #[test]
    fn implicit_return_zero() {
        assert!(main_ir("").contains("entry:\n  ret i32 0"));
        let ir = main_ir("print(5);");
        assert!(ir.trim_end().ends_with("ret i32 0\n}"), "{ir}");
    }

    #[test]
    fn statements_after_return_are_not_lowered() {
        let ir = main_ir("return 1;\nprint(2);\nreturn 3;");
        assert!(ir.contains("ret i32 1"), "{ir}");
        assert!(!ir.contains("call"), "{ir}");
        assert!(!ir.contains("ret i32 3"), "{ir}");
    }

    #[test]
    fn call_prints_through_printf() {
        let module = generate("print(1, 2 + 3);");
        let ir = module.to_string();
        assert!(ir.contains("declare i32 @printf(ptr, ...)"), "{ir}");
        assert!(
            ir.contains("@.fmt = private unnamed_addr constant [4 x i8] c\"%d\\0A\\00\""),
            "{ir}"
        );
        assert!(
            ir.contains("call i32 (ptr, ...) @printf(ptr @.fmt, i32 1, i32 5)"),
            "{ir}"
        );
    }

    #[test]
    fn variables_share_one_global() {
        let module = generate("return $x + $x;");
        assert_eq!(module.globals.len(), 2);
        let ir = module.to_string();
        assert!(ir.contains("@var.x = global i32 0"), "{ir}");
        assert_eq!(count(&ir, "load i32, ptr @var.x"), 2, "{ir}");
    }

    #[test]
    fn only_one_sigil_is_stripped_from_variables() {
        let ir = generate("return $x + $$x;").to_string();
        assert!(ir.contains("@var.x = global i32 0"), "{ir}");
        assert!(ir.contains("@var.$x = global i32 0"), "{ir}");
    }

    #[test]
    fn module_header_names_source_file() {
        let ir = generate("return 0;").to_string();
        assert!(ir.starts_with("; ModuleID = 'wandelt'\nsource_filename = \"test.wdt\"\n"), "{ir}");
    }

    #[test]
    fn writes_ir_to_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.ll");
        let module = generate("return 4;");
        write_ir(&module, &path).expect("write ir");
        let written = std::fs::read_to_string(&path).expect("read ir");
        assert_eq!(written, module.to_string());
    }

    #[test]
    fn write_failure_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("out.ll");
        let err = write_ir(&generate("return 4;"), &path).unwrap_err();
        assert!(matches!(err, CoreError::WriteIr { .. }));
        assert!(err.to_string().contains("out.ll"));
    }
}
