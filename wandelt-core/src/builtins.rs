//! Built-in functions visible at the Wandelt language level.
//!
//! This module only describes builtins; the code generator is responsible
//! for mapping these descriptors to external declarations and calls.

use crate::ir::{ExternalFunction, IrType};

/// Metadata about a single builtin symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinDescriptor {
    /// Name of the builtin at the Wandelt level (e.g., `print`).
    pub name: &'static str,

    /// External symbol the call is lowered to.
    pub symbol: &'static str,

    /// Fixed leading parameters of the external symbol.
    pub params: &'static [IrType],

    pub ret: IrType,

    pub variadic: bool,

    /// Format string passed as the first argument, if any.
    pub format: Option<&'static str>,
}

impl BuiltinDescriptor {
    /// The external declaration this builtin needs in the module.
    pub fn external(&self) -> ExternalFunction {
        ExternalFunction {
            name: self.symbol.to_string(),
            params: self.params.to_vec(),
            ret: self.ret,
            variadic: self.variadic,
        }
    }
}

/// The complete list of builtins known to the core.
pub const BUILTINS: &[BuiltinDescriptor] = &[BuiltinDescriptor {
    name: "print",
    symbol: "printf",
    params: &[IrType::Ptr],
    ret: IrType::I32,
    variadic: true,
    format: Some("%d\n"),
}];

/// The builtin every call expression currently lowers to.
pub fn print() -> &'static BuiltinDescriptor {
    &BUILTINS[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_is_the_only_builtin() {
        assert_eq!(BUILTINS.len(), 1);
        assert_eq!(print().name, "print");
        assert_eq!(print().format, Some("%d\n"));
    }

    #[test]
    fn print_declares_variadic_printf() {
        let external = print().external();
        assert_eq!(external.name, "printf");
        assert_eq!(external.params, vec![IrType::Ptr]);
        assert!(external.variadic);
        assert_eq!(external.to_string(), "declare i32 @printf(ptr, ...)");
    }
}
