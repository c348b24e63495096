//! Implementation of the `print()` builtin.

use crate::{
    error::RunResult,
    io::PrintWriter,
    value::{null_value, ValueRef},
};

/// Formats each argument, space-separated, and terminates with a newline.
/// Strings print their raw content; everything else uses its display form.
/// Returns Null.
pub fn builtin_print(args: &[ValueRef], print: &mut dyn PrintWriter) -> RunResult<ValueRef> {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            print.write_char(' ');
        }
        print.write_str(&arg.to_string());
    }
    print.write_char('\n');
    Ok(null_value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::CollectStringPrint;
    use crate::value::{int_value, null_value, str_value};

    #[test]
    fn test_print_formats_and_separates() {
        let mut out = CollectStringPrint::new();
        builtin_print(&[int_value(7), str_value("x"), null_value()], &mut out).unwrap();
        assert_eq!(out.output(), "7 x null\n");
    }

    #[test]
    fn test_print_empty_is_blank_line() {
        let mut out = CollectStringPrint::new();
        builtin_print(&[], &mut out).unwrap();
        assert_eq!(out.output(), "\n");
    }
}
