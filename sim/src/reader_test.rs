use crate::heap::Heap;
use crate::printer::print;
use crate::reader::{ReadError, build, read};

fn reprint(source: &str) -> String {
    let mut heap = Heap::new();
    let datum = read(source).expect("readable");
    let r = build(&mut heap, &datum);
    print(&heap, r, true)
}

#[test]
fn test_read_print_forms() {
    assert_eq!(reprint("(a . b)"), "(a . b)");
    assert_eq!(reprint("(1 2.5 \"s\")"), "(1 2.5 \"s\")");
    assert_eq!(reprint("'x"), "(quote x)");
    assert_eq!(reprint("[1 [2] ()]"), "[1 [2] nil]");
    assert_eq!(reprint("(a b . c)"), "(a b . c)");
    assert_eq!(reprint("(a . (b c))"), "(a b c)");
    assert_eq!(reprint("  ;; comment\n  foo"), "foo");
    assert_eq!(reprint("\"a\\\"b\\\\c\""), "\"a\\\"b\\\\c\"");
}

#[test]
fn test_read_numbers() {
    assert_eq!(reprint("1."), "1");
    assert_eq!(reprint("-12"), "-12");
    assert_eq!(reprint("+7"), "7");
    assert_eq!(reprint("-0.5"), "-0.5");
    assert_eq!(reprint("3.0"), "3.0");
    assert_eq!(reprint("1e3"), "1000.0");
    assert_eq!(reprint("340282366920938463463374607431768211455"), u128::MAX.to_string());
    assert_eq!(reprint("-"), "-");
    assert_eq!(reprint("1+"), "1+");
    assert_eq!(reprint("foo\\ bar"), "foo bar");
}

#[test]
fn test_read_errors() {
    assert_eq!(read(")"), Err(ReadError::InvalidSyntax(")".into())));
    assert_eq!(read("(1 ]"), Err(ReadError::InvalidSyntax("]".into())));
    assert_eq!(read("( . a)"), Err(ReadError::InvalidSyntax(".".into())));
    assert_eq!(read("(a . b c)"), Err(ReadError::InvalidSyntax("c".into())));
    assert_eq!(read("("), Err(ReadError::EndOfFile));
    assert_eq!(read(""), Err(ReadError::EndOfFile));
    assert_eq!(read("\"open"), Err(ReadError::EndOfFile));
    assert!(matches!(
        read("340282366920938463463374607431768211456"),
        Err(ReadError::Overflow(_))
    ));
}
