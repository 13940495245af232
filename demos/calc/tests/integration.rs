use calc_demo::grammar::Calc;

#[test]
fn evaluates_a_short_program() {
    let mut calc = Calc::new();
    calc.parse_text("a = 1 + 8 * 5;", "integration").unwrap();
    calc.parse_text("b = (1 + 8) * 5;", "integration").unwrap();
    calc.parse_text("c = a + b;", "integration").unwrap();
    assert_eq!(calc.variable("a"), Some(41.0));
    assert_eq!(calc.variable("b"), Some(45.0));
    assert_eq!(calc.variable("c"), Some(86.0));
}

#[test]
fn unknown_trailing_input_is_a_syntax_error() {
    let mut calc = Calc::new();
    assert!(calc.parse_text("a = 1 +", "integration").is_err());
}

#[test]
fn print_statement_prints_an_accumulated_string() {
    let mut calc = Calc::new();
    assert!(calc.parse_text("print \"integration\";", "integration").is_ok());
}
