use calc_demo::grammar::Calc;

fn main() {
    let mut calc = Calc::new();
    calc.parse_text("a = 1 + 8 * 5;", "demo").unwrap();
    assert_eq!(calc.variable("a"), Some(41.0));
    calc.parse_text("b = (1 + 8) * 5;", "demo").unwrap();
    assert_eq!(calc.variable("b"), Some(45.0));
    calc.parse_text("c = a + b;", "demo").unwrap();
    assert_eq!(calc.variable("c"), Some(86.0));
    calc.parse_text("print \"no crashes\";", "demo").unwrap();
    println!("Hello, world! No crashes!!!");
}
