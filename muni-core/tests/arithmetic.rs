mod harness;
use harness::{compile_err_with, run_main_lines};
use muni_core::diagnostic::codes;

#[test]
fn writes_a_constant() {
    let lines = run_main_lines("void main() { write_int(42); }");
    assert_eq!(lines, vec!["42"]);
}

#[test]
fn sums_one_to_ten_with_for() {
    let src = r#"
void main() {
    int s = 0;
    for (int i = 1; i <= 10; i += 1) {
        s += i;
    }
    write_int(s);
}
"#;
    assert_eq!(run_main_lines(src), vec!["55"]);
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let src = "void main() { write_int(1 + 2 * 3); write_int((1 + 2) * 3); }";
    assert_eq!(run_main_lines(src), vec!["7", "9"]);
}

#[test]
fn division_and_remainder_are_signed() {
    let src = r#"
void main() {
    write_int(7 / 2);
    write_int(7 % 2);
    write_int(-7 / 2);
    write_int(-7 % 2);
}
"#;
    assert_eq!(run_main_lines(src), vec!["3", "1", "-3", "-1"]);
}

#[test]
fn unary_minus_and_not() {
    let src = r#"
void main() {
    int x = 5;
    write_int(-x);
    if (!(x == 4)) { write_int(1); } else { write_int(0); }
}
"#;
    assert_eq!(run_main_lines(src), vec!["-5", "1"]);
}

#[test]
fn comparisons_chain_through_logic() {
    let src = r#"
void main() {
    int a = 3;
    int b = 9;
    if (a < b && b >= 9) { write_int(1); }
    if (a != 3 || b == 9) { write_int(2); }
}
"#;
    assert_eq!(run_main_lines(src), vec!["1", "2"]);
}

#[test]
fn logic_short_circuits() {
    // the right-hand sides would trap with a division by zero if the
    // operators evaluated them eagerly
    let src = r#"
void main() {
    int zero = 0;
    boolean no = false;
    boolean yes = true;
    if (no && 1 / zero == 0) { write_int(1); } else { write_int(2); }
    if (yes || 1 / zero == 0) { write_int(3); } else { write_int(4); }
}
"#;
    assert_eq!(run_main_lines(src), vec!["2", "3"]);
}

#[test]
fn char_literals_are_ints() {
    let src = "void main() { write_int('A'); write_int('\\n'); }";
    assert_eq!(run_main_lines(src), vec!["65", "10"]);
}

#[test]
fn casts_adjust_the_static_type_only() {
    let src = r#"
void main() {
    char c = 'a';
    int i = (int) c;
    write_int(i);
    boolean b = (boolean) 1;
    if (b) { write_int(1); }
}
"#;
    assert_eq!(run_main_lines(src), vec!["97", "1"]);
}

#[test]
fn arithmetic_on_booleans_is_rejected() {
    compile_err_with(
        "void main() { int x = true + 1; }",
        codes::TYPE,
        "arithmetic",
    );
}

#[test]
fn condition_must_be_boolean() {
    compile_err_with("void main() { if (1) { } }", codes::TYPE, "boolean");
}
