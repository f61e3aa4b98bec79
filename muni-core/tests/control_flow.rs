mod harness;
use harness::{compile_err_with, run_main_lines};
use muni_core::diagnostic::codes;

#[test]
fn if_else_takes_one_branch() {
    let src = r#"
void main() {
    int x = 7;
    if (x > 5) { write_int(1); } else { write_int(2); }
    if (x > 9) { write_int(3); } else if (x > 6) { write_int(4); }
}
"#;
    assert_eq!(run_main_lines(src), vec!["1", "4"]);
}

#[test]
fn while_counts_down() {
    let src = r#"
void main() {
    int n = 3;
    while (n > 0) {
        write_int(n);
        n -= 1;
    }
}
"#;
    assert_eq!(run_main_lines(src), vec!["3", "2", "1"]);
}

#[test]
fn until_is_while_with_inverted_test() {
    let src = r#"
void main() {
    int n = 0;
    until (n == 3) {
        write_int(n);
        n += 1;
    }
}
"#;
    assert_eq!(run_main_lines(src), vec!["0", "1", "2"]);
}

#[test]
fn do_runs_body_before_testing() {
    let src = r#"
void main() {
    int n = 10;
    do {
        write_int(n);
        n += 1;
    } while (n < 3);
}
"#;
    // trailing test: one iteration even though the condition is false
    assert_eq!(run_main_lines(src), vec!["10"]);
}

#[test]
fn do_with_count_repeats() {
    let src = r#"
void main() {
    do 3 {
        write_int(5);
    }
    do 0 {
        write_int(6);
    }
}
"#;
    assert_eq!(run_main_lines(src), vec!["5", "5", "5"]);
}

#[test]
fn bare_do_runs_once() {
    let src = "void main() { do { write_int(9); } }";
    assert_eq!(run_main_lines(src), vec!["9"]);
}

#[test]
fn break_leaves_the_innermost_loop() {
    let src = r#"
void main() {
    for (int i = 0; i < 5; i += 1) {
        if (i == 2) { break; }
        write_int(i);
    }
    write_int(99);
}
"#;
    assert_eq!(run_main_lines(src), vec!["0", "1", "99"]);
}

#[test]
fn continue_in_for_still_runs_the_step() {
    let src = r#"
void main() {
    for (int i = 0; i < 5; i += 1) {
        if (i % 2 == 0) { continue; }
        write_int(i);
    }
}
"#;
    assert_eq!(run_main_lines(src), vec!["1", "3"]);
}

#[test]
fn continue_in_while_retests_the_condition() {
    let src = r#"
void main() {
    int i = 0;
    while (i < 5) {
        i += 1;
        if (i == 3) { continue; }
        write_int(i);
    }
}
"#;
    assert_eq!(run_main_lines(src), vec!["1", "2", "4", "5"]);
}

#[test]
fn loop_else_runs_on_normal_exit() {
    let src = r#"
void main() {
    int i = 0;
    while (i < 2) { i += 1; } else { write_int(1); }
    for (int j = 0; j < 2; j += 1) { } else { write_int(2); }
    until (true) { } else { write_int(3); }
}
"#;
    assert_eq!(run_main_lines(src), vec!["1", "2", "3"]);
}

#[test]
fn loop_else_is_skipped_by_break() {
    let src = r#"
void main() {
    int i = 0;
    while (i < 10) {
        if (i == 1) { break; }
        i += 1;
    } else {
        write_int(7);
    }
    write_int(8);
}
"#;
    assert_eq!(run_main_lines(src), vec!["8"]);
}

#[test]
fn nested_loops_break_independently() {
    let src = r#"
void main() {
    for (int i = 0; i < 3; i += 1) {
        for (int j = 0; j < 3; j += 1) {
            if (j > i) { break; }
            write_int(i * 10 + j);
        }
    }
}
"#;
    assert_eq!(run_main_lines(src), vec!["0", "10", "11", "20", "21", "22"]);
}

#[test]
fn shadowing_in_nested_scopes_is_allowed() {
    let src = r#"
void main() {
    int x = 1;
    {
        int x = 2;
        write_int(x);
    }
    write_int(x);
}
"#;
    assert_eq!(run_main_lines(src), vec!["2", "1"]);
}

#[test]
fn redeclaration_in_same_scope_is_rejected() {
    compile_err_with(
        "void main() { int x = 1; int x = 2; }",
        codes::NAME,
        "redeclaration",
    );
}

#[test]
fn break_outside_loop_is_rejected() {
    compile_err_with("void main() { break; }", codes::TYPE, "break");
}

#[test]
fn continue_outside_loop_is_rejected() {
    compile_err_with("void main() { continue; }", codes::TYPE, "continue");
}
