mod harness;
use harness::{compile_err_with, run_main_lines, run_main_trap};
use muni_core::diagnostic::codes;

#[test]
fn construct_set_get_and_length() {
    let src = r#"
void main() {
    array<int> x = array<int>(3);
    x.set(0, 1);
    x.set(1, 2);
    x.set(2, 3);
    write_int(x.get(0));
    write_int(x.get(1));
    write_int(x.get(2));
    write_int(x.length);
}
"#;
    assert_eq!(run_main_lines(src), vec!["1", "2", "3", "3"]);
}

#[test]
fn fresh_arrays_are_zeroed() {
    let src = r#"
void main() {
    array<int> x = array<int>(2);
    write_int(x.get(0) + x.get(1));
}
"#;
    assert_eq!(run_main_lines(src), vec!["0"]);
}

#[test]
fn literal_and_index_sugar() {
    let src = r#"
void main() {
    array<int> a = [10, 20, 30];
    write_int(a[1]);
    write_int(a.length);
    a[0] = 5;
    a[2] += 7;
    write_int(a[0]);
    write_int(a[2]);
}
"#;
    assert_eq!(run_main_lines(src), vec!["20", "3", "5", "37"]);
}

#[test]
fn literal_with_computed_elements() {
    let src = r#"
int twice(int n) { return n * 2; }
void main() {
    array<int> a = [twice(1), twice(2), 9];
    write_int(a[0]);
    write_int(a[1]);
    write_int(a[2]);
}
"#;
    assert_eq!(run_main_lines(src), vec!["2", "4", "9"]);
}

#[test]
fn identical_literals_are_distinct_values() {
    let src = r#"
void main() {
    array<int> a = [1, 2];
    array<int> b = [1, 2];
    a[0] = 100;
    write_int(a[0]);
    write_int(b[0]);
}
"#;
    assert_eq!(run_main_lines(src), vec!["100", "1"]);
}

#[test]
fn arrays_of_structures_hold_references() {
    let src = r#"
structure Cell {
    int value;
    Cell(int value) { this.value = value; }
}
void main() {
    array<Cell> cells = array<Cell>(2);
    cells.set(0, Cell(4));
    cells[1] = Cell(8);
    write_int(cells.get(0).value);
    write_int(cells[1].value);
}
"#;
    assert_eq!(run_main_lines(src), vec!["4", "8"]);
}

#[test]
fn nested_arrays() {
    let src = r#"
void main() {
    array<array<int>> grid = array<array<int>>(2);
    grid.set(0, [1, 2]);
    grid.set(1, [3, 4]);
    write_int(grid[1][0]);
}
"#;
    assert_eq!(run_main_lines(src), vec!["3"]);
}

#[test]
fn get_out_of_bounds_traps() {
    let src = r#"
void main() {
    array<int> x = array<int>(2);
    write_int(x.get(2));
}
"#;
    run_main_trap(src);
}

#[test]
fn set_out_of_bounds_traps() {
    let src = r#"
void main() {
    array<int> x = array<int>(2);
    x.set(2, 99);
}
"#;
    run_main_trap(src);
}

#[test]
fn negative_index_traps() {
    let src = r#"
void main() {
    array<int> x = array<int>(2);
    write_int(x[-1]);
}
"#;
    run_main_trap(src);
}

#[test]
fn negative_length_traps() {
    let src = r#"
void main() {
    array<int> x = array<int>(0 - 1);
}
"#;
    run_main_trap(src);
}

#[test]
fn mixed_literal_elements_are_rejected() {
    compile_err_with(
        "void main() { array<int> x = [1, true, 3]; }",
        codes::TYPE,
        "array elements must all be",
    );
}

#[test]
fn empty_literal_is_rejected() {
    compile_err_with(
        "void main() { array<int> x = []; }",
        codes::TYPE,
        "at least one element",
    );
}

#[test]
fn wrong_element_type_in_set_is_rejected() {
    compile_err_with(
        "void main() { array<int> x = array<int>(1); x.set(0, true); }",
        codes::TYPE,
        "expected `int`",
    );
}

#[test]
fn wrong_index_type_is_rejected() {
    compile_err_with(
        "void main() { array<int> x = array<int>(1); write_int(x.get(true)); }",
        codes::TYPE,
        "expected `int`",
    );
}

#[test]
fn array_type_arg_arity_is_checked() {
    compile_err_with(
        "void main() { array<int, int> x = array<int, int>(3); }",
        codes::PARSE,
        "expected",
    );
}
