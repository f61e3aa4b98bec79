mod harness;
use harness::{run_main, run_main_lines};

#[test]
fn print_writes_the_line() {
    let output = run_main(r#"void main() { print("hi"); }"#);
    assert_eq!(output, "hi\n");
}

#[test]
fn print_handles_escapes() {
    let output = run_main(r#"void main() { print("a\tb"); }"#);
    assert_eq!(output, "a\tb\n");
}

#[test]
fn string_is_a_vec_of_chars() {
    let src = r#"
void main() {
    string s = "hello";
    write_int(s.size);
    write_int(s.get(1));
}
"#;
    assert_eq!(run_main_lines(src), vec!["5", "101"]);
}

#[test]
fn strings_grow_like_vectors() {
    let src = r#"
void main() {
    string s = "hi";
    s.push('!');
    print(s);
}
"#;
    assert_eq!(run_main(src), "hi!\n");
}

#[test]
fn pushing_does_not_affect_other_literals() {
    // identical literals share a data segment but each evaluation
    // builds a fresh vector
    let src = r#"
void main() {
    string a = "xy";
    string b = "xy";
    a.push('z');
    write_int(a.size);
    write_int(b.size);
}
"#;
    assert_eq!(run_main_lines(src), vec!["3", "2"]);
}

#[test]
fn empty_string_literal() {
    let src = r#"
void main() {
    string s = "";
    write_int(s.size);
}
"#;
    assert_eq!(run_main_lines(src), vec!["0"]);
}

#[test]
fn strings_pass_through_functions() {
    let src = r#"
int measure(string s) { return s.size; }
void main() { write_int(measure("abcd")); }
"#;
    assert_eq!(run_main_lines(src), vec!["4"]);
}

#[test]
fn vec_of_int_push_pop() {
    let src = r#"
void main() {
    vec<int> v = vec<int>();
    v.push(10);
    v.push(20);
    v.push(30);
    write_int(v.size);
    write_int(v.pop());
    write_int(v.size);
    write_int(v.get(0));
}
"#;
    assert_eq!(run_main_lines(src), vec!["3", "30", "2", "10"]);
}

#[test]
fn vec_grows_past_initial_capacity() {
    let src = r#"
void main() {
    vec<int> v = vec<int>();
    for (int i = 0; i < 100; i += 1) {
        v.push(i);
    }
    write_int(v.size);
    write_int(v.get(99));
}
"#;
    assert_eq!(run_main_lines(src), vec!["100", "99"]);
}
