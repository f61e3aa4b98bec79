mod harness;
use harness::{compile_err_with, run_main_lines};
use muni_core::diagnostic::codes;

const BOX: &str = r#"
structure Box<T> {
    T value;

    Box<T>(T v) { this.value = v; }

    T get() { return this.value; }
    void set(T v) { this.value = v; }

    static Box<T> make(T v) {
        Box<T> b = Box<T>(v);
        return b;
    }
}
"#;

#[test]
fn box_of_int_constructs_gets_and_sets() {
    let src = BOX.to_string()
        + r#"
void main() {
    Box<int> bi = Box<int>(10);
    write_int(bi.get());
    bi.set(42);
    write_int(bi.get());

    Box<int> bj = Box<int>.make(7);
    write_int(bj.get());
}
"#;
    assert_eq!(run_main_lines(&src), vec!["10", "42", "7"]);
}

#[test]
fn distinct_instantiations_coexist() {
    let src = BOX.to_string()
        + r#"
void main() {
    Box<int> bi = Box<int>(3);
    Box<boolean> bb = Box<boolean>(true);
    write_int(bi.get());
    if (bb.get()) { write_int(1); } else { write_int(0); }
    bb.set(false);
    if (bb.get()) { write_int(1); } else { write_int(0); }
}
"#;
    assert_eq!(run_main_lines(&src), vec!["3", "1", "0"]);
}

#[test]
fn nested_generic_instantiation() {
    let src = BOX.to_string()
        + r#"
void main() {
    Box<int> inner = Box<int>(3);
    Box<Box<int>> outer = Box<Box<int>>(inner);
    Box<int> got = outer.get();
    write_int(got.get());

    got.set(9);
    write_int(outer.get().get());
}
"#;
    assert_eq!(run_main_lines(&src), vec!["3", "9"]);
}

#[test]
fn generic_values_pass_through_functions() {
    let src = BOX.to_string()
        + r#"
int read_and_inc(Box<int> b) {
    int v = b.get();
    b.set(v + 1);
    return v;
}
void main() {
    Box<int> b = Box<int>(10);
    write_int(read_and_inc(b));
    write_int(b.get());
}
"#;
    assert_eq!(run_main_lines(&src), vec!["10", "11"]);
}

#[test]
fn array_of_boxes() {
    let src = BOX.to_string()
        + r#"
void main() {
    array<Box<int>> a = array<Box<int>>(2);
    a.set(0, Box<int>(5));
    a.set(1, Box<int>(8));
    write_int(a.get(0).get());
    write_int(a.get(1).get());
}
"#;
    assert_eq!(run_main_lines(&src), vec!["5", "8"]);
}

#[test]
fn self_referential_generic_list() {
    let src = r#"
structure List<T> {
    T element;
    List<T> next;

    List<T>(T element) {
        this.element = element;
        this.next = null;
    }

    void append(T element) {
        if (this.next == null) {
            this.next = List<T>(element);
        } else {
            this.next.append(element);
        }
    }
}
void main() {
    List<int> xs = List<int>(1);
    xs.append(2);
    xs.append(3);
    write_int(xs.next.next.element);
}
"#;
    assert_eq!(run_main_lines(src), vec!["3"]);
}

#[test]
fn generic_pair_with_two_parameters() {
    let src = r#"
structure Pair<A, B> {
    A first;
    B second;

    Pair<A, B>(A first, B second) {
        this.first = first;
        this.second = second;
    }

    Pair<B, A> swap() {
        return Pair<B, A>(this.second, this.first);
    }
}
void main() {
    Pair<int, boolean> p = Pair<int, boolean>(4, true);
    Pair<boolean, int> q = p.swap();
    write_int(q.second);
    if (q.first) { write_int(1); }
}
"#;
    assert_eq!(run_main_lines(src), vec!["4", "1"]);
}

#[test]
fn generic_alias_expands_transparently() {
    let src = BOX.to_string()
        + r#"
alias intbox = Box<int>;
alias rebox<T> = Box<Box<T>>;
void main() {
    intbox b = intbox(5);
    write_int(b.get());
    rebox<int> r = rebox<int>(Box<int>(6));
    write_int(r.get().get());
}
"#;
    assert_eq!(run_main_lines(&src), vec!["5", "6"]);
}

#[test]
fn wrong_type_arg_arity_is_rejected() {
    let src = BOX.to_string() + "void main() { Box<int, int> b = Box<int, int>(1); }";
    compile_err_with(&src, codes::TYPE, "type argument");
}

#[test]
fn missing_type_args_on_generic_ctor_are_rejected() {
    let src = BOX.to_string() + "void main() { Box<int> b = Box(1); }";
    compile_err_with(&src, codes::TYPE, "type argument");
}

#[test]
fn constructor_argument_mismatch_is_rejected() {
    let src = BOX.to_string() + "void main() { Box<int> b = Box<int>(true); }";
    compile_err_with(&src, codes::TYPE, "expected `int`");
}

#[test]
fn instantiations_are_not_interchangeable() {
    let src = BOX.to_string()
        + r#"
int take(Box<int> b) { return b.get(); }
void main() {
    Box<boolean> bb = Box<boolean>(true);
    write_int(take(bb));
}
"#;
    compile_err_with(&src, codes::TYPE, "expected `Box<int>`");
}

#[test]
fn runaway_instantiation_diverges() {
    let src = r#"
structure Nest<T> {
    int depth;

    Nest<T>() { this.depth = 0; }

    void sink() {
        Nest<vec<T>> deeper = Nest<vec<T>>();
        deeper.sink();
    }
}
void main() {
    Nest<int> n = Nest<int>();
    n.sink();
}
"#;
    compile_err_with(src, codes::MONO_DIVERGES, "depth");
}
