mod harness;
use harness::compile_src;
use muni_core::print_wat;
use wasmparser::{Parser, Payload};

const PROGRAM: &str = r#"
structure Box<T> {
    T value;
    Box<T>(T v) { this.value = v; }
    T get() { return this.value; }
}
void main() {
    Box<int> b = Box<int>(1);
    array<int> a = [10, 20, 30];
    print("hello");
    write_int(b.get() + a[1]);
}
"#;

#[test]
fn compilation_is_deterministic() {
    let first = compile_src(PROGRAM);
    let second = compile_src(PROGRAM);
    assert_eq!(first, second, "outputs differ between identical runs");
}

#[test]
fn module_validates() {
    let wasm = compile_src(PROGRAM);
    wasmparser::Validator::new()
        .validate_all(&wasm)
        .expect("emitted module is valid");
}

#[test]
fn wat_and_binary_describe_the_same_module() {
    let wasm = compile_src(PROGRAM);
    let wat = print_wat(&wasm).expect("module prints");
    assert!(wat.starts_with("(module"));
    // the textual form re-assembles to a validating module shape:
    // imports and the memory export must be visible in the text
    assert!(wat.contains("write_int"));
    assert!(wat.contains("write_chr"));
    assert!(wat.contains("(export \"memory\""));
    assert!(wat.contains("(export \"main\""));
}

#[test]
fn every_host_import_appears_exactly_once() {
    let wasm = compile_src(PROGRAM);
    let mut seen = Vec::new();
    for payload in Parser::new(0).parse_all(&wasm) {
        if let Payload::ImportSection(imports) = payload.expect("parse") {
            for imp in imports {
                let imp = imp.expect("import entry");
                seen.push(format!("{}.{}", imp.module, imp.name));
            }
        }
    }
    let write_int = seen.iter().filter(|n| *n == "env.write_int").count();
    let write_chr = seen.iter().filter(|n| *n == "env.write_chr").count();
    assert_eq!(write_int, 1, "imports seen: {seen:?}");
    assert_eq!(write_chr, 1, "imports seen: {seen:?}");
}

#[test]
fn custom_host_imports_are_preserved() {
    let wasm = compile_src(
        "import host.blip(int, int) -> int;\nvoid main() { write_int(blip(1, 2)); }",
    );
    let mut found = false;
    for payload in Parser::new(0).parse_all(&wasm) {
        if let Payload::ImportSection(imports) = payload.expect("parse") {
            for imp in imports {
                let imp = imp.expect("import entry");
                if imp.module == "host" && imp.name == "blip" {
                    found = true;
                }
            }
        }
    }
    assert!(found, "declared host import missing from the module");
}

#[test]
fn data_segments_leave_the_null_sink_reserved() {
    let wasm = compile_src(PROGRAM);
    for payload in Parser::new(0).parse_all(&wasm) {
        if let Payload::DataSection(section) = payload.expect("parse") {
            for seg in section {
                let seg = seg.expect("data segment");
                if let wasmparser::DataKind::Active { offset_expr, .. } = seg.kind {
                    let mut reader = offset_expr.get_operators_reader();
                    if let Ok(wasmparser::Operator::I32Const { value }) = reader.read() {
                        assert!(value >= 16, "segment at {value} overlaps the null sink");
                    }
                }
            }
        }
    }
}

#[test]
fn identical_literals_share_a_segment() {
    let one = compile_src(r#"void main() { print("shared"); }"#);
    let two = compile_src(r#"void main() { print("shared"); print("shared"); }"#);
    let count = |wasm: &[u8]| {
        let mut n = 0;
        for payload in Parser::new(0).parse_all(wasm) {
            if let Payload::DataSection(section) = payload.expect("parse") {
                n = section.into_iter().count();
            }
        }
        n
    };
    assert_eq!(count(&one), count(&two), "second use added a segment");
}

#[test]
fn memory_starts_at_one_page_minimum() {
    let wasm = compile_src("void main() { }");
    for payload in Parser::new(0).parse_all(&wasm) {
        if let Payload::MemorySection(section) = payload.expect("parse") {
            for mem in section {
                let mem = mem.expect("memory entry");
                assert!(mem.initial >= 1);
                assert!(mem.maximum.is_none());
            }
        }
    }
}

#[test]
fn heap_allocation_can_grow_memory() {
    // allocate well past the initial page
    let src = r#"
void main() {
    for (int i = 0; i < 200; i += 1) {
        array<int> a = array<int>(200);
        a.set(199, i);
    }
    write_int(1);
}
"#;
    let out = harness::run_main(src);
    assert_eq!(out, "1\n");
}
