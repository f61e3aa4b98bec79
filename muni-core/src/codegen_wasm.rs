//! WASM backend: renders the linear IR as a WebAssembly module.
//!
//! Section order: type, import, function, memory, global, export,
//! code, data. The mutable global `__heap_ptr` and the synthesized
//! `__alloc` bump allocator are the only runtime machinery added on
//! top of the translated functions.

use std::collections::BTreeMap;

use wasm_encoder::{
    BlockType, CodeSection, ConstExpr, DataSection, EntityType, ExportKind, ExportSection,
    Function, FunctionSection, GlobalSection, GlobalType, ImportSection, Instruction, MemArg,
    MemorySection, MemoryType, Module, TypeSection, ValType,
};

use crate::diagnostic::{codes, Diagnostic};
use crate::ir::*;
use crate::lower::ALLOC_FN;
use crate::span::Span;

#[derive(Debug)]
pub struct CodegenResult {
    pub bytes: Option<Vec<u8>>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Index of the `__heap_ptr` global.
const HEAP_PTR: u32 = 0;

pub fn generate_wasm(module: &IrModule) -> CodegenResult {
    let mut diags = Vec::new();

    // function index space: imports, then __alloc, then IR functions;
    // imports are addressed by their full `module.name` key, which
    // cannot collide with function names (identifiers have no dot)
    let mut name_map: BTreeMap<String, u32> = BTreeMap::new();
    let mut next_index = 0u32;
    for imp in &module.imports {
        name_map.insert(format!("{}.{}", imp.module, imp.name), next_index);
        next_index += 1;
    }
    let alloc_index = next_index;
    name_map.insert(ALLOC_FN.to_string(), alloc_index);
    next_index += 1;
    for f in &module.functions {
        name_map.insert(f.name.clone(), next_index);
        next_index += 1;
    }

    let mut returns: BTreeMap<String, bool> = BTreeMap::new();
    for imp in &module.imports {
        returns.insert(format!("{}.{}", imp.module, imp.name), imp.result.is_some());
    }
    returns.insert(ALLOC_FN.to_string(), true);
    for f in &module.functions {
        returns.insert(f.name.clone(), f.result.is_some());
    }

    // deduplicated function types
    let mut type_section = TypeSection::new();
    let mut sig_map: BTreeMap<(Vec<ValType>, Vec<ValType>), u32> = BTreeMap::new();
    let mut sig_index = |params: Vec<ValType>, results: Vec<ValType>,
                         type_section: &mut TypeSection| {
        *sig_map.entry((params.clone(), results.clone())).or_insert_with(|| {
            let idx = type_section.len();
            type_section.ty().function(params, results);
            idx
        })
    };

    let mut import_section = ImportSection::new();
    for imp in &module.imports {
        let idx = sig_index(
            imp.params.clone(),
            imp.result.into_iter().collect(),
            &mut type_section,
        );
        import_section.import(&imp.module, &imp.name, EntityType::Function(idx));
    }

    let mut func_section = FunctionSection::new();
    let alloc_type = sig_index(vec![ValType::I32], vec![ValType::I32], &mut type_section);
    func_section.function(alloc_type);
    for f in &module.functions {
        let idx = sig_index(
            f.params.clone(),
            f.result.into_iter().collect(),
            &mut type_section,
        );
        func_section.function(idx);
    }

    let mut code_section = CodeSection::new();
    code_section.function(&alloc_function());
    for f in &module.functions {
        let mut emitter = FuncEmitter {
            name_map: &name_map,
            returns: &returns,
            labels: Vec::new(),
            insts: Vec::new(),
            diags: &mut diags,
        };
        emitter.emit_stmts(&f.body);
        let mut wasm_func = Function::new(compress_locals(&f.locals));
        for inst in &emitter.insts {
            wasm_func.instruction(inst);
        }
        wasm_func.instruction(&Instruction::End);
        code_section.function(&wasm_func);
    }

    let min_pages = ((module.heap_base as u64 + 0xFFFF) / 0x10000).max(1);
    let mut memory_section = MemorySection::new();
    memory_section.memory(MemoryType {
        minimum: min_pages,
        maximum: None,
        memory64: false,
        shared: false,
        page_size_log2: None,
    });

    let mut global_section = GlobalSection::new();
    global_section.global(
        GlobalType {
            val_type: ValType::I32,
            mutable: true,
            shared: false,
        },
        &ConstExpr::i32_const(module.heap_base as i32),
    );

    let mut export_section = ExportSection::new();
    export_section.export("memory", ExportKind::Memory, 0);
    if let Some(main_idx) = name_map.get("main") {
        export_section.export("main", ExportKind::Func, *main_idx);
    }

    let mut data_section = DataSection::new();
    for seg in &module.data {
        data_section.active(
            0,
            &ConstExpr::i32_const(seg.offset as i32),
            seg.bytes.iter().copied(),
        );
    }

    if crate::diagnostic::has_errors(&diags) {
        return CodegenResult {
            bytes: None,
            diagnostics: diags,
        };
    }

    let mut out = Module::new();
    out.section(&type_section);
    if !module.imports.is_empty() {
        out.section(&import_section);
    }
    out.section(&func_section);
    out.section(&memory_section);
    out.section(&global_section);
    out.section(&export_section);
    out.section(&code_section);
    if !module.data.is_empty() {
        out.section(&data_section);
    }

    CodegenResult {
        bytes: Some(out.finish()),
        diagnostics: diags,
    }
}

/// The bump allocator over linear memory. Sizes are rounded up to a
/// word; when the bumped pointer passes the current memory size the
/// memory grows, and a failed grow traps.
///
/// ```text
/// (func $__alloc (param $size i32) (result i32) (local $ptr i32)
///   size = (size + 3) & -4
///   ptr = __heap_ptr
///   __heap_ptr = ptr + size
///   if __heap_ptr > memory.size * 64Ki:
///     if memory.grow(pages needed) == -1: unreachable
///   ptr)
/// ```
fn alloc_function() -> Function {
    let mut f = Function::new([(1, ValType::I32)]);
    for inst in [
        Instruction::LocalGet(0),
        Instruction::I32Const(3),
        Instruction::I32Add,
        Instruction::I32Const(-4),
        Instruction::I32And,
        Instruction::LocalSet(0),
        Instruction::GlobalGet(HEAP_PTR),
        Instruction::LocalSet(1),
        Instruction::LocalGet(1),
        Instruction::LocalGet(0),
        Instruction::I32Add,
        Instruction::GlobalSet(HEAP_PTR),
        Instruction::GlobalGet(HEAP_PTR),
        Instruction::MemorySize(0),
        Instruction::I32Const(16),
        Instruction::I32Shl,
        Instruction::I32GtU,
        Instruction::If(BlockType::Empty),
        Instruction::GlobalGet(HEAP_PTR),
        Instruction::MemorySize(0),
        Instruction::I32Const(16),
        Instruction::I32Shl,
        Instruction::I32Sub,
        Instruction::I32Const(0xFFFF),
        Instruction::I32Add,
        Instruction::I32Const(16),
        Instruction::I32ShrU,
        Instruction::MemoryGrow(0),
        Instruction::I32Const(-1),
        Instruction::I32Eq,
        Instruction::If(BlockType::Empty),
        Instruction::Unreachable,
        Instruction::End,
        Instruction::End,
        Instruction::LocalGet(1),
        Instruction::End,
    ] {
        f.instruction(&inst);
    }
    f
}

/// Run-length encode the locals declaration.
fn compress_locals(locals: &[ValType]) -> Vec<(u32, ValType)> {
    let mut out: Vec<(u32, ValType)> = Vec::new();
    for ty in locals {
        match out.last_mut() {
            Some((count, last)) if last == ty => *count += 1,
            _ => out.push((1, *ty)),
        }
    }
    out
}

struct FuncEmitter<'a> {
    name_map: &'a BTreeMap<String, u32>,
    returns: &'a BTreeMap<String, bool>,
    /// Enclosing label frames, innermost last. `None` marks an
    /// if-frame, which consumes branch depth but is never a target.
    labels: Vec<Option<LabelId>>,
    insts: Vec<Instruction<'static>>,
    diags: &'a mut Vec<Diagnostic>,
}

impl<'a> FuncEmitter<'a> {
    fn emit_stmts(&mut self, body: &[IrStmt]) {
        for stmt in body {
            self.emit_stmt(stmt);
        }
    }

    fn emit_stmt(&mut self, stmt: &IrStmt) {
        match stmt {
            IrStmt::Assign { dst, value } => {
                self.emit_value(value);
                self.insts.push(Instruction::LocalSet(*dst));
            }
            IrStmt::Store {
                addr,
                offset,
                value,
            } => {
                self.emit_operand(addr);
                self.emit_operand(value);
                self.insts.push(Instruction::I32Store(mem_arg(*offset)));
            }
            IrStmt::Call { dst, callee, args } => {
                for arg in args {
                    self.emit_operand(arg);
                }
                let Some(idx) = self.name_map.get(callee) else {
                    self.diags.push(
                        Diagnostic::error(
                            format!("call to unknown function `{callee}`"),
                            Span::dummy(),
                        )
                        .with_code(codes::EMIT),
                    );
                    return;
                };
                self.insts.push(Instruction::Call(*idx));
                let has_result = self.returns.get(callee).copied().unwrap_or(false);
                match (has_result, dst) {
                    (true, Some(dst)) => self.insts.push(Instruction::LocalSet(*dst)),
                    (true, None) => self.insts.push(Instruction::Drop),
                    (false, Some(_)) => self.diags.push(
                        Diagnostic::error(
                            format!("`{callee}` has no result to assign"),
                            Span::dummy(),
                        )
                        .with_code(codes::EMIT),
                    ),
                    (false, None) => {}
                }
            }
            IrStmt::Return(value) => {
                if let Some(v) = value {
                    self.emit_operand(v);
                }
                self.insts.push(Instruction::Return);
            }
            IrStmt::If {
                cond,
                then_body,
                else_body,
            } => {
                self.emit_operand(cond);
                self.insts.push(Instruction::If(BlockType::Empty));
                self.labels.push(None);
                self.emit_stmts(then_body);
                if !else_body.is_empty() {
                    self.insts.push(Instruction::Else);
                    self.emit_stmts(else_body);
                }
                self.insts.push(Instruction::End);
                self.labels.pop();
            }
            IrStmt::Block { label, body } => {
                self.insts.push(Instruction::Block(BlockType::Empty));
                self.labels.push(Some(*label));
                self.emit_stmts(body);
                self.insts.push(Instruction::End);
                self.labels.pop();
            }
            IrStmt::Loop { label, body } => {
                self.insts.push(Instruction::Loop(BlockType::Empty));
                self.labels.push(Some(*label));
                self.emit_stmts(body);
                self.insts.push(Instruction::End);
                self.labels.pop();
            }
            IrStmt::Br(label) => {
                if let Some(depth) = self.depth_of(*label) {
                    self.insts.push(Instruction::Br(depth));
                }
            }
            IrStmt::BrIf { cond, label } => {
                self.emit_operand(cond);
                if let Some(depth) = self.depth_of(*label) {
                    self.insts.push(Instruction::BrIf(depth));
                }
            }
            IrStmt::Trap => self.insts.push(Instruction::Unreachable),
        }
    }

    fn emit_value(&mut self, value: &IrValue) {
        match value {
            IrValue::Operand(op) => self.emit_operand(op),
            IrValue::Binary { op, lhs, rhs } => {
                self.emit_operand(lhs);
                self.emit_operand(rhs);
                self.insts.push(binary_instruction(*op));
            }
            IrValue::Eqz(op) => {
                self.emit_operand(op);
                self.insts.push(Instruction::I32Eqz);
            }
            IrValue::Load { addr, offset } => {
                self.emit_operand(addr);
                self.insts.push(Instruction::I32Load(mem_arg(*offset)));
            }
        }
    }

    fn emit_operand(&mut self, op: &IrOperand) {
        match op {
            IrOperand::Local(id) => self.insts.push(Instruction::LocalGet(*id)),
            IrOperand::Const(v) => self.insts.push(Instruction::I32Const(*v)),
        }
    }

    fn depth_of(&mut self, label: LabelId) -> Option<u32> {
        let depth = self
            .labels
            .iter()
            .rev()
            .position(|l| *l == Some(label));
        if depth.is_none() {
            self.diags.push(
                Diagnostic::error(
                    format!("branch to label {label} outside its block"),
                    Span::dummy(),
                )
                .with_code(codes::EMIT),
            );
        }
        depth.map(|d| d as u32)
    }
}

fn mem_arg(offset: u32) -> MemArg {
    MemArg {
        offset: offset as u64,
        align: 2,
        memory_index: 0,
    }
}

fn binary_instruction(op: IrBinOp) -> Instruction<'static> {
    match op {
        IrBinOp::Add => Instruction::I32Add,
        IrBinOp::Sub => Instruction::I32Sub,
        IrBinOp::Mul => Instruction::I32Mul,
        IrBinOp::DivS => Instruction::I32DivS,
        IrBinOp::RemS => Instruction::I32RemS,
        IrBinOp::Eq => Instruction::I32Eq,
        IrBinOp::Ne => Instruction::I32Ne,
        IrBinOp::LtS => Instruction::I32LtS,
        IrBinOp::LtU => Instruction::I32LtU,
        IrBinOp::LeS => Instruction::I32LeS,
        IrBinOp::GtS => Instruction::I32GtS,
        IrBinOp::GeS => Instruction::I32GeS,
        IrBinOp::And => Instruction::I32And,
        IrBinOp::Or => Instruction::I32Or,
    }
}
