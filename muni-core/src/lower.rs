//! Lowering from typed HIR to linear IR.
//!
//! Responsibilities: local index assignment, decomposition of nested
//! expressions into temporaries, short-circuit logic as branches,
//! loop shapes with distinct break/exit/continue labels, array bounds
//! checks that trap on out-of-range, heap allocation through the
//! emitted `__alloc` runtime function, and interning of string and
//! array literal payloads into static data segments.

use std::collections::BTreeMap;

use wasm_encoder::ValType;

use crate::ast::{BinOp, UnOp};
use crate::diagnostic::{codes, Diagnostic};
use crate::hir::*;
use crate::ir::*;
use crate::span::Span;
use crate::types::{Layout, Ty, ARRAY_HEADER, WORD};

/// Static data begins here; the low bytes stay reserved as a
/// null-sink so that loads through a null pointer never alias real
/// data.
pub const DATA_BASE: u32 = 16;

/// Name of the emitted bump-allocator runtime function.
pub const ALLOC_FN: &str = "__alloc";

#[derive(Debug)]
pub struct LowerResult {
    pub module: Option<IrModule>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn lower(program: &HirProgram) -> LowerResult {
    let mut returns: BTreeMap<String, bool> = BTreeMap::new();
    for imp in &program.imports {
        // imports are addressed by their full (module, name) key
        returns.insert(
            format!("{}.{}", imp.module, imp.name),
            imp.ret != Ty::Void,
        );
    }
    for f in &program.functions {
        returns.insert(f.name.clone(), f.ret != Ty::Void);
    }
    returns.insert(ALLOC_FN.to_string(), true);

    let mut ml = ModuleLowerer {
        layouts: &program.layouts,
        returns,
        segments: BTreeMap::new(),
        data: Vec::new(),
        cursor: DATA_BASE,
        diagnostics: Vec::new(),
    };

    let mut functions = Vec::new();
    for f in &program.functions {
        functions.push(ml.lower_function(f));
    }

    let imports = program
        .imports
        .iter()
        .map(|imp| IrImport {
            module: imp.module.clone(),
            name: imp.name.clone(),
            params: vec![ValType::I32; imp.params.len()],
            result: (imp.ret != Ty::Void).then_some(ValType::I32),
        })
        .collect();

    let heap_base = align_to(ml.cursor, 8);
    let module = IrModule {
        imports,
        functions,
        data: ml.data,
        heap_base,
    };
    if crate::diagnostic::has_errors(&ml.diagnostics) {
        LowerResult {
            module: None,
            diagnostics: ml.diagnostics,
        }
    } else {
        LowerResult {
            module: Some(module),
            diagnostics: ml.diagnostics,
        }
    }
}

fn align_to(x: u32, align: u32) -> u32 {
    let mask = align - 1;
    (x + mask) & !mask
}

struct ModuleLowerer<'p> {
    layouts: &'p BTreeMap<String, Layout>,
    /// Whether each callable leaves a value on the stack.
    returns: BTreeMap<String, bool>,
    /// Interned literal payloads: content -> assigned offset.
    segments: BTreeMap<Vec<u8>, u32>,
    data: Vec<IrData>,
    cursor: u32,
    diagnostics: Vec<Diagnostic>,
}

impl<'p> ModuleLowerer<'p> {
    /// Intern a payload; identical content shares one segment.
    fn intern(&mut self, bytes: Vec<u8>) -> u32 {
        if let Some(off) = self.segments.get(&bytes) {
            return *off;
        }
        let off = align_to(self.cursor, WORD);
        self.cursor = off + bytes.len() as u32;
        self.segments.insert(bytes.clone(), off);
        self.data.push(IrData { offset: off, bytes });
        off
    }

    fn emit_error(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics
            .push(Diagnostic::error(message, span).with_code(codes::EMIT));
    }

    fn layout_of(&mut self, strct: &str, span: Span) -> Option<Layout> {
        match self.layouts.get(strct) {
            Some(l) => Some(l.clone()),
            None => {
                self.emit_error(format!("missing layout for `{strct}`"), span);
                None
            }
        }
    }

    fn lower_function(&mut self, f: &HirFunction) -> IrFunction {
        let n_params = f.params.len();
        let mut fl = FnLowerer {
            ml: self,
            locals: vec![ValType::I32; n_params],
            scopes: vec![BTreeMap::new()],
            loops: Vec::new(),
            next_label: 0,
            is_ctor: f.is_ctor,
        };
        for (i, (name, _)) in f.params.iter().enumerate() {
            fl.scopes
                .last_mut()
                .expect("scope stack never empty")
                .insert(name.clone(), i as u32);
        }

        let mut body = Vec::new();
        for stmt in &f.body {
            fl.lower_stmt(stmt, &mut body);
        }
        match (&f.ret, f.is_ctor) {
            (_, true) => body.push(IrStmt::Return(Some(IrOperand::Local(0)))),
            (Ty::Void, false) => {}
            // the checker proved all paths return; the trap keeps the
            // encoded body well-typed after branches that never fall
            // through
            (_, false) => body.push(IrStmt::Trap),
        }

        let locals = fl.locals.split_off(n_params);
        IrFunction {
            name: f.name.clone(),
            params: vec![ValType::I32; n_params],
            result: (f.ret != Ty::Void).then_some(ValType::I32),
            locals,
            body,
        }
    }
}

struct FnLowerer<'a, 'p> {
    ml: &'a mut ModuleLowerer<'p>,
    /// Types of all locals, parameters first.
    locals: Vec<ValType>,
    /// Name scopes mirroring the checked block structure.
    scopes: Vec<BTreeMap<String, LocalId>>,
    /// Enclosing loops: (break label, continue label).
    loops: Vec<(LabelId, LabelId)>,
    next_label: LabelId,
    is_ctor: bool,
}

impl<'a, 'p> FnLowerer<'a, 'p> {
    fn temp(&mut self) -> LocalId {
        let id = self.locals.len() as LocalId;
        self.locals.push(ValType::I32);
        id
    }

    fn bind(&mut self, name: &str) -> LocalId {
        let id = self.temp();
        self.scopes
            .last_mut()
            .expect("scope stack never empty")
            .insert(name.to_string(), id);
        id
    }

    fn lookup(&mut self, name: &str, span: Span) -> LocalId {
        for scope in self.scopes.iter().rev() {
            if let Some(id) = scope.get(name) {
                return *id;
            }
        }
        self.ml
            .emit_error(format!("unbound local `{name}` after checking"), span);
        0
    }

    fn fresh_label(&mut self) -> LabelId {
        let l = self.next_label;
        self.next_label += 1;
        l
    }

    /// Evaluate `value` into a fresh temporary.
    fn assign_temp(&mut self, value: IrValue, out: &mut Vec<IrStmt>) -> IrOperand {
        let t = self.temp();
        out.push(IrStmt::Assign { dst: t, value });
        IrOperand::Local(t)
    }

    /// Force an operand into a local so it can be reused.
    fn ensure_local(&mut self, op: IrOperand, out: &mut Vec<IrStmt>) -> IrOperand {
        match op {
            IrOperand::Local(_) => op,
            IrOperand::Const(_) => self.assign_temp(IrValue::Operand(op), out),
        }
    }

    // -----------------------------------------------------------------
    // statements
    // -----------------------------------------------------------------

    fn lower_block(&mut self, stmts: &[HirStmt], out: &mut Vec<IrStmt>) {
        self.scopes.push(BTreeMap::new());
        for s in stmts {
            self.lower_stmt(s, out);
        }
        self.scopes.pop();
    }

    fn lower_stmt(&mut self, stmt: &HirStmt, out: &mut Vec<IrStmt>) {
        match stmt {
            HirStmt::Let { name, value, .. } => {
                let v = self.lower_value(value, out);
                let dst = self.bind(name);
                out.push(IrStmt::Assign {
                    dst,
                    value: IrValue::Operand(v),
                });
            }
            HirStmt::AssignLocal { name, value } => {
                let v = self.lower_value(value, out);
                let dst = self.lookup(name, value.span);
                out.push(IrStmt::Assign {
                    dst,
                    value: IrValue::Operand(v),
                });
            }
            HirStmt::AssignField {
                obj,
                strct,
                field,
                value,
            } => {
                let addr = self.lower_value(obj, out);
                let v = self.lower_value(value, out);
                let offset = self.field_offset(strct, field, obj.span);
                out.push(IrStmt::Store {
                    addr,
                    offset,
                    value: v,
                });
            }
            HirStmt::AssignIndex {
                array,
                index,
                value,
            } => {
                let addr = self.lower_element_addr(array, index, out);
                let v = self.lower_value(value, out);
                out.push(IrStmt::Store {
                    addr,
                    offset: 0,
                    value: v,
                });
            }
            HirStmt::Expr(e) => {
                let _ = self.lower_expr(e, out);
            }
            HirStmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let c = self.lower_value(cond, out);
                let mut then_ir = Vec::new();
                self.lower_block(then_body, &mut then_ir);
                let mut else_ir = Vec::new();
                self.lower_block(else_body, &mut else_ir);
                out.push(IrStmt::If {
                    cond: c,
                    then_body: then_ir,
                    else_body: else_ir,
                });
            }
            HirStmt::While {
                cond,
                body,
                else_body,
            } => self.lower_loop(Some(cond), false, body, else_body, out),
            HirStmt::Until {
                cond,
                body,
                else_body,
            } => self.lower_loop(Some(cond), true, body, else_body, out),
            HirStmt::For {
                init,
                cond,
                step,
                body,
                else_body,
            } => self.lower_for(init, cond, step, body, else_body, out),
            HirStmt::Do {
                count,
                cond,
                body,
                else_body,
            } => self.lower_do(count, cond, body, else_body, out),
            HirStmt::Return(value) => {
                if self.is_ctor {
                    out.push(IrStmt::Return(Some(IrOperand::Local(0))));
                } else {
                    let v = value.as_ref().map(|v| self.lower_value(v, out));
                    out.push(IrStmt::Return(v));
                }
            }
            HirStmt::Break => {
                if let Some((brk, _)) = self.loops.last() {
                    out.push(IrStmt::Br(*brk));
                }
            }
            HirStmt::Continue => {
                if let Some((_, cont)) = self.loops.last() {
                    out.push(IrStmt::Br(*cont));
                }
            }
            HirStmt::Block(body) => self.lower_block(body, out),
        }
    }

    /// Shared shape of `while` and `until`:
    ///
    /// ```text
    /// block $break
    ///   block $exit
    ///     loop $head          ;; continue target
    ///       <cond>            ;; inverted for `until`
    ///       br_if $exit
    ///       <body>
    ///       br $head
    ///     end
    ///   end
    ///   <else>                ;; skipped by `break`
    /// end
    /// ```
    fn lower_loop(
        &mut self,
        cond: Option<&HirExpr>,
        inverted: bool,
        body: &[HirStmt],
        else_body: &[HirStmt],
        out: &mut Vec<IrStmt>,
    ) {
        let l_break = self.fresh_label();
        let l_exit = self.fresh_label();
        let l_head = self.fresh_label();

        let mut loop_ir = Vec::new();
        if let Some(cond) = cond {
            let c = self.lower_value(cond, &mut loop_ir);
            let test = if inverted {
                // until: leave when the condition holds
                c
            } else {
                self.assign_temp(IrValue::Eqz(c), &mut loop_ir)
            };
            loop_ir.push(IrStmt::BrIf {
                cond: test,
                label: l_exit,
            });
        }
        self.loops.push((l_break, l_head));
        self.lower_block(body, &mut loop_ir);
        self.loops.pop();
        loop_ir.push(IrStmt::Br(l_head));

        let mut break_ir = vec![IrStmt::Block {
            label: l_exit,
            body: vec![IrStmt::Loop {
                label: l_head,
                body: loop_ir,
            }],
        }];
        self.lower_block(else_body, &mut break_ir);
        out.push(IrStmt::Block {
            label: l_break,
            body: break_ir,
        });
    }

    /// `for` keeps `continue` distinct from the loop head so the step
    /// statement still runs:
    ///
    /// ```text
    /// <init>
    /// block $break
    ///   block $exit
    ///     loop $head
    ///       <cond>  br_if $exit
    ///       block $cont
    ///         <body>
    ///       end
    ///       <step>
    ///       br $head
    ///     end
    ///   end
    ///   <else>
    /// end
    /// ```
    fn lower_for(
        &mut self,
        init: &Option<Box<HirStmt>>,
        cond: &Option<HirExpr>,
        step: &Option<Box<HirStmt>>,
        body: &[HirStmt],
        else_body: &[HirStmt],
        out: &mut Vec<IrStmt>,
    ) {
        self.scopes.push(BTreeMap::new());
        if let Some(init) = init {
            self.lower_stmt(init, out);
        }

        let l_break = self.fresh_label();
        let l_exit = self.fresh_label();
        let l_head = self.fresh_label();
        let l_cont = self.fresh_label();

        let mut loop_ir = Vec::new();
        if let Some(cond) = cond {
            let c = self.lower_value(cond, &mut loop_ir);
            let test = self.assign_temp(IrValue::Eqz(c), &mut loop_ir);
            loop_ir.push(IrStmt::BrIf {
                cond: test,
                label: l_exit,
            });
        }
        let mut body_ir = Vec::new();
        self.loops.push((l_break, l_cont));
        self.lower_block(body, &mut body_ir);
        self.loops.pop();
        loop_ir.push(IrStmt::Block {
            label: l_cont,
            body: body_ir,
        });
        if let Some(step) = step {
            self.lower_stmt(step, &mut loop_ir);
        }
        loop_ir.push(IrStmt::Br(l_head));

        let mut break_ir = vec![IrStmt::Block {
            label: l_exit,
            body: vec![IrStmt::Loop {
                label: l_head,
                body: loop_ir,
            }],
        }];
        self.lower_block(else_body, &mut break_ir);
        out.push(IrStmt::Block {
            label: l_break,
            body: break_ir,
        });
        self.scopes.pop();
    }

    /// `do` runs its body a counted number of times, then while the
    /// trailing condition holds; a bare `do` runs once.
    fn lower_do(
        &mut self,
        count: &Option<HirExpr>,
        cond: &Option<HirExpr>,
        body: &[HirStmt],
        else_body: &[HirStmt],
        out: &mut Vec<IrStmt>,
    ) {
        let l_break = self.fresh_label();
        let mut break_ir = Vec::new();

        let counted = match count {
            Some(c) => Some(self.lower_value(c, &mut break_ir)),
            None if cond.is_none() => Some(IrOperand::Const(1)),
            None => None,
        };
        if let Some(n) = counted {
            let n = self.ensure_local(n, &mut break_ir);
            let remaining = match n {
                IrOperand::Local(id) => id,
                IrOperand::Const(_) => unreachable!("ensure_local yields a local"),
            };
            let l_exit = self.fresh_label();
            let l_head = self.fresh_label();
            let l_cont = self.fresh_label();
            let mut loop_ir = Vec::new();
            let done = self.assign_temp(
                IrValue::Binary {
                    op: IrBinOp::LeS,
                    lhs: IrOperand::Local(remaining),
                    rhs: IrOperand::Const(0),
                },
                &mut loop_ir,
            );
            loop_ir.push(IrStmt::BrIf {
                cond: done,
                label: l_exit,
            });
            let mut body_ir = Vec::new();
            self.loops.push((l_break, l_cont));
            self.lower_block(body, &mut body_ir);
            self.loops.pop();
            loop_ir.push(IrStmt::Block {
                label: l_cont,
                body: body_ir,
            });
            loop_ir.push(IrStmt::Assign {
                dst: remaining,
                value: IrValue::Binary {
                    op: IrBinOp::Sub,
                    lhs: IrOperand::Local(remaining),
                    rhs: IrOperand::Const(1),
                },
            });
            loop_ir.push(IrStmt::Br(l_head));
            break_ir.push(IrStmt::Block {
                label: l_exit,
                body: vec![IrStmt::Loop {
                    label: l_head,
                    body: loop_ir,
                }],
            });
        }

        if let Some(cond) = cond {
            let l_head = self.fresh_label();
            let l_cont = self.fresh_label();
            let mut loop_ir = Vec::new();
            let mut body_ir = Vec::new();
            self.loops.push((l_break, l_cont));
            self.lower_block(body, &mut body_ir);
            self.loops.pop();
            loop_ir.push(IrStmt::Block {
                label: l_cont,
                body: body_ir,
            });
            let c = self.lower_value(cond, &mut loop_ir);
            loop_ir.push(IrStmt::BrIf {
                cond: c,
                label: l_head,
            });
            break_ir.push(IrStmt::Loop {
                label: l_head,
                body: loop_ir,
            });
        }

        self.lower_block(else_body, &mut break_ir);
        out.push(IrStmt::Block {
            label: l_break,
            body: break_ir,
        });
    }

    // -----------------------------------------------------------------
    // expressions
    // -----------------------------------------------------------------

    /// Lower an expression that is known to produce a value.
    fn lower_value(&mut self, e: &HirExpr, out: &mut Vec<IrStmt>) -> IrOperand {
        match self.lower_expr(e, out) {
            Some(op) => op,
            None => {
                self.ml
                    .emit_error("void expression used as a value", e.span);
                IrOperand::Const(0)
            }
        }
    }

    /// Lower an expression; `None` for void-typed expressions.
    fn lower_expr(&mut self, e: &HirExpr, out: &mut Vec<IrStmt>) -> Option<IrOperand> {
        match &e.kind {
            HirExprKind::Int(v) => Some(IrOperand::Const(*v)),
            HirExprKind::Bool(b) => Some(IrOperand::Const(i32::from(*b))),
            HirExprKind::Null => Some(IrOperand::Const(0)),
            HirExprKind::Local(name) => {
                let id = self.lookup(name, e.span);
                Some(IrOperand::Local(id))
            }
            HirExprKind::Str(text) => Some(self.lower_string(text, e.span, out)),
            HirExprKind::ArrayLit(elems) => Some(self.lower_array_lit(elems, e.span, out)),
            HirExprKind::Field { obj, strct, field } => {
                let addr = self.lower_value(obj, out);
                let offset = self.field_offset(strct, field, e.span);
                Some(self.assign_temp(IrValue::Load { addr, offset }, out))
            }
            HirExprKind::Index { array, index } => {
                let addr = self.lower_element_addr(array, index, out);
                Some(self.assign_temp(IrValue::Load { addr, offset: 0 }, out))
            }
            HirExprKind::ArraySet {
                array,
                index,
                value,
            } => {
                let addr = self.lower_element_addr(array, index, out);
                let v = self.lower_value(value, out);
                out.push(IrStmt::Store {
                    addr,
                    offset: 0,
                    value: v,
                });
                None
            }
            HirExprKind::ArrayLen { array } => {
                let addr = self.lower_value(array, out);
                Some(self.assign_temp(IrValue::Load { addr, offset: 0 }, out))
            }
            HirExprKind::ArrayNew { length } => {
                let len = self.lower_value(length, out);
                let len = self.ensure_local(len, out);
                Some(self.emit_array_alloc(len, out))
            }
            HirExprKind::Call { callee, args } => {
                let args: Vec<IrOperand> =
                    args.iter().map(|a| self.lower_value(a, out)).collect();
                self.emit_call(callee.clone(), args, out)
            }
            HirExprKind::New { strct, ctor, args } => {
                let size = self
                    .ml
                    .layout_of(strct, e.span)
                    .map(|l| l.size)
                    .unwrap_or(0);
                let ptr = self.emit_alloc(IrOperand::Const(size as i32), out);
                let mut call_args = vec![ptr];
                for a in args {
                    call_args.push(self.lower_value(a, out));
                }
                self.emit_call(ctor.clone(), call_args, out)
            }
            HirExprKind::Binary { op, lhs, rhs } => {
                Some(self.lower_binary(*op, lhs, rhs, out))
            }
            HirExprKind::Unary { op, expr } => {
                let v = self.lower_value(expr, out);
                let value = match op {
                    UnOp::Not => IrValue::Eqz(v),
                    UnOp::Neg => IrValue::Binary {
                        op: IrBinOp::Sub,
                        lhs: IrOperand::Const(0),
                        rhs: v,
                    },
                };
                Some(self.assign_temp(value, out))
            }
        }
    }

    fn lower_binary(
        &mut self,
        op: BinOp,
        lhs: &HirExpr,
        rhs: &HirExpr,
        out: &mut Vec<IrStmt>,
    ) -> IrOperand {
        // short-circuit logic lowers to branches, not arithmetic
        match op {
            BinOp::And => {
                let res = self.temp();
                let l = self.lower_value(lhs, out);
                out.push(IrStmt::Assign {
                    dst: res,
                    value: IrValue::Operand(l),
                });
                let mut then_ir = Vec::new();
                let r = self.lower_value(rhs, &mut then_ir);
                then_ir.push(IrStmt::Assign {
                    dst: res,
                    value: IrValue::Operand(r),
                });
                out.push(IrStmt::If {
                    cond: IrOperand::Local(res),
                    then_body: then_ir,
                    else_body: Vec::new(),
                });
                return IrOperand::Local(res);
            }
            BinOp::Or => {
                let res = self.temp();
                let l = self.lower_value(lhs, out);
                out.push(IrStmt::Assign {
                    dst: res,
                    value: IrValue::Operand(l),
                });
                let mut else_ir = Vec::new();
                let r = self.lower_value(rhs, &mut else_ir);
                else_ir.push(IrStmt::Assign {
                    dst: res,
                    value: IrValue::Operand(r),
                });
                out.push(IrStmt::If {
                    cond: IrOperand::Local(res),
                    then_body: Vec::new(),
                    else_body: else_ir,
                });
                return IrOperand::Local(res);
            }
            _ => {}
        }

        let l = self.lower_value(lhs, out);
        let r = self.lower_value(rhs, out);
        let ir_op = match op {
            BinOp::Add => IrBinOp::Add,
            BinOp::Sub => IrBinOp::Sub,
            BinOp::Mul => IrBinOp::Mul,
            BinOp::Div => IrBinOp::DivS,
            BinOp::Rem => IrBinOp::RemS,
            BinOp::Eq => IrBinOp::Eq,
            BinOp::Ne => IrBinOp::Ne,
            BinOp::Lt => IrBinOp::LtS,
            BinOp::Le => IrBinOp::LeS,
            BinOp::Gt => IrBinOp::GtS,
            BinOp::Ge => IrBinOp::GeS,
            BinOp::And | BinOp::Or => unreachable!("short-circuit handled above"),
        };
        self.assign_temp(
            IrValue::Binary {
                op: ir_op,
                lhs: l,
                rhs: r,
            },
            out,
        )
    }

    /// Address of `array[index]` with a bounds check:
    /// indices are compared unsigned against the length, so negative
    /// indices also trap.
    fn lower_element_addr(
        &mut self,
        array: &HirExpr,
        index: &HirExpr,
        out: &mut Vec<IrStmt>,
    ) -> IrOperand {
        let arr = self.lower_value(array, out);
        let arr = self.ensure_local(arr, out);
        let idx = self.lower_value(index, out);
        let idx = self.ensure_local(idx, out);
        let len = self.assign_temp(
            IrValue::Load {
                addr: arr,
                offset: 0,
            },
            out,
        );
        let ok = self.assign_temp(
            IrValue::Binary {
                op: IrBinOp::LtU,
                lhs: idx,
                rhs: len,
            },
            out,
        );
        out.push(IrStmt::If {
            cond: ok,
            then_body: Vec::new(),
            else_body: vec![IrStmt::Trap],
        });
        let buf = self.assign_temp(
            IrValue::Load {
                addr: arr,
                offset: WORD,
            },
            out,
        );
        let byte_off = self.assign_temp(
            IrValue::Binary {
                op: IrBinOp::Mul,
                lhs: idx,
                rhs: IrOperand::Const(WORD as i32),
            },
            out,
        );
        self.assign_temp(
            IrValue::Binary {
                op: IrBinOp::Add,
                lhs: buf,
                rhs: byte_off,
            },
            out,
        )
    }

    /// Allocate an `array<T>` of `len` elements and fill in its
    /// header: length at offset 0, buffer pointer at offset 4.
    fn emit_array_alloc(&mut self, len: IrOperand, out: &mut Vec<IrStmt>) -> IrOperand {
        let neg = self.assign_temp(
            IrValue::Binary {
                op: IrBinOp::LtS,
                lhs: len,
                rhs: IrOperand::Const(0),
            },
            out,
        );
        out.push(IrStmt::If {
            cond: neg,
            then_body: vec![IrStmt::Trap],
            else_body: Vec::new(),
        });
        let payload = self.assign_temp(
            IrValue::Binary {
                op: IrBinOp::Mul,
                lhs: len,
                rhs: IrOperand::Const(WORD as i32),
            },
            out,
        );
        let size = self.assign_temp(
            IrValue::Binary {
                op: IrBinOp::Add,
                lhs: payload,
                rhs: IrOperand::Const(ARRAY_HEADER as i32),
            },
            out,
        );
        let ptr = self.emit_alloc(size, out);
        out.push(IrStmt::Store {
            addr: ptr,
            offset: 0,
            value: len,
        });
        let buf = self.assign_temp(
            IrValue::Binary {
                op: IrBinOp::Add,
                lhs: ptr,
                rhs: IrOperand::Const(ARRAY_HEADER as i32),
            },
            out,
        );
        out.push(IrStmt::Store {
            addr: ptr,
            offset: WORD,
            value: buf,
        });
        ptr
    }

    fn emit_alloc(&mut self, size: IrOperand, out: &mut Vec<IrStmt>) -> IrOperand {
        let dst = self.temp();
        out.push(IrStmt::Call {
            dst: Some(dst),
            callee: ALLOC_FN.to_string(),
            args: vec![size],
        });
        IrOperand::Local(dst)
    }

    fn emit_call(
        &mut self,
        callee: String,
        args: Vec<IrOperand>,
        out: &mut Vec<IrStmt>,
    ) -> Option<IrOperand> {
        let has_result = self.ml.returns.get(&callee).copied().unwrap_or(false);
        let dst = has_result.then(|| self.temp());
        out.push(IrStmt::Call {
            dst,
            callee,
            args,
        });
        dst.map(IrOperand::Local)
    }

    /// A string literal becomes a fresh `vec<char>` whose backing
    /// array is word-copied from an interned data segment (one i32
    /// word per character).
    fn lower_string(&mut self, text: &str, span: Span, out: &mut Vec<IrStmt>) -> IrOperand {
        let words: Vec<i32> = text.chars().map(|c| c as i32).collect();
        let arr = self.emit_static_array(&words, out);
        let vec_layout = Ty::Struct {
            name: "vec".into(),
            args: vec![Ty::Int],
        }
        .mangle();
        let Some(layout) = self.ml.layout_of(&vec_layout, span) else {
            return IrOperand::Const(0);
        };
        let (Some(off_data), Some(off_size), Some(off_cap)) = (
            layout.offset_of("data"),
            layout.offset_of("size"),
            layout.offset_of("capacity"),
        ) else {
            self.ml
                .emit_error("standard library `vec` is missing its fields", span);
            return IrOperand::Const(0);
        };
        let vec_ptr = self.emit_alloc(IrOperand::Const(layout.size as i32), out);
        let len = IrOperand::Const(words.len() as i32);
        out.push(IrStmt::Store {
            addr: vec_ptr,
            offset: off_data,
            value: arr,
        });
        out.push(IrStmt::Store {
            addr: vec_ptr,
            offset: off_size,
            value: len,
        });
        out.push(IrStmt::Store {
            addr: vec_ptr,
            offset: off_cap,
            value: len,
        });
        vec_ptr
    }

    fn lower_array_lit(
        &mut self,
        elems: &[HirExpr],
        _span: Span,
        out: &mut Vec<IrStmt>,
    ) -> IrOperand {
        // constant literals share an interned data segment; anything
        // else evaluates and stores element by element
        let consts: Option<Vec<i32>> = elems
            .iter()
            .map(|e| match e.kind {
                HirExprKind::Int(v) => Some(v),
                HirExprKind::Bool(b) => Some(i32::from(b)),
                HirExprKind::Null => Some(0),
                _ => None,
            })
            .collect();
        if let Some(words) = consts {
            return self.emit_static_array(&words, out);
        }

        let len = IrOperand::Const(elems.len() as i32);
        let len = self.ensure_local(len, out);
        let ptr = self.emit_array_alloc(len, out);
        for (i, elem) in elems.iter().enumerate() {
            let v = self.lower_value(elem, out);
            out.push(IrStmt::Store {
                addr: ptr,
                offset: ARRAY_HEADER + i as u32 * WORD,
                value: v,
            });
        }
        ptr
    }

    /// Heap-allocate an array seeded by word-copy from an interned
    /// segment holding `words`.
    fn emit_static_array(&mut self, words: &[i32], out: &mut Vec<IrStmt>) -> IrOperand {
        let mut bytes = Vec::with_capacity(words.len() * WORD as usize);
        for w in words {
            bytes.extend_from_slice(&w.to_le_bytes());
        }
        let seg = self.ml.intern(bytes);

        let len = IrOperand::Const(words.len() as i32);
        let len = self.ensure_local(len, out);
        let ptr = self.emit_array_alloc(len, out);
        let buf = self.assign_temp(
            IrValue::Load {
                addr: ptr,
                offset: WORD,
            },
            out,
        );

        // i = 0; while i < len: buf[i] = seg[i]
        let i = self.temp();
        out.push(IrStmt::Assign {
            dst: i,
            value: IrValue::Operand(IrOperand::Const(0)),
        });
        let l_exit = self.fresh_label();
        let l_head = self.fresh_label();
        let mut loop_ir = Vec::new();
        let done = self.assign_temp(
            IrValue::Binary {
                op: IrBinOp::GeS,
                lhs: IrOperand::Local(i),
                rhs: len,
            },
            &mut loop_ir,
        );
        loop_ir.push(IrStmt::BrIf {
            cond: done,
            label: l_exit,
        });
        let byte_off = self.assign_temp(
            IrValue::Binary {
                op: IrBinOp::Mul,
                lhs: IrOperand::Local(i),
                rhs: IrOperand::Const(WORD as i32),
            },
            &mut loop_ir,
        );
        let src = self.assign_temp(
            IrValue::Binary {
                op: IrBinOp::Add,
                lhs: IrOperand::Const(seg as i32),
                rhs: byte_off,
            },
            &mut loop_ir,
        );
        let v = self.assign_temp(
            IrValue::Load {
                addr: src,
                offset: 0,
            },
            &mut loop_ir,
        );
        let dst_addr = self.assign_temp(
            IrValue::Binary {
                op: IrBinOp::Add,
                lhs: buf,
                rhs: byte_off,
            },
            &mut loop_ir,
        );
        loop_ir.push(IrStmt::Store {
            addr: dst_addr,
            offset: 0,
            value: v,
        });
        loop_ir.push(IrStmt::Assign {
            dst: i,
            value: IrValue::Binary {
                op: IrBinOp::Add,
                lhs: IrOperand::Local(i),
                rhs: IrOperand::Const(1),
            },
        });
        loop_ir.push(IrStmt::Br(l_head));
        out.push(IrStmt::Block {
            label: l_exit,
            body: vec![IrStmt::Loop {
                label: l_head,
                body: loop_ir,
            }],
        });
        ptr
    }

    fn field_offset(&mut self, strct: &str, field: &str, span: Span) -> u32 {
        let Some(layout) = self.ml.layout_of(strct, span) else {
            return 0;
        };
        match layout.offset_of(field) {
            Some(off) => off,
            None => {
                self.ml.emit_error(
                    format!("missing field `{field}` in layout of `{strct}`"),
                    span,
                );
                0
            }
        }
    }
}
