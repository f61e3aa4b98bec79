//! Linear, typed intermediate representation.
//!
//! Each monomorphic function becomes a list of IR statements whose
//! operands are locals or i32 constants only; the lowerer decomposes
//! every nested subexpression into assignments to fresh temporaries.
//! Control flow is expressed with labeled blocks and loops plus
//! branches to explicit label ids, which the emitter converts to
//! relative WebAssembly branch depths. Every branch target is
//! introduced by an enclosing block of the same function.

use wasm_encoder::ValType;

pub type LocalId = u32;
pub type LabelId = u32;

#[derive(Debug, Clone)]
pub struct IrModule {
    /// Host imports in declaration order.
    pub imports: Vec<IrImport>,
    /// Functions ordered by mangled name.
    pub functions: Vec<IrFunction>,
    /// Static data segments at fixed offsets.
    pub data: Vec<IrData>,
    /// First free byte after the static data, 8-byte aligned; the
    /// initial value of the emitted `__heap_ptr` global.
    pub heap_base: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrImport {
    pub module: String,
    pub name: String,
    pub params: Vec<ValType>,
    pub result: Option<ValType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrData {
    pub offset: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct IrFunction {
    pub name: String,
    pub params: Vec<ValType>,
    pub result: Option<ValType>,
    /// Additional locals beyond the parameters.
    pub locals: Vec<ValType>,
    pub body: Vec<IrStmt>,
}

#[derive(Debug, Clone)]
pub enum IrStmt {
    /// `local[dst] = value`.
    Assign { dst: LocalId, value: IrValue },
    /// 32-bit store of `value` at `addr + offset`.
    Store {
        addr: IrOperand,
        offset: u32,
        value: IrOperand,
    },
    /// Direct call; `dst` receives the result when the callee has one.
    Call {
        dst: Option<LocalId>,
        callee: String,
        args: Vec<IrOperand>,
    },
    Return(Option<IrOperand>),
    If {
        cond: IrOperand,
        then_body: Vec<IrStmt>,
        else_body: Vec<IrStmt>,
    },
    /// Labeled block; a branch to `label` jumps past its end.
    Block { label: LabelId, body: Vec<IrStmt> },
    /// Labeled loop; a branch to `label` jumps back to its head.
    Loop { label: LabelId, body: Vec<IrStmt> },
    Br(LabelId),
    BrIf { cond: IrOperand, label: LabelId },
    /// `unreachable`; bounds-check failures and impossible exits.
    Trap,
}

#[derive(Debug, Clone)]
pub enum IrValue {
    Operand(IrOperand),
    Binary {
        op: IrBinOp,
        lhs: IrOperand,
        rhs: IrOperand,
    },
    /// `operand == 0`, the only unary operator the lowerer emits.
    Eqz(IrOperand),
    /// 32-bit load from `addr + offset`.
    Load { addr: IrOperand, offset: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrOperand {
    Local(LocalId),
    Const(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrBinOp {
    Add,
    Sub,
    Mul,
    DivS,
    RemS,
    Eq,
    Ne,
    LtS,
    LtU,
    LeS,
    GtS,
    GeS,
    And,
    Or,
}
