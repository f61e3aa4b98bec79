//! Concrete types, aggregate layouts, and name mangling.
//!
//! After resolution every type is one of the variants below; aliases
//! have been substituted away and `char` has collapsed into `int`.
//! Every value occupies one i32 word at runtime: scalars directly,
//! aggregates as pointers into linear memory.

use core::fmt;

/// Size in bytes of one value slot.
pub const WORD: u32 = 4;

/// Size in bytes of the `array<T>` header: { i32 length, i32 buffer_ptr }.
pub const ARRAY_HEADER: u32 = 8;

/// A concrete, post-resolution type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Ty {
    Int,
    Bool,
    /// Function-return position only.
    Void,
    /// The type of the `null` literal. Assignable to any structure or
    /// array type; never appears in layouts or IR.
    Null,
    Array(Box<Ty>),
    Struct { name: String, args: Vec<Ty> },
}

impl Ty {
    /// True for types represented as pointers into linear memory.
    pub fn is_reference(&self) -> bool {
        matches!(self, Ty::Array(_) | Ty::Struct { .. })
    }

    /// Nesting depth of the type term. Used to bound monomorphization
    /// of recursively growing generic instantiations.
    pub fn depth(&self) -> usize {
        match self {
            Ty::Int | Ty::Bool | Ty::Void | Ty::Null => 1,
            Ty::Array(elem) => 1 + elem.depth(),
            Ty::Struct { args, .. } => {
                1 + args.iter().map(Ty::depth).max().unwrap_or(0)
            }
        }
    }

    /// Canonical mangled name: scalars by primitive name, `array$T`,
    /// and `S$T1$T2$...` for structure instances. Mangled names are
    /// the sole identity of definitions in IR and in the emitted
    /// module.
    pub fn mangle(&self) -> String {
        match self {
            Ty::Int => "int".into(),
            Ty::Bool => "boolean".into(),
            Ty::Void => "void".into(),
            Ty::Null => "null".into(),
            Ty::Array(elem) => format!("array${}", elem.mangle()),
            Ty::Struct { name, args } => {
                let mut out = name.clone();
                for arg in args {
                    out.push('$');
                    out.push_str(&arg.mangle());
                }
                out
            }
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Int => write!(f, "int"),
            Ty::Bool => write!(f, "boolean"),
            Ty::Void => write!(f, "void"),
            Ty::Null => write!(f, "null"),
            Ty::Array(elem) => write!(f, "array<{elem}>"),
            Ty::Struct { name, args } => {
                write!(f, "{name}")?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
        }
    }
}

/// One field slot of a structure layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSlot {
    pub name: String,
    pub offset: u32,
    pub ty: Ty,
}

/// Byte layout of a monomorphic structure: total size and per-field
/// offsets in declaration order. Offsets are assigned once and never
/// renumbered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub size: u32,
    pub fields: Vec<FieldSlot>,
}

impl Layout {
    /// Compute the layout for fields in declaration order, one word
    /// per field (natural 4-byte alignment).
    pub fn for_fields(fields: Vec<(String, Ty)>) -> Layout {
        let slots: Vec<FieldSlot> = fields
            .into_iter()
            .enumerate()
            .map(|(i, (name, ty))| FieldSlot {
                name,
                offset: i as u32 * WORD,
                ty,
            })
            .collect();
        Layout {
            size: slots.len() as u32 * WORD,
            fields: slots,
        }
    }

    pub fn offset_of(&self, field: &str) -> Option<u32> {
        self.fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| f.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mangling_is_deterministic_for_nested_generics() {
        let ty = Ty::Struct {
            name: "Map".into(),
            args: vec![
                Ty::Struct {
                    name: "vec".into(),
                    args: vec![Ty::Int],
                },
                Ty::Struct {
                    name: "List".into(),
                    args: vec![Ty::Int],
                },
            ],
        };
        assert_eq!(ty.mangle(), "Map$vec$int$List$int");
        assert_eq!(ty.mangle(), ty.clone().mangle());
    }

    #[test]
    fn array_mangles_with_element() {
        let ty = Ty::Array(Box::new(Ty::Struct {
            name: "Box".into(),
            args: vec![Ty::Int],
        }));
        assert_eq!(ty.mangle(), "array$Box$int");
    }

    #[test]
    fn layout_offsets_follow_declaration_order() {
        let layout = Layout::for_fields(vec![
            ("x".into(), Ty::Int),
            ("y".into(), Ty::Int),
            ("next".into(), Ty::Struct {
                name: "List".into(),
                args: vec![Ty::Int],
            }),
        ]);
        assert_eq!(layout.size, 12);
        assert_eq!(layout.offset_of("x"), Some(0));
        assert_eq!(layout.offset_of("y"), Some(4));
        assert_eq!(layout.offset_of("next"), Some(8));
        assert_eq!(layout.offset_of("missing"), None);
    }

    #[test]
    fn depth_grows_with_nesting() {
        let mut ty = Ty::Int;
        for _ in 0..3 {
            ty = Ty::Struct {
                name: "Box".into(),
                args: vec![ty],
            };
        }
        assert_eq!(ty.depth(), 4);
    }
}
