//! Instruction set.
//!
//! On disk every instruction is one opcode byte followed by an operand of
//! 0, 1 or 4 bytes. The verifier decodes the whole code segment once into
//! fixed-size [`Instruction`] records so the interpreter never re-parses bytes.

/// Operand encoding width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandWidth {
    None,
    Byte,
    Word,
}

impl OperandWidth {
    /// Number of operand bytes following the opcode.
    pub fn len(self) -> usize {
        match self {
            Self::None => 0,
            Self::Byte => 1,
            Self::Word => 4,
        }
    }

    pub fn is_none(self) -> bool {
        self == Self::None
    }
}

macro_rules! opcodes {
    ($($name:ident = $value:literal, $width:ident, $mnemonic:literal;)*) => {
        /// Instruction opcodes (Q3 numbering).
        #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($name = $value,)*
        }

        impl Opcode {
            /// Decode an opcode byte. Returns `None` for unassigned values.
            pub fn from_u8(v: u8) -> Option<Self> {
                match v {
                    $($value => Some(Self::$name),)*
                    _ => None,
                }
            }

            /// Width of the operand that follows the opcode byte.
            pub fn operand_width(self) -> OperandWidth {
                match self {
                    $(Self::$name => OperandWidth::$width,)*
                }
            }

            /// Lower-case assembler mnemonic.
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Self::$name => $mnemonic,)*
                }
            }
        }
    };
}

opcodes! {
    Undef = 0, None, "undef";
    Ignore = 1, None, "ignore";
    Break = 2, None, "break";
    Enter = 3, Word, "enter";
    Leave = 4, Word, "leave";
    Call = 5, None, "call";
    Push = 6, None, "push";
    Pop = 7, None, "pop";
    Const = 8, Word, "const";
    Local = 9, Word, "local";
    Jump = 10, None, "jump";
    Eq = 11, Word, "eq";
    Ne = 12, Word, "ne";
    Lti = 13, Word, "lti";
    Lei = 14, Word, "lei";
    Gti = 15, Word, "gti";
    Gei = 16, Word, "gei";
    Ltu = 17, Word, "ltu";
    Leu = 18, Word, "leu";
    Gtu = 19, Word, "gtu";
    Geu = 20, Word, "geu";
    Eqf = 21, Word, "eqf";
    Nef = 22, Word, "nef";
    Ltf = 23, Word, "ltf";
    Lef = 24, Word, "lef";
    Gtf = 25, Word, "gtf";
    Gef = 26, Word, "gef";
    Load1 = 27, None, "load1";
    Load2 = 28, None, "load2";
    Load4 = 29, None, "load4";
    Store1 = 30, None, "store1";
    Store2 = 31, None, "store2";
    Store4 = 32, None, "store4";
    Arg = 33, Byte, "arg";
    BlockCopy = 34, Word, "block_copy";
    Sex8 = 35, None, "sex8";
    Sex16 = 36, None, "sex16";
    Negi = 37, None, "negi";
    Add = 38, None, "add";
    Sub = 39, None, "sub";
    Divi = 40, None, "divi";
    Divu = 41, None, "divu";
    Modi = 42, None, "modi";
    Modu = 43, None, "modu";
    Muli = 44, None, "muli";
    Mulu = 45, None, "mulu";
    Band = 46, None, "band";
    Bor = 47, None, "bor";
    Bxor = 48, None, "bxor";
    Bcom = 49, None, "bcom";
    Lsh = 50, None, "lsh";
    Rshi = 51, None, "rshi";
    Rshu = 52, None, "rshu";
    Negf = 53, None, "negf";
    Addf = 54, None, "addf";
    Subf = 55, None, "subf";
    Divf = 56, None, "divf";
    Mulf = 57, None, "mulf";
    Cvif = 58, None, "cvif";
    Cvfi = 59, None, "cvfi";
}

impl Opcode {
    /// Encoded size in bytes, opcode byte included.
    pub fn size(self) -> usize {
        1 + self.operand_width().len()
    }

    /// Conditional branches whose operand is an instruction index.
    pub fn is_branch(self) -> bool {
        (Self::Eq as u8..=Self::Gef as u8).contains(&(self as u8))
    }
}

/// Decoded instruction: opcode plus its operand (0 when it has none).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: i32,
}

impl Instruction {
    pub fn new(opcode: Opcode, operand: i32) -> Self {
        Self { opcode, operand }
    }

    /// Instruction without an operand.
    pub fn bare(opcode: Opcode) -> Self {
        Self { opcode, operand: 0 }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.opcode.operand_width().is_none() {
            write!(f, "{}", self.opcode.mnemonic())
        } else {
            write!(f, "{} {}", self.opcode.mnemonic(), self.operand)
        }
    }
}
